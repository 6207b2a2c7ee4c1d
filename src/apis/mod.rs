// External provider clients (raw JSON HTTP, no vendor SDKs)
pub mod llm;
pub mod search;
