/// Web search provider client (Tavily wire shape)
///
/// Optional capability: without an API key the tool surfaces a structured
/// "not configured" error instead of failing the cycle.
use crate::errors::BotError;
use crate::logger::{log, LogTag};
use serde_json::{json, Value};

const SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;

pub struct SearchClient {
    client: reqwest::Client,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Run one search and format the hits into a compact text block
    pub async fn search(&self, query: &str) -> Result<String, BotError> {
        log(LogTag::Search, "INFO", &format!("Searching: {}", query));

        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": MAX_RESULTS,
            "include_answer": true,
        });

        let response = self
            .client
            .post(SEARCH_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::exchange(format!("Search request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BotError::exchange(format!(
                "Search provider HTTP {}: {}",
                status, text
            )));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| BotError::exchange(format!("Bad search JSON: {}", e)))?;

        let mut formatted = String::new();
        if let Some(answer) = value.get("answer").and_then(|a| a.as_str()) {
            if !answer.is_empty() {
                formatted.push_str(answer);
                formatted.push_str("\n\n");
            }
        }
        if let Some(results) = value.get("results").and_then(|r| r.as_array()) {
            for (i, result) in results.iter().take(MAX_RESULTS).enumerate() {
                let title = result.get("title").and_then(|t| t.as_str()).unwrap_or("");
                let content = result.get("content").and_then(|c| c.as_str()).unwrap_or("");
                let url = result.get("url").and_then(|u| u.as_str()).unwrap_or("");
                formatted.push_str(&format!("{}. {} — {} ({})\n", i + 1, title, content, url));
            }
        }

        if formatted.is_empty() {
            formatted = "No results.".to_string();
        }
        Ok(formatted)
    }
}
