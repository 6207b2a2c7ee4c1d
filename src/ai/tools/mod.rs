/// Tool surface exposed to the LLM driver
///
/// Each tool declares a JSON-schema parameter block and validates its inputs
/// before touching any shared state. All tools execute against one
/// `ToolContext` so they observe the same broker and position cache.
use crate::apis::llm::ToolSpec;
use crate::apis::search::SearchClient;
use crate::broker::Broker;
use crate::market_data::MarketDataProvider;
use crate::positions::PositionManager;
use crate::risk::RiskGuard;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub mod account;
pub mod market;
pub mod orders;
pub mod search;

pub use account::GetAccountInfoTool;
pub use market::GetMarketDataTool;
pub use orders::PlaceOrderTool;
pub use search::SearchTool;

// ============================================================================
// TOOL CONTRACT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    MarketData,
    Portfolio,
    Trading,
    Research,
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Value,
}

impl ToolDefinition {
    /// Wire shape advertised to the LLM provider
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Tagged result every tool returns to the LLM
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub payload: Value,
}

impl ToolResult {
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: json!({ "error": message.into() }),
        }
    }

    /// Risk-guard rejection: carries the `rejected` marker next to the error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: json!({ "rejected": true, "error": message.into() }),
        }
    }

    /// Flattened JSON handed back to the model
    pub fn to_json(&self) -> Value {
        let mut out = json!({ "success": self.success });
        if let (Some(out_map), Some(payload_map)) = (out.as_object_mut(), self.payload.as_object())
        {
            for (k, v) in payload_map {
                out_map.insert(k.clone(), v.clone());
            }
        }
        out
    }
}

/// Shared collaborators every tool executes against
pub struct ToolContext {
    pub broker: Arc<dyn Broker>,
    pub positions: Arc<PositionManager>,
    pub risk: Arc<RiskGuard>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub search: Option<Arc<SearchClient>>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, ctx: &ToolContext, params: Value) -> ToolResult;
}

/// The full tool set, in the order it is advertised to the model
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetMarketDataTool),
        Arc::new(GetAccountInfoTool),
        Arc::new(PlaceOrderTool),
        Arc::new(SearchTool),
    ]
}
