use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolCategory, ToolContext, ToolDefinition, ToolResult};

// ============================================================================
// SearchTool - Web search for news and sentiment
// ============================================================================

pub struct SearchTool;

#[derive(Deserialize)]
struct SearchParams {
    query: String,
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search".to_string(),
            description: "Search the web for recent news, events and sentiment relevant to a trading decision.".to_string(),
            category: ToolCategory::Research,
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query, e.g. \"bitcoin ETF flows this week\""
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, params: serde_json::Value) -> ToolResult {
        let params: SearchParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let client = match &ctx.search {
            Some(client) => client,
            None => return ToolResult::error("Search provider not configured"),
        };

        match client.search(&params.query).await {
            Ok(results) => ToolResult::success(json!({
                "query": params.query,
                "results": results,
            })),
            Err(e) => ToolResult::error(format!("Search failed: {}", e)),
        }
    }
}
