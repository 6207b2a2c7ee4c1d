use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolCategory, ToolContext, ToolDefinition, ToolResult};
use crate::types::Symbol;

// ============================================================================
// GetMarketDataTool - Formatted market snapshot for one instrument
// ============================================================================

pub struct GetMarketDataTool;

#[derive(Deserialize)]
struct GetMarketDataParams {
    symbol: String,
}

#[async_trait]
impl Tool for GetMarketDataTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_market_data".to_string(),
            description: "Get current market data for a trading pair: last price and venue stats, pre-formatted for analysis.".to_string(),
            category: ToolCategory::MarketData,
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Trading pair, e.g. BTC/USDT"
                    }
                },
                "required": ["symbol"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, params: serde_json::Value) -> ToolResult {
        let params: GetMarketDataParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let symbol = Symbol::new(&params.symbol);
        match ctx.market_data.snapshot(&symbol).await {
            Ok(data) => ToolResult::success(json!({
                "symbol": symbol.as_str(),
                "data": data,
            })),
            Err(e) => ToolResult::error(format!("Failed to fetch market data: {}", e)),
        }
    }
}
