use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Tool, ToolCategory, ToolContext, ToolDefinition, ToolResult};
use crate::types::Symbol;

// ============================================================================
// GetAccountInfoTool - Balance, positions and simple performance stats
// ============================================================================

pub struct GetAccountInfoTool;

#[derive(Deserialize)]
struct GetAccountInfoParams {
    symbols: Vec<String>,
    #[serde(default)]
    initial_capital: Option<f64>,
}

#[derive(Serialize)]
struct PositionSummary {
    symbol: String,
    side: String,
    amount: f64,
    entry_price: f64,
    mark_price: f64,
    unrealized_pnl: f64,
    leverage: u32,
    liquidation_price: f64,
}

#[async_trait]
impl Tool for GetAccountInfoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_account_info".to_string(),
            description: "Get account balance, open positions with unrealized P&L, current account value, total return and a simplified Sharpe ratio.".to_string(),
            category: ToolCategory::Portfolio,
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbols": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Trading pairs to refresh before reading, e.g. [\"BTC/USDT\"]"
                    },
                    "initial_capital": {
                        "type": "number",
                        "description": "Starting capital in USDT for return calculation"
                    }
                },
                "required": ["symbols"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, params: serde_json::Value) -> ToolResult {
        let params: GetAccountInfoParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let symbols: Vec<Symbol> = params.symbols.iter().map(|s| Symbol::new(s)).collect();
        ctx.positions.force_sync(Some(&symbols)).await;

        let account = ctx.broker.get_account_info().await;
        let positions = ctx.positions.get_all_positions().await;

        let total_unrealized: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
        let current_account_value = account.available_margin + total_unrealized;

        let initial = params.initial_capital.unwrap_or(0.0);
        let total_return_pct = if initial > 0.0 {
            (current_account_value - initial) / initial * 100.0
        } else {
            0.0
        };

        // Simplified Sharpe over per-position returns (pnl / entry notional)
        let returns: Vec<f64> = positions
            .iter()
            .filter(|p| p.notional() > 0.0)
            .map(|p| p.unrealized_pnl / p.notional())
            .collect();
        let sharpe = simplified_sharpe(&returns);

        let summaries: Vec<PositionSummary> = positions
            .iter()
            .map(|p| PositionSummary {
                symbol: p.symbol.to_string(),
                side: p.side.as_str().to_string(),
                amount: p.amount,
                entry_price: p.entry_price,
                mark_price: p.mark_price,
                unrealized_pnl: p.unrealized_pnl,
                leverage: p.leverage,
                liquidation_price: p.liquidation_price,
            })
            .collect();

        ToolResult::success(json!({
            "balance": account.balance,
            "available_cash": account.available_margin,
            "used_margin": account.used_margin,
            "total_unrealized_pnl": total_unrealized,
            "current_account_value": current_account_value,
            "total_return_pct": total_return_pct,
            "sharpe_ratio": sharpe,
            "positions": summaries,
            "position_count": summaries.len(),
        }))
    }
}

/// Mean over standard deviation of the return series; 0 when degenerate
fn simplified_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        0.0
    } else {
        mean / std_dev
    }
}
