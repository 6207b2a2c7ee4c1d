use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Tool, ToolCategory, ToolContext, ToolDefinition, ToolResult};
use crate::errors::ValidationError;
use crate::logger::{log, LogTag};
use crate::positions::DEFAULT_MAX_OPEN_POSITIONS;
use crate::types::{OrderRequest, OrderResult, PositionSide, Symbol};

// ============================================================================
// PlaceOrderTool - Open/close dispatch with risk validation
// ============================================================================

pub struct PlaceOrderTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OrderAction {
    OpenLong,
    CloseLong,
    OpenShort,
    CloseShort,
}

impl OrderAction {
    fn as_str(&self) -> &'static str {
        match self {
            OrderAction::OpenLong => "open_long",
            OrderAction::CloseLong => "close_long",
            OrderAction::OpenShort => "open_short",
            OrderAction::CloseShort => "close_short",
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, OrderAction::OpenLong | OrderAction::OpenShort)
    }
}

#[derive(Deserialize)]
struct PlaceOrderParams {
    symbol: String,
    action: OrderAction,
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    leverage: Option<u32>,
    #[serde(default)]
    stop_loss: Option<f64>,
    #[serde(default)]
    take_profit: Option<f64>,
}

#[async_trait]
impl Tool for PlaceOrderTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "place_order".to_string(),
            description: "Open or close a futures position. Opens require cost (USDT margin) and leverage, and should carry a stop_loss; closes take no sizing or protective prices.".to_string(),
            category: ToolCategory::Trading,
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Trading pair, e.g. BTC/USDT"
                    },
                    "action": {
                        "type": "string",
                        "enum": ["open_long", "close_long", "open_short", "close_short"],
                        "description": "What to do with the position"
                    },
                    "cost": {
                        "type": "number",
                        "description": "Margin to commit in USDT (opens only)"
                    },
                    "leverage": {
                        "type": "integer",
                        "description": "Leverage multiplier (opens only)"
                    },
                    "stop_loss": {
                        "type": "number",
                        "description": "Stop-loss trigger price (opens only)"
                    },
                    "take_profit": {
                        "type": "number",
                        "description": "Take-profit trigger price (opens only)"
                    }
                },
                "required": ["symbol", "action"]
            }),
        }
    }

    async fn execute(&self, ctx: &ToolContext, params: serde_json::Value) -> ToolResult {
        let params: PlaceOrderParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let symbol = Symbol::new(&params.symbol);
        log(
            LogTag::Trader,
            "INFO",
            &format!("Order action: {} {}", params.action.as_str(), symbol),
        );

        // Validation happens entirely before the broker; a rejected request
        // produces no side effects at all.
        let request = if params.action.is_open() {
            match build_open_request(ctx, &symbol, &params).await {
                Ok(request) => request,
                Err(rejection) => return rejection,
            }
        } else {
            match build_close_request(ctx, &symbol, &params).await {
                Ok(request) => request,
                Err(rejection) => return rejection,
            }
        };

        let result = ctx.broker.place_order(request).await;

        // The broker was reached, so whatever happened (fill, rollback,
        // critical) the cache must reflect post-trade state before the LLM
        // reads again.
        ctx.positions
            .force_sync(Some(std::slice::from_ref(&symbol)))
            .await;

        to_tool_result(&symbol, result)
    }
}

async fn build_open_request(
    ctx: &ToolContext,
    symbol: &Symbol,
    params: &PlaceOrderParams,
) -> Result<OrderRequest, ToolResult> {
    let (cost, leverage) = match (params.cost, params.leverage) {
        (Some(cost), Some(leverage)) => (cost, leverage),
        _ => {
            return Err(ToolResult::error(
                ValidationError::MissingParameter {
                    field: "cost and leverage are required to open".to_string(),
                }
                .to_string(),
            ))
        }
    };

    if let Err(rejection) = ctx.risk.validate(symbol, cost, leverage) {
        return Err(ToolResult::rejected(rejection.to_string()));
    }

    if !ctx
        .positions
        .can_open_position(symbol, &ctx.risk, DEFAULT_MAX_OPEN_POSITIONS)
        .await
    {
        return Err(ToolResult::error(format!(
            "Cannot open {}: position already exists or position limit reached",
            symbol
        )));
    }

    let side = match params.action {
        OrderAction::OpenLong => PositionSide::Long,
        _ => PositionSide::Short,
    };

    Ok(
        OrderRequest::market_open(symbol.clone(), side.opening_order_side(), cost, leverage)
            .with_protection(params.stop_loss, params.take_profit),
    )
}

async fn build_close_request(
    ctx: &ToolContext,
    symbol: &Symbol,
    params: &PlaceOrderParams,
) -> Result<OrderRequest, ToolResult> {
    if params.stop_loss.is_some() || params.take_profit.is_some() {
        return Err(ToolResult::error(
            "Closing actions cannot carry protective prices",
        ));
    }

    let wanted_side = match params.action {
        OrderAction::CloseLong => PositionSide::Long,
        _ => PositionSide::Short,
    };

    let position = match ctx.positions.get_position(symbol).await {
        Some(p) if p.side == wanted_side => p,
        _ => {
            return Err(ToolResult::error(
                ValidationError::NoOpenPosition {
                    symbol: symbol.to_string(),
                    side: wanted_side.as_str().to_string(),
                }
                .to_string(),
            ))
        }
    };

    // Exchange clamps reduce-only orders to the remaining size, so a cached
    // amount that is slightly stale still closes cleanly.
    Ok(OrderRequest::market_close(
        symbol.clone(),
        wanted_side.closing_order_side(),
        position.amount,
    ))
}

fn to_tool_result(symbol: &Symbol, result: OrderResult) -> ToolResult {
    if result.success {
        return ToolResult::success(json!({
            "symbol": symbol.as_str(),
            "order_id": result.order_id,
            "stop_loss_order_id": result.stop_loss_order_id,
            "take_profit_order_id": result.take_profit_order_id,
        }));
    }

    let error = result.error.unwrap_or_else(|| "order failed".to_string());
    let mut out = ToolResult::error(error);
    if result.critical {
        out.payload["critical"] = json!(true);
    }
    out
}
