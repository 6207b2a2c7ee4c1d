/// Trading agent: one audited LLM cycle per symbol
use crate::audit::{AuditSink, Operation, ToolCallRecord, TradeRecord, TradingSession};
use crate::config::TradingMode;
use crate::logger::{log, LogTag};
use crate::risk::RiskGuard;
use crate::types::Symbol;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use super::engine::AgentEngine;
use super::prompts::PromptBuilder;

/// Pause between symbols within one cycle
const INTER_SYMBOL_PAUSE_MS: u64 = 1_000;

pub struct TradingAgent {
    engine: AgentEngine,
    audit: Arc<AuditSink>,
    risk: Arc<RiskGuard>,
    mode: TradingMode,
}

impl TradingAgent {
    pub fn new(
        engine: AgentEngine,
        audit: Arc<AuditSink>,
        risk: Arc<RiskGuard>,
        mode: TradingMode,
    ) -> Self {
        Self {
            engine,
            audit,
            risk,
            mode,
        }
    }

    /// Process every symbol in order with a pause in between
    pub async fn run(&self, symbols: &[Symbol]) {
        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(INTER_SYMBOL_PAUSE_MS)).await;
            }
            self.process_symbol(symbol).await;
        }
    }

    /// One audited cycle for one symbol. Exactly one session record is
    /// written whether the LLM pass succeeds or fails.
    pub async fn process_symbol(&self, symbol: &Symbol) {
        let start_time = Utc::now();
        log(
            LogTag::Agent,
            "INFO",
            &format!("Processing {} ...", symbol),
        );

        let system_prompt = PromptBuilder::build_system_prompt(&self.risk, self.mode);
        let user_prompt = PromptBuilder::build_user_prompt(symbol);

        let session = match self
            .engine
            .run_symbol(symbol, &system_prompt, &user_prompt)
            .await
        {
            Ok(outcome) => {
                let trades = derive_trades(&outcome.tool_calls);
                log(
                    LogTag::Agent,
                    "SUCCESS",
                    &format!(
                        "{}: {} tool call(s), {} trade(s)",
                        symbol,
                        outcome.tool_calls.len(),
                        trades.len()
                    ),
                );
                TradingSession {
                    symbol: symbol.clone(),
                    start_time,
                    end_time: Utc::now(),
                    prompt: user_prompt,
                    reasoning: outcome.reasoning,
                    tool_calls: outcome.tool_calls,
                    success: true,
                    error: None,
                    trades,
                }
            }
            Err(e) => {
                log(
                    LogTag::Agent,
                    "ERROR",
                    &format!("{}: cycle failed: {}", symbol, e),
                );
                TradingSession {
                    symbol: symbol.clone(),
                    start_time,
                    end_time: Utc::now(),
                    prompt: user_prompt,
                    reasoning: String::new(),
                    tool_calls: Vec::new(),
                    success: false,
                    error: Some(e.to_string()),
                    trades: Vec::new(),
                }
            }
        };

        self.audit.record(&session).await;
    }
}

/// Executed trades extracted from the tool transcript: every successful
/// `place_order` call becomes one record.
fn derive_trades(tool_calls: &[ToolCallRecord]) -> Vec<TradeRecord> {
    tool_calls
        .iter()
        .filter(|call| call.name == "place_order")
        .filter(|call| call.result.get("success").and_then(|v| v.as_bool()) == Some(true))
        .filter_map(|call| {
            let action = call.arguments.get("action")?.as_str()?;
            let symbol = call.arguments.get("symbol")?.as_str()?;
            Some(TradeRecord {
                symbol: Symbol::new(symbol),
                operation: Operation::normalize(action),
                leverage: call
                    .arguments
                    .get("leverage")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32),
                amount: None,
                pricing: call.arguments.get("cost").and_then(|v| v.as_f64()),
                stop_loss: call.arguments.get("stop_loss").and_then(|v| v.as_f64()),
                take_profit: call.arguments.get("take_profit").and_then(|v| v.as_f64()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, arguments: serde_json::Value, success: bool) -> ToolCallRecord {
        ToolCallRecord {
            name: name.to_string(),
            arguments,
            result: json!({ "success": success }),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_derive_trades_takes_successful_orders_only() {
        let calls = vec![
            record("get_market_data", json!({ "symbol": "BTC/USDT" }), true),
            record(
                "place_order",
                json!({ "symbol": "BTC/USDT", "action": "open_long", "cost": 100.0, "leverage": 5, "stop_loss": 95000.0 }),
                true,
            ),
            record(
                "place_order",
                json!({ "symbol": "ETH/USDT", "action": "open_short", "cost": 50.0 }),
                false,
            ),
        ];

        let trades = derive_trades(&calls);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].operation, Operation::Buy);
        assert_eq!(trades[0].leverage, Some(5));
        assert_eq!(trades[0].stop_loss, Some(95_000.0));
    }
}
