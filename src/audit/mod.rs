/// Audit records and sink fan-out
///
/// One `TradingSession` per `process_symbol` invocation, appended to both the
/// file tree and the relational log. Neither sink failing ever propagates to
/// the trading path.
use crate::logger::{log, LogTag};
use crate::types::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod db;
pub mod file_log;

// ============================================================================
// RECORD MODEL
// ============================================================================

/// Normalized trade operation for the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Buy,
    Sell,
    Hold,
}

impl Operation {
    /// Loose containment mapping: `buy`/`long` → Buy, `sell`/`short` → Sell,
    /// anything else → Hold.
    pub fn normalize(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        if lower.contains("buy") || lower.contains("long") {
            Operation::Buy
        } else if lower.contains("sell") || lower.contains("short") {
            Operation::Sell
        } else {
            Operation::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Buy => "Buy",
            Operation::Sell => "Sell",
            Operation::Hold => "Hold",
        }
    }
}

/// One executed (or attempted) trade inside a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: Symbol,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
}

/// One tool invocation as seen by the step loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// The full record of one per-symbol agent cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSession {
    pub symbol: Symbol,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub prompt: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trades: Vec<TradeRecord>,
}

// ============================================================================
// SINK FAN-OUT
// ============================================================================

/// Append-only session recorder. Both targets are attempted independently;
/// failures are logged and swallowed.
pub struct AuditSink {
    log_dir: std::path::PathBuf,
    db_enabled: bool,
}

impl AuditSink {
    pub fn new(log_dir: impl Into<std::path::PathBuf>, db_enabled: bool) -> Self {
        Self {
            log_dir: log_dir.into(),
            db_enabled,
        }
    }

    pub async fn record(&self, session: &TradingSession) {
        if let Err(e) = file_log::write_session(&self.log_dir, session) {
            log(
                LogTag::Audit,
                "ERROR",
                &format!("File log write failed: {}", e),
            );
        }

        if self.db_enabled {
            if let Err(e) = db::insert_session(session) {
                log(
                    LogTag::Audit,
                    "ERROR",
                    &format!("Session database write failed: {}", e),
                );
            }
        }
    }
}
