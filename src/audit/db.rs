//! Relational session log
//!
//! SQLite persistence for reasoning sessions and their trades. The symbol
//! column is a closed enum of five tickers; anything else is logged and
//! skipped at this layer only — the trading path never consults the mapping.

use super::{Operation, TradingSession};
use crate::errors::{AuditError, BotError};
use crate::logger::{log, LogTag};
use crate::types::Symbol;
use once_cell::sync::OnceCell;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// =============================================================================
// GLOBAL DATABASE INSTANCE
// =============================================================================

static AUDIT_DB: OnceCell<Arc<Mutex<Connection>>> = OnceCell::new();

/// Tickers the relational log accepts. Additions require a schema migration.
const AUDIT_SYMBOLS: [&str; 5] = ["BTC", "ETH", "BNB", "SOL", "DOGE"];

/// Map a trading symbol onto the closed audit enum
pub fn map_symbol(symbol: &Symbol) -> Option<&'static str> {
    AUDIT_SYMBOLS.iter().copied().find(|s| *s == symbol.base())
}

// =============================================================================
// INITIALIZATION
// =============================================================================

/// Open (or create) the audit database and install the schema
pub fn init_audit_db(path: &str) -> Result<(), BotError> {
    let conn = Connection::open(path).map_err(|e| {
        BotError::Audit(AuditError::Database {
            error: format!("Failed to open {}: {}", path, e),
        })
    })?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| db_error(format!("Failed to set journal mode: {}", e)))?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(|e| db_error(format!("Failed to set synchronous mode: {}", e)))?;
    conn.busy_timeout(std::time::Duration::from_millis(10_000))
        .map_err(|e| db_error(format!("Failed to set busy timeout: {}", e)))?;

    initialize_schema(&conn)?;

    AUDIT_DB
        .set(Arc::new(Mutex::new(conn)))
        .map_err(|_| db_error("Audit database already initialized".to_string()))?;

    log(
        LogTag::Audit,
        "INFO",
        &format!("Session database ready at {}", path),
    );
    Ok(())
}

/// In-memory database for tests
pub fn init_audit_db_in_memory() -> Result<(), BotError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| db_error(format!("Failed to open in-memory db: {}", e)))?;
    initialize_schema(&conn)?;
    AUDIT_DB
        .set(Arc::new(Mutex::new(conn)))
        .map_err(|_| db_error("Audit database already initialized".to_string()))?;
    Ok(())
}

fn initialize_schema(conn: &Connection) -> Result<(), BotError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            reasoning TEXT NOT NULL,
            tool_call_count INTEGER NOT NULL DEFAULT 0,
            success INTEGER NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE TABLE IF NOT EXISTS trades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL REFERENCES sessions(id),
            symbol TEXT NOT NULL CHECK (symbol IN ('BTC','ETH','BNB','SOL','DOGE')),
            operation TEXT NOT NULL CHECK (operation IN ('Buy','Sell','Hold')),
            leverage INTEGER,
            amount REAL,
            pricing REAL,
            stop_loss REAL,
            take_profit REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_symbol ON sessions(symbol);
        CREATE INDEX IF NOT EXISTS idx_trades_session ON trades(session_id);",
    )
    .map_err(|e| db_error(format!("Schema creation failed: {}", e)))?;
    Ok(())
}

fn db_error(error: String) -> BotError {
    BotError::Audit(AuditError::Database { error })
}

fn with_db<F, R>(f: F) -> Result<R, BotError>
where
    F: FnOnce(&Connection) -> Result<R, BotError>,
{
    let db = AUDIT_DB
        .get()
        .ok_or_else(|| db_error("Audit database not initialized".to_string()))?;
    let conn = db
        .lock()
        .map_err(|_| db_error("Audit database lock poisoned".to_string()))?;
    f(&conn)
}

// =============================================================================
// WRITES
// =============================================================================

/// Insert the parent session row plus one child row per trade. Returns the
/// new session id.
pub fn insert_session(session: &TradingSession) -> Result<i64, BotError> {
    with_db(|conn| {
        let audit_symbol = match map_symbol(&session.symbol) {
            Some(s) => s,
            None => {
                log(
                    LogTag::Audit,
                    "WARN",
                    &format!(
                        "{}",
                        AuditError::UnmappedSymbol {
                            symbol: session.symbol.to_string()
                        }
                    ),
                );
                return Err(BotError::Audit(AuditError::UnmappedSymbol {
                    symbol: session.symbol.to_string(),
                }));
            }
        };

        conn.execute(
            "INSERT INTO sessions (symbol, start_time, end_time, prompt, reasoning, tool_call_count, success, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                audit_symbol,
                session.start_time.timestamp_millis(),
                session.end_time.timestamp_millis(),
                session.prompt,
                session.reasoning,
                session.tool_calls.len() as i64,
                session.success as i64,
                session.error,
            ],
        )
        .map_err(|e| db_error(format!("Session insert failed: {}", e)))?;

        let session_id = conn.last_insert_rowid();

        for trade in &session.trades {
            let trade_symbol = match map_symbol(&trade.symbol) {
                Some(s) => s,
                None => {
                    log(
                        LogTag::Audit,
                        "WARN",
                        &format!(
                            "{}",
                            AuditError::UnmappedSymbol {
                                symbol: trade.symbol.to_string()
                            }
                        ),
                    );
                    continue;
                }
            };

            conn.execute(
                "INSERT INTO trades (session_id, symbol, operation, leverage, amount, pricing, stop_loss, take_profit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session_id,
                    trade_symbol,
                    trade.operation.as_str(),
                    trade.leverage,
                    trade.amount,
                    trade.pricing,
                    trade.stop_loss,
                    trade.take_profit,
                ],
            )
            .map_err(|e| db_error(format!("Trade insert failed: {}", e)))?;
        }

        Ok(session_id)
    })
}

// =============================================================================
// READS
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub successful_sessions: i64,
    pub failed_sessions: i64,
    pub total_trades: i64,
}

/// Aggregate counters for the shutdown banner
pub fn get_session_stats() -> Result<SessionStats, BotError> {
    with_db(|conn| {
        let (total, successes): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| db_error(format!("Stats query failed: {}", e)))?;

        let trades: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .map_err(|e| db_error(format!("Stats query failed: {}", e)))?;

        Ok(SessionStats {
            total_sessions: total,
            successful_sessions: successes,
            failed_sessions: total - successes,
            total_trades: trades,
        })
    })
}

/// Number of session rows for one audit symbol (test helper)
pub fn count_sessions_for(symbol: &str) -> Result<i64, BotError> {
    with_db(|conn| {
        conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )
        .map_err(|e| db_error(format!("Count query failed: {}", e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_symbol_closed_set() {
        assert_eq!(map_symbol(&Symbol::new("BTC/USDT")), Some("BTC"));
        assert_eq!(map_symbol(&Symbol::new("DOGE/USDT")), Some("DOGE"));
        assert_eq!(map_symbol(&Symbol::new("PEPE/USDT")), None);
        assert_eq!(map_symbol(&Symbol::new("SOL")), Some("SOL"));
    }
}
