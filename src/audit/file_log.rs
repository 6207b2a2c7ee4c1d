/// File-tree session log
///
/// One pretty-printed JSON file per session under
/// `logs/trade-YYYY-MM-DD/<symbol>-<epoch-ms>.json`.
use super::TradingSession;
use crate::errors::{AuditError, BotError};
use std::fs;
use std::path::{Path, PathBuf};

pub fn session_path(log_dir: &Path, session: &TradingSession) -> PathBuf {
    let day_dir = format!("trade-{}", session.start_time.format("%Y-%m-%d"));
    let file_name = format!(
        "{}-{}.json",
        session.symbol.file_safe(),
        session.start_time.timestamp_millis()
    );
    log_dir.join(day_dir).join(file_name)
}

pub fn write_session(log_dir: &Path, session: &TradingSession) -> Result<(), BotError> {
    let path = session_path(log_dir, session);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BotError::Audit(AuditError::FileWrite {
                path: parent.display().to_string(),
                error: e.to_string(),
            })
        })?;
    }

    let json = serde_json::to_string_pretty(session).map_err(|e| {
        BotError::Audit(AuditError::FileWrite {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    })?;

    fs::write(&path, json).map_err(|e| {
        BotError::Audit(AuditError::FileWrite {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TradingSession;
    use crate::types::Symbol;
    use chrono::{TimeZone, Utc};

    fn session() -> TradingSession {
        TradingSession {
            symbol: Symbol::new("BTC/USDT"),
            start_time: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 14, 9, 31, 0).unwrap(),
            prompt: "analyze BTC/USDT".to_string(),
            reasoning: "held".to_string(),
            tool_calls: Vec::new(),
            success: true,
            error: None,
            trades: Vec::new(),
        }
    }

    #[test]
    fn test_session_path_layout() {
        let path = session_path(Path::new("logs"), &session());
        let rendered = path.to_string_lossy();
        assert!(rendered.starts_with("logs/trade-2026-03-14/"));
        assert!(rendered.contains("BTC-USDT-"));
        assert!(rendered.ends_with(".json"));
    }

    #[test]
    fn test_write_session_roundtrip() {
        let dir = std::env::temp_dir().join(format!("leverbot-audit-{}", std::process::id()));
        let s = session();
        write_session(&dir, &s).unwrap();

        let path = session_path(&dir, &s);
        let raw = fs::read_to_string(&path).unwrap();
        let parsed: TradingSession = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.symbol, s.symbol);
        assert!(parsed.success);

        let _ = fs::remove_dir_all(&dir);
    }
}
