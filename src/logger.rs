//! Console logging
//!
//! Every line carries two fixed-width columns ahead of the message — the
//! subsystem tag and a level — so interleaved output from the broker,
//! agent and scheduler stays scannable. Trade-flow levels (BUY, SELL,
//! ROLLBACK) get their own hues on top of the usual severity colors.

use chrono::Local;
use colored::{Color, Colorize};

const TAG_WIDTH: usize = 8;
const LEVEL_WIDTH: usize = 10;
const TIME_FORMAT: &str = "%H:%M:%S";

/// Log tags for categorizing log messages.
#[derive(Debug, Clone)]
pub enum LogTag {
    System,
    Broker,
    Sim,
    Trader,
    Agent,
    Risk,
    Sched,
    Audit,
    Search,
    Other(String),
}

impl LogTag {
    fn label(&self) -> &str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Broker => "BROKER",
            LogTag::Sim => "SIM",
            LogTag::Trader => "TRADER",
            LogTag::Agent => "AGENT",
            LogTag::Risk => "RISK",
            LogTag::Sched => "SCHED",
            LogTag::Audit => "AUDIT",
            LogTag::Search => "SEARCH",
            LogTag::Other(s) => s,
        }
    }

    fn color(&self) -> Color {
        match self {
            LogTag::System => Color::BrightYellow,
            LogTag::Broker | LogTag::Trader => Color::BrightGreen,
            LogTag::Sim => Color::BrightBlack,
            LogTag::Agent => Color::BrightCyan,
            LogTag::Risk => Color::BrightRed,
            LogTag::Sched => Color::BrightBlue,
            LogTag::Audit => Color::BrightMagenta,
            LogTag::Search => Color::BrightWhite,
            LogTag::Other(_) => Color::White,
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn level_color(level: &str) -> Color {
    match level {
        "ERROR" | "CRITICAL" | "ROLLBACK" => Color::BrightRed,
        "WARN" | "WARNING" | "BALANCE" => Color::BrightYellow,
        "SUCCESS" => Color::BrightGreen,
        "INFO" => Color::BrightBlue,
        "DEBUG" => Color::BrightBlack,
        "BUY" | "LONG" => Color::BrightCyan,
        "SELL" | "SHORT" => Color::BrightMagenta,
        _ => Color::White,
    }
}

/// Logs a message with time, tag and level columns.
pub fn log(tag: LogTag, level: &str, message: &str) {
    let time = Local::now().format(TIME_FORMAT).to_string();
    let level = level.to_uppercase();

    let tag_column = format!("{:<width$}", tag.label(), width = TAG_WIDTH)
        .color(tag.color())
        .bold();
    let level_column = format!("{:<width$}", level, width = LEVEL_WIDTH)
        .color(level_color(&level))
        .bold();

    println!("{} [{}] [{}] {}", time.dimmed(), tag_column, level_column, message);
}

/// Convenience wrapper for INFO logs
pub fn info(tag: LogTag, message: &str) {
    log(tag, "INFO", message);
}

/// Convenience wrapper for WARN logs
pub fn warn(tag: LogTag, message: &str) {
    log(tag, "WARN", message);
}

/// Convenience wrapper for ERROR logs
pub fn error(tag: LogTag, message: &str) {
    log(tag, "ERROR", message);
}

/// Convenience wrapper for DEBUG logs
pub fn debug(tag: LogTag, message: &str) {
    log(tag, "DEBUG", message);
}
