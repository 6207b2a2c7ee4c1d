/// Centralized argument handling for leverbot
///
/// Consolidates all command-line argument parsing and debug flag checking.
/// Binaries and tests can override the argument list via `set_cmd_args`.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// EXECUTION MODE FLAGS
// =============================================================================

/// Help requested
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Explicit opt-in to start trading. Nothing trades without it.
pub fn is_run_enabled() -> bool {
    has_arg("--run")
}

/// Run exactly one trading cycle, then exit 0
pub fn is_once_enabled() -> bool {
    has_arg("--once")
}

/// Development mode: forces the mock broker regardless of TRADING_MODE
pub fn is_dev_enabled() -> bool {
    has_arg("--dev")
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Broker debug mode (order sizing, protection attempts, rollback detail)
pub fn is_debug_broker_enabled() -> bool {
    has_arg("--debug-broker")
}

/// Agent debug mode (LLM step loop, tool dispatch)
pub fn is_debug_agent_enabled() -> bool {
    has_arg("--debug-agent")
}

/// Position sync debug mode (cooldown hits, cache eviction)
pub fn is_debug_sync_enabled() -> bool {
    has_arg("--debug-sync")
}

/// Print which debug modes are active at startup
pub fn print_debug_info() {
    use crate::logger::{log, LogTag};

    let mut active = Vec::new();
    if is_debug_broker_enabled() {
        active.push("broker");
    }
    if is_debug_agent_enabled() {
        active.push("agent");
    }
    if is_debug_sync_enabled() {
        active.push("sync");
    }

    if !active.is_empty() {
        log(
            LogTag::System,
            "DEBUG",
            &format!("Debug modes active: {}", active.join(", ")),
        );
    }
}

/// Print CLI usage
pub fn print_help() {
    println!("leverbot - LLM-driven crypto futures trading agent");
    println!();
    println!("USAGE:");
    println!("    leverbot --run [--once] [--dev]");
    println!();
    println!("FLAGS:");
    println!("    --run             Start the trading agent (required)");
    println!("    --once            Run exactly one trading cycle and exit");
    println!("    --dev             Force the mock broker (no credentials required)");
    println!("    --debug-broker    Verbose order placement / protection logging");
    println!("    --debug-agent     Verbose LLM step loop logging");
    println!("    --debug-sync      Verbose position cache logging");
    println!("    --help, -h        Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("    TRADING_MODE=paper|live        BROKER_MODE=mock|paper|live");
    println!("    MAX_LEVERAGE, MAX_COST_PER_TRADE, SYMBOL_WHITELIST, SYMBOLS");
    println!("    INTERVAL_MS, JITTER_MS, COOLDOWN_MS, SLIPPAGE_TOLERANCE");
    println!("    DEFAULT_STOP_LOSS_PERCENT, DEFAULT_TAKE_PROFIT_PERCENT");
    println!("    BINANCE_API_KEY, BINANCE_API_SECRET, OPENAI_API_KEY,");
    println!("    OPENAI_BASE_URL, OPENAI_MODEL, TAVILY_API_KEY");
    println!();
    println!("A .env file in the working directory is loaded if present.");
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test body: CMD_ARGS is process-global and tests run in parallel
    #[test]
    fn test_cmd_args_helpers() {
        set_cmd_args(vec![
            "leverbot".to_string(),
            "--once".to_string(),
            "--symbol".to_string(),
            "BTC/USDT".to_string(),
        ]);
        assert!(has_arg("--once"));
        assert!(!has_arg("--dev"));
        assert_eq!(get_arg_value("--symbol"), Some("BTC/USDT".to_string()));
        assert_eq!(get_arg_value("--missing"), None);
        set_cmd_args(vec!["leverbot".to_string()]);
    }
}
