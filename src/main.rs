use leverbot::{
    arguments::{is_help_requested, is_run_enabled, print_debug_info, print_help},
    logger::{self, LogTag},
};

/// Main entry point for leverbot
///
/// Routes execution based on command-line arguments:
/// - `--help`: display usage and exit
/// - `--run [--once] [--dev]`: start the trading agent
///
/// Trading never starts without an explicit `--run`.
#[tokio::main]
async fn main() {
    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    logger::info(LogTag::System, "leverbot starting up...");
    print_debug_info();

    if !is_run_enabled() {
        logger::error(LogTag::System, "No execution mode specified");
        logger::info(
            LogTag::System,
            "Use --run to start the agent, or --help to see all options",
        );
        print_help();
        std::process::exit(1);
    }

    match leverbot::run::run_bot().await {
        Ok(()) => {
            logger::info(LogTag::System, "leverbot shut down cleanly");
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("leverbot failed: {}", e));
            std::process::exit(1);
        }
    }
}
