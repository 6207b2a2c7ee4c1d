/// Periodic cycle driver
///
/// One timer, sequential cycles. The first cycle fires immediately; each
/// subsequent tick waits `interval_ms` plus uniform random jitter. Shutdown
/// signals are honored between cycles only — an in-progress cycle always
/// completes. A second Ctrl-C during shutdown force-kills the process.
use crate::ai::TradingAgent;
use crate::logger::{log, LogTag};
use crate::types::Symbol;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

pub struct Scheduler {
    run_count: AtomicU64,
    is_running: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            run_count: AtomicU64::new(0),
            is_running: AtomicBool::new(false),
        }
    }

    pub fn run_count(&self) -> u64 {
        self.run_count.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Drive cycles until a shutdown signal arrives (or after one cycle when
    /// `once` is set). Returns the total cycle count.
    pub async fn start(
        &self,
        agent: Arc<TradingAgent>,
        symbols: Vec<Symbol>,
        interval_ms: u64,
        jitter_ms: u64,
        once: bool,
    ) -> u64 {
        if self.is_running.swap(true, Ordering::SeqCst) {
            log(LogTag::Sched, "WARN", "Scheduler already running, ignoring start");
            return self.run_count();
        }

        let symbol_list: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        log(
            LogTag::Sched,
            "INFO",
            &format!(
                "Starting: {} every {}s (jitter up to {}ms)",
                symbol_list.join(", "),
                interval_ms / 1000,
                jitter_ms
            ),
        );

        loop {
            let cycle = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
            log(
                LogTag::Sched,
                "INFO",
                &format!(
                    "=== Cycle {} at {} ===",
                    cycle,
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
                ),
            );

            // A panicking cycle must not take the timer down with it
            let cycle_agent = agent.clone();
            let cycle_symbols = symbols.clone();
            let outcome =
                tokio::spawn(async move { cycle_agent.run(&cycle_symbols).await }).await;
            if let Err(e) = outcome {
                log(
                    LogTag::Sched,
                    "ERROR",
                    &format!("Cycle {} aborted: {}", cycle, e),
                );
            }

            if once {
                log(LogTag::Sched, "INFO", "Single-cycle mode, stopping");
                break;
            }

            let jitter = if jitter_ms > 0 {
                rand::thread_rng().gen_range(0..=jitter_ms)
            } else {
                0
            };

            tokio::select! {
                _ = sleep(Duration::from_millis(interval_ms + jitter)) => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_err() {
                        log(LogTag::Sched, "ERROR", "Failed to listen for shutdown signal");
                    }
                    log(
                        LogTag::Sched,
                        "WARN",
                        "Shutdown signal received. Press Ctrl+C again to force kill.",
                    );
                    // Second Ctrl-C during graceful shutdown exits immediately
                    tokio::spawn(async {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            log(
                                LogTag::Sched,
                                "ERROR",
                                "Second Ctrl+C detected — forcing immediate exit.",
                            );
                            // 130 is the conventional exit code for SIGINT
                            std::process::exit(130);
                        }
                    });
                    break;
                }
            }
        }

        self.is_running.store(false, Ordering::SeqCst);
        let total = self.run_count();
        log(
            LogTag::Sched,
            "INFO",
            &format!("Stopped after {} cycle(s)", total),
        );
        total
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
