/// Startup sequence and bot lifecycle
///
/// Loads the environment, validates credentials, wires the broker / position
/// manager / tools into one shared context, then hands control to the
/// scheduler until shutdown.
use crate::ai::{AgentEngine, ToolContext, TradingAgent};
use crate::apis::llm::{self, LlmClient, OpenAiClient};
use crate::apis::search::SearchClient;
use crate::arguments::{is_dev_enabled, is_once_enabled};
use crate::audit::{db, AuditSink};
use crate::broker::{Broker, ExchangeBroker, SimulationBroker};
use crate::config::{self, BrokerMode};
use crate::exchange::{BinanceFutures, ExchangeApi};
use crate::logger::{log, LogTag};
use crate::market_data::{ExchangeMarketData, MarketDataProvider, SimMarketData};
use crate::positions::PositionManager;
use crate::risk::RiskGuard;
use crate::scheduler::Scheduler;
use std::sync::Arc;

/// Starting balance for the simulated account
const SIM_INITIAL_BALANCE: f64 = 10_000.0;

const AUDIT_DB_PATH: &str = "leverbot.db";
const LOG_DIR: &str = "logs";

pub async fn run_bot() -> Result<(), String> {
    // Environment first: .env is optional, real env vars win
    dotenvy::dotenv().ok();

    config::load_config(is_dev_enabled()).map_err(|e| e.to_string())?;
    let config = config::get_config_clone();

    log(
        LogTag::System,
        "INFO",
        &format!(
            "Configuration loaded: broker={}, {} symbol(s), max {}x leverage, {} USDT/trade",
            config.broker_mode.as_str(),
            config.risk.symbols.len(),
            config.risk.max_leverage,
            config.risk.max_cost_per_trade
        ),
    );

    // Audit sink comes up before any trading can happen
    let db_enabled = match db::init_audit_db(AUDIT_DB_PATH) {
        Ok(()) => true,
        Err(e) => {
            log(
                LogTag::Audit,
                "ERROR",
                &format!("Session database unavailable, file log only: {}", e),
            );
            false
        }
    };
    let audit = Arc::new(AuditSink::new(LOG_DIR, db_enabled));

    // Broker and market data per mode
    let (broker, market_data): (Arc<dyn Broker>, Arc<dyn MarketDataProvider>) =
        match config.broker_mode {
            BrokerMode::Mock => {
                log(
                    LogTag::System,
                    "WARN",
                    "MOCK BROKER ACTIVE - no real orders will be placed",
                );
                let sim = Arc::new(SimulationBroker::new(SIM_INITIAL_BALANCE));
                (sim.clone(), Arc::new(SimMarketData::new(sim)))
            }
            BrokerMode::Paper | BrokerMode::Live => {
                let api: Arc<dyn ExchangeApi> = Arc::new(BinanceFutures::new(
                    config.credentials.exchange_api_key.clone().unwrap_or_default(),
                    config
                        .credentials
                        .exchange_api_secret
                        .clone()
                        .unwrap_or_default(),
                ));
                (
                    Arc::new(ExchangeBroker::new(api.clone())),
                    Arc::new(ExchangeMarketData::new(api)),
                )
            }
        };

    let positions = Arc::new(PositionManager::new(broker.clone()));
    let risk = Arc::new(RiskGuard::new(&config.risk));

    let llm: Arc<dyn LlmClient> = match llm::build_client(&config.credentials) {
        Ok(client) => client,
        Err(e) => {
            // Mock mode may run without an LLM key; cycles will record the
            // provider error until one is configured.
            log(
                LogTag::System,
                "WARN",
                &format!("{} - cycles will fail until a key is set", e),
            );
            Arc::new(OpenAiClient::new(String::new(), None, None))
        }
    };

    let search = config
        .credentials
        .search_api_key
        .clone()
        .map(|key| Arc::new(SearchClient::new(key)));
    if search.is_none() {
        log(
            LogTag::Search,
            "INFO",
            "No search API key configured, search tool disabled",
        );
    }

    let ctx = ToolContext {
        broker: broker.clone(),
        positions: positions.clone(),
        risk: risk.clone(),
        market_data,
        search,
    };

    let engine = AgentEngine::new(llm, ctx);
    let agent = Arc::new(TradingAgent::new(engine, audit, risk, config.risk.mode));

    let scheduler = Scheduler::new();
    let cycles = scheduler
        .start(
            agent,
            config.risk.symbols.clone(),
            config.risk.interval_ms,
            config.risk.jitter_ms,
            is_once_enabled(),
        )
        .await;

    print_shutdown_banner(cycles);
    Ok(())
}

fn print_shutdown_banner(cycles: u64) {
    match db::get_session_stats() {
        Ok(stats) => log(
            LogTag::System,
            "INFO",
            &format!(
                "Shutdown: {} cycle(s), {} session(s) ({} ok / {} failed), {} trade(s) recorded",
                cycles,
                stats.total_sessions,
                stats.successful_sessions,
                stats.failed_sessions,
                stats.total_trades
            ),
        ),
        Err(_) => log(
            LogTag::System,
            "INFO",
            &format!("Shutdown after {} cycle(s)", cycles),
        ),
    }
}
