//! End-to-end tool-bridge and scheduler scenarios over the simulator

use async_trait::async_trait;
use leverbot::ai::tools::{PlaceOrderTool, Tool, ToolContext};
use leverbot::ai::{AgentEngine, TradingAgent};
use leverbot::apis::llm::{
    ChatRequest, ChatResponse, LlmClient, ToolCallRequest, Usage,
};
use leverbot::audit::{db, AuditSink, TradingSession};
use leverbot::broker::{Broker, SimulationBroker};
use leverbot::config::{RiskConfig, TradingMode};
use leverbot::errors::{BotError, LlmError};
use leverbot::market_data::SimMarketData;
use leverbot::positions::PositionManager;
use leverbot::risk::RiskGuard;
use leverbot::scheduler::Scheduler;
use leverbot::types::{
    AccountSnapshot, MarginMode, OrderRequest, OrderResult, Position, PositionSide, Symbol,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Test doubles
// ============================================================================

/// Broker wrapper that counts calls going through to the simulator
struct CountingBroker {
    inner: SimulationBroker,
    position_fetches: AtomicUsize,
    orders_placed: AtomicUsize,
}

impl CountingBroker {
    fn new() -> Self {
        Self {
            inner: SimulationBroker::without_latency(10_000.0),
            position_fetches: AtomicUsize::new(0),
            orders_placed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Broker for CountingBroker {
    async fn place_order(&self, request: OrderRequest) -> OrderResult {
        self.orders_placed.fetch_add(1, Ordering::SeqCst);
        self.inner.place_order(request).await
    }

    async fn get_positions(&self, symbols: Option<&[Symbol]>) -> Vec<Position> {
        self.position_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.get_positions(symbols).await
    }

    async fn get_account_info(&self) -> AccountSnapshot {
        self.inner.get_account_info().await
    }

    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), BotError> {
        self.inner.set_leverage(symbol, leverage).await
    }

    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), BotError> {
        self.inner.set_margin_mode(symbol, mode).await
    }
}

/// LLM stub that replays a scripted sequence of responses
struct ScriptedLlm {
    responses: Mutex<VecDeque<ChatResponse>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    fn final_text(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            tool_calls: Vec::new(),
            usage: Usage::default(),
            model: "scripted".to_string(),
        }
    }

    fn tool_call(name: &str, arguments: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: format!("call-{}", name),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            usage: Usage::default(),
            model: "scripted".to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn call(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedLlm::final_text("done")))
    }
}

/// LLM stub whose every call panics; exercises cycle isolation
struct PanickingLlm;

#[async_trait]
impl LlmClient for PanickingLlm {
    fn provider(&self) -> &'static str {
        "panicking"
    }

    fn model(&self) -> &str {
        "panicking"
    }

    async fn call(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
        panic!("scripted panic");
    }
}

struct Harness {
    sim: Arc<SimulationBroker>,
    broker: Arc<dyn Broker>,
    positions: Arc<PositionManager>,
    risk: Arc<RiskGuard>,
}

impl Harness {
    async fn new(whitelist: &[&str]) -> Self {
        let sim = Arc::new(SimulationBroker::without_latency(10_000.0));
        sim.seed_price(Symbol::new("BTC/USDT"), 100_000.0).await;

        let config = RiskConfig {
            symbol_whitelist: whitelist.iter().map(|s| Symbol::new(s)).collect(),
            ..RiskConfig::default()
        };

        Self {
            sim: sim.clone(),
            broker: sim.clone(),
            positions: Arc::new(PositionManager::new(sim)),
            risk: Arc::new(RiskGuard::new(&config)),
        }
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            broker: self.broker.clone(),
            positions: self.positions.clone(),
            risk: self.risk.clone(),
            market_data: Arc::new(SimMarketData::new(self.sim.clone())),
            search: None,
        }
    }

    fn temp_log_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("leverbot-test-{}-{}", tag, std::process::id()))
    }
}

// ============================================================================
// Scenario: open long with stop-loss
// ============================================================================

#[tokio::test]
async fn open_long_with_stop_loss_creates_protected_position() {
    let harness = Harness::new(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]).await;
    let ctx = harness.tool_context();

    let result = PlaceOrderTool
        .execute(
            &ctx,
            json!({
                "symbol": "BTC/USDT",
                "action": "open_long",
                "cost": 100.0,
                "leverage": 5,
                "stop_loss": 95000.0
            }),
        )
        .await;

    let out = result.to_json();
    assert_eq!(out["success"], true, "got: {}", out);
    assert!(out["stop_loss_order_id"].is_string());

    // Tool force-synced, so the cache already reflects the trade
    let position = harness
        .positions
        .get_position(&Symbol::new("BTC/USDT"))
        .await
        .expect("position should be cached");
    assert_eq!(position.side, PositionSide::Long);
    assert_eq!(position.leverage, 5);
    // Notional = cost * leverage; entry drifted at most 0.5% off the seed
    assert!((position.amount * position.entry_price - 500.0).abs() < 1e-6);
}

// ============================================================================
// Scenario: risk guard rejection
// ============================================================================

#[tokio::test]
async fn rejected_symbol_never_reaches_the_broker() {
    let counting = Arc::new(CountingBroker::new());
    let config = RiskConfig {
        symbol_whitelist: vec![Symbol::new("BTC/USDT")],
        ..RiskConfig::default()
    };

    let ctx = ToolContext {
        broker: counting.clone(),
        positions: Arc::new(PositionManager::new(counting.clone())),
        risk: Arc::new(RiskGuard::new(&config)),
        market_data: Arc::new(SimMarketData::new(Arc::new(
            SimulationBroker::without_latency(1.0),
        ))),
        search: None,
    };

    let result = PlaceOrderTool
        .execute(
            &ctx,
            json!({
                "symbol": "DOGE/USDT",
                "action": "open_long",
                "cost": 10.0,
                "leverage": 2
            }),
        )
        .await;

    let out = result.to_json();
    assert_eq!(out["success"], false);
    assert_eq!(out["rejected"], true);
    assert_eq!(counting.orders_placed.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.positions.get_position_count().await, 0);
}

// ============================================================================
// Scenario: close without a position
// ============================================================================

#[tokio::test]
async fn close_long_without_position_errors_without_broker_call() {
    let counting = Arc::new(CountingBroker::new());
    let config = RiskConfig::default();

    let ctx = ToolContext {
        broker: counting.clone(),
        positions: Arc::new(PositionManager::new(counting.clone())),
        risk: Arc::new(RiskGuard::new(&config)),
        market_data: Arc::new(SimMarketData::new(Arc::new(
            SimulationBroker::without_latency(1.0),
        ))),
        search: None,
    };

    let result = PlaceOrderTool
        .execute(&ctx, json!({ "symbol": "ETH/USDT", "action": "close_long" }))
        .await;

    let out = result.to_json();
    assert_eq!(out["success"], false);
    assert!(
        out["error"].as_str().unwrap().contains("No long position"),
        "got: {}",
        out
    );
    assert_eq!(counting.orders_placed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn closing_action_rejects_protective_prices() {
    let harness = Harness::new(&["BTC/USDT"]).await;
    let ctx = harness.tool_context();

    let result = PlaceOrderTool
        .execute(
            &ctx,
            json!({
                "symbol": "BTC/USDT",
                "action": "close_long",
                "stop_loss": 90000.0
            }),
        )
        .await;

    let out = result.to_json();
    assert_eq!(out["success"], false);
    assert!(out["error"].as_str().unwrap().contains("protective"));
}

// ============================================================================
// Scenario: sync cooldown
// ============================================================================

#[tokio::test]
async fn sync_cooldown_coalesces_rapid_syncs() {
    let counting = Arc::new(CountingBroker::new());
    let manager = PositionManager::new(counting.clone());

    let symbols = [Symbol::new("BTC/USDT")];
    manager.sync_positions(Some(&symbols)).await;
    manager.sync_positions(Some(&symbols)).await;

    assert_eq!(counting.position_fetches.load(Ordering::SeqCst), 1);

    // A forced sync still goes through
    manager.force_sync(Some(&symbols)).await;
    assert_eq!(counting.position_fetches.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Agent cycle + audit records
// ============================================================================

#[tokio::test]
async fn agent_cycle_writes_one_session_with_trades() {
    let harness = Harness::new(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]).await;

    let llm = Arc::new(ScriptedLlm::new(vec![
        ScriptedLlm::tool_call(
            "place_order",
            json!({
                "symbol": "BTC/USDT",
                "action": "open_long",
                "cost": 100.0,
                "leverage": 5,
                "stop_loss": 95000.0
            }),
        ),
        ScriptedLlm::final_text("Opened a protected long on BTC."),
    ]));

    let log_dir = Harness::temp_log_dir("agent");
    let audit = Arc::new(AuditSink::new(&log_dir, false));
    let engine = AgentEngine::new(llm, harness.tool_context());
    let agent = TradingAgent::new(engine, audit, harness.risk.clone(), TradingMode::Paper);

    agent.process_symbol(&Symbol::new("BTC/USDT")).await;

    // Exactly one session file for the cycle
    let mut session_files = Vec::new();
    for day_dir in std::fs::read_dir(&log_dir).unwrap() {
        for file in std::fs::read_dir(day_dir.unwrap().path()).unwrap() {
            session_files.push(file.unwrap().path());
        }
    }
    assert_eq!(session_files.len(), 1);

    let session: TradingSession =
        serde_json::from_str(&std::fs::read_to_string(&session_files[0]).unwrap()).unwrap();
    assert!(session.success);
    assert_eq!(session.symbol, Symbol::new("BTC/USDT"));
    assert_eq!(session.tool_calls.len(), 1);
    assert_eq!(session.trades.len(), 1);
    assert!(session.reasoning.contains("protected long"));

    // And the position really exists
    assert!(
        harness
            .positions
            .has_long_position(&Symbol::new("BTC/USDT"))
            .await
    );

    let _ = std::fs::remove_dir_all(&log_dir);
}

#[tokio::test]
async fn failed_llm_cycle_still_writes_a_session() {
    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        fn provider(&self) -> &'static str {
            "failing"
        }
        fn model(&self) -> &str {
            "failing"
        }
        async fn call(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::Generic {
                message: "provider unavailable".to_string(),
            })
        }
    }

    let harness = Harness::new(&["BTC/USDT"]).await;
    let log_dir = Harness::temp_log_dir("failed-cycle");
    let audit = Arc::new(AuditSink::new(&log_dir, false));
    let engine = AgentEngine::new(Arc::new(FailingLlm), harness.tool_context());
    let agent = TradingAgent::new(engine, audit, harness.risk.clone(), TradingMode::Paper);

    agent.process_symbol(&Symbol::new("BTC/USDT")).await;

    let mut session_files = Vec::new();
    for day_dir in std::fs::read_dir(&log_dir).unwrap() {
        for file in std::fs::read_dir(day_dir.unwrap().path()).unwrap() {
            session_files.push(file.unwrap().path());
        }
    }
    assert_eq!(session_files.len(), 1);

    let session: TradingSession =
        serde_json::from_str(&std::fs::read_to_string(&session_files[0]).unwrap()).unwrap();
    assert!(!session.success);
    assert!(session.error.unwrap().contains("provider unavailable"));

    let _ = std::fs::remove_dir_all(&log_dir);
}

#[tokio::test]
async fn relational_log_maps_symbols_and_operations() {
    db::init_audit_db_in_memory().unwrap();

    let session = TradingSession {
        symbol: Symbol::new("BTC/USDT"),
        start_time: chrono::Utc::now(),
        end_time: chrono::Utc::now(),
        prompt: "cycle".to_string(),
        reasoning: "bought".to_string(),
        tool_calls: Vec::new(),
        success: true,
        error: None,
        trades: vec![
            leverbot::audit::TradeRecord {
                symbol: Symbol::new("BTC/USDT"),
                operation: leverbot::audit::Operation::normalize("open_long"),
                leverage: Some(5),
                amount: None,
                pricing: Some(100.0),
                stop_loss: Some(95_000.0),
                take_profit: None,
            },
            // Unmapped trade symbol is skipped with a warning, not an error
            leverbot::audit::TradeRecord {
                symbol: Symbol::new("PEPE/USDT"),
                operation: leverbot::audit::Operation::normalize("sell"),
                leverage: None,
                amount: None,
                pricing: None,
                stop_loss: None,
                take_profit: None,
            },
        ],
    };

    let session_id = db::insert_session(&session).unwrap();
    assert!(session_id > 0);
    assert_eq!(db::count_sessions_for("BTC").unwrap(), 1);

    let stats = db::get_session_stats().unwrap();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.successful_sessions, 1);
    assert_eq!(stats.total_trades, 1);

    // Unmapped session symbol is refused at the audit layer
    let unmapped = TradingSession {
        symbol: Symbol::new("PEPE/USDT"),
        trades: Vec::new(),
        ..session
    };
    assert!(db::insert_session(&unmapped).is_err());
    let stats = db::get_session_stats().unwrap();
    assert_eq!(stats.total_sessions, 1);
}

// ============================================================================
// Scheduler behavior
// ============================================================================

fn quiet_agent(harness: &Harness, llm: Arc<dyn LlmClient>, tag: &str) -> Arc<TradingAgent> {
    let audit = Arc::new(AuditSink::new(Harness::temp_log_dir(tag), false));
    let engine = AgentEngine::new(llm, harness.tool_context());
    Arc::new(TradingAgent::new(
        engine,
        audit,
        harness.risk.clone(),
        TradingMode::Paper,
    ))
}

#[tokio::test]
async fn once_mode_runs_exactly_one_cycle() {
    let harness = Harness::new(&["BTC/USDT"]).await;
    let llm = Arc::new(ScriptedLlm::new(vec![ScriptedLlm::final_text("hold")]));
    let agent = quiet_agent(&harness, llm, "once");

    let scheduler = Scheduler::new();
    let cycles = scheduler
        .start(agent, vec![Symbol::new("BTC/USDT")], 50, 0, true)
        .await;

    assert_eq!(cycles, 1);
    assert_eq!(scheduler.run_count(), 1);
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn scheduler_keeps_ticking_across_cycles() {
    let harness = Harness::new(&["BTC/USDT"]).await;
    // Every call holds, so cycles are fast
    let llm = Arc::new(ScriptedLlm::new(Vec::new()));
    let agent = quiet_agent(&harness, llm, "ticking");

    let scheduler = Arc::new(Scheduler::new());
    let task_scheduler = scheduler.clone();
    let task = tokio::spawn(async move {
        task_scheduler
            .start(agent, vec![Symbol::new("BTC/USDT")], 40, 0, false)
            .await
    });

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    task.abort();
    let _ = task.await;

    assert!(
        scheduler.run_count() >= 3,
        "expected at least 3 cycles, got {}",
        scheduler.run_count()
    );
}

#[tokio::test]
async fn panicking_cycle_does_not_poison_the_scheduler() {
    let harness = Harness::new(&["BTC/USDT"]).await;
    let agent = quiet_agent(&harness, Arc::new(PanickingLlm), "panic");

    let scheduler = Scheduler::new();
    // The panic is confined to the cycle task; start() returns normally
    let cycles = scheduler
        .start(agent, vec![Symbol::new("BTC/USDT")], 50, 0, true)
        .await;

    assert_eq!(cycles, 1);
    assert!(!scheduler.is_running());
}
