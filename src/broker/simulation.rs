/// In-memory broker for mock mode and tests
///
/// Keeps a drifting mock price per symbol, a position book and a cash
/// balance. PnL realizes into the balance on close. Latency is simulated to
/// keep tool-call pacing honest; tests switch it off.
use super::Broker;
use crate::errors::BotError;
use crate::logger::{log, LogTag};
use crate::types::{
    AccountSnapshot, MarginMode, OrderRequest, OrderResult, OrderSide, Position, PositionSide,
    Symbol,
};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Simplified maintenance-margin constant for the liquidation model
const MAINTENANCE_MARGIN: f64 = 0.004;

#[derive(Debug, Clone)]
pub struct SimState {
    pub balance: f64,
    pub positions: HashMap<Symbol, Position>,
    pub prices: HashMap<Symbol, f64>,
}

impl SimState {
    fn new(initial_balance: f64) -> Self {
        let mut prices = HashMap::new();
        prices.insert(Symbol::new("BTC/USDT"), 100_000.0);
        prices.insert(Symbol::new("ETH/USDT"), 3_800.0);
        prices.insert(Symbol::new("SOL/USDT"), 180.0);
        prices.insert(Symbol::new("BNB/USDT"), 650.0);
        prices.insert(Symbol::new("DOGE/USDT"), 0.35);
        Self {
            balance: initial_balance,
            positions: HashMap::new(),
            prices,
        }
    }
}

pub struct SimulationBroker {
    state: Mutex<SimState>,
    order_counter: AtomicU64,
    simulate_latency: bool,
}

impl SimulationBroker {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            state: Mutex::new(SimState::new(initial_balance)),
            order_counter: AtomicU64::new(1),
            simulate_latency: true,
        }
    }

    /// Latency-free variant for tests
    pub fn without_latency(initial_balance: f64) -> Self {
        Self {
            state: Mutex::new(SimState::new(initial_balance)),
            order_counter: AtomicU64::new(1),
            simulate_latency: false,
        }
    }

    /// Wipe positions and reseed the balance
    pub async fn reset(&self, initial_balance: f64) {
        let mut state = self.state.lock().await;
        *state = SimState::new(initial_balance);
        log(
            LogTag::Sim,
            "INFO",
            &format!("Simulator reset, balance {} USDT", initial_balance),
        );
    }

    /// Snapshot of the whole simulator state
    pub async fn get_state(&self) -> SimState {
        self.state.lock().await.clone()
    }

    /// Pin a mock price (deterministic test setup)
    pub async fn seed_price(&self, symbol: Symbol, price: f64) {
        self.state.lock().await.prices.insert(symbol, price);
    }

    async fn simulate_delay(&self) {
        if self.simulate_latency {
            let ms = rand::thread_rng().gen_range(100..=200);
            sleep(Duration::from_millis(ms)).await;
        }
    }

    fn next_order_id(&self, prefix: &str) -> String {
        format!("sim-{}-{}", prefix, self.order_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Every touch drifts the price by ±0.5% uniform; unknown symbols get a
    /// random seed in [100, 1100).
    fn drift_price(state: &mut SimState, symbol: &Symbol) -> f64 {
        let mut rng = rand::thread_rng();
        let price = state
            .prices
            .entry(symbol.clone())
            .or_insert_with(|| rng.gen::<f64>() * 1_000.0 + 100.0);
        let drift = rng.gen_range(-0.005..=0.005);
        *price *= 1.0 + drift;
        *price
    }

    fn refresh_position_marks(state: &mut SimState) {
        let symbols: Vec<Symbol> = state.positions.keys().cloned().collect();
        for symbol in symbols {
            let mark = Self::drift_price(state, &symbol);
            if let Some(position) = state.positions.get_mut(&symbol) {
                position.mark_price = mark;
                let direction = match position.side {
                    PositionSide::Long => 1.0,
                    PositionSide::Short => -1.0,
                };
                position.unrealized_pnl =
                    (mark - position.entry_price) * position.amount * direction;
            }
        }
    }

    fn liquidation_price(entry: f64, leverage: u32, side: PositionSide) -> f64 {
        let offset = 1.0 / leverage as f64 - MAINTENANCE_MARGIN;
        match side {
            PositionSide::Long => entry * (1.0 - offset),
            PositionSide::Short => entry * (1.0 + offset),
        }
    }

    fn close_position(state: &mut SimState, symbol: &Symbol, exit_price: f64) -> Option<f64> {
        let position = state.positions.remove(symbol)?;
        let direction = match position.side {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        };
        let realized = (exit_price - position.entry_price) * position.amount * direction;
        state.balance += realized;
        log(
            LogTag::Sim,
            if realized >= 0.0 { "SUCCESS" } else { "WARN" },
            &format!(
                "Closed {} {} at {:.4}, realized {:+.4} USDT",
                position.side.as_str(),
                symbol,
                exit_price,
                realized
            ),
        );
        Some(realized)
    }
}

#[async_trait]
impl Broker for SimulationBroker {
    async fn place_order(&self, request: OrderRequest) -> OrderResult {
        if let Err(reason) = request.validate_shape() {
            return OrderResult::failure(reason);
        }

        self.simulate_delay().await;

        let mut state = self.state.lock().await;
        let last_price = Self::drift_price(&mut state, &request.symbol);

        let amount = match request.amount {
            Some(amount) => amount,
            None => {
                let cost = request.cost.unwrap_or(0.0);
                let leverage = request.leverage.unwrap_or(1) as f64;
                cost * leverage / last_price
            }
        };

        let requested_side = match request.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };

        let existing_side = state.positions.get(&request.symbol).map(|p| p.side);
        if let Some(existing_side) = existing_side {
            if existing_side != requested_side {
                // Opposite-side order closes the standing position
                Self::close_position(&mut state, &request.symbol, last_price);
                return OrderResult::ok(self.next_order_id("close"));
            }
            return OrderResult::failure(format!(
                "Position already open for {} ({})",
                request.symbol,
                existing_side.as_str()
            ));
        }

        if request.reduce_only {
            return OrderResult::failure(format!("No position to reduce for {}", request.symbol));
        }

        let leverage = request.leverage.unwrap_or(1);
        let position = Position {
            symbol: request.symbol.clone(),
            side: requested_side,
            amount,
            entry_price: last_price,
            mark_price: last_price,
            unrealized_pnl: 0.0,
            leverage,
            liquidation_price: Self::liquidation_price(last_price, leverage, requested_side),
        };

        log(
            LogTag::Sim,
            match requested_side {
                PositionSide::Long => "LONG",
                PositionSide::Short => "SHORT",
            },
            &format!(
                "Opened {} {:.8} @ {:.4} ({}x, liq {:.4})",
                request.symbol, amount, last_price, leverage, position.liquidation_price
            ),
        );
        state.positions.insert(request.symbol.clone(), position);

        let mut result = OrderResult::ok(self.next_order_id("open"));
        if let Some(stop_loss) = request.stop_loss {
            log(
                LogTag::Sim,
                "INFO",
                &format!("Stop-loss registered for {} at {:.4}", request.symbol, stop_loss),
            );
            result.stop_loss_order_id = Some(self.next_order_id("sl"));
        }
        if let Some(take_profit) = request.take_profit {
            log(
                LogTag::Sim,
                "INFO",
                &format!(
                    "Take-profit registered for {} at {:.4}",
                    request.symbol, take_profit
                ),
            );
            result.take_profit_order_id = Some(self.next_order_id("tp"));
        }
        result
    }

    async fn get_positions(&self, symbols: Option<&[Symbol]>) -> Vec<Position> {
        self.simulate_delay().await;

        let mut state = self.state.lock().await;
        Self::refresh_position_marks(&mut state);

        state
            .positions
            .values()
            .filter(|p| p.amount > 0.0)
            .filter(|p| match symbols {
                Some(wanted) => wanted.contains(&p.symbol),
                None => true,
            })
            .cloned()
            .collect()
    }

    async fn get_account_info(&self) -> AccountSnapshot {
        self.simulate_delay().await;

        let mut state = self.state.lock().await;
        Self::refresh_position_marks(&mut state);

        let used_margin: f64 = state.positions.values().map(|p| p.margin_used()).sum();
        let total_pnl: f64 = state.positions.values().map(|p| p.unrealized_pnl).sum();

        AccountSnapshot {
            balance: state.balance + total_pnl,
            used_margin,
            available_margin: (state.balance - used_margin).max(0.0),
            total_pnl,
            total_margin: state.balance,
        }
    }

    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), BotError> {
        log(
            LogTag::Sim,
            "DEBUG",
            &format!("set_leverage({}, {}x) (no-op)", symbol, leverage),
        );
        Ok(())
    }

    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), BotError> {
        log(
            LogTag::Sim,
            "DEBUG",
            &format!("set_margin_mode({}, {}) (no-op)", symbol, mode.as_str()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_long_request(cost: f64, leverage: u32) -> OrderRequest {
        OrderRequest::market_open(Symbol::new("BTC/USDT"), OrderSide::Buy, cost, leverage)
    }

    #[tokio::test]
    async fn test_open_creates_position_with_liquidation_price() {
        let broker = SimulationBroker::without_latency(10_000.0);
        broker.seed_price(Symbol::new("BTC/USDT"), 100_000.0).await;

        let result = broker.place_order(open_long_request(100.0, 5)).await;
        assert!(result.success);

        let state = broker.get_state().await;
        let position = state.positions.get(&Symbol::new("BTC/USDT")).unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.leverage, 5);
        // amount ≈ 500 / price; price drifted at most 0.5% off the seed
        assert!((position.amount - 500.0 / position.entry_price).abs() < 1e-9);
        assert!(position.liquidation_price < position.entry_price);
    }

    #[tokio::test]
    async fn test_opposite_side_order_closes() {
        let broker = SimulationBroker::without_latency(10_000.0);
        broker.place_order(open_long_request(100.0, 5)).await;

        let close = broker
            .place_order(OrderRequest::market_close(
                Symbol::new("BTC/USDT"),
                OrderSide::Sell,
                0.005,
            ))
            .await;
        assert!(close.success);

        let state = broker.get_state().await;
        assert!(state.positions.is_empty());
    }

    #[tokio::test]
    async fn test_reduce_only_without_position_fails() {
        let broker = SimulationBroker::without_latency(10_000.0);
        let result = broker
            .place_order(OrderRequest::market_close(
                Symbol::new("ETH/USDT"),
                OrderSide::Sell,
                1.0,
            ))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No position"));
    }

    #[tokio::test]
    async fn test_account_info_accounts_for_margin() {
        let broker = SimulationBroker::without_latency(10_000.0);
        broker.place_order(open_long_request(100.0, 5)).await;

        let account = broker.get_account_info().await;
        // 500 notional at 5x -> 100 USDT margin committed
        assert!((account.used_margin - 100.0).abs() < 1.0);
        assert!(account.available_margin < 10_000.0);
        assert!(
            (account.balance - (account.total_margin + account.total_pnl)).abs() < 1e-6
        );
    }

    #[tokio::test]
    async fn test_reset_restores_clean_state() {
        let broker = SimulationBroker::without_latency(10_000.0);
        broker.place_order(open_long_request(50.0, 2)).await;
        broker.reset(5_000.0).await;

        let state = broker.get_state().await;
        assert!(state.positions.is_empty());
        assert_eq!(state.balance, 5_000.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol_gets_seeded_price() {
        let broker = SimulationBroker::without_latency(10_000.0);
        let result = broker
            .place_order(OrderRequest::market_open(
                Symbol::new("PEPE/USDT"),
                OrderSide::Buy,
                10.0,
                2,
            ))
            .await;
        assert!(result.success);

        let state = broker.get_state().await;
        let price = state.prices.get(&Symbol::new("PEPE/USDT")).unwrap();
        assert!(*price > 0.0);
    }
}
