/// Cached view of open positions
///
/// The cache reflects the broker as of the last sync. Non-forced syncs are
/// throttled by `SYNC_COOLDOWN_MS`; anything that needs post-trade state
/// calls `force_sync` first. Admission control for new opens lives here too.
use crate::arguments::is_debug_sync_enabled;
use crate::broker::Broker;
use crate::logger::{log, LogTag};
use crate::risk::RiskGuard;
use crate::types::{Position, PositionSide, Symbol};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Minimum interval between non-forced broker fetches
pub const SYNC_COOLDOWN_MS: u64 = 5_000;

/// Admission-control ceiling on concurrently open positions
pub const DEFAULT_MAX_OPEN_POSITIONS: usize = 5;

struct CacheState {
    positions: HashMap<Symbol, Position>,
    last_sync: Option<Instant>,
}

pub struct PositionManager {
    broker: Arc<dyn Broker>,
    state: RwLock<CacheState>,
    sync_cooldown_ms: u64,
}

impl PositionManager {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            state: RwLock::new(CacheState {
                positions: HashMap::new(),
                last_sync: None,
            }),
            sync_cooldown_ms: SYNC_COOLDOWN_MS,
        }
    }

    /// Custom cooldown window. Test seam.
    pub fn with_cooldown(broker: Arc<dyn Broker>, cooldown_ms: u64) -> Self {
        Self {
            broker,
            state: RwLock::new(CacheState {
                positions: HashMap::new(),
                last_sync: None,
            }),
            sync_cooldown_ms: cooldown_ms,
        }
    }

    /// Refresh from the broker unless a sync happened within the cooldown.
    pub async fn sync_positions(&self, symbols: Option<&[Symbol]>) {
        {
            let state = self.state.read().await;
            if let Some(last) = state.last_sync {
                if (last.elapsed().as_millis() as u64) < self.sync_cooldown_ms {
                    if is_debug_sync_enabled() {
                        log(
                            LogTag::Trader,
                            "DEBUG",
                            &format!(
                                "Sync skipped, {}ms since last",
                                last.elapsed().as_millis()
                            ),
                        );
                    }
                    return;
                }
            }
        }
        self.force_sync(symbols).await;
    }

    /// Refresh from the broker unconditionally. Called after every trade so
    /// the next read in the same cycle sees post-trade state.
    pub async fn force_sync(&self, symbols: Option<&[Symbol]>) {
        let fetched = self.broker.get_positions(symbols).await;

        let mut state = self.state.write().await;
        match symbols {
            Some(wanted) => {
                // Targeted sync only evicts the requested keys
                for symbol in wanted {
                    state.positions.remove(symbol);
                }
            }
            None => state.positions.clear(),
        }
        for position in fetched {
            state.positions.insert(position.symbol.clone(), position);
        }
        state.last_sync = Some(Instant::now());

        if is_debug_sync_enabled() {
            log(
                LogTag::Trader,
                "DEBUG",
                &format!("Synced, cache holds {} position(s)", state.positions.len()),
            );
        }
    }

    pub async fn get_position(&self, symbol: &Symbol) -> Option<Position> {
        self.state.read().await.positions.get(symbol).cloned()
    }

    pub async fn has_position(&self, symbol: &Symbol) -> bool {
        self.state.read().await.positions.contains_key(symbol)
    }

    pub async fn has_long_position(&self, symbol: &Symbol) -> bool {
        matches!(
            self.get_position(symbol).await,
            Some(p) if p.side == PositionSide::Long
        )
    }

    pub async fn has_short_position(&self, symbol: &Symbol) -> bool {
        matches!(
            self.get_position(symbol).await,
            Some(p) if p.side == PositionSide::Short
        )
    }

    pub async fn get_all_positions(&self) -> Vec<Position> {
        self.state.read().await.positions.values().cloned().collect()
    }

    pub async fn get_position_count(&self) -> usize {
        self.state.read().await.positions.len()
    }

    pub async fn get_total_unrealized_pnl(&self) -> f64 {
        self.state
            .read()
            .await
            .positions
            .values()
            .map(|p| p.unrealized_pnl)
            .sum()
    }

    pub async fn get_total_margin_used(&self) -> f64 {
        self.state
            .read()
            .await
            .positions
            .values()
            .map(|p| p.margin_used())
            .sum()
    }

    /// Admission control for opens: one position per symbol and a global
    /// position ceiling. Symbol eligibility itself is the risk guard's job
    /// and has already been checked by the time admission runs.
    pub async fn can_open_position(
        &self,
        symbol: &Symbol,
        _risk: &RiskGuard,
        max_positions: usize,
    ) -> bool {
        let state = self.state.read().await;
        if state.positions.contains_key(symbol) {
            return false;
        }
        state.positions.len() < max_positions
    }

    /// Loss check against the cached position: true when the unrealized loss
    /// exceeds `max_loss_percent` of the entry notional.
    pub async fn should_close_position(&self, symbol: &Symbol, max_loss_percent: f64) -> bool {
        match self.get_position(symbol).await {
            Some(p) => {
                let notional = p.amount * p.entry_price;
                p.unrealized_pnl < 0.0
                    && notional > 0.0
                    && p.unrealized_pnl.abs() / notional > max_loss_percent
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::SimulationBroker;
    use crate::config::RiskConfig;
    use crate::types::{OrderRequest, OrderSide};

    fn risk_guard() -> RiskGuard {
        RiskGuard::new(&RiskConfig::default())
    }

    async fn broker_with_btc_long() -> Arc<SimulationBroker> {
        let broker = Arc::new(SimulationBroker::without_latency(10_000.0));
        broker
            .place_order(OrderRequest::market_open(
                Symbol::new("BTC/USDT"),
                OrderSide::Buy,
                100.0,
                5,
            ))
            .await;
        broker
    }

    #[tokio::test]
    async fn test_force_sync_populates_cache() {
        let broker = broker_with_btc_long().await;
        let manager = PositionManager::new(broker.clone());

        assert_eq!(manager.get_position_count().await, 0);
        manager.force_sync(None).await;
        assert_eq!(manager.get_position_count().await, 1);
        assert!(manager.has_long_position(&Symbol::new("BTC/USDT")).await);
        assert!(!manager.has_short_position(&Symbol::new("BTC/USDT")).await);
    }

    #[tokio::test]
    async fn test_cooldown_skips_refetch() {
        let broker = broker_with_btc_long().await;
        let manager = PositionManager::new(broker.clone());

        manager.sync_positions(None).await;
        assert_eq!(manager.get_position_count().await, 1);

        // Close behind the cache's back; the throttled sync must not see it
        broker
            .place_order(OrderRequest::market_close(
                Symbol::new("BTC/USDT"),
                OrderSide::Sell,
                0.001,
            ))
            .await;
        manager.sync_positions(None).await;
        assert_eq!(manager.get_position_count().await, 1);

        // A forced sync does
        manager.force_sync(None).await;
        assert_eq!(manager.get_position_count().await, 0);
    }

    #[tokio::test]
    async fn test_targeted_sync_keeps_other_entries() {
        let broker = broker_with_btc_long().await;
        broker
            .place_order(OrderRequest::market_open(
                Symbol::new("ETH/USDT"),
                OrderSide::Buy,
                50.0,
                2,
            ))
            .await;

        let manager = PositionManager::new(broker.clone());
        manager.force_sync(None).await;
        assert_eq!(manager.get_position_count().await, 2);

        broker
            .place_order(OrderRequest::market_close(
                Symbol::new("BTC/USDT"),
                OrderSide::Sell,
                0.001,
            ))
            .await;

        let btc = [Symbol::new("BTC/USDT")];
        manager.force_sync(Some(&btc)).await;
        assert!(!manager.has_position(&Symbol::new("BTC/USDT")).await);
        assert!(manager.has_position(&Symbol::new("ETH/USDT")).await);
    }

    #[tokio::test]
    async fn test_admission_control() {
        let broker = broker_with_btc_long().await;
        let manager = PositionManager::new(broker.clone());
        manager.force_sync(None).await;
        let risk = risk_guard();

        // Symbol already holds a position
        assert!(
            !manager
                .can_open_position(&Symbol::new("BTC/USDT"), &risk, 5)
                .await
        );
        // Free symbol is admitted
        assert!(
            manager
                .can_open_position(&Symbol::new("ETH/USDT"), &risk, 5)
                .await
        );
        // Ceiling reached
        assert!(
            !manager
                .can_open_position(&Symbol::new("ETH/USDT"), &risk, 1)
                .await
        );
    }

    #[tokio::test]
    async fn test_should_close_position_threshold() {
        let broker = Arc::new(SimulationBroker::without_latency(10_000.0));
        let manager = PositionManager::new(broker.clone());

        // No position -> never close
        assert!(
            !manager
                .should_close_position(&Symbol::new("BTC/USDT"), 0.05)
                .await
        );
    }
}
