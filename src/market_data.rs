/// Market-data collaborator
///
/// The agent treats market data as an opaque pre-formatted string; indicator
/// math lives with whichever provider backs this trait. Two implementations:
/// one over the exchange ticker, one over the simulator's mock prices.
use crate::broker::SimulationBroker;
use crate::errors::BotError;
use crate::exchange::ExchangeApi;
use crate::types::Symbol;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Pre-formatted snapshot text for one instrument
    async fn snapshot(&self, symbol: &Symbol) -> Result<String, BotError>;
}

/// Live ticker snapshot from the exchange
pub struct ExchangeMarketData {
    api: Arc<dyn ExchangeApi>,
}

impl ExchangeMarketData {
    pub fn new(api: Arc<dyn ExchangeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MarketDataProvider for ExchangeMarketData {
    async fn snapshot(&self, symbol: &Symbol) -> Result<String, BotError> {
        let last = self
            .api
            .fetch_last_price(symbol)
            .await
            .map_err(BotError::Exchange)?;

        Ok(format!(
            "Market data for {} as of {}\nLast price: {} USDT",
            symbol,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            last
        ))
    }
}

/// Snapshot over the simulator's drifting mock prices
pub struct SimMarketData {
    broker: Arc<SimulationBroker>,
}

impl SimMarketData {
    pub fn new(broker: Arc<SimulationBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl MarketDataProvider for SimMarketData {
    async fn snapshot(&self, symbol: &Symbol) -> Result<String, BotError> {
        let state = self.broker.get_state().await;
        let last = state
            .prices
            .get(symbol)
            .copied()
            .ok_or_else(|| BotError::exchange(format!("No mock price for {}", symbol)))?;

        Ok(format!(
            "Market data for {} as of {} (simulated)\nLast price: {} USDT",
            symbol,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            last
        ))
    }
}
