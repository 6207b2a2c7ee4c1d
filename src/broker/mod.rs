/// Broker abstraction
///
/// One capability set over the production exchange broker and the in-memory
/// simulator. Everything downstream (position manager, tools, agent) holds an
/// `Arc<dyn Broker>` and never learns which variant is behind it.
use crate::errors::BotError;
use crate::types::{AccountSnapshot, MarginMode, OrderRequest, OrderResult, Position, Symbol};
use async_trait::async_trait;
use std::time::Duration;

pub mod exchange;
pub mod simulation;

pub use exchange::ExchangeBroker;
pub use simulation::SimulationBroker;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Place an order, including the full protected-order protocol for opens
    /// that carry stop-loss / take-profit prices. Never panics; every outcome
    /// is expressed in the returned `OrderResult`.
    async fn place_order(&self, request: OrderRequest) -> OrderResult;

    /// Open positions with non-zero amounts. Unknown symbols yield nothing;
    /// transient fetch errors degrade to an empty list.
    async fn get_positions(&self, symbols: Option<&[Symbol]>) -> Vec<Position>;

    /// Account balances and margin. Transient errors degrade to zeros.
    async fn get_account_info(&self) -> AccountSnapshot;

    /// Idempotent; an already-set warning from the venue is non-fatal.
    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), BotError>;

    /// Idempotent; re-setting the current mode is non-fatal.
    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), BotError>;
}

/// Linear retry schedule for protective orders: attempt `i` is followed by a
/// wait of `i * base` before the next try; the first attempt has no pre-wait.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn linear() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            max_attempts: 3,
        }
    }

    /// Same attempt count with zero waits. Test seam.
    pub fn immediate() -> Self {
        Self {
            base: Duration::ZERO,
            max_attempts: 3,
        }
    }

    /// Wait inserted after a failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base * attempt
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::linear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_schedule() {
        let policy = BackoffPolicy::linear();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2_000));
    }

    #[test]
    fn test_immediate_backoff_keeps_attempts() {
        let policy = BackoffPolicy::immediate();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_after(2), Duration::ZERO);
    }
}
