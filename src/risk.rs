/// Stateless pre-trade validation
///
/// Every proposed opening order passes through here before any broker call.
/// The guard holds an immutable copy of the risk limits; rejections carry a
/// reason string the LLM can act on.
use crate::config::RiskConfig;
use crate::errors::ValidationError;
use crate::logger::{log, LogTag};
use crate::types::Symbol;

#[derive(Debug, Clone)]
pub struct RiskGuard {
    max_leverage: u32,
    max_cost_per_trade: f64,
    whitelist: Vec<Symbol>,
}

impl RiskGuard {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            max_leverage: config.max_leverage,
            max_cost_per_trade: config.max_cost_per_trade,
            whitelist: config.symbol_whitelist.clone(),
        }
    }

    /// Validate a proposed open. Order of checks: whitelist, leverage, cost.
    pub fn validate(&self, symbol: &Symbol, cost: f64, leverage: u32) -> Result<(), ValidationError> {
        if !self.whitelist.contains(symbol) {
            let rejection = ValidationError::SymbolNotWhitelisted {
                symbol: symbol.to_string(),
                allowed: self.whitelist.iter().map(|s| s.to_string()).collect(),
            };
            log(LogTag::Risk, "WARN", &format!("Rejected: {}", rejection));
            return Err(rejection);
        }

        if leverage < 1 || leverage > self.max_leverage {
            let rejection = ValidationError::LeverageOutOfRange {
                leverage,
                max: self.max_leverage,
            };
            log(LogTag::Risk, "WARN", &format!("Rejected: {}", rejection));
            return Err(rejection);
        }

        if cost <= 0.0 || cost > self.max_cost_per_trade {
            let rejection = ValidationError::CostOutOfRange {
                cost,
                max: self.max_cost_per_trade,
            };
            log(LogTag::Risk, "WARN", &format!("Rejected: {}", rejection));
            return Err(rejection);
        }

        Ok(())
    }

    // Read-only accessors used to render constraints into the system prompt

    pub fn max_leverage(&self) -> u32 {
        self.max_leverage
    }

    pub fn max_cost_per_trade(&self) -> f64 {
        self.max_cost_per_trade
    }

    pub fn whitelist(&self) -> &[Symbol] {
        &self.whitelist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;

    fn guard() -> RiskGuard {
        let config = RiskConfig {
            max_leverage: 10,
            max_cost_per_trade: 100.0,
            symbol_whitelist: vec![Symbol::new("BTC/USDT"), Symbol::new("ETH/USDT")],
            ..RiskConfig::default()
        };
        RiskGuard::new(&config)
    }

    #[test]
    fn test_accepts_valid_order() {
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 50.0, 5).is_ok());
    }

    #[test]
    fn test_rejects_unlisted_symbol() {
        let err = guard()
            .validate(&Symbol::new("DOGE/USDT"), 10.0, 2)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("DOGE/USDT"));
        assert!(msg.contains("BTC/USDT"));
    }

    #[test]
    fn test_rejects_leverage_out_of_range() {
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 50.0, 11).is_err());
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 50.0, 0).is_err());
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 50.0, 10).is_ok());
    }

    #[test]
    fn test_rejects_cost_out_of_range() {
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 0.0, 5).is_err());
        assert!(guard().validate(&Symbol::new("BTC/USDT"), -1.0, 5).is_err());
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 100.5, 5).is_err());
        assert!(guard().validate(&Symbol::new("BTC/USDT"), 100.0, 5).is_ok());
    }

    #[test]
    fn test_symbol_normalization_applies() {
        // Bare base asset normalizes to /USDT before the whitelist check
        assert!(guard().validate(&Symbol::new("BTC"), 50.0, 5).is_ok());
    }
}
