/// Runtime configuration loaded from the environment
///
/// `load_config()` is called once at startup; everything afterwards reads the
/// global via `with_config` / `get_config_clone`. Tests install their own
/// config with `init_config_for_tests`.
use crate::errors::{BotError, ConfigurationError};
use crate::types::Symbol;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::RwLock;

/// Hard ceiling on leverage regardless of environment overrides
pub const LEVERAGE_HARD_CAP: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Live => "live",
        }
    }
}

/// Which broker implementation backs the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    Mock,
    Paper,
    Live,
}

impl BrokerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerMode::Mock => "mock",
            BrokerMode::Paper => "paper",
            BrokerMode::Live => "live",
        }
    }
}

/// Risk limits and scheduling parameters. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub mode: TradingMode,
    pub max_leverage: u32,
    pub max_cost_per_trade: f64,
    pub symbol_whitelist: Vec<Symbol>,
    pub slippage_tolerance: f64,
    pub default_stop_loss_percent: f64,
    pub default_take_profit_percent: f64,
    pub cooldown_ms: u64,
    pub interval_ms: u64,
    pub jitter_ms: u64,
    pub symbols: Vec<Symbol>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Paper,
            max_leverage: 10,
            max_cost_per_trade: 100.0,
            symbol_whitelist: parse_symbol_csv("BTC/USDT,ETH/USDT,SOL/USDT"),
            slippage_tolerance: 0.01,
            default_stop_loss_percent: 0.05,
            default_take_profit_percent: 0.10,
            cooldown_ms: 300_000,
            interval_ms: 300_000,
            jitter_ms: 15_000,
            symbols: parse_symbol_csv("BTC/USDT,ETH/USDT"),
        }
    }
}

/// Provider credentials. Only required outside mock mode.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub exchange_api_key: Option<String>,
    pub exchange_api_secret: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub search_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub risk: RiskConfig,
    pub broker_mode: BrokerMode,
    pub credentials: Credentials,
}

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Load configuration from the environment and initialize the global CONFIG.
///
/// `force_mock` (the `--dev` flag) overrides any BROKER_MODE/TRADING_MODE
/// setting. Credential presence is validated here for non-mock modes.
pub fn load_config(force_mock: bool) -> Result<(), BotError> {
    let config = build_config_from_env(force_mock)?;
    validate_credentials(&config)?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| BotError::configuration("Configuration already loaded"))?;
    Ok(())
}

/// Read a value out of the global config
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let lock = CONFIG
        .get()
        .expect("config accessed before load_config()");
    let guard = lock.read().expect("config lock poisoned");
    f(&guard)
}

/// Clone the whole config (use `with_config` for simple reads)
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Install a config directly, bypassing the environment. Test-only seam.
pub fn init_config_for_tests(config: Config) {
    let _ = CONFIG.set(RwLock::new(config));
}

fn build_config_from_env(force_mock: bool) -> Result<Config, BotError> {
    let defaults = RiskConfig::default();

    let mode = match env_str("TRADING_MODE").as_deref() {
        None | Some("paper") => TradingMode::Paper,
        Some("live") => TradingMode::Live,
        Some(other) => {
            return Err(BotError::Configuration(ConfigurationError::InvalidValue {
                field: "TRADING_MODE".to_string(),
                value: other.to_string(),
                reason: "expected paper or live".to_string(),
            }))
        }
    };

    let broker_mode = if force_mock {
        BrokerMode::Mock
    } else {
        match env_str("BROKER_MODE").as_deref() {
            Some("mock") => BrokerMode::Mock,
            Some("paper") => BrokerMode::Paper,
            Some("live") => BrokerMode::Live,
            Some(other) => {
                return Err(BotError::Configuration(ConfigurationError::InvalidValue {
                    field: "BROKER_MODE".to_string(),
                    value: other.to_string(),
                    reason: "expected mock, paper or live".to_string(),
                }))
            }
            // Derived from the trading mode when not set explicitly
            None => match mode {
                TradingMode::Paper => BrokerMode::Paper,
                TradingMode::Live => BrokerMode::Live,
            },
        }
    };

    let max_leverage = env_parse("MAX_LEVERAGE", defaults.max_leverage).min(LEVERAGE_HARD_CAP);
    if max_leverage < 1 {
        return Err(BotError::Configuration(ConfigurationError::InvalidValue {
            field: "MAX_LEVERAGE".to_string(),
            value: max_leverage.to_string(),
            reason: "must be at least 1".to_string(),
        }));
    }

    let max_cost_per_trade = env_parse("MAX_COST_PER_TRADE", defaults.max_cost_per_trade);
    if max_cost_per_trade <= 0.0 {
        return Err(BotError::Configuration(ConfigurationError::InvalidValue {
            field: "MAX_COST_PER_TRADE".to_string(),
            value: max_cost_per_trade.to_string(),
            reason: "must be positive".to_string(),
        }));
    }

    let risk = RiskConfig {
        mode,
        max_leverage,
        max_cost_per_trade,
        symbol_whitelist: env_str("SYMBOL_WHITELIST")
            .map(|csv| parse_symbol_csv(&csv))
            .unwrap_or(defaults.symbol_whitelist),
        slippage_tolerance: env_parse("SLIPPAGE_TOLERANCE", defaults.slippage_tolerance),
        default_stop_loss_percent: env_parse(
            "DEFAULT_STOP_LOSS_PERCENT",
            defaults.default_stop_loss_percent,
        ),
        default_take_profit_percent: env_parse(
            "DEFAULT_TAKE_PROFIT_PERCENT",
            defaults.default_take_profit_percent,
        ),
        cooldown_ms: env_parse("COOLDOWN_MS", defaults.cooldown_ms),
        interval_ms: env_parse("INTERVAL_MS", defaults.interval_ms),
        jitter_ms: env_parse("JITTER_MS", defaults.jitter_ms),
        symbols: env_str("SYMBOLS")
            .map(|csv| parse_symbol_csv(&csv))
            .unwrap_or(defaults.symbols),
    };

    let credentials = Credentials {
        exchange_api_key: env_str("BINANCE_API_KEY"),
        exchange_api_secret: env_str("BINANCE_API_SECRET"),
        llm_api_key: env_str("OPENAI_API_KEY"),
        llm_base_url: env_str("OPENAI_BASE_URL"),
        llm_model: env_str("OPENAI_MODEL"),
        search_api_key: env_str("TAVILY_API_KEY"),
    };

    Ok(Config {
        risk,
        broker_mode,
        credentials,
    })
}

/// Non-mock modes need exchange and LLM credentials before startup proceeds
fn validate_credentials(config: &Config) -> Result<(), BotError> {
    if config.broker_mode == BrokerMode::Mock {
        return Ok(());
    }

    let mode = config.broker_mode.as_str().to_string();
    let creds = &config.credentials;

    if creds.exchange_api_key.is_none() || creds.exchange_api_secret.is_none() {
        return Err(BotError::Configuration(
            ConfigurationError::MissingCredential {
                name: "BINANCE_API_KEY / BINANCE_API_SECRET".to_string(),
                mode,
            },
        ));
    }
    if creds.llm_api_key.is_none() {
        return Err(BotError::Configuration(
            ConfigurationError::MissingCredential {
                name: "OPENAI_API_KEY".to_string(),
                mode,
            },
        ));
    }
    Ok(())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_str(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_symbol_csv(csv: &str) -> Vec<Symbol> {
    csv.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(Symbol::new)
        .collect()
}
