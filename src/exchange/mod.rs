/// Exchange wire contract
///
/// The broker core talks to the venue through this trait only. Everything an
/// implementation returns is already coerced to total numbers (see
/// `types::coerce_f64`); missing currencies come back as the zero triple.
use crate::errors::ExchangeError;
use crate::types::{CurrencyBalance, MarginMode, OrderSide, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod binance;

pub use binance::BinanceFutures;

/// Order types the venue must support. Stop-market and take-profit-market
/// carry a trigger price and are always reduce-only in this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

impl RawOrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawOrderType::Market => "MARKET",
            RawOrderType::Limit => "LIMIT",
            RawOrderType::StopMarket => "STOP_MARKET",
            RawOrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

/// One order as it goes over the wire
#[derive(Debug, Clone)]
pub struct RawOrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: RawOrderType,
    pub amount: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub reduce_only: bool,
}

/// Venue acknowledgement of an accepted order
#[derive(Debug, Clone)]
pub struct RawOrder {
    pub order_id: String,
    pub status: String,
    pub executed_qty: f64,
    pub avg_price: f64,
}

/// One position row from the venue
#[derive(Debug, Clone)]
pub struct RawPosition {
    pub symbol: String,
    pub contracts: f64,
    pub side: String,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
    pub leverage: u32,
    pub liquidation_price: f64,
}

/// Per-currency balances keyed by asset code
#[derive(Debug, Clone, Default)]
pub struct RawBalance {
    currencies: HashMap<String, CurrencyBalance>,
}

impl RawBalance {
    pub fn new(currencies: HashMap<String, CurrencyBalance>) -> Self {
        Self { currencies }
    }

    /// Missing currencies read as the zero triple
    pub fn currency(&self, code: &str) -> CurrencyBalance {
        self.currencies.get(code).copied().unwrap_or_default()
    }
}

/// Capability set the broker requires from its exchange collaborator
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Last traded price for the instrument
    async fn fetch_last_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError>;

    async fn create_order(&self, request: &RawOrderRequest) -> Result<RawOrder, ExchangeError>;

    async fn fetch_positions(&self, symbols: &[Symbol]) -> Result<Vec<RawPosition>, ExchangeError>;

    async fn fetch_balance(&self) -> Result<RawBalance, ExchangeError>;

    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), ExchangeError>;

    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), ExchangeError>;
}
