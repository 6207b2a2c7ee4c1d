use serde::{Deserialize, Serialize};

// =============================================================================
// SYMBOL
// =============================================================================

/// Normalized instrument identifier (`BASE/QUOTE`, e.g. `BTC/USDT`).
///
/// A bare base asset gets `/USDT` appended. Exchange-specific settlement
/// suffixes (`:USDC`) are preserved as-is. Equality and hashing are on the
/// normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains('/') {
            Symbol(trimmed.to_uppercase())
        } else {
            Symbol(format!("{}/USDT", trimmed.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base asset, e.g. `BTC` for `BTC/USDT:USDC`
    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }

    /// Quote asset without any settlement suffix
    pub fn quote(&self) -> &str {
        self.0
            .split('/')
            .nth(1)
            .map(|q| q.split(':').next().unwrap_or(q))
            .unwrap_or("USDT")
    }

    /// Separator-free form used in exchange REST paths, e.g. `BTCUSDT`
    pub fn exchange_id(&self) -> String {
        let without_suffix = self.0.split(':').next().unwrap_or(&self.0);
        without_suffix.replace('/', "")
    }

    /// Form safe for filenames: `/` replaced by `-`
    pub fn file_safe(&self) -> String {
        self.0.replace('/', "-")
    }

    /// Rebuild a normalized symbol from a separator-free exchange id
    /// (`BTCUSDT` → `BTC/USDT`). Unknown quotes pass through untouched.
    pub fn from_exchange_id(id: &str) -> Self {
        let upper = id.to_uppercase();
        for quote in ["USDT", "USDC", "BUSD", "USD"] {
            if let Some(base) = upper.strip_suffix(quote) {
                if !base.is_empty() {
                    return Symbol(format!("{}/{}", base, quote));
                }
            }
        }
        Symbol(upper)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

// =============================================================================
// ORDER MODEL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::Isolated => "ISOLATED",
            MarginMode::Cross => "CROSSED",
        }
    }
}

/// A single order as submitted to a broker.
///
/// Either `amount` is given directly, or `cost` plus `leverage` and the
/// broker sizes the order from the last price. Protective prices are only
/// legal on opening orders (`reduce_only == false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub reduce_only: bool,
}

impl OrderRequest {
    /// Market open sized by cost and leverage
    pub fn market_open(symbol: Symbol, side: OrderSide, cost: f64, leverage: u32) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            amount: None,
            cost: Some(cost),
            price: None,
            leverage: Some(leverage),
            stop_loss: None,
            take_profit: None,
            reduce_only: false,
        }
    }

    /// Reduce-only market close of a known size
    pub fn market_close(symbol: Symbol, side: OrderSide, amount: f64) -> Self {
        Self {
            symbol,
            side,
            order_type: OrderType::Market,
            amount: Some(amount),
            cost: None,
            price: None,
            leverage: None,
            stop_loss: None,
            take_profit: None,
            reduce_only: true,
        }
    }

    pub fn with_protection(mut self, stop_loss: Option<f64>, take_profit: Option<f64>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }

    /// Structural validity independent of any risk limits
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.amount.is_none() && (self.cost.is_none() || self.leverage.is_none()) {
            return Err("order needs either amount or cost+leverage".to_string());
        }
        if self.order_type == OrderType::Limit && self.price.is_none() {
            return Err("limit order needs a price".to_string());
        }
        if self.reduce_only && (self.stop_loss.is_some() || self.take_profit.is_some()) {
            return Err("reduce-only orders cannot carry protective prices".to_string());
        }
        Ok(())
    }
}

/// Outcome of a `place_order` call.
///
/// `success == true` means the main order was accepted AND every required
/// protective order exists. `critical == true` flags an unprotected position
/// that could not be rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub critical: bool,
}

impl OrderResult {
    pub fn ok(order_id: String) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            stop_loss_order_id: None,
            take_profit_order_id: None,
            error: None,
            critical: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            stop_loss_order_id: None,
            take_profit_order_id: None,
            error: Some(error.into()),
            critical: false,
        }
    }

    pub fn critical(error: impl Into<String>, main_order_id: Option<String>) -> Self {
        Self {
            success: false,
            order_id: main_order_id,
            stop_loss_order_id: None,
            take_profit_order_id: None,
            error: Some(error.into()),
            critical: true,
        }
    }
}

// =============================================================================
// POSITIONS & ACCOUNT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }

    /// Order side that closes a position on this side
    pub fn closing_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }

    /// Order side that opens a position on this side
    pub fn opening_order_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }
}

/// An open directional exposure. At most one per symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub amount: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
    pub leverage: u32,
    pub liquidation_price: f64,
}

impl Position {
    /// Margin committed to this position
    pub fn margin_used(&self) -> f64 {
        if self.leverage == 0 {
            return 0.0;
        }
        self.amount * self.entry_price / self.leverage as f64
    }

    /// Notional value at entry
    pub fn notional(&self) -> f64 {
        self.amount * self.entry_price
    }
}

/// Account state as reported by the broker.
/// `balance = available_margin + used_margin + Σ unrealized_pnl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub used_margin: f64,
    pub available_margin: f64,
    pub total_pnl: f64,
    pub total_margin: f64,
}

impl AccountSnapshot {
    pub fn zeroed() -> Self {
        Self {
            balance: 0.0,
            used_margin: 0.0,
            available_margin: 0.0,
            total_pnl: 0.0,
            total_margin: 0.0,
        }
    }
}

/// Per-currency balance triple from the exchange
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CurrencyBalance {
    pub free: f64,
    pub used: f64,
    pub total: f64,
}

// =============================================================================
// NUMERIC COERCION
// =============================================================================

/// Exchange payloads carry numbers as strings or loosely-typed JSON. Coerce
/// anything non-finite or missing to 0.0 so downstream PnL math stays total.
pub fn coerce_f64(value: Option<&serde_json::Value>) -> f64 {
    let parsed = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}
