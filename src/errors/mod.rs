/// Structured error types for leverbot
///
/// One top-level enum per failure domain; every variant carries the context
/// needed to log it without reaching back into the caller.

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone)]
pub enum BotError {
    // Exchange connectivity and order placement
    Exchange(ExchangeError),

    // Risk guard and parameter validation
    Validation(ValidationError),

    // Protected-order protocol outcomes
    Protection(ProtectionError),

    // LLM provider issues
    Llm(LlmError),

    // Configuration / startup errors
    Configuration(ConfigurationError),

    // Audit persistence errors (never propagate past the sink)
    Audit(AuditError),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Exchange(e) => write!(f, "Exchange Error: {}", e),
            BotError::Validation(e) => write!(f, "Validation Error: {}", e),
            BotError::Protection(e) => write!(f, "Protection Error: {}", e),
            BotError::Llm(e) => write!(f, "LLM Error: {}", e),
            BotError::Configuration(e) => write!(f, "Configuration Error: {}", e),
            BotError::Audit(e) => write!(f, "Audit Error: {}", e),
        }
    }
}

impl std::error::Error for BotError {}

// =============================================================================
// EXCHANGE ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ExchangeError {
    HttpStatus {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    OrderRejected {
        symbol: String,
        reason: String,
    },
    TickerUnavailable {
        symbol: String,
        reason: String,
    },
    RateLimited {
        retry_after_ms: Option<u64>,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::HttpStatus {
                endpoint,
                status,
                body,
            } => {
                write!(
                    f,
                    "HTTP {} from {}: {}",
                    status,
                    endpoint,
                    body.as_deref().unwrap_or("No body")
                )
            }
            ExchangeError::OrderRejected { symbol, reason } => {
                write!(f, "Order rejected for {}: {}", symbol, reason)
            }
            ExchangeError::TickerUnavailable { symbol, reason } => {
                write!(f, "No ticker for {}: {}", symbol, reason)
            }
            ExchangeError::RateLimited { retry_after_ms } => match retry_after_ms {
                Some(ms) => write!(f, "Rate limited, retry after {}ms", ms),
                None => write!(f, "Rate limited"),
            },
            ExchangeError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// VALIDATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ValidationError {
    SymbolNotWhitelisted {
        symbol: String,
        allowed: Vec<String>,
    },
    LeverageOutOfRange {
        leverage: u32,
        max: u32,
    },
    CostOutOfRange {
        cost: f64,
        max: f64,
    },
    MissingParameter {
        field: String,
    },
    NoOpenPosition {
        symbol: String,
        side: String,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::SymbolNotWhitelisted { symbol, allowed } => {
                write!(
                    f,
                    "Symbol {} is not whitelisted. Allowed: {}",
                    symbol,
                    allowed.join(", ")
                )
            }
            ValidationError::LeverageOutOfRange { leverage, max } => {
                write!(f, "Leverage {}x outside allowed range 1-{}x", leverage, max)
            }
            ValidationError::CostOutOfRange { cost, max } => {
                write!(f, "Cost {} USDT outside allowed range 0-{} USDT", cost, max)
            }
            ValidationError::MissingParameter { field } => {
                write!(f, "Missing required parameter: {}", field)
            }
            ValidationError::NoOpenPosition { symbol, side } => {
                write!(f, "No {} position found for {}", side, symbol)
            }
            ValidationError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// PROTECTION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ProtectionError {
    /// Stop-loss could not be placed; the position was emergency-closed.
    RolledBack {
        symbol: String,
        main_order_id: String,
    },
    /// Stop-loss failed AND the emergency close failed. The position is live
    /// and unprotected.
    Critical {
        symbol: String,
        main_order_id: String,
        detail: String,
    },
}

impl std::fmt::Display for ProtectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtectionError::RolledBack { symbol, .. } => {
                write!(
                    f,
                    "Stop-loss placement failed for {}; position closed for safety",
                    symbol
                )
            }
            ProtectionError::Critical {
                symbol,
                main_order_id,
                detail,
            } => {
                write!(
                    f,
                    "MANUAL INTERVENTION REQUIRED: unprotected {} position, main order {}: {}",
                    symbol, main_order_id, detail
                )
            }
        }
    }
}

// =============================================================================
// LLM ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum LlmError {
    NotConfigured {
        provider: String,
    },
    RateLimited {
        retry_after: Option<u64>,
    },
    HttpStatus {
        status: u16,
        body: String,
    },
    MalformedResponse {
        detail: String,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::NotConfigured { provider } => {
                write!(f, "LLM provider not configured: {}", provider)
            }
            LlmError::RateLimited { retry_after } => match retry_after {
                Some(secs) => write!(f, "LLM rate limited, retry after {}s", secs),
                None => write!(f, "LLM rate limited"),
            },
            LlmError::HttpStatus { status, body } => {
                write!(f, "LLM HTTP {}: {}", status, body)
            }
            LlmError::MalformedResponse { detail } => {
                write!(f, "Malformed LLM response: {}", detail)
            }
            LlmError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ConfigurationError {
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
    MissingCredential {
        name: String,
        mode: String,
    },
    Generic {
        message: String,
    },
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(f, "Invalid value '{}' for {}: {}", value, field, reason)
            }
            ConfigurationError::MissingCredential { name, mode } => {
                write!(f, "{} is required in {} mode", name, mode)
            }
            ConfigurationError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// AUDIT ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum AuditError {
    FileWrite { path: String, error: String },
    Database { error: String },
    UnmappedSymbol { symbol: String },
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditError::FileWrite { path, error } => {
                write!(f, "Failed to write session log {}: {}", path, error)
            }
            AuditError::Database { error } => write!(f, "Session database error: {}", error),
            AuditError::UnmappedSymbol { symbol } => {
                write!(f, "Symbol {} has no audit enum mapping", symbol)
            }
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<String> for BotError {
    fn from(err: String) -> Self {
        BotError::Exchange(ExchangeError::Generic { message: err })
    }
}

impl From<&str> for BotError {
    fn from(err: &str) -> Self {
        BotError::Exchange(ExchangeError::Generic {
            message: err.to_string(),
        })
    }
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Exchange(ExchangeError::Generic {
            message: format!("HTTP request failed: {}", err),
        })
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Exchange(ExchangeError::Generic {
            message: format!("JSON decode failed: {}", err),
        })
    }
}

impl From<rusqlite::Error> for BotError {
    fn from(err: rusqlite::Error) -> Self {
        BotError::Audit(AuditError::Database {
            error: err.to_string(),
        })
    }
}

impl From<ExchangeError> for BotError {
    fn from(err: ExchangeError) -> Self {
        BotError::Exchange(err)
    }
}

impl From<ValidationError> for BotError {
    fn from(err: ValidationError) -> Self {
        BotError::Validation(err)
    }
}

// =============================================================================
// BUILDER HELPERS
// =============================================================================

impl BotError {
    pub fn exchange(message: impl Into<String>) -> Self {
        BotError::Exchange(ExchangeError::Generic {
            message: message.into(),
        })
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        BotError::Configuration(ConfigurationError::Generic {
            message: message.into(),
        })
    }

    /// True when the error demands operator attention (unprotected position).
    pub fn is_critical(&self) -> bool {
        matches!(self, BotError::Protection(ProtectionError::Critical { .. }))
    }
}
