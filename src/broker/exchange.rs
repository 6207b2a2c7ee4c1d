/// Production broker: the protected-order protocol
///
/// A `place_order` call walks CONFIGURE → SIZE → MAIN_ORDER → PROTECT and
/// must reach a terminal state before returning: success with protective
/// order ids, a controlled failure after rollback, or a CRITICAL failure
/// when an unprotected position could not be unwound.
use super::{BackoffPolicy, Broker};
use crate::arguments::is_debug_broker_enabled;
use crate::errors::{BotError, ExchangeError, ProtectionError};
use crate::exchange::{ExchangeApi, RawOrder, RawOrderRequest, RawOrderType};
use crate::logger::{log, LogTag};
use crate::types::{
    AccountSnapshot, MarginMode, OrderRequest, OrderResult, OrderSide, OrderType, Position,
    PositionSide, Symbol,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::sleep;

pub struct ExchangeBroker {
    api: Arc<dyn ExchangeApi>,
    backoff: BackoffPolicy,
}

impl ExchangeBroker {
    pub fn new(api: Arc<dyn ExchangeApi>) -> Self {
        Self {
            api,
            backoff: BackoffPolicy::linear(),
        }
    }

    /// Override the protective-order retry schedule. Test seam.
    pub fn with_backoff(api: Arc<dyn ExchangeApi>, backoff: BackoffPolicy) -> Self {
        Self { api, backoff }
    }

    /// CONFIGURE: leverage and margin mode are re-applied per order. The
    /// venue answers with an error when they are already set; both setters
    /// are warnings at worst and never abort the order.
    async fn configure(&self, symbol: &Symbol, leverage: Option<u32>) {
        if let Some(leverage) = leverage {
            if let Err(e) = self.api.set_leverage(symbol, leverage).await {
                log(
                    LogTag::Broker,
                    "WARN",
                    &format!("set_leverage({}, {}x) failed: {}", symbol, leverage, e),
                );
            }
            if let Err(e) = self.api.set_margin_mode(symbol, MarginMode::Isolated).await {
                log(
                    LogTag::Broker,
                    "WARN",
                    &format!("set_margin_mode({}) failed: {}", symbol, e),
                );
            }
        }
    }

    /// SIZE: explicit amount wins; otherwise notional = cost * leverage at
    /// the current last price.
    async fn resolve_amount(&self, request: &OrderRequest) -> Result<f64, ExchangeError> {
        if let Some(amount) = request.amount {
            return Ok(amount);
        }
        let cost = request.cost.unwrap_or(0.0);
        let leverage = request.leverage.unwrap_or(1) as f64;
        let last_price = self.api.fetch_last_price(&request.symbol).await?;
        let amount = cost * leverage / last_price;

        if is_debug_broker_enabled() {
            log(
                LogTag::Broker,
                "DEBUG",
                &format!(
                    "Sized {}: cost={} leverage={}x last={} -> amount={:.8}",
                    request.symbol, cost, leverage, last_price, amount
                ),
            );
        }
        Ok(amount)
    }

    /// Bounded retry for one protective order. Linear waits between attempts,
    /// none before the first.
    async fn place_protective(
        &self,
        order: &RawOrderRequest,
        label: &str,
    ) -> Result<RawOrder, ExchangeError> {
        let mut last_error = ExchangeError::Generic {
            message: format!("{} never attempted", label),
        };

        for attempt in 1..=self.backoff.max_attempts {
            match self.api.create_order(order).await {
                Ok(placed) => {
                    log(
                        LogTag::Broker,
                        "SUCCESS",
                        &format!(
                            "{} placed for {} at {} (attempt {}/{})",
                            label,
                            order.symbol,
                            order.stop_price.unwrap_or(0.0),
                            attempt,
                            self.backoff.max_attempts
                        ),
                    );
                    return Ok(placed);
                }
                Err(e) => {
                    log(
                        LogTag::Broker,
                        "WARN",
                        &format!(
                            "{} attempt {}/{} failed for {}: {}",
                            label, attempt, self.backoff.max_attempts, order.symbol, e
                        ),
                    );
                    last_error = e;
                    if attempt < self.backoff.max_attempts {
                        sleep(self.backoff.delay_after(attempt)).await;
                    }
                }
            }
        }

        Err(last_error)
    }

    /// ROLLBACK: unwind an unprotected position with a reduce-only market
    /// order of equal size in the opposing direction.
    async fn emergency_close(
        &self,
        symbol: &Symbol,
        entry_side: OrderSide,
        amount: f64,
    ) -> Result<RawOrder, ExchangeError> {
        log(
            LogTag::Broker,
            "ROLLBACK",
            &format!("Emergency close: {} {} {:.8}", symbol, entry_side.opposite().as_str(), amount),
        );
        self.api
            .create_order(&RawOrderRequest {
                symbol: symbol.clone(),
                side: entry_side.opposite(),
                order_type: RawOrderType::Market,
                amount,
                price: None,
                stop_price: None,
                reduce_only: true,
            })
            .await
    }

    /// PROTECT: stop-loss is mandatory when requested; exhausted retries
    /// trigger rollback. Take-profit failure after a standing stop-loss is a
    /// warning only.
    async fn protect(
        &self,
        request: &OrderRequest,
        main_order: &RawOrder,
        amount: f64,
    ) -> OrderResult {
        let protective_side = request.side.opposite();
        let mut stop_loss_id = None;
        let mut take_profit_id = None;

        if let Some(stop_price) = request.stop_loss {
            let order = RawOrderRequest {
                symbol: request.symbol.clone(),
                side: protective_side,
                order_type: RawOrderType::StopMarket,
                amount,
                price: None,
                stop_price: Some(stop_price),
                reduce_only: true,
            };

            match self.place_protective(&order, "stop-loss").await {
                Ok(placed) => stop_loss_id = Some(placed.order_id),
                Err(_) => {
                    // Stop-loss is non-negotiable: unwind the position.
                    return match self
                        .emergency_close(&request.symbol, request.side, amount)
                        .await
                    {
                        Ok(_) => {
                            let error = ProtectionError::RolledBack {
                                symbol: request.symbol.to_string(),
                                main_order_id: main_order.order_id.clone(),
                            };
                            log(LogTag::Broker, "ROLLBACK", &error.to_string());
                            OrderResult::failure(error.to_string())
                        }
                        Err(close_error) => {
                            let error = ProtectionError::Critical {
                                symbol: request.symbol.to_string(),
                                main_order_id: main_order.order_id.clone(),
                                detail: close_error.to_string(),
                            };
                            log(LogTag::Broker, "CRITICAL", &error.to_string());
                            OrderResult::critical(
                                error.to_string(),
                                Some(main_order.order_id.clone()),
                            )
                        }
                    };
                }
            }
        }

        if let Some(take_profit_price) = request.take_profit {
            let order = RawOrderRequest {
                symbol: request.symbol.clone(),
                side: protective_side,
                order_type: RawOrderType::TakeProfitMarket,
                amount,
                price: None,
                stop_price: Some(take_profit_price),
                reduce_only: true,
            };

            match self.place_protective(&order, "take-profit").await {
                Ok(placed) => take_profit_id = Some(placed.order_id),
                Err(e) => {
                    log(
                        LogTag::Broker,
                        "WARN",
                        &format!(
                            "Take-profit placement failed for {} (stop-loss stands): {}",
                            request.symbol, e
                        ),
                    );
                }
            }
        }

        OrderResult {
            success: true,
            order_id: Some(main_order.order_id.clone()),
            stop_loss_order_id: stop_loss_id,
            take_profit_order_id: take_profit_id,
            error: None,
            critical: false,
        }
    }
}

#[async_trait]
impl Broker for ExchangeBroker {
    async fn place_order(&self, request: OrderRequest) -> OrderResult {
        if let Err(reason) = request.validate_shape() {
            return OrderResult::failure(reason);
        }

        self.configure(&request.symbol, request.leverage).await;

        let amount = match self.resolve_amount(&request).await {
            Ok(amount) => amount,
            Err(e) => return OrderResult::failure(e.to_string()),
        };

        let main_order = RawOrderRequest {
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: match request.order_type {
                OrderType::Market => RawOrderType::Market,
                OrderType::Limit => RawOrderType::Limit,
            },
            amount,
            price: request.price,
            stop_price: None,
            reduce_only: request.reduce_only,
        };

        let placed = match self.api.create_order(&main_order).await {
            Ok(placed) => placed,
            Err(e) => {
                log(
                    LogTag::Broker,
                    "ERROR",
                    &format!("Main order failed for {}: {}", request.symbol, e),
                );
                return OrderResult::failure(e.to_string());
            }
        };

        log(
            LogTag::Broker,
            match request.side {
                OrderSide::Buy => "BUY",
                OrderSide::Sell => "SELL",
            },
            &format!(
                "{} {:.8} {} (order {})",
                if request.reduce_only { "Closed" } else { "Opened" },
                amount,
                request.symbol,
                placed.order_id
            ),
        );

        // Reduce-only orders never enter PROTECT
        if request.reduce_only || (request.stop_loss.is_none() && request.take_profit.is_none()) {
            return OrderResult::ok(placed.order_id);
        }

        self.protect(&request, &placed, amount).await
    }

    async fn get_positions(&self, symbols: Option<&[Symbol]>) -> Vec<Position> {
        let wanted = symbols.unwrap_or(&[]);
        let raw = match self.api.fetch_positions(wanted).await {
            Ok(raw) => raw,
            Err(e) => {
                log(
                    LogTag::Broker,
                    "WARN",
                    &format!("fetch_positions failed, returning empty: {}", e),
                );
                return Vec::new();
            }
        };

        raw.into_iter()
            .filter(|p| p.contracts > 0.0)
            .map(|p| Position {
                symbol: Symbol::from_exchange_id(&p.symbol),
                side: if p.side == "short" {
                    PositionSide::Short
                } else {
                    PositionSide::Long
                },
                amount: p.contracts,
                entry_price: p.entry_price,
                mark_price: p.mark_price,
                unrealized_pnl: p.unrealized_pnl,
                leverage: p.leverage.max(1),
                liquidation_price: p.liquidation_price,
            })
            .collect()
    }

    async fn get_account_info(&self) -> AccountSnapshot {
        let balance = match self.api.fetch_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                log(
                    LogTag::Broker,
                    "WARN",
                    &format!("fetch_balance failed, returning zeros: {}", e),
                );
                return AccountSnapshot::zeroed();
            }
        };

        let positions = self.get_positions(None).await;
        let total_pnl: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
        let usdt = balance.currency("USDT");

        AccountSnapshot {
            balance: usdt.total + total_pnl,
            used_margin: usdt.used,
            available_margin: usdt.free,
            total_pnl,
            total_margin: usdt.total,
        }
    }

    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), BotError> {
        self.api
            .set_leverage(symbol, leverage)
            .await
            .map_err(BotError::Exchange)
    }

    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), BotError> {
        self.api
            .set_margin_mode(symbol, mode)
            .await
            .map_err(BotError::Exchange)
    }
}
