/// Binance USDT-M futures REST client
///
/// Raw JSON HTTP via reqwest; signed endpoints use HMAC-SHA256 over the query
/// string with the API key in the `X-MBX-APIKEY` header. All numeric fields
/// pass through `coerce_f64` so malformed payloads degrade to zeros instead
/// of panicking.
use super::{ExchangeApi, RawBalance, RawOrder, RawOrderRequest, RawOrderType, RawPosition};
use crate::errors::ExchangeError;
use crate::logger::{debug, LogTag};
use crate::types::{coerce_f64, CurrencyBalance, MarginMode, OrderSide, Symbol};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://fapi.binance.com";
/// Tolerated clock skew window for signed requests
const RECV_WINDOW_MS: u64 = 5_000;

pub struct BinanceFutures {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl BinanceFutures {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self::with_base_url(api_key, api_secret, DEFAULT_BASE_URL.to_string())
    }

    /// Custom base URL (testnet, local stub)
    pub fn with_base_url(api_key: String, api_secret: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            api_secret,
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, mut params: Vec<(String, String)>) -> String {
        params.push(("timestamp".to_string(), Utc::now().timestamp_millis().to_string()));
        params.push(("recvWindow".to_string(), RECV_WINDOW_MS.to_string()));
        let query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }

    async fn send_signed(
        &self,
        method: reqwest::Method,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}{}?{}", self.base_url, path, self.signed_query(params));

        let response = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| ExchangeError::Generic {
                message: format!("Request to {} failed: {}", path, e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(ExchangeError::RateLimited {
                retry_after_ms: None,
            });
        }
        if !status.is_success() {
            return Err(ExchangeError::HttpStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body: Some(body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Generic {
            message: format!("Bad JSON from {}: {}", path, e),
        })
    }

    async fn send_public(&self, path: &str, query: &str) -> Result<serde_json::Value, ExchangeError> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::Generic {
                message: format!("Request to {} failed: {}", path, e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ExchangeError::HttpStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body: Some(body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ExchangeError::Generic {
            message: format!("Bad JSON from {}: {}", path, e),
        })
    }
}

#[async_trait]
impl ExchangeApi for BinanceFutures {
    async fn fetch_last_price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        let value = self
            .send_public(
                "/fapi/v1/ticker/price",
                &format!("symbol={}", symbol.exchange_id()),
            )
            .await?;

        let price = coerce_f64(value.get("price"));
        if price <= 0.0 {
            return Err(ExchangeError::TickerUnavailable {
                symbol: symbol.to_string(),
                reason: format!("ticker payload: {}", value),
            });
        }
        Ok(price)
    }

    async fn create_order(&self, request: &RawOrderRequest) -> Result<RawOrder, ExchangeError> {
        let mut params = vec![
            ("symbol".to_string(), request.symbol.exchange_id()),
            (
                "side".to_string(),
                match request.side {
                    OrderSide::Buy => "BUY".to_string(),
                    OrderSide::Sell => "SELL".to_string(),
                },
            ),
            ("type".to_string(), request.order_type.as_str().to_string()),
            ("quantity".to_string(), format!("{}", request.amount)),
        ];

        if let Some(price) = request.price {
            params.push(("price".to_string(), format!("{}", price)));
            params.push(("timeInForce".to_string(), "GTC".to_string()));
        }
        if let Some(stop_price) = request.stop_price {
            params.push(("stopPrice".to_string(), format!("{}", stop_price)));
        }
        if request.reduce_only {
            params.push(("reduceOnly".to_string(), "true".to_string()));
        }

        let value = self
            .send_signed(reqwest::Method::POST, "/fapi/v1/order", params)
            .await?;

        let order_id = value
            .get("orderId")
            .map(|v| v.to_string().trim_matches('"').to_string())
            .filter(|s| !s.is_empty() && s != "null")
            .ok_or_else(|| ExchangeError::OrderRejected {
                symbol: request.symbol.to_string(),
                reason: format!("no orderId in response: {}", value),
            })?;

        debug(
            LogTag::Broker,
            &format!(
                "Order accepted: {} {} {} qty={}",
                request.symbol,
                request.order_type.as_str(),
                request.side.as_str(),
                request.amount
            ),
        );

        Ok(RawOrder {
            order_id,
            status: value
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("NEW")
                .to_string(),
            executed_qty: coerce_f64(value.get("executedQty")),
            avg_price: coerce_f64(value.get("avgPrice")),
        })
    }

    async fn fetch_positions(&self, symbols: &[Symbol]) -> Result<Vec<RawPosition>, ExchangeError> {
        let params = match symbols {
            [single] => vec![("symbol".to_string(), single.exchange_id())],
            _ => Vec::new(),
        };

        let value = self
            .send_signed(reqwest::Method::GET, "/fapi/v2/positionRisk", params)
            .await?;

        let rows = value.as_array().cloned().unwrap_or_default();
        let wanted: Vec<String> = symbols.iter().map(|s| s.exchange_id()).collect();

        let mut positions = Vec::new();
        for row in rows {
            let exchange_symbol = row
                .get("symbol")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if !wanted.is_empty() && !wanted.contains(&exchange_symbol) {
                continue;
            }

            let contracts = coerce_f64(row.get("positionAmt"));
            if contracts == 0.0 {
                continue;
            }

            positions.push(RawPosition {
                symbol: exchange_symbol,
                contracts: contracts.abs(),
                side: if contracts > 0.0 { "long" } else { "short" }.to_string(),
                entry_price: coerce_f64(row.get("entryPrice")),
                mark_price: coerce_f64(row.get("markPrice")),
                unrealized_pnl: coerce_f64(row.get("unRealizedProfit")),
                leverage: coerce_f64(row.get("leverage")) as u32,
                liquidation_price: coerce_f64(row.get("liquidationPrice")),
            });
        }

        Ok(positions)
    }

    async fn fetch_balance(&self) -> Result<RawBalance, ExchangeError> {
        let value = self
            .send_signed(reqwest::Method::GET, "/fapi/v2/balance", Vec::new())
            .await?;

        let rows = value.as_array().cloned().unwrap_or_default();
        let mut currencies = HashMap::new();
        for row in rows {
            let asset = row
                .get("asset")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if asset.is_empty() {
                continue;
            }
            let total = coerce_f64(row.get("balance"));
            let free = coerce_f64(row.get("availableBalance"));
            currencies.insert(
                asset,
                CurrencyBalance {
                    free,
                    used: (total - free).max(0.0),
                    total,
                },
            );
        }

        Ok(RawBalance::new(currencies))
    }

    async fn set_leverage(&self, symbol: &Symbol, leverage: u32) -> Result<(), ExchangeError> {
        self.send_signed(
            reqwest::Method::POST,
            "/fapi/v1/leverage",
            vec![
                ("symbol".to_string(), symbol.exchange_id()),
                ("leverage".to_string(), leverage.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    async fn set_margin_mode(&self, symbol: &Symbol, mode: MarginMode) -> Result<(), ExchangeError> {
        self.send_signed(
            reqwest::Method::POST,
            "/fapi/v1/marginType",
            vec![
                ("symbol".to_string(), symbol.exchange_id()),
                ("marginType".to_string(), mode.as_str().to_string()),
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic_hex() {
        let client = BinanceFutures::new("key".to_string(), "secret".to_string());
        let sig = client.sign("symbol=BTCUSDT&side=BUY");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, client.sign("symbol=BTCUSDT&side=BUY"));
    }
}
