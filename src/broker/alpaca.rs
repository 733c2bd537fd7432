//! Alpaca REST adapter (native Rust, no external SDK dependency).
//!
//! Talks to two hosts: the trading API (account, orders) and the data
//! API (latest trades). Paper and live accounts differ only in the
//! trading URL.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::broker::{BrokerClient, BrokerKind};
use crate::config::BrokerConfig;
use crate::domain::{AccountBalances, OrderAck, OrderRequest};
use crate::error::{RatchetError, Result};

const DEFAULT_TRADING_API_BASE: &str = "https://paper-api.alpaca.markets";
const DEFAULT_DATA_API_BASE: &str = "https://data.alpaca.markets";

/// Account snapshot from GET /v2/account. Alpaca sends money fields as
/// JSON strings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub status: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub cash: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub portfolio_value: Decimal,
}

/// Envelope from GET /v2/stocks/{symbol}/trades/latest.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestTradeResponse {
    pub symbol: String,
    pub trade: TradeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeData {
    /// Trade price
    #[serde(rename = "p")]
    pub price: Decimal,
    /// Trade timestamp (RFC 3339)
    #[serde(rename = "t", default)]
    pub timestamp: Option<String>,
}

/// The slice of POST /v2/orders we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub client_order_id: String,
    pub status: String,
    pub symbol: String,
}

#[derive(Clone)]
pub struct AlpacaClient {
    http: Client,
    trading_url: String,
    data_url: String,
    api_key_id: Option<String>,
    api_secret_key: Option<String>,
    dry_run: bool,
}

impl AlpacaClient {
    pub fn new(
        trading_url: Option<&str>,
        data_url: Option<&str>,
        api_key_id: Option<String>,
        api_secret_key: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let trading_url = trading_url
            .unwrap_or(DEFAULT_TRADING_API_BASE)
            .trim_end_matches('/')
            .to_string();
        let data_url = data_url
            .unwrap_or(DEFAULT_DATA_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .user_agent("ratchet-alpaca-adapter/0.1")
            .build()
            .map_err(|e| {
                RatchetError::Internal(format!("failed to build Alpaca HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            trading_url,
            data_url,
            api_key_id,
            api_secret_key,
            dry_run,
        })
    }

    /// Credentials from the standard Alpaca environment variables.
    pub fn from_env(
        trading_url: Option<&str>,
        data_url: Option<&str>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_key_id = std::env::var("APCA_API_KEY_ID")
            .ok()
            .or_else(|| std::env::var("ALPACA_API_KEY").ok());
        let api_secret_key = std::env::var("APCA_API_SECRET_KEY")
            .ok()
            .or_else(|| std::env::var("ALPACA_API_SECRET").ok());

        Self::new(trading_url, data_url, api_key_id, api_secret_key, dry_run)
    }

    /// Endpoints from config, credentials from the environment.
    pub fn from_config(config: &BrokerConfig, dry_run: bool) -> Result<Self> {
        Self::from_env(
            Some(&config.trading_url),
            Some(&config.data_url),
            dry_run,
        )
    }

    pub fn trading_url(&self) -> &str {
        &self.trading_url
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let key = self.api_key_id.as_ref().ok_or_else(|| {
            RatchetError::Auth("APCA_API_KEY_ID (or ALPACA_API_KEY) is required".to_string())
        })?;
        let secret = self.api_secret_key.as_ref().ok_or_else(|| {
            RatchetError::Auth("APCA_API_SECRET_KEY (or ALPACA_API_SECRET) is required".to_string())
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("apca-api-key-id"),
            HeaderValue::from_str(key)
                .map_err(|e| RatchetError::Auth(format!("invalid Alpaca API key header: {}", e)))?,
        );
        headers.insert(
            HeaderName::from_static("apca-api-secret-key"),
            HeaderValue::from_str(secret)
                .map_err(|e| RatchetError::Auth(format!("invalid Alpaca secret header: {}", e)))?,
        );

        Ok(headers)
    }

    async fn request_json(
        &self,
        method: Method,
        base_url: &str,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", base_url, path);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .headers(self.auth_headers()?);

        if let Some(query) = query {
            req = req.query(query);
        }

        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").json(&body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        match status.as_u16() {
            429 => {
                return Err(RatchetError::RateLimited(format!(
                    "Alpaca API rate limited for {} {}",
                    method, path
                )))
            }
            401 | 403 => {
                return Err(RatchetError::Auth(format!(
                    "Alpaca API {} {} refused: status={} body={}",
                    method, path, status, text
                )))
            }
            422 => return Err(RatchetError::OrderRejected(text)),
            _ => {}
        }

        if !status.is_success() {
            return Err(RatchetError::Internal(format!(
                "Alpaca API {} {} failed: status={} body={}",
                method, path, status, text
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| RatchetError::Internal(format!("invalid Alpaca JSON response: {}", e)))
    }

    /// Keep auth and rate-limit failures loud; everything else becomes
    /// the port-level unavailability the tick loop absorbs.
    fn quote_error(symbol: &str, err: RatchetError) -> RatchetError {
        match err {
            e @ (RatchetError::Auth(_) | RatchetError::RateLimited(_)) => e,
            other => RatchetError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        }
    }

    fn account_error(err: RatchetError) -> RatchetError {
        match err {
            e @ (RatchetError::Auth(_) | RatchetError::RateLimited(_)) => e,
            other => RatchetError::AccountUnavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl BrokerClient for AlpacaClient {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Alpaca
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn latest_price(&self, symbol: &str) -> Result<Decimal> {
        let path = format!("/v2/stocks/{}/trades/latest", symbol);
        let value = self
            .request_json(Method::GET, &self.data_url, &path, None, None)
            .await
            .map_err(|e| Self::quote_error(symbol, e))?;

        let latest: LatestTradeResponse =
            serde_json::from_value(value).map_err(|e| RatchetError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: format!("malformed latest-trade payload: {}", e),
            })?;

        if latest.trade.price <= Decimal::ZERO {
            return Err(RatchetError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: format!("non-positive trade price {}", latest.trade.price),
            });
        }

        Ok(latest.trade.price)
    }

    async fn account_balances(&self) -> Result<AccountBalances> {
        let value = self
            .request_json(Method::GET, &self.trading_url, "/v2/account", None, None)
            .await
            .map_err(Self::account_error)?;

        let account: AccountResponse = serde_json::from_value(value).map_err(|e| {
            RatchetError::AccountUnavailable(format!("malformed account payload: {}", e))
        })?;

        Ok(AccountBalances::new(account.cash, account.portfolio_value))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        if self.dry_run {
            return Ok(OrderAck::new(request.client_order_id.clone(), "dry_run"));
        }

        let body = json!({
            "symbol": request.symbol,
            "qty": request.shares.to_string(),
            "side": request.side.as_str(),
            "type": "market",
            "time_in_force": "gtc",
            "client_order_id": request.client_order_id,
        });

        let value = self
            .request_json(Method::POST, &self.trading_url, "/v2/orders", None, Some(body))
            .await
            .map_err(|e| match e {
                e @ (RatchetError::Auth(_)
                | RatchetError::RateLimited(_)
                | RatchetError::OrderRejected(_)) => e,
                other => RatchetError::OrderSubmission(other.to_string()),
            })?;

        let order: OrderResponse = serde_json::from_value(value).map_err(|e| {
            RatchetError::OrderSubmission(format!("malformed order payload: {}", e))
        })?;

        Ok(OrderAck {
            order_id: order.id,
            status: order.status,
            submitted_at: Utc::now(),
        })
    }
}
