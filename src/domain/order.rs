use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Market order request (what we want to do)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub shares: u64,
}

impl OrderRequest {
    pub fn market_buy(symbol: &str, shares: u64) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            shares,
        }
    }

    pub fn market_sell(symbol: &str, shares: u64) -> Self {
        Self {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            shares,
        }
    }
}

/// Broker acknowledgement of a submitted order. Fills are asynchronous;
/// this only confirms acceptance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

impl OrderAck {
    pub fn new(order_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            status: status.into(),
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_order_constructors() {
        let buy = OrderRequest::market_buy("NVDA", 1);
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.shares, 1);
        assert_eq!(buy.symbol, "NVDA");
        assert!(!buy.client_order_id.is_empty());

        let sell = OrderRequest::market_sell("NVDA", 10);
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.shares, 10);

        // Each request gets a fresh client id
        assert_ne!(buy.client_order_id, sell.client_order_id);
    }

    #[test]
    fn test_side_wire_format() {
        assert_eq!(OrderSide::Buy.as_str(), "buy");
        assert_eq!(OrderSide::Sell.as_str(), "sell");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }
}
