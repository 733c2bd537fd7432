use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{AccountBalances, OrderAck, OrderRequest};
use crate::error::{RatchetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    Alpaca,
    Paper,
}

impl Default for BrokerKind {
    fn default() -> Self {
        Self::Alpaca
    }
}

impl BrokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpaca => "alpaca",
            Self::Paper => "paper",
        }
    }
}

impl std::fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BrokerKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alpaca" => Ok(Self::Alpaca),
            "paper" | "sim" => Ok(Self::Paper),
            _ => Err("invalid broker; expected alpaca|paper"),
        }
    }
}

pub fn parse_broker_kind(raw: &str) -> Result<BrokerKind> {
    BrokerKind::from_str(raw).map_err(|e| RatchetError::Validation(e.to_string()))
}

/// The three capabilities the tick loop needs from a venue: quotes,
/// account balances, and market-order submission. Fills are
/// asynchronous; `submit_order` returning Ok only means the order was
/// accepted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    fn kind(&self) -> BrokerKind;

    fn is_dry_run(&self) -> bool;

    /// Latest traded price for a symbol.
    async fn latest_price(&self, symbol: &str) -> Result<Decimal>;

    /// Free cash and total portfolio value.
    async fn account_balances(&self) -> Result<AccountBalances>;

    /// Submit a market order.
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_broker_kind_accepts_aliases() {
        assert_eq!(
            parse_broker_kind("alpaca").expect("alpaca should parse"),
            BrokerKind::Alpaca
        );
        assert_eq!(
            parse_broker_kind("sim").expect("sim alias should parse"),
            BrokerKind::Paper
        );
        assert_eq!(
            parse_broker_kind(" Paper ").expect("case and whitespace tolerated"),
            BrokerKind::Paper
        );
        assert!(parse_broker_kind("ibkr").is_err());
    }
}
