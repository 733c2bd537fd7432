//! In-memory venue for offline runs and scripted tests. Quotes come
//! from per-symbol price scripts, orders always fill at the last quote,
//! and the account is marked to the latest seen prices.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

use crate::broker::{BrokerClient, BrokerKind};
use crate::domain::{AccountBalances, OrderAck, OrderRequest, OrderSide};
use crate::error::{RatchetError, Result};

/// Dollar steps the demo walk cycles through.
const DEMO_DRIFT: [Decimal; 8] = [
    dec!(0.8),
    dec!(1.3),
    dec!(-0.6),
    dec!(2.1),
    dec!(-3.4),
    dec!(0.5),
    dec!(-1.2),
    dec!(1.9),
];

const DEMO_TICKS: usize = 480;

#[derive(Debug, Default)]
struct PaperState {
    scripts: HashMap<String, VecDeque<Decimal>>,
    last_price: HashMap<String, Decimal>,
    outages: HashSet<String>,
    cash: Decimal,
    portfolio_override: Option<Decimal>,
    holdings: HashMap<String, u64>,
    fail_next_order: Option<String>,
    fail_account: bool,
    submitted: Vec<OrderRequest>,
    order_seq: u64,
}

impl PaperState {
    fn portfolio_value(&self) -> Decimal {
        if let Some(value) = self.portfolio_override {
            return value;
        }
        let held: Decimal = self
            .holdings
            .iter()
            .map(|(symbol, shares)| {
                let price = self
                    .last_price
                    .get(symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                price * Decimal::from(*shares)
            })
            .sum();
        self.cash + held
    }
}

pub struct PaperBroker {
    state: RwLock<PaperState>,
}

impl PaperBroker {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            state: RwLock::new(PaperState {
                cash: starting_cash,
                ..PaperState::default()
            }),
        }
    }

    /// Deterministic walk per symbol, enough ticks for a long offline
    /// session. Seeds are staggered so symbols do not move in lockstep.
    pub fn demo(symbols: &[String], starting_cash: Decimal) -> Self {
        let mut state = PaperState {
            cash: starting_cash,
            ..PaperState::default()
        };

        for (i, symbol) in symbols.iter().enumerate() {
            let mut price = dec!(50) + Decimal::from(40 * i as u64);
            state.last_price.insert(symbol.clone(), price);
            let mut script = VecDeque::with_capacity(DEMO_TICKS);
            for k in 0..DEMO_TICKS {
                price += DEMO_DRIFT[(k + i) % DEMO_DRIFT.len()];
                script.push_back(price);
            }
            state.scripts.insert(symbol.clone(), script);
        }

        Self {
            state: RwLock::new(state),
        }
    }

    /// Append quotes to a symbol's script. Once a script runs dry the
    /// last quote repeats.
    pub async fn push_prices(&self, symbol: &str, prices: &[Decimal]) {
        let mut state = self.state.write().await;
        let script = state.scripts.entry(symbol.to_string()).or_default();
        script.extend(prices.iter().copied());
    }

    /// Pin the account to explicit balances instead of the marked book.
    pub async fn set_balances(&self, cash: Decimal, portfolio_value: Decimal) {
        let mut state = self.state.write().await;
        state.cash = cash;
        state.portfolio_override = Some(portfolio_value);
    }

    /// Reject the next submitted order with the given reason.
    pub async fn fail_next_order(&self, reason: &str) {
        let mut state = self.state.write().await;
        state.fail_next_order = Some(reason.to_string());
    }

    /// Toggle account endpoint failure.
    pub async fn set_account_outage(&self, on: bool) {
        let mut state = self.state.write().await;
        state.fail_account = on;
    }

    /// Toggle quote failure for one symbol.
    pub async fn set_quote_outage(&self, symbol: &str, on: bool) {
        let mut state = self.state.write().await;
        if on {
            state.outages.insert(symbol.to_string());
        } else {
            state.outages.remove(symbol);
        }
    }

    /// Orders accepted so far, in submission order.
    pub async fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.state.read().await.submitted.clone()
    }

    pub async fn cash(&self) -> Decimal {
        self.state.read().await.cash
    }
}

#[async_trait]
impl BrokerClient for PaperBroker {
    fn kind(&self) -> BrokerKind {
        BrokerKind::Paper
    }

    fn is_dry_run(&self) -> bool {
        true
    }

    async fn latest_price(&self, symbol: &str) -> Result<Decimal> {
        let mut state = self.state.write().await;

        if state.outages.contains(symbol) {
            return Err(RatchetError::QuoteUnavailable {
                symbol: symbol.to_string(),
                reason: "scripted outage".to_string(),
            });
        }

        let next = state
            .scripts
            .get_mut(symbol)
            .and_then(|script| script.pop_front());

        let price = match next {
            Some(price) => {
                state.last_price.insert(symbol.to_string(), price);
                price
            }
            None => match state.last_price.get(symbol) {
                Some(price) => *price,
                None => {
                    return Err(RatchetError::QuoteUnavailable {
                        symbol: symbol.to_string(),
                        reason: "no scripted price".to_string(),
                    })
                }
            },
        };

        Ok(price)
    }

    async fn account_balances(&self) -> Result<AccountBalances> {
        let state = self.state.read().await;

        if state.fail_account {
            return Err(RatchetError::AccountUnavailable(
                "scripted outage".to_string(),
            ));
        }

        Ok(AccountBalances::new(state.cash, state.portfolio_value()))
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let mut state = self.state.write().await;

        if let Some(reason) = state.fail_next_order.take() {
            return Err(RatchetError::OrderRejected(reason));
        }

        let price = state
            .last_price
            .get(&request.symbol)
            .copied()
            .ok_or_else(|| {
                RatchetError::OrderRejected(format!("no market for {}", request.symbol))
            })?;

        let notional = price * Decimal::from(request.shares);
        match request.side {
            OrderSide::Buy => {
                state.cash -= notional;
                *state.holdings.entry(request.symbol.clone()).or_insert(0) += request.shares;
            }
            OrderSide::Sell => {
                state.cash += notional;
                let held = state.holdings.entry(request.symbol.clone()).or_insert(0);
                *held = held.saturating_sub(request.shares);
            }
        }

        state.order_seq += 1;
        state.submitted.push(request.clone());
        Ok(OrderAck::new(format!("paper-{}", state.order_seq), "filled"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_script_pops_then_repeats_last() {
        let broker = PaperBroker::new(dec!(1000));
        broker.push_prices("NVDA", &[dec!(100), dec!(101)]).await;

        assert_eq!(broker.latest_price("NVDA").await.unwrap(), dec!(100));
        assert_eq!(broker.latest_price("NVDA").await.unwrap(), dec!(101));
        // Script exhausted: last quote repeats
        assert_eq!(broker.latest_price("NVDA").await.unwrap(), dec!(101));
    }

    #[tokio::test]
    async fn test_unknown_symbol_has_no_quote() {
        let broker = PaperBroker::new(dec!(1000));
        let err = broker.latest_price("GME").await.unwrap_err();
        assert!(matches!(err, RatchetError::QuoteUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fills_move_cash_and_portfolio() {
        let broker = PaperBroker::new(dec!(1000));
        broker.push_prices("NVDA", &[dec!(100)]).await;
        assert_ok!(broker.latest_price("NVDA").await);

        let buy = OrderRequest::market_buy("NVDA", 2);
        assert_ok!(broker.submit_order(&buy).await);
        assert_eq!(broker.cash().await, dec!(800));

        // Marked book keeps portfolio value flat across the fill
        let balances = broker.account_balances().await.unwrap();
        assert_eq!(balances.portfolio_value, dec!(1000));

        let sell = OrderRequest::market_sell("NVDA", 2);
        assert_ok!(broker.submit_order(&sell).await);
        assert_eq!(broker.cash().await, dec!(1000));
    }

    #[tokio::test]
    async fn test_injected_rejection_fires_once() {
        let broker = PaperBroker::new(dec!(1000));
        broker.push_prices("NVDA", &[dec!(100)]).await;
        broker.latest_price("NVDA").await.unwrap();
        broker.fail_next_order("insufficient buying power").await;

        let request = OrderRequest::market_buy("NVDA", 1);
        let err = broker.submit_order(&request).await.unwrap_err();
        assert!(matches!(err, RatchetError::OrderRejected(_)));
        assert!(broker.submitted_orders().await.is_empty());

        // Next order goes through
        assert_ok!(broker.submit_order(&request).await);
        assert_eq!(broker.submitted_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_outages_toggle() {
        let broker = PaperBroker::new(dec!(1000));
        broker.push_prices("NVDA", &[dec!(100), dec!(101)]).await;

        broker.set_quote_outage("NVDA", true).await;
        assert!(broker.latest_price("NVDA").await.is_err());
        broker.set_quote_outage("NVDA", false).await;
        assert_eq!(broker.latest_price("NVDA").await.unwrap(), dec!(100));

        broker.set_account_outage(true).await;
        assert!(matches!(
            broker.account_balances().await.unwrap_err(),
            RatchetError::AccountUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_demo_walk_is_deterministic() {
        let symbols = vec!["NVDA".to_string(), "TSLA".to_string()];
        let a = PaperBroker::demo(&symbols, dec!(10000));
        let b = PaperBroker::demo(&symbols, dec!(10000));

        for _ in 0..5 {
            let pa = a.latest_price("NVDA").await.unwrap();
            let pb = b.latest_price("NVDA").await.unwrap();
            assert_eq!(pa, pb);
            assert!(pa > Decimal::ZERO);
        }
    }
}
