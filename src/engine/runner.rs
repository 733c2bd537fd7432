//! The tick loop: one sequential evaluation pass over the universe at a
//! fixed cadence. Owns the books, consults the policy, and applies each
//! decision through the order port before the next symbol is touched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::broker::BrokerClient;
use crate::config::AppConfig;
use crate::domain::{AccountBalances, Action, BalanceRegime, Decision, OrderAck, OrderRequest};
use crate::engine::{LossBook, PositionLedger, SymbolSnapshot, ThresholdPolicy, Universe};
use crate::error::{RatchetError, Result};

/// What happened to one symbol during a pass.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// Decision made and fully applied.
    Applied {
        symbol: String,
        price: Decimal,
        decision: Decision,
    },
    /// Sat out this tick: quote failure, timeout, or a refused order.
    /// No book mutation happened.
    Skipped {
        symbol: String,
        error: RatchetError,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Applied { symbol, .. } => symbol,
            SymbolOutcome::Skipped { symbol, .. } => symbol,
        }
    }
}

/// Summary of one evaluation pass.
#[derive(Debug)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub balances: Option<AccountBalances>,
    pub regime: Option<BalanceRegime>,
    pub outcomes: Vec<SymbolOutcome>,
}

impl TickReport {
    pub fn orders_placed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(o, SymbolOutcome::Applied { decision, .. } if decision.action.is_order())
            })
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SymbolOutcome::Skipped { .. }))
            .count()
    }

    pub fn action_for(&self, symbol: &str) -> Option<Action> {
        self.outcomes.iter().find_map(|o| match o {
            SymbolOutcome::Applied {
                symbol: s,
                decision,
                ..
            } if s == symbol => Some(decision.action),
            _ => None,
        })
    }
}

/// Drives the evaluation passes. Sole writer of the ledger, the loss
/// book, and the universe; everything mutable is behind `&mut self` so
/// the single-writer rule is enforced by ownership.
pub struct TickRunner {
    policy: ThresholdPolicy,
    broker: Arc<dyn BrokerClient>,
    ledger: PositionLedger,
    losses: LossBook,
    universe: Universe,
    poll_interval: Duration,
    port_timeout: Duration,
}

impl TickRunner {
    pub fn new(config: &AppConfig, broker: Arc<dyn BrokerClient>) -> Self {
        Self {
            policy: ThresholdPolicy::new(config.strategy.clone()),
            broker,
            ledger: PositionLedger::new(),
            losses: LossBook::new(),
            universe: Universe::new(config.universe.symbols.iter().cloned()),
            poll_interval: Duration::from_secs(config.schedule.poll_interval_secs),
            port_timeout: Duration::from_millis(config.schedule.port_timeout_ms),
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn losses(&self) -> &LossBook {
        &self.losses
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Run passes until the universe empties. Passes never overlap: a
    /// long one delays the next tick instead of bursting to catch up.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting tick loop: {} symbols, {}s cadence, broker {}{}",
            self.universe.len(),
            self.poll_interval.as_secs(),
            self.broker.kind(),
            if self.broker.is_dry_run() {
                " (dry run)"
            } else {
                ""
            }
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let report = self.run_once().await;
            self.log_report(&report);

            if self.universe.is_empty() {
                info!("Universe exhausted, every symbol stopped out");
                return Ok(());
            }
        }
    }

    /// One full pass: derive the regime, then evaluate each symbol from
    /// a snapshot of the active list taken before the first quote.
    pub async fn run_once(&mut self) -> TickReport {
        let started_at = Utc::now();

        let balances = match self.fetch_balances().await {
            Ok(balances) => Some(balances),
            Err(e) => {
                warn!("Account snapshot unavailable, buys suspended this tick: {}", e);
                None
            }
        };

        let regime = balances
            .as_ref()
            .and_then(|b| BalanceRegime::classify(b, self.policy.config().balance_usage_threshold));

        if balances.is_some() && regime.is_none() {
            warn!("Balance usage undefined (portfolio value not positive), buys suspended this tick");
        }

        let snapshot = self.universe.snapshot();
        let mut outcomes = Vec::with_capacity(snapshot.len());
        for symbol in &snapshot {
            if let Some(outcome) = self.evaluate_symbol(symbol, regime).await {
                outcomes.push(outcome);
            }
        }

        TickReport {
            started_at,
            balances,
            regime,
            outcomes,
        }
    }

    /// Returns `None` when the symbol is not considered under the
    /// current regime (harvesting looks at held positions only).
    async fn evaluate_symbol(
        &mut self,
        symbol: &str,
        regime: Option<BalanceRegime>,
    ) -> Option<SymbolOutcome> {
        if regime == Some(BalanceRegime::Harvesting) && self.ledger.shares(symbol) == 0 {
            return None;
        }

        let price = match self.fetch_price(symbol).await {
            Ok(price) => price,
            Err(e) => {
                if e.is_recoverable() {
                    warn!("{}: skipped this tick: {}", symbol, e);
                } else {
                    error!("{}: skipped this tick: {}", symbol, e);
                }
                return Some(SymbolOutcome::Skipped {
                    symbol: symbol.to_string(),
                    error: e,
                });
            }
        };

        let known = self.ledger.contains(symbol);
        let position = self.ledger.init(symbol, price).clone();
        if !known {
            info!("{}: now tracking (reference price {})", symbol, price);
        }

        let snapshot = SymbolSnapshot::of(&position, self.losses.accrued(symbol));
        let decision = self.policy.evaluate(&snapshot, price, regime);

        match self.apply(symbol, price, &decision).await {
            Ok(()) => Some(SymbolOutcome::Applied {
                symbol: symbol.to_string(),
                price,
                decision,
            }),
            Err(e) => {
                warn!("{}: {} not applied: {}", symbol, decision.action, e);
                Some(SymbolOutcome::Skipped {
                    symbol: symbol.to_string(),
                    error: e,
                })
            }
        }
    }

    /// Carry out one decision. Orders go out first; the books change
    /// only after the broker acks, so a refused order leaves no trace.
    /// Every mutation is complete before the next symbol is evaluated.
    async fn apply(&mut self, symbol: &str, price: Decimal, decision: &Decision) -> Result<()> {
        match decision.action {
            Action::Buy { shares } => {
                let request = OrderRequest::market_buy(symbol, shares);
                let ack = self.submit(&request).await?;
                self.ledger.record_buy(symbol, shares, price)?;
                info!(
                    "{}: bought {} @ {} (pnl {}), order {} {}",
                    symbol, shares, price, decision.pnl, ack.order_id, ack.status
                );
            }
            Action::Sell { shares } => {
                let request = OrderRequest::market_sell(symbol, shares);
                let ack = self.submit(&request).await?;
                self.ledger.record_sell_all(symbol)?;
                info!(
                    "{}: sold {} @ {} (pnl {}), order {} {}",
                    symbol, shares, price, decision.pnl, ack.order_id, ack.status
                );
            }
            Action::Pause => {
                if let Some(accrual) = decision.loss_accrual {
                    let total = self.losses.accrue(symbol, accrual);
                    warn!(
                        "{}: paused at pnl {}, loss watermark now {}",
                        symbol, decision.pnl, total
                    );
                }
            }
            Action::Stop => {
                if let Some(accrual) = decision.loss_accrual {
                    self.losses.accrue(symbol, accrual);
                }
                self.universe.retire(symbol);
                warn!(
                    "{}: stopped permanently, loss watermark {} crossed the stop line",
                    symbol,
                    self.losses.accrued(symbol)
                );
            }
            Action::Hold => {
                debug!("{}: hold (pnl {})", symbol, decision.pnl);
            }
        }
        Ok(())
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
        match tokio::time::timeout(self.port_timeout, self.broker.latest_price(symbol)).await {
            Ok(result) => result,
            Err(_) => Err(RatchetError::PortTimeout {
                port: "quote",
                elapsed_ms: self.port_timeout.as_millis() as u64,
            }),
        }
    }

    async fn fetch_balances(&self) -> Result<AccountBalances> {
        match tokio::time::timeout(self.port_timeout, self.broker.account_balances()).await {
            Ok(result) => result,
            Err(_) => Err(RatchetError::PortTimeout {
                port: "account",
                elapsed_ms: self.port_timeout.as_millis() as u64,
            }),
        }
    }

    async fn submit(&self, request: &OrderRequest) -> Result<OrderAck> {
        match tokio::time::timeout(self.port_timeout, self.broker.submit_order(request)).await {
            Ok(result) => result,
            Err(_) => Err(RatchetError::PortTimeout {
                port: "order",
                elapsed_ms: self.port_timeout.as_millis() as u64,
            }),
        }
    }

    fn log_report(&self, report: &TickReport) {
        let regime = report
            .regime
            .map(|r| r.as_str())
            .unwrap_or("unknown");
        let usage = report
            .balances
            .as_ref()
            .and_then(|b| b.balance_usage())
            .map(|u| format!("{:.2}", u))
            .unwrap_or_else(|| "n/a".to_string());

        info!(
            "Tick complete: regime={} usage={} evaluated={} orders={} skipped={}",
            regime,
            usage,
            report.outcomes.len(),
            report.orders_placed(),
            report.skipped()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::traits::MockBrokerClient;
    use crate::broker::BrokerKind;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn test_app_config(symbols: &[&str]) -> AppConfig {
        let mut config = AppConfig::default_config(true);
        config.universe.symbols = symbols.iter().map(|s| s.to_string()).collect();
        config.schedule.port_timeout_ms = 50;
        config
    }

    fn healthy_account() -> AccountBalances {
        // usage 0.2: comfortably accumulating
        AccountBalances::new(dec!(80), dec!(100))
    }

    #[tokio::test]
    async fn test_buy_applies_after_ack() {
        let mut mock = MockBrokerClient::new();
        mock.expect_account_balances()
            .returning(|| Ok(healthy_account()));
        mock.expect_latest_price().returning(|_| Ok(dec!(100)));
        mock.expect_submit_order()
            .times(1)
            .returning(|_| Ok(OrderAck::new("order-1", "accepted")));

        let config = test_app_config(&["NVDA"]);
        let mut runner = TickRunner::new(&config, Arc::new(mock));

        let report = runner.run_once().await;
        assert_eq!(report.action_for("NVDA"), Some(Action::Buy { shares: 1 }));
        assert_eq!(runner.ledger().shares("NVDA"), 1);
        assert_eq!(
            runner.ledger().get("NVDA").unwrap().reference_price,
            dec!(100)
        );
    }

    #[tokio::test]
    async fn test_rejected_order_leaves_books_untouched() {
        let mut mock = MockBrokerClient::new();
        mock.expect_account_balances()
            .returning(|| Ok(healthy_account()));
        mock.expect_latest_price().returning(|_| Ok(dec!(100)));
        mock.expect_submit_order()
            .returning(|_| Err(RatchetError::OrderRejected("insufficient funds".to_string())));

        let config = test_app_config(&["NVDA"]);
        let mut runner = TickRunner::new(&config, Arc::new(mock));

        let report = runner.run_once().await;
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.orders_placed(), 0);

        // First sight still tracked the symbol, but the refused buy
        // must not have touched the share count
        assert_eq!(runner.ledger().shares("NVDA"), 0);
    }

    #[tokio::test]
    async fn test_account_outage_suspends_buys() {
        let mut mock = MockBrokerClient::new();
        mock.expect_account_balances()
            .returning(|| Err(RatchetError::AccountUnavailable("503".to_string())));
        mock.expect_latest_price().returning(|_| Ok(dec!(100)));
        mock.expect_submit_order().times(0);

        let config = test_app_config(&["NVDA"]);
        let mut runner = TickRunner::new(&config, Arc::new(mock));

        let report = runner.run_once().await;
        assert_eq!(report.regime, None);
        assert_eq!(report.action_for("NVDA"), Some(Action::Hold));
        assert!(runner.ledger().contains("NVDA"));
    }

    #[tokio::test]
    async fn test_stop_retires_symbol_and_loop_ends() {
        // Thresholds tightened so two ticks walk a symbol into a stop:
        // buy at 100, drop to 95 pauses with accrual 5 which crosses a
        // stop line of 3 and escalates.
        let mut config = test_app_config(&["NVDA"]);
        config.strategy.loss_pause_trigger = dec!(-1);
        config.strategy.loss_stop_trigger = dec!(3);
        config.strategy.loss_pause_cap = dec!(100);

        let mut mock = MockBrokerClient::new();
        mock.expect_account_balances()
            .returning(|| Ok(healthy_account()));
        let mut prices = vec![dec!(100), dec!(95)];
        mock.expect_latest_price()
            .returning(move |_| Ok(prices.remove(0)));
        mock.expect_submit_order()
            .returning(|_| Ok(OrderAck::new("order-1", "accepted")));

        let mut runner = TickRunner::new(&config, Arc::new(mock));

        let first = runner.run_once().await;
        assert_eq!(first.action_for("NVDA"), Some(Action::Buy { shares: 1 }));

        let second = runner.run_once().await;
        assert_eq!(second.action_for("NVDA"), Some(Action::Stop));
        assert!(runner.universe().is_empty());
        assert!(runner.universe().is_stopped("NVDA"));
        assert_eq!(runner.losses().accrued("NVDA"), dec!(5));
    }

    struct SlowQuoteBroker;

    #[async_trait]
    impl BrokerClient for SlowQuoteBroker {
        fn kind(&self) -> BrokerKind {
            BrokerKind::Paper
        }

        fn is_dry_run(&self) -> bool {
            true
        }

        async fn latest_price(&self, _symbol: &str) -> Result<Decimal> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(dec!(100))
        }

        async fn account_balances(&self) -> Result<AccountBalances> {
            Ok(healthy_account())
        }

        async fn submit_order(&self, _request: &OrderRequest) -> Result<OrderAck> {
            Ok(OrderAck::new("order-1", "accepted"))
        }
    }

    #[tokio::test]
    async fn test_quote_timeout_is_a_skip() {
        let mut config = test_app_config(&["NVDA"]);
        config.schedule.port_timeout_ms = 10;

        let mut runner = TickRunner::new(&config, Arc::new(SlowQuoteBroker));
        let report = runner.run_once().await;

        assert_eq!(report.skipped(), 1);
        match &report.outcomes[0] {
            SymbolOutcome::Skipped { error, .. } => {
                assert!(matches!(error, RatchetError::PortTimeout { port: "quote", .. }));
            }
            other => panic!("expected a skip, got {:?}", other),
        }
        // Timed-out quote must leave no state behind
        assert!(!runner.ledger().contains("NVDA"));
    }
}
