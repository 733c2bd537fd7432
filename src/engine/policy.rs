use crate::config::StrategyConfig;
use crate::domain::{BalanceRegime, Decision, Position};
use rust_decimal::Decimal;

/// Immutable view of one symbol's tracked state at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSnapshot {
    pub shares: u64,
    pub reference_price: Decimal,
    pub accrued_loss: Decimal,
}

impl SymbolSnapshot {
    pub fn new(shares: u64, reference_price: Decimal, accrued_loss: Decimal) -> Self {
        Self {
            shares,
            reference_price,
            accrued_loss,
        }
    }

    pub fn of(position: &Position, accrued_loss: Decimal) -> Self {
        Self {
            shares: position.shares,
            reference_price: position.reference_price,
            accrued_loss,
        }
    }

    /// Unrealized P&L at the given price.
    pub fn pnl(&self, price: Decimal) -> Decimal {
        (price - self.reference_price) * Decimal::from(self.shares)
    }
}

/// The decision rules: maps (symbol state, price, regime) to exactly one
/// action. Pure and total; all side effects belong to the caller.
///
/// Rule order within the accumulating regime is part of the contract:
/// take-profit, then loss-pause, then loss-stop, then resume-buy, then
/// hold. Take-profit wins over every loss rule regardless of how the
/// thresholds are configured.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: StrategyConfig,
}

impl ThresholdPolicy {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Evaluate one symbol for one tick. `regime` is `None` when the
    /// account state could not be determined this tick; de-risking
    /// rules stay live but no new buys are issued.
    pub fn evaluate(
        &self,
        snapshot: &SymbolSnapshot,
        price: Decimal,
        regime: Option<BalanceRegime>,
    ) -> Decision {
        let pnl = snapshot.pnl(price);

        match regime {
            Some(BalanceRegime::Harvesting) => self.evaluate_harvesting(snapshot, pnl),
            Some(BalanceRegime::Accumulating) => self.evaluate_accumulating(snapshot, pnl, true),
            None => self.evaluate_accumulating(snapshot, pnl, false),
        }
    }

    fn evaluate_accumulating(
        &self,
        snapshot: &SymbolSnapshot,
        pnl: Decimal,
        buying_allowed: bool,
    ) -> Decision {
        let cfg = &self.config;

        // 1. Take profit. Checked before any loss handling.
        if snapshot.shares > 0 && pnl > cfg.profit_target {
            return Decision::sell(snapshot.shares, pnl);
        }

        // 2. Losing streak below the pause trigger: absorb the loss into
        //    the watermark, place no order. A pause whose accrual crosses
        //    the stop line escalates to a stop on this same tick.
        if pnl < cfg.loss_pause_trigger && snapshot.accrued_loss <= cfg.loss_pause_cap {
            let accrual = pnl.abs();
            if snapshot.accrued_loss + accrual > cfg.loss_stop_trigger {
                return Decision::stop(pnl, Some(accrual));
            }
            return Decision::pause(pnl);
        }

        // 3. Watermark already past the stop line.
        if snapshot.accrued_loss > cfg.loss_stop_trigger {
            return Decision::stop(pnl, None);
        }

        // 4. Accumulate another step while the loss stays inside the
        //    resume band.
        if buying_allowed && pnl > cfg.resume_loss_ceiling {
            return Decision::buy(cfg.buy_increment, pnl);
        }

        Decision::hold(pnl)
    }

    /// Harvesting is strictly de-risking: liquidate winners past the
    /// harvest target, touch nothing else. No buys, no loss bookkeeping.
    fn evaluate_harvesting(&self, snapshot: &SymbolSnapshot, pnl: Decimal) -> Decision {
        if snapshot.shares > 0 && pnl > self.config.harvest_profit_target {
            return Decision::sell(snapshot.shares, pnl);
        }
        Decision::hold(pnl)
    }
}
