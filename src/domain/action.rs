use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;

/// What the engine wants done for one symbol on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Accumulate another step of shares.
    Buy { shares: u64 },
    /// Liquidate the full position.
    Sell { shares: u64 },
    /// Losing streak: accrue the loss, place no order this tick.
    Pause,
    /// Accrued losses crossed the stop line; retire the symbol for good.
    Stop,
    Hold,
}

impl Action {
    /// The order this action translates to, if any.
    pub fn order_side(&self) -> Option<(OrderSide, u64)> {
        match self {
            Action::Buy { shares } => Some((OrderSide::Buy, *shares)),
            Action::Sell { shares } => Some((OrderSide::Sell, *shares)),
            _ => None,
        }
    }

    pub fn is_order(&self) -> bool {
        self.order_side().is_some()
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy { shares } => write!(f, "BUY {}", shares),
            Action::Sell { shares } => write!(f, "SELL {}", shares),
            Action::Pause => write!(f, "PAUSE"),
            Action::Stop => write!(f, "STOP"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// One evaluation's verdict: the action plus the numbers that drove it.
///
/// `loss_accrual` is the amount the loss watermark grows by when this
/// decision is applied. Set on Pause, and on a Stop that was escalated
/// from a pause whose accrual crossed the stop line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub pnl: Decimal,
    pub loss_accrual: Option<Decimal>,
}

impl Decision {
    pub fn hold(pnl: Decimal) -> Self {
        Self {
            action: Action::Hold,
            pnl,
            loss_accrual: None,
        }
    }

    pub fn buy(shares: u64, pnl: Decimal) -> Self {
        Self {
            action: Action::Buy { shares },
            pnl,
            loss_accrual: None,
        }
    }

    pub fn sell(shares: u64, pnl: Decimal) -> Self {
        Self {
            action: Action::Sell { shares },
            pnl,
            loss_accrual: None,
        }
    }

    pub fn pause(pnl: Decimal) -> Self {
        Self {
            action: Action::Pause,
            pnl,
            loss_accrual: Some(pnl.abs()),
        }
    }

    pub fn stop(pnl: Decimal, loss_accrual: Option<Decimal>) -> Self {
        Self {
            action: Action::Stop,
            pnl,
            loss_accrual,
        }
    }
}
