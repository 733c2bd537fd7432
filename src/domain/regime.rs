use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account snapshot from the broker: free cash and total portfolio value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    pub cash: Decimal,
    pub portfolio_value: Decimal,
}

impl AccountBalances {
    pub fn new(cash: Decimal, portfolio_value: Decimal) -> Self {
        Self {
            cash,
            portfolio_value,
        }
    }

    /// Fraction of the portfolio currently deployed:
    /// (portfolio_value - cash) / portfolio_value.
    ///
    /// Undefined for a non-positive portfolio value; callers must treat
    /// `None` as "account state unknown", never as zero usage.
    pub fn balance_usage(&self) -> Option<Decimal> {
        if self.portfolio_value <= Decimal::ZERO {
            return None;
        }
        Some((self.portfolio_value - self.cash) / self.portfolio_value)
    }
}

/// Account-level posture derived from balance usage each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BalanceRegime {
    /// Capital to spare: the engine may open and grow positions.
    Accumulating,
    /// Heavily deployed: de-risk only, no new buys.
    Harvesting,
}

impl BalanceRegime {
    /// Classify the account, `None` when usage cannot be determined.
    pub fn classify(balances: &AccountBalances, threshold: Decimal) -> Option<Self> {
        let usage = balances.balance_usage()?;
        if usage <= threshold {
            Some(BalanceRegime::Accumulating)
        } else {
            Some(BalanceRegime::Harvesting)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceRegime::Accumulating => "accumulating",
            BalanceRegime::Harvesting => "harvesting",
        }
    }
}

impl std::fmt::Display for BalanceRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_usage() {
        let balances = AccountBalances::new(dec!(40), dec!(100));
        assert_eq!(balances.balance_usage(), Some(dec!(0.6)));

        let all_cash = AccountBalances::new(dec!(100), dec!(100));
        assert_eq!(all_cash.balance_usage(), Some(dec!(0)));
    }

    #[test]
    fn test_usage_undefined_for_empty_account() {
        let empty = AccountBalances::new(dec!(0), dec!(0));
        assert_eq!(empty.balance_usage(), None);

        let negative = AccountBalances::new(dec!(10), dec!(-5));
        assert_eq!(negative.balance_usage(), None);
    }

    #[test]
    fn test_classify_threshold_is_inclusive() {
        let threshold = dec!(0.5);

        // Exactly at threshold stays accumulating
        let at = AccountBalances::new(dec!(50), dec!(100));
        assert_eq!(
            BalanceRegime::classify(&at, threshold),
            Some(BalanceRegime::Accumulating)
        );

        let above = AccountBalances::new(dec!(49), dec!(100));
        assert_eq!(
            BalanceRegime::classify(&above, threshold),
            Some(BalanceRegime::Harvesting)
        );

        let empty = AccountBalances::new(dec!(0), dec!(0));
        assert_eq!(BalanceRegime::classify(&empty, threshold), None);
    }
}
