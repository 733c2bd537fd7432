use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tracked state for one symbol: held shares and the price basis the
/// unrealized P&L is measured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    /// P&L basis. Set at first observation, rebased on every buy.
    pub reference_price: Decimal,
    pub first_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Fresh entry for a symbol seen for the first time: no shares,
    /// basis pinned at the observed price.
    pub fn new(symbol: &str, reference_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            symbol: symbol.to_string(),
            shares: 0,
            reference_price,
            first_seen: now,
            updated_at: now,
        }
    }

    /// Unrealized P&L at the given price: (price - reference) * shares.
    pub fn pnl(&self, price: Decimal) -> Decimal {
        (price - self.reference_price) * Decimal::from(self.shares)
    }

    /// Dollar value of the position at the given price.
    pub fn market_value(&self, price: Decimal) -> Decimal {
        price * Decimal::from(self.shares)
    }

    pub fn has_shares(&self) -> bool {
        self.shares > 0
    }

    /// Apply an acknowledged buy: add shares and rebase the P&L basis
    /// to the price the decision was made at.
    pub fn record_buy(&mut self, shares: u64, price: Decimal) {
        self.shares += shares;
        self.reference_price = price;
        self.updated_at = Utc::now();
    }

    /// Apply an acknowledged full liquidation. The reference price is
    /// left alone until the next buy rebases it.
    pub fn record_sell_all(&mut self) {
        self.shares = 0;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pnl_math() {
        let mut position = Position::new("NVDA", dec!(100));
        // No shares, no exposure
        assert_eq!(position.pnl(dec!(150)), dec!(0));

        position.record_buy(10, dec!(100));
        assert_eq!(position.pnl(dec!(100.6)), dec!(6.0));
        assert_eq!(position.pnl(dec!(99)), dec!(-10));
        assert_eq!(position.market_value(dec!(100.6)), dec!(1006.0));
    }

    #[test]
    fn test_buy_rebases_reference() {
        let mut position = Position::new("TSLA", dec!(200));
        position.record_buy(1, dec!(195));
        assert_eq!(position.reference_price, dec!(195));
        assert_eq!(position.shares, 1);

        position.record_buy(1, dec!(190));
        assert_eq!(position.reference_price, dec!(190));
        assert_eq!(position.shares, 2);
        // Basis was rebased, so the step loss is bounded to one step
        assert_eq!(position.pnl(dec!(189)), dec!(-2));
    }

    #[test]
    fn test_sell_all_keeps_reference() {
        let mut position = Position::new("AMD", dec!(80));
        position.record_buy(5, dec!(80));
        position.record_sell_all();
        assert_eq!(position.shares, 0);
        assert_eq!(position.reference_price, dec!(80));
        assert!(!position.has_shares());
    }
}
