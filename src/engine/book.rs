//! In-memory books behind the evaluation pass: the position ledger and
//! the per-symbol loss watermark. Both live for the process lifetime
//! and are written only by the tick loop's apply step.

use crate::domain::Position;
use crate::error::{RatchetError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Held shares and reference price per symbol.
#[derive(Debug, Default)]
pub struct PositionLedger {
    entries: HashMap<String, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.entries.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.entries.contains_key(symbol)
    }

    /// First-sight entry: no shares, basis pinned at the observed price.
    /// Returns the existing entry untouched if the symbol is known.
    pub fn init(&mut self, symbol: &str, reference_price: Decimal) -> &Position {
        self.entries
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol, reference_price))
    }

    /// Apply an acknowledged buy: shares grow, basis rebases to `price`.
    pub fn record_buy(&mut self, symbol: &str, shares: u64, price: Decimal) -> Result<()> {
        let position = self
            .entries
            .get_mut(symbol)
            .ok_or_else(|| RatchetError::UnknownSymbol(symbol.to_string()))?;
        position.record_buy(shares, price);
        Ok(())
    }

    /// Apply an acknowledged full liquidation.
    pub fn record_sell_all(&mut self, symbol: &str) -> Result<()> {
        let position = self
            .entries
            .get_mut(symbol)
            .ok_or_else(|| RatchetError::UnknownSymbol(symbol.to_string()))?;
        position.record_sell_all();
        Ok(())
    }

    pub fn remove(&mut self, symbol: &str) -> Option<Position> {
        self.entries.remove(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.entries.values()
    }

    /// Shares currently held for a symbol (0 when untracked).
    pub fn shares(&self, symbol: &str) -> u64 {
        self.entries.get(symbol).map(|p| p.shares).unwrap_or(0)
    }
}

/// Monotone per-symbol watermark of losses absorbed while paused. Grows
/// on every pause accrual, never shrinks.
#[derive(Debug, Default)]
pub struct LossBook {
    totals: HashMap<String, Decimal>,
}

impl LossBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accrued loss for a symbol, zero when untracked.
    pub fn accrued(&self, symbol: &str) -> Decimal {
        self.totals
            .get(symbol)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Grow the watermark and return the new total. Non-positive
    /// amounts leave it unchanged.
    pub fn accrue(&mut self, symbol: &str, amount: Decimal) -> Decimal {
        let total = self
            .totals
            .entry(symbol.to_string())
            .or_insert(Decimal::ZERO);
        *total += amount.max(Decimal::ZERO);
        *total
    }

    pub fn remove(&mut self, symbol: &str) {
        self.totals.remove(symbol);
    }

    pub fn totals(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.totals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_init_is_idempotent() {
        let mut ledger = PositionLedger::new();
        ledger.init("NVDA", dec!(100));
        ledger.record_buy("NVDA", 2, dec!(101)).unwrap();

        // A second init must not clobber live state
        let position = ledger.init("NVDA", dec!(999)).clone();
        assert_eq!(position.shares, 2);
        assert_eq!(position.reference_price, dec!(101));
    }

    #[test]
    fn test_ledger_buy_and_sell_cycle() {
        let mut ledger = PositionLedger::new();
        ledger.init("TSLA", dec!(200));

        ledger.record_buy("TSLA", 1, dec!(200)).unwrap();
        ledger.record_buy("TSLA", 1, dec!(198)).unwrap();
        assert_eq!(ledger.shares("TSLA"), 2);
        assert_eq!(ledger.get("TSLA").unwrap().reference_price, dec!(198));

        ledger.record_sell_all("TSLA").unwrap();
        assert_eq!(ledger.shares("TSLA"), 0);
        assert!(ledger.contains("TSLA"));
    }

    #[test]
    fn test_ledger_rejects_unknown_symbol() {
        let mut ledger = PositionLedger::new();
        let err = ledger.record_buy("GME", 1, dec!(10)).unwrap_err();
        assert!(matches!(err, RatchetError::UnknownSymbol(_)));
        assert!(ledger.record_sell_all("GME").is_err());
    }

    #[test]
    fn test_loss_book_accumulates() {
        let mut losses = LossBook::new();
        assert_eq!(losses.accrued("AMD"), dec!(0));

        assert_eq!(losses.accrue("AMD", dec!(11)), dec!(11));
        assert_eq!(losses.accrue("AMD", dec!(12.5)), dec!(23.5));
        assert_eq!(losses.accrued("AMD"), dec!(23.5));

        // Symbols do not share a watermark
        assert_eq!(losses.accrued("META"), dec!(0));
    }

    #[test]
    fn test_loss_book_never_shrinks() {
        let mut losses = LossBook::new();
        losses.accrue("AMD", dec!(10));
        assert_eq!(losses.accrue("AMD", dec!(-5)), dec!(10));
        assert_eq!(losses.accrued("AMD"), dec!(10));
    }

    #[test]
    fn test_removal_clears_one_symbol_only() {
        let mut ledger = PositionLedger::new();
        ledger.init("AMD", dec!(100));
        ledger.init("META", dec!(500));
        let removed = ledger.remove("AMD").unwrap();
        assert_eq!(removed.symbol, "AMD");
        assert!(!ledger.contains("AMD"));
        assert!(ledger.contains("META"));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.positions().all(|p| p.symbol == "META"));

        let mut losses = LossBook::new();
        losses.accrue("AMD", dec!(10));
        losses.accrue("META", dec!(20));
        losses.remove("AMD");
        assert_eq!(losses.accrued("AMD"), dec!(0));
        assert_eq!(losses.accrued("META"), dec!(20));
        assert_eq!(losses.totals().count(), 1);
    }
}
