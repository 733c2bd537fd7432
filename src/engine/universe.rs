//! The working set of symbols the tick loop evaluates. Shrinks when a
//! symbol stops out; stopped symbols never come back.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Universe {
    active: Vec<String>,
    stopped: HashSet<String>,
}

impl Universe {
    /// Build from the configured symbol list, deduplicated, order kept.
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let active = symbols
            .into_iter()
            .map(Into::into)
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self {
            active,
            stopped: HashSet::new(),
        }
    }

    /// Active symbols in evaluation order.
    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Owned copy of the active list, taken at tick start so mid-tick
    /// retirements cannot skip or double-visit symbols.
    pub fn snapshot(&self) -> Vec<String> {
        self.active.clone()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.active.iter().any(|s| s == symbol)
    }

    pub fn is_stopped(&self, symbol: &str) -> bool {
        self.stopped.contains(symbol)
    }

    /// Permanently remove a symbol. One-way: a retired symbol cannot be
    /// re-admitted. Returns false when the symbol was not active.
    pub fn retire(&mut self, symbol: &str) -> bool {
        let before = self.active.len();
        self.active.retain(|s| s != symbol);
        if self.active.len() < before {
            self.stopped.insert(symbol.to_string());
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
