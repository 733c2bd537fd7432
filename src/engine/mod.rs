pub mod book;
pub mod policy;
pub mod runner;
pub mod universe;

pub use book::{LossBook, PositionLedger};
pub use policy::{SymbolSnapshot, ThresholdPolicy};
pub use runner::{SymbolOutcome, TickReport, TickRunner};
pub use universe::Universe;
