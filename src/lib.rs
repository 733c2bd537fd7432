pub mod broker;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;

pub use broker::{AlpacaClient, BrokerClient, BrokerKind, PaperBroker};
pub use config::AppConfig;
pub use domain::{
    AccountBalances, Action, BalanceRegime, Decision, OrderAck, OrderRequest, OrderSide, Position,
};
pub use engine::{
    LossBook, PositionLedger, SymbolOutcome, SymbolSnapshot, ThresholdPolicy, TickReport,
    TickRunner, Universe,
};
pub use error::{RatchetError, Result};
