pub mod alpaca;
pub mod paper;
pub mod traits;

pub use alpaca::AlpacaClient;
pub use paper::PaperBroker;
pub use traits::{parse_broker_kind, BrokerClient, BrokerKind};
