use thiserror::Error;

/// Main error type for the trading bot
#[derive(Error, Debug)]
pub enum RatchetError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Port failures (recovered per tick, never fatal)
    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    #[error("Account data unavailable: {0}")]
    AccountUnavailable(String),

    #[error("Port call timed out: {port} after {elapsed_ms}ms")]
    PortTimeout { port: &'static str, elapsed_ms: u64 },

    // Order execution errors
    #[error("Order submission failed: {0}")]
    OrderSubmission(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    // Symbol/universe errors
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RatchetError {
    /// True for failures the tick loop absorbs locally: the affected
    /// symbol (or the regime derivation) sits out one tick, the loop
    /// carries on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RatchetError::QuoteUnavailable { .. }
                | RatchetError::AccountUnavailable(_)
                | RatchetError::PortTimeout { .. }
                | RatchetError::OrderSubmission(_)
                | RatchetError::OrderRejected(_)
                | RatchetError::RateLimited(_)
                | RatchetError::Http(_)
        )
    }
}

/// Result type alias for RatchetError
pub type Result<T> = std::result::Result<T, RatchetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_failures_are_recoverable() {
        let err = RatchetError::QuoteUnavailable {
            symbol: "NVDA".to_string(),
            reason: "no trade data".to_string(),
        };
        assert!(err.is_recoverable());

        let err = RatchetError::PortTimeout {
            port: "quote",
            elapsed_ms: 5000,
        };
        assert!(err.is_recoverable());

        assert!(!RatchetError::Validation("bad config".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = RatchetError::QuoteUnavailable {
            symbol: "TSLA".to_string(),
            reason: "404".to_string(),
        };
        assert_eq!(err.to_string(), "Quote unavailable for TSLA: 404");

        let err = RatchetError::OrderRejected("insufficient buying power".to_string());
        assert!(err.to_string().contains("insufficient buying power"));
    }
}
