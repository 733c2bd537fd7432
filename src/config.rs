use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub universe: UniverseConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Trading API endpoint (account, orders). Paper URL by default.
    pub trading_url: String,
    /// Market data API endpoint (latest trades)
    pub data_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UniverseConfig {
    /// Symbols evaluated every tick, in this order
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Unrealized P&L above which an open position is fully liquidated
    pub profit_target: Decimal,
    /// Unrealized P&L below which (negative) buying pauses and loss accrues
    pub loss_pause_trigger: Decimal,
    /// Cumulative-loss ceiling under which pausing (not stopping) applies
    pub loss_pause_cap: Decimal,
    /// Cumulative-loss level above which the symbol is stopped for good
    pub loss_stop_trigger: Decimal,
    /// Most-negative P&L still compatible with resuming buys
    pub resume_loss_ceiling: Decimal,
    /// Shares bought per accumulation step
    pub buy_increment: u64,
    /// Deployed fraction above which the regime switches to harvesting
    pub balance_usage_threshold: Decimal,
    /// P&L threshold for liquidation while harvesting
    pub harvest_profit_target: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between evaluation passes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Timeout for any single broker call in milliseconds
    #[serde(default = "default_port_timeout_ms")]
    pub port_timeout_ms: u64,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_port_timeout_ms() -> u64 {
    5000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            port_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DryRunConfig {
    /// Enable dry run mode (no real orders)
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("schedule.poll_interval_secs", 60)?
            .set_default("schedule.port_timeout_ms", 5000)?
            .set_default("dry_run.enabled", true)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("RATCHET_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (RATCHET_STRATEGY__PROFIT_TARGET, etc.)
            .add_source(
                Environment::with_prefix("RATCHET")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(dry_run: bool) -> Self {
        use rust_decimal_macros::dec;

        Self {
            broker: BrokerConfig {
                trading_url: "https://paper-api.alpaca.markets".to_string(),
                data_url: "https://data.alpaca.markets".to_string(),
            },
            universe: UniverseConfig {
                symbols: ["NVDA", "TSLA", "ETSY", "AMD", "META"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            strategy: StrategyConfig {
                profit_target: dec!(5),
                loss_pause_trigger: dec!(-10),
                loss_pause_cap: dec!(50),
                loss_stop_trigger: dec!(100),
                resume_loss_ceiling: dec!(-50),
                buy_increment: 1,
                balance_usage_threshold: dec!(0.5),
                harvest_profit_target: dec!(20),
            },
            schedule: ScheduleConfig::default(),
            dry_run: DryRunConfig { enabled: dry_run },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Validate strategy params
        if self.strategy.profit_target <= Decimal::ZERO {
            errors.push("profit_target must be positive".to_string());
        }

        if self.strategy.harvest_profit_target <= Decimal::ZERO {
            errors.push("harvest_profit_target must be positive".to_string());
        }

        if self.strategy.loss_pause_trigger >= Decimal::ZERO {
            errors.push("loss_pause_trigger must be negative (it is a P&L level)".to_string());
        }

        if self.strategy.resume_loss_ceiling >= Decimal::ZERO {
            errors.push("resume_loss_ceiling must be negative (it is a loss band)".to_string());
        }

        if self.strategy.loss_pause_cap < Decimal::ZERO {
            errors.push("loss_pause_cap must not be negative".to_string());
        }

        if self.strategy.loss_stop_trigger < self.strategy.loss_pause_cap {
            errors.push("loss_stop_trigger should not be below loss_pause_cap".to_string());
        }

        if self.strategy.buy_increment == 0 {
            errors.push("buy_increment must be at least 1".to_string());
        }

        if self.strategy.balance_usage_threshold <= Decimal::ZERO
            || self.strategy.balance_usage_threshold >= Decimal::ONE
        {
            errors.push("balance_usage_threshold must be between 0 and 1".to_string());
        }

        // Validate universe
        if self.universe.symbols.is_empty() {
            errors.push("universe.symbols must not be empty".to_string());
        }

        if self.universe.symbols.iter().any(|s| s.trim().is_empty()) {
            errors.push("universe.symbols must not contain blank entries".to_string());
        }

        // Validate schedule
        if self.schedule.poll_interval_secs == 0 {
            errors.push("poll_interval_secs must be at least 1".to_string());
        }

        if self.schedule.port_timeout_ms == 0 {
            errors.push("port_timeout_ms must be positive".to_string());
        }

        // Validate broker endpoints
        if self.broker.trading_url.trim().is_empty() || self.broker.data_url.trim().is_empty() {
            errors.push("broker endpoints must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default_config(true);
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.profit_target, dec!(5));
        assert_eq!(config.universe.symbols.len(), 5);
        assert!(config.dry_run.enabled);
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let mut config = AppConfig::default_config(true);
        config.strategy.profit_target = dec!(-1);
        config.strategy.loss_pause_trigger = dec!(10);
        config.strategy.buy_increment = 0;
        config.universe.symbols.clear();

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("profit_target")));
        assert!(errors.iter().any(|e| e.contains("buy_increment")));
    }

    #[test]
    fn test_validate_threshold_band() {
        let mut config = AppConfig::default_config(true);
        config.strategy.balance_usage_threshold = dec!(1.5);
        assert!(config.validate().is_err());

        config.strategy.balance_usage_threshold = dec!(0.5);
        assert!(config.validate().is_ok());
    }
}
