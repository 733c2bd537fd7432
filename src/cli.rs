use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::io::{stdout, Write};

use crate::broker::BrokerClient;
use crate::domain::BalanceRegime;
use crate::error::Result;

#[derive(Parser)]
#[command(name = "ratchet")]
#[command(author = "Ratchet Team")]
#[command(version = "0.1.0")]
#[command(about = "Rule-based threshold trading bot with loss-ratchet circuit breakers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (reads default.toml, then $RATCHET_ENV.toml)
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Use the simulated paper broker instead of Alpaca
    #[arg(long)]
    pub paper: bool,

    /// Submit real orders (dry run otherwise)
    #[arg(long)]
    pub live: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the trading loop
    Run {
        /// Seconds between evaluation passes (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Symbols to trade, comma-separated (overrides config)
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Show account balances and the regime they imply
    Account,
    /// Show the latest trade price for a symbol
    Quote {
        /// Ticker symbol (e.g. NVDA)
        symbol: String,
    },
}

/// "NVDA, tsla,," becomes ["NVDA", "TSLA"].
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Show account balances, usage, and the regime they imply
pub async fn show_account(broker: &dyn BrokerClient, usage_threshold: Decimal) -> Result<()> {
    println!("\x1b[36m");
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      RATCHET ACCOUNT                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\x1b[0m");

    print!("  Fetching balances ({})... ", broker.kind());
    stdout().flush()?;

    match broker.account_balances().await {
        Ok(balances) => {
            println!("\x1b[32mOK\x1b[0m\n");
            println!("  Cash:            ${:.2}", balances.cash);
            println!("  Portfolio Value: ${:.2}", balances.portfolio_value);

            match balances.balance_usage() {
                Some(usage) => {
                    println!("  Balance Usage:   {:.2}% (threshold {:.2}%)",
                        usage * Decimal::from(100),
                        usage_threshold * Decimal::from(100));

                    match BalanceRegime::classify(&balances, usage_threshold) {
                        Some(BalanceRegime::Accumulating) => {
                            println!("\n  Regime: \x1b[32maccumulating\x1b[0m (buys allowed)");
                        }
                        Some(BalanceRegime::Harvesting) => {
                            println!("\n  Regime: \x1b[33mharvesting\x1b[0m (profit-taking only)");
                        }
                        None => {
                            println!("\n  Regime: \x1b[31munknown\x1b[0m");
                        }
                    }
                }
                None => {
                    println!("  Balance Usage:   \x1b[31mundefined\x1b[0m (portfolio value not positive)");
                    println!("\n  Regime: \x1b[31munknown\x1b[0m (buys would be suspended)");
                }
            }
        }
        Err(e) => {
            println!("\x1b[31mFAILED\x1b[0m");
            println!("    Error: {}", e);
        }
    }

    println!();
    Ok(())
}

/// Show the latest trade price for one symbol
pub async fn show_quote(broker: &dyn BrokerClient, symbol: &str) -> Result<()> {
    let symbol = symbol.to_uppercase();

    print!("  Fetching latest trade for {} ({})... ", symbol, broker.kind());
    stdout().flush()?;

    match broker.latest_price(&symbol).await {
        Ok(price) => {
            println!("\x1b[32mOK\x1b[0m\n");
            println!("  {}: \x1b[32m${}\x1b[0m", symbol, price);
        }
        Err(e) => {
            println!("\x1b[31mFAILED\x1b[0m");
            println!("    Error: {}", e);
        }
    }

    println!();
    Ok(())
}
