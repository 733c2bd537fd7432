use clap::Parser;
use ratchet::broker::{AlpacaClient, BrokerClient, PaperBroker};
use ratchet::cli::{self, Cli, Commands};
use ratchet::config::AppConfig;
use ratchet::engine::TickRunner;
use ratchet::error::{RatchetError, Result};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Account) => {
            init_logging_simple();
            let config = load_config(&cli);
            let broker = build_broker(&cli, &config)?;
            cli::show_account(broker.as_ref(), config.strategy.balance_usage_threshold).await?;
        }
        Some(Commands::Quote { symbol }) => {
            init_logging_simple();
            let config = load_config(&cli);
            let broker = build_broker(&cli, &config)?;
            cli::show_quote(broker.as_ref(), symbol).await?;
        }
        Some(Commands::Run { interval, symbols }) => {
            init_logging();
            run_bot(&cli, *interval, symbols.as_deref()).await?;
        }
        None => {
            init_logging();
            run_bot(&cli, None, None).await?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> AppConfig {
    match AppConfig::load_from(&cli.config) {
        Ok(mut c) => {
            c.dry_run.enabled = !cli.live;
            c
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            info!("Using default configuration");
            AppConfig::default_config(!cli.live)
        }
    }
}

fn build_broker(cli: &Cli, config: &AppConfig) -> Result<Arc<dyn BrokerClient>> {
    if cli.paper {
        if cli.live {
            warn!("--live has no effect with --paper, fills stay simulated");
        }
        info!("Using simulated paper broker");
        return Ok(Arc::new(PaperBroker::demo(
            &config.universe.symbols,
            dec!(100000),
        )));
    }

    let client = AlpacaClient::from_config(&config.broker, config.dry_run.enabled)?;
    Ok(Arc::new(client))
}

async fn run_bot(cli: &Cli, interval: Option<u64>, symbols: Option<&str>) -> Result<()> {
    let mut config = load_config(cli);

    if let Some(secs) = interval {
        config.schedule.poll_interval_secs = secs;
    }
    if let Some(raw) = symbols {
        config.universe.symbols = cli::parse_symbol_list(raw);
    }

    if let Err(violations) = config.validate() {
        for v in &violations {
            error!("Config: {}", v);
        }
        return Err(RatchetError::Validation(format!(
            "{} configuration problem(s), refusing to start",
            violations.len()
        )));
    }

    println!("\x1b[33m");
    println!("╔══════════════════════════════════════════════════════════════╗");
    if config.dry_run.enabled {
        println!("║     RATCHET - Threshold Trading Bot [DRY RUN - NO ORDERS]    ║");
    } else {
        println!("║     RATCHET - Threshold Trading Bot [REAL ORDERS ENABLED]    ║");
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!("\x1b[0m");

    println!("  Symbols:        {}", config.universe.symbols.join(", "));
    println!("  Cadence:        {}s", config.schedule.poll_interval_secs);
    println!("  Profit target:  {}", config.strategy.profit_target);
    println!(
        "  Loss ratchet:   pause < {}, cap {}, stop > {}",
        config.strategy.loss_pause_trigger,
        config.strategy.loss_pause_cap,
        config.strategy.loss_stop_trigger
    );
    println!();

    let broker = build_broker(cli, &config)?;
    let mut runner = TickRunner::new(&config, broker);

    info!("Bot is running. Press Ctrl+C to stop.");

    tokio::select! {
        result = runner.run() => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("Shutting down...");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ratchet=debug"));

    let log_dir = std::env::var("RATCHET_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .unwrap_or_else(|_| "/var/log/ratchet".to_string());

    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, and the release profile aborts on panic. Probe
    // writability before handing it the directory.
    let file_layer = if std::fs::create_dir_all(&log_dir).is_ok() {
        let test_path = std::path::Path::new(&log_dir).join(".ratchet_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(&log_dir, "ratchet.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    } else {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir
        );
        None
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if file_logging_enabled {
        eprintln!("Logging to: {}/ratchet.log", log_dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
