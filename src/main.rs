//! StokerCloud hopper monitor entry point.

use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hopper_monitor::config::{Config, LoggingConfig};
use hopper_monitor::metrics;
use hopper_monitor::monitor::{CycleOutcome, Monitor};
use hopper_monitor::notify::NtfyClient;
use hopper_monitor::stoker::{SessionClient, StokerCloudClient};
use hopper_monitor::utils::{log_directive, shutdown_signal};

/// StokerCloud pellet hopper monitor.
#[derive(Parser, Debug)]
#[command(name = "hopper-monitor")]
#[command(about = "Polls StokerCloud for the hopper level and sends ntfy alerts when it runs low")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll forever (default).
    Run,

    /// Run a single cycle and exit.
    Once,

    /// Check configuration validity.
    CheckConfig,

    /// Send a test notification to the configured topic.
    TestAlert,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();
    dotenvy::dotenv().ok();

    // Initialize logging
    let logging = LoggingConfig::from_env();
    let filter = if args.verbose {
        EnvFilter::new("hopper_monitor=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_directive(&logging.log_level)))
    };

    let json = logging.json();
    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .with(filter)
        .init();

    // Initialize metrics
    metrics::init_metrics();

    match args.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run().await,
        Command::Once => cmd_once().await,
        Command::CheckConfig => cmd_check_config(),
        Command::TestAlert => cmd_test_alert().await,
    }
}

/// Load and validate configuration, logging the reason on failure.
fn load_config() -> anyhow::Result<Config> {
    info!("Loading configuration...");
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Build the monitor from configuration.
fn build_monitor(config: &Config) -> anyhow::Result<Monitor<StokerCloudClient, NtfyClient>> {
    let stoker = StokerCloudClient::new(config)?;
    let ntfy = NtfyClient::new(config)?;
    Ok(Monitor::new(SessionClient::new(stoker), ntfy, config))
}

/// Poll until a termination signal arrives.
async fn cmd_run() -> anyhow::Result<()> {
    let config = load_config()?;

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }

    info!("Configuration loaded successfully");
    info!("User: {}", config.stokercloud_user);
    info!("Low threshold: {:.1} kg", config.low_threshold_kg);
    match config.max_capacity_kg {
        Some(capacity) => info!("Capacity: {:.1} kg", capacity),
        None => info!("Capacity: not set, percentages disabled"),
    }
    info!("Check interval: {}s", config.check_interval_seconds);
    info!("Min alert interval: {} min", config.min_alert_interval_min);
    info!("Alerts: {}", config.ntfy_url());

    let mut monitor = build_monitor(&config)?;

    info!("Starting hopper monitor...");
    monitor.run(shutdown_signal()).await;
    info!("Hopper monitor stopped");

    Ok(())
}

/// Run one cycle and report its outcome.
async fn cmd_once() -> anyhow::Result<()> {
    let config = load_config()?;
    let mut monitor = build_monitor(&config)?;

    let outcome = monitor.tick(OffsetDateTime::now_utc()).await?;
    let report = outcome.report();

    println!("Hopper: {:.1} kg", report.kg);
    if let Some(percent) = report.percent {
        println!("Fill: {:.1}%", percent);
    }
    match outcome {
        CycleOutcome::Ok(_) => println!("Status: OK"),
        CycleOutcome::AlertSent(_) => println!("Status: LOW (alert sent)"),
        CycleOutcome::AlertSuppressed { .. } => println!("Status: LOW (alert throttled)"),
        CycleOutcome::AlertFailed { error, .. } => {
            println!("Status: LOW (alert failed: {})", error);
        }
    }

    Ok(())
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("HOPPER MONITOR - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  User: {}", config.stokercloud_user);
    println!("  Login URL: {}", config.stokercloud_login_url);
    println!("  Controller Data URL: {}", config.stokercloud_controllerdata_url);
    println!("  ntfy: {} (priority {})", config.ntfy_url(), config.ntfy_priority);
    println!("  Low Threshold: {:.1} kg", config.low_threshold_kg);
    match config.max_capacity_kg {
        Some(capacity) => println!("  Capacity: {:.1} kg", capacity),
        None => println!("  Capacity: not set"),
    }
    println!("  Check Interval: {}s", config.check_interval_seconds);
    println!("  Max Backoff: {}s", config.max_backoff_seconds);
    println!("  Min Alert Interval: {} min", config.min_alert_interval_min);
    println!("  Throttle Policy: {:?}", config.alert_throttle_policy);
    match config.metrics_port {
        Some(port) => println!("  Metrics: port {}", port),
        None => println!("  Metrics: disabled"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Send a test notification.
async fn cmd_test_alert() -> anyhow::Result<()> {
    let config = load_config()?;
    let ntfy = NtfyClient::new(&config)?;

    println!("Sending test notification to {}...", ntfy.url());
    ntfy.publish(
        "Test notification from hopper-monitor.",
        config.ntfy_priority,
        &config.ntfy_title,
    )
    .await?;
    println!("OK");

    Ok(())
}
