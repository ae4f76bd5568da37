//! catalog-extract CLI - catalog-driven batched extract-load runs.

use catalog_extract::catalog::OdbcCatalog;
use catalog_extract::orchestrator::health_check;
use catalog_extract::{
    CatalogStore, Config, ExtractError, ExtractOrchestrator, LogNotifier, RunContext,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Base name of the daily-rotated log file written under `--log-dir`.
const LOG_FILE_PREFIX: &str = "extract.log";

#[derive(Parser)]
#[command(name = "catalog-extract")]
#[command(about = "Catalog-driven batched extract-load from an ODBC source")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every active catalog table into the target
    Run {
        /// Override the catalog source database tag
        #[arg(long)]
        source_db_tag: Option<String>,

        /// Override the number of rows per fetch
        #[arg(long)]
        fetch_size: Option<usize>,

        /// Dry run: read the catalog and print generated statements without moving data
        #[arg(long)]
        dry_run: bool,
    },

    /// Test control, source and target connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExtractError> {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed.
    let logging = setup_logging(&cli.verbosity, &cli.log_format, cli.log_dir.as_deref())?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;

    match cli.command {
        Commands::Run {
            source_db_tag,
            fetch_size,
            dry_run,
        } => {
            if let Some(tag) = source_db_tag {
                config.extract.source_db_tag = tag;
            }
            if let Some(size) = fetch_size {
                config.extract.fetch_size = size;
            }
            config.validate()?;

            let orchestrator = ExtractOrchestrator::new(config)
                .with_log_ref(logging.log_ref.clone())
                .with_cancellation(cancel_token);

            if dry_run {
                return dry_run_plan(&orchestrator, cli.output_json).await;
            }

            let ctx = match RunContext::connect(orchestrator.config()).await {
                Ok(ctx) => ctx,
                Err(e) => {
                    orchestrator.notify_failure(&LogNotifier, &e).await;
                    return Err(e);
                }
            };

            let result = orchestrator.run(ctx).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nExtract completed!");
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                println!(
                    "  Tables: {}/{}",
                    result.tables_processed, result.tables_total
                );
                println!("  Rows read: {}", result.rows_read);
                println!("  Rows written: {}", result.rows_written);
            }
        }

        Commands::HealthCheck => {
            let results = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                println!("Health Check Results:");
                for status in &results {
                    println!(
                        "  {}: {}",
                        status.role,
                        if status.ok { "OK" } else { "FAILED" }
                    );
                    if let Some(ref err) = status.error {
                        println!("    Error: {}", err);
                    }
                }
            }

            let failed: Vec<&str> = results
                .iter()
                .filter(|s| !s.ok)
                .map(|s| s.role.as_str())
                .collect();
            if !failed.is_empty() {
                return Err(ExtractError::connection(
                    failed.join(", "),
                    "health check failed",
                ));
            }
        }
    }

    Ok(())
}

/// Read the catalog and print the statements each table would run.
async fn dry_run_plan(orchestrator: &ExtractOrchestrator, output_json: bool) -> Result<(), ExtractError> {
    let config = orchestrator.config();
    let catalog = OdbcCatalog::connect(&config.control, &config.extract.catalog_table).await?;
    let plans = orchestrator.plan(&catalog).await;
    catalog.close().await;
    let plans = plans?;

    if output_json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    println!("Dry run: {} table(s) would be extracted\n", plans.len());
    for plan in &plans {
        println!("{} ({}, {})", plan.table, plan.step_name, plan.insert_mode);
        println!("  {}", plan.select);
        println!("  TRUNCATE TABLE {}", plan.target_table);
        println!("  {}", plan.insert);
        if let Some(ref procedure) = plan.post_load_procedure {
            println!("  {}", procedure);
        }
    }
    if let Some(ref procedure) = config.extract.final_procedure {
        println!("\nFinal procedure: {}", procedure);
    }
    Ok(())
}

/// Installed logging. `log_ref` is quoted in failure notifications.
struct Logging {
    log_ref: String,
    _guard: Option<WorkerGuard>,
}

fn setup_logging(verbosity: &str, format: &str, log_dir: Option<&Path>) -> Result<Logging, ExtractError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = format == "json";

    let stderr_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard, log_ref) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = if json {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed()
            } else {
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed()
            };
            let log_ref = dir
                .join(format!(
                    "{}.{}",
                    LOG_FILE_PREFIX,
                    chrono::Utc::now().format("%Y-%m-%d")
                ))
                .display()
                .to_string();
            (Some(layer), Some(guard), log_ref)
        }
        None => (None, None, "stderr".to_string()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ExtractError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(Logging {
        log_ref,
        _guard: guard,
    })
}

/// Exit if the run has not stopped `timeout` seconds after cancellation.
fn spawn_shutdown_deadline(token: CancellationToken, timeout: u64) {
    tokio::spawn(async move {
        token.cancelled().await;
        tokio::time::sleep(Duration::from_secs(timeout)).await;
        eprintln!("Shutdown timeout of {}s exceeded, exiting", timeout);
        std::process::exit(i32::from(catalog_extract::error::EXIT_CANCELLED));
    });
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (scheduler shutdown).
/// The run stops at the next batch boundary once the token is cancelled.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, ExtractError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        warn!("Received {}, stopping after the current batch", name);
        eprintln!(
            "\nReceived {}. Shutting down gracefully (timeout: {}s)...",
            name, shutdown_timeout
        );
        token.cancel();
    });

    spawn_shutdown_deadline(cancel_token.clone(), shutdown_timeout);
    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, ExtractError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    spawn_shutdown_deadline(cancel_token.clone(), shutdown_timeout);
    Ok(cancel_token)
}
