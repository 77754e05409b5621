//! crosslist - cross-platform marketplace listing orchestration
//!
//! This is the main entry point for the crosslist command-line tool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crosslist::config::Config;
use crosslist::models::{
    AggregatedResult, DateRange, ListingPatch, ListingRecord, OperationOutcome,
};
use crosslist::orchestrator::{
    CrossListingOrchestrator, HealthReport, ListingLocks, OrchestratorConfig,
};
use crosslist::platforms::build_adapters;
use crosslist::reconcile::{
    ReconcileReport, ReconcileScheduler, ReconcilerConfig, SchedulerConfig, SyncReconciler,
};
use crosslist::repository::SqliteRepository;
use crosslist::sales::SalesAggregator;
use crosslist::throttle::{RateLimiter, RetryPolicy};

/// crosslist - manage one inventory across several marketplaces
#[derive(Parser, Debug)]
#[command(name = "crosslist")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CROSSLIST_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a listing on the target platforms from a JSON file
    Create {
        /// Path to the listing record JSON
        #[arg(long)]
        file: PathBuf,

        /// Target platforms (defaults to every enabled platform)
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
    },

    /// Update a listing's fields on the target platforms
    Update {
        /// Inventory identifier of the listing
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long)]
        quantity: Option<u32>,

        /// Target platforms (defaults to every enabled platform)
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
    },

    /// Delete a listing from the target platforms
    Delete {
        /// Inventory identifier of the listing
        id: String,

        /// Target platforms (defaults to every enabled platform)
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
    },

    /// Run one reconciliation pass now
    Sync,

    /// Run the reconciliation scheduler until interrupted
    Watch,

    /// Report sales across every platform for a trailing window
    Sales {
        /// Window length in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Query the health of every platform
    Health,
}

/// Everything the commands need, wired once from configuration
struct App {
    config: Config,
    orchestrator: CrossListingOrchestrator<SqliteRepository>,
    reconciler: Arc<SyncReconciler<SqliteRepository>>,
    aggregator: SalesAggregator<SqliteRepository>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting crosslist");

    let app = build_app(config).await?;

    match args.command {
        Command::Create { file, platforms } => {
            let payload = std::fs::read_to_string(&file)?;
            let mut record: ListingRecord = serde_json::from_str(&payload)?;
            let targets = resolve_targets(&app.config, platforms);

            let result = app.orchestrator.create_listing(&mut record, &targets).await?;
            print_result(&record.id, &result);
        }
        Command::Update {
            id,
            title,
            description,
            price,
            quantity,
            platforms,
        } => {
            let patch = ListingPatch {
                title,
                description,
                price,
                quantity,
                condition: None,
            };
            let targets = resolve_targets(&app.config, platforms);

            let result = app.orchestrator.update_listing(&id, &patch, &targets).await?;
            print_result(&id, &result);
        }
        Command::Delete { id, platforms } => {
            let targets = resolve_targets(&app.config, platforms);

            let result = app.orchestrator.delete_listing(&id, &targets).await?;
            print_result(&id, &result);
        }
        Command::Sync => {
            let report = app.reconciler.run_pass().await?;
            print_sync_report(&report);
        }
        Command::Watch => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
            let scheduler = ReconcileScheduler::new(
                SchedulerConfig::from_sync(&app.config.sync),
                Arc::clone(&app.reconciler) as Arc<dyn crosslist::reconcile::Reconciles>,
                shutdown_rx,
            );

            let handle = tokio::spawn(scheduler.run());
            shutdown_signal().await;
            let _ = shutdown_tx.send(());
            let _ = handle.await;
        }
        Command::Sales { days } => {
            let report = app.aggregator.report(DateRange::last_days(days)).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "summary": {
                        "total_sales": report.summary.total_sales,
                        "total_gross": report.summary.total_gross,
                        "total_fees": report.summary.total_fees,
                        "total_net": report.summary.total_net,
                        "average_sale": report.summary.average_sale,
                        "profit_margin": report.summary.profit_margin,
                    },
                    "platforms": report.breakdown.iter().map(|(name, sales)| {
                        (name.clone(), serde_json::json!({
                            "sales_count": sales.sales_count,
                            "gross_amount": sales.gross_amount,
                            "fees": sales.fees,
                            "net_amount": sales.net_amount,
                        }))
                    }).collect::<serde_json::Map<_, _>>(),
                    "failed_platforms": report.failures.iter()
                        .map(|(name, err)| serde_json::json!({"platform": name, "error": err.to_string()}))
                        .collect::<Vec<_>>(),
                }))?
            );
        }
        Command::Health => {
            let report = app.orchestrator.platform_health().await;
            print_health(&report);
        }
    }

    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Wire the components out of one configuration
async fn build_app(config: Config) -> anyhow::Result<App> {
    let repository = Arc::new(SqliteRepository::new(&config.database.path).await?);
    info!(path = %config.database.path, "Repository initialized");

    let adapters = build_adapters(&config);
    info!(platforms = adapters.len(), "Platform adapters initialized");

    let mut limiter_builder = RateLimiter::builder();
    let mut policies = HashMap::new();
    for (name, platform_cfg) in &config.platforms {
        if !platform_cfg.enabled {
            continue;
        }
        limiter_builder = limiter_builder.bucket(name, &platform_cfg.rate_limit());
        policies.insert(name.clone(), RetryPolicy::new(platform_cfg.retry()));
    }
    let limiter = Arc::new(limiter_builder.build());
    let locks = Arc::new(ListingLocks::new());

    let orchestrator = CrossListingOrchestrator::new(
        adapters.clone(),
        Arc::clone(&limiter),
        policies.clone(),
        Arc::clone(&repository),
        Arc::clone(&locks),
        OrchestratorConfig::from_global(&config.global),
    );

    let reconciler = Arc::new(SyncReconciler::new(
        adapters.clone(),
        Arc::clone(&limiter),
        policies.clone(),
        Arc::clone(&repository),
        Arc::clone(&locks),
        ReconcilerConfig::from_global(&config.global),
    ));

    let aggregator = SalesAggregator::new(
        adapters,
        Arc::clone(&limiter),
        policies,
        Arc::clone(&repository),
    );

    Ok(App {
        config,
        orchestrator,
        reconciler,
        aggregator,
    })
}

/// Fall back to every enabled platform when none were named
fn resolve_targets(config: &Config, platforms: Vec<String>) -> Vec<String> {
    if platforms.is_empty() {
        config.enabled_platforms()
    } else {
        platforms
    }
}

fn outcome_json(outcome: &OperationOutcome) -> serde_json::Value {
    serde_json::json!({
        "platform": outcome.platform(),
        "succeeded": outcome.succeeded(),
        "remote_id": outcome.remote_id(),
        "error": outcome.error().map(|e| e.to_string()),
        "error_kind": outcome.error().map(|e| e.kind()),
        "latency_ms": outcome.latency().as_millis() as u64,
        "retries": outcome.retries(),
    })
}

fn print_result(listing_id: &str, result: &AggregatedResult) {
    let value = serde_json::json!({
        "listing_id": listing_id,
        "status": result.status().label(),
        "outcomes": result.outcomes().iter().map(outcome_json).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value).expect("JSON output"));
}

fn print_sync_report(report: &ReconcileReport) {
    let value = serde_json::json!({
        "listings_checked": report.listings_checked,
        "applied": report.applied,
        "divergences": report.divergences,
        "failed_platforms": report.failures.iter()
            .map(|(name, err)| serde_json::json!({"platform": name, "error": err.to_string()}))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value).expect("JSON output"));
}

fn print_health(report: &HealthReport) {
    let value = serde_json::json!({
        "overall_healthy": report.overall_healthy,
        "platforms": report.platforms.iter().map(|(name, health)| {
            (name.clone(), serde_json::json!({
                "healthy": health.healthy,
                "response_time_ms": health.response_time.as_millis() as u64,
                "error": health.error,
            }))
        }).collect::<serde_json::Map<_, _>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value).expect("JSON output"));
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
