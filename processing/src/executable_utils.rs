use clap::Parser;
use common::config::{Config, MetricsConfig, ModelConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::{fs, net::SocketAddr, path::Path, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    estimator::{LinearModelEstimator, ModelEstimator},
    model::{DashboardMetrics, GenericError, Transaction},
    pipeline::{PipelineController, PipelineSettings, PipelineState},
    processor::Processor,
    storage::{AssessmentStore, InMemoryStorage, PostgresStorage},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/processor.yaml")]
    pub config: String,
}

/// Reads `.env`, parses the command line, loads the config and sets up tracing.
pub fn initialize_executable() -> Result<Config, GenericError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = load_config(&args.config)?;
    init_tracing(&config.processor.log_level);
    info!(config = %args.config, project = %config.common.project_name, "Loaded config");
    Ok(config)
}

/// Loads the config with `!include` layering; `DATABASE_URL` overrides the file.
pub fn load_config(path: &str) -> Result<Config, GenericError> {
    let mut config = Config::load_with_includes(path)?;
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        config.common.database_url = database_url;
    }
    Ok(config)
}

/// `RUST_LOG` wins over the configured level. Safe to call more than once.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn install_metrics_exporter(config: &MetricsConfig) -> Result<(), GenericError> {
    let Some(address) = &config.listen_address else {
        return Ok(());
    };
    let address: SocketAddr = address.parse()?;
    PrometheusBuilder::new().with_http_listener(address).install()?;
    info!(%address, "Prometheus exporter listening");
    Ok(())
}

pub fn load_estimator(
    config: &ModelConfig,
) -> Result<Option<Arc<dyn ModelEstimator>>, GenericError> {
    match &config.artifact_path {
        Some(path) => {
            let estimator = LinearModelEstimator::load(Path::new(path))?;
            Ok(Some(Arc::new(estimator)))
        }
        None => {
            info!("No model artifact configured, scoring with rules only");
            Ok(None)
        }
    }
}

pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>, GenericError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("failed to read transactions {}: {}", path.display(), e))?;
    let transactions: Vec<Transaction> = serde_json::from_str(&contents)?;
    Ok(transactions)
}

/// Runs the pipeline against PostgreSQL until ctrl-c or a fatal error.
pub async fn run_processor(config: Config) -> Result<(), GenericError> {
    install_metrics_exporter(&config.metrics)?;

    let storage = Arc::new(PostgresStorage::new(&config.common.database_url).await?);
    storage.initialize_schema().await?;
    let estimator = load_estimator(&config.model)?;

    let processor = Processor::new(&config.scoring, storage.clone(), storage, estimator)?;
    let settings = PipelineSettings::from(&config.processor);
    let controller = PipelineController::new(Arc::new(processor), settings);
    controller.start().await;

    let mut health = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown requested, finishing current batch");
                break;
            }
            _ = health.tick() => {
                if !controller.is_running() {
                    break;
                }
            }
        }
    }
    controller.stop_and_wait().await;

    let state = controller.status();
    info!(
        processed = state.transactions_processed,
        failed = state.transactions_failed,
        batches = state.batches_completed,
        "Processor stopped"
    );
    match state.last_error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Scores a fixed set of transactions in memory and reports the dashboard.
pub async fn run_replay(
    config: &Config,
    transactions: Vec<Transaction>,
) -> Result<(PipelineState, DashboardMetrics), GenericError> {
    let storage = Arc::new(InMemoryStorage::with_transactions(transactions));
    let estimator = load_estimator(&config.model)?;
    let processor = Processor::new(&config.scoring, storage.clone(), storage.clone(), estimator)?;
    let settings = PipelineSettings::from(&config.processor);
    let controller = PipelineController::new(Arc::new(processor), settings);

    let state = controller.run_until_idle().await?;
    let remaining = storage.unprocessed_count().await;
    if remaining > 0 {
        warn!(remaining, "Some transactions could not be scored");
    }
    let metrics = storage.dashboard_metrics().await?;
    Ok((state, metrics))
}
