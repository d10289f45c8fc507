use clap::Parser;
use common::config::Config;
use std::{error::Error, path::PathBuf};

use processing::executable_utils::{init_tracing, load_config, load_transactions, run_replay};

/// Scores a JSON file of transactions in memory and prints the dashboard.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ReplayArgs {
    /// JSON array of transactions
    #[arg(short, long)]
    input: PathBuf,

    /// Optional config file; built-in scoring defaults otherwise
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let args = ReplayArgs::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    init_tracing(&config.processor.log_level);

    let transactions = load_transactions(&args.input)?;
    tracing::info!(
        count = transactions.len(),
        input = %args.input.display(),
        "Replaying transactions"
    );

    let (state, metrics) = run_replay(&config, transactions).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "pipeline": state,
            "dashboard": metrics,
        }))?
    );
    Ok(())
}
