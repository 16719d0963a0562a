use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use credit_oracle::activity::{ActivityProvider, HttpActivityProvider, MockActivityProvider};
use credit_oracle::config::Config;
use credit_oracle::notifier::Notifier;
use credit_oracle::{monitoring, startup, Coordinator, OracleService, RegistryClient, ScoreRegistry};

#[derive(Parser, Debug)]
#[command(name = "credit-oracle", about = "Score wallets and publish scores to the on-chain registry")]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compute, submit and confirm a score for one wallet.
    Update { address: String },
    /// Whether the registry holds a score for the wallet.
    Check { address: String },
    /// Compute the score breakdown without submitting.
    Preview { address: String },
    /// Update several wallets sequentially and print the per-item report.
    Batch {
        #[arg(required = true)]
        addresses: Vec<String>,
    },
    /// Oracle balance and authorization (default).
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; deployed services get their environment directly.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let cfg = Config::from_env().context("invalid configuration")?;
    monitoring::init_tracing(&cfg.log_format);
    info!(?cfg, "boot");

    let registry: Arc<dyn ScoreRegistry> =
        Arc::new(RegistryClient::new(&cfg).context("cannot initialise registry client")?);
    let activity: Arc<dyn ActivityProvider> = match cfg.activity_api_url.clone() {
        Some(url) => Arc::new(HttpActivityProvider::new(url)),
        None => {
            info!("ACTIVITY_API_URL not set; using mock activity provider");
            Arc::new(MockActivityProvider)
        }
    };

    let notifier = Notifier::new(cfg.slack_webhook_url.clone());
    startup::verify(registry.as_ref(), cfg.min_balance_sol, &notifier).await;

    let coordinator = Coordinator::new(registry, activity)
        .with_batch_delay(cfg.batch_delay())
        .with_audit_log(cfg.score_audit_log.as_ref().map(PathBuf::from));
    let service = OracleService::new(Arc::new(coordinator))
        .with_batch_max_items(cfg.batch_max_items)
        .with_batch_retention(cfg.batch_retention)
        .with_min_balance(cfg.min_balance_sol);

    match args.command.unwrap_or(Cmd::Status) {
        Cmd::Update { address } => print_json(&service.update_score(&address).await?),
        Cmd::Check { address } => {
            let exists = service.check_score_exists(&address).await?;
            print_json(&serde_json::json!({ "address": address, "hasScore": exists }))
        }
        Cmd::Preview { address } => print_json(&service.preview_score(&address).await?),
        Cmd::Batch { addresses } => {
            let handle = service.batch_update(addresses).await?;
            print_json(&handle.ack)?;
            let report = handle.wait().await.context("batch task did not complete")?;
            print_json(&report)
        }
        Cmd::Status => print_json(&service.status().await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
