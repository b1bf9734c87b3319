//! tally: periodic batch updater for test-results dashboards.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tally_cli::{args, updater};
use tally_store::StorageClient;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = args::Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(mut cli: args::Cli) -> anyhow::Result<()> {
    cli.validate()?;

    let client = Arc::new(StorageClient::gcs(cli.gcp_service_account.clone()));
    let cfg = updater::read_config(&client, &cli.config)
        .await
        .with_context(|| format!("failed to read {}", cli.config))?;

    let opts = updater::UpdaterOpts {
        confirm: cli.confirm,
        ..updater::UpdaterOpts::default()
    };
    updater::update_all(
        client,
        &cfg,
        &cli.config,
        cli.test_group.as_deref(),
        cli.group_concurrency,
        &opts,
    )
    .await
}
