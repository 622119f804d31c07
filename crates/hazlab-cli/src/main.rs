//! hazlab - query seismic hazard curves from a hazard store.

use clap::Parser;
use hazlab_cli::{run, Cli, CliError, Config, Context};
use hazlab_data::HttpHazardStore;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "hazlab=debug,hazlab_cli=debug,hazlab_data=debug"
    } else {
        "hazlab=info,hazlab_cli=info,hazlab_data=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute(&cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn execute(cli: &Cli) -> Result<(), CliError> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(url) = &cli.store_url {
        config.store.url = url.clone();
    }
    debug!(url = %config.store.url, vs30 = ?config.vs30, "resolved configuration");

    install_metrics(cli);

    let store = HttpHazardStore::with_options(
        config.store.url.clone(),
        config.store.api_key.clone(),
        config.store.timeout(),
    )?;
    let ctx = Context::new(config, Arc::new(store));

    let output = run(&ctx, &cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(feature = "prometheus")]
fn install_metrics(cli: &Cli) {
    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = hazlab_metrics::install_prometheus(addr) {
            tracing::warn!("failed to start metrics exporter: {}", e);
        }
    }
    hazlab_metrics::describe_metrics();
}

#[cfg(not(feature = "prometheus"))]
fn install_metrics(_cli: &Cli) {
    hazlab_metrics::describe_metrics();
}
