//! sitegrab entry point.
//!
//! Boots logging, resolves configuration (defaults, config file, env, then
//! CLI flags), resolves the sitelist, and hands everything to the pipeline.
//! Fatal setup errors exit with code 1; per-site failures never do.

use anyhow::Result;
use clap::Parser;
use sitegrab_core::GrabConfig;
use tracing_subscriber::EnvFilter;

mod cli;
mod pipeline;
mod watchdog;
mod writer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    let mut config = GrabConfig::load()?;
    args.apply(&mut config);
    config.validate()?;

    let sites = cli::resolve_sitelist(&args.sitelist)?;
    tracing::info!(
        sites = sites.len(),
        parallel = config.parallel,
        format = %config.format,
        compress = config.compress,
        records_per_file = config.records_per_file,
        "starting grab"
    );

    if config.mem_limit_bytes > 0 {
        watchdog::spawn(config.mem_limit_bytes);
    }

    pipeline::run(config, sites).await?;

    Ok(())
}
