use anyhow::Context;
use clap::Parser;
use clood::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .context("initializing tracing subscriber")?;

    let cli = Cli::parse();
    let code = clood::cli::run(cli).await;
    std::process::exit(code);
}
