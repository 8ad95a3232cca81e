//! vault-init entry point

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vault_init::cli::Cli;
use vault_init::driver;
use vault_init_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Must be installed before any TLS client is built
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = Config::from_input(cli.into_config_input()).context("Invalid configuration")?;

    driver::run(config).await
}

/// Initialize tracing; `RUST_LOG` takes precedence over the flags
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("info"),
                1 => EnvFilter::new("debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
