use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::Directive, EnvFilter};

use trainloop::cli::Cli;

fn main() -> Result<()> {
    let directive: Directive = "trainloop=info".parse()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .init();

    Cli::parse().run()
}
