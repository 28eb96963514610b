//! crtc-ml - Main Entry Point
//!
//! Trains and evaluates CLAS12 track classifiers from SVM-light data.

use clap::Parser;
use crtc_ml::cli::{cmd_test, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crtc_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Train(args) => cmd_train(args)?,
        Commands::Test(args) => cmd_test(args)?,
    }

    Ok(())
}
