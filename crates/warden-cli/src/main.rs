mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use warden_jwt::{JwtProvider, MemoryRevocationBackend, RevocationManager};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);

    if let Commands::Keygen(args) = &cli.command {
        return commands::keygen(args);
    }

    let provider = open_provider(cli.config.as_deref())?;
    let result = match &cli.command {
        Commands::Issue(args) => commands::issue(&provider, args).await,
        Commands::Verify(args) => commands::verify(&provider, args).await,
        Commands::Jwks => commands::jwks(&provider),
        Commands::Keygen(args) => commands::keygen(args),
    };

    if let Some(manager) = provider.revocation_manager() {
        manager.close().await?;
    }
    result
}

fn open_provider(path: Option<&Path>) -> Result<JwtProvider> {
    let config = config::load(path)?;
    let backend = MemoryRevocationBackend::from_config(&config.revocation);
    let manager = RevocationManager::new(Arc::new(backend));

    JwtProvider::with_revocation(config.jwt, manager).context("Invalid JWT configuration")
}
