use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Issue, verify and inspect signed JWTs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML config file with [jwt] and [revocation] tables
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, env = "WARDEN_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate signing key material for an algorithm
    Keygen(KeygenArgs),
    /// Issue a token for a subject
    Issue(IssueArgs),
    /// Verify a token and print its claims
    Verify(VerifyArgs),
    /// Print the JWK Set for the configured key
    Jwks,
}

#[derive(clap::Args)]
pub struct KeygenArgs {
    /// Algorithm the key is for (HS256, RS256, ES384, EdDSA, ...)
    #[arg(short, long, default_value = "ES256")]
    pub algorithm: String,

    /// RSA modulus size in bits
    #[arg(long, default_value_t = 2048)]
    pub bits: usize,

    /// Write `<out>.key.pem` and `<out>.pub.pem` instead of printing
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct IssueArgs {
    /// Token subject
    #[arg(short, long)]
    pub subject: String,

    /// Custom data as a JSON object
    #[arg(short, long)]
    pub data: Option<String>,
}

#[derive(clap::Args)]
pub struct VerifyArgs {
    /// The token; read from stdin when omitted or "-"
    pub token: Option<String>,
}
