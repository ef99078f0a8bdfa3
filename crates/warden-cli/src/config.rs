use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use warden_jwt::{JwtConfig, RevocationConfig};

/// Contents of the CLI config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub jwt: JwtConfig,
    pub revocation: RevocationConfig,
}

/// Loads `path`, or the defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<WardenConfig> {
    let Some(path) = path else {
        return Ok(WardenConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
}
