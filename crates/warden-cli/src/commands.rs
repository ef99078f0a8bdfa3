use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use tracing::debug;
use warden_jwt::keys::{
    generate_ecdsa_key_pair, generate_ed25519_key_pair, generate_rsa_key_pair,
};
use warden_jwt::{JwtProvider, SigningAlgorithm, generate_token_id};

use crate::cli::{IssueArgs, KeygenArgs, VerifyArgs};
use crate::output::{print_json, print_success};

pub fn keygen(args: &KeygenArgs) -> Result<()> {
    let algorithm: SigningAlgorithm = args.algorithm.parse()?;

    if algorithm.is_hmac() {
        let secret = generate_token_id();
        match &args.out {
            Some(out) => {
                let path = with_suffix(out, ".secret");
                write_private(&path, secret.as_bytes())?;
                print_success(&format!("Wrote {} secret to {}", algorithm, path.display()));
            }
            None => println!("{secret}"),
        }
        return Ok(());
    }

    let pair = if algorithm.is_rsa() {
        generate_rsa_key_pair(args.bits)?
    } else if let Some(curve) = algorithm.curve() {
        generate_ecdsa_key_pair(curve)?
    } else {
        generate_ed25519_key_pair()?
    };
    debug!(%algorithm, "Generated key pair");

    match &args.out {
        Some(out) => {
            let private_path = with_suffix(out, ".key.pem");
            let public_path = with_suffix(out, ".pub.pem");
            write_private(&private_path, pair.private_pem.as_bytes())?;
            fs::write(&public_path, &pair.public_pem)
                .with_context(|| format!("Failed to write {}", public_path.display()))?;
            print_success(&format!(
                "Wrote {} key pair to {} and {}",
                algorithm,
                private_path.display(),
                public_path.display()
            ));
        }
        None => print!("{}{}", pair.private_pem.as_str(), pair.public_pem),
    }
    Ok(())
}

pub async fn issue(provider: &JwtProvider, args: &IssueArgs) -> Result<()> {
    let data = match &args.data {
        Some(raw) => parse_data(raw)?,
        None => Map::new(),
    };
    let token = provider.generate(&args.subject, data).await?;
    println!("{token}");
    Ok(())
}

pub async fn verify(provider: &JwtProvider, args: &VerifyArgs) -> Result<()> {
    let token = match args.token.as_deref() {
        Some(token) if token != "-" => token.to_string(),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read token from stdin")?;
            buf
        }
    };

    let claims = provider.parse(token.trim()).await?;
    print_json(&claims)
}

pub fn jwks(provider: &JwtProvider) -> Result<()> {
    println!("{}", provider.jwks()?.to_json()?);
    Ok(())
}

fn parse_data(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("--data must be valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("--data must be a JSON object"),
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes key material readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
