//! Signing key loading.
//!
//! Keys use the Solana CLI keypair format: a JSON array of 64 byte values
//! (secret key followed by public key). Secret bytes are zeroized after the
//! keypair is built.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use thiserror::Error;
use tracing::info;
use zeroize::Zeroizing;

/// Source of a secret key.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Keypair JSON held in an environment variable.
    EnvVar { var_name: String },
    /// Keypair JSON file (recommend 0600 permissions).
    File { path: PathBuf },
}

impl KeySource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        KeySource::File { path: path.into() }
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid keypair format: {0}")]
    InvalidFormat(String),

    #[error("Invalid keypair: {0}")]
    InvalidKey(String),
}

fn parse_keypair(content: &str) -> Result<Keypair, KeyError> {
    let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
        serde_json::from_str(content.trim())
            .map_err(|e| KeyError::InvalidFormat(e.to_string()))?,
    );
    if bytes.len() != 64 {
        return Err(KeyError::InvalidFormat(format!(
            "expected 64 bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::from_bytes(&bytes).map_err(|e| KeyError::InvalidKey(e.to_string()))
}

/// Load one keypair. Never logs key material, only the public key.
pub fn load_keypair(source: &KeySource) -> Result<Keypair, KeyError> {
    let content: Zeroizing<String> = match source {
        KeySource::EnvVar { var_name } => Zeroizing::new(
            std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
        ),
        KeySource::File { path } => {
            Zeroizing::new(std::fs::read_to_string(path).map_err(|source| KeyError::Io {
                path: path.clone(),
                source,
            })?)
        }
    };
    let keypair = parse_keypair(&content)?;
    info!(pubkey = %keypair.pubkey(), "Loaded keypair");
    Ok(keypair)
}

/// Load keypair files in the given order, shared for repeated signing.
pub fn load_keypairs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Arc<Keypair>>, KeyError> {
    paths
        .iter()
        .map(|p| load_keypair(&KeySource::file(p.as_ref())).map(Arc::new))
        .collect()
}
