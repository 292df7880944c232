//! # Node Configuration Files
//!
//! Loaders for the three files the node reads: the token genesis, the
//! authorizer key written by `keygen`, and `settle` batches. Each loader
//! returns an `anyhow` error naming the file it choked on.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use prosynergy_contracts::TokenGenesis;
use prosynergy_protocol::crypto::AuthorizerKeypair;

use crate::api::TransferBody;

/// Reads and validates a JSON genesis file.
pub fn load_genesis(path: &Path) -> Result<TokenGenesis> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read genesis file {}", path.display()))?;
    let genesis: TokenGenesis = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse genesis file {}", path.display()))?;
    genesis
        .validate()
        .with_context(|| format!("invalid genesis in {}", path.display()))?;
    Ok(genesis)
}

/// Reads a hex-encoded authorizer secret key.
pub fn load_authorizer_key(path: &Path) -> Result<AuthorizerKeypair> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    AuthorizerKeypair::from_hex(&raw)
        .with_context(|| format!("invalid authorizer key in {}", path.display()))
}

/// Writes a secret key as hex, readable by the owner only on Unix.
pub fn write_authorizer_key(path: &Path, keypair: &AuthorizerKeypair, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "refusing to overwrite existing key file {} (pass --force)",
            path.display()
        );
    }
    fs::write(path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write key file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to restrict permissions on {}", path.display()))?;
    }
    Ok(())
}

/// Reads a JSON array of transfers.
pub fn load_batch(path: &Path) -> Result<Vec<TransferBody>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse batch file {}", path.display()))
}
