//! CLI command implementations.

use anyhow::{bail, Context, Result};
use parley_core::address::{parse_public_key, public_key_hex};
use parley_core::nodes::{JsonNodeFile, NodeSource};
use parley_core::{SessionConfig, ToxAddress};
use std::path::PathBuf;

/// Parse an 8-character hex nospam.
fn parse_nospam(nospam: &str) -> Result<u32> {
    let nospam = nospam.trim();
    if nospam.len() != 8 {
        bail!("Nospam must be 8 hex characters (got {})", nospam.len());
    }
    u32::from_str_radix(nospam, 16).context("Nospam is not valid hex")
}

/// Print the identity for a public key and nospam.
pub fn address(public_key: &str, nospam: &str) -> Result<()> {
    let key = parse_public_key(public_key).context("Invalid public key")?;
    let address = ToxAddress::new(key, parse_nospam(nospam)?);
    println!("{}", address);
    Ok(())
}

/// Validate an identity string and print its parts.
pub fn verify(address: &str) -> Result<()> {
    let address: ToxAddress = address.parse().context("Identity verification failed")?;

    println!("Identity is valid");
    println!("  Public key: {}", public_key_hex(address.public_key()));
    println!("  Nospam:     {:08X}", address.nospam());
    Ok(())
}

/// Load a node list and print the usable entries.
pub async fn nodes(path: Option<PathBuf>) -> Result<()> {
    let Some(path) = path else {
        bail!("No node list given and none configured");
    };

    let nodes = JsonNodeFile::new(&path)
        .load()
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;

    for node in &nodes {
        match &node.maintainer {
            Some(maintainer) => println!("{}:{}  ({})", node.address, node.port, maintainer),
            None => println!("{}:{}", node.address, node.port),
        }
    }
    println!("{} usable node(s)", nodes.len());

    if nodes.is_empty() {
        bail!("No usable bootstrap nodes in {}", path.display());
    }
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn show_config(config: &SessionConfig) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", text);
    Ok(())
}
