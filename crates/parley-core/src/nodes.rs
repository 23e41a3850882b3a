//! Bootstrap node list.
//!
//! Accepts either a bare JSON array of node records or an object with a
//! `nodes` array (the layout of the public node list). Entries that do not
//! parse or carry an invalid key are skipped with a warning.

use crate::address::parse_public_key;
use crate::error::{Error, Result};
use crate::transport::PublicKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A well-known peer used to join the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapNode {
    /// Host name or IP address.
    #[serde(alias = "ipv4")]
    pub address: String,
    /// UDP port.
    pub port: u16,
    /// Node's public key, 64 hex characters.
    pub public_key: String,
    /// Who runs the node.
    #[serde(default)]
    pub maintainer: Option<String>,
}

impl BootstrapNode {
    /// Decoded public key.
    pub fn key(&self) -> Result<PublicKey> {
        parse_public_key(&self.public_key)
    }

    fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() || self.address == "-" {
            return Err(Error::Bootstrap("empty address".into()));
        }
        if self.port == 0 {
            return Err(Error::Bootstrap("port 0".into()));
        }
        self.key().map(|_| ())
    }
}

/// Where the supervisor gets its bootstrap nodes from.
#[async_trait]
pub trait NodeSource: Send + Sync + 'static {
    /// Load the current node list.
    async fn load(&self) -> Result<Vec<BootstrapNode>>;
}

/// A fixed list of nodes.
#[derive(Debug, Clone, Default)]
pub struct StaticNodes(pub Vec<BootstrapNode>);

#[async_trait]
impl NodeSource for StaticNodes {
    async fn load(&self) -> Result<Vec<BootstrapNode>> {
        Ok(self.0.clone())
    }
}

/// A JSON node list on disk, re-read on every load.
#[derive(Debug, Clone)]
pub struct JsonNodeFile {
    path: PathBuf,
}

impl JsonNodeFile {
    /// Read nodes from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NodeSource for JsonNodeFile {
    async fn load(&self) -> Result<Vec<BootstrapNode>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Bootstrap(format!("{}: {}", self.path.display(), e)))?;
        parse_nodes(&text)
    }
}

/// Parse a node list, skipping malformed entries.
pub fn parse_nodes(json: &str) -> Result<Vec<BootstrapNode>> {
    let value: Value = serde_json::from_str(json)?;
    let entries = match &value {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("nodes") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(Error::Bootstrap("missing `nodes` array".into())),
        },
        _ => return Err(Error::Bootstrap("node list is not an array".into())),
    };

    let mut nodes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let node = match BootstrapNode::deserialize(entry) {
            Ok(node) => node,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed bootstrap node");
                continue;
            }
        };
        if let Err(e) = node.validate() {
            warn!(index, address = %node.address, error = %e, "Skipping invalid bootstrap node");
            continue;
        }
        nodes.push(node);
    }

    debug!(count = nodes.len(), total = entries.len(), "Parsed bootstrap nodes");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "F404ABAA1C99A9D37D61AB54898F56793E1DEF8BD46B1038B9D822E8460FAB67";

    #[test]
    fn test_parse_array() {
        let json = format!(
            r#"[{{"address": "node.example.org", "port": 33445, "public_key": "{}", "maintainer": "alice"}}]"#,
            KEY
        );
        let nodes = parse_nodes(&json).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].port, 33445);
        assert_eq!(nodes[0].maintainer.as_deref(), Some("alice"));
        assert!(nodes[0].key().is_ok());
    }

    #[test]
    fn test_parse_object_with_ipv4_alias() {
        let json = format!(
            r#"{{"last_scan": 0, "nodes": [{{"ipv4": "1.2.3.4", "port": 443, "public_key": "{}"}}]}}"#,
            KEY
        );
        let nodes = parse_nodes(&json).unwrap();
        assert_eq!(nodes[0].address, "1.2.3.4");
        assert!(nodes[0].maintainer.is_none());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let json = format!(
            r#"[
                {{"address": "ok.example", "port": 1, "public_key": "{key}"}},
                {{"address": "no-port.example", "public_key": "{key}"}},
                {{"address": "bad-key.example", "port": 2, "public_key": "XYZ"}},
                {{"address": "", "port": 3, "public_key": "{key}"}},
                "not an object",
                {{"address": "also-ok.example", "port": 4, "public_key": "{key}"}}
            ]"#,
            key = KEY
        );
        let nodes = parse_nodes(&json).unwrap();
        let addresses: Vec<_> = nodes.iter().map(|n| n.address.as_str()).collect();
        assert_eq!(addresses, vec!["ok.example", "also-ok.example"]);
    }

    #[test]
    fn test_unparsable_list_is_error() {
        assert!(matches!(parse_nodes("{ nope"), Err(Error::Bootstrap(_))));
        assert!(matches!(parse_nodes("42"), Err(Error::Bootstrap(_))));
        assert!(matches!(parse_nodes(r#"{"nodes": 1}"#), Err(Error::Bootstrap(_))));
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(
            &path,
            format!(r#"[{{"address": "a", "port": 1, "public_key": "{}"}}]"#, KEY),
        )
        .unwrap();

        assert_eq!(JsonNodeFile::new(&path).load().await.unwrap().len(), 1);
        assert!(JsonNodeFile::new(dir.path().join("missing.json"))
            .load()
            .await
            .is_err());
    }
}
