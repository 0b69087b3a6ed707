//! CLI configuration loaded from ~/.portico/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PorticoConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the gateway listens on
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Where multipart uploads are materialized; defaults to
    /// `<config dir>/uploads` when unset
    #[serde(default)]
    pub uploads_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            uploads_dir: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7770".to_string()
}

impl PorticoConfig {
    /// Load from an explicit path, or from the default config location.
    /// A missing file yields the defaults.
    pub async fn load(path: Option<&PathBuf>) -> Result<Self> {
        let path = match path {
            Some(p) => p.clone(),
            None => config_dir().join("config.toml"),
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Resolved uploads directory
    pub fn uploads_dir(&self) -> PathBuf {
        self.gateway
            .uploads_dir
            .clone()
            .unwrap_or_else(|| config_dir().join("uploads"))
    }
}

/// Config directory: ~/.portico
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".portico")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PorticoConfig::default();
        assert_eq!(config.gateway.bind, "127.0.0.1:7770");
        assert!(config.gateway.uploads_dir.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: PorticoConfig = toml::from_str(
            r#"
            [gateway]
            bind = "0.0.0.0:8080"
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.bind, "0.0.0.0:8080");
        assert!(config.gateway.uploads_dir.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: PorticoConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.bind, "127.0.0.1:7770");
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nope.toml");
        let config = PorticoConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.gateway.bind, "127.0.0.1:7770");
    }

    #[tokio::test]
    async fn test_load_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nbind = \"127.0.0.1:9999\"\n").unwrap();
        let config = PorticoConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.gateway.bind, "127.0.0.1:9999");
    }
}
