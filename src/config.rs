use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::store::StoreConfig;

const CONFIG_ENV: &str = "PITWALL_CONFIG";
const DEFAULT_CONFIG_FILES: &[&str] = &["config.toml", "config.json"];

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreSection,
    pub logging: LoggingSection,
    /// Flat `{ "url", "key" }` layout of older config.json files
    pub url: Option<String>,
    pub key: Option<String>,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV).ok().map(PathBuf::from).or_else(|| {
            DEFAULT_CONFIG_FILES
                .iter()
                .map(PathBuf::from)
                .find(|path| path.exists())
        });

        Self::load_from(config_path.as_deref())
    }

    /// Load configuration from an optional file plus `PITWALL__*` variables.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!("configuration file {} does not exist", path.display());
            }
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PITWALL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        // Fold the flat layout into store.rest
        if config.url.is_some() || config.key.is_some() {
            let rest = config.store.rest.get_or_insert_with(RestStoreSection::default);
            if rest.url.trim().is_empty() {
                if let Some(url) = config.url.take() {
                    rest.url = url;
                }
            }
            if rest.key.trim().is_empty() {
                if let Some(key) = config.key.take() {
                    rest.key = key;
                }
            }
        }

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        Ok(config)
    }

    /// Resolve and validate the data store configuration.
    pub fn store_runtime(&self) -> Result<StoreConfig> {
        self.store.to_runtime()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackendKind,
    pub rest: Option<RestStoreSection>,
    pub memory: Option<MemoryStoreSection>,
}

impl StoreSection {
    pub fn to_runtime(&self) -> Result<StoreConfig> {
        match self.backend {
            StoreBackendKind::Rest => {
                let rest = self
                    .rest
                    .clone()
                    .context("store.rest configuration required when backend is 'rest'")?;

                let url = rest.url.trim();
                if url.is_empty() {
                    bail!("store.rest.url must be specified");
                }
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    bail!("store.rest.url must be an http(s) URL, got '{}'", url);
                }
                if rest.key.trim().is_empty() {
                    bail!("store.rest.key must be specified");
                }

                let schema = rest.schema.and_then(|s| {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed.to_string())
                    }
                });

                Ok(StoreConfig::Rest {
                    url: url.to_string(),
                    key: rest.key.trim().to_string(),
                    schema,
                    timeout: rest
                        .timeout_secs
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs),
                })
            }
            StoreBackendKind::Memory => {
                let memory = self.memory.clone().unwrap_or_default();
                Ok(StoreConfig::Memory {
                    fixture: memory.fixture.map(PathBuf::from),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RestStoreSection {
    pub url: String,
    pub key: String,
    pub schema: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MemoryStoreSection {
    pub fixture: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest_section(url: &str, key: &str) -> StoreSection {
        StoreSection {
            backend: StoreBackendKind::Rest,
            rest: Some(RestStoreSection {
                url: url.into(),
                key: key.into(),
                ..Default::default()
            }),
            memory: None,
        }
    }

    #[test]
    fn test_rest_backend_requires_section() {
        assert!(AppConfig::default().store_runtime().is_err());
    }

    #[test]
    fn test_rest_backend_validates_url_and_key() {
        assert!(rest_section("", "key").to_runtime().is_err());
        assert!(rest_section("ftp://db", "key").to_runtime().is_err());
        assert!(rest_section("https://db.example.com", " ").to_runtime().is_err());
        assert!(rest_section("https://db.example.com", "key").to_runtime().is_ok());
    }

    #[test]
    fn test_memory_backend_without_fixture() {
        let section = StoreSection {
            backend: StoreBackendKind::Memory,
            ..Default::default()
        };
        match section.to_runtime().unwrap() {
            StoreConfig::Memory { fixture } => assert!(fixture.is_none()),
            other => panic!("unexpected store config: {other:?}"),
        }
    }
}
