//! Data store abstraction layer
//!
//! Provides a unified interface over the hosted PostgREST endpoint and a
//! local in-memory store loaded from a JSON fixture.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Query;
use crate::Result;

pub mod memory;
pub mod rest;
pub mod schema;

/// Data store trait
///
/// One call is one round trip. `Err` means the round trip itself failed;
/// a query the store rejected comes back as `Ok` with `error` set.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Execute a read query
    async fn execute(&self, query: &Query) -> Result<StoreResponse>;

    /// Short backend name for diagnostics
    fn backend(&self) -> &'static str;
}

/// Rows plus an optional store-reported error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreResponse {
    pub data: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StoreError>,
}

impl StoreResponse {
    pub fn rows(data: Vec<Value>) -> Self {
        Self { data, error: None }
    }

    pub fn failed(error: StoreError) -> Self {
        Self {
            data: Vec::new(),
            error: Some(error),
        }
    }
}

/// Error body as reported by PostgREST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            hint: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Rest {
        url: String,
        key: String,
        schema: Option<String>,
        timeout: Option<Duration>,
    },
    Memory {
        fixture: Option<PathBuf>,
    },
}

/// Create data store from config
pub async fn create_store(config: StoreConfig) -> Result<Box<dyn DataStore>> {
    match config {
        StoreConfig::Rest {
            url,
            key,
            schema,
            timeout,
        } => {
            let store = rest::RestStore::new(&url, &key, schema, timeout)?;
            Ok(Box::new(store))
        }
        StoreConfig::Memory { fixture } => {
            let store = match fixture {
                Some(path) => memory::MemoryStore::from_fixture(&path).await?,
                None => memory::MemoryStore::new(),
            };
            Ok(Box::new(store))
        }
    }
}
