//! pitwall - a read-only HTTP API over Formula 1 history
//!
//! Every endpoint maps to exactly one declarative query against a hosted
//! PostgREST data store:
//! - Route table mapping path parameters to queries
//! - Query values encoded as PostgREST parameters
//! - Pluggable store backends (hosted REST, in-memory fixture)
//! - Uniform `{"error": ...}` envelope for every failure

pub mod api;
pub mod config;
pub mod error;
pub mod query;
pub mod store;

pub use error::{Error, Result};
