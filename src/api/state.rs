//! API server state

use std::sync::Arc;

use crate::store::DataStore;

/// API server state
///
/// Built once at startup; handlers only read through it.
#[derive(Clone)]
pub struct AppState {
    /// Data store shared by every request
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }
}
