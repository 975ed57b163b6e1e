//! Shared application state for the HTTP server.

use std::sync::Arc;

use agent::io::gateway::Gateway;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Model gateway used by the planning endpoint.
    pub gateway: Arc<dyn Gateway + Send + Sync>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn Gateway + Send + Sync>) -> Self {
        Self { gateway }
    }
}
