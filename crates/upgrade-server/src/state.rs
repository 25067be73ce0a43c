//! Application State

use std::sync::Arc;

use upgrade_core::CheckoutOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout flow (catalog, sessions, payment gateway)
    pub orchestrator: Arc<CheckoutOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: CheckoutOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}
