//! Server state management

use std::sync::Arc;
use tellr_core::{AssistantService, EventHistory};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AssistantService>,
    /// Run events collected from the service, newest last
    pub history: Arc<EventHistory>,
}

impl AppState {
    pub fn new(service: AssistantService, history: Arc<EventHistory>) -> Self {
        Self {
            service: Arc::new(service),
            history,
        }
    }
}
