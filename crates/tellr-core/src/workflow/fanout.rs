//! Concurrent capability fan-out
//!
//! Runs several capabilities at once on tokio's blocking pool. Each task has its
//! own error boundary: an adapter error or panic is recorded for that
//! capability and never affects the others. This sits beside the linear state
//! machine; runs never use it.

use crate::capabilities::{Capability, CapabilitySet, StepPayload};
use crate::events::now_millis;
use serde::Serialize;
use std::collections::BTreeMap;

/// Successes and failures of one fan-out, collected independently
#[derive(Debug, Clone, Default, Serialize)]
pub struct FanOutReport {
    pub results: BTreeMap<Capability, StepPayload>,
    pub errors: BTreeMap<Capability, String>,
    /// Milliseconds since the Unix epoch when the fan-out completed
    pub timestamp: u64,
}

impl FanOutReport {
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Invoke each capability with its query concurrently
pub async fn fan_out(capabilities: &CapabilitySet, tasks: BTreeMap<Capability, String>) -> FanOutReport {
    let handles = tasks.into_iter().map(|(capability, query)| {
        let set = capabilities.clone();
        let handle = tokio::task::spawn_blocking(move || set.invoke(capability, &query));
        async move { (capability, handle.await) }
    });

    let mut report = FanOutReport::default();
    for (capability, outcome) in futures::future::join_all(handles).await {
        match outcome {
            Ok(Ok(payload)) => {
                report.results.insert(capability, payload);
            }
            Ok(Err(e)) => {
                tracing::warn!(capability = %capability, error = %e, "fan-out task failed");
                report.errors.insert(capability, e.message);
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("{} capability panicked", capability)
                } else {
                    format!("{} capability was cancelled", capability)
                };
                tracing::error!(capability = %capability, "{}", message);
                report.errors.insert(capability, message);
            }
        }
    }

    report.timestamp = now_millis();
    report
}
