//! Run events
//!
//! The orchestrator reports progress as [`RunEvent`]s over a crossbeam channel.
//! Observers (event history, log sinks) live outside the core; a run never
//! waits on them.

use crate::capabilities::Capability;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    RunStarted {
        question: String,
    },

    PlanChosen {
        plan: Vec<Capability>,
        /// "oracle" or "heuristic"
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },

    GuardrailDecided {
        allowed: bool,
        reason: String,
    },

    QueryRefined {
        capability: Capability,
        query: String,
        /// False when the refiner fell back to the previous query
        changed: bool,
    },

    StepCompleted {
        capability: Capability,
        step: usize,
        elapsed_ms: u64,
    },

    StepFailed {
        capability: Capability,
        error: String,
    },

    RunFinished {
        steps: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        elapsed_ms: u64,
    },
}

/// A timestamped event for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl RunEvent {
    pub fn new(run_id: RunId, kind: EventKind) -> Self {
        Self {
            run_id,
            timestamp: now_millis(),
            kind,
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Event channel using bounded crossbeam channels
///
/// Producers use `try_send`, so a full channel drops events instead of
/// stalling a run.
pub struct EventBus {
    tx: Sender<RunEvent>,
    rx: Receiver<RunEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Get a sender clone for event producers
    pub fn sender(&self) -> Sender<RunEvent> {
        self.tx.clone()
    }

    /// Get a receiver clone for consumers
    pub fn receiver(&self) -> Receiver<RunEvent> {
        self.rx.clone()
    }

    /// Receive the next event with timeout
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RunEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> Vec<RunEvent> {
        self.rx.try_iter().collect()
    }
}
