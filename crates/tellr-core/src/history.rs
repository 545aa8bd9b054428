//! Bounded in-memory event history
//!
//! Owned by front ends, never by the orchestration core. Oldest events are
//! evicted once the buffer is full.

use crate::events::{RunEvent, RunId};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Ring buffer of recent run events
pub struct EventHistory {
    capacity: usize,
    events: Mutex<VecDeque<RunEvent>>,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, event: RunEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Copy of all retained events, oldest first
    pub fn snapshot(&self) -> Vec<RunEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// The most recent `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<RunEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Retained events of one run
    pub fn for_run(&self, run_id: RunId) -> Vec<RunEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Feed the history from a channel on a background thread
    ///
    /// The thread exits once every sender is dropped.
    pub fn spawn_collector(self: &Arc<Self>, rx: Receiver<RunEvent>) -> std::io::Result<JoinHandle<()>> {
        let history = Arc::clone(self);
        std::thread::Builder::new()
            .name("tellr-event-history".to_string())
            .spawn(move || {
                for event in rx.iter() {
                    history.push(event);
                }
                tracing::debug!("event collector stopped");
            })
    }
}
