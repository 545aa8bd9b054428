//! Test doubles for the oracle and capability adapters
//!
//! Compiled for this crate's own tests and, with the `testing` feature, for
//! the integration tests and server tests that depend on it. Release builds
//! leave it out.

use crate::capabilities::{Capability, CapabilityAdapter, StepPayload};
use crate::error::CapabilityError;
use crate::llm::LlmError;
use crate::oracle::{AskOptions, Oracle};
use crate::{Result, TellrError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A scripted oracle outcome
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
}

struct Route {
    marker: String,
    queue: VecDeque<Scripted>,
}

/// One recorded oracle call
#[derive(Debug, Clone, PartialEq)]
pub struct OracleCall {
    pub system: String,
    pub user: String,
    pub options: AskOptions,
}

/// Oracle that answers from a script
///
/// Replies are routed by a marker substring of the system prompt. Each route
/// serves its queue in order and repeats the last entry once drained. Calls
/// with no matching route fail as if no provider were configured.
#[derive(Default)]
pub struct ScriptedOracle {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, marker: &str, outcome: Scripted) -> Self {
        {
            let mut routes = self.routes.lock();
            match routes.iter_mut().find(|r| r.marker == marker) {
                Some(route) => route.queue.push_back(outcome),
                None => routes.push(Route {
                    marker: marker.to_string(),
                    queue: VecDeque::from([outcome]),
                }),
            }
        }
        self
    }

    /// Queue a reply for prompts containing `marker`
    pub fn reply(self, marker: &str, text: impl Into<String>) -> Self {
        self.push(marker, Scripted::Reply(text.into()))
    }

    /// Queue a transport failure for prompts containing `marker`
    pub fn fail(self, marker: &str, message: impl Into<String>) -> Self {
        self.push(marker, Scripted::Fail(message.into()))
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.lock().clone()
    }

    /// Number of calls whose system prompt contains `marker`
    pub fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.system.contains(marker))
            .count()
    }

    fn next_outcome(&self, system: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock();
        let route = routes.iter_mut().find(|r| system.contains(&r.marker))?;
        if route.queue.len() > 1 {
            route.queue.pop_front()
        } else {
            route.queue.front().cloned()
        }
    }
}

impl Oracle for ScriptedOracle {
    fn ask_text(&self, system_prompt: &str, user_message: &str, options: AskOptions) -> Result<String> {
        self.calls.lock().push(OracleCall {
            system: system_prompt.to_string(),
            user: user_message.to_string(),
            options,
        });

        match self.next_outcome(system_prompt) {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(TellrError::Llm(LlmError::Connection(message))),
            None => Err(TellrError::Llm(LlmError::ProviderUnavailable(
                "no scripted reply".to_string(),
            ))),
        }
    }
}

/// Adapter that returns a fixed outcome and counts invocations
pub struct CountingAdapter {
    capability: Capability,
    outcome: std::result::Result<StepPayload, String>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl CountingAdapter {
    pub fn succeeding(payload: StepPayload) -> Self {
        Self {
            capability: payload.capability(),
            outcome: Ok(payload),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(capability: Capability, message: impl Into<String>) -> Self {
        Self {
            capability,
            outcome: Err(message.into()),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

impl CapabilityAdapter for CountingAdapter {
    fn capability(&self) -> Capability {
        self.capability
    }

    fn invoke(&self, query: &str) -> std::result::Result<StepPayload, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.to_string());
        self.outcome
            .clone()
            .map_err(|message| CapabilityError::new(self.capability, message))
    }
}
