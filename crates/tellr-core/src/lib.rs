//! tellr Core - backend library for tellr
//!
//! Answers banking questions by planning a short sequence of capability
//! steps, executing them one at a time and synthesizing one answer:
//! - Planner, guardrail, refiner and synthesizer around a natural-language oracle
//! - Capability adapters (row lookup, chart building, web research)
//! - LLM providers (Claude, OpenAI, Ollama)
//! - Configuration loading
//! - Run events and a bounded event history
//!
//! Any front end (CLI, HTTP) consumes this crate through [`AssistantService`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐   question    ┌──────────────────┐
//! │   Any front end   │ ─────────────→│   tellr-core     │
//! │   (CLI, HTTP)     │               │ AssistantService │
//! │                   │ ←─────────────│                  │
//! └───────────────────┘ RunResponse,  └──────────────────┘
//!                       RunEvent
//! ```

// Public API modules
pub mod error;
pub mod events;
pub mod history;

// Backend modules
pub mod config;

// LLM provider system
pub mod llm;

// Planning oracle on top of the providers
pub mod oracle;

// Capability adapters and their backends
pub mod capabilities;

// Orchestration state machine
pub mod workflow;

// Scripted doubles for tests (feature `testing`)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Main service facade
pub mod service;

pub use error::{CapabilityError, Result, TellrError};
pub use events::{EventBus, EventKind, RunEvent, RunId};
pub use history::EventHistory;

// Re-export config types
pub use config::{load_config, sample_config, ConfigError, TellrConfig};

// Re-export oracle types
pub use oracle::{AskOptions, DisabledOracle, LlmOracle, Oracle, SharedOracle};

// Re-export capability types
pub use capabilities::{
    Capability, CapabilityAdapter, CapabilitySet, DbResult, StepPayload, VizResult, WebResult,
};

// Re-export workflow types
pub use workflow::{
    Answer, FanOutReport, FinalPayload, Orchestrator, Plan, PlanSource, PlannedWorkflow,
    RunResponse, RunState, Stage,
};

pub use service::AssistantService;

/// Get the crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
