//! Workflow orchestration
//!
//! Planner, guardrail, refiner and synthesizer around the state machine that
//! threads one [`RunState`] through them.

pub mod fanout;
pub mod guardrail;
pub mod machine;
pub mod planner;
pub mod refiner;
pub mod synthesizer;
mod types;

pub use fanout::{fan_out, FanOutReport};
pub use guardrail::{refusal_message, Guardrail, GuardrailVerdict};
pub use machine::{Orchestrator, EMPTY_QUESTION};
pub use planner::{heuristic_plan, parse_workflow, Planner};
pub use refiner::{results_context, Refinement, Refiner};
pub use synthesizer::{fallback_answer, synthesis_context, Synthesizer};
pub use types::{
    Answer, FinalPayload, Plan, PlanError, PlanSource, PlannedWorkflow, RunResponse, RunState,
    Stage, StepResults,
};
