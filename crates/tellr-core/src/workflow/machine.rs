//! Orchestration state machine
//!
//! Drives one run through `Planning -> (Guardrail) -> Executing -> Planning ...
//! -> Responding`. Steps run strictly one at a time. The plan is fixed on the
//! first `Planning` entry; later entries only refine the query. Once an error
//! is recorded every stage routes straight to `Responding`.

use super::guardrail::{refusal_message, Guardrail};
use super::planner::Planner;
use super::refiner::Refiner;
use super::synthesizer::Synthesizer;
use super::types::{PlannedWorkflow, RunResponse, RunState, Stage};
use crate::capabilities::{Capability, CapabilitySet};
use crate::error::CapabilityError;
use crate::events::{EventKind, RunEvent, RunId};
use crate::oracle::{AskOptions, SharedOracle};
use crate::{Result, TellrError};
use crossbeam_channel::Sender;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub const EMPTY_QUESTION: &str = "Empty question";

/// Runs questions through the workflow
pub struct Orchestrator {
    planner: Planner,
    guardrail: Guardrail,
    refiner: Refiner,
    synthesizer: Synthesizer,
    capabilities: CapabilitySet,
    events: Option<Sender<RunEvent>>,
}

impl Orchestrator {
    /// `synthesis` holds the token budget and temperature of the final answer
    pub fn new(oracle: SharedOracle, capabilities: CapabilitySet, synthesis: AskOptions) -> Self {
        Self {
            planner: Planner::new(oracle.clone()),
            guardrail: Guardrail::new(oracle.clone()),
            refiner: Refiner::new(oracle.clone()),
            synthesizer: Synthesizer::new(oracle, synthesis),
            capabilities,
            events: None,
        }
    }

    /// Report run events on `tx`; a full or closed channel drops them
    pub fn with_event_sender(mut self, tx: Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Plan a question without executing it
    pub fn plan_only(&self, question: &str) -> Result<PlannedWorkflow> {
        let question = validate(question)?;
        Ok(self.planner.plan(question))
    }

    /// Answer a question; only `result` or `error` is returned
    pub fn run(&self, question: &str) -> RunResponse {
        match self.execute(question) {
            Ok(state) => state.into_response(),
            Err(e) => RunResponse::Rejected {
                error: match e {
                    TellrError::InvalidInput(message) => message,
                    other => other.to_string(),
                },
            },
        }
    }

    /// Run the machine to completion and return the full run record
    pub fn execute(&self, question: &str) -> Result<RunState> {
        let question = validate(question)?;
        let started = Instant::now();
        let mut state = RunState::new(question);
        let run_id = state.run_id();

        tracing::info!(run_id = %run_id, "run started");
        self.emit(
            run_id,
            EventKind::RunStarted {
                question: question.to_string(),
            },
        );

        let mut stage = Stage::Planning;
        loop {
            state.enter(stage);
            if stage == Stage::Responding {
                let payload = self.synthesizer.synthesize(&state);
                state.finish(payload);
                break;
            }
            stage = self.transition(&mut state, stage);
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %run_id,
            steps = state.step_count(),
            failed = state.error().is_some(),
            elapsed_ms,
            "run finished"
        );
        self.emit(
            run_id,
            EventKind::RunFinished {
                steps: state.step_count(),
                error: state.error().map(str::to_string),
                elapsed_ms,
            },
        );

        Ok(state)
    }

    /// Execute `stage` and pick the next one
    fn transition(&self, state: &mut RunState, stage: Stage) -> Stage {
        if state.error().is_some() {
            return Stage::Responding;
        }

        match stage {
            Stage::Planning => self.plan_step(state),
            Stage::Guardrail => self.guard_step(state),
            Stage::Executing(capability) => self.execute_step(state, capability),
            Stage::Responding => Stage::Responding,
        }
    }

    fn plan_step(&self, state: &mut RunState) -> Stage {
        let run_id = state.run_id();

        if state.plan().is_none() {
            let planned = self.planner.plan(state.original_query());
            tracing::info!(
                run_id = %run_id,
                plan = %planned.plan,
                source = planned.source.as_str(),
                "plan chosen"
            );
            self.emit(
                run_id,
                EventKind::PlanChosen {
                    plan: planned.plan.steps().to_vec(),
                    source: planned.source.as_str().to_string(),
                    reasoning: planned.reasoning.clone(),
                },
            );
            state.set_plan(&planned);
        }

        let Some(next) = state.next_capability() else {
            return Stage::Responding;
        };

        if state.step_count() > 0 {
            let refinement = self.refiner.refine(
                state.original_query(),
                state.current_query(),
                state.results(),
                next,
            );
            tracing::debug!(
                run_id = %run_id,
                capability = %next,
                changed = refinement.changed,
                query = %refinement.query,
                "query refined"
            );
            self.emit(
                run_id,
                EventKind::QueryRefined {
                    capability: next,
                    query: refinement.query.clone(),
                    changed: refinement.changed,
                },
            );
            state.set_current_query(refinement.query);
        }

        route_to(next)
    }

    fn guard_step(&self, state: &mut RunState) -> Stage {
        let verdict = self.guardrail.check(state.current_query());
        tracing::info!(
            run_id = %state.run_id(),
            allowed = verdict.allowed,
            reason = %verdict.reason,
            "guardrail decided"
        );
        self.emit(
            state.run_id(),
            EventKind::GuardrailDecided {
                allowed: verdict.allowed,
                reason: verdict.reason.clone(),
            },
        );

        if verdict.allowed {
            state.pass_guardrail();
            Stage::Executing(Capability::Web)
        } else {
            state.block_guardrail();
            state.fail(refusal_message(&verdict.reason));
            Stage::Responding
        }
    }

    fn execute_step(&self, state: &mut RunState, capability: Capability) -> Stage {
        let run_id = state.run_id();
        let step = state.step_count() + 1;
        let started = Instant::now();

        // A panicking adapter fails the run like any other capability error
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.capabilities.invoke(capability, state.current_query())
        }))
        .unwrap_or_else(|_| {
            tracing::error!(run_id = %run_id, capability = %capability, step, "capability panicked");
            Err(CapabilityError::new(
                capability,
                format!("{} capability panicked", capability),
            ))
        });

        match outcome {
            Ok(payload) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(run_id = %run_id, capability = %capability, step, elapsed_ms, "step completed");
                state.record(payload);
                self.emit(
                    run_id,
                    EventKind::StepCompleted {
                        capability,
                        step,
                        elapsed_ms,
                    },
                );
                Stage::Planning
            }
            Err(e) => {
                tracing::warn!(run_id = %run_id, capability = %capability, step, error = %e, "step failed");
                self.emit(
                    run_id,
                    EventKind::StepFailed {
                        capability,
                        error: e.message.clone(),
                    },
                );
                state.fail(e.message);
                Stage::Responding
            }
        }
    }

    fn emit(&self, run_id: RunId, kind: EventKind) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(RunEvent::new(run_id, kind));
        }
    }
}

/// Web steps go through the guardrail first
fn route_to(capability: Capability) -> Stage {
    match capability {
        Capability::Web => Stage::Guardrail,
        other => Stage::Executing(other),
    }
}

/// Rejects blank questions; accepted ones are kept as given
fn validate(question: &str) -> Result<&str> {
    if question.trim().is_empty() {
        Err(TellrError::invalid_input(EMPTY_QUESTION))
    } else {
        Ok(question)
    }
}
