//! Workflow types
//!
//! The run record threaded through one orchestration, the plan it follows and
//! the payloads it returns.

use crate::capabilities::{Capability, DbResult, StepPayload, VizResult, WebResult};
use crate::events::RunId;
use serde::Serialize;

/// Why a candidate plan was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("plan has no 'workflow' array")]
    Missing,

    #[error("plan is empty")]
    Empty,

    #[error("unknown capability in plan: {0}")]
    Unknown(String),

    #[error("capability '{0}' appears more than once")]
    Duplicate(Capability),
}

/// Ordered, non-empty list of distinct capabilities
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan(Vec<Capability>);

impl Plan {
    pub fn new(steps: Vec<Capability>) -> Result<Self, PlanError> {
        if steps.is_empty() {
            return Err(PlanError::Empty);
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].contains(step) {
                return Err(PlanError::Duplicate(*step));
            }
        }
        Ok(Self(steps))
    }

    /// For plans built from constants known to be valid
    pub(crate) fn fixed(steps: &[Capability]) -> Self {
        debug_assert!(Self::new(steps.to_vec()).is_ok());
        Self(steps.to_vec())
    }

    pub fn steps(&self) -> &[Capability] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Capability> {
        self.0.get(index).copied()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Capability::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Where a plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Oracle,
    Heuristic,
}

impl PlanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanSource::Oracle => "oracle",
            PlanSource::Heuristic => "heuristic",
        }
    }
}

/// Planner output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedWorkflow {
    pub plan: Plan,
    pub source: PlanSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// State machine stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Guardrail,
    Executing(Capability),
    Responding,
}

/// Last payload of each capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResults {
    pub db: Option<DbResult>,
    pub viz: Option<VizResult>,
    pub web: Option<WebResult>,
}

impl StepResults {
    pub fn store(&mut self, payload: StepPayload) {
        match payload {
            StepPayload::Db(db) => self.db = Some(db),
            StepPayload::Viz(viz) => self.viz = Some(viz),
            StepPayload::Web(web) => self.web = Some(web),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Db => self.db.is_some(),
            Capability::Viz => self.viz.is_some(),
            Capability::Web => self.web.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_none() && self.viz.is_none() && self.web.is_none()
    }
}

/// Synthesized answer plus every structured result gathered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Chart fields (`chartjs`, `spec`) sit at the top level
    #[serde(flatten)]
    pub chart: Option<VizResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web: Option<WebResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<DbResult>,
}

/// Terminal payload of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FinalPayload {
    Failed { error: String },
    Answered(Answer),
}

impl FinalPayload {
    pub fn error(&self) -> Option<&str> {
        match self {
            FinalPayload::Failed { error } => Some(error),
            FinalPayload::Answered(_) => None,
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            FinalPayload::Answered(answer) => Some(answer),
            FinalPayload::Failed { .. } => None,
        }
    }
}

/// What `run` hands back to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunResponse {
    /// The machine ran; the result may still carry an error
    Completed { result: FinalPayload },
    /// The question was refused before planning
    Rejected { error: String },
}

impl RunResponse {
    pub fn result(&self) -> Option<&FinalPayload> {
        match self {
            RunResponse::Completed { result } => Some(result),
            RunResponse::Rejected { .. } => None,
        }
    }

    /// Error message from either a rejected question or a failed run
    pub fn error(&self) -> Option<&str> {
        match self {
            RunResponse::Completed { result } => result.error(),
            RunResponse::Rejected { error } => Some(error),
        }
    }

    pub fn answer_text(&self) -> Option<&str> {
        self.result()
            .and_then(FinalPayload::answer)
            .map(|a| a.answer.as_str())
    }
}

/// The record threaded through one orchestration run
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: RunId,
    original_query: String,
    current_query: String,
    plan: Option<Plan>,
    plan_source: Option<PlanSource>,
    cursor: usize,
    step_count: usize,
    results: StepResults,
    guardrail_passed: Option<bool>,
    error: Option<String>,
    final_result: Option<FinalPayload>,
    trace: Vec<Stage>,
}

impl RunState {
    pub fn new(question: impl Into<String>) -> Self {
        Self::with_id(RunId::new(), question)
    }

    pub fn with_id(run_id: RunId, question: impl Into<String>) -> Self {
        let original_query = question.into();
        Self {
            run_id,
            current_query: original_query.clone(),
            original_query,
            plan: None,
            plan_source: None,
            cursor: 0,
            step_count: 0,
            results: StepResults::default(),
            guardrail_passed: None,
            error: None,
            final_result: None,
            trace: Vec::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    pub fn current_query(&self) -> &str {
        &self.current_query
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn plan_source(&self) -> Option<PlanSource> {
        self.plan_source
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn results(&self) -> &StepResults {
        &self.results
    }

    pub fn guardrail_passed(&self) -> Option<bool> {
        self.guardrail_passed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn final_result(&self) -> Option<&FinalPayload> {
        self.final_result.as_ref()
    }

    /// Stages entered so far, in order
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    /// Capability at the cursor, if the plan has steps left
    pub fn next_capability(&self) -> Option<Capability> {
        self.plan.as_ref().and_then(|p| p.get(self.cursor))
    }

    /// True once every planned step has run
    pub fn plan_exhausted(&self) -> bool {
        self.plan
            .as_ref()
            .map(|p| self.cursor >= p.len())
            .unwrap_or(false)
    }

    pub(crate) fn set_plan(&mut self, planned: &PlannedWorkflow) {
        if self.plan.is_none() {
            self.plan = Some(planned.plan.clone());
            self.plan_source = Some(planned.source);
            self.cursor = 0;
            self.step_count = 0;
        }
    }

    pub(crate) fn set_current_query(&mut self, query: impl Into<String>) {
        self.current_query = query.into();
    }

    /// Store a successful step and advance the cursor
    pub(crate) fn record(&mut self, payload: StepPayload) {
        debug_assert!(!self.plan_exhausted());
        self.results.store(payload);
        self.cursor += 1;
        self.step_count += 1;
    }

    pub(crate) fn pass_guardrail(&mut self) {
        self.guardrail_passed = Some(true);
    }

    pub(crate) fn block_guardrail(&mut self) {
        self.guardrail_passed = Some(false);
    }

    /// Set the terminal error; the first error wins
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.trace.push(stage);
    }

    pub(crate) fn finish(&mut self, payload: FinalPayload) {
        if self.final_result.is_none() {
            self.final_result = Some(payload);
        }
    }

    /// Consume the record into the caller-facing response
    pub fn into_response(self) -> RunResponse {
        match self.final_result {
            Some(result) => RunResponse::Completed { result },
            None => RunResponse::Completed {
                result: FinalPayload::Failed {
                    error: self
                        .error
                        .unwrap_or_else(|| "Run ended without a result".to_string()),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn db(count: usize) -> DbResult {
        DbResult {
            rows: vec![],
            count,
            table: None,
        }
    }

    #[test]
    fn test_plan_validation() {
        assert_eq!(Plan::new(vec![]), Err(PlanError::Empty));
        assert_eq!(
            Plan::new(vec![Capability::Db, Capability::Viz, Capability::Db]),
            Err(PlanError::Duplicate(Capability::Db))
        );
        let plan = Plan::new(vec![Capability::Web, Capability::Db]).unwrap();
        assert_eq!(plan.to_string(), "[web, db]");
        assert_eq!(serde_json::to_value(&plan).unwrap(), json!(["web", "db"]));
    }

    #[test]
    fn test_run_state_starts_at_original_query() {
        let state = RunState::new("How much did I spend?");
        assert_eq!(state.current_query(), state.original_query());
        assert_eq!(state.cursor(), 0);
        assert!(state.plan().is_none());
        assert!(!state.plan_exhausted());
    }

    #[test]
    fn test_plan_is_set_once() {
        let mut state = RunState::new("q");
        state.set_plan(&PlannedWorkflow {
            plan: Plan::fixed(&[Capability::Db]),
            source: PlanSource::Heuristic,
            reasoning: None,
        });
        state.set_plan(&PlannedWorkflow {
            plan: Plan::fixed(&[Capability::Web]),
            source: PlanSource::Oracle,
            reasoning: None,
        });
        assert_eq!(state.plan().unwrap().steps(), &[Capability::Db]);
        assert_eq!(state.plan_source(), Some(PlanSource::Heuristic));
    }

    #[test]
    fn test_record_advances_cursor() {
        let mut state = RunState::new("q");
        state.set_plan(&PlannedWorkflow {
            plan: Plan::fixed(&[Capability::Db, Capability::Viz]),
            source: PlanSource::Heuristic,
            reasoning: None,
        });
        state.record(StepPayload::Db(db(5)));
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.step_count(), 1);
        assert_eq!(state.next_capability(), Some(Capability::Viz));
        assert!(state.results().has(Capability::Db));
    }

    #[test]
    fn test_first_error_wins() {
        let mut state = RunState::new("q");
        state.fail("X");
        state.fail("Y");
        assert_eq!(state.error(), Some("X"));
    }

    #[test]
    fn test_final_payload_shapes() {
        let failed = FinalPayload::Failed {
            error: "X".to_string(),
        };
        assert_eq!(serde_json::to_value(&failed).unwrap(), json!({"error": "X"}));

        let answered = FinalPayload::Answered(Answer {
            answer: "Done.".to_string(),
            chart: None,
            web: None,
            db: Some(db(2)),
        });
        assert_eq!(
            serde_json::to_value(&answered).unwrap(),
            json!({"answer": "Done.", "db": {"rows": [], "count": 2}})
        );

        let response = RunResponse::Completed { result: failed };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"result": {"error": "X"}})
        );
        assert_eq!(response.error(), Some("X"));
    }
}
