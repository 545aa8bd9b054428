//! End-to-end runs of representative banking questions

mod common;

use common::Harness;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tellr_core::testing::ScriptedOracle;
use tellr_core::{Capability, DisabledOracle, EventBus, EventKind, PlanSource, RunResponse};

#[test]
fn test_grocery_question_offline() {
    let harness = Harness::succeeding();
    let orchestrator = harness.orchestrator(Arc::new(DisabledOracle::default()));
    let state = orchestrator
        .execute("How much did I spend on groceries?")
        .unwrap();

    assert_eq!(state.plan().map(|p| p.steps().to_vec()), Some(vec![Capability::Db]));
    assert_eq!(state.plan_source(), Some(PlanSource::Heuristic));
    assert_eq!(harness.db.calls(), 1);
    assert_eq!(harness.viz.calls() + harness.web.calls(), 0);

    let response = state.into_response();
    assert_eq!(
        response.answer_text(),
        Some("I found 5 matching rows for your question.")
    );
}

#[test]
fn test_inflation_comparison_refused_by_guardrail() {
    let harness = Harness::succeeding();
    let oracle = Arc::new(ScriptedOracle::new().reply(
        "guardrails",
        r#"{"allowed": false, "reason": "not finance-related"}"#,
    ));
    let orchestrator = harness.orchestrator(oracle.clone());

    let planned = orchestrator
        .plan_only("Show me my spending compared to inflation rates")
        .unwrap();
    assert_eq!(
        planned.plan.steps(),
        &[Capability::Web, Capability::Db, Capability::Viz]
    );

    let response = orchestrator.run("Show me my spending compared to inflation rates");
    let error = response.error().unwrap();
    assert!(error.contains("not finance-related"));
    assert!(error.starts_with("I'm a personal finance assistant"));
    assert!(matches!(response, RunResponse::Completed { .. }));

    assert_eq!(oracle.calls_matching("guardrails"), 1);
    assert_eq!(harness.total_calls(), 0);
}

#[test]
fn test_chart_step_refined_from_row_count() {
    let harness = Harness::succeeding();
    let oracle = Arc::new(
        ScriptedOracle::new()
            .reply("workflow planning", r#"{"workflow": ["db", "viz"], "reasoning": "rows then chart"}"#)
            .reply("query refinement", r#"{"refined_query": "bar chart of grocery spend by category"}"#)
            .reply("expert banking assistant", "Groceries dominate your spending."),
    );
    let state = harness
        .orchestrator(oracle.clone())
        .execute("Chart my grocery spending")
        .unwrap();

    let refinements: Vec<_> = oracle
        .calls()
        .into_iter()
        .filter(|c| c.system.contains("query refinement"))
        .collect();
    assert_eq!(refinements.len(), 1);
    assert!(refinements[0]
        .user
        .contains("Previous results: Database query returned 5 relevant records"));
    assert!(refinements[0].user.contains("Next step: viz_agent"));
    assert_eq!(harness.viz.queries(), vec!["bar chart of grocery spend by category"]);

    let answer = state.final_result().and_then(|r| r.answer()).unwrap();
    assert_eq!(answer.answer, "Groceries dominate your spending.");
    assert!(answer.chart.is_some());
    assert_eq!(answer.db.as_ref().map(|d| d.count), Some(5));
    assert!(answer.web.is_none());
}

#[test]
fn test_answer_serializes_flat() {
    let harness = Harness::succeeding();
    let oracle = Arc::new(
        ScriptedOracle::new()
            .reply("workflow planning", r#"{"workflow": ["web", "db", "viz"]}"#)
            .reply("guardrails", r#"{"allowed": true, "reason": "economic indicator"}"#)
            .reply("expert banking assistant", "Your spending grew faster than inflation."),
    );
    let response = harness.orchestrator(oracle).run("Compare my spending to inflation");
    let value = serde_json::to_value(&response).unwrap();

    let result = &value["result"];
    assert_eq!(result["answer"], "Your spending grew faster than inflation.");
    assert_eq!(result["chartjs"]["type"], "bar");
    assert_eq!(result["spec"]["x"], "category");
    assert_eq!(result["web"]["answer"], "Inflation was 3.1% last year.");
    assert_eq!(result["db"]["count"], 5);
    assert!(value.get("error").is_none());
}

#[test]
fn test_run_events_trace_the_run() {
    let harness = Harness::succeeding();
    let bus = EventBus::new(32);
    let orchestrator = harness
        .orchestrator(Arc::new(DisabledOracle::default()))
        .with_event_sender(bus.sender());
    let state = orchestrator.execute("What are the latest mortgage rates?").unwrap();

    let events = bus.drain();
    assert!(events.iter().all(|e| e.run_id == state.run_id()));
    assert!(events.iter().any(|e| matches!(
        e.kind,
        EventKind::GuardrailDecided { allowed: true, .. }
    )));
    match &events.last().map(|e| &e.kind) {
        Some(EventKind::RunFinished { steps, error, .. }) => {
            assert_eq!(*steps, 1);
            assert!(error.is_none());
        }
        other => panic!("unexpected final event: {:?}", other),
    }
}
