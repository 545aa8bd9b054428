//! Shared fixtures for the workflow integration tests

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tellr_core::capabilities::{
    Aggregation, ChartKind, ChartSpec, DbResult, Source, StepPayload, VizResult, WebResult,
};
use tellr_core::testing::CountingAdapter;
use tellr_core::{AskOptions, Capability, CapabilitySet, Orchestrator, SharedOracle};

pub fn db_payload(count: usize) -> StepPayload {
    let rows: Vec<Map<String, Value>> = (0..count)
        .map(|i| match json!({"category": "groceries", "amount": 10 + i}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect();
    StepPayload::Db(DbResult {
        rows,
        count,
        table: Some("wellsdummydata".to_string()),
    })
}

pub fn viz_payload() -> StepPayload {
    StepPayload::Viz(VizResult {
        chartjs: json!({"type": "bar", "data": {"labels": ["groceries"], "datasets": [{"data": [5]}]}}),
        spec: ChartSpec {
            chart: ChartKind::Bar,
            x: "category".to_string(),
            y: None,
            agg: Aggregation::Count,
        },
    })
}

pub fn web_payload(answer: &str) -> StepPayload {
    StepPayload::Web(WebResult {
        query: "inflation".to_string(),
        answer: answer.to_string(),
        sources: vec![Source {
            title: "CPI report".to_string(),
            url: "https://stats.example/cpi".to_string(),
            snippet: "Consumer prices rose 3.1% year over year.".to_string(),
        }],
        count: 1,
    })
}

/// Three counting adapters and an orchestrator over them
pub struct Harness {
    pub db: Arc<CountingAdapter>,
    pub viz: Arc<CountingAdapter>,
    pub web: Arc<CountingAdapter>,
}

impl Harness {
    pub fn succeeding() -> Self {
        Self {
            db: Arc::new(CountingAdapter::succeeding(db_payload(5))),
            viz: Arc::new(CountingAdapter::succeeding(viz_payload())),
            web: Arc::new(CountingAdapter::succeeding(web_payload("Inflation was 3.1% last year."))),
        }
    }

    pub fn with_adapter(mut self, capability: Capability, adapter: CountingAdapter) -> Self {
        let adapter = Arc::new(adapter);
        match capability {
            Capability::Db => self.db = adapter,
            Capability::Viz => self.viz = adapter,
            Capability::Web => self.web = adapter,
        }
        self
    }

    pub fn orchestrator(&self, oracle: SharedOracle) -> Orchestrator {
        let set = CapabilitySet::new(self.db.clone(), self.viz.clone(), self.web.clone()).unwrap();
        Orchestrator::new(oracle, set, AskOptions::new(500, 0.2))
    }

    pub fn total_calls(&self) -> usize {
        self.db.calls() + self.viz.calls() + self.web.calls()
    }
}
