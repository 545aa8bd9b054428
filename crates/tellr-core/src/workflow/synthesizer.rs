//! Response synthesizer
//!
//! Merges every gathered result into one payload: a short natural-language
//! answer plus the raw structured results.

use super::types::{Answer, FinalPayload, RunState, StepResults};
use crate::capabilities::truncate_chars;
use crate::oracle::{AskOptions, SharedOracle};
use serde_json::Value;

pub const SYNTHESIS_SYSTEM: &str = "You are an expert banking assistant. Use the provided data to answer the user's \
question clearly and concisely in 3-6 sentences. If a visualization is present, describe the key insight. \
If web sources are present, incorporate key facts.";

const PREVIEW_ROWS: usize = 10;
const PREVIEW_POINTS: usize = 10;
const PREVIEW_SOURCES: usize = 5;
const SOURCE_SNIPPET_CHARS: usize = 200;

/// Bounded text view of the results for the synthesis prompt
pub fn synthesis_context(results: &StepResults) -> String {
    let mut parts = Vec::new();

    if let Some(db) = &results.db {
        let preview: Vec<Value> = db
            .rows
            .iter()
            .take(PREVIEW_ROWS)
            .cloned()
            .map(Value::Object)
            .collect();
        parts.push(format!(
            "DB rows ({}/{} shown):\n{}",
            preview.len().min(db.count),
            db.count,
            Value::Array(preview)
        ));
    }

    if let Some(viz) = &results.viz {
        let data = &viz.chartjs["data"];
        let labels: Vec<Value> = data["labels"]
            .as_array()
            .map(|l| l.iter().take(PREVIEW_POINTS).cloned().collect())
            .unwrap_or_default();
        let values: Vec<Value> = data["datasets"][0]["data"]
            .as_array()
            .map(|v| v.iter().take(PREVIEW_POINTS).cloned().collect())
            .unwrap_or_default();
        parts.push(format!(
            "Chart spec: {}. Sample labels: {}. Sample values: {}.",
            serde_json::to_string(&viz.spec).unwrap_or_default(),
            Value::Array(labels),
            Value::Array(values)
        ));
    }

    if let Some(web) = &results.web {
        parts.push(format!("Web answer (if any): {}", web.answer));
        if !web.sources.is_empty() {
            let lines: Vec<String> = web
                .sources
                .iter()
                .take(PREVIEW_SOURCES)
                .enumerate()
                .map(|(i, s)| {
                    format!(
                        "[{}] {} - {} - {}",
                        i + 1,
                        s.title,
                        s.url,
                        truncate_chars(&s.snippet, SOURCE_SNIPPET_CHARS)
                    )
                })
                .collect();
            parts.push(format!("Sources:\n{}", lines.join("\n")));
        }
    }

    if parts.is_empty() {
        "(No structured data.)".to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Answer used when the oracle cannot synthesize one
pub fn fallback_answer(results: &StepResults) -> String {
    if let Some(web) = &results.web {
        if !web.answer.trim().is_empty() {
            return web.answer.clone();
        }
    }
    if let Some(db) = &results.db {
        return format!("I found {} matching rows for your question.", db.count);
    }
    "I could not generate a natural language answer for this question.".to_string()
}

pub struct Synthesizer {
    oracle: SharedOracle,
    options: AskOptions,
}

impl Synthesizer {
    pub fn new(oracle: SharedOracle, options: AskOptions) -> Self {
        Self { oracle, options }
    }

    /// Build the final payload; an error short-circuits without an oracle call
    pub fn synthesize(&self, state: &RunState) -> FinalPayload {
        if let Some(error) = state.error() {
            return FinalPayload::Failed {
                error: error.to_string(),
            };
        }

        let results = state.results();
        let system = format!(
            "{} This analysis involved {} steps to gather comprehensive information. \
             Synthesize all the data to provide a complete answer. Do not invent data.",
            SYNTHESIS_SYSTEM,
            state.step_count()
        );
        let message = format!(
            "Original user question:\n{}\n\nGathered data from multi-step analysis:\n{}\n\nFinal comprehensive answer:",
            state.original_query(),
            synthesis_context(results)
        );

        let answer = match self.oracle.ask_text(&system, &message, self.options) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::debug!("empty synthesis, using fallback answer");
                fallback_answer(results)
            }
            Err(e) => {
                tracing::debug!(error = %e, "synthesis failed, using fallback answer");
                fallback_answer(results)
            }
        };

        FinalPayload::Answered(Answer {
            answer,
            chart: results.viz.clone(),
            web: results.web.clone(),
            db: results.db.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{
        Aggregation, Capability, ChartKind, ChartSpec, DbResult, Source, StepPayload, VizResult,
        WebResult,
    };
    use crate::oracle::DisabledOracle;
    use crate::testing::ScriptedOracle;
    use crate::workflow::types::{Plan, PlanSource, PlannedWorkflow};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn db(count: usize) -> DbResult {
        let rows = (0..count)
            .map(|i| match json!({"id": i}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect();
        DbResult {
            rows,
            count,
            table: None,
        }
    }

    fn web(answer: &str) -> WebResult {
        WebResult {
            query: "q".to_string(),
            answer: answer.to_string(),
            sources: (0..7)
                .map(|i| Source {
                    title: format!("t{}", i),
                    url: format!("https://s{}.example", i),
                    snippet: "s".repeat(300),
                })
                .collect(),
            count: 7,
        }
    }

    fn state_with(steps: &[Capability], payloads: Vec<StepPayload>) -> RunState {
        let mut state = RunState::new("How much did I spend on groceries?");
        state.set_plan(&PlannedWorkflow {
            plan: Plan::fixed(steps),
            source: PlanSource::Heuristic,
            reasoning: None,
        });
        for payload in payloads {
            state.record(payload);
        }
        state
    }

    #[test]
    fn test_error_short_circuits() {
        let oracle = Arc::new(ScriptedOracle::new());
        let synthesizer = Synthesizer::new(oracle.clone(), AskOptions::default());
        let mut state = RunState::new("q");
        state.fail("X");

        assert_eq!(
            synthesizer.synthesize(&state),
            FinalPayload::Failed {
                error: "X".to_string()
            }
        );
        assert!(oracle.calls().is_empty());
    }

    #[test]
    fn test_fallback_priority() {
        let mut results = StepResults::default();
        assert_eq!(
            fallback_answer(&results),
            "I could not generate a natural language answer for this question."
        );
        results.db = Some(db(4));
        assert_eq!(fallback_answer(&results), "I found 4 matching rows for your question.");
        results.web = Some(web(""));
        assert_eq!(fallback_answer(&results), "I found 4 matching rows for your question.");
        results.web = Some(web("Rates are 5%."));
        assert_eq!(fallback_answer(&results), "Rates are 5%.");
    }

    #[test]
    fn test_context_is_bounded() {
        let results = StepResults {
            db: Some(db(25)),
            web: Some(web("answer")),
            viz: None,
        };
        let context = synthesis_context(&results);
        assert!(context.starts_with("DB rows (10/25 shown):"));
        assert!(context.contains("[5] t4"));
        assert!(!context.contains("[6] t5"));
        assert!(!context.contains(&"s".repeat(201)));
        assert_eq!(synthesis_context(&StepResults::default()), "(No structured data.)");
    }

    #[test]
    fn test_chart_context() {
        let results = StepResults {
            viz: Some(VizResult {
                chartjs: json!({"data": {"labels": ["a", "b"], "datasets": [{"data": [3, 1]}]}}),
                spec: ChartSpec {
                    chart: ChartKind::Bar,
                    x: "category".to_string(),
                    y: None,
                    agg: Aggregation::Count,
                },
            }),
            ..Default::default()
        };
        let context = synthesis_context(&results);
        assert!(context.contains(r#"Sample labels: ["a","b"]"#));
        assert!(context.contains("Sample values: [3,1]"));
    }

    #[test]
    fn test_oracle_answer_merged_with_results() {
        let oracle = Arc::new(ScriptedOracle::new().reply("expert banking assistant", " You spent $59. "));
        let synthesizer = Synthesizer::new(oracle.clone(), AskOptions::new(500, 0.2));
        let state = state_with(&[Capability::Db], vec![StepPayload::Db(db(2))]);

        let payload = synthesizer.synthesize(&state);
        let answer = payload.answer().unwrap();
        assert_eq!(answer.answer, "You spent $59.");
        assert_eq!(answer.db.as_ref().map(|d| d.count), Some(2));

        let call = &oracle.calls()[0];
        assert!(call.system.contains("involved 1 steps"));
        assert_eq!(call.options, AskOptions::new(500, 0.2));
    }

    #[test]
    fn test_oracle_failure_uses_row_count() {
        let synthesizer = Synthesizer::new(Arc::new(DisabledOracle::default()), AskOptions::default());
        let state = state_with(&[Capability::Db], vec![StepPayload::Db(db(3))]);
        assert_eq!(
            synthesizer.synthesize(&state).answer().map(|a| a.answer.as_str()),
            Some("I found 3 matching rows for your question.")
        );
    }

    #[test]
    fn test_empty_synthesis_uses_fallback() {
        let oracle = ScriptedOracle::new().reply("expert banking assistant", "   ");
        let synthesizer = Synthesizer::new(Arc::new(oracle), AskOptions::default());
        let state = state_with(&[Capability::Web], vec![StepPayload::Web(web("Rates are 5%."))]);
        assert_eq!(
            synthesizer.synthesize(&state).answer().map(|a| a.answer.as_str()),
            Some("Rates are 5%.")
        );
    }
}
