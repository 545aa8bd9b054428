//! Workflow planner
//!
//! Chooses the ordered capabilities for a question. The oracle is asked first;
//! a keyword heuristic covers every failure so planning always succeeds.

use super::types::{Plan, PlanError, PlanSource, PlannedWorkflow};
use crate::capabilities::Capability;
use crate::oracle::SharedOracle;
use serde_json::{Map, Value};

pub const WORKFLOW_PLANNING_SYSTEM: &str = "You are a workflow planning assistant for a banking data analysis system. \
Given a user's request, determine if it requires multiple steps and plan the workflow.\n\
Available agents:\n\
- 'web_agent': Search for external information (interest rates, news, regulations, etc.)\n\
- 'db_agent': Query and filter banking transaction data\n\
- 'viz_agent': Create charts and visualizations from data\n\n\
Analyze the request and decide:\n\
1. If it needs multiple steps (e.g., search for context then analyze data, or get data then visualize)\n\
2. What sequence of agents to use\n\n\
Use each agent at most once. Respond with JSON only:\n\
{\n  \"workflow\": [\"agent1\", \"agent2\", ...],\n  \"reasoning\": \"brief explanation\"\n}\n\n\
Examples:\n\
- \"Show me my spending compared to inflation rates\" -> [\"web_agent\", \"db_agent\", \"viz_agent\"]\n\
- \"Visualize my monthly expenses\" -> [\"db_agent\", \"viz_agent\"]\n\
- \"What are current mortgage rates?\" -> [\"web_agent\"]\n\
- \"How much did I spend on groceries?\" -> [\"db_agent\"]";

const VIZ_KEYWORDS: &[&str] = &[
    "visual",
    "chart",
    "plot",
    "graph",
    "bar chart",
    "line chart",
    "visualize",
    "visualise",
    "show me",
];

const COMPARE_KEYWORDS: &[&str] = &["compare", "vs", "versus", "against", "trend", "over time"];

const SEARCH_KEYWORDS: &[&str] = &[
    "search",
    "google",
    "web",
    "news",
    "latest",
    "look up",
    "find online",
    "rate",
    "market",
    "economy",
];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Deterministic plan from keywords
///
/// Visualization plus comparison prepends a web step for external context.
/// Chart cues win over search cues, so "show me the latest news" charts rows.
pub fn heuristic_plan(question: &str) -> Plan {
    let q = question.to_lowercase();
    if mentions(&q, VIZ_KEYWORDS) {
        if mentions(&q, COMPARE_KEYWORDS) {
            Plan::fixed(&[Capability::Web, Capability::Db, Capability::Viz])
        } else {
            Plan::fixed(&[Capability::Db, Capability::Viz])
        }
    } else if mentions(&q, SEARCH_KEYWORDS) {
        Plan::fixed(&[Capability::Web])
    } else {
        Plan::fixed(&[Capability::Db])
    }
}

/// Read the `workflow` array; any bad entry rejects the whole plan
pub fn parse_workflow(reply: &Map<String, Value>) -> Result<Plan, PlanError> {
    let Some(Value::Array(items)) = reply.get("workflow") else {
        return Err(PlanError::Missing);
    };

    let steps = items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| s.parse::<Capability>().ok())
                .ok_or_else(|| PlanError::Unknown(item.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Plan::new(steps)
}

pub struct Planner {
    oracle: SharedOracle,
}

impl Planner {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    pub fn plan(&self, question: &str) -> PlannedWorkflow {
        match self.oracle.ask_structured(WORKFLOW_PLANNING_SYSTEM, question) {
            Ok(reply) => match parse_workflow(&reply) {
                Ok(plan) => {
                    let reasoning = reply
                        .get("reasoning")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string);
                    return PlannedWorkflow {
                        plan,
                        source: PlanSource::Oracle,
                        reasoning,
                    };
                }
                Err(e) => tracing::info!(error = %e, "oracle plan rejected, using heuristic"),
            },
            Err(e) => tracing::info!(error = %e, "oracle planning failed, using heuristic"),
        }

        PlannedWorkflow {
            plan: heuristic_plan(question),
            source: PlanSource::Heuristic,
            reasoning: None,
        }
    }
}
