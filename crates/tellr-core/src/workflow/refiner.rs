//! Query refiner
//!
//! Between steps, rewrites the query for the next capability using what the
//! earlier steps found. A failed refinement keeps the current query.

use super::types::StepResults;
use crate::capabilities::Capability;
use crate::oracle::SharedOracle;
use serde_json::Value;

pub const QUERY_REFINEMENT_SYSTEM: &str = "You are a query refinement assistant. Based on previous results, refine the user's query for the next step.\n\
Make the query more specific and actionable for the next agent, incorporating insights from previous steps.\n\n\
Respond with JSON only: {\"refined_query\": \"the refined query string\"}";

/// Summary of earlier results handed to the refiner
pub fn results_context(results: &StepResults) -> String {
    let mut parts = Vec::new();

    if let Some(web) = &results.web {
        if !web.answer.trim().is_empty() {
            parts.push(format!("Web search found: {}", web.answer.trim()));
        }
    }
    if let Some(db) = &results.db {
        parts.push(format!("Database query returned {} relevant records", db.count));
    }

    if parts.is_empty() {
        "No previous results".to_string()
    } else {
        parts.join("\n")
    }
}

/// Result of one refinement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refinement {
    pub query: String,
    /// False when the previous query was kept
    pub changed: bool,
}

pub struct Refiner {
    oracle: SharedOracle,
}

impl Refiner {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    /// Refine `current_query` for `next`; never fails
    pub fn refine(
        &self,
        original_query: &str,
        current_query: &str,
        results: &StepResults,
        next: Capability,
    ) -> Refinement {
        let agent = next.agent_name();
        let message = format!(
            "Original user request: {}\nPrevious results: {}\nNext step: {}\nCurrent query: {}\n\n\
             Refine the query for the {} based on what we've learned:",
            original_query,
            results_context(results),
            agent,
            current_query,
            agent
        );

        let refined = match self.oracle.ask_structured(QUERY_REFINEMENT_SYSTEM, &message) {
            Ok(reply) => reply
                .get("refined_query")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            Err(e) => {
                tracing::debug!(error = %e, capability = %next, "query refinement failed");
                None
            }
        };

        match refined {
            Some(query) => Refinement {
                changed: query != current_query,
                query,
            },
            None => Refinement {
                query: current_query.to_string(),
                changed: false,
            },
        }
    }
}
