//! Web search capability

use super::search::SearchBackend;
use super::{truncate_chars, Capability, CapabilityAdapter, Source, StepPayload, WebResult};
use crate::error::CapabilityError;
use crate::oracle::{AskOptions, SharedOracle};
use std::sync::Arc;

pub const WEB_SUMMARY_SYSTEM: &str = "You are a helpful web research assistant.";

const SNIPPET_CHARS: usize = 500;
const SUMMARY_SNIPPETS: usize = 6;
const SUMMARY_MAX_TOKENS: u32 = 600;

/// Searches the web and summarizes the hits with inline citations
pub struct WebSearchAdapter {
    backend: Arc<dyn SearchBackend>,
    oracle: SharedOracle,
    max_results: usize,
}

impl WebSearchAdapter {
    pub fn new(backend: Arc<dyn SearchBackend>, oracle: SharedOracle, max_results: usize) -> Self {
        Self {
            backend,
            oracle,
            max_results,
        }
    }

    /// Cited summary of the snippets, empty when the oracle is unavailable
    fn summarize(&self, question: &str, snippets: &[&str]) -> String {
        if snippets.is_empty() {
            return String::new();
        }

        let joined = snippets
            .iter()
            .take(SUMMARY_SNIPPETS)
            .enumerate()
            .map(|(i, s)| format!("Source {}: {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Using the sources below, write a concise, well-cited answer.\n\
             Cite sources inline like [1], [2] referencing the source indices.\n\n\
             Question: {}\n\nSources:\n{}\n\nAnswer:",
            question, joined
        );

        match self.oracle.ask_text(
            WEB_SUMMARY_SYSTEM,
            &prompt,
            AskOptions::new(SUMMARY_MAX_TOKENS, 0.0),
        ) {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "web summary unavailable, returning sources only");
                String::new()
            }
        }
    }
}

impl CapabilityAdapter for WebSearchAdapter {
    fn capability(&self) -> Capability {
        Capability::Web
    }

    fn invoke(&self, query: &str) -> Result<StepPayload, CapabilityError> {
        let hits = self
            .backend
            .search(query, self.max_results)
            .map_err(|e| CapabilityError::new(Capability::Web, e))?;

        let sources: Vec<Source> = hits
            .iter()
            .map(|hit| Source {
                title: hit.title.clone(),
                url: hit.url.clone(),
                snippet: truncate_chars(&hit.content, SNIPPET_CHARS),
            })
            .collect();

        let snippets: Vec<&str> = hits
            .iter()
            .map(|hit| hit.content.as_str())
            .filter(|c| !c.is_empty())
            .collect();
        let answer = self.summarize(query, &snippets);

        tracing::info!(sources = sources.len(), answered = !answer.is_empty(), "web search done");

        Ok(StepPayload::Web(WebResult {
            query: query.to_string(),
            answer,
            count: sources.len(),
            sources,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{SearchHit, StaticSearch, TavilySearch};
    use crate::config::SearchConfig;
    use crate::oracle::DisabledOracle;
    use crate::testing::ScriptedOracle;
    use pretty_assertions::assert_eq;

    fn hits() -> Vec<SearchHit> {
        vec![
            SearchHit {
                title: "CPI report".to_string(),
                url: "https://stats.example/cpi".to_string(),
                content: "x".repeat(800),
            },
            SearchHit {
                title: "Empty".to_string(),
                url: "https://empty.example".to_string(),
                content: String::new(),
            },
        ]
    }

    fn web(payload: StepPayload) -> WebResult {
        match payload {
            StepPayload::Web(web) => web,
            other => panic!("expected web payload, got {:?}", other),
        }
    }

    #[test]
    fn test_sources_normalized() {
        let oracle = ScriptedOracle::new().reply("web research", "Inflation was 3.1% [1].");
        let adapter = WebSearchAdapter::new(Arc::new(StaticSearch::new(hits())), Arc::new(oracle), 5);

        let result = web(adapter.invoke("inflation rate").unwrap());
        assert_eq!(result.count, 2);
        assert_eq!(result.sources[0].snippet.len(), 500);
        assert_eq!(result.answer, "Inflation was 3.1% [1].");
        assert_eq!(result.query, "inflation rate");
    }

    #[test]
    fn test_summary_prompt_skips_empty_snippets() {
        let oracle = Arc::new(ScriptedOracle::new().reply("web research", "ok"));
        let adapter = WebSearchAdapter::new(Arc::new(StaticSearch::new(hits())), oracle.clone(), 5);
        adapter.invoke("q").unwrap();

        let calls = oracle.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user.contains("Source 1:"));
        assert!(!calls[0].user.contains("Source 2:"));
    }

    #[test]
    fn test_summary_failure_yields_empty_answer() {
        let adapter = WebSearchAdapter::new(
            Arc::new(StaticSearch::new(hits())),
            Arc::new(DisabledOracle::default()),
            5,
        );
        let result = web(adapter.invoke("q").unwrap());
        assert!(result.answer.is_empty());
        assert_eq!(result.sources.len(), 2);
    }

    #[test]
    fn test_missing_key_is_capability_error() {
        let backend = TavilySearch::from_config(&SearchConfig::default(), 5);
        let adapter = WebSearchAdapter::new(Arc::new(backend), Arc::new(DisabledOracle::default()), 5);
        let err = adapter.invoke("rates").unwrap_err();
        assert_eq!(err.message, "Missing TAVILY_API_KEY in environment.");
        assert_eq!(err.capability, Capability::Web);
    }
}
