//! Web search backend

use super::credential;
use crate::config::SearchConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Raw search hit before normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Search engine consumed by the web capability
pub trait SearchBackend: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, String>;
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

/// Tavily sends `null` for absent fields
#[derive(Debug, Deserialize)]
struct TavilyHit {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

impl From<TavilyHit> for SearchHit {
    fn from(hit: TavilyHit) -> Self {
        Self {
            title: hit.title.unwrap_or_default(),
            url: hit.url.unwrap_or_default(),
            content: hit.content.unwrap_or_default(),
        }
    }
}

/// Tavily search API
pub struct TavilySearch {
    api_key: Option<String>,
    base_url: String,
    search_depth: String,
    agent: ureq::Agent,
}

impl TavilySearch {
    pub fn from_config(config: &SearchConfig, timeout_secs: u64) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            search_depth: config.search_depth.clone(),
            agent: crate::llm::http_agent(timeout_secs),
        }
    }
}

impl SearchBackend for TavilySearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, String> {
        let Some(key) = credential(&self.api_key) else {
            return Err("Missing TAVILY_API_KEY in environment.".to_string());
        };

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let body = json!({
            "api_key": key,
            "query": query,
            "max_results": max_results,
            "search_depth": self.search_depth,
        });

        tracing::debug!(max_results, depth = %self.search_depth, "web search");

        let response = self.agent.post(&url).send_json(body).map_err(|e| match e {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                format!("Search backend returned {}: {}", code, body)
            }
            ureq::Error::Transport(t) => format!("Search backend unreachable: {}", t),
        })?;

        let parsed: TavilyResponse = response
            .into_json()
            .map_err(|e| format!("Invalid search payload: {}", e))?;
        Ok(parsed.results.into_iter().map(SearchHit::from).collect())
    }
}

/// Fixed hits, for offline runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

impl SearchBackend for StaticSearch {
    fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, String> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}
