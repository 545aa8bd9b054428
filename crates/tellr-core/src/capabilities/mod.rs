//! Capability adapters
//!
//! A capability is one independently invokable unit of work. Each adapter wraps
//! an external collaborator (row backend, chart builder, web search) and reports
//! either a typed payload or a [`CapabilityError`].

mod chart;
mod database;
mod rows;
mod search;
mod web;

pub use chart::{aggregate, build_chartjs, heuristic_spec, ChartAdapter, Series};
pub use database::DatabaseAdapter;
pub use rows::{PostgrestRowSource, Row, RowQuery, RowSource, StaticRowSource};
pub use search::{SearchBackend, SearchHit, StaticSearch, TavilySearch};
pub use web::WebSearchAdapter;

use crate::error::CapabilityError;
use crate::{Result, TellrError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The fixed set of capabilities a plan can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Row retrieval from the banking data backend
    Db,
    /// Chart generation over fetched rows
    Viz,
    /// Web search with a summarized answer
    Web,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Db, Capability::Viz, Capability::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Db => "db",
            Capability::Viz => "viz",
            Capability::Web => "web",
        }
    }

    /// Name used in oracle prompts
    pub fn agent_name(&self) -> &'static str {
        match self {
            Capability::Db => "db_agent",
            Capability::Viz => "viz_agent",
            Capability::Web => "web_agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Capability::Db => "Database",
            Capability::Viz => "Visualization",
            Capability::Web => "Web Search",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "db" | "db_agent" | "database" => Ok(Capability::Db),
            "viz" | "viz_agent" | "chart" => Ok(Capability::Viz),
            "web" | "web_agent" | "search" => Ok(Capability::Web),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// Rows returned by the db capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbResult {
    pub rows: Vec<Row>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// Chart kinds the viz capability can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
        }
    }

    /// Lenient parse; anything unrecognized is a bar chart
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "line" => ChartKind::Line,
            "pie" => ChartKind::Pie,
            _ => ChartKind::Bar,
        }
    }
}

/// Aggregation applied to the y column per x group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    None,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Count => "count",
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::None => "none",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sum" => Aggregation::Sum,
            "avg" | "average" | "mean" => Aggregation::Avg,
            "none" => Aggregation::None,
            _ => Aggregation::Count,
        }
    }
}

/// Minimal chart description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart: ChartKind,
    pub x: String,
    pub y: Option<String>,
    pub agg: Aggregation,
}

/// Chart produced by the viz capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VizResult {
    /// Chart.js configuration object, rendered as-is by the front end
    pub chartjs: Value,
    pub spec: ChartSpec,
}

/// One cited web source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Answer and sources from the web capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub count: usize,
}

/// Successful output of one capability invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepPayload {
    Db(DbResult),
    Viz(VizResult),
    Web(WebResult),
}

impl StepPayload {
    pub fn capability(&self) -> Capability {
        match self {
            StepPayload::Db(_) => Capability::Db,
            StepPayload::Viz(_) => Capability::Viz,
            StepPayload::Web(_) => Capability::Web,
        }
    }

    /// JSON form, as returned to API consumers
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One capability behind a uniform interface
pub trait CapabilityAdapter: Send + Sync {
    /// Which capability this adapter provides
    fn capability(&self) -> Capability;

    /// Run the capability for a query
    fn invoke(&self, query: &str) -> std::result::Result<StepPayload, CapabilityError>;
}

pub type SharedAdapter = Arc<dyn CapabilityAdapter>;

/// Dispatch table: exactly one adapter per capability
#[derive(Clone)]
pub struct CapabilitySet {
    db: SharedAdapter,
    viz: SharedAdapter,
    web: SharedAdapter,
}

impl CapabilitySet {
    /// Build the table, rejecting adapters placed in the wrong slot
    pub fn new(db: SharedAdapter, viz: SharedAdapter, web: SharedAdapter) -> Result<Self> {
        for (expected, adapter) in [
            (Capability::Db, &db),
            (Capability::Viz, &viz),
            (Capability::Web, &web),
        ] {
            if adapter.capability() != expected {
                return Err(TellrError::config(format!(
                    "adapter for '{}' registered in the '{}' slot",
                    adapter.capability(),
                    expected
                )));
            }
        }
        Ok(Self { db, viz, web })
    }

    pub fn adapter(&self, capability: Capability) -> &dyn CapabilityAdapter {
        &**self.adapter_arc(capability)
    }

    pub fn adapter_arc(&self, capability: Capability) -> &SharedAdapter {
        match capability {
            Capability::Db => &self.db,
            Capability::Viz => &self.viz,
            Capability::Web => &self.web,
        }
    }

    /// Invoke a capability and check the payload matches it
    pub fn invoke(
        &self,
        capability: Capability,
        query: &str,
    ) -> std::result::Result<StepPayload, CapabilityError> {
        let payload = self.adapter(capability).invoke(query)?;
        if payload.capability() != capability {
            return Err(CapabilityError::new(
                capability,
                format!(
                    "{} adapter returned a {} payload",
                    capability,
                    payload.capability()
                ),
            ));
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet").finish_non_exhaustive()
    }
}

/// Credential value if it is set and was expanded
pub(crate) fn credential(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.contains("${"))
}

/// Cut `text` to at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed(Capability, StepPayload);

    impl CapabilityAdapter for Fixed {
        fn capability(&self) -> Capability {
            self.0
        }
        fn invoke(&self, _query: &str) -> std::result::Result<StepPayload, CapabilityError> {
            Ok(self.1.clone())
        }
    }

    fn db_payload() -> StepPayload {
        StepPayload::Db(DbResult {
            rows: vec![],
            count: 0,
            table: None,
        })
    }

    fn web_payload() -> StepPayload {
        StepPayload::Web(WebResult {
            query: "q".to_string(),
            answer: String::new(),
            sources: vec![],
            count: 0,
        })
    }

    #[test]
    fn test_capability_from_str_aliases() {
        assert_eq!("db_agent".parse::<Capability>(), Ok(Capability::Db));
        assert_eq!("Chart".parse::<Capability>(), Ok(Capability::Viz));
        assert_eq!(" search ".parse::<Capability>(), Ok(Capability::Web));
        assert!("email".parse::<Capability>().is_err());
    }

    #[test]
    fn test_capability_serializes_lowercase() {
        let json = serde_json::to_string(&Capability::ALL).unwrap();
        assert_eq!(json, r#"["db","viz","web"]"#);
    }

    #[test]
    fn test_set_rejects_misplaced_adapter() {
        let db: SharedAdapter = Arc::new(Fixed(Capability::Db, db_payload()));
        let web: SharedAdapter = Arc::new(Fixed(Capability::Web, web_payload()));
        let result = CapabilitySet::new(db.clone(), web.clone(), web);
        assert!(matches!(result, Err(TellrError::Config(_))));
    }

    #[test]
    fn test_set_rejects_mismatched_payload() {
        let db: SharedAdapter = Arc::new(Fixed(Capability::Db, db_payload()));
        // A viz adapter that wrongly returns rows
        let viz: SharedAdapter = Arc::new(Fixed(Capability::Viz, db_payload()));
        let web: SharedAdapter = Arc::new(Fixed(Capability::Web, web_payload()));
        let set = CapabilitySet::new(db, viz, web).unwrap();

        assert!(set.invoke(Capability::Db, "q").is_ok());
        let err = set.invoke(Capability::Viz, "q").unwrap_err();
        assert_eq!(err.capability, Capability::Viz);
    }

    #[test]
    fn test_lenient_chart_parsing() {
        assert_eq!(ChartKind::parse_lenient("PIE"), ChartKind::Pie);
        assert_eq!(ChartKind::parse_lenient("scatter"), ChartKind::Bar);
        assert_eq!(Aggregation::parse_lenient("average"), Aggregation::Avg);
        assert_eq!(Aggregation::parse_lenient(""), Aggregation::Count);
    }

    #[test]
    fn test_credential_filters_placeholders() {
        assert_eq!(credential(&Some("key".to_string())), Some("key"));
        assert_eq!(credential(&Some("${TAVILY_API_KEY}".to_string())), None);
        assert_eq!(credential(&Some("  ".to_string())), None);
        assert_eq!(credential(&None), None);
    }
}
