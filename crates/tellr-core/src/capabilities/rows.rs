//! Row backend
//!
//! The db and viz capabilities read rows through [`RowSource`]. The production
//! source speaks PostgREST (Supabase); [`StaticRowSource`] serves fixed rows.

use super::credential;
use crate::config::DatabaseConfig;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One record, column name to value
pub type Row = Map<String, Value>;

/// Query against a single table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    pub table: String,
    /// Columns to select; `None` means all
    pub select: Option<Vec<String>>,
    /// Equality predicates
    pub filters: BTreeMap<String, Value>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select_clause(&self) -> String {
        match &self.select {
            Some(columns) if !columns.is_empty() => columns.join(","),
            _ => "*".to_string(),
        }
    }
}

/// Source of tabular rows
pub trait RowSource: Send + Sync {
    fn fetch(&self, query: &RowQuery) -> Result<Vec<Row>, String>;
}

/// PostgREST client (Supabase REST endpoint)
pub struct PostgrestRowSource {
    url: Option<String>,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl PostgrestRowSource {
    pub fn new(url: Option<String>, api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            url,
            api_key,
            agent: crate::llm::http_agent(timeout_secs),
        }
    }

    pub fn from_config(config: &DatabaseConfig, timeout_secs: u64) -> Self {
        Self::new(config.url.clone(), config.api_key.clone(), timeout_secs)
    }

    fn endpoint(base: &str, table: &str) -> String {
        format!("{}/rest/v1/{}", base.trim_end_matches('/'), table)
    }
}

/// PostgREST filter operand: strings unquoted, everything else as JSON text
fn filter_operand(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RowSource for PostgrestRowSource {
    fn fetch(&self, query: &RowQuery) -> Result<Vec<Row>, String> {
        let (Some(url), Some(key)) = (credential(&self.url), credential(&self.api_key)) else {
            return Err("SUPABASE_URL and SUPABASE_ANON_KEY must be set in environment.".to_string());
        };

        let mut request = self
            .agent
            .get(&Self::endpoint(url, &query.table))
            .set("apikey", key)
            .set("Authorization", &format!("Bearer {}", key))
            .set("Accept", "application/json")
            .query("select", &query.select_clause());

        for (column, value) in &query.filters {
            request = request.query(column, &format!("eq.{}", filter_operand(value)));
        }
        if let Some(limit) = query.limit {
            request = request.query("limit", &limit.to_string());
        }

        tracing::debug!(table = %query.table, filters = query.filters.len(), "fetching rows");

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                format!("Row backend returned {}: {}", code, body)
            }
            ureq::Error::Transport(t) => format!("Row backend unreachable: {}", t),
        })?;

        response
            .into_json::<Vec<Row>>()
            .map_err(|e| format!("Invalid row payload: {}", e))
    }
}

/// In-memory rows with the same filter semantics as the REST source
#[derive(Debug, Clone, Default)]
pub struct StaticRowSource {
    rows: Vec<Row>,
}

impl StaticRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Build from JSON objects; non-objects are skipped
    pub fn from_values(values: Vec<Value>) -> Self {
        let rows = values
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Self { rows }
    }
}

impl RowSource for StaticRowSource {
    fn fetch(&self, query: &RowQuery) -> Result<Vec<Row>, String> {
        let matches = |row: &&Row| {
            query.filters.iter().all(|(column, expected)| {
                row.get(column)
                    .map(|actual| filter_operand(actual) == filter_operand(expected))
                    .unwrap_or(false)
            })
        };

        let project = |row: &Row| -> Row {
            match &query.select {
                Some(columns) if !columns.is_empty() => columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect(),
                _ => row.clone(),
            }
        };

        Ok(self
            .rows
            .iter()
            .filter(matches)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(project)
            .collect())
    }
}
