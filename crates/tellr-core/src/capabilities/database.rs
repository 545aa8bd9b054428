//! Database capability
//!
//! Turns a question into an equality-filtered row query with the oracle's help,
//! then fetches the rows.

use super::rows::{Row, RowQuery, RowSource};
use super::{Capability, CapabilityAdapter, DbResult, StepPayload};
use crate::error::CapabilityError;
use crate::oracle::SharedOracle;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const ROW_QUERY_SYSTEM: &str = "You translate banking questions into a row query against a single table of transactions.\n\
Use only the columns listed. Filters are exact equality matches; only add a filter when the question names a specific value.\n\
Respond with JSON only: {\"select\": [\"column\", ...] | null, \"filters\": {\"column\": value} | null, \"limit\": number | null}\n\
Use null for select to return every column.";

const SAMPLE_ROWS: usize = 3;

/// Fetches rows for a question
pub struct DatabaseAdapter {
    source: Arc<dyn RowSource>,
    oracle: SharedOracle,
    table: String,
    row_limit: usize,
}

impl DatabaseAdapter {
    pub fn new(
        source: Arc<dyn RowSource>,
        oracle: SharedOracle,
        table: impl Into<String>,
        row_limit: usize,
    ) -> Self {
        Self {
            source,
            oracle,
            table: table.into(),
            row_limit,
        }
    }

    fn fail(&self, message: impl Into<String>) -> CapabilityError {
        CapabilityError::new(Capability::Db, message)
    }

    /// Ask the oracle for a query; `None` means fetch everything
    fn plan_query(&self, question: &str, sample: &[Row]) -> Option<RowQuery> {
        let columns: BTreeSet<&str> = sample
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();

        let message = format!(
            "Table: {}\nColumns: {}\nSample rows: {}\n\nQuestion: {}",
            self.table,
            columns.iter().copied().collect::<Vec<_>>().join(", "),
            Value::Array(sample.iter().cloned().map(Value::Object).collect()),
            question
        );

        match self.oracle.ask_structured(ROW_QUERY_SYSTEM, &message) {
            Ok(reply) => Some(self.query_from_reply(&reply, &columns)),
            Err(e) => {
                tracing::debug!(error = %e, "row query planning failed, fetching unfiltered rows");
                None
            }
        }
    }

    /// Build a query from the oracle's reply, dropping unknown columns
    fn query_from_reply(&self, reply: &Map<String, Value>, columns: &BTreeSet<&str>) -> RowQuery {
        let mut query = RowQuery::new(self.table.clone()).with_limit(self.row_limit);

        if let Some(Value::Array(select)) = reply.get("select") {
            let picked: Vec<String> = select
                .iter()
                .filter_map(Value::as_str)
                .filter(|c| columns.contains(c))
                .map(str::to_string)
                .collect();
            if !picked.is_empty() {
                query.select = Some(picked);
            }
        }

        if let Some(Value::Object(filters)) = reply.get("filters") {
            for (column, value) in filters {
                let scalar = matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_));
                if scalar && columns.contains(column.as_str()) {
                    query.filters.insert(column.clone(), value.clone());
                }
            }
        }

        if let Some(limit) = reply.get("limit").and_then(Value::as_u64) {
            if limit > 0 {
                query.limit = Some((limit as usize).min(self.row_limit));
            }
        }

        query
    }
}

impl CapabilityAdapter for DatabaseAdapter {
    fn capability(&self) -> Capability {
        Capability::Db
    }

    fn invoke(&self, query: &str) -> Result<StepPayload, CapabilityError> {
        let sample = self
            .source
            .fetch(&RowQuery::new(self.table.clone()).with_limit(SAMPLE_ROWS))
            .map_err(|e| self.fail(e))?;

        if sample.is_empty() {
            return Ok(StepPayload::Db(DbResult {
                rows: Vec::new(),
                count: 0,
                table: Some(self.table.clone()),
            }));
        }

        let row_query = self
            .plan_query(query, &sample)
            .unwrap_or_else(|| RowQuery::new(self.table.clone()).with_limit(self.row_limit));

        tracing::info!(
            table = %row_query.table,
            filters = ?row_query.filters,
            limit = ?row_query.limit,
            "db query"
        );

        let rows = self.source.fetch(&row_query).map_err(|e| self.fail(e))?;
        Ok(StepPayload::Db(DbResult {
            count: rows.len(),
            rows,
            table: Some(self.table.clone()),
        }))
    }
}
