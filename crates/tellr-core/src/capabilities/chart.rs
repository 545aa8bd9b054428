//! Chart capability
//!
//! Fetches rows, picks a minimal chart spec (oracle first, column heuristics as
//! fallback), aggregates the rows and emits a Chart.js configuration.

use super::rows::{Row, RowQuery, RowSource};
use super::{
    Aggregation, Capability, CapabilityAdapter, ChartKind, ChartSpec, StepPayload, VizResult,
};
use crate::error::CapabilityError;
use crate::oracle::SharedOracle;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const CHART_SPEC_SYSTEM: &str = "You design a very simple chart from tabular rows. Respond with JSON only.\n\
Return keys: {chart: 'bar'|'line'|'pie', x: string, y: string|null, agg: 'count'|'sum'|'avg'|'none'}.\n\
Guidance: Use 'bar' for category comparisons (counts/sums), 'line' for time series or sequences, \
'pie' for share of whole across categories (counts or sums). Pick columns that exist.";

const SPEC_SAMPLE_ROWS: usize = 200;
const MAX_GROUPS: usize = 20;
const MAX_SEQUENCE: usize = 100;

const PIE_PALETTE: [&str; 10] = [
    "#4f46e5", "#06b6d4", "#22c55e", "#f59e0b", "#ef4444", "#8b5cf6", "#14b8a6", "#84cc16",
    "#eab308", "#f97316",
];

/// Aggregated chart data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Spec chosen from column names alone
///
/// Line chart when any column looks temporal, otherwise bar; x is the first
/// non-numeric column of the first row.
pub fn heuristic_spec(rows: &[Row]) -> ChartSpec {
    let first = rows.first();

    let temporal = first
        .map(|row| {
            row.keys().any(|k| {
                let k = k.to_lowercase();
                k.contains("date") || k.contains("time")
            })
        })
        .unwrap_or(false);

    let x = first
        .and_then(|row| {
            row.iter()
                .find(|(_, v)| !v.is_number())
                .or_else(|| row.iter().next())
                .map(|(k, _)| k.clone())
        })
        .unwrap_or_else(|| "category".to_string());

    ChartSpec {
        chart: if temporal { ChartKind::Line } else { ChartKind::Bar },
        x,
        y: None,
        agg: Aggregation::Count,
    }
}

/// Validate an oracle reply; `chart` and `x` are required
fn spec_from_reply(reply: &Map<String, Value>) -> Option<ChartSpec> {
    let chart = reply.get("chart").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let x = reply.get("x").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let y = reply
        .get("y")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let agg = reply
        .get("agg")
        .and_then(Value::as_str)
        .map(Aggregation::parse_lenient)
        .unwrap_or(Aggregation::Count);

    Some(ChartSpec {
        chart: ChartKind::parse_lenient(chart),
        x: x.to_string(),
        y,
        agg,
    })
}

fn label_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "(none)".to_string(),
        Some(other) => other.to_string(),
    }
}

fn number_of(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Group rows by `spec.x` and reduce, keeping the 20 largest groups
pub fn aggregate(rows: &[Row], spec: &ChartSpec) -> Series {
    let y = match (&spec.y, spec.agg) {
        (Some(y), Aggregation::Sum | Aggregation::Avg | Aggregation::None) => y,
        _ => return grouped(rows, &spec.x, None, Aggregation::Count),
    };

    if spec.agg == Aggregation::None {
        let take = rows.len().min(MAX_SEQUENCE);
        return Series {
            labels: (0..take).map(|i| i.to_string()).collect(),
            values: rows[..take].iter().map(|r| number_of(r.get(y))).collect(),
        };
    }

    grouped(rows, &spec.x, Some(y.as_str()), spec.agg)
}

fn grouped(rows: &[Row], x: &str, y: Option<&str>, agg: Aggregation) -> Series {
    // (label, sum, count) in first-seen order
    let mut groups: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let label = label_of(row.get(x));
        let value = y.map(|y| number_of(row.get(y))).unwrap_or(0.0);
        let slot = *index.entry(label.clone()).or_insert_with(|| {
            groups.push((label, 0.0, 0));
            groups.len() - 1
        });
        groups[slot].1 += value;
        groups[slot].2 += 1;
    }

    let rank = |g: &(String, f64, usize)| match agg {
        Aggregation::Count => g.2 as f64,
        _ => g.1,
    };
    groups.sort_by(|a, b| rank(b).total_cmp(&rank(a)));
    groups.truncate(MAX_GROUPS);

    let values = groups
        .iter()
        .map(|(_, sum, count)| match agg {
            Aggregation::Count => *count as f64,
            Aggregation::Avg => sum / (*count).max(1) as f64,
            _ => *sum,
        })
        .collect();

    Series {
        labels: groups.into_iter().map(|(label, _, _)| label).collect(),
        values,
    }
}

/// Chart.js configuration for a spec and its series
pub fn build_chartjs(spec: &ChartSpec, series: &Series) -> Value {
    let label = format!("{} of {}", spec.agg.as_str(), spec.y.as_deref().unwrap_or(&spec.x));

    if spec.chart == ChartKind::Pie {
        let colors: Vec<&str> = PIE_PALETTE
            .iter()
            .copied()
            .cycle()
            .take(series.values.len().max(1))
            .collect();
        return json!({
            "type": "pie",
            "data": {
                "labels": series.labels,
                "datasets": [{
                    "label": label,
                    "data": series.values,
                    "backgroundColor": colors,
                    "borderColor": "#111827",
                }],
            },
            "options": {
                "responsive": true,
                "plugins": {
                    "legend": {"display": true},
                    "title": {"display": true, "text": "Simple Visualization"},
                },
            },
        });
    }

    json!({
        "type": spec.chart.as_str(),
        "data": {
            "labels": series.labels,
            "datasets": [{
                "label": label,
                "data": series.values,
                "backgroundColor": "rgba(79,70,229,0.5)",
                "borderColor": "rgba(79,70,229,1)",
            }],
        },
        "options": {
            "responsive": true,
            "plugins": {
                "legend": {"display": true},
                "title": {"display": true, "text": "Simple Visualization"},
            },
            "scales": {
                "x": {"ticks": {"autoSkip": true, "maxRotation": 45}},
                "y": {"beginAtZero": true},
            },
        },
    })
}

/// Builds a chart for a question
pub struct ChartAdapter {
    source: Arc<dyn RowSource>,
    oracle: SharedOracle,
    table: String,
    row_limit: usize,
}

impl ChartAdapter {
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

    fn choose_spec(&self, question: &str, rows: &[Row]) -> ChartSpec {
        let sample: Vec<Value> = rows
            .iter()
            .take(SPEC_SAMPLE_ROWS)
            .cloned()
            .map(Value::Object)
            .collect();
        let message = format!(
            "User question:\n{}\n\nRows (JSON, sample):\n{}",
            question,
            Value::Array(sample)
        );

        match self.oracle.ask_structured(CHART_SPEC_SYSTEM, &message) {
            Ok(reply) => match spec_from_reply(&reply) {
                Some(spec) => return spec,
                None => tracing::debug!("chart spec reply missing chart or x"),
            },
            Err(e) => tracing::debug!(error = %e, "chart spec selection failed"),
        }

        let spec = heuristic_spec(rows);
        tracing::debug!(?spec, "using heuristic chart spec");
        spec
    }
}

impl CapabilityAdapter for ChartAdapter {
    fn capability(&self) -> Capability {
        Capability::Viz
    }

    fn invoke(&self, query: &str) -> Result<StepPayload, CapabilityError> {
        let rows = self
            .source
            .fetch(&RowQuery::new(self.table.clone()).with_limit(self.row_limit))
            .map_err(|e| CapabilityError::new(Capability::Viz, e))?;

        let spec = self.choose_spec(query, &rows);
        let series = aggregate(&rows, &spec);
        tracing::info!(
            chart = spec.chart.as_str(),
            x = %spec.x,
            groups = series.labels.len(),
            "chart built"
        );

        Ok(StepPayload::Viz(VizResult {
            chartjs: build_chartjs(&spec, &series),
            spec,
        }))
    }
}
