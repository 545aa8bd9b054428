//! AssistantService - main backend facade
//!
//! Wires configuration into a ready orchestrator: the oracle, the row and
//! search backends, and the three capability adapters. Front ends (CLI, HTTP)
//! only talk to this type.
//!
//! # Example
//!
//! ```ignore
//! use tellr_core::{load_config, AssistantService};
//!
//! let config = load_config(&cwd, None)?;
//! let service = AssistantService::from_config(config, false)?;
//!
//! let response = service.run("How much did I spend on groceries?");
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! ```

use crate::capabilities::{
    Capability, CapabilitySet, ChartAdapter, DatabaseAdapter, PostgrestRowSource, RowSource,
    SearchBackend, TavilySearch, WebSearchAdapter,
};
use crate::config::TellrConfig;
use crate::events::RunEvent;
use crate::llm::ProviderRegistry;
use crate::oracle::{AskOptions, DisabledOracle, LlmOracle, SharedOracle};
use crate::workflow::{fan_out, FanOutReport, Orchestrator, PlannedWorkflow, RunResponse, RunState};
use crate::Result;
use crossbeam_channel::Sender;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backend service facade
pub struct AssistantService {
    orchestrator: Orchestrator,
    config: TellrConfig,
    /// Human-readable description of the oracle in use
    oracle_label: String,
}

impl AssistantService {
    /// Build the service from configuration
    ///
    /// With `offline` set, or when no provider is ready, every oracle call
    /// fails and each stage takes its deterministic fallback. Capability
    /// backends are still the configured ones.
    pub fn from_config(config: TellrConfig, offline: bool) -> Result<Self> {
        let (oracle, oracle_label) = build_oracle(&config, offline);

        let timeout = config.llm.timeout;
        let rows: Arc<dyn RowSource> = Arc::new(PostgrestRowSource::from_config(&config.database, timeout));
        let search: Arc<dyn SearchBackend> = Arc::new(TavilySearch::from_config(&config.search, timeout));
        let capabilities = default_capabilities(&config, oracle.clone(), rows, search)?;

        tracing::info!(
            oracle = %oracle_label,
            table = %config.database.default_table,
            "assistant service ready"
        );

        Ok(Self::with_components(config, oracle, capabilities).labelled(oracle_label))
    }

    /// Build the service from explicit parts
    pub fn with_components(config: TellrConfig, oracle: SharedOracle, capabilities: CapabilitySet) -> Self {
        let synthesis = AskOptions::new(
            config.oracle.synthesis_max_tokens,
            config.oracle.synthesis_temperature,
        );
        Self {
            orchestrator: Orchestrator::new(oracle, capabilities, synthesis),
            config,
            oracle_label: "custom".to_string(),
        }
    }

    fn labelled(mut self, label: String) -> Self {
        self.oracle_label = label;
        self
    }

    /// Report run events on `tx`
    pub fn with_event_sender(mut self, tx: Sender<RunEvent>) -> Self {
        self.orchestrator = self.orchestrator.with_event_sender(tx);
        self
    }

    /// Answer a question
    pub fn run(&self, question: &str) -> RunResponse {
        self.orchestrator.run(question)
    }

    /// Answer a question and keep the full run record
    pub fn execute(&self, question: &str) -> Result<RunState> {
        self.orchestrator.execute(question)
    }

    /// Plan a question without executing it
    pub fn plan(&self, question: &str) -> Result<PlannedWorkflow> {
        self.orchestrator.plan_only(question)
    }

    /// Run capabilities concurrently, outside the linear workflow
    pub async fn fan_out(&self, tasks: BTreeMap<Capability, String>) -> FanOutReport {
        fan_out(self.orchestrator.capabilities(), tasks).await
    }

    pub fn config(&self) -> &TellrConfig {
        &self.config
    }

    pub fn oracle_label(&self) -> &str {
        &self.oracle_label
    }
}

fn build_oracle(config: &TellrConfig, offline: bool) -> (SharedOracle, String) {
    if offline {
        return (
            Arc::new(DisabledOracle::new("offline mode")),
            "offline".to_string(),
        );
    }

    let registry = ProviderRegistry::from_config(config);
    match registry.resolve() {
        Ok(provider) => {
            let label = format!("{} ({})", provider.name(), provider.model());
            (Arc::new(LlmOracle::new(provider, &config.oracle)), label)
        }
        Err(e) => {
            tracing::warn!(error = %e, "no LLM provider ready, using fallbacks only");
            (
                Arc::new(DisabledOracle::new(e.to_string())),
                "unavailable".to_string(),
            )
        }
    }
}

/// Standard adapters over the given backends
pub fn default_capabilities(
    config: &TellrConfig,
    oracle: SharedOracle,
    rows: Arc<dyn RowSource>,
    search: Arc<dyn SearchBackend>,
) -> Result<CapabilitySet> {
    let table = &config.database.default_table;
    let row_limit = config.database.row_limit;

    CapabilitySet::new(
        Arc::new(DatabaseAdapter::new(rows.clone(), oracle.clone(), table.as_str(), row_limit)),
        Arc::new(ChartAdapter::new(rows, oracle.clone(), table.as_str(), row_limit)),
        Arc::new(WebSearchAdapter::new(search, oracle, config.search.max_results)),
    )
}
