//! Topic guardrail
//!
//! Classifies whether a query is about personal finance before it reaches the
//! web capability. Any failure to classify lets the query through.

use crate::oracle::SharedOracle;
use serde::Serialize;
use serde_json::{Map, Value};

pub const GUARDRAILS_SYSTEM: &str = "You are a content guardrails agent for a personal banking assistant. \
Your job is to determine if a user's request is related to personal finance, banking, or money management.\n\
Personal finance topics include: banking, investments, spending, budgeting, loans, credit, savings, \
financial planning, transactions, accounts, payments, financial markets, economic indicators, etc.\n\n\
Respond with JSON only: {\"allowed\": true|false, \"reason\": \"brief explanation\"}";

/// Outcome of a guardrail check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardrailVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl GuardrailVerdict {
    fn fail_open(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }
}

/// User-facing refusal for a blocked query
pub fn refusal_message(reason: &str) -> String {
    let reason = reason.trim();
    let mut message = String::from(
        "I'm a personal finance assistant and can only help with banking and financial topics.",
    );
    if !reason.is_empty() {
        message.push(' ');
        message.push_str(reason);
    }
    message.push_str(
        " Please ask me about your banking data, spending patterns, or financial information instead.",
    );
    message
}

fn allowed_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn verdict_from_reply(reply: &Map<String, Value>) -> Option<GuardrailVerdict> {
    let allowed = allowed_flag(reply.get("allowed"))?;
    let reason = reply
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    Some(GuardrailVerdict { allowed, reason })
}

pub struct Guardrail {
    oracle: SharedOracle,
}

impl Guardrail {
    pub fn new(oracle: SharedOracle) -> Self {
        Self { oracle }
    }

    /// Classify `query`; only an explicit `allowed: false` blocks
    pub fn check(&self, query: &str) -> GuardrailVerdict {
        match self.oracle.ask_structured(GUARDRAILS_SYSTEM, query) {
            Ok(reply) => verdict_from_reply(&reply).unwrap_or_else(|| {
                tracing::warn!("guardrail reply had no usable 'allowed' flag, allowing");
                GuardrailVerdict::fail_open("guardrail reply unusable")
            }),
            Err(e) => {
                tracing::warn!(error = %e, "guardrail check failed, allowing");
                GuardrailVerdict::fail_open("guardrail unavailable")
            }
        }
    }
}
