//! Planning oracle client
//!
//! The oracle is the language model seen from the orchestrator: a text call
//! and a JSON call with fallback extraction.

mod client;
mod reply;

pub use client::{
    AskOptions, DisabledOracle, LlmOracle, Oracle, SharedOracle, JSON_ONLY_INSTRUCTION,
};
pub use reply::{parse_reply, OracleReply};
