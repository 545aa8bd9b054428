//! Chat message and completion request types

use serde::{Deserialize, Serialize};

/// Role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Chat message for LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One blocking completion call
///
/// The system prompt travels separately because providers disagree on where
/// it belongs (Anthropic takes a top-level field, chat APIs take a message).
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// Single-turn request: one system prompt, one user message
    pub fn single(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatMessage::user(user)],
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Messages in OpenAI-style chat format, system prompt first when present
    pub(crate) fn chat_messages(&self) -> Vec<serde_json::Value> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !self.system.trim().is_empty() {
            out.push(serde_json::json!({ "role": "system", "content": self.system }));
        }
        out.extend(self.messages.iter().map(|m| {
            serde_json::json!({ "role": m.role.as_str(), "content": m.content })
        }));
        out
    }
}
