//! Parsing of oracle replies into JSON
//!
//! Models are told to answer with JSON only, but still wrap it in markdown
//! fences or prose often enough that a strict parse alone is not usable.

use serde_json::Value;

/// A raw oracle reply after the parse attempt
#[derive(Debug, Clone, PartialEq)]
pub enum OracleReply {
    /// The reply (or an object inside it) parsed as JSON
    Parsed(Value),
    /// Nothing in the reply parsed; carries the raw text
    ParseError(String),
}

impl OracleReply {
    /// The parsed value when it is a JSON object
    pub fn into_object(self) -> Option<serde_json::Map<String, Value>> {
        match self {
            OracleReply::Parsed(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Parse a reply: strict JSON, then fenced JSON, then the first top-level `{...}` span
pub fn parse_reply(raw: &str) -> OracleReply {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return OracleReply::Parsed(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if unfenced != trimmed {
        if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
            return OracleReply::Parsed(value);
        }
    }

    if let Some(span) = first_object_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return OracleReply::Parsed(value);
        }
    }

    // Last resort: widest brace span, for replies with stray braces inside strings
    if let Some(span) = widest_brace_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            return OracleReply::Parsed(value);
        }
    }

    OracleReply::ParseError(raw.to_string())
}

/// Clean up potential markdown code blocks
fn strip_code_fence(content: &str) -> &str {
    content
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Find the first balanced top-level `{...}` span, ignoring braces inside strings
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn widest_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Shorten a raw reply for error messages and logs
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}... [truncated]", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_strict_json() {
        let reply = parse_reply(r#"{"workflow": ["db"]}"#);
        assert_eq!(reply, OracleReply::Parsed(json!({"workflow": ["db"]})));
    }

    #[test]
    fn test_parse_with_markdown() {
        let reply = parse_reply("```json\n{\"allowed\": true, \"reason\": \"banking\"}\n```");
        assert_eq!(
            reply,
            OracleReply::Parsed(json!({"allowed": true, "reason": "banking"}))
        );
    }

    #[test]
    fn test_object_embedded_in_prose() {
        let raw = "Sure! Here is the plan: {\"workflow\": [\"web\", \"db\"], \"reasoning\": \"needs {context}\"} Hope it helps {ok}";
        let reply = parse_reply(raw);
        assert_eq!(
            reply,
            OracleReply::Parsed(json!({"workflow": ["web", "db"], "reasoning": "needs {context}"}))
        );
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let raw = r#"answer: {"refined_query": "spending \"groceries\" {2024}"} done"#;
        let map = parse_reply(raw).into_object().unwrap();
        assert_eq!(map["refined_query"], json!("spending \"groceries\" {2024}"));
    }

    #[test]
    fn test_unparseable_reply() {
        let raw = "I cannot help with that.";
        assert_eq!(parse_reply(raw), OracleReply::ParseError(raw.to_string()));
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(
            parse_reply("{\"workflow\": [\"db\""),
            OracleReply::ParseError(_)
        ));
    }

    #[test]
    fn test_non_object_is_not_an_object() {
        assert!(parse_reply("[1, 2]").into_object().is_none());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo", 10), "héllo");
        assert_eq!(preview("héllo", 2), "hé... [truncated]");
    }
}
