//! Agent log record types.
//!
//! The agent writes its conversation as newline-delimited JSON. Each record
//! carries a unique `uuid` and a `type` discriminator; assistant records
//! carry a `message.content` array of blocks. Only the fields the extractor
//! cares about are typed - everything else is ignored, and block-level
//! parsing is tolerant so one odd block never loses a whole record.

use serde::Deserialize;
use serde_json::Value;

/// One line of the agent log.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    /// The record type ("assistant", "user", "system", "progress", ...).
    #[serde(rename = "type")]
    pub record_type: String,

    /// Unique record identifier.
    #[serde(default)]
    pub uuid: Option<String>,

    /// The wrapped message. Kept as raw JSON because user records may
    /// carry string content where assistant records carry block arrays.
    #[serde(default)]
    pub message: Option<Value>,
}

/// A content block inside an assistant message.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,

    /// Response text ("text" blocks).
    #[serde(default)]
    pub text: Option<String>,

    /// Tool name ("tool_use" blocks).
    #[serde(default)]
    pub name: Option<String>,

    /// Block id ("tool_use" blocks).
    #[serde(default)]
    pub id: Option<String>,

    /// Tool-specific input ("tool_use" blocks).
    #[serde(default)]
    pub input: Option<Value>,
}

impl LogRecord {
    pub fn is_assistant(&self) -> bool {
        self.record_type == "assistant"
    }

    /// Parse the message content blocks, skipping any that do not match
    /// the expected shape.
    pub fn content_blocks(&self) -> Vec<ContentBlock> {
        let Some(items) = self
            .message
            .as_ref()
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_array())
        else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect()
    }

    /// The first piece of plain text in the message content, if any.
    /// Handles both block arrays and bare string items.
    pub fn first_text(&self) -> Option<String> {
        let content = self.message.as_ref()?.get("content")?;
        match content {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Array(items) => items.iter().find_map(|item| match item {
                Value::String(s) => {
                    let trimmed = s.trim();
                    (!trimmed.is_empty()).then(|| trimmed.to_string())
                }
                Value::Object(obj) => {
                    if obj.get("type").and_then(Value::as_str) == Some("text") {
                        let text = obj.get("text").and_then(Value::as_str)?.trim();
                        (!text.is_empty()).then(|| text.to_string())
                    } else {
                        None
                    }
                }
                _ => None,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assistant_record() {
        let line = r#"{"type":"assistant","uuid":"u-1","message":{"role":"assistant","content":[{"type":"text","text":"Hello"}]}}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();

        assert!(record.is_assistant());
        assert_eq!(record.uuid.as_deref(), Some("u-1"));
        let blocks = record.content_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, "text");
        assert_eq!(blocks[0].text.as_deref(), Some("Hello"));
    }

    #[test]
    fn parses_tool_use_block() {
        let line = r#"{"type":"assistant","uuid":"u-2","message":{"content":[{"type":"tool_use","id":"t-1","name":"Bash","input":{"command":"ls"}}]}}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();

        let blocks = record.content_blocks();
        assert_eq!(blocks[0].name.as_deref(), Some("Bash"));
        assert_eq!(blocks[0].id.as_deref(), Some("t-1"));
        assert_eq!(blocks[0].input.as_ref().unwrap()["command"], "ls");
    }

    #[test]
    fn user_record_with_string_content_still_parses() {
        let line = r#"{"type":"user","uuid":"u-3","message":{"role":"user","content":"do the thing"}}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();

        assert!(!record.is_assistant());
        assert!(record.content_blocks().is_empty());
        assert_eq!(record.first_text().as_deref(), Some("do the thing"));
    }

    #[test]
    fn first_text_finds_text_block() {
        let line = r#"{"type":"user","message":{"content":[{"type":"text","text":"  preview me  "}]}}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.first_text().as_deref(), Some("preview me"));
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let line = r#"{"type":"assistant","message":{"content":[42,{"type":"text","text":"ok"}]}}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();

        let blocks = record.content_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text.as_deref(), Some("ok"));
    }

    #[test]
    fn missing_message_yields_no_blocks() {
        let line = r#"{"type":"system","uuid":"u-4"}"#;
        let record: LogRecord = serde_json::from_str(line).unwrap();
        assert!(record.content_blocks().is_empty());
        assert!(record.first_text().is_none());
    }
}
