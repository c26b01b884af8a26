//! Incremental agent-log extraction.
//!
//! [`LogTail`] follows one append-only log file through an opaque monotonic
//! cursor: a byte offset plus a partial-line buffer plus the text
//! accumulated for the turn in progress. Each [`LogTail::poll`] returns
//! only events past the cursor - nothing is ever re-read or re-emitted.
//!
//! Completion rule (matching the log's writer): an assistant turn is
//! complete when a non-assistant record follows its accumulated text.
//! The pending turn at end-of-file can be flushed explicitly with
//! [`LogTail::take_pending`] - the watcher does this when the agent exits
//! or the log has gone stale.

pub mod recent;
pub mod record;
pub mod sanitize;

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use uuid::Uuid;

use record::LogRecord;

/// A sanitized tool invocation, used solely for progress display.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEvent {
    pub event_id: String,
    pub tool_name: String,
    pub brief: String,
    pub timestamp: DateTime<Utc>,
}

/// An event extracted from the log tail.
#[derive(Debug, Clone, PartialEq)]
pub enum TailEvent {
    /// A tool invocation started.
    Tool(ToolEvent),
    /// A completed assistant response (terminal per prompt).
    Response(String),
}

/// Incremental reader over one agent log file.
pub struct LogTail {
    path: PathBuf,
    /// Byte offset of consumed content. Only ever advances, except for an
    /// explicit reset when the file is rotated or truncated.
    offset: u64,
    /// Trailing bytes of an incomplete final line.
    partial: String,
    /// Text blocks accumulated for the assistant turn in progress.
    turn_text: Vec<String>,
}

impl LogTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            partial: String::new(),
            turn_text: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor position (diagnostics and tests).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// When the log file was last modified. `None` if it does not exist.
    pub fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).ok()?.modified().ok()
    }

    /// Jump the cursor past all existing content. Used at prompt start so
    /// old conversation history is never re-delivered.
    pub fn skip_to_end(&mut self) {
        self.offset = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        self.partial.clear();
        self.turn_text.clear();
    }

    /// Read past the cursor and return new events, in log order.
    ///
    /// Missing file: empty. Rotated or truncated file: the cursor resets
    /// to the start and extraction continues from there. Malformed lines
    /// are skipped, never fatal.
    pub fn poll(&mut self) -> Vec<TailEvent> {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Vec::new(),
        };

        if len < self.offset {
            log::debug!(
                "log {} shrank ({} -> {}), resetting cursor",
                self.path.display(),
                self.offset,
                len
            );
            self.offset = 0;
            self.partial.clear();
            self.turn_text.clear();
        }

        if len == self.offset {
            return Vec::new();
        }

        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };
        if file.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }
        let mut buf = Vec::new();
        if file.read_to_end(&mut buf).is_err() {
            return Vec::new();
        }
        self.offset += buf.len() as u64;
        self.partial.push_str(&String::from_utf8_lossy(&buf));

        // Keep the last incomplete line buffered for the next poll.
        let buffer = std::mem::take(&mut self.partial);
        let mut lines: Vec<&str> = buffer.split('\n').collect();
        if let Some(incomplete) = lines.pop() {
            self.partial = incomplete.to_string();
        }

        let mut events = Vec::new();
        for line in lines {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                self.consume_line(trimmed, &mut events);
            }
        }
        events
    }

    /// Flush the turn accumulated at end-of-file, if any.
    pub fn take_pending(&mut self) -> Option<String> {
        if self.turn_text.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.turn_text).join("\n\n"))
    }

    /// Whether an unfinished assistant turn is buffered.
    pub fn has_pending(&self) -> bool {
        !self.turn_text.is_empty()
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<TailEvent>) {
        let record: LogRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping malformed log line: {}", e);
                return;
            }
        };

        if record.is_assistant() {
            for block in record.content_blocks() {
                match block.block_type.as_str() {
                    "text" => {
                        if let Some(text) = block.text {
                            if !text.trim().is_empty() {
                                self.turn_text.push(text);
                            }
                        }
                    }
                    "tool_use" => {
                        let tool_name = block.name.unwrap_or_else(|| "Unknown".to_string());
                        let event_id = block
                            .id
                            .or_else(|| record.uuid.clone())
                            .unwrap_or_else(|| Uuid::new_v4().to_string());
                        let brief = sanitize::tool_brief(&tool_name, block.input.as_ref());
                        events.push(TailEvent::Tool(ToolEvent {
                            event_id,
                            tool_name,
                            brief,
                            timestamp: Utc::now(),
                        }));
                    }
                    _ => {}
                }
            }
        } else if let Some(text) = self.take_pending() {
            // A non-assistant record closes the turn before it.
            events.push(TailEvent::Response(text));
        }
    }
}
