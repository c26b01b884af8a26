//! Agent log discovery.
//!
//! The agent keeps one log directory per project, named by flattening the
//! working directory path, with one `.jsonl` file per conversation. The
//! watcher follows whichever file is newest; resume pickers list the most
//! recent few with a preview of their first user message.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::record::LogRecord;

/// Maximum preview length for a recent-log listing.
const PREVIEW_MAX: usize = 60;

/// A recent conversation log, for resume listings.
#[derive(Debug, Clone)]
pub struct RecentLog {
    /// Conversation id (the log file stem).
    pub session_id: String,
    /// First user message, truncated.
    pub preview: String,
    /// Log file modification time.
    pub modified_at: SystemTime,
}

/// The log directory for a working directory: `<root>/<slug>` where the
/// slug is the path with `/` flattened to `-`.
pub fn project_dir(log_root: &Path, working_dir: &str) -> PathBuf {
    log_root.join(working_dir.replace('/', "-"))
}

/// The most recently modified `.jsonl` log for a working directory.
pub fn latest_log(log_root: &Path, working_dir: &str) -> Option<PathBuf> {
    let dir = project_dir(log_root, working_dir);
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir).ok()? {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    newest.map(|(_, path)| path)
}

/// The `n` most recently modified logs for a working directory, newest
/// first, each with a preview of its first user message.
pub fn list_recent_logs(log_root: &Path, working_dir: &str, n: usize) -> Vec<RecentLog> {
    let dir = project_dir(log_root, working_dir);
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut logs: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                return None;
            }
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .collect();
    logs.sort_by(|a, b| b.0.cmp(&a.0));
    logs.truncate(n);

    logs.into_iter()
        .map(|(modified_at, path)| {
            let session_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let preview = first_user_message(&path)
                .map(|text| {
                    if text.chars().count() > PREVIEW_MAX {
                        let cut: String = text.chars().take(PREVIEW_MAX - 3).collect();
                        format!("{}...", cut)
                    } else {
                        text
                    }
                })
                .unwrap_or_else(|| "(no preview)".to_string());
            RecentLog {
                session_id,
                preview,
                modified_at,
            }
        })
        .collect()
}

/// Human-readable age for resume listings: "just now", "5 min ago", ...
pub fn format_time_ago(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86400 {
        let hrs = secs / 3600;
        format!("{} hr{} ago", hrs, if hrs > 1 { "s" } else { "" })
    } else {
        let days = secs / 86400;
        format!("{} day{} ago", days, if days > 1 { "s" } else { "" })
    }
}

fn first_user_message(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<LogRecord>(trimmed) else {
            continue;
        };
        if record.record_type == "user" {
            if let Some(text) = record.first_text() {
                return Some(text);
            }
        }
    }
    None
}
