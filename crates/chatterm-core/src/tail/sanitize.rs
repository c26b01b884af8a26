//! Tool input sanitization.
//!
//! Tool inputs come straight out of the agent log and may contain anything:
//! multi-kilobyte file bodies, control characters, whole scripts. Only
//! known-safe fields are extracted for display, control characters are
//! stripped, and length is capped. Raw inputs are never surfaced.

use serde_json::Value;

/// Character cap for a single progress brief.
pub const BRIEF_MAX: usize = 120;

/// Character cap for a permission summary body.
pub const SUMMARY_MAX: usize = 500;

/// Remove control characters, folding newlines and tabs into spaces.
pub fn strip_control(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

/// Truncate to `max` characters, appending "..." when anything was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut)
}

/// The known-safe display field for a tool, if it has one.
fn safe_field(tool_name: &str, input: &Value) -> Option<String> {
    let field = match tool_name {
        "Bash" => "command",
        "Edit" | "Write" | "MultiEdit" | "Read" | "NotebookEdit" => "file_path",
        "Grep" | "Glob" => "pattern",
        "WebFetch" | "WebSearch" => "url",
        "Task" => "description",
        _ => return None,
    };
    let value = input.get(field)?.as_str()?;
    // Commands can span lines; only the first one matters for display.
    let first_line = value.lines().next().unwrap_or("");
    let cleaned = strip_control(first_line);
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// One-line brief for the progress indicator: `ToolName: detail`.
pub fn tool_brief(tool_name: &str, input: Option<&Value>) -> String {
    let detail = input.and_then(|i| safe_field(tool_name, i));
    let brief = match detail {
        Some(detail) => format!("{}: {}", tool_name, detail),
        None => tool_name.to_string(),
    };
    truncate_chars(&brief, BRIEF_MAX)
}

/// Multi-line summary for a permission request.
pub fn permission_summary(tool_name: &str, input: &Value) -> String {
    let msg = match tool_name {
        "Bash" => {
            let cmd = input.get("command").and_then(Value::as_str).unwrap_or("");
            format!(
                "Agent wants to run:\n{}",
                truncate_chars(&strip_control(cmd), 200)
            )
        }
        "Edit" | "Write" | "MultiEdit" => {
            let path = input
                .get("file_path")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            format!(
                "Agent wants to use: {}\nFile: {}",
                tool_name,
                strip_control(path)
            )
        }
        _ => {
            let compact = serde_json::to_string(input).unwrap_or_default();
            format!(
                "Agent wants to use: {}\n{}",
                tool_name,
                truncate_chars(&strip_control(&compact), 200)
            )
        }
    };
    truncate_chars(&msg, SUMMARY_MAX)
}
