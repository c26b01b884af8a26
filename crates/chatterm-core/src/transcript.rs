//! Per-session I/O transcript.
//!
//! Appends timestamped `IN`/`OUT` lines to `<dir>/<session>.log` so a
//! session can be audited after the fact. Entirely best-effort: when the
//! directory is not configured or a write fails, the session carries on.

use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Handle to one session's transcript file. A disabled transcript (no
/// directory configured, or the file could not be opened) swallows writes.
pub struct Transcript {
    file: Option<File>,
}

impl Transcript {
    /// Open (or create) `<dir>/<session_id>.log`. `None` dir disables.
    pub fn open(dir: Option<&Path>, session_id: &str) -> Self {
        let file = dir.and_then(|dir| {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::warn!("could not create transcript dir: {}", e);
                return None;
            }
            let path = dir.join(format!("{}.log", session_id));
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| log::warn!("could not open transcript {}: {}", path.display(), e))
                .ok()
        });
        Self { file }
    }

    /// A transcript that records nothing.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Append one timestamped line. `direction` is typically "IN" or "OUT".
    pub fn line(&mut self, direction: &str, data: &str) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let _ = writeln!(file, "[{}] {}: {}", ts, direction, data.trim_end());
        let _ = file.flush();
    }
}
