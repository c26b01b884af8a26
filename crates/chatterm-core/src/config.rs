//! Engine tunables.
//!
//! All timing and path knobs live in one value so an embedder can build it
//! once, adjust what it needs and hand it to the watcher. Loading these from
//! files or the environment is the collaborator's job, not the core's.

use std::path::PathBuf;
use std::time::Duration;

/// Permission handling mode for agent sessions.
///
/// Maps to agent CLI flags at spawn time: `Auto` skips the permission hook
/// entirely, `Plan` starts the agent in plan mode, `Normal` leaves the hook
/// in charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionMode {
    #[default]
    Normal,
    Auto,
    Plan,
}

impl PermissionMode {
    /// Extra CLI arguments implied by this mode.
    pub fn as_args(&self) -> Vec<String> {
        match self {
            PermissionMode::Normal => Vec::new(),
            PermissionMode::Auto => vec!["--dangerously-skip-permissions".to_string()],
            PermissionMode::Plan => {
                vec!["--permission-mode".to_string(), "plan".to_string()]
            }
        }
    }

    /// Parse a user-supplied mode name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Some(PermissionMode::Normal),
            "auto" => Some(PermissionMode::Auto),
            "plan" => Some(PermissionMode::Plan),
            _ => None,
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PermissionMode::Normal => "normal",
            PermissionMode::Auto => "auto",
            PermissionMode::Plan => "plan",
        };
        write!(f, "{}", name)
    }
}

/// Tunables for the session/watcher engine.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Watcher tick interval.
    pub tick_interval: Duration,

    /// Busy heuristic: the log is considered active if modified within
    /// this window. Tunable; see [`crate::busy`].
    pub recency_window: Duration,

    /// How long the idle state must persist before a queued message is
    /// released. Guards against racing the recency window.
    pub settle_delay: Duration,

    /// Maximum number of tool-activity lines shown in the progress
    /// indicator (cap K; oldest dropped first).
    pub progress_cap: usize,

    /// How long a permission request may stay pending before the bridge
    /// marks it expired. The hook owns the actual wait; this mirrors it.
    pub permission_timeout: Duration,

    /// Directory holding the hook request/response files.
    pub rendezvous_dir: PathBuf,

    /// Root of the agent's per-project log directories.
    pub log_root: PathBuf,

    /// Shell binary for shell sessions. `None` uses `$SHELL`, falling back
    /// to `/bin/bash`.
    pub shell: Option<String>,

    /// Agent binary for agent sessions.
    pub agent_bin: String,

    /// Extra arguments appended to every agent spawn.
    pub agent_args: Vec<String>,

    /// Permission handling mode for agent sessions.
    pub permission_mode: PermissionMode,

    /// Environment variable through which the session id is exported to
    /// the external pre-tool hook.
    pub hook_env: String,

    /// Transport message length cap; longer notices are chunked.
    pub max_message_len: usize,

    /// Directory for per-session I/O transcripts. `None` disables them.
    pub transcript_dir: Option<PathBuf>,

    /// Initial working directory for auto-started sessions.
    pub start_dir: PathBuf,

    /// PTY geometry.
    pub pty_rows: u16,
    pub pty_cols: u16,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            recency_window: Duration::from_secs(3),
            settle_delay: Duration::from_secs(2),
            progress_cap: 5,
            permission_timeout: Duration::from_secs(24 * 60 * 60),
            rendezvous_dir: std::env::temp_dir(),
            log_root: home_dir().join(".claude").join("projects"),
            shell: None,
            agent_bin: "claude".to_string(),
            agent_args: Vec::new(),
            permission_mode: PermissionMode::Normal,
            hook_env: "CHATTERM_SESSION_ID".to_string(),
            max_message_len: 4096,
            transcript_dir: None,
            start_dir: home_dir(),
            pty_rows: 40,
            pty_cols: 120,
        }
    }
}

/// The user's home directory, falling back to the temp dir when `$HOME`
/// is unset (containers, CI).
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}
