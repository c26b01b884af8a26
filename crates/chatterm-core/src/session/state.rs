//! Per-session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
///
/// Also names the hook rendezvous files, so it is exported to the agent
/// process through the configured environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of process the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// An interactive login shell.
    Shell,
    /// The coding agent CLI.
    Agent,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Shell => write!(f, "shell"),
            SessionMode::Agent => write!(f, "agent"),
        }
    }
}

/// Control semantics deliverable through the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ctrl-C.
    Interrupt,
    /// Ctrl-D.
    Eof,
    /// Ctrl-Z.
    Suspend,
}

impl SignalKind {
    /// The control byte written to the PTY master.
    pub fn control_byte(&self) -> u8 {
        match self {
            SignalKind::Interrupt => 0x03,
            SignalKind::Eof => 0x04,
            SignalKind::Suspend => 0x1a,
        }
    }
}

/// A single managed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,

    /// Working directory the process was started in.
    pub working_dir: String,

    /// Shell or agent.
    pub mode: SessionMode,

    /// When the session was started.
    pub created_at: DateTime<Utc>,

    /// When the session was terminated (if it has been).
    pub terminated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: SessionId, working_dir: String, mode: SessionMode) -> Self {
        Self {
            id,
            working_dir,
            mode,
            created_at: Utc::now(),
            terminated_at: None,
        }
    }

    /// Seconds since the session started.
    pub fn uptime_secs(&self) -> i64 {
        let end = self.terminated_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod session_id {
        use super::*;

        #[test]
        fn new_generates_unique_ids() {
            let id1 = SessionId::new();
            let id2 = SessionId::new();
            assert_ne!(id1, id2);
        }

        #[test]
        fn display_shows_inner_string() {
            let id = SessionId("sess-123".to_string());
            assert_eq!(format!("{}", id), "sess-123");
        }

        #[test]
        fn serialization_roundtrip() {
            let id = SessionId("sess-456".to_string());
            let json = serde_json::to_string(&id).unwrap();
            let parsed: SessionId = serde_json::from_str(&json).unwrap();
            assert_eq!(id, parsed);
        }
    }

    mod signal_kind {
        use super::*;

        #[test]
        fn control_bytes_match_terminal_conventions() {
            assert_eq!(SignalKind::Interrupt.control_byte(), 0x03);
            assert_eq!(SignalKind::Eof.control_byte(), 0x04);
            assert_eq!(SignalKind::Suspend.control_byte(), 0x1a);
        }
    }

    mod session {
        use super::*;

        #[test]
        fn new_initializes_correctly() {
            let id = SessionId::new();
            let session = Session::new(id.clone(), "/tmp".to_string(), SessionMode::Shell);

            assert_eq!(session.id, id);
            assert_eq!(session.working_dir, "/tmp");
            assert_eq!(session.mode, SessionMode::Shell);
            assert!(session.terminated_at.is_none());
        }

        #[test]
        fn uptime_is_non_negative() {
            let session = Session::new(SessionId::new(), "/tmp".to_string(), SessionMode::Agent);
            assert!(session.uptime_secs() >= 0);
        }

        #[test]
        fn mode_serializes_lowercase() {
            let json = serde_json::to_string(&SessionMode::Agent).unwrap();
            assert_eq!(json, "\"agent\"");
        }
    }
}
