//! Permission rendezvous with the agent's pre-tool hook.
//!
//! The hook is an independently-launched process that blocks the agent
//! before each tool call. It writes a request descriptor into the
//! rendezvous directory and polls (up to its own bounded timeout, typically
//! 24h) for a response file carrying the human decision. The core never
//! owns the hook process - it only observes request arrival and writes
//! resolutions, tolerating the hook vanishing at any time.
//!
//! At most one request is outstanding at a time. That is enforced by the
//! agent's own sequential tool execution, not by the bridge; the bridge
//! simply refuses to pick up a second request while one is pending.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::tail::sanitize;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The referenced request is not the pending one (already resolved,
    /// expired, or never existed). Recovered: the user is told the action
    /// is no longer valid; no state changes.
    #[error("permission request {0} is no longer pending")]
    Stale(String),
}

/// The user's decision on a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }
}

/// Lifecycle of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// One permission request surfaced to the user.
#[derive(Debug, Clone)]
pub struct PermissionRequest {
    pub request_id: String,
    pub tool_name: String,
    /// Sanitized, display-ready summary - never the raw tool input.
    pub input_summary: String,
    pub created_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// What the hook writes into the request file.
#[derive(Debug, Deserialize)]
struct HookRequest {
    #[serde(default = "unknown_tool")]
    tool_name: String,
    #[serde(default)]
    tool_input: Value,
}

fn unknown_tool() -> String {
    "unknown".to_string()
}

/// File rendezvous between the hook process and the core.
pub struct PermissionBridge {
    dir: PathBuf,
    session_id: String,
    timeout: Duration,
    pending: Option<PermissionRequest>,
}

impl PermissionBridge {
    pub fn new(dir: PathBuf, session_id: String, timeout: Duration) -> Self {
        Self {
            dir,
            session_id,
            timeout,
            pending: None,
        }
    }

    fn request_path(&self) -> PathBuf {
        self.dir.join(format!("perm_req_{}.json", self.session_id))
    }

    fn response_path(&self) -> PathBuf {
        self.dir.join(format!("perm_resp_{}.json", self.session_id))
    }

    /// Pick up a newly-arrived request, if any.
    ///
    /// Returns `None` while a request is already outstanding. A request
    /// file that does not parse (the hook may still be writing it) is left
    /// in place and retried on the next poll.
    pub fn poll_pending(&mut self) -> Option<PermissionRequest> {
        if self.pending.is_some() {
            return None;
        }

        let path = self.request_path();
        let raw = std::fs::read_to_string(&path).ok()?;
        let hook_req: HookRequest = match serde_json::from_str(&raw) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("request file not yet readable, retrying: {}", e);
                return None;
            }
        };

        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove request file: {}", e);
            }
        }

        let request = PermissionRequest {
            request_id: Uuid::new_v4().to_string(),
            input_summary: sanitize::permission_summary(&hook_req.tool_name, &hook_req.tool_input),
            tool_name: hook_req.tool_name,
            created_at: Utc::now(),
            status: RequestStatus::Pending,
        };
        log::info!(
            "permission request {} for tool {}",
            request.request_id,
            request.tool_name
        );
        self.pending = Some(request.clone());
        Some(request)
    }

    /// Resolve the pending request.
    ///
    /// Writing the response file can fail if the hook already gave up and
    /// its directory is gone; that is logged and swallowed - the request
    /// still counts as resolved. Resolving anything other than the current
    /// pending request fails with [`BridgeError::Stale`] and mutates
    /// nothing.
    pub fn resolve(&mut self, request_id: &str, decision: Decision) -> Result<(), BridgeError> {
        match self.pending.take() {
            Some(mut request)
                if request.request_id == request_id && request.status == RequestStatus::Pending =>
            {
                if let Err(e) = self.write_response(decision) {
                    log::warn!("could not deliver permission response (hook gone?): {}", e);
                }
                request.status = match decision {
                    Decision::Allow => RequestStatus::Approved,
                    Decision::Deny => RequestStatus::Denied,
                };
                log::info!(
                    "permission request {} {}",
                    request.request_id,
                    decision.as_str()
                );
                Ok(())
            }
            other => {
                self.pending = other;
                Err(BridgeError::Stale(request_id.to_string()))
            }
        }
    }

    /// Expire a pending request older than the hook's own timeout. The
    /// hook treats a missing decision as denial, so this is bookkeeping,
    /// not an error; late resolutions will get [`BridgeError::Stale`].
    pub fn expire_stale(&mut self, now: DateTime<Utc>) -> Option<PermissionRequest> {
        let timeout = chrono::Duration::from_std(self.timeout).ok()?;
        let expired = self
            .pending
            .as_ref()
            .map_or(false, |p| now - p.created_at > timeout);
        if !expired {
            return None;
        }
        let mut request = self.pending.take()?;
        request.status = RequestStatus::Expired;
        log::info!("permission request {} expired", request.request_id);
        Some(request)
    }

    /// Interrupt path: deny whatever is pending, best-effort, and clear it.
    /// Returns true if a request was abandoned.
    pub fn abandon(&mut self) -> bool {
        if self.pending.take().is_none() {
            return false;
        }
        if let Err(e) = self.write_response(Decision::Deny) {
            log::warn!("could not deliver abandon denial: {}", e);
        }
        true
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PermissionRequest> {
        self.pending.as_ref()
    }

    /// Remove lingering rendezvous files on session teardown.
    pub fn cleanup(&self) {
        for path in [self.request_path(), self.response_path()] {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to clean up {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Write the response atomically (temp file + rename) so the polling
    /// hook never observes partial JSON.
    fn write_response(&self, decision: Decision) -> std::io::Result<()> {
        let path = self.response_path();
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            let body = serde_json::json!({ "decision": decision.as_str() });
            file.write_all(body.to_string().as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn bridge_in(dir: &Path) -> PermissionBridge {
        PermissionBridge::new(
            dir.to_path_buf(),
            "test-session".to_string(),
            Duration::from_secs(24 * 60 * 60),
        )
    }

    fn write_request(dir: &Path, tool: &str, input: serde_json::Value) {
        let body = serde_json::json!({
            "tool_name": tool,
            "tool_input": input,
            "ts": 1700000000,
        });
        std::fs::write(
            dir.join("perm_req_test-session.json"),
            body.to_string(),
        )
        .unwrap();
    }

    fn read_response(dir: &Path) -> serde_json::Value {
        let raw = std::fs::read_to_string(dir.join("perm_resp_test-session.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    mod poll_pending {
        use super::*;

        #[test]
        fn no_file_means_no_request() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            assert!(bridge.poll_pending().is_none());
            assert!(!bridge.has_pending());
        }

        #[test]
        fn picks_up_request_and_removes_file() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "rm -rf build"}));

            let request = bridge.poll_pending().unwrap();
            assert_eq!(request.tool_name, "Bash");
            assert_eq!(request.status, RequestStatus::Pending);
            assert!(request.input_summary.contains("rm -rf build"));
            assert!(!dir.path().join("perm_req_test-session.json").exists());
            assert!(bridge.has_pending());
        }

        #[test]
        fn at_most_one_pending() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            assert!(bridge.poll_pending().is_some());

            // A second file cannot be picked up while one is outstanding.
            write_request(dir.path(), "Edit", serde_json::json!({"file_path": "/x"}));
            assert!(bridge.poll_pending().is_none());
            assert_eq!(bridge.pending().unwrap().tool_name, "Bash");
        }

        #[test]
        fn half_written_file_is_retried() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            let path = dir.path().join("perm_req_test-session.json");
            std::fs::write(&path, "{\"tool_name\": \"Ba").unwrap();

            assert!(bridge.poll_pending().is_none());
            // The file is left in place for the next poll.
            assert!(path.exists());

            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            assert!(bridge.poll_pending().is_some());
        }

        #[test]
        fn missing_fields_default() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            std::fs::write(
                dir.path().join("perm_req_test-session.json"),
                "{}",
            )
            .unwrap();

            let request = bridge.poll_pending().unwrap();
            assert_eq!(request.tool_name, "unknown");
        }
    }

    mod resolve {
        use super::*;

        #[test]
        fn allow_writes_response() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            let request = bridge.poll_pending().unwrap();

            bridge.resolve(&request.request_id, Decision::Allow).unwrap();
            assert_eq!(read_response(dir.path())["decision"], "allow");
            assert!(!bridge.has_pending());
        }

        #[test]
        fn deny_writes_response() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            let request = bridge.poll_pending().unwrap();

            bridge.resolve(&request.request_id, Decision::Deny).unwrap();
            assert_eq!(read_response(dir.path())["decision"], "deny");
        }

        #[test]
        fn resolving_twice_is_stale() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            let request = bridge.poll_pending().unwrap();

            bridge.resolve(&request.request_id, Decision::Allow).unwrap();
            let err = bridge.resolve(&request.request_id, Decision::Deny).unwrap_err();
            assert!(matches!(err, BridgeError::Stale(_)));
            // The original decision stands.
            assert_eq!(read_response(dir.path())["decision"], "allow");
        }

        #[test]
        fn unknown_id_is_stale_and_mutates_nothing() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            bridge.poll_pending().unwrap();

            let err = bridge.resolve("not-the-id", Decision::Allow).unwrap_err();
            assert!(matches!(err, BridgeError::Stale(_)));
            assert!(bridge.has_pending());
            assert!(!dir.path().join("perm_resp_test-session.json").exists());
        }

        #[test]
        fn unwritable_response_dir_is_swallowed() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            let request = bridge.poll_pending().unwrap();

            // Simulate the hook's directory vanishing.
            std::fs::remove_dir_all(dir.path()).unwrap();
            assert!(bridge.resolve(&request.request_id, Decision::Allow).is_ok());
            assert!(!bridge.has_pending());
        }
    }

    mod expiry {
        use super::*;

        #[test]
        fn fresh_request_does_not_expire() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            bridge.poll_pending().unwrap();

            assert!(bridge.expire_stale(Utc::now()).is_none());
            assert!(bridge.has_pending());
        }

        #[test]
        fn old_request_expires_and_late_resolution_is_stale() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            let request = bridge.poll_pending().unwrap();

            let later = Utc::now() + chrono::Duration::hours(25);
            let expired = bridge.expire_stale(later).unwrap();
            assert_eq!(expired.status, RequestStatus::Expired);
            assert!(!bridge.has_pending());

            let err = bridge.resolve(&request.request_id, Decision::Allow).unwrap_err();
            assert!(matches!(err, BridgeError::Stale(_)));
        }
    }

    mod abandon {
        use super::*;

        #[test]
        fn abandon_denies_pending() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            write_request(dir.path(), "Bash", serde_json::json!({"command": "ls"}));
            bridge.poll_pending().unwrap();

            assert!(bridge.abandon());
            assert!(!bridge.has_pending());
            assert_eq!(read_response(dir.path())["decision"], "deny");
        }

        #[test]
        fn abandon_without_pending_is_false() {
            let dir = tempfile::tempdir().unwrap();
            let mut bridge = bridge_in(dir.path());
            assert!(!bridge.abandon());
        }
    }

    mod cleanup {
        use super::*;

        #[test]
        fn removes_lingering_files() {
            let dir = tempfile::tempdir().unwrap();
            let bridge = bridge_in(dir.path());
            std::fs::write(dir.path().join("perm_req_test-session.json"), "{}").unwrap();
            std::fs::write(dir.path().join("perm_resp_test-session.json"), "{}").unwrap();

            bridge.cleanup();
            assert!(!dir.path().join("perm_req_test-session.json").exists());
            assert!(!dir.path().join("perm_resp_test-session.json").exists());
        }

        #[test]
        fn cleanup_with_nothing_to_remove_is_fine() {
            let dir = tempfile::tempdir().unwrap();
            bridge_in(dir.path()).cleanup();
        }
    }
}
