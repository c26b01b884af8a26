//! Session manager - single owner of the PTY-backed child process.
//!
//! Exactly one session is live at a time; starting a new one terminates
//! the previous one first. All process interaction (writes, signals,
//! non-blocking reads, termination) goes through this type.

use portable_pty::CommandBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::pty::PtyProcess;
use super::state::{Session, SessionId, SessionMode, SignalKind};
use crate::config::CoreConfig;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to start session: {0}")]
    Spawn(String),

    #[error("no session is running")]
    NotRunning,
}

/// A live session: its record plus the process behind it.
struct LiveSession {
    session: Session,
    pty: PtyProcess,
    /// Last line written, kept so the next output flush can suppress the
    /// terminal echo of it.
    last_sent: Option<String>,
}

/// Manages the one live PTY session.
pub struct SessionManager {
    config: CoreConfig,
    live: Option<LiveSession>,
}

impl SessionManager {
    pub fn new(config: CoreConfig) -> Self {
        Self { config, live: None }
    }

    /// Start a session, replacing (and terminating) any live one.
    pub fn start(
        &mut self,
        mode: SessionMode,
        working_dir: &str,
    ) -> Result<SessionId, SessionError> {
        if !Path::new(working_dir).is_dir() {
            return Err(SessionError::Spawn(format!(
                "working directory does not exist: {}",
                working_dir
            )));
        }

        let program = match mode {
            SessionMode::Shell => self.shell_binary(),
            SessionMode::Agent => self.config.agent_bin.clone(),
        };
        let program = resolve_executable(&program)
            .ok_or_else(|| SessionError::Spawn(format!("executable not found: {}", program)))?;

        self.terminate();

        let id = SessionId::new();
        let mut cmd = CommandBuilder::new(&program);
        match mode {
            SessionMode::Shell => {
                cmd.arg("-l");
            }
            SessionMode::Agent => {
                for arg in self.config.permission_mode.as_args() {
                    cmd.arg(arg);
                }
                for arg in &self.config.agent_args {
                    cmd.arg(arg);
                }
            }
        }
        cmd.cwd(working_dir);
        // The pre-tool hook finds the rendezvous files through this.
        cmd.env(&self.config.hook_env, &id.0);

        let pty = PtyProcess::spawn(cmd, self.config.pty_rows, self.config.pty_cols)
            .map_err(SessionError::Spawn)?;

        log::info!("started {} session {} in {}", mode, id, working_dir);

        self.live = Some(LiveSession {
            session: Session::new(id.clone(), working_dir.to_string(), mode),
            pty,
            last_sent: None,
        });

        Ok(id)
    }

    /// Write a line of input, remembering it for echo suppression.
    pub fn write_line(&mut self, text: &str) -> Result<(), SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::NotRunning)?;
        let line = text.replace('\n', " ");
        live.pty
            .write(format!("{}\n", line).as_bytes())
            .map_err(|e| {
                log::warn!("PTY write failed: {}", e);
                SessionError::NotRunning
            })?;
        live.last_sent = Some(line);
        Ok(())
    }

    /// Write raw bytes (escape, bare newline, ...) without echo tracking.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let live = self.live.as_mut().ok_or(SessionError::NotRunning)?;
        live.pty.write(data).map_err(|e| {
            log::warn!("PTY write failed: {}", e);
            SessionError::NotRunning
        })
    }

    /// Deliver a control keystroke (Ctrl-C / Ctrl-D / Ctrl-Z).
    pub fn send_signal(&mut self, kind: SignalKind) -> Result<(), SessionError> {
        self.write_raw(&[kind.control_byte()])
    }

    /// Force-stop and reap the live session. Idempotent; returns the
    /// terminated session record if one was live.
    pub fn terminate(&mut self) -> Option<Session> {
        let mut live = self.live.take()?;
        live.pty.kill();
        live.session.terminated_at = Some(chrono::Utc::now());
        log::info!("terminated session {}", live.session.id);
        Some(live.session)
    }

    /// Drain currently buffered PTY output. Never blocks.
    pub fn read_nonblocking(&mut self) -> Vec<u8> {
        match self.live.as_mut() {
            Some(live) => live.pty.read_nonblocking(),
            None => Vec::new(),
        }
    }

    /// Whether a session is live and its process still running.
    pub fn is_running(&mut self) -> bool {
        match self.live.as_mut() {
            Some(live) => live.pty.is_running(),
            None => false,
        }
    }

    /// The live session record, if any.
    pub fn session(&self) -> Option<&Session> {
        self.live.as_ref().map(|l| &l.session)
    }

    /// Take the last written line for echo suppression.
    pub fn take_echo(&mut self) -> Option<String> {
        self.live.as_mut().and_then(|l| l.last_sent.take())
    }

    /// Human-readable session summary.
    pub fn status(&mut self) -> String {
        match self.live.as_mut() {
            None => "No active session".to_string(),
            Some(live) => {
                let uptime = live.session.uptime_secs();
                let (hours, rem) = (uptime / 3600, uptime % 3600);
                let (mins, secs) = (rem / 60, rem % 60);
                let pid = live
                    .pty
                    .pid()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "?".to_string());
                format!(
                    "Mode: {}\nPID: {}\nDirectory: {}\nUptime: {}h {}m {}s\nTerminal: {}x{}",
                    live.session.mode,
                    pid,
                    live.session.working_dir,
                    hours,
                    mins,
                    secs,
                    self.config.pty_cols,
                    self.config.pty_rows,
                )
            }
        }
    }

    fn shell_binary(&self) -> String {
        self.config
            .shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/bash".to_string())
    }
}

/// Resolve an executable name: explicit paths must exist, bare names are
/// searched on `$PATH`.
fn resolve_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if program.contains('/') {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}
