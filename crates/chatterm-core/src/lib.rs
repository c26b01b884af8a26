//! # chatterm-core
//!
//! Core coordination engine for Chatterm, the chat-driven terminal and
//! coding-agent frontend.
//!
//! This crate is framework-agnostic and owns the hard part of the system:
//! the pseudo-terminal-backed session lifecycle, the incremental log-tail
//! extractor for agent output, the file-based permission rendezvous with
//! the agent's pre-tool hook, the task queue that serializes messages
//! arriving while the agent is busy, and the watcher loop that ties them
//! together against exactly one live session.
//!
//! Chat transports (Telegram, Slack, ...), command parsing, credential
//! loading and the CLI entry point are external collaborators. They talk
//! to the core through two narrow interfaces:
//!
//! - inbound: [`watcher::Intent`] values submitted over a channel
//! - outbound: the [`transport::ChatTransport`] trait (send/edit/delete),
//!   driven by the [`transport::Announcer`] task
//!
//! ## Key Concepts
//!
//! - **Session**: one managed PTY-backed child process (shell or agent)
//! - **Log tail**: the agent's append-only structured event stream
//! - **Busy**: heuristic state meaning "do not release queued input yet"

pub mod busy;
pub mod config;
pub mod permission;
pub mod progress;
pub mod queue;
pub mod session;
pub mod tail;
pub mod transcript;
pub mod transport;
pub mod watcher;

// Re-export commonly used types
pub use busy::{BusySignal, RecencyBusy};
pub use config::{CoreConfig, PermissionMode};
pub use permission::{BridgeError, Decision, PermissionBridge, PermissionRequest};
pub use session::{Session, SessionError, SessionId, SessionManager, SessionMode, SignalKind};
pub use tail::{LogTail, TailEvent, ToolEvent};
pub use transport::{Announcer, ChatTransport, MessageRef, Notice, TransportError};
pub use watcher::{Intent, Watcher};
