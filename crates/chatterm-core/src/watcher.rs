//! Fixed-interval watcher loop.
//!
//! One [`Watcher`] value per process lifetime. It owns every piece of
//! shared state - the session, the log cursor, the permission bridge, the
//! queue and the progress window - and is their sole writer. Interaction
//! handlers submit [`Intent`]s over a channel; outbound notifications
//! leave as [`Notice`]s consumed by the announcer task. Both channels are
//! non-blocking from the loop's perspective.
//!
//! Each tick, in order: surface buffered PTY output, surface a new
//! permission request, extract new log events, deliver a completed
//! response (dismissing progress first) or update progress, finalize if
//! the process has exited, and attempt one queue drain.
//!
//! The tick is public: fixed-interval polling is a deliberate
//! simplification, and an embedder may drive `tick()` from an event-based
//! scheduler instead - extraction stays idempotent and cursor-monotonic
//! either way.

use chrono::Utc;
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc::{Receiver, UnboundedSender};
use tokio::time::MissedTickBehavior;

use crate::busy::{BusySignal, RecencyBusy};
use crate::config::CoreConfig;
use crate::permission::{BridgeError, Decision, PermissionBridge};
use crate::progress::ProgressBoard;
use crate::queue::TaskQueue;
use crate::session::output::{clean_output, strip_echo};
use crate::session::{SessionManager, SessionMode, SignalKind};
use crate::tail::{recent, LogTail, TailEvent, ToolEvent};
use crate::transcript::Transcript;
use crate::transport::Notice;

/// Inbound interaction, submitted by the chat-transport collaborator.
#[derive(Debug, Clone)]
pub enum Intent {
    /// Free-form user text.
    SubmitText(String),
    /// A button action: `allow:<request_id>` or `deny:<request_id>`.
    SubmitButton(String),
    /// A control signal for the session process.
    SubmitSignal(SignalKind),
    /// Start (or replace) the session.
    StartSession {
        mode: SessionMode,
        working_dir: Option<String>,
    },
    /// Terminate the session.
    EndSession,
    /// Stop the watcher loop.
    Shutdown,
}

/// Coordinator over one session. Sole writer of all shared state.
pub struct Watcher {
    config: CoreConfig,
    sessions: SessionManager,
    /// Hook rendezvous for the live agent session.
    bridge: Option<PermissionBridge>,
    /// Cursor into the live agent session's log.
    tail: Option<LogTail>,
    busy: Box<dyn BusySignal + Send>,
    queue: TaskQueue,
    progress: ProgressBoard,
    transcript: Transcript,
    notices: UnboundedSender<Notice>,
}

impl Watcher {
    pub fn new(config: CoreConfig, notices: UnboundedSender<Notice>) -> Self {
        Self {
            sessions: SessionManager::new(config.clone()),
            bridge: None,
            tail: None,
            busy: Box::new(RecencyBusy::new(config.recency_window)),
            queue: TaskQueue::new(config.settle_delay),
            progress: ProgressBoard::new(config.progress_cap),
            transcript: Transcript::disabled(),
            notices,
            config,
        }
    }

    /// Swap in a different busy heuristic.
    pub fn with_busy_signal(mut self, signal: Box<dyn BusySignal + Send>) -> Self {
        self.busy = signal;
        self
    }

    /// Drive the loop: fixed-interval ticks interleaved with intents,
    /// until `Shutdown` arrives or the intent channel closes.
    pub async fn run(mut self, mut intents: Receiver<Intent>) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
            }
        }

        self.teardown();
    }

    /// One coordination pass. Public so an embedder can substitute its own
    /// scheduling for the built-in interval.
    pub fn tick(&mut self) {
        self.pump_output();

        if self.sessions.session().is_none() {
            return;
        }

        // (1) Surface permission traffic.
        let expired = self
            .bridge
            .as_mut()
            .and_then(|b| b.expire_stale(Utc::now()));
        if let Some(request) = expired {
            self.notify(format!(
                "Permission request for {} expired with no decision.",
                request.tool_name
            ));
        }
        let new_request = self.bridge.as_mut().and_then(|b| b.poll_pending());
        if let Some(request) = new_request {
            self.notify(format!(
                "{}\n\nReply y to allow, n to deny.",
                request.input_summary
            ));
        }

        // (2) Extract new log events.
        self.refresh_tail();
        let mut events = match self.tail.as_mut() {
            Some(tail) => tail.poll(),
            None => Vec::new(),
        };

        // The completion rule needs a following record; once the log has
        // gone quiet past the busy window, flush the open turn instead of
        // holding the response forever.
        if !self.compute_busy() {
            if let Some(text) = self.tail.as_mut().and_then(|t| t.take_pending()) {
                events.push(TailEvent::Response(text));
            }
        }

        // (3)/(4) Deliver response or update progress.
        self.process_tail_events(events);

        // (5) Finalize on process exit.
        if !self.sessions.is_running() {
            self.finalize();
            return;
        }

        // One queue drain attempt per tick.
        let busy = self.compute_busy();
        if let Some(text) = self.queue.try_drain(busy, Instant::now()) {
            log::info!("releasing queued message");
            self.start_prompt(&text);
        }
    }

    /// Apply one inbound intent.
    pub fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SubmitText(text) => self.handle_text(text),
            Intent::SubmitButton(action) => self.handle_button(&action),
            Intent::SubmitSignal(kind) => self.handle_signal(kind),
            Intent::StartSession { mode, working_dir } => {
                let dir = working_dir
                    .unwrap_or_else(|| self.config.start_dir.to_string_lossy().to_string());
                self.start_session(mode, &dir);
            }
            Intent::EndSession => {
                if self.sessions.session().is_some() {
                    self.finalize();
                } else {
                    self.notify("No active session.".to_string());
                }
            }
            // Consumed by the run loop; harmless if it reaches here.
            Intent::Shutdown => {}
        }
    }

    // --- intent handling ---

    fn handle_text(&mut self, text: String) {
        // First input auto-starts a shell session.
        if self.sessions.session().is_none() {
            let dir = self.config.start_dir.to_string_lossy().to_string();
            self.start_session(SessionMode::Shell, &dir);
            if self.sessions.session().is_none() {
                return; // start failed, user already notified
            }
        }

        let mode = match self.sessions.session() {
            Some(session) => session.mode,
            None => return,
        };
        match mode {
            SessionMode::Shell => self.handle_shell_text(&text),
            SessionMode::Agent => self.handle_agent_text(text),
        }
    }

    fn handle_shell_text(&mut self, text: &str) {
        let result = match text.trim() {
            "^C" => self.sessions.send_signal(SignalKind::Interrupt),
            "^D" => self.sessions.send_signal(SignalKind::Eof),
            "^Z" => self.sessions.send_signal(SignalKind::Suspend),
            "^[" => self.sessions.write_raw(b"\x1b"),
            "." => self.sessions.write_raw(b"\n"),
            _ => {
                self.transcript.line("IN", text);
                self.sessions.write_line(text)
            }
        };
        if let Err(e) = result {
            self.notify(e.to_string());
        }
    }

    fn handle_agent_text(&mut self, text: String) {
        let pending_id = self
            .bridge
            .as_ref()
            .and_then(|b| b.pending())
            .map(|p| p.request_id.clone());

        if let Some(request_id) = pending_id {
            match text.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => {
                    self.resolve_permission(&request_id, Decision::Allow);
                    return;
                }
                "n" | "no" => {
                    self.resolve_permission(&request_id, Decision::Deny);
                    return;
                }
                _ => {
                    // A new instruction while a permission waits: deny the
                    // held action, interrupt, and treat the text as a
                    // fresh prompt below.
                    if let Some(bridge) = self.bridge.as_mut() {
                        bridge.abandon();
                    }
                    let _ = self.sessions.send_signal(SignalKind::Interrupt);
                    self.clear_progress();
                }
            }
        }

        if self.compute_busy() {
            let position = self.queue.enqueue(text);
            self.notify(format!("Agent is busy - queued (#{}).", position));
        } else {
            self.start_prompt(&text);
        }
    }

    fn handle_button(&mut self, action: &str) {
        if let Some(id) = action.strip_prefix("allow:") {
            self.resolve_permission(id, Decision::Allow);
        } else if let Some(id) = action.strip_prefix("deny:") {
            self.resolve_permission(id, Decision::Deny);
        } else {
            log::debug!("ignoring unknown button action: {}", action);
        }
    }

    fn handle_signal(&mut self, kind: SignalKind) {
        if kind == SignalKind::Interrupt {
            // Cancellation abandons the in-flight permission and clears
            // progress; a stale resolution afterwards will be rejected.
            if let Some(bridge) = self.bridge.as_mut() {
                if bridge.abandon() {
                    log::info!("abandoned pending permission on interrupt");
                }
            }
            self.clear_progress();
        }
        if let Err(e) = self.sessions.send_signal(kind) {
            self.notify(e.to_string());
        }
    }

    fn resolve_permission(&mut self, request_id: &str, decision: Decision) {
        let result = match self.bridge.as_mut() {
            Some(bridge) => bridge.resolve(request_id, decision),
            None => Err(BridgeError::Stale(request_id.to_string())),
        };
        match result {
            Ok(()) => self.notify(
                match decision {
                    Decision::Allow => "Allowed.",
                    Decision::Deny => "Denied.",
                }
                .to_string(),
            ),
            Err(BridgeError::Stale(_)) => {
                self.notify("That permission request is no longer valid.".to_string());
            }
        }
    }

    // --- session lifecycle ---

    /// Start (or replace) the session. Prior cursor, queue and progress
    /// state are cleared, never carried forward.
    fn start_session(&mut self, mode: SessionMode, working_dir: &str) {
        let discarded = self.queue.clear();
        if discarded > 0 {
            self.notify(format!("Discarded {} queued message(s).", discarded));
        }
        self.clear_progress();
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.abandon();
            bridge.cleanup();
        }
        self.bridge = None;
        self.tail = None;

        match self.sessions.start(mode, working_dir) {
            Ok(id) => {
                self.transcript =
                    Transcript::open(self.config.transcript_dir.as_deref(), &id.0);
                if mode == SessionMode::Agent {
                    self.bridge = Some(PermissionBridge::new(
                        self.config.rendezvous_dir.clone(),
                        id.0.clone(),
                        self.config.permission_timeout,
                    ));
                    self.refresh_tail();
                }
                self.notify(format!("New {} session started.", mode));
            }
            Err(e) => self.notify(format!("Could not start session: {}", e)),
        }
    }

    /// Process-exit path: flush what the log still holds, discard the
    /// queue (reporting the count), dismiss progress, notify.
    fn finalize(&mut self) {
        log::info!("finalizing session");

        if let Some(mut tail) = self.tail.take() {
            let mut events = tail.poll();
            if let Some(text) = tail.take_pending() {
                events.push(TailEvent::Response(text));
            }
            self.process_tail_events(events);
        }
        self.clear_progress();

        let discarded = self.queue.clear();
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.abandon();
            bridge.cleanup();
        }
        self.bridge = None;

        let mode = self.sessions.terminate().map(|s| s.mode);
        let mut message = match mode {
            Some(SessionMode::Agent) => "Agent session ended.".to_string(),
            _ => "Session ended.".to_string(),
        };
        if discarded > 0 {
            message.push_str(&format!(" Discarded {} queued message(s).", discarded));
        }
        self.notify(message);
    }

    fn teardown(&mut self) {
        if let Some(bridge) = self.bridge.as_mut() {
            bridge.abandon();
            bridge.cleanup();
        }
        let discarded = self.queue.clear();
        if discarded > 0 {
            self.notify(format!(
                "Shutting down. Discarded {} queued message(s).",
                discarded
            ));
        }
        self.clear_progress();
        self.sessions.terminate();
    }

    // --- tick helpers ---

    /// Surface buffered PTY output. Shell output goes to the user after
    /// cleaning and echo suppression; agent-mode terminal output stays in
    /// the transcript only (the log tail carries the real content).
    fn pump_output(&mut self) {
        let bytes = self.sessions.read_nonblocking();
        if bytes.is_empty() {
            return;
        }
        let cleaned = clean_output(&String::from_utf8_lossy(&bytes));
        if cleaned.is_empty() {
            return;
        }
        self.transcript.line("OUT", &cleaned);

        let mode = match self.sessions.session() {
            Some(session) => session.mode,
            None => return,
        };
        if mode != SessionMode::Shell {
            return;
        }

        let output = match self.sessions.take_echo() {
            Some(sent) => strip_echo(&cleaned, &sent),
            None => cleaned,
        };
        if !output.trim().is_empty() {
            self.send(Notice::Text(output));
        }
    }

    /// Follow the newest agent log for the session's working directory.
    /// A new file means a new agent conversation: existing content (the
    /// greeting, prior history) is skipped, never re-delivered.
    fn refresh_tail(&mut self) {
        let Some(session) = self.sessions.session() else {
            return;
        };
        if session.mode != SessionMode::Agent {
            return;
        }
        let Some(path) = recent::latest_log(&self.config.log_root, &session.working_dir) else {
            return;
        };
        if self.tail.as_ref().map(|t| t.path()) == Some(path.as_path()) {
            return;
        }
        log::debug!("following agent log {}", path.display());
        let mut tail = LogTail::new(path);
        tail.skip_to_end();
        self.tail = Some(tail);
    }

    /// Spec §4.7 steps (3) and (4): responses dismiss progress and get
    /// delivered; tool events update the indicator unless a permission is
    /// waiting (the permission prompt is the status then).
    fn process_tail_events(&mut self, events: Vec<TailEvent>) {
        let mut new_tools: Vec<ToolEvent> = Vec::new();

        for event in events {
            match event {
                TailEvent::Tool(tool) => new_tools.push(tool),
                TailEvent::Response(text) => {
                    // Tool events before a completion belong to the turn
                    // that just finished; nothing left to show for them.
                    new_tools.clear();
                    self.clear_progress();
                    self.send(Notice::Text(text));
                }
            }
        }

        if new_tools.is_empty() {
            return;
        }
        let permission_pending = self.bridge.as_ref().map_or(false, |b| b.has_pending());
        if permission_pending {
            return;
        }
        if !self.progress.is_active() {
            self.progress.begin();
        }
        for tool in &new_tools {
            self.progress.push(tool);
        }
        self.send(Notice::ProgressUpdate(self.progress.render()));
    }

    /// Submit a prompt to the agent and open a fresh progress window with
    /// the cursor just past the prompt.
    fn start_prompt(&mut self, text: &str) {
        if let Some(tail) = self.tail.as_mut() {
            tail.skip_to_end();
        }
        self.transcript.line("IN", text);
        if let Err(e) = self.sessions.write_line(text) {
            self.notify(e.to_string());
            return;
        }
        self.clear_progress();
        self.progress.begin();
    }

    fn compute_busy(&self) -> bool {
        let permission_pending = self.bridge.as_ref().map_or(false, |b| b.has_pending());
        let log_modified = self.tail.as_ref().and_then(|t| t.last_modified());
        self.busy
            .is_busy(permission_pending, log_modified, SystemTime::now())
    }

    fn clear_progress(&mut self) {
        if self.progress.is_active() {
            self.progress.reset();
            self.send(Notice::ProgressClear);
        }
    }

    fn send(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            log::debug!("notice channel closed, dropping notification");
        }
    }

    fn notify(&self, text: String) {
        self.send(Notice::Text(text));
    }
}
