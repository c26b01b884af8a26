//! Outbound notification boundary.
//!
//! The core never talks to a chat network directly. It emits [`Notice`]
//! values into a channel; the [`Announcer`] task owns the embedder's
//! [`ChatTransport`] implementation and performs the actual sends. A slow
//! or failing network call therefore never stalls the watcher loop -
//! enqueueing a notice is non-blocking and FIFO ordering is preserved.
//!
//! Transport failures are logged and swallowed here; they never propagate
//! back into the watcher.

use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

/// Opaque reference to a message the transport delivered, used for
/// in-place edits and deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef(pub String);

#[derive(Error, Debug)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// The only operations a chat transport must implement.
pub trait ChatTransport {
    /// Deliver a new message; returns a reference for later edit/delete.
    fn send(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<MessageRef, TransportError>> + Send;

    /// Replace the text of a previously sent message.
    fn edit(
        &self,
        message: &MessageRef,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Remove a previously sent message.
    fn delete(
        &self,
        message: &MessageRef,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}

/// One outbound unit, consumed by the announcer in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Plain notification or response delivery; chunked to the length cap.
    Text(String),
    /// Create-or-edit the progress indicator in place.
    ProgressUpdate(String),
    /// Delete the progress indicator, if one is showing.
    ProgressClear,
}

/// Split `text` into chunks of at most `max` bytes, preferring to split at
/// a newline when one falls in the second half of the window.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(16);
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() <= max {
            chunks.push(rest.to_string());
            break;
        }
        let mut limit = max;
        while !rest.is_char_boundary(limit) {
            limit -= 1;
        }
        let split_at = match rest[..limit].rfind('\n') {
            Some(idx) if idx >= limit / 2 => idx,
            _ => limit,
        };
        chunks.push(rest[..split_at].to_string());
        rest = rest[split_at..].trim_start_matches('\n');
    }
    chunks
}

/// Owns the transport and the progress-indicator identity. Runs until the
/// notice channel closes.
pub struct Announcer<T: ChatTransport> {
    transport: T,
    indicator: Option<MessageRef>,
    max_len: usize,
}

impl<T: ChatTransport> Announcer<T> {
    pub fn new(transport: T, max_len: usize) -> Self {
        Self {
            transport,
            indicator: None,
            max_len,
        }
    }

    /// Consume notices until the sender side is dropped.
    pub async fn run(mut self, mut notices: UnboundedReceiver<Notice>) {
        while let Some(notice) = notices.recv().await {
            self.handle(notice).await;
        }
    }

    /// Apply a single notice. Errors are logged, never returned.
    pub async fn handle(&mut self, notice: Notice) {
        match notice {
            Notice::Text(body) => {
                for chunk in chunk_text(&body, self.max_len) {
                    if let Err(e) = self.transport.send(&chunk).await {
                        log::warn!("notification send failed: {}", e);
                    }
                }
            }
            Notice::ProgressUpdate(body) => {
                let body = clip(&body, self.max_len);
                match &self.indicator {
                    Some(message) => {
                        if let Err(e) = self.transport.edit(message, &body).await {
                            log::warn!("progress edit failed: {}", e);
                        }
                    }
                    None => match self.transport.send(&body).await {
                        Ok(message) => self.indicator = Some(message),
                        Err(e) => log::warn!("progress send failed: {}", e),
                    },
                }
            }
            Notice::ProgressClear => {
                if let Some(message) = self.indicator.take() {
                    if let Err(e) = self.transport.delete(&message).await {
                        log::warn!("progress delete failed: {}", e);
                    }
                }
            }
        }
    }
}

/// Byte-capped, char-boundary-safe prefix.
fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut limit = max;
    while !text.is_char_boundary(limit) {
        limit -= 1;
    }
    text[..limit].to_string()
}
