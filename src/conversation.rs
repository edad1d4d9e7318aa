// Conversation controller: owns one transcript, the pending flag and the
// input buffer, and publishes every change so surfaces can redraw.

use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::constants::{DEFAULT_TIMEOUT_SECS, FALLBACK_REPLY};
use crate::message::Message;
use crate::transcript::Transcript;

/// Published after every mutation of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    Appended(Message),
    PendingChanged(bool),
}

pub struct Conversation {
    transcript: Transcript,
    pending: bool,
    input: String,
    timeout: Duration,
    events: broadcast::Sender<ConversationEvent>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            transcript: Transcript::new(),
            pending: false,
            input: String::new(),
            timeout,
            events,
        }
    }

    /// Subscribe to changes. Events sent before subscribing are not replayed;
    /// read `transcript()` for the current state.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// First half of a submission: records the user message and marks the
    /// conversation pending. Returns the payload for the backend, or `None`
    /// when the input is blank or a reply is still outstanding.
    pub fn begin(&mut self, text: &str) -> Option<String> {
        if self.pending {
            debug!("Ignoring submission while a reply is pending");
            return None;
        }
        if text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return None;
        }

        self.push(Message::user(text));
        self.input.clear();
        self.set_pending(true);
        Some(text.to_string())
    }

    /// Second half of a submission: records the reply (or the fallback) and
    /// clears the pending flag.
    pub fn resolve(&mut self, result: Result<String, CollaboratorError>) {
        if !self.pending {
            warn!("Dropping backend result that arrived with no submission pending");
            return;
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error communicating with the chat backend: {}", e);
                FALLBACK_REPLY.to_string()
            }
        };
        self.push(Message::assistant(reply));
        self.set_pending(false);
    }

    /// Submit `text` and wait for the backend. Returns `false` if the call was a no-op.
    pub async fn submit(&mut self, collaborator: &dyn Collaborator, text: &str) -> bool {
        let Some(payload) = self.begin(text) else {
            return false;
        };
        let result = request_reply(collaborator, &payload, self.timeout).await;
        self.resolve(result);
        true
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_input(&mut self, collaborator: &dyn Collaborator) -> bool {
        let text = self.input.clone();
        self.submit(collaborator, &text).await
    }

    fn push(&mut self, message: Message) {
        self.transcript.append(message.clone());
        // No subscribers is fine: nobody is drawing this conversation.
        let _ = self.events.send(ConversationEvent::Appended(message));
    }

    fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
        let _ = self.events.send(ConversationEvent::PendingChanged(pending));
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// True if anything was published since the last call. A lagged receiver
/// counts as changed; surfaces redraw from the transcript, not the events.
pub fn take_changes(events: &mut broadcast::Receiver<ConversationEvent>) -> bool {
    let mut changed = false;
    loop {
        match events.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => changed = true,
            Err(_) => return changed,
        }
    }
}

/// Ask the backend for a reply, giving up after `timeout`.
pub async fn request_reply(
    collaborator: &dyn Collaborator,
    payload: &str,
    timeout: Duration,
) -> Result<String, CollaboratorError> {
    match tokio::time::timeout(timeout, collaborator.reply(payload)).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout(timeout)),
    }
}
