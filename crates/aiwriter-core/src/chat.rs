//! Chat request assembly and the request lifecycle.
//!
//! One request at a time: `Idle -> Pending -> Idle`. While pending the
//! history ends with a placeholder message that is removed, not edited, once
//! the request settles.

use futures_util::future::{AbortHandle, Abortable};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::ai::CompletionEndpoint;
use crate::context::ContextSet;
use crate::error::{Result, SessionError};
use crate::protocol::{ChatReply, ChatRequest};
use crate::state::{ChatMessage, ChatRole};

pub const PENDING_TEXT: &str = "Thinking…";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Pending,
}

/// Context list for a request: the selected files, then the active file if
/// it is not already among them. `@mentions` in the text play no part.
pub fn assemble_context(context: &ContextSet, active_path: Option<&str>) -> Vec<String> {
    let mut files = context.to_list();
    if let Some(active) = active_path.filter(|p| !p.is_empty()) {
        if !files.iter().any(|f| f == active) {
            files.push(active.to_string());
        }
    }
    files
}

type Outcome = std::result::Result<ChatReply, SessionError>;

struct InFlight {
    abort: AbortHandle,
    rx: oneshot::Receiver<Outcome>,
}

struct Pending {
    placeholder: usize,
    in_flight: Option<InFlight>,
}

#[derive(Default)]
pub struct ChatSessionController {
    history: Vec<ChatMessage>,
    pending: Option<Pending>,
}

impl ChatSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn state(&self) -> ChatState {
        if self.pending.is_some() {
            ChatState::Pending
        } else {
            ChatState::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Appends a notice (saves, failed file opens) outside the request lifecycle.
    pub fn push_notice(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Starts a request: records the user message and the placeholder.
    ///
    /// Blank input gives `Ok(None)`. A request already in flight gives
    /// [`SessionError::RequestPending`] and leaves the history alone.
    pub fn prepare(
        &mut self,
        text: &str,
        context: &ContextSet,
        active_path: Option<&str>,
    ) -> Result<Option<ChatRequest>> {
        if self.pending.is_some() {
            warn!("send rejected, request already pending");
            return Err(SessionError::RequestPending);
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        let request = ChatRequest {
            message: text.to_string(),
            context_files: assemble_context(context, active_path),
        };

        self.history.push(ChatMessage::user(text));
        self.history.push(ChatMessage::system(PENDING_TEXT));
        self.pending = Some(Pending {
            placeholder: self.history.len() - 1,
            in_flight: None,
        });
        debug!(files = ?request.context_files, "chat pending");
        Ok(Some(request))
    }

    /// Applies a request's outcome: drops the placeholder and appends exactly
    /// one `Ai` or `Error` message. Ignored when nothing is pending.
    pub fn settle(&mut self, outcome: Outcome) -> Option<&ChatMessage> {
        let pending = self.pending.take()?;
        self.history.remove(pending.placeholder);

        let message = match outcome.and_then(ChatReply::into_result) {
            Ok(response) => {
                info!(chars = response.len(), "chat resolved");
                ChatMessage::ai(response)
            }
            Err(e) => {
                warn!(error = %e, "chat failed");
                ChatMessage::error(e.to_string())
            }
        };
        self.history.push(message);
        self.history.last()
    }

    /// Sends and waits for the reply in place.
    pub async fn send<E: CompletionEndpoint>(
        &mut self,
        endpoint: &E,
        text: &str,
        context: &ContextSet,
        active_path: Option<&str>,
    ) -> Result<Option<&ChatMessage>> {
        let Some(request) = self.prepare(text, context, active_path)? else {
            return Ok(None);
        };
        let outcome = endpoint.chat(request).await;
        Ok(self.settle(outcome))
    }

    /// Sends on a background task; [`ChatSessionController::poll`] picks up
    /// the reply. Returns false for blank input.
    pub fn dispatch<E: CompletionEndpoint>(
        &mut self,
        endpoint: Arc<E>,
        text: &str,
        context: &ContextSet,
        active_path: Option<&str>,
    ) -> Result<bool> {
        let Some(request) = self.prepare(text, context, active_path)? else {
            return Ok(false);
        };

        let (tx, rx) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();
        let task = async move {
            let _ = tx.send(endpoint.chat(request).await);
        };
        tokio::spawn(Abortable::new(task, registration));

        if let Some(pending) = self.pending.as_mut() {
            pending.in_flight = Some(InFlight { abort, rx });
        }
        Ok(true)
    }

    /// Settles a dispatched request if its reply has arrived.
    pub fn poll(&mut self) -> Option<&ChatMessage> {
        let in_flight = self.pending.as_mut()?.in_flight.as_mut()?;
        let outcome = match in_flight.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(SessionError::Network(
                "The request ended without a reply".to_string(),
            )),
        };
        self.settle(outcome)
    }

    /// Aborts the in-flight request, if any, and returns to idle.
    pub fn cancel(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if let Some(in_flight) = pending.in_flight {
            in_flight.abort.abort();
        }
        self.history.remove(pending.placeholder);
        self.history.push(ChatMessage::new(ChatRole::System, "Request cancelled."));
        info!("chat cancelled");
        true
    }
}

impl Drop for ChatSessionController {
    fn drop(&mut self) {
        if let Some(in_flight) = self.pending.take().and_then(|p| p.in_flight) {
            in_flight.abort.abort();
        }
    }
}
