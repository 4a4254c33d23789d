pub mod llama;

pub use llama::LlamaCppClient;

use std::future::Future;

use crate::error::SessionError;
use crate::protocol::{ChatReply, ChatRequest};

/// Something that answers chat requests.
///
/// `Err` means the transport failed before any structured reply; a reply
/// carrying `{ "error": ... }` comes back as `Ok(ChatReply::Error { .. })`.
pub trait CompletionEndpoint: Send + Sync + 'static {
    fn chat(
        &self,
        request: ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, SessionError>> + Send;
}
