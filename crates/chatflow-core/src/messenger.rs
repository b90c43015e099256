//! Messenger interface trait.
//!
//! The abstract transport boundary between the pipeline and whatever
//! carries messages to and from users. The pipeline is agnostic to
//! transport framing; adapters (console, chat-platform connectors, channel
//! pairs) translate their payloads to and from this contract.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw inbound message: who sent it and what they sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Stable user identifier
    pub user_id: String,
    /// Raw input payload
    pub input: Value,
}

impl InboundMessage {
    pub fn new(user_id: impl Into<String>, input: Value) -> Self {
        Self {
            user_id: user_id.into(),
            input,
        }
    }
}

/// Abstract message transport.
///
/// `receive` may block (await) until a message arrives; `Ok(None)` signals
/// the transport is closed and no further messages will arrive, which ends
/// the runner loop. `send` delivers a response payload to a user; failures
/// surface as `ChatflowError::Transport`.
#[async_trait]
pub trait MessengerInterface: Send + Sync {
    /// Waits for the next inbound message, or `Ok(None)` once closed.
    async fn receive(&self) -> Result<Option<InboundMessage>>;

    /// Delivers a response payload to a user.
    async fn send(&self, user_id: &str, response: &Value) -> Result<()>;
}
