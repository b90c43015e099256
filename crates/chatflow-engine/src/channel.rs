//! Channel-backed messenger adapter.
//!
//! Bridges the [`MessengerInterface`] contract onto a pair of tokio mpsc
//! channels, for embedding the engine inside a larger application and for
//! tests. The embedder pushes inbound messages into the returned sender and
//! consumes `(user id, response)` pairs from the returned receiver.

use async_trait::async_trait;
use chatflow_core::error::{ChatflowError, Result};
use chatflow_core::messenger::{InboundMessage, MessengerInterface};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

/// Messenger that receives from and delivers to in-process channels.
pub struct ChannelMessenger {
    inbound: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    outbound: mpsc::UnboundedSender<(String, Value)>,
}

impl ChannelMessenger {
    /// Creates a messenger with its inbound sender and outbound receiver.
    ///
    /// Dropping the inbound sender closes the transport: `receive` returns
    /// `Ok(None)` and the runner loop drains and exits.
    pub fn new() -> (
        Self,
        mpsc::UnboundedSender<InboundMessage>,
        mpsc::UnboundedReceiver<(String, Value)>,
    ) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: Mutex::new(inbound_rx),
                outbound: outbound_tx,
            },
            inbound_tx,
            outbound_rx,
        )
    }
}

#[async_trait]
impl MessengerInterface for ChannelMessenger {
    async fn receive(&self) -> Result<Option<InboundMessage>> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn send(&self, user_id: &str, response: &Value) -> Result<()> {
        self.outbound
            .send((user_id.to_string(), response.clone()))
            .map_err(|_| ChatflowError::transport("outbound channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_receive_and_send_round_trip() {
        let (messenger, inbound, mut outbound) = ChannelMessenger::new();

        inbound
            .send(InboundMessage::new("u1", json!("hi")))
            .unwrap();
        let received = messenger.receive().await.unwrap().unwrap();
        assert_eq!(received.user_id, "u1");

        messenger.send("u1", &json!("Hello!")).await.unwrap();
        assert_eq!(outbound.recv().await, Some(("u1".to_string(), json!("Hello!"))));
    }

    #[tokio::test]
    async fn test_closed_inbound_yields_none() {
        let (messenger, inbound, _outbound) = ChannelMessenger::new();
        drop(inbound);
        assert_eq!(messenger.receive().await.unwrap(), None);
    }
}
