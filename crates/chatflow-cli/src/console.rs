//! Console messenger: stdin in, stdout out.
//!
//! A minimal transport adapter for trying scripts interactively. Every
//! line typed becomes one inbound message for the configured user id; EOF
//! (Ctrl-D) closes the transport and ends the runner loop.

use async_trait::async_trait;
use chatflow_core::error::{ChatflowError, Result};
use chatflow_core::messenger::{InboundMessage, MessengerInterface};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

pub struct ConsoleMessenger {
    user_id: String,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleMessenger {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl MessengerInterface for ConsoleMessenger {
    async fn receive(&self) -> Result<Option<InboundMessage>> {
        let mut lines = self.lines.lock().await;
        loop {
            let line = lines
                .next_line()
                .await
                .map_err(|e| ChatflowError::transport(format!("stdin read failed: {}", e)))?;
            match line {
                Some(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Ok(Some(InboundMessage::new(
                        &self.user_id,
                        Value::String(trimmed.to_string()),
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    async fn send(&self, _user_id: &str, response: &Value) -> Result<()> {
        match response {
            Value::String(text) => println!("{}", text),
            other => println!("{}", other),
        }
        Ok(())
    }
}
