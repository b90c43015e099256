//! Pipeline runner loop.
//!
//! Pulls inbound messages from a messenger and spawns one turn task per
//! message. Turns for different users run in parallel; the pipeline's
//! per-user locks serialize turns for the same user. Turn failures are
//! logged and never abort the loop - retry is the caller's decision,
//! enabled by failed turns leaving context unchanged.

use crate::pipeline::Pipeline;
use chatflow_core::error::Result;
use chatflow_core::messenger::MessengerInterface;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Drives a pipeline from a messenger until the transport closes or the
/// runner is shut down.
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    shutdown: CancellationToken,
}

impl PipelineRunner {
    /// Creates a runner for the given pipeline.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the receive loop when cancelled. In-flight turns
    /// are still drained before [`PipelineRunner::run`] returns.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the receive loop until the messenger closes (`Ok(None)`) or
    /// the shutdown token fires, then waits for in-flight turns.
    ///
    /// # Errors
    ///
    /// Returns a `Transport` error if `receive` itself fails, after
    /// in-flight turns have drained; individual turn failures are logged,
    /// not propagated.
    pub async fn run(&self, messenger: Arc<dyn MessengerInterface>) -> Result<()> {
        let mut turns = JoinSet::new();
        let mut outcome = Ok(());
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("runner shutting down");
                    break;
                }
                inbound = messenger.receive() => match inbound {
                    Ok(Some(message)) => {
                        let pipeline = self.pipeline.clone();
                        let messenger = messenger.clone();
                        turns.spawn(async move {
                            if let Err(error) = pipeline
                                .handle(&message.user_id, message.input, messenger.as_ref())
                                .await
                            {
                                tracing::error!(user_id = %message.user_id, %error, "turn failed");
                            }
                        });
                    }
                    Ok(None) => {
                        tracing::info!("messenger closed");
                        break;
                    }
                    // Dropping the JoinSet would abort turns mid-stage;
                    // drain first, then surface the receive error.
                    Err(error) => {
                        tracing::error!(%error, "receive failed; draining in-flight turns");
                        outcome = Err(error);
                        break;
                    }
                },
            }
        }

        // Drain in-flight turns before returning.
        while turns.join_next().await.is_some() {}
        outcome
    }
}
