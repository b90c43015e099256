//! The turn-execution pipeline.
//!
//! Orchestrates one conversational turn end to end: load context, resolve
//! the current node, evaluate transition conditions, select the next node,
//! compute the response, persist the updated context, hand the response to
//! the transport. Stages proceed strictly in that order; a fatal error
//! before the save aborts the turn with persisted context untouched, so a
//! caller can safely retry by resending the input. After a successful save
//! the context stands, even if delivery then fails or stalls.

use crate::locks::UserLocks;
use chatflow_core::cache::{CacheKey, TurnCache};
use chatflow_core::config::{DeliveryPolicy, PipelineConfig};
use chatflow_core::context::{Context, NodeAddress};
use chatflow_core::error::{ChatflowError, Result};
use chatflow_core::messenger::MessengerInterface;
use chatflow_core::script::ScriptGraph;
use chatflow_core::store::ContextStore;
use chatflow_core::telemetry::{TurnEvent, TurnOutcomeKind, TurnStage};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Result of a successfully completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Correlation id for this turn (UUID format)
    pub turn_id: String,
    /// User the turn belonged to
    pub user_id: String,
    /// Node the turn started at
    pub start_node: NodeAddress,
    /// Node the conversation now sits at
    pub end_node: NodeAddress,
    /// The delivered response payload
    pub response: Value,
    /// Condition failures swallowed during transition evaluation
    pub condition_errors: Vec<ChatflowError>,
    /// Wall-clock duration of the turn
    pub duration: Duration,
}

/// Mutable bookkeeping for one turn, used for telemetry on both the
/// success and the failure path.
struct TurnProgress {
    stage: TurnStage,
    start_node: Option<NodeAddress>,
    end_node: Option<NodeAddress>,
}

/// What `execute` hands back on success.
struct TurnSuccess {
    response: Value,
    condition_errors: Vec<ChatflowError>,
    start_node: NodeAddress,
    end_node: NodeAddress,
}

/// The pipeline execution engine.
///
/// One instance serves every user: the script graph is shared read-only,
/// the context store handles persistence, and a per-user lock map
/// serializes turns for the same user while different users proceed in
/// parallel. Construct with [`Pipeline::new`] and tune with the `with_*`
/// builder methods.
pub struct Pipeline {
    graph: Arc<ScriptGraph>,
    store: Arc<dyn ContextStore>,
    locks: UserLocks,
    turn_timeout: Option<Duration>,
    delivery_policy: DeliveryPolicy,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl Pipeline {
    /// Creates a pipeline over a validated graph and a context store, with
    /// no turn timeout and the save-before-deliver policy.
    pub fn new(graph: Arc<ScriptGraph>, store: Arc<dyn ContextStore>) -> Self {
        Self {
            graph,
            store,
            locks: UserLocks::new(),
            turn_timeout: None,
            delivery_policy: DeliveryPolicy::default(),
            events: None,
        }
    }

    /// Applies the timeout and delivery policy from a [`PipelineConfig`].
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.turn_timeout = config.turn_timeout();
        self.delivery_policy = config.delivery_policy;
        self
    }

    /// Bounds each turn's computation and persistence by a deadline. On
    /// expiry the turn fails with `TurnTimeout`, context is not saved, and
    /// the user's lock is released so subsequent turns are not starved.
    /// Delivery of an already saved response is not subject to the
    /// deadline.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// Sets the ordering of context persistence against response delivery.
    pub fn with_delivery_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery_policy = policy;
        self
    }

    /// Attaches a telemetry hook. One [`TurnEvent`] is emitted per turn,
    /// completed or failed; sends never block and are dropped if the
    /// receiver is gone.
    pub fn with_event_sender(mut self, sender: mpsc::UnboundedSender<TurnEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// The shared script graph.
    pub fn graph(&self) -> &Arc<ScriptGraph> {
        &self.graph
    }

    /// Executes one turn for `(user_id, input)` and delivers the response
    /// through `messenger`.
    ///
    /// Serialized per user: if another turn for the same user is in
    /// flight, this one waits its turn (FIFO). On a fatal error before the
    /// context save, no response is delivered and persisted context is
    /// unchanged. A delivery failure after a successful save is reported as
    /// the turn's error with the saved context standing.
    ///
    /// # Errors
    ///
    /// - `Storage`: context load or save failed
    /// - `NodeNotFound`: the saved current node no longer exists in the
    ///   graph (script redeployed with a node removed)
    /// - `ResponseComputation`: the response handler failed
    /// - `TurnTimeout`: the deadline elapsed before context was saved
    /// - `Transport`: delivery failed
    pub async fn handle(
        &self,
        user_id: &str,
        input: Value,
        messenger: &dyn MessengerInterface,
    ) -> Result<TurnOutcome> {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let lock = self.locks.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let started = Instant::now();
        let mut progress = TurnProgress {
            stage: TurnStage::Start,
            start_node: None,
            end_node: None,
        };

        tracing::debug!(%turn_id, user_id, "turn started");

        let result = match self.turn_timeout {
            Some(limit) => {
                match tokio::time::timeout(
                    limit,
                    self.execute(user_id, &input, messenger, &mut progress),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ChatflowError::TurnTimeout {
                        millis: limit.as_millis() as u64,
                    }),
                }
            }
            None => self.execute(user_id, &input, messenger, &mut progress).await,
        };

        // Delivery after a successful save sits outside the deadline: once
        // context is saved the turn must not report `TurnTimeout`, whose
        // contract is that nothing was persisted. If delivery fails here
        // the saved context stands and the send error is the turn's error.
        let result = match result {
            Ok(success) => {
                let delivered = match self.delivery_policy {
                    DeliveryPolicy::SaveBeforeDeliver => {
                        messenger.send(user_id, &success.response).await
                    }
                    DeliveryPolicy::DeliverThenSave => Ok(()),
                };
                match delivered {
                    Ok(()) => {
                        progress.stage = TurnStage::Done;
                        Ok(success)
                    }
                    Err(error) => Err(error),
                }
            }
            Err(error) => Err(error),
        };
        let duration = started.elapsed();

        match result {
            Ok(success) => {
                tracing::debug!(
                    %turn_id,
                    user_id,
                    start = %success.start_node,
                    end = %success.end_node,
                    duration_ms = duration.as_millis() as u64,
                    "turn completed"
                );
                self.emit_event(&turn_id, user_id, &progress, duration, TurnOutcomeKind::Completed);
                Ok(TurnOutcome {
                    turn_id,
                    user_id: user_id.to_string(),
                    start_node: success.start_node,
                    end_node: success.end_node,
                    response: success.response,
                    condition_errors: success.condition_errors,
                    duration,
                })
            }
            Err(error) => {
                tracing::error!(%turn_id, user_id, stage = ?progress.stage, %error, "turn failed");
                self.emit_event(
                    &turn_id,
                    user_id,
                    &progress,
                    duration,
                    TurnOutcomeKind::Failed {
                        error: error.to_string(),
                        stage: progress.stage,
                    },
                );
                Err(error)
            }
        }
    }

    /// The turn body, stage by stage. Runs inside the per-user lock and,
    /// if configured, inside the turn deadline.
    async fn execute(
        &self,
        user_id: &str,
        input: &Value,
        messenger: &dyn MessengerInterface,
        progress: &mut TurnProgress,
    ) -> Result<TurnSuccess> {
        // ContextLoaded: unknown users get a fresh context at the start node.
        let mut ctx = match self.store.load(user_id).await? {
            Some(ctx) => ctx,
            None => Context::fresh(user_id, self.graph.start().clone()),
        };
        progress.stage = TurnStage::ContextLoaded;
        progress.start_node = Some(ctx.current_node.clone());

        // NodeResolved: a miss here means graph/context drift.
        let node = self.graph.node(&ctx.current_node)?;
        progress.stage = TurnStage::NodeResolved;

        // TransitionsEvaluated: priority order, ties by declaration order
        // (pre-sorted at graph build). A failing condition is logged,
        // recorded, and treated as not matched.
        let cache = TurnCache::new();
        let mut condition_errors = Vec::new();
        let mut selected = None;
        for transition in &node.transitions {
            let key = CacheKey::condition(&transition.condition_name, input);
            let checked = cache
                .condition(
                    key,
                    transition.condition.check(&ctx, &self.graph, input, &cache),
                )
                .await;
            match checked {
                Ok(true) => {
                    selected = Some(transition.target.clone());
                    break;
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        user_id,
                        condition = %transition.condition_name,
                        %error,
                        "condition failed; transition treated as not matched"
                    );
                    condition_errors.push(ChatflowError::condition(
                        &transition.condition_name,
                        error.to_string(),
                    ));
                }
            }
        }
        let target = selected.unwrap_or_else(|| self.graph.fallback().clone());
        progress.stage = TurnStage::TransitionsEvaluated;

        // ResponseComputed: the target node's handler produces the payload.
        // Fatal on error; context is not saved so a retry re-enters the
        // same node.
        let target_node = self.graph.node(&target)?;
        let key = CacheKey::response(&target_node.response_name, input);
        let response = cache
            .response(
                key,
                target_node.response.respond(&ctx, &self.graph, input, &cache),
            )
            .await
            .map_err(|error| {
                if error.is_response() {
                    error
                } else {
                    ChatflowError::response(&target_node.response_name, error.to_string())
                }
            })?;
        progress.stage = TurnStage::ResponseComputed;

        // Record the turn against the node it started at, then advance.
        let start_node = ctx.current_node.clone();
        ctx.push_turn(start_node.clone(), input.clone(), response.clone());
        ctx.current_node = target.clone();
        progress.end_node = Some(target.clone());

        match self.delivery_policy {
            DeliveryPolicy::SaveBeforeDeliver => {
                // ContextSaved before delivery: the user never observes a
                // response the system could not durably record. Delivery
                // itself happens in `handle`, outside the turn deadline.
                self.store.save(&ctx).await?;
                progress.stage = TurnStage::ContextSaved;
            }
            DeliveryPolicy::DeliverThenSave => {
                messenger.send(user_id, &response).await?;
                self.store.save(&ctx).await?;
                progress.stage = TurnStage::ContextSaved;
            }
        }

        Ok(TurnSuccess {
            response,
            condition_errors,
            start_node,
            end_node: target,
        })
    }

    fn emit_event(
        &self,
        turn_id: &str,
        user_id: &str,
        progress: &TurnProgress,
        duration: Duration,
        outcome: TurnOutcomeKind,
    ) {
        let Some(sender) = &self.events else { return };
        // Non-blocking send - if the receiver is dropped we just skip
        let _ = sender.send(TurnEvent {
            turn_id: turn_id.to_string(),
            user_id: user_id.to_string(),
            start_node: progress.start_node.clone(),
            end_node: progress.end_node.clone(),
            duration_ms: duration.as_millis() as u64,
            outcome,
            timestamp: chrono::Utc::now().to_rfc3339(),
        });
    }
}
