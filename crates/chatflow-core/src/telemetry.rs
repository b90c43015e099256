//! Telemetry event types.
//!
//! The engine exposes one observable event per completed or failed turn.
//! An exporter subscribes by handing the pipeline a channel sender; the
//! exporter's own wire format is out of scope here, so events are plain
//! serde-serializable structs.

use crate::context::NodeAddress;
use serde::{Deserialize, Serialize};

/// Stages of the per-turn state machine, in execution order.
///
/// `Failed` is terminal and reachable from any non-terminal stage; the
/// failure event records the last stage reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStage {
    Start,
    ContextLoaded,
    NodeResolved,
    TransitionsEvaluated,
    ResponseComputed,
    ContextSaved,
    Done,
    Failed,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TurnOutcomeKind {
    /// The turn reached `Done`; a response was delivered.
    Completed,
    /// The turn failed; no response was delivered and persisted context is
    /// unchanged.
    Failed {
        /// Display form of the fatal error
        error: String,
        /// Last stage reached before failing
        stage: TurnStage,
    },
}

/// Event emitted once per turn, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Correlation id for this turn (UUID format)
    pub turn_id: String,
    /// User the turn belongs to
    pub user_id: String,
    /// Node the turn started at (`None` if context never loaded)
    pub start_node: Option<NodeAddress>,
    /// Node the turn ended at (`None` unless a transition was selected)
    pub end_node: Option<NodeAddress>,
    /// Wall-clock duration of the turn in milliseconds
    pub duration_ms: u64,
    /// Terminal outcome
    pub outcome: TurnOutcomeKind,
    /// Timestamp when the event was emitted (ISO 8601 format)
    pub timestamp: String,
}

impl TurnEvent {
    /// Whether the turn completed successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, TurnOutcomeKind::Completed)
    }
}
