//! Error types for the session layer.

use thiserror::Error;

use crate::gateway::EngineError;

/// Errors returned by session operations.
///
/// Cancellation of an autoplay request is not an error and never shows up
/// here; the dispatch layer swallows it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The engine refused or failed the request.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    /// No legal move matches the attempted move.
    #[error("illegal move: {0}")]
    IllegalMove(String),
    /// The side to move is under autonomy, so manual moves are refused.
    #[error("it is not a human player's turn")]
    NotYourTurn,
    /// A promotion choice must be made before anything else is played.
    #[error("a promotion choice is pending")]
    PromotionPending,
    #[error("no promotion choice is pending")]
    NoPromotionPending,
    #[error("the game is over: {0}")]
    GameOver(String),
    /// A defect: the engine or a caller broke an invariant of the flow.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// The session task has stopped.
    #[error("session closed")]
    Closed,
}
