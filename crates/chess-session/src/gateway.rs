//! The engine boundary.
//!
//! The session never computes chess itself. Everything rule-bound (legality,
//! move generation, game end) is delegated to an [`EngineGateway`], which owns
//! the authoritative position.

use async_trait::async_trait;
use chess_core::{BoardSnapshot, Move};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the game continues after a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    /// The game ended; holds a human-readable result such as
    /// "White wins by checkmate".
    Finished(String),
}

impl GameStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, GameStatus::Finished(_))
    }
}

/// What the engine reports after applying a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    /// The move that was applied.
    pub mv: Move,
    /// Board contents after the move.
    pub board: BoardSnapshot,
    pub status: GameStatus,
}

/// Outcome of an autoplay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Autoplay {
    /// The engine chose and applied a move.
    Played(EngineReply),
    /// The request was abandoned through [`EngineGateway::cancel_move`]; the
    /// position is unchanged.
    Cancelled,
}

/// Failures reported by an engine gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused the request, e.g. an illegal move.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The engine could not be reached or has stopped.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    /// The engine answered with something unintelligible.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Asynchronous access to the authoritative game.
///
/// The session issues at most one call at a time, with the exception of
/// [`cancel_move`](EngineGateway::cancel_move), which may arrive while an
/// [`autoplay_move`](EngineGateway::autoplay_move) is running.
#[async_trait]
pub trait EngineGateway: Send + Sync + 'static {
    /// Computes and applies one move for the side to move.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if no move could be produced. Cancellation
    /// is reported as [`Autoplay::Cancelled`], not as an error.
    async fn autoplay_move(&self) -> Result<Autoplay, EngineError>;

    /// Applies a specific move for the side to move.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rejected`] if the move is not legal.
    async fn play_move_manually(&self, mv: Move) -> Result<EngineReply, EngineError>;

    /// Resets the game to the starting position.
    async fn restart_game(&self) -> Result<BoardSnapshot, EngineError>;

    /// All legal moves for the side to move.
    async fn legal_moves(&self) -> Result<Vec<Move>, EngineError>;

    /// Best-effort request to abandon a running `autoplay_move`.
    ///
    /// Returns immediately. The running call may still complete with a move.
    async fn cancel_move(&self);
}
