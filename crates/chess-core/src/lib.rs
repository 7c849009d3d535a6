//! Core vocabulary shared by the session controller and engine gateways.
//!
//! - [`Side`], [`PieceKind`] and [`Piece`] for who owns what
//! - [`Square`] for board coordinates
//! - [`Move`], [`MoveKind`] and [`UciMove`] for moves as reported by and sent to engines
//! - [`BoardSnapshot`] for the board contents an engine reports

mod mov;
mod piece;
mod side;
mod snapshot;
mod square;

pub use mov::{Move, MoveKind, UciMove};
pub use piece::{Piece, PieceKind};
pub use side::Side;
pub use snapshot::{BoardSnapshot, STARTING_PLACEMENT};
pub use square::Square;

use thiserror::Error;

/// Errors from parsing textual chess notation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid side: {0}")]
    Side(String),
    #[error("invalid piece: {0}")]
    Piece(String),
    #[error("invalid square: {0}")]
    Square(String),
    #[error("invalid move: {0}")]
    Move(String),
    #[error("invalid piece placement: {0}")]
    Placement(String),
}
