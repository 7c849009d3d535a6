//! Game end detection.

use chess_session::GameStatus;
use shakmaty::{Chess, Position};

use crate::convert;

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_PLIES: u32 = 100;

/// Status of `position`, which has now occurred `occurrences` times.
pub(crate) fn status(position: &Chess, occurrences: u32) -> GameStatus {
    let message = if position.is_checkmate() {
        format!("{} wins by checkmate", convert::side(position.turn()).opponent())
    } else if position.is_stalemate() {
        "Draw by stalemate".to_string()
    } else if position.is_insufficient_material() {
        "Draw by insufficient material".to_string()
    } else if position.halfmoves() >= FIFTY_MOVE_PLIES {
        "Draw by the fifty-move rule".to_string()
    } else if occurrences >= 3 {
        "Draw by threefold repetition".to_string()
    } else {
        return GameStatus::Ongoing;
    };
    GameStatus::Finished(message)
}
