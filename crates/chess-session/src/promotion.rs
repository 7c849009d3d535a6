//! Pending pawn-promotion choice.

use chess_core::{Move, PieceKind};

use crate::SessionError;

/// Candidate moves offered while the user picks a promotion piece.
///
/// Empty when no promotion is pending. The session fills it when the engine
/// lists several promotion variants for one attempted pawn move, and empties it
/// as soon as a choice resolves to a single move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionFlow {
    pending: Vec<Move>,
}

impl PromotionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a promotion choice over `moves`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvariantViolation`] and leaves the flow unchanged
    /// if `moves` is empty, mixes origin or destination squares, or contains a
    /// non-promotion move.
    pub fn offer(&mut self, moves: Vec<Move>) -> Result<(), SessionError> {
        let Some(first) = moves.first() else {
            return Err(SessionError::InvariantViolation(
                "promotion offered with no candidate moves".to_string(),
            ));
        };
        if let Some(odd) = moves
            .iter()
            .find(|m| !m.is_promotion() || m.from != first.from || m.to != first.to)
        {
            return Err(SessionError::InvariantViolation(format!(
                "{:?} does not belong to a promotion offer for {}{}",
                odd, first.from, first.to
            )));
        }
        self.pending = moves;
        Ok(())
    }

    /// Resolves the pending choice to the move promoting to `piece`.
    ///
    /// On success the flow is emptied and the caller dispatches the returned
    /// move as a manual move.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoPromotionPending`] if nothing was offered.
    /// - [`SessionError::InvariantViolation`] if zero or several candidates
    ///   promote to `piece`; the offer is left intact.
    pub fn choose(&mut self, piece: PieceKind) -> Result<Move, SessionError> {
        if self.pending.is_empty() {
            return Err(SessionError::NoPromotionPending);
        }
        let matching: Vec<Move> = self
            .pending
            .iter()
            .filter(|m| m.promotion() == Some(piece))
            .copied()
            .collect();
        match matching.as_slice() {
            [mv] => {
                self.pending.clear();
                Ok(*mv)
            }
            [] => Err(SessionError::InvariantViolation(format!(
                "no offered promotion to {}",
                piece
            ))),
            _ => Err(SessionError::InvariantViolation(format!(
                "{} offered promotions to {}",
                matching.len(),
                piece
            ))),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn options(&self) -> &[Move] {
        &self.pending
    }

    /// Drops a pending offer without dispatching anything.
    pub fn withdraw(&mut self) -> Vec<Move> {
        std::mem::take(&mut self.pending)
    }
}
