//! Move representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ParseError, PieceKind, Square};

/// What a move does, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "piece", rename_all = "snake_case")]
pub enum MoveKind {
    /// Non-capturing move of the given piece.
    Quiet(PieceKind),
    /// Capture made by the given piece.
    Capture(PieceKind),
    EnPassant,
    /// King move of a castling; the rook's move is implied.
    Castle,
    /// Pawn push onto the last rank, promoting to the given piece.
    Promotion(PieceKind),
    /// Pawn capture onto the last rank, promoting to the given piece.
    PromotionCapture(PieceKind),
}

/// A fully described move.
///
/// Unlike [`UciMove`], which only carries what a user or a UCI engine types,
/// a `Move` comes from the engine's legal move list and knows its kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub kind: MoveKind,
}

impl Move {
    pub const fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self { from, to, kind }
    }

    /// The piece a pawn turns into, for promotion moves.
    #[inline]
    pub const fn promotion(&self) -> Option<PieceKind> {
        match self.kind {
            MoveKind::Promotion(piece) | MoveKind::PromotionCapture(piece) => Some(piece),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(&self) -> bool {
        self.promotion().is_some()
    }

    #[inline]
    pub const fn is_capture(&self) -> bool {
        matches!(
            self.kind,
            MoveKind::Capture(_) | MoveKind::EnPassant | MoveKind::PromotionCapture(_)
        )
    }

    /// Long algebraic form understood by UCI engines.
    pub fn to_uci(&self) -> UciMove {
        UciMove {
            from: self.from,
            to: self.to,
            promotion: self.promotion(),
        }
    }

    /// Short algebraic rendering (`Nf3`, `exd5`, `e8=Q`, `O-O`).
    ///
    /// Disambiguation and check marks need the position, so they are left out.
    pub fn san(&self) -> String {
        match self.kind {
            MoveKind::Quiet(PieceKind::Pawn) => self.to.to_string(),
            MoveKind::Quiet(piece) => format!("{}{}", piece.letter(), self.to),
            MoveKind::Capture(PieceKind::Pawn) | MoveKind::EnPassant => {
                format!("{}x{}", self.from.file_char(), self.to)
            }
            MoveKind::Capture(piece) => format!("{}x{}", piece.letter(), self.to),
            MoveKind::Castle => {
                if self.to.file() > self.from.file() {
                    "O-O".to_string()
                } else {
                    "O-O-O".to_string()
                }
            }
            MoveKind::Promotion(piece) => format!("{}={}", self.to, piece.letter()),
            MoveKind::PromotionCapture(piece) => {
                format!("{}x{}={}", self.from.file_char(), self.to, piece.letter())
            }
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({})", self.to_uci())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.san())
    }
}

/// A move as typed in UCI notation (`e2e4`, `e7e8q`).
///
/// Carries no kind; match it against the engine's legal moves with
/// [`UciMove::matches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl UciMove {
    /// True if `mv` has the same squares and promotion piece.
    pub fn matches(&self, mv: &Move) -> bool {
        mv.from == self.from && mv.to == self.to && mv.promotion() == self.promotion
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = self.promotion {
            write!(f, "{}", piece.letter().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

impl FromStr for UciMove {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(ParseError::Move(s.to_string()));
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s[4..].chars().next() {
            None => None,
            Some(c) => match PieceKind::from_letter(c) {
                Some(piece) if piece.is_promotion_target() => Some(piece),
                _ => return Err(ParseError::Move(s.to_string())),
            },
        };
        Ok(UciMove {
            from,
            to,
            promotion,
        })
    }
}
