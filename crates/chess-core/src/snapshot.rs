//! Engine-reported board contents.

use crate::{ParseError, Piece, PieceKind, Side, Square};
use std::fmt;

/// Piece placement of the standard starting position (FEN field one).
pub const STARTING_PLACEMENT: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

/// What stands on each square, plus the side to move.
///
/// This is the only board view the session layer gets from the engine; it
/// carries no castling rights or clocks since the engine owns those.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BoardSnapshot {
    squares: [Option<Piece>; 64],
    side_to_move: Side,
}

impl BoardSnapshot {
    /// An empty board.
    pub const fn empty(side_to_move: Side) -> Self {
        Self {
            squares: [None; 64],
            side_to_move,
        }
    }

    /// The standard starting position, White to move.
    pub fn initial() -> Self {
        // The constant is well formed, so parsing cannot fail.
        Self::from_placement(STARTING_PLACEMENT, Side::White)
            .unwrap_or_else(|_| Self::empty(Side::White))
    }

    /// Builds a snapshot from the piece placement field of a FEN string.
    pub fn from_placement(placement: &str, side_to_move: Side) -> Result<Self, ParseError> {
        let invalid = || ParseError::Placement(placement.to_string());
        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(invalid());
        }

        let mut snapshot = Self::empty(side_to_move);
        for (row, text) in rows.iter().enumerate() {
            let rank = 7 - row as u8;
            let mut file = 0u8;
            for c in text.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(invalid());
                    }
                    file += skip as u8;
                } else {
                    let kind = PieceKind::from_letter(c).ok_or_else(invalid)?;
                    let side = if c.is_ascii_uppercase() {
                        Side::White
                    } else {
                        Side::Black
                    };
                    let sq = Square::new(file, rank).ok_or_else(invalid)?;
                    snapshot.set(sq, Some(Piece::new(side, kind)));
                    file += 1;
                }
                if file > 8 {
                    return Err(invalid());
                }
            }
            if file != 8 {
                return Err(invalid());
            }
        }
        Ok(snapshot)
    }

    /// Renders the piece placement field of a FEN string.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(71);
        for rank in (0..8u8).rev() {
            let mut gap = 0;
            for file in 0..8u8 {
                match Square::new(file, rank).and_then(|sq| self.piece_at(sq)) {
                    Some(piece) => {
                        if gap > 0 {
                            out.push_str(&gap.to_string());
                            gap = 0;
                        }
                        out.push_str(&piece.to_string());
                    }
                    None => gap += 1,
                }
            }
            if gap > 0 {
                out.push_str(&gap.to_string());
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    #[inline]
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[sq.index()] = piece;
    }

    #[inline]
    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, side: Side) {
        self.side_to_move = side;
    }

    /// Occupied squares in index order.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(|sq| self.piece_at(sq).map(|piece| (sq, piece)))
    }

    /// Multi-line diagram with rank 8 at the top, for terminals.
    pub fn diagram(&self) -> String {
        let mut out = String::new();
        for rank in (0..8u8).rev() {
            out.push((b'1' + rank) as char);
            out.push(' ');
            for file in 0..8u8 {
                let glyph = Square::new(file, rank)
                    .and_then(|sq| self.piece_at(sq))
                    .map(|piece| piece.to_string())
                    .unwrap_or_else(|| ".".to_string());
                out.push_str(&glyph);
                if file < 7 {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out.push_str("  a b c d e f g h\n");
        out
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Debug for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoardSnapshot({} {})", self.placement(), self.side_to_move)
    }
}
