//! Conversions from shakmaty's vocabulary to the session's.

use chess_core::{BoardSnapshot, Move, MoveKind, Piece, PieceKind, Side, Square};
use chess_session::EngineError;
use shakmaty::{Chess, Color, Position, Role};

pub(crate) fn side(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

pub(crate) fn kind(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

fn square(sq: shakmaty::Square) -> Result<Square, EngineError> {
    let index = sq as u8;
    Square::from_index(index)
        .ok_or_else(|| EngineError::Protocol(format!("square index {} out of range", index)))
}

/// Board contents of `position`.
pub(crate) fn snapshot(position: &Chess) -> BoardSnapshot {
    let board = position.board();
    let mut snapshot = BoardSnapshot::empty(side(position.turn()));
    for sq in Square::all() {
        let piece = board.piece_at(shakmaty::Square::new(sq.index() as u32));
        snapshot.set(
            sq,
            piece.map(|p| Piece::new(side(p.color), kind(p.role))),
        );
    }
    snapshot
}

/// Describes a shakmaty move. Castling is reported as the king's move.
pub(crate) fn to_move(m: &shakmaty::Move) -> Result<Move, EngineError> {
    match *m {
        shakmaty::Move::Normal {
            role,
            from,
            capture,
            to,
            promotion,
        } => {
            let kind = match (promotion, capture) {
                (Some(piece), Some(_)) => MoveKind::PromotionCapture(kind(piece)),
                (Some(piece), None) => MoveKind::Promotion(kind(piece)),
                (None, Some(_)) => MoveKind::Capture(kind(role)),
                (None, None) => MoveKind::Quiet(kind(role)),
            };
            Ok(Move::new(square(from)?, square(to)?, kind))
        }
        shakmaty::Move::EnPassant { from, to } => {
            Ok(Move::new(square(from)?, square(to)?, MoveKind::EnPassant))
        }
        shakmaty::Move::Castle { king, rook } => {
            let from = square(king)?;
            let file = if (rook as u8) > (king as u8) { 6 } else { 2 };
            let to = Square::new(file, from.rank())
                .ok_or_else(|| EngineError::Protocol(format!("bad castling move {:?}", m)))?;
            Ok(Move::new(from, to, MoveKind::Castle))
        }
        shakmaty::Move::Put { .. } => Err(EngineError::Protocol(
            "drop moves are not part of standard chess".to_string(),
        )),
    }
}

/// Legal moves of `position`, paired with their descriptions.
pub(crate) fn legal_moves(position: &Chess) -> Result<Vec<(shakmaty::Move, Move)>, EngineError> {
    position
        .legal_moves()
        .into_iter()
        .map(|m| to_move(&m).map(|mv| (m, mv)))
        .collect()
}
