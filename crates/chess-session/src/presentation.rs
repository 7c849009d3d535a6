//! Render-facing projection of the engine's board.
//!
//! A UI that animates drag-and-drop needs every piece to keep its identity as
//! it moves. [`BoardPresentation`] assigns each piece a [`DraggableItem`] id
//! and carries that id along with the engine's reported moves, reconciling
//! anything the move itself does not describe (the castling rook, an en
//! passant victim) against the reported [`BoardSnapshot`].

use chess_core::{BoardSnapshot, Move, Piece, Side, Square};
use serde::Serialize;

/// Stable identifier of a piece on screen.
pub type ItemId = u32;

/// A piece as the UI draws and drags it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DraggableItem {
    pub id: ItemId,
    pub piece: Piece,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPresentation {
    squares: [Option<DraggableItem>; 64],
    side_to_move: Side,
    next_id: ItemId,
}

impl Default for BoardPresentation {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardPresentation {
    /// A presentation of the starting position.
    pub fn new() -> Self {
        let mut presentation = Self {
            squares: [None; 64],
            side_to_move: Side::White,
            next_id: 0,
        };
        presentation.rebuild_from_initial_position();
        presentation
    }

    /// Discards every item and lays out the starting position afresh.
    ///
    /// Items are numbered by square index, so a1 holds id 0 and h8 id 63.
    pub fn rebuild_from_initial_position(&mut self) {
        self.rebuild_from(&BoardSnapshot::initial());
    }

    /// Discards every item and lays out `snapshot` afresh.
    pub fn rebuild_from(&mut self, snapshot: &BoardSnapshot) {
        self.squares = [None; 64];
        for (sq, piece) in snapshot.pieces() {
            self.squares[sq.index()] = Some(DraggableItem {
                id: sq.index() as ItemId,
                piece,
            });
        }
        self.side_to_move = snapshot.side_to_move();
        self.next_id = 64;
    }

    /// Follows a committed move, then matches the engine's reported board.
    ///
    /// The moving item keeps its id; a promoted pawn keeps its id with the new
    /// piece kind.
    pub fn apply_move(&mut self, mv: &Move, after: &BoardSnapshot) {
        if let Some(mut item) = self.squares[mv.from.index()].take() {
            if let Some(kind) = mv.promotion() {
                item.piece.kind = kind;
            }
            self.squares[mv.to.index()] = Some(item);
        }
        self.resync(after);
    }

    /// Aligns the presentation with `snapshot`, reusing ids where it can.
    ///
    /// Items standing where the snapshot disagrees are lifted off; squares the
    /// snapshot fills are then served from those lifted items of the same
    /// piece before new ids are minted. Lifted items left over were captured.
    pub fn resync(&mut self, snapshot: &BoardSnapshot) {
        let mut lifted = Vec::new();
        let mut vacant = Vec::new();
        for sq in Square::all() {
            let wanted = snapshot.piece_at(sq);
            let shown = self.squares[sq.index()];
            if shown.map(|item| item.piece) == wanted {
                continue;
            }
            if let Some(item) = self.squares[sq.index()].take() {
                lifted.push(item);
            }
            if let Some(piece) = wanted {
                vacant.push((sq, piece));
            }
        }

        for (sq, piece) in vacant {
            let item = match lifted.iter().position(|item| item.piece == piece) {
                Some(index) => lifted.swap_remove(index),
                None => self.mint(piece),
            };
            self.squares[sq.index()] = Some(item);
        }
        self.side_to_move = snapshot.side_to_move();
    }

    pub fn item_at(&self, sq: Square) -> Option<DraggableItem> {
        self.squares[sq.index()]
    }

    /// Occupied squares in index order.
    pub fn items(&self) -> impl Iterator<Item = (Square, DraggableItem)> + '_ {
        Square::all().filter_map(|sq| self.item_at(sq).map(|item| (sq, item)))
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// The board this presentation shows, without ids.
    pub fn snapshot(&self) -> BoardSnapshot {
        let mut snapshot = BoardSnapshot::empty(self.side_to_move);
        for (sq, item) in self.items() {
            snapshot.set(sq, Some(item.piece));
        }
        snapshot
    }

    fn mint(&mut self, piece: Piece) -> DraggableItem {
        let id = self.next_id;
        self.next_id += 1;
        DraggableItem { id, piece }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{MoveKind, PieceKind};

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    fn board(placement: &str, side: Side) -> BoardSnapshot {
        BoardSnapshot::from_placement(placement, side).unwrap()
    }

    fn id_at(p: &BoardPresentation, name: &str) -> ItemId {
        p.item_at(sq(name)).unwrap().id
    }

    #[test]
    fn initial_ids_follow_square_index() {
        let p = BoardPresentation::new();
        assert_eq!(p.items().count(), 32);
        assert_eq!(id_at(&p, "a1"), 0);
        assert_eq!(id_at(&p, "e2"), 12);
        assert_eq!(id_at(&p, "h8"), 63);
        assert_eq!(p.snapshot(), BoardSnapshot::initial());
    }

    #[test]
    fn quiet_move_keeps_id() {
        let mut p = BoardPresentation::new();
        let mv = Move::new(sq("e2"), sq("e4"), MoveKind::Quiet(PieceKind::Pawn));
        let after = board("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR", Side::Black);
        p.apply_move(&mv, &after);
        assert_eq!(id_at(&p, "e4"), 12);
        assert!(p.item_at(sq("e2")).is_none());
        assert_eq!(p.snapshot(), after);
    }

    #[test]
    fn capture_removes_victim() {
        let mut p = BoardPresentation::new();
        p.rebuild_from(&board("4k3/8/8/3p4/4P3/8/8/4K3", Side::White));
        let attacker = id_at(&p, "e4");
        let mv = Move::new(sq("e4"), sq("d5"), MoveKind::Capture(PieceKind::Pawn));
        let after = board("4k3/8/8/3P4/8/8/8/4K3", Side::Black);
        p.apply_move(&mv, &after);
        assert_eq!(id_at(&p, "d5"), attacker);
        assert_eq!(p.items().count(), 3);
        assert_eq!(p.snapshot(), after);
    }

    #[test]
    fn castling_carries_rook_id() {
        let mut p = BoardPresentation::new();
        p.rebuild_from(&board("4k3/8/8/8/8/8/8/4K2R", Side::White));
        let king = id_at(&p, "e1");
        let rook = id_at(&p, "h1");
        let mv = Move::new(sq("e1"), sq("g1"), MoveKind::Castle);
        let after = board("4k3/8/8/8/8/8/8/5RK1", Side::Black);
        p.apply_move(&mv, &after);
        assert_eq!(id_at(&p, "g1"), king);
        assert_eq!(id_at(&p, "f1"), rook);
        assert_eq!(p.snapshot(), after);
    }

    #[test]
    fn en_passant_drops_passed_pawn() {
        let mut p = BoardPresentation::new();
        p.rebuild_from(&board("4k3/8/8/3pP3/8/8/8/4K3", Side::White));
        let attacker = id_at(&p, "e5");
        let mv = Move::new(sq("e5"), sq("d6"), MoveKind::EnPassant);
        let after = board("4k3/8/3P4/8/8/8/8/4K3", Side::Black);
        p.apply_move(&mv, &after);
        assert_eq!(id_at(&p, "d6"), attacker);
        assert!(p.item_at(sq("d5")).is_none());
        assert_eq!(p.snapshot(), after);
    }

    #[test]
    fn promotion_keeps_pawn_id_with_new_kind() {
        let mut p = BoardPresentation::new();
        p.rebuild_from(&board("4k3/P7/8/8/8/8/8/4K3", Side::White));
        let pawn = id_at(&p, "a7");
        let mv = Move::new(sq("a7"), sq("a8"), MoveKind::Promotion(PieceKind::Rook));
        let after = board("R3k3/8/8/8/8/8/8/4K3", Side::Black);
        p.apply_move(&mv, &after);
        let item = p.item_at(sq("a8")).unwrap();
        assert_eq!(item.id, pawn);
        assert_eq!(item.piece, Piece::new(Side::White, PieceKind::Rook));
    }

    #[test]
    fn resync_mints_ids_for_unknown_pieces() {
        let mut p = BoardPresentation::new();
        p.rebuild_from(&board("4k3/8/8/8/8/8/8/4K3", Side::White));
        p.resync(&board("4k3/8/8/8/8/8/8/Q3K3", Side::White));
        assert_eq!(id_at(&p, "a1"), 64);
        assert_eq!(id_at(&p, "e1"), 4);
    }

    #[test]
    fn rebuild_restores_initial_ids() {
        let mut p = BoardPresentation::new();
        p.resync(&board("4k3/8/8/8/8/8/8/4K3", Side::Black));
        p.rebuild_from_initial_position();
        assert_eq!(p, BoardPresentation::new());
    }
}
