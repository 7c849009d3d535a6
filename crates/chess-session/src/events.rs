//! Notifications the session pushes to the UI.

use chess_core::{Move, Side};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ActiveParty;

/// Events emitted by a session, in the order things happened.
///
/// Tags are snake_case so the JSON form reads `{"type":"game_over",...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A move was committed by the engine.
    MovePlayed {
        mv: Move,
        /// Short algebraic form of the move.
        san: String,
        side: Side,
        /// True when the move came from autoplay.
        autonomous: bool,
        /// Piece placement after the move, FEN field one.
        placement: String,
    },
    /// The party to move changed.
    TurnChanged { party: ActiveParty },
    /// The attempted move is a promotion; the user must pick a piece.
    PromotionRequired { options: Vec<Move> },
    /// A pending promotion choice was discarded.
    PromotionWithdrawn,
    GameOver { message: String },
    /// The game was reset to the starting position.
    Restarted,
    /// An autonomous move failed; the side stays to move.
    AutoplayStalled { side: Side, reason: String },
}

/// Broadcast sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Creates the event channel.
///
/// Slow subscribers lose the oldest events once `capacity` are queued.
pub fn create_broadcast(capacity: usize) -> EventSender {
    let (tx, _) = broadcast::channel(capacity.max(1));
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&SessionEvent::GameOver {
            message: "Draw by stalemate".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"game_over","message":"Draw by stalemate"}"#);

        let json = serde_json::to_string(&SessionEvent::PromotionWithdrawn).unwrap();
        assert_eq!(json, r#"{"type":"promotion_withdrawn"}"#);
    }

    #[test]
    fn turn_changed_nests_party() {
        let event = SessionEvent::TurnChanged {
            party: ActiveParty::Manual(Side::White),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "turn_changed");
        assert_eq!(value["party"]["mode"], "manual");
        assert_eq!(value["party"]["value"], "White");
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscribers() {
        let tx = create_broadcast(4);
        let mut rx = tx.subscribe();
        tx.send(SessionEvent::Restarted).unwrap();
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::Restarted);
    }
}
