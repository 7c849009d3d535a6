//! Text rendering of session events and views.

use chess_session::{SessionEvent, SessionView};
use std::fmt::Write;

pub fn event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::MovePlayed {
            san,
            side,
            autonomous,
            ..
        } => {
            let by = if *autonomous { " (bot)" } else { "" };
            format!("{} plays {}{}", side, san, by)
        }
        SessionEvent::TurnChanged { party } => party.to_string(),
        SessionEvent::PromotionRequired { options } => {
            let pieces: Vec<String> = options
                .iter()
                .filter_map(|mv| mv.promotion())
                .map(|piece| piece.letter().to_ascii_lowercase().to_string())
                .collect();
            format!("promote to which piece? [{}]", pieces.join(" "))
        }
        SessionEvent::PromotionWithdrawn => "promotion choice withdrawn".to_string(),
        SessionEvent::GameOver { message } => format!("game over: {}", message),
        SessionEvent::Restarted => "new game".to_string(),
        SessionEvent::AutoplayStalled { side, reason } => {
            format!("{} bot stalled: {} (type 'resume' to retry)", side, reason)
        }
    }
}

pub fn view(view: &SessionView) -> String {
    let mut out = view.board.diagram();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} | white: {} | black: {} | ply {}",
        view.party, view.white, view.black, view.plies
    );
    if !view.pending_promotion.is_empty() {
        let _ = writeln!(out, "promotion pending");
    }
    out
}
