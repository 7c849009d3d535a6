//! The turn/automation state machine.
//!
//! [`TurnController`] tracks which side is to move, whether that side is under
//! autonomy, and the autonomy setting of the side that is *not* moving (the
//! "latched" flag). Every operation is a synchronous state change that returns
//! at most one [`Directive`] for the dispatch layer to carry out; the
//! controller itself never talks to an engine.
//!
//! All transitions go through [`transition`], a single function of
//! (mover side, mover autonomy, latched flag, operation). For
//! [`Operation::Advance`] it reproduces this table, which is symmetric under
//! exchanging White and Black:
//!
//! | current party     | latched | next party        | next latched |
//! |-------------------|---------|-------------------|--------------|
//! | Manual(White)     | Off     | Manual(Black)     | Off          |
//! | Manual(White)     | On      | Autonomous(Black) | Off          |
//! | Autonomous(White) | Off     | Manual(Black)     | On           |
//! | Autonomous(White) | On      | Autonomous(Black) | On           |

use chess_core::Side;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AutonomyFlag;

/// Who is to move, and how.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ActiveParty {
    /// The side is to move and a human chooses the move.
    Manual(Side),
    /// The side is to move and the engine plays for it.
    Autonomous(Side),
    /// Terminal; holds the end-of-game reason.
    GameOver(String),
}

impl ActiveParty {
    /// Party for `side` to move with the given autonomy.
    pub const fn to_move(side: Side, autonomy: AutonomyFlag) -> Self {
        match autonomy {
            AutonomyFlag::Off => ActiveParty::Manual(side),
            AutonomyFlag::On => ActiveParty::Autonomous(side),
        }
    }

    /// The side to move, or `None` once the game is over.
    pub const fn side(&self) -> Option<Side> {
        match self {
            ActiveParty::Manual(side) | ActiveParty::Autonomous(side) => Some(*side),
            ActiveParty::GameOver(_) => None,
        }
    }

    pub const fn is_autonomous(&self) -> bool {
        matches!(self, ActiveParty::Autonomous(_))
    }

    pub const fn is_game_over(&self) -> bool {
        matches!(self, ActiveParty::GameOver(_))
    }
}

impl fmt::Display for ActiveParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveParty::Manual(side) => write!(f, "{} to move", side),
            ActiveParty::Autonomous(side) => write!(f, "{} to move (bot)", side),
            ActiveParty::GameOver(message) => write!(f, "game over: {}", message),
        }
    }
}

/// Side effect an operation asks the dispatch layer to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Ask the engine to compute and play a move for this side.
    RequestAutoplay(Side),
    /// Abandon the in-flight autoplay request, if any. Best effort.
    CancelAutoplay,
}

/// A request against a non-terminal controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// The mover's move was committed.
    Advance,
    /// Set one side's autonomy.
    SetAutonomy(Side, AutonomyFlag),
}

/// Result of applying an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub party: ActiveParty,
    pub latched: AutonomyFlag,
    pub directive: Option<Directive>,
}

/// The single source of truth for non-terminal transitions.
///
/// `mover` and `mover_autonomy` describe the current party, `latched` the
/// autonomy of the other side.
pub fn transition(
    mover: Side,
    mover_autonomy: AutonomyFlag,
    latched: AutonomyFlag,
    op: Operation,
) -> Transition {
    match op {
        Operation::Advance => {
            let next = mover.opponent();
            Transition {
                party: ActiveParty::to_move(next, latched),
                latched: mover_autonomy,
                directive: latched.is_on().then_some(Directive::RequestAutoplay(next)),
            }
        }
        Operation::SetAutonomy(side, flag) if side == mover => {
            let directive = if flag == mover_autonomy {
                None
            } else if flag.is_on() {
                Some(Directive::RequestAutoplay(mover))
            } else {
                Some(Directive::CancelAutoplay)
            };
            Transition {
                party: ActiveParty::to_move(mover, flag),
                latched,
                directive,
            }
        }
        Operation::SetAutonomy(_, flag) => Transition {
            party: ActiveParty::to_move(mover, mover_autonomy),
            latched: flag,
            directive: None,
        },
    }
}

/// Owns the current party and the latched autonomy flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnController {
    party: ActiveParty,
    latched: AutonomyFlag,
}

impl Default for TurnController {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnController {
    /// A fresh game: White to move manually, Black not autonomous.
    pub const fn new() -> Self {
        Self {
            party: ActiveParty::Manual(Side::White),
            latched: AutonomyFlag::Off,
        }
    }

    /// Builds a controller in an arbitrary state.
    pub const fn from_parts(party: ActiveParty, latched: AutonomyFlag) -> Self {
        Self { party, latched }
    }

    pub fn party(&self) -> &ActiveParty {
        &self.party
    }

    /// Autonomy of the side not currently to move. Frozen once the game is over.
    pub fn latched(&self) -> AutonomyFlag {
        self.latched
    }

    pub fn color_to_move(&self) -> Option<Side> {
        self.party.side()
    }

    /// Autonomy setting of `side`, read from the party or the latched flag.
    ///
    /// Once the game is over neither side is autonomous.
    pub fn autonomy_of(&self, side: Side) -> AutonomyFlag {
        match &self.party {
            ActiveParty::Manual(mover) if *mover == side => AutonomyFlag::Off,
            ActiveParty::Autonomous(mover) if *mover == side => AutonomyFlag::On,
            ActiveParty::Manual(_) | ActiveParty::Autonomous(_) => self.latched,
            ActiveParty::GameOver(_) => AutonomyFlag::Off,
        }
    }

    /// Hands the move to the other side after a committed move.
    ///
    /// No-op once the game is over.
    pub fn advance_turn(&mut self) -> Option<Directive> {
        self.apply(Operation::Advance)
    }

    /// Flips `side`'s autonomy. No-op once the game is over.
    pub fn toggle_autonomy(&mut self, side: Side) -> Option<Directive> {
        let flag = self.autonomy_of(side).toggled();
        self.apply(Operation::SetAutonomy(side, flag))
    }

    /// Puts `side` under manual control.
    pub fn set_manual(&mut self, side: Side) -> Option<Directive> {
        self.apply(Operation::SetAutonomy(side, AutonomyFlag::Off))
    }

    /// Puts `side` under autonomy; requests a move at once if it is to move.
    pub fn set_autonomous(&mut self, side: Side) -> Option<Directive> {
        self.apply(Operation::SetAutonomy(side, AutonomyFlag::On))
    }

    /// Enters the terminal state.
    ///
    /// Cancels the autoplay request of an autonomous mover. Ending an already
    /// finished game keeps the first message.
    pub fn end_game(&mut self, message: impl Into<String>) -> Option<Directive> {
        if self.party.is_game_over() {
            return None;
        }
        let was_autonomous = self.party.is_autonomous();
        self.party = ActiveParty::GameOver(message.into());
        was_autonomous.then_some(Directive::CancelAutoplay)
    }

    /// Back to White to move manually with the latched flag off.
    pub fn restart(&mut self) -> Option<Directive> {
        let was_autonomous = self.party.is_autonomous();
        *self = Self::new();
        was_autonomous.then_some(Directive::CancelAutoplay)
    }

    fn apply(&mut self, op: Operation) -> Option<Directive> {
        let (mover, mover_autonomy) = match self.party {
            ActiveParty::Manual(side) => (side, AutonomyFlag::Off),
            ActiveParty::Autonomous(side) => (side, AutonomyFlag::On),
            ActiveParty::GameOver(_) => return None,
        };
        let next = transition(mover, mover_autonomy, self.latched, op);
        self.party = next.party;
        self.latched = next.latched;
        next.directive
    }
}
