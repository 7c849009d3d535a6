//! Session controller for a chess client that drives an external engine.
//!
//! The engine owns the rules and the authoritative position; this crate
//! decides *who* moves next and *how*:
//!
//! - [`TurnController`]: which side is to move, and whether a human or the
//!   engine plays it
//! - [`PromotionFlow`]: the pick-a-piece interaction for promoting pawns
//! - [`BoardPresentation`]: the board as a UI draws it, with stable piece ids
//! - [`Session`]: the async dispatcher tying those to an [`EngineGateway`]
//!
//! # Example
//!
//! ```no_run
//! use chess_session::{EngineGateway, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! async fn play<G: EngineGateway>(gateway: G) -> Result<(), chess_session::SessionError> {
//!     let session = Session::new(Arc::new(gateway), &SessionConfig::default());
//!     let mut events = session.subscribe();
//!     let handle = session.spawn();
//!     handle.attempt_move("e2e4".parse().expect("valid move")).await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod autonomy;
pub mod config;
mod error;
pub mod events;
mod gateway;
mod presentation;
mod promotion;
mod session;
mod turn;

pub use autonomy::AutonomyFlag;
pub use config::{AutoplayBackend, AutoplayConfig, ConfigError, SessionConfig};
pub use error::SessionError;
pub use events::SessionEvent;
pub use gateway::{Autoplay, EngineError, EngineGateway, EngineReply, GameStatus};
pub use presentation::{BoardPresentation, DraggableItem, ItemId};
pub use promotion::PromotionFlow;
pub use session::{Session, SessionHandle, SessionView};
pub use turn::{transition, ActiveParty, Directive, Operation, Transition, TurnController};
