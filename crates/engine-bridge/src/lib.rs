//! Reference [`EngineGateway`](chess_session::EngineGateway) implementation.
//!
//! [`LocalEngine`] keeps the authoritative position in-process using
//! `shakmaty` for the rules, and picks autonomous moves either at random or by
//! asking an external UCI engine.

mod backend;
mod convert;
mod engine;
mod outcome;
pub mod uci_client;

pub use backend::{Backend, UciBackend};
pub use engine::LocalEngine;
pub use uci_client::{UciClient, UciError};
