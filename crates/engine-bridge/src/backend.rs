//! Move choosers for autoplay.

use chess_session::EngineError;
use rand::seq::SliceRandom;
use shakmaty::Chess;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::convert;
use crate::uci_client::{UciClient, UciError};

/// Where autonomous moves come from.
pub enum Backend {
    /// A uniformly random legal move.
    Random,
    /// An external UCI engine.
    Uci(UciBackend),
}

pub struct UciBackend {
    client: Mutex<UciClient>,
    time_control: String,
}

impl UciBackend {
    /// Spawns and initializes the engine at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`UciError`] if the engine cannot be started or fails the
    /// handshake.
    pub async fn spawn(path: impl AsRef<Path>, time_control: &str) -> Result<Self, UciError> {
        let mut client = UciClient::spawn(path)?;
        client.init().await?;
        info!(engine = %client.name, "uci engine ready");
        Ok(Self::from_client(client, time_control))
    }

    /// Wraps an already initialized client.
    pub fn from_client(client: UciClient, time_control: &str) -> Self {
        Self {
            client: Mutex::new(client),
            time_control: time_control.to_string(),
        }
    }
}

fn random_move(legal: Vec<(shakmaty::Move, chess_core::Move)>) -> Result<shakmaty::Move, EngineError> {
    legal
        .choose(&mut rand::thread_rng())
        .map(|(m, _)| m.clone())
        .ok_or_else(|| EngineError::Rejected("no legal moves".to_string()))
}

/// The position as a UCI engine is told about it.
pub(crate) struct UciPosition<'a> {
    pub fen: Option<&'a str>,
    pub moves: &'a [String],
}

impl Backend {
    /// Picks a legal move in `position`.
    ///
    /// Not cancel-safe on its own: after dropping the future, call
    /// [`Backend::stop`].
    pub(crate) async fn choose(
        &self,
        position: &Chess,
        setup: UciPosition<'_>,
    ) -> Result<shakmaty::Move, EngineError> {
        let legal = convert::legal_moves(position)?;
        match self {
            Backend::Random => random_move(legal),
            Backend::Uci(uci) => {
                let mut client = uci.client.lock().await;
                client.set_position(setup.fen, setup.moves).await?;
                let best = client.go(&uci.time_control).await?;
                debug!(%best, "uci engine answered");
                legal
                    .into_iter()
                    .find(|(_, mv)| mv.to_uci().to_string() == best)
                    .map(|(m, _)| m)
                    .ok_or_else(|| EngineError::Protocol(format!("engine played illegal move {}", best)))
            }
        }
    }

    /// Ends a search abandoned by a dropped [`Backend::choose`].
    pub(crate) async fn stop(&self) -> Result<(), EngineError> {
        if let Backend::Uci(uci) = self {
            uci.client.lock().await.stop().await?;
        }
        Ok(())
    }

    /// Tells the backend a new game begins.
    pub(crate) async fn new_game(&self) -> Result<(), EngineError> {
        if let Backend::Uci(uci) = self {
            uci.client.lock().await.new_game().await?;
        }
        Ok(())
    }
}
