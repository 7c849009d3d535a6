//! [`LocalEngine`]: an in-process [`EngineGateway`].

use async_trait::async_trait;
use chess_core::{BoardSnapshot, Move};
use chess_session::{
    Autoplay, AutoplayBackend, AutoplayConfig, EngineError, EngineGateway, EngineReply,
};
use shakmaty::fen::Fen;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::backend::{Backend, UciBackend, UciPosition};
use crate::uci_client::UciError;
use crate::{convert, outcome};

struct Game {
    start: Chess,
    start_fen: Option<String>,
    position: Chess,
    /// UCI text of every move since the start.
    history: Vec<String>,
    /// How often each position has occurred, for threefold repetition.
    /// Keyed by Zobrist hash, so castling rights and en passant count.
    repetitions: HashMap<Zobrist64, u32>,
}

impl Game {
    fn new(start: Chess, start_fen: Option<String>) -> Self {
        let mut game = Self {
            position: start.clone(),
            start,
            start_fen,
            history: Vec::new(),
            repetitions: HashMap::new(),
        };
        game.reset();
        game
    }

    fn reset(&mut self) {
        self.position = self.start.clone();
        self.history.clear();
        self.repetitions.clear();
        self.repetitions.insert(repetition_key(&self.position), 1);
    }

    fn play(&mut self, m: &shakmaty::Move) -> Result<EngineReply, EngineError> {
        use shakmaty::Position;

        let mv = convert::to_move(m)?;
        self.position.play_unchecked(m);
        self.history.push(mv.to_uci().to_string());

        let occurrences = self
            .repetitions
            .entry(repetition_key(&self.position))
            .or_insert(0);
        *occurrences += 1;
        let status = outcome::status(&self.position, *occurrences);
        Ok(EngineReply {
            mv,
            board: convert::snapshot(&self.position),
            status,
        })
    }
}

fn repetition_key(position: &Chess) -> Zobrist64 {
    position.zobrist_hash(EnPassantMode::Legal)
}

/// Plays standard chess in-process, with autoplay from a [`Backend`].
///
/// A cancel applies to the autoplay request running when it arrives, up to
/// the moment its move is applied. A cancel with nothing running is ignored.
pub struct LocalEngine {
    game: Mutex<Game>,
    backend: Backend,
    /// Number of autoplay requests started so far.
    started: AtomicU64,
    /// Requests numbered up to this one are cancelled.
    cancelled: AtomicU64,
    cancel: Notify,
}

impl LocalEngine {
    /// Starts from the standard position.
    pub fn new(backend: Backend) -> Self {
        Self::with_game(Game::new(Chess::default(), None), backend)
    }

    /// Random autoplay from the standard position.
    pub fn random() -> Self {
        Self::new(Backend::Random)
    }

    /// Starts (and restarts) from `fen`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Rejected`] if `fen` is not a legal position.
    pub fn from_fen(fen: &str, backend: Backend) -> Result<Self, EngineError> {
        let setup: Fen = fen
            .parse()
            .map_err(|err| EngineError::Rejected(format!("invalid FEN {:?}: {}", fen, err)))?;
        let start: Chess = setup
            .into_position(CastlingMode::Standard)
            .map_err(|err| EngineError::Rejected(format!("illegal position {:?}: {}", fen, err)))?;
        Ok(Self::with_game(
            Game::new(start, Some(fen.to_string())),
            backend,
        ))
    }

    /// Builds the engine `config` asks for, spawning a UCI engine if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`UciError`] if the UCI engine cannot be started.
    pub async fn from_config(config: &AutoplayConfig) -> Result<Self, UciError> {
        let backend = match config.backend {
            AutoplayBackend::Random => Backend::Random,
            AutoplayBackend::Uci => Backend::Uci(
                UciBackend::spawn(&config.engine_path, &config.time_control).await?,
            ),
        };
        Ok(Self::new(backend))
    }

    fn with_game(game: Game, backend: Backend) -> Self {
        Self {
            game: Mutex::new(game),
            backend,
            started: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            cancel: Notify::new(),
        }
    }

    /// Current board contents.
    pub async fn board(&self) -> BoardSnapshot {
        convert::snapshot(&self.game.lock().await.position)
    }

    fn is_cancelled(&self, request: u64) -> bool {
        self.cancelled.load(Ordering::SeqCst) >= request
    }

    async fn cancelled(&self, request: u64) {
        loop {
            let notified = self.cancel.notified();
            if self.is_cancelled(request) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EngineGateway for LocalEngine {
    async fn autoplay_move(&self) -> Result<Autoplay, EngineError> {
        let request = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let (position, fen, history) = {
            let game = self.game.lock().await;
            (
                game.position.clone(),
                game.start_fen.clone(),
                game.history.clone(),
            )
        };
        let setup = UciPosition {
            fen: fen.as_deref(),
            moves: &history,
        };

        let chosen = tokio::select! {
            chosen = self.backend.choose(&position, setup) => chosen?,
            _ = self.cancelled(request) => {
                self.backend.stop().await?;
                debug!("autoplay abandoned during search");
                return Ok(Autoplay::Cancelled);
            }
        };

        let mut game = self.game.lock().await;
        if self.is_cancelled(request) {
            debug!("autoplay abandoned before applying its move");
            return Ok(Autoplay::Cancelled);
        }
        game.play(&chosen).map(Autoplay::Played)
    }

    async fn play_move_manually(&self, mv: Move) -> Result<EngineReply, EngineError> {
        let mut game = self.game.lock().await;
        let attempt = mv.to_uci();
        let chosen = convert::legal_moves(&game.position)?
            .into_iter()
            .find(|(_, legal)| attempt.matches(legal))
            .map(|(m, _)| m)
            .ok_or_else(|| EngineError::Rejected(format!("illegal move {}", attempt)))?;
        game.play(&chosen)
    }

    async fn restart_game(&self) -> Result<BoardSnapshot, EngineError> {
        self.backend.new_game().await?;
        let mut game = self.game.lock().await;
        game.reset();
        info!("engine game reset");
        Ok(convert::snapshot(&game.position))
    }

    async fn legal_moves(&self) -> Result<Vec<Move>, EngineError> {
        let game = self.game.lock().await;
        Ok(convert::legal_moves(&game.position)?
            .into_iter()
            .map(|(_, mv)| mv)
            .collect())
    }

    async fn cancel_move(&self) {
        self.cancelled
            .fetch_max(self.started.load(Ordering::SeqCst), Ordering::SeqCst);
        self.cancel.notify_waiters();
    }
}
