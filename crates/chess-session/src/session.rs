//! Move dispatch: the glue between the controllers and the engine.
//!
//! A [`Session`] owns the [`TurnController`], the [`PromotionFlow`], the
//! [`BoardPresentation`] and the gateway. Operations change state
//! synchronously, then carry out whatever [`Directive`] the turn controller
//! returned. Autoplay runs as a spawned task; its completion is handled by
//! the session loop, which may in turn request the next autonomous move, so
//! bot-vs-bot play never nests calls.
//!
//! Each autoplay request is stamped with a generation. Cancelling bumps the
//! current generation. A cancelled request may still come back with a move:
//! the engine has applied it, so it is recorded like any other. Failures and
//! cancellations with a stale stamp are dropped. Before any new engine call, a
//! cancelled request that is still running is awaited and settled, so the
//! engine never sees two calls at once.

use chess_core::{BoardSnapshot, Move, PieceKind, Side, Square, UciMove};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::events::{create_broadcast, EventSender};
use crate::{
    ActiveParty, Autoplay, AutonomyFlag, BoardPresentation, Directive, DraggableItem, EngineError,
    EngineGateway, EngineReply, GameStatus, PromotionFlow, SessionConfig, SessionError,
    SessionEvent, TurnController,
};

type AutoplayResult = Result<Result<Autoplay, EngineError>, JoinError>;

struct InFlight {
    generation: u64,
    side: Side,
    task: JoinHandle<Result<Autoplay, EngineError>>,
}

/// A point-in-time copy of the session state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub party: ActiveParty,
    pub white: AutonomyFlag,
    pub black: AutonomyFlag,
    pub pending_promotion: Vec<Move>,
    /// Piece placement, FEN field one.
    pub placement: String,
    #[serde(skip)]
    pub board: BoardSnapshot,
    pub items: Vec<(Square, DraggableItem)>,
    pub plies: u32,
}

impl SessionView {
    pub fn autonomy_of(&self, side: Side) -> AutonomyFlag {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }
}

pub struct Session<G: EngineGateway> {
    id: Uuid,
    gateway: Arc<G>,
    turn: TurnController,
    promotion: PromotionFlow,
    board: BoardPresentation,
    events: EventSender,
    in_flight: Option<InFlight>,
    generation: u64,
    plies: u32,
    max_plies: u32,
    initial_autonomy: [bool; 2],
}

impl<G: EngineGateway> Session<G> {
    /// Creates a session over `gateway` with the starting position.
    ///
    /// Initial autonomy from `config` is applied by [`Self::start`].
    pub fn new(gateway: Arc<G>, config: &SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            gateway,
            turn: TurnController::new(),
            promotion: PromotionFlow::new(),
            board: BoardPresentation::new(),
            events: create_broadcast(config.event_capacity),
            in_flight: None,
            generation: 0,
            plies: 0,
            max_plies: config.max_plies,
            initial_autonomy: [config.white_autonomous, config.black_autonomous],
        }
    }

    /// Presents `board` instead of the starting position, for engines that
    /// begin elsewhere.
    pub fn with_position(mut self, board: &BoardSnapshot) -> Self {
        self.board.rebuild_from(board);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn party(&self) -> &ActiveParty {
        self.turn.party()
    }

    pub fn presentation(&self) -> &BoardPresentation {
        &self.board
    }

    pub fn view(&self) -> SessionView {
        let board = self.board.snapshot();
        SessionView {
            id: self.id,
            party: self.turn.party().clone(),
            white: self.turn.autonomy_of(Side::White),
            black: self.turn.autonomy_of(Side::Black),
            pending_promotion: self.promotion.options().to_vec(),
            placement: board.placement(),
            board,
            items: self.board.items().collect(),
            plies: self.plies,
        }
    }

    /// Applies the configured initial autonomy and announces the first turn.
    pub async fn start(&mut self) {
        info!(party = %self.turn.party(), "session started");
        for side in [Side::Black, Side::White] {
            if self.initial_autonomy[side.index()] {
                let directive = self.turn.set_autonomous(side);
                self.execute(directive).await;
            }
        }
        self.emit(SessionEvent::TurnChanged {
            party: self.turn.party().clone(),
        });
    }

    /// Handles a drag-and-drop from the UI.
    ///
    /// A unique legal match is played at once. Several matches are promotion
    /// variants: they are offered and a
    /// [`SessionEvent::PromotionRequired`] is emitted.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotYourTurn`] unless a human is to move
    /// - [`SessionError::PromotionPending`] while a choice is outstanding
    /// - [`SessionError::IllegalMove`] if nothing matches
    /// - [`SessionError::Engine`] if the engine fails
    pub async fn attempt_move(&mut self, attempt: UciMove) -> Result<(), SessionError> {
        let side = self.manual_turn().await?;
        let candidates: Vec<Move> = self
            .gateway
            .legal_moves()
            .await?
            .into_iter()
            .filter(|mv| {
                mv.from == attempt.from
                    && mv.to == attempt.to
                    && (attempt.promotion.is_none() || mv.promotion() == attempt.promotion)
            })
            .collect();

        match candidates.as_slice() {
            [] => Err(SessionError::IllegalMove(attempt.to_string())),
            [mv] => {
                let mv = *mv;
                self.dispatch_manual(side, mv).await
            }
            _ => {
                self.promotion.offer(candidates.clone()).map_err(report)?;
                debug!(%side, options = candidates.len(), "promotion offered");
                self.emit(SessionEvent::PromotionRequired { options: candidates });
                Ok(())
            }
        }
    }

    /// Plays a fully described move for the human to move.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::attempt_move`]; a rejection leaves state unchanged.
    pub async fn request_manual_move(&mut self, mv: Move) -> Result<(), SessionError> {
        let side = self.manual_turn().await?;
        self.dispatch_manual(side, mv).await
    }

    /// Resolves the pending promotion with `piece`.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoPromotionPending`] without an offer;
    /// [`SessionError::InvariantViolation`] if `piece` does not match exactly
    /// one offered move, in which case the offer stays pending. If the engine
    /// rejects the chosen move, the offer is restored.
    pub async fn choose_promotion(&mut self, piece: PieceKind) -> Result<(), SessionError> {
        let side = match self.turn.party() {
            ActiveParty::Manual(side) => *side,
            ActiveParty::Autonomous(_) => return Err(SessionError::NotYourTurn),
            ActiveParty::GameOver(message) => return Err(SessionError::GameOver(message.clone())),
        };
        let options = self.promotion.options().to_vec();
        let mv = self.promotion.choose(piece).map_err(report)?;
        match self.dispatch_manual(side, mv).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.promotion.offer(options)?;
                Err(err)
            }
        }
    }

    pub async fn toggle_autonomy(&mut self, side: Side) {
        let directive = self.turn.toggle_autonomy(side);
        self.after_autonomy_change(directive).await;
    }

    pub async fn set_manual(&mut self, side: Side) {
        let directive = self.turn.set_manual(side);
        self.after_autonomy_change(directive).await;
    }

    pub async fn set_autonomous(&mut self, side: Side) {
        let directive = self.turn.set_autonomous(side);
        self.after_autonomy_change(directive).await;
    }

    /// Ends the game from the UI, e.g. on resignation.
    ///
    /// Ending a finished game keeps its first message.
    pub async fn end_game(&mut self, message: impl Into<String>) {
        if self.turn.party().is_game_over() {
            return;
        }
        let message = message.into();
        let directive = self.turn.end_game(message.clone());
        let directive = self.finish(message, directive);
        self.execute(directive).await;
    }

    /// Resets the engine, the turn controller and the presentation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Engine`] if the engine cannot restart; the
    /// session keeps its state and resumes a cancelled autoplay.
    pub async fn request_restart(&mut self) -> Result<(), SessionError> {
        // A move landing after the cancel is recorded, then reset with the rest.
        let _ = self.drain().await;
        let board = match self.gateway.restart_game().await {
            Ok(board) => board,
            Err(err) => {
                warn!(%err, "restart failed");
                self.resume().await;
                return Err(err.into());
            }
        };

        self.turn.restart();
        self.withdraw_promotion();
        self.board.rebuild_from_initial_position();
        self.board.resync(&board);
        self.plies = 0;
        info!("game restarted");
        self.emit(SessionEvent::Restarted);
        self.emit(SessionEvent::TurnChanged {
            party: self.turn.party().clone(),
        });
        Ok(())
    }

    /// Re-requests autoplay for an autonomous mover that has nothing live in
    /// flight, e.g. after a stall.
    pub async fn resume(&mut self) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == self.generation)
        {
            return;
        }
        if let ActiveParty::Autonomous(side) = *self.turn.party() {
            self.execute(Some(Directive::RequestAutoplay(side))).await;
        }
    }

    /// Runs autoplay to quiescence: until nothing is in flight.
    ///
    /// Drives bot-vs-bot play to its end when called directly instead of
    /// through [`Self::spawn`].
    ///
    /// # Errors
    ///
    /// Returns the last autoplay failure, if the chain stalled.
    pub async fn settle(&mut self) -> Result<(), SessionError> {
        let mut outcome = Ok(());
        while let Some(in_flight) = self.in_flight.take() {
            let result = in_flight.task.await;
            match self.autoplay_finished(in_flight.generation, in_flight.side, result) {
                Ok(directive) => self.execute(directive).await,
                Err(err) => outcome = Err(err),
            }
        }
        outcome
    }

    /// Moves the session onto its own task and returns a handle to it.
    ///
    /// The task applies initial autonomy, then serves requests until every
    /// handle is dropped.
    pub fn spawn(self) -> SessionHandle {
        let (tx, rx) = mpsc::channel(32);
        let handle = SessionHandle {
            id: self.id,
            commands: tx,
            events: self.events.clone(),
        };
        let span = info_span!("session", id = %self.id);
        tokio::spawn(self.run(rx).instrument(span));
        handle
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.start().await;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                result = wait_in_flight(&mut self.in_flight) => {
                    if let Some(in_flight) = self.in_flight.take() {
                        // A failure here was already surfaced: stalls as an
                        // event, invariant violations through `report`.
                        if let Ok(directive) =
                            self.autoplay_finished(in_flight.generation, in_flight.side, result)
                        {
                            self.execute(directive).await;
                        }
                    }
                }
            }
        }
        let _ = self.drain().await;
        info!("session closed");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Attempt(attempt, reply) => {
                let _ = reply.send(self.attempt_move(attempt).await);
            }
            Command::Manual(mv, reply) => {
                let _ = reply.send(self.request_manual_move(mv).await);
            }
            Command::Promote(piece, reply) => {
                let _ = reply.send(self.choose_promotion(piece).await);
            }
            Command::Toggle(side, reply) => {
                self.toggle_autonomy(side).await;
                let _ = reply.send(Ok(()));
            }
            Command::SetAutonomy(side, flag, reply) => {
                match flag {
                    AutonomyFlag::On => self.set_autonomous(side).await,
                    AutonomyFlag::Off => self.set_manual(side).await,
                }
                let _ = reply.send(Ok(()));
            }
            Command::EndGame(message, reply) => {
                self.end_game(message).await;
                let _ = reply.send(Ok(()));
            }
            Command::Restart(reply) => {
                let _ = reply.send(self.request_restart().await);
            }
            Command::Resume(reply) => {
                self.resume().await;
                let _ = reply.send(Ok(()));
            }
            Command::View(reply) => {
                let _ = reply.send(Ok(self.view()));
            }
        }
    }

    fn manual_side(&self) -> Result<Side, SessionError> {
        match self.turn.party() {
            ActiveParty::Manual(_) if self.promotion.is_pending() => {
                Err(SessionError::PromotionPending)
            }
            ActiveParty::Manual(side) => Ok(*side),
            ActiveParty::Autonomous(_) => Err(SessionError::NotYourTurn),
            ActiveParty::GameOver(message) => Err(SessionError::GameOver(message.clone())),
        }
    }

    /// The human side to move, once a cancelled autoplay has been settled.
    ///
    /// Settling can record a late bot move, so the side is checked again.
    async fn manual_turn(&mut self) -> Result<Side, SessionError> {
        self.manual_side()?;
        let directive = self.drain().await;
        self.execute(directive).await;
        self.manual_side()
    }

    async fn dispatch_manual(&mut self, side: Side, mv: Move) -> Result<(), SessionError> {
        let reply = self.gateway.play_move_manually(mv).await.map_err(|err| {
            debug!(%side, mv = %mv.to_uci(), %err, "manual move rejected");
            err
        })?;
        let directive = self.commit(side, false, reply);
        self.execute(directive).await;
        Ok(())
    }

    /// Handles the outcome of an autoplay request.
    ///
    /// A played move is always recorded: the engine has applied it even if
    /// the request was cancelled meanwhile.
    fn autoplay_finished(
        &mut self,
        generation: u64,
        side: Side,
        result: AutoplayResult,
    ) -> Result<Option<Directive>, SessionError> {
        let current = generation == self.generation;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => Err(EngineError::Unavailable(err.to_string())),
        };
        match outcome {
            Ok(Autoplay::Played(reply)) => {
                if let Some(mover) = self.turn.party().side() {
                    if mover != side {
                        let err = SessionError::InvariantViolation(format!(
                            "autoplay for {} finished while {}",
                            side,
                            self.turn.party()
                        ));
                        return Err(report(err));
                    }
                }
                if !current {
                    debug!(%side, generation, "recording move that landed after its cancel");
                }
                Ok(self.commit(side, true, reply))
            }
            Ok(Autoplay::Cancelled) if current => Err(self.stall(
                side,
                EngineError::Unavailable("engine abandoned the move unasked".to_string()),
            )),
            Ok(Autoplay::Cancelled) => {
                debug!(%side, "autoplay cancelled");
                Ok(None)
            }
            Err(err) if current => Err(self.stall(side, err)),
            Err(err) => {
                debug!(%side, %err, "cancelled autoplay failed");
                Ok(None)
            }
        }
    }

    fn stall(&self, side: Side, err: EngineError) -> SessionError {
        warn!(%side, %err, "autoplay stalled");
        self.emit(SessionEvent::AutoplayStalled {
            side,
            reason: err.to_string(),
        });
        err.into()
    }

    /// Records a move the engine has applied and hands the turn over.
    ///
    /// After the game is over a late move only updates the board.
    fn commit(&mut self, side: Side, autonomous: bool, reply: EngineReply) -> Option<Directive> {
        let EngineReply { mv, board, status } = reply;
        self.board.apply_move(&mv, &board);
        self.plies += 1;
        info!(%side, mv = %mv.to_uci(), autonomous, "move played");
        self.emit(SessionEvent::MovePlayed {
            mv,
            san: mv.san(),
            side,
            autonomous,
            placement: board.placement(),
        });
        if self.turn.party().is_game_over() {
            return None;
        }

        let directive = self.turn.advance_turn();
        let ended = match status {
            GameStatus::Finished(message) => Some(message),
            GameStatus::Ongoing if self.max_plies > 0 && self.plies >= self.max_plies => {
                Some(format!("Draw after {} plies", self.plies))
            }
            GameStatus::Ongoing => None,
        };
        match ended {
            Some(message) => {
                let directive = self.turn.end_game(message.clone());
                self.finish(message, directive)
            }
            None => {
                self.emit(SessionEvent::TurnChanged {
                    party: self.turn.party().clone(),
                });
                directive
            }
        }
    }

    fn finish(&mut self, message: String, directive: Option<Directive>) -> Option<Directive> {
        info!(%message, plies = self.plies, "game over");
        self.withdraw_promotion();
        self.emit(SessionEvent::GameOver { message });
        directive
    }

    async fn after_autonomy_change(&mut self, directive: Option<Directive>) {
        let Some(directive) = directive else {
            return;
        };
        if matches!(directive, Directive::RequestAutoplay(_)) {
            self.withdraw_promotion();
        }
        self.emit(SessionEvent::TurnChanged {
            party: self.turn.party().clone(),
        });
        self.execute(Some(directive)).await;
    }

    /// Carries out `directive` and whatever follows from it.
    async fn execute(&mut self, mut directive: Option<Directive>) {
        while let Some(next) = directive.take() {
            directive = match next {
                Directive::RequestAutoplay(side) => self.request_autonomous_move(side).await,
                Directive::CancelAutoplay => {
                    self.cancel_autoplay().await;
                    None
                }
            };
        }
    }

    async fn request_autonomous_move(&mut self, side: Side) -> Option<Directive> {
        let settled = self.drain().await;
        if self.turn.party() != &ActiveParty::Autonomous(side) {
            // A late move moved the game on.
            return settled;
        }
        self.generation += 1;
        debug!(%side, generation = self.generation, "requesting autoplay");
        let gateway = Arc::clone(&self.gateway);
        let task = tokio::spawn(async move { gateway.autoplay_move().await }.in_current_span());
        self.in_flight = Some(InFlight {
            generation: self.generation,
            side,
            task,
        });
        None
    }

    async fn cancel_autoplay(&mut self) {
        let Some(in_flight) = &self.in_flight else {
            return;
        };
        if in_flight.generation != self.generation {
            return;
        }
        let finished = in_flight.task.is_finished();
        self.generation += 1;
        debug!(generation = self.generation, finished, "cancelling autoplay");
        if !finished {
            self.gateway.cancel_move().await;
        }
    }

    /// Cancels and awaits a request that is still in flight.
    ///
    /// Returns the directive that follows from recording a late move.
    async fn drain(&mut self) -> Option<Directive> {
        self.cancel_autoplay().await;
        let in_flight = self.in_flight.take()?;
        let result = in_flight.task.await;
        self.autoplay_finished(in_flight.generation, in_flight.side, result)
            .ok()
            .flatten()
    }

    fn withdraw_promotion(&mut self) {
        if !self.promotion.withdraw().is_empty() {
            debug!("promotion offer withdrawn");
            self.emit(SessionEvent::PromotionWithdrawn);
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn report(err: SessionError) -> SessionError {
    if let SessionError::InvariantViolation(detail) = &err {
        error!(%detail, "invariant violation");
    }
    err
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> AutoplayResult {
    match in_flight {
        Some(in_flight) => (&mut in_flight.task).await,
        None => std::future::pending().await,
    }
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Attempt(UciMove, Reply<()>),
    Manual(Move, Reply<()>),
    Promote(PieceKind, Reply<()>),
    Toggle(Side, Reply<()>),
    SetAutonomy(Side, AutonomyFlag, Reply<()>),
    EndGame(String, Reply<()>),
    Restart(Reply<()>),
    Resume(Reply<()>),
    View(Reply<SessionView>),
}

/// Cloneable access to a spawned [`Session`].
///
/// Every method fails with [`SessionError::Closed`] once the session task
/// has stopped.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    events: EventSender,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn attempt_move(&self, attempt: UciMove) -> Result<(), SessionError> {
        self.call(|reply| Command::Attempt(attempt, reply)).await
    }

    pub async fn request_manual_move(&self, mv: Move) -> Result<(), SessionError> {
        self.call(|reply| Command::Manual(mv, reply)).await
    }

    pub async fn choose_promotion(&self, piece: PieceKind) -> Result<(), SessionError> {
        self.call(|reply| Command::Promote(piece, reply)).await
    }

    pub async fn toggle_autonomy(&self, side: Side) -> Result<(), SessionError> {
        self.call(|reply| Command::Toggle(side, reply)).await
    }

    pub async fn set_manual(&self, side: Side) -> Result<(), SessionError> {
        self.call(|reply| Command::SetAutonomy(side, AutonomyFlag::Off, reply))
            .await
    }

    pub async fn set_autonomous(&self, side: Side) -> Result<(), SessionError> {
        self.call(|reply| Command::SetAutonomy(side, AutonomyFlag::On, reply))
            .await
    }

    pub async fn end_game(&self, message: impl Into<String>) -> Result<(), SessionError> {
        let message = message.into();
        self.call(|reply| Command::EndGame(message, reply)).await
    }

    pub async fn request_restart(&self) -> Result<(), SessionError> {
        self.call(Command::Restart).await
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.call(Command::Resume).await
    }

    pub async fn view(&self) -> Result<SessionView, SessionError> {
        self.call(Command::View).await
    }

    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }
}
