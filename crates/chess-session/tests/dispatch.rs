//! Dispatch behavior against a scripted gateway.

use async_trait::async_trait;
use chess_core::{BoardSnapshot, Move, MoveKind, PieceKind, Side, UciMove};
use chess_session::{
    ActiveParty, Autoplay, AutonomyFlag, EngineError, EngineGateway, EngineReply, GameStatus,
    Session, SessionConfig, SessionError, SessionEvent,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Autoplay,
    Manual(Move),
    Restart,
    Legal,
}

#[derive(Default)]
struct Script {
    board: BoardSnapshot,
    legal: Vec<Move>,
    autoplay: VecDeque<Move>,
    statuses: VecDeque<GameStatus>,
    reject_manual: Option<EngineError>,
    calls: Vec<Call>,
}

/// Plays whatever it is told to, moving pieces without checking rules.
#[derive(Default)]
struct ScriptedGateway {
    script: Mutex<Script>,
    hold_autoplay: AtomicBool,
    honour_cancel: AtomicBool,
    cancel_seen: AtomicBool,
    release: Notify,
    cancels: AtomicUsize,
    active: AtomicUsize,
    overlapped: AtomicBool,
}

impl ScriptedGateway {
    fn with_board(board: BoardSnapshot) -> Self {
        let gateway = Self::default();
        gateway.script.lock().unwrap().board = board;
        gateway
    }

    fn legal(&self, moves: Vec<Move>) {
        self.script.lock().unwrap().legal = moves;
    }

    fn queue_autoplay(&self, moves: impl IntoIterator<Item = Move>) {
        self.script.lock().unwrap().autoplay.extend(moves);
    }

    fn queue_status(&self, status: GameStatus) {
        self.script.lock().unwrap().statuses.push_back(status);
    }

    fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    fn board(&self) -> BoardSnapshot {
        self.script.lock().unwrap().board.clone()
    }

    fn enter(&self, call: Call) {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.script.lock().unwrap().calls.push(call);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn play(&self, mv: Move) -> EngineReply {
        let mut script = self.script.lock().unwrap();
        let piece = script.board.piece_at(mv.from).map(|mut piece| {
            if let Some(kind) = mv.promotion() {
                piece.kind = kind;
            }
            piece
        });
        script.board.set(mv.from, None);
        script.board.set(mv.to, piece);
        let next = script.board.side_to_move().opponent();
        script.board.set_side_to_move(next);
        EngineReply {
            mv,
            board: script.board.clone(),
            status: script.statuses.pop_front().unwrap_or(GameStatus::Ongoing),
        }
    }
}

#[async_trait]
impl EngineGateway for ScriptedGateway {
    async fn autoplay_move(&self) -> Result<Autoplay, EngineError> {
        self.enter(Call::Autoplay);
        if self.hold_autoplay.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let result = if self.cancel_seen.swap(false, Ordering::SeqCst) {
            Ok(Autoplay::Cancelled)
        } else {
            let next = self.script.lock().unwrap().autoplay.pop_front();
            match next {
                Some(mv) => Ok(Autoplay::Played(self.play(mv))),
                None => Err(EngineError::Unavailable("no scripted move".to_string())),
            }
        };
        self.exit();
        result
    }

    async fn play_move_manually(&self, mv: Move) -> Result<EngineReply, EngineError> {
        self.enter(Call::Manual(mv));
        let rejection = self.script.lock().unwrap().reject_manual.clone();
        let result = match rejection {
            Some(err) => Err(err),
            None => Ok(self.play(mv)),
        };
        self.exit();
        result
    }

    async fn restart_game(&self) -> Result<BoardSnapshot, EngineError> {
        self.enter(Call::Restart);
        self.script.lock().unwrap().board = BoardSnapshot::initial();
        self.exit();
        Ok(BoardSnapshot::initial())
    }

    async fn legal_moves(&self) -> Result<Vec<Move>, EngineError> {
        self.enter(Call::Legal);
        let moves = self.script.lock().unwrap().legal.clone();
        self.exit();
        Ok(moves)
    }

    async fn cancel_move(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        if self.honour_cancel.load(Ordering::SeqCst) {
            self.cancel_seen.store(true, Ordering::SeqCst);
            self.release.notify_one();
        }
    }
}

fn uci(text: &str) -> UciMove {
    text.parse().unwrap()
}

fn pawn_push(text: &str) -> Move {
    let m = uci(text);
    Move::new(m.from, m.to, MoveKind::Quiet(PieceKind::Pawn))
}

fn knight_hop(text: &str) -> Move {
    let m = uci(text);
    Move::new(m.from, m.to, MoveKind::Quiet(PieceKind::Knight))
}

fn promotions(text: &str, pieces: &[PieceKind]) -> Vec<Move> {
    let m = uci(text);
    pieces
        .iter()
        .map(|&piece| Move::new(m.from, m.to, MoveKind::Promotion(piece)))
        .collect()
}

fn session(gateway: &Arc<ScriptedGateway>) -> Session<ScriptedGateway> {
    Session::new(Arc::clone(gateway), &SessionConfig::default())
}

fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn turn_changes(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, SessionEvent::TurnChanged { .. }))
        .count()
}

#[tokio::test]
async fn latched_black_autoplays_after_white_moves() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("e2e4")]);
    gateway.queue_autoplay([pawn_push("e7e5")]);
    let mut session = session(&gateway);

    session.set_autonomous(Side::Black).await;
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
    assert_eq!(session.view().black, AutonomyFlag::On);

    session.attempt_move(uci("e2e4")).await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Autonomous(Side::Black));
    assert_eq!(session.view().white, AutonomyFlag::Off);

    session.settle().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
    assert_eq!(session.view().black, AutonomyFlag::On);
    assert_eq!(
        gateway.calls(),
        vec![
            Call::Legal,
            Call::Manual(pawn_push("e2e4")),
            Call::Autoplay
        ]
    );
    assert_eq!(session.presentation().snapshot(), gateway.board());
    assert!(!gateway.overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn bot_versus_bot_stops_at_ply_limit() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.queue_autoplay(
        ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6"]
            .into_iter()
            .map(knight_hop),
    );
    let config = SessionConfig {
        white_autonomous: true,
        black_autonomous: true,
        max_plies: 6,
        ..SessionConfig::default()
    };
    let mut session = Session::new(Arc::clone(&gateway), &config);
    let mut events = session.subscribe();

    session.start().await;
    session.settle().await.unwrap();

    assert_eq!(
        session.party(),
        &ActiveParty::GameOver("Draw after 6 plies".to_string())
    );
    assert_eq!(session.view().plies, 6);
    assert_eq!(gateway.calls().len(), 6);
    let events = drain_events(&mut events);
    assert!(events.contains(&SessionEvent::GameOver {
        message: "Draw after 6 plies".to_string()
    }));
    assert!(!gateway.overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn choosing_rook_dispatches_exactly_that_move() {
    let board = BoardSnapshot::from_placement("4k3/P7/8/8/8/8/8/4K3", Side::White).unwrap();
    let gateway = Arc::new(ScriptedGateway::with_board(board));
    let options = promotions("a7a8", &PieceKind::PROMOTIONS);
    gateway.legal(options.clone());
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.attempt_move(uci("a7a8")).await.unwrap();
    assert_eq!(
        drain_events(&mut events),
        vec![SessionEvent::PromotionRequired {
            options: options.clone()
        }]
    );
    assert_eq!(session.view().pending_promotion, options);
    assert_eq!(
        session.attempt_move(uci("e1e2")).await,
        Err(SessionError::PromotionPending)
    );

    session.choose_promotion(PieceKind::Rook).await.unwrap();

    let rook = Move::new(
        uci("a7a8").from,
        uci("a7a8").to,
        MoveKind::Promotion(PieceKind::Rook),
    );
    assert_eq!(gateway.calls().last(), Some(&Call::Manual(rook)));
    assert!(session.view().pending_promotion.is_empty());
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
    assert_eq!(turn_changes(&drain_events(&mut events)), 1);
}

#[tokio::test]
async fn choosing_absent_piece_keeps_offer() {
    let board = BoardSnapshot::from_placement("4k3/P7/8/8/8/8/8/4K3", Side::White).unwrap();
    let gateway = Arc::new(ScriptedGateway::with_board(board));
    let options = promotions("a7a8", &[PieceKind::Queen, PieceKind::Knight]);
    gateway.legal(options.clone());
    let mut session = session(&gateway);

    session.attempt_move(uci("a7a8")).await.unwrap();
    let err = session.choose_promotion(PieceKind::Bishop).await.unwrap_err();
    assert!(matches!(err, SessionError::InvariantViolation(_)));
    assert_eq!(session.view().pending_promotion, options);
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
}

#[tokio::test]
async fn promotion_suffix_selects_directly() {
    let board = BoardSnapshot::from_placement("4k3/P7/8/8/8/8/8/4K3", Side::White).unwrap();
    let gateway = Arc::new(ScriptedGateway::with_board(board));
    gateway.legal(promotions("a7a8", &PieceKind::PROMOTIONS));
    let mut session = session(&gateway);

    session.attempt_move(uci("a7a8n")).await.unwrap();
    let item = session.presentation().item_at(uci("a7a8").to).unwrap();
    assert_eq!(item.piece.kind, PieceKind::Knight);
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
}

#[tokio::test]
async fn rejected_manual_move_changes_nothing() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("e2e4")]);
    gateway.script.lock().unwrap().reject_manual =
        Some(EngineError::Rejected("not today".to_string()));
    let mut session = session(&gateway);
    let before = session.presentation().clone();

    let err = session.attempt_move(uci("e2e4")).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Engine(EngineError::Rejected("not today".to_string()))
    );
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
    assert_eq!(session.presentation(), &before);
}

#[tokio::test]
async fn unmatched_attempt_is_illegal() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("e2e4")]);
    let mut session = session(&gateway);

    let err = session.attempt_move(uci("e2e5")).await.unwrap_err();
    assert_eq!(err, SessionError::IllegalMove("e2e5".to_string()));
    assert_eq!(gateway.calls(), vec![Call::Legal]);
}

#[tokio::test]
async fn manual_moves_refused_while_bot_moves() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.hold_autoplay.store(true, Ordering::SeqCst);
    gateway.honour_cancel.store(true, Ordering::SeqCst);
    let mut session = session(&gateway);

    session.set_autonomous(Side::White).await;
    assert_eq!(
        session.attempt_move(uci("e2e4")).await,
        Err(SessionError::NotYourTurn)
    );
    session.set_manual(Side::White).await;
    session.settle().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
}

#[tokio::test]
async fn success_after_cancel_is_recorded() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.hold_autoplay.store(true, Ordering::SeqCst);
    gateway.queue_autoplay([pawn_push("d2d4")]);
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.set_autonomous(Side::White).await;
    session.set_manual(Side::White).await;
    assert_eq!(gateway.cancels.load(Ordering::SeqCst), 1);

    // The gateway ignores the cancel and completes the move anyway.
    gateway.release.notify_one();
    session.settle().await.unwrap();

    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
    assert_eq!(session.presentation().snapshot(), gateway.board());
    assert_eq!(session.view().plies, 1);
    let events = drain_events(&mut events);
    assert!(events.contains(&SessionEvent::MovePlayed {
        mv: pawn_push("d2d4"),
        san: "d4".to_string(),
        side: Side::White,
        autonomous: true,
        placement: gateway.board().placement(),
    }));
}

#[tokio::test]
async fn move_finished_before_takeover_is_kept() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("e7e5")]);
    gateway.queue_autoplay([pawn_push("e2e4")]);
    let mut session = session(&gateway);

    session.set_autonomous(Side::White).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.set_manual(Side::White).await;
    assert_eq!(gateway.cancels.load(Ordering::SeqCst), 0);

    session.attempt_move(uci("e7e5")).await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
    assert_eq!(session.presentation().snapshot(), gateway.board());
    assert_eq!(
        gateway.calls(),
        vec![Call::Autoplay, Call::Legal, Call::Manual(pawn_push("e7e5"))]
    );
}

#[tokio::test]
async fn end_game_cancels_bot_and_stays_over() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.hold_autoplay.store(true, Ordering::SeqCst);
    gateway.queue_autoplay([pawn_push("d2d4")]);
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.set_autonomous(Side::White).await;
    session.end_game("White resigns").await;
    assert_eq!(gateway.cancels.load(Ordering::SeqCst), 1);

    gateway.release.notify_one();
    session.settle().await.unwrap();

    let over = ActiveParty::GameOver("White resigns".to_string());
    assert_eq!(session.party(), &over);
    assert_eq!(session.presentation().snapshot(), gateway.board());
    let events = drain_events(&mut events);
    let endings = events
        .iter()
        .filter(|event| matches!(event, SessionEvent::GameOver { .. }))
        .count();
    assert_eq!(endings, 1);
    assert!(!events[1..]
        .iter()
        .any(|event| matches!(event, SessionEvent::TurnChanged { .. })));
}

#[tokio::test]
async fn unasked_cancellation_stalls_and_resumes() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.cancel_seen.store(true, Ordering::SeqCst);
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.set_autonomous(Side::White).await;
    assert!(session.settle().await.is_err());
    assert_eq!(session.party(), &ActiveParty::Autonomous(Side::White));
    assert!(drain_events(&mut events)
        .iter()
        .any(|event| matches!(event, SessionEvent::AutoplayStalled { side: Side::White, .. })));

    gateway.queue_autoplay([pawn_push("e2e4")]);
    session.resume().await;
    session.settle().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
}

#[tokio::test]
async fn cancelled_request_is_drained_before_next() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.hold_autoplay.store(true, Ordering::SeqCst);
    gateway.honour_cancel.store(true, Ordering::SeqCst);
    let mut session = session(&gateway);

    session.toggle_autonomy(Side::White).await;
    session.toggle_autonomy(Side::White).await;
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));

    gateway.hold_autoplay.store(false, Ordering::SeqCst);
    gateway.queue_autoplay([pawn_push("c2c4")]);
    session.toggle_autonomy(Side::White).await;
    session.settle().await.unwrap();

    assert_eq!(gateway.calls(), vec![Call::Autoplay, Call::Autoplay]);
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
    assert!(!gateway.overlapped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_autoplay_stalls_and_resumes() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.set_autonomous(Side::White).await;
    let err = session.settle().await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Engine(EngineError::Unavailable(_))
    ));
    assert_eq!(session.party(), &ActiveParty::Autonomous(Side::White));
    assert!(drain_events(&mut events)
        .iter()
        .any(|event| matches!(event, SessionEvent::AutoplayStalled { side: Side::White, .. })));

    gateway.queue_autoplay([pawn_push("e2e4")]);
    session.resume().await;
    session.settle().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
}

#[tokio::test]
async fn engine_reported_end_is_terminal_until_restart() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("f2f3")]);
    gateway.queue_status(GameStatus::Finished("White wins by checkmate".to_string()));
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.set_autonomous(Side::Black).await;
    session.attempt_move(uci("f2f3")).await.unwrap();
    let over = ActiveParty::GameOver("White wins by checkmate".to_string());
    assert_eq!(session.party(), &over);
    assert_eq!(
        drain_events(&mut events).last(),
        Some(&SessionEvent::GameOver {
            message: "White wins by checkmate".to_string()
        })
    );
    assert!(!gateway.calls().contains(&Call::Autoplay));

    session.toggle_autonomy(Side::White).await;
    session.end_game("resigned").await;
    assert_eq!(session.party(), &over);
    assert_eq!(
        session.attempt_move(uci("f2f3")).await,
        Err(SessionError::GameOver("White wins by checkmate".to_string()))
    );

    session.request_restart().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::White));
    assert_eq!(session.view().black, AutonomyFlag::Off);
    assert_eq!(session.view().plies, 0);
    assert_eq!(session.presentation().snapshot(), BoardSnapshot::initial());
    assert_eq!(gateway.calls().last(), Some(&Call::Restart));
    let events = drain_events(&mut events);
    assert_eq!(events.first(), Some(&SessionEvent::Restarted));
}

#[tokio::test]
async fn bot_takeover_withdraws_pending_promotion() {
    let board = BoardSnapshot::from_placement("4k3/P7/8/8/8/8/8/4K3", Side::White).unwrap();
    let gateway = Arc::new(ScriptedGateway::with_board(board));
    gateway.legal(promotions("a7a8", &PieceKind::PROMOTIONS));
    gateway.queue_autoplay([Move::new(
        uci("e1e2").from,
        uci("e1e2").to,
        MoveKind::Quiet(PieceKind::King),
    )]);
    let mut session = session(&gateway);
    let mut events = session.subscribe();

    session.attempt_move(uci("a7a8")).await.unwrap();
    session.set_autonomous(Side::White).await;

    let events = drain_events(&mut events);
    assert!(matches!(
        events.as_slice(),
        [
            SessionEvent::PromotionRequired { .. },
            SessionEvent::PromotionWithdrawn,
            SessionEvent::TurnChanged { .. },
        ]
    ));
    assert!(session.view().pending_promotion.is_empty());

    session.settle().await.unwrap();
    assert_eq!(session.party(), &ActiveParty::Manual(Side::Black));
    assert!(!gateway
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Manual(_))));
}

#[tokio::test]
async fn spawned_session_serves_handles() {
    let gateway = Arc::new(ScriptedGateway::with_board(BoardSnapshot::initial()));
    gateway.legal(vec![pawn_push("e2e4")]);
    gateway.queue_autoplay([pawn_push("e7e5")]);
    let config = SessionConfig {
        black_autonomous: true,
        ..SessionConfig::default()
    };
    let session = Session::new(Arc::clone(&gateway), &config);
    let mut events = session.subscribe();
    let handle = session.spawn();

    handle.attempt_move(uci("e2e4")).await.unwrap();

    let back_to_white = async {
        let mut moves = 0;
        loop {
            match events.recv().await.unwrap() {
                SessionEvent::MovePlayed { .. } => moves += 1,
                SessionEvent::TurnChanged {
                    party: ActiveParty::Manual(Side::White),
                } if moves == 2 => break,
                _ => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), back_to_white)
        .await
        .unwrap();

    let view = handle.view().await.unwrap();
    assert_eq!(view.plies, 2);
    assert_eq!(view.black, AutonomyFlag::On);
    assert_eq!(view.id, handle.id());
    assert_eq!(
        view.placement,
        "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR"
    );
}
