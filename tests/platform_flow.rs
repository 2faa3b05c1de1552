//! End-to-end flows through the platform: solo games, rooms, rewards and
//! spectating, driven with paused tokio time.

use arcadium::{
    catalog::demo_wallets,
    games::{pairs::PairBoard, MoveSource, SessionSnapshot},
    ArcadiumConfig, ArcadiumError, Currency, GameKind, GameResult, Identity, LedgerError, Move,
    OpponentSpec, Platform, PlatformEvent, RoomError, RoomStatus, TransactionKind, TransactionStatus,
    WalletProfile,
};
use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Computer seat that plays a fixed list of moves
struct Scripted(Mutex<VecDeque<Move>>);

impl Scripted {
    fn new(moves: impl IntoIterator<Item = Move>) -> Arc<dyn MoveSource> {
        Arc::new(Self(Mutex::new(moves.into_iter().collect())))
    }
}

#[async_trait]
impl MoveSource for Scripted {
    async fn next_move(&self, _snapshot: &SessionSnapshot, _seat: usize) -> Option<Move> {
        self.0.lock().unwrap().pop_front()
    }
}

fn profile(id: &str, balance: f64) -> WalletProfile {
    WalletProfile {
        identity: Identity::from(id),
        display_name: id.to_string(),
        avatar: "🚀".to_string(),
        base_balance: balance,
    }
}

fn claims(cells: &[usize]) -> Vec<Move> {
    cells.iter().map(|&cell| Move::Claim { cell }).collect()
}

async fn platform_with(opponent: Option<Arc<dyn MoveSource>>) -> Arc<Platform> {
    let mut builder = Platform::builder().with_config(ArcadiumConfig::default());
    if let Some(opponent) = opponent {
        builder = builder.with_opponent(opponent);
    }
    builder.build().await.unwrap()
}

/// Sleep in small steps until `done` holds
async fn wait_until(mut done: impl FnMut() -> bool) {
    timeout(Duration::from_secs(60), async {
        while !done() {
            sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn grid_win_credits_reward_and_history() {
    let platform = platform_with(Some(Scripted::new(claims(&[1, 2])))).await;
    let mut events = platform.subscribe();
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let session = platform.start_solo(&me, GameKind::GridCapture, None).unwrap().session_id;

    for cell in [0, 4] {
        platform.play_move(&me, &session, Move::Claim { cell }).unwrap();
        wait_until(|| platform.snapshot(&session).map(|s| s.turn_owner == 0).unwrap_or(false)).await;
    }
    let result = platform.play_move(&me, &session, Move::Claim { cell: 8 }).unwrap();
    let outcome = result.outcome.unwrap();
    assert_eq!(outcome.winner_seat, Some(0));
    assert_eq!(outcome.score_per_seat, vec![100, 0]);

    let PlatformEvent::SessionCompleted(report) = events.recv().await.unwrap();
    assert_eq!(report.session_id, session);
    assert_eq!(report.entries.len(), 1);

    let wallet = platform.ledger().wallet(&me).unwrap();
    assert_eq!(wallet.base_balance, 150.0);
    assert_eq!(wallet.pending_rewards, 50.0);
    assert_eq!(wallet.experience, 100);

    let history = platform.stats().history(&me);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, GameResult::Won);
    assert_eq!((history[0].player_score, history[0].opponent_score), (100, 0));
    assert_eq!(history[0].reward, 50.0);
    assert!(!platform.is_tracking(&session));
    assert!(platform.snapshot(&session).is_err());
}

#[tokio::test(start_paused = true)]
async fn computer_win_is_completed_by_the_consumer() {
    let platform = platform_with(Some(Scripted::new(claims(&[3, 4, 5])))).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let session = platform.start_solo(&me, GameKind::GridCapture, None).unwrap().session_id;

    for cell in [0, 1] {
        platform.play_move(&me, &session, Move::Claim { cell }).unwrap();
        wait_until(|| platform.snapshot(&session).map(|s| s.turn_owner == 0).unwrap_or(false)).await;
    }
    platform.play_move(&me, &session, Move::Claim { cell: 8 }).unwrap();
    wait_until(|| !platform.is_tracking(&session)).await;

    let history = platform.stats().history(&me);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].result, GameResult::Lost);
    assert_eq!((history[0].player_score, history[0].opponent_score), (0, 100));
    assert_eq!(history[0].opponent_name, "AI Bot 1");
    assert_eq!(platform.ledger().base_balance(&me), Some(100.0));
    assert!(platform.ledger().transactions(&me).is_empty());
}

#[tokio::test(start_paused = true)]
async fn seeded_pairs_in_ten_compares_scores_150() {
    let platform = platform_with(None).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let seed = 2024;
    let session = platform.start_solo(&me, GameKind::PairMatch, Some(seed)).unwrap().session_id;

    let layout = PairBoard::shuffled(&mut StdRng::seed_from_u64(seed), 1).layout();
    let mut by_symbol: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (position, symbol) in layout.iter().enumerate() {
        by_symbol.entry(*symbol).or_default().push(position);
    }
    let pairs: Vec<Vec<usize>> = by_symbol.into_values().collect();

    let mut compares = vec![(pairs[0][0], pairs[1][0]), (pairs[2][0], pairs[3][0])];
    compares.extend(pairs.iter().map(|p| (p[0], p[1])));
    assert_eq!(compares.len(), 10);

    for (first, second) in compares {
        platform.play_move(&me, &session, Move::Reveal { position: first }).unwrap();
        let result = platform.play_move(&me, &session, Move::Reveal { position: second }).unwrap();
        assert!(result.awaiting_settle);
        wait_until(|| {
            !platform.is_tracking(&session)
                || platform.snapshot(&session).map(|s| !s.awaiting_settle).unwrap_or(true)
        })
        .await;
    }

    wait_until(|| !platform.is_tracking(&session)).await;
    let history = platform.stats().history(&me);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].player_score, 150);
    assert_eq!(history[0].opponent_name, "Solo");
    assert_eq!(platform.ledger().base_balance(&me), Some(175.0));
}

#[tokio::test(start_paused = true)]
async fn solo_pairs_on_the_score_floor_is_a_loss() {
    let platform = platform_with(None).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let seed = 7;
    let session = platform.start_solo(&me, GameKind::PairMatch, Some(seed)).unwrap().session_id;

    let layout = PairBoard::shuffled(&mut StdRng::seed_from_u64(seed), 1).layout();
    let mut by_symbol: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (position, symbol) in layout.iter().enumerate() {
        by_symbol.entry(*symbol).or_default().push(position);
    }
    let pairs: Vec<Vec<usize>> = by_symbol.into_values().collect();

    let mut compares = vec![(pairs[0][0], pairs[1][0]); 30];
    compares.extend(pairs.iter().map(|p| (p[0], p[1])));

    for (first, second) in compares {
        platform.play_move(&me, &session, Move::Reveal { position: first }).unwrap();
        platform.play_move(&me, &session, Move::Reveal { position: second }).unwrap();
        wait_until(|| {
            !platform.is_tracking(&session)
                || platform.snapshot(&session).map(|s| !s.awaiting_settle).unwrap_or(true)
        })
        .await;
    }

    wait_until(|| !platform.is_tracking(&session)).await;
    let history = platform.stats().history(&me);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].player_score, 50);
    assert_eq!(history[0].result, GameResult::Lost);
    assert_eq!(history[0].reward, 25.0);

    let stats = platform.stats().stats(&me);
    assert_eq!((stats.games_won, stats.games_lost), (0, 1));
    assert_eq!(stats.current_streak, 0);
    assert!(platform.stats().achievements(&me).is_empty());
}

#[tokio::test]
async fn join_with_insufficient_funds_leaves_room_waiting() {
    let platform = platform_with(None).await;
    let host = platform.connect(&profile("host", 100.0)).identity;
    let poor = platform.connect(&profile("poor", 10.0)).identity;
    let room = platform
        .create_room(&host, GameKind::GridCapture, 15.0, OpponentSpec::Open)
        .unwrap();

    match platform.join_room(&poor, &room.id, 15.0) {
        Err(ArcadiumError::Room(RoomError::InsufficientFunds { wager, balance })) => {
            assert_eq!((wager, balance), (15.0, 10.0));
        }
        other => panic!("expected insufficient funds, got {:?}", other.map(|r| r.status)),
    }
    let room = platform.rooms().room(&room.id).unwrap();
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.seats[1].is_none());
}

#[tokio::test]
async fn reward_and_conversion_arithmetic() {
    let platform = platform_with(None).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;

    let earn = platform.ledger().credit_reward(&me, 100).unwrap();
    assert_eq!(earn.kind, TransactionKind::Earn);
    assert_eq!(earn.amount, 50.0);
    assert_eq!(earn.currency, "JUP");
    assert_eq!(platform.ledger().wallet(&me).unwrap().pending_rewards, 50.0);

    let convert = platform
        .ledger()
        .convert(&me, Currency::Jup, Currency::Sol, 100.0)
        .unwrap();
    assert_eq!(convert.kind, TransactionKind::Convert);
    let wallet = platform.ledger().wallet(&me).unwrap();
    assert_eq!(wallet.base_balance, 50.0);
    let sol_before = 150.0 * 0.0045;
    let credited = 100.0 * 1.0 / 0.0045;
    assert!((wallet.balance(Currency::Sol) - (sol_before + credited)).abs() < 1e-6);
    assert!((credited - 22_222.222_222).abs() < 1e-3);

    assert_eq!(
        platform.ledger().convert(&me, Currency::Jup, Currency::Sol, 1_000.0),
        Err(LedgerError::InvalidAmount(1_000.0))
    );
}

#[tokio::test(start_paused = true)]
async fn room_match_settles_wager_and_finishes_room() {
    let platform = platform_with(Some(Scripted::new(claims(&[3, 4])))).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let room = platform
        .create_room(&me, GameKind::GridCapture, 10.0, OpponentSpec::Computer)
        .unwrap();
    let session = room.session.clone().unwrap();
    let mut watcher = platform.rooms().subscribe(&room.id).unwrap();

    for cell in [0, 1] {
        platform.play_move(&me, &session, Move::Claim { cell }).unwrap();
        wait_until(|| platform.snapshot(&session).map(|s| s.turn_owner == 0).unwrap_or(false)).await;
    }
    platform.play_move(&me, &session, Move::Claim { cell: 2 }).unwrap();

    let finished = watcher
        .wait_for(|r| r.status == RoomStatus::Finished)
        .await
        .unwrap()
        .clone();
    assert_eq!(finished.winner, Some(me.clone()));
    assert_eq!(finished.scores(), vec![100, 0]);

    // 100 + 50 reward + 10 wager
    assert_eq!(platform.ledger().base_balance(&me), Some(160.0));
    let stats = platform.stats().stats(&me);
    assert_eq!(stats.bets_won, 1);
    assert_eq!(stats.multiplayer_wins, 1);
    assert!(platform.stats().history(&me)[0].is_multiplayer);
    assert_eq!(platform.metrics().snapshot().rooms_finished, 1);
}

#[tokio::test(start_paused = true)]
async fn lost_wager_the_wallet_cannot_cover_is_recorded_as_failed() {
    let platform = platform_with(Some(Scripted::new(claims(&[3, 4, 5])))).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let room = platform
        .create_room(&me, GameKind::GridCapture, 100.0, OpponentSpec::Computer)
        .unwrap();
    let session = room.session.clone().unwrap();
    let mut watcher = platform.rooms().subscribe(&room.id).unwrap();

    platform.ledger().convert(&me, Currency::Jup, Currency::Usdc, 100.0).unwrap();
    for cell in [0, 1] {
        platform.play_move(&me, &session, Move::Claim { cell }).unwrap();
        wait_until(|| platform.snapshot(&session).map(|s| s.turn_owner == 0).unwrap_or(false)).await;
    }
    platform.play_move(&me, &session, Move::Claim { cell: 8 }).unwrap();

    let finished = watcher
        .wait_for(|r| r.status == RoomStatus::Finished)
        .await
        .unwrap()
        .clone();
    assert_ne!(finished.winner, Some(me.clone()));
    assert_eq!(platform.stats().history(&me)[0].result, GameResult::Lost);

    let txs = platform.ledger().transactions(&me);
    let kinds: Vec<_> = txs.iter().map(|tx| (tx.kind, tx.status)).collect();
    assert_eq!(
        kinds,
        vec![
            (TransactionKind::BetLose, TransactionStatus::Failed),
            (TransactionKind::Convert, TransactionStatus::Completed),
        ]
    );
    assert_eq!(txs[0].amount, 100.0);
    assert_eq!(platform.ledger().base_balance(&me), Some(0.0));
    assert_eq!(platform.stats().stats(&me).bets_lost, 1);
}

#[tokio::test(start_paused = true)]
async fn stale_computer_move_after_abandon_is_suppressed() {
    let platform = platform_with(Some(Scripted::new(claims(&[4])))).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let session = platform.start_solo(&me, GameKind::GridCapture, None).unwrap().session_id;

    platform.play_move(&me, &session, Move::Claim { cell: 0 }).unwrap();
    assert!(platform.scheduler().pending_action(&session).is_some());

    // End the session behind the scheduler's back; the ended flag must stop the fire
    assert!(platform.engine().abandon(&session));
    sleep(Duration::from_secs(5)).await;

    assert_eq!(platform.metrics().stale_actions_suppressed(), 1);
    assert_eq!(platform.scheduler().pending_count(), 0);
    assert!(platform.stats().history(&me).is_empty());
}

#[tokio::test(start_paused = true)]
async fn history_is_recorded_once_per_session() {
    let platform = platform_with(Some(Scripted::new(claims(&[3, 4])))).await;
    let mut events = platform.subscribe();
    let me = platform.connect(&profile("alice", 100.0)).identity;
    let session = platform.start_solo(&me, GameKind::GridCapture, None).unwrap().session_id;

    for cell in [0, 1] {
        platform.play_move(&me, &session, Move::Claim { cell }).unwrap();
        wait_until(|| platform.snapshot(&session).map(|s| s.turn_owner == 0).unwrap_or(false)).await;
    }
    platform.play_move(&me, &session, Move::Claim { cell: 2 }).unwrap();
    sleep(Duration::from_secs(10)).await;

    let PlatformEvent::SessionCompleted(report) = events.recv().await.unwrap();
    assert!(events.try_recv().is_err());

    let (identity, entry) = report.entries[0].clone();
    assert!(!platform.stats().record(&identity, entry));
    assert_eq!(platform.stats().history(&me).len(), 1);
    assert!(platform.play_move(&me, &session, Move::Claim { cell: 5 }).is_err());
}

#[tokio::test(start_paused = true)]
async fn spectator_never_finishes_engine_backed_rooms() {
    let platform = platform_with(None).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;
    platform.seed_demo_rooms(Some(&me));
    let room = platform
        .create_room(&me, GameKind::Combat, 10.0, OpponentSpec::Computer)
        .unwrap();

    let _mine = platform.spectate(&room.id).unwrap();
    assert_eq!(platform.spectator().watch_all_background(), 3);
    sleep(Duration::from_secs(3 * 300)).await;

    let mine = platform.rooms().room(&room.id).unwrap();
    assert_eq!(mine.status, RoomStatus::Playing);
    assert_eq!(mine.scores(), vec![0, 0]);
    assert!(platform.is_tracking(&room.session.unwrap()));

    for room in platform.rooms().rooms().into_iter().filter(|r| r.is_background()) {
        assert_eq!(room.status, RoomStatus::Finished);
        assert!(room.winner.is_some());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_fill_the_seat_once() {
    let platform = platform_with(None).await;
    let host = platform.connect(&profile("host", 100.0)).identity;
    let room = platform
        .create_room(&host, GameKind::PairMatch, 5.0, OpponentSpec::Open)
        .unwrap();

    let joins: Vec<_> = (0..8)
        .map(|i| {
            let platform = platform.clone();
            let room_id = room.id.clone();
            tokio::spawn(async move {
                let me = platform.connect(&profile(&format!("player{}", i), 50.0)).identity;
                platform.join_room(&me, &room_id, 5.0)
            })
        })
        .collect();

    let mut winners = 0;
    for join in futures::future::join_all(joins).await {
        match join.unwrap() {
            Ok(room) => {
                winners += 1;
                assert_eq!(room.status, RoomStatus::Playing);
            }
            Err(ArcadiumError::Room(RoomError::RoomUnavailable(_))) => {}
            Err(other) => panic!("unexpected error {}", other),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(platform.engine().active_sessions(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_credits_are_not_lost() {
    let platform = platform_with(None).await;
    let me = platform.connect(&profile("alice", 100.0)).identity;

    let credits: Vec<_> = (0..50)
        .map(|_| {
            let platform = platform.clone();
            let me = me.clone();
            tokio::spawn(async move { platform.ledger().credit_reward(&me, 20).unwrap() })
        })
        .collect();
    for credit in futures::future::join_all(credits).await {
        assert_eq!(credit.unwrap().amount, 10.0);
    }

    let wallet = platform.ledger().wallet(&me).unwrap();
    assert_eq!(wallet.base_balance, 100.0 + 50.0 * 10.0);
    assert_eq!(wallet.total_earned, 500.0);
    assert_eq!(platform.ledger().transactions(&me).len(), 50);
}

#[tokio::test]
async fn demo_wallet_joins_simulated_host() {
    let platform = platform_with(None).await;
    let me = platform.connect(&demo_wallets()[0]).identity;
    platform.seed_demo_rooms(Some(&me));

    let room = platform
        .join_room(&me, &arcadium::RoomId::from("room_002"), 20.0)
        .unwrap();
    let session = room.session.unwrap();
    assert!(platform.is_tracking(&session));
    assert_eq!(platform.snapshot(&session).unwrap().participants.len(), 2);
    assert!(platform.scheduler().pending_action(&session).is_some());
}
