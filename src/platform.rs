//! Platform context
//!
//! Wires the engine, scheduler, rooms, ledger and stats together and owns the
//! per-session bookkeeping needed to turn a terminal outcome into rewards,
//! history and room results. Outcomes reached by a human move are completed
//! inline; outcomes reached by a scheduled computer move arrive through the
//! scheduler's event channel and are completed by a background consumer.

use crate::catalog::leaderboard_seed;
use crate::common::config::ConfigLoader;
use crate::common::types::{now, Identity, Player, RoomId, SessionId, WalletProfile};
use crate::config::ArcadiumConfig;
use crate::errors::{ArcadiumResult, GameError, LedgerError};
use crate::games::{
    pairs, ComputerOpponent, GameEngine, GameKind, Move, MoveResult, MoveSource, Outcome, SessionHandle,
    SessionSnapshot,
};
use crate::ledger::{RewardLedger, Wallet};
use crate::metrics::PlatformMetrics;
use crate::rooms::{OpponentSpec, Room, RoomOrchestrator};
use crate::scheduler::TurnScheduler;
use crate::spectator::SpectatorFeed;
use crate::stats::{GameHistoryEntry, GameResult, StatsAggregator};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 64;
const SOLO_OPPONENT: &str = "Solo";

/// Everything needed to settle a session once it reaches a terminal state
#[derive(Debug, Clone)]
struct SessionContext {
    kind: GameKind,
    room: Option<RoomId>,
    /// Seat and identity of every human participant
    humans: Vec<(usize, Identity)>,
    names: Vec<String>,
    wager: Option<f64>,
}

impl SessionContext {
    fn from_participants(kind: GameKind, participants: &[Player], room: Option<&Room>) -> Self {
        Self {
            kind,
            room: room.map(|r| r.id.clone()),
            humans: participants
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.is_computer)
                .map(|(seat, p)| (seat, p.identity.clone()))
                .collect(),
            names: participants.iter().map(|p| p.display_name.clone()).collect(),
            wager: room.map(|r| r.wager),
        }
    }

    fn seat_of(&self, identity: &Identity) -> Option<usize> {
        self.humans
            .iter()
            .find(|(_, id)| id == identity)
            .map(|(seat, _)| *seat)
    }

    fn opponent_name(&self, seat: usize) -> String {
        self.names
            .iter()
            .enumerate()
            .find(|(s, _)| *s != seat)
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| SOLO_OPPONENT.to_string())
    }
}

/// Per-session settlement summary
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub kind: GameKind,
    pub room: Option<RoomId>,
    pub outcome: Outcome,
    /// One history entry per human seat
    pub entries: Vec<(Identity, GameHistoryEntry)>,
}

#[derive(Debug, Clone)]
pub enum PlatformEvent {
    SessionCompleted(SessionReport),
}

pub struct Platform {
    config: ArcadiumConfig,
    metrics: Arc<PlatformMetrics>,
    engine: Arc<GameEngine>,
    scheduler: Arc<TurnScheduler>,
    rooms: Arc<RoomOrchestrator>,
    spectator: SpectatorFeed,
    ledger: Arc<RewardLedger>,
    stats: StatsAggregator,
    contexts: DashMap<SessionId, SessionContext>,
    events: broadcast::Sender<PlatformEvent>,
    consumer: OnceLock<JoinHandle<()>>,
}

impl Platform {
    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::new()
    }

    fn new(config: ArcadiumConfig, opponent: Arc<dyn MoveSource>) -> Self {
        let metrics = Arc::new(PlatformMetrics::with_enabled(config.monitoring.enable_metrics));
        let engine = Arc::new(GameEngine::with_metrics(metrics.clone()));
        let scheduler = Arc::new(TurnScheduler::new(
            engine.clone(),
            opponent,
            config.scheduler.clone(),
            metrics.clone(),
        ));
        let ledger = Arc::new(RewardLedger::with_metrics(config.ledger.clone(), metrics.clone()));
        let rooms = Arc::new(RoomOrchestrator::new(
            engine.clone(),
            scheduler.clone(),
            ledger.clone(),
            config.rooms.clone(),
            metrics.clone(),
        ));
        let spectator = SpectatorFeed::new(rooms.clone(), config.spectator.clone());
        let stats = StatsAggregator::new(ledger.clone());
        stats.seed_leaderboard(leaderboard_seed());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            config,
            metrics,
            engine,
            scheduler,
            rooms,
            spectator,
            ledger,
            stats,
            contexts: DashMap::new(),
            events,
            consumer: OnceLock::new(),
        }
    }

    /// Completes sessions that a scheduled computer move finished
    fn spawn_consumer(self: &Arc<Self>) {
        let mut turns = self.scheduler.subscribe();
        let weak: Weak<Platform> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match turns.recv().await {
                    Ok(event) => {
                        if !event.is_terminal() {
                            continue;
                        }
                        let Some(platform) = weak.upgrade() else { break };
                        platform.complete_session(event.session_id());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Turn events lagged, reconciling finished sessions");
                        let Some(platform) = weak.upgrade() else { break };
                        platform.reconcile();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Turn event consumer stopped");
        });
        if self.consumer.set(task).is_err() {
            warn!("Turn event consumer already running");
        }
    }

    /// Wallet provider connect; opening an existing wallet returns it unchanged
    pub fn connect(&self, profile: &WalletProfile) -> Wallet {
        self.ledger.open_wallet(profile)
    }

    /// Lobby demo rooms hosted by wallets other than `exclude`
    pub fn seed_demo_rooms(&self, exclude: Option<&Identity>) -> Vec<Room> {
        self.rooms.seed_demo_rooms(exclude)
    }

    /// Start a game against the computer. Pair-matching is played alone.
    pub fn start_solo(&self, identity: &Identity, kind: GameKind, seed: Option<u64>) -> ArcadiumResult<SessionSnapshot> {
        let profile = self.profile(identity)?;
        let mut participants = vec![Player::human(&profile)];
        if kind != GameKind::PairMatch {
            participants.push(Player::computer(
                self.config.rooms.computer_identity.as_str(),
                self.config.rooms.computer_name.as_str(),
                self.config.rooms.computer_avatar.as_str(),
            ));
        }

        let context = SessionContext::from_participants(kind, &participants, None);
        let handle = match seed {
            Some(seed) => self.engine.start_seeded(kind, participants, seed)?,
            None => self.engine.start(kind, participants)?,
        };
        info!(%identity, session_id = %handle.id, kind = %kind, "Solo game started");
        self.register(&handle, context);
        Ok(self.engine.snapshot(&handle.id)?)
    }

    pub fn create_room(
        &self,
        identity: &Identity,
        kind: GameKind,
        wager: f64,
        opponent: OpponentSpec,
    ) -> ArcadiumResult<Room> {
        let profile = self.profile(identity)?;
        let room = self.rooms.create_room(&profile, kind, wager, opponent)?;
        self.register_room(&room);
        Ok(room)
    }

    pub fn join_room(&self, identity: &Identity, room_id: &RoomId, wager: f64) -> ArcadiumResult<Room> {
        let profile = self.profile(identity)?;
        let room = self.rooms.join_room(room_id, &profile, wager)?;
        self.register_room(&room);
        Ok(room)
    }

    /// Apply a human move. A terminal move settles the session before returning.
    pub fn play_move(&self, identity: &Identity, session_id: &SessionId, mv: Move) -> ArcadiumResult<MoveResult> {
        let seat = self
            .contexts
            .get(session_id)
            .ok_or_else(|| GameError::SessionNotFound(session_id.clone()))?
            .seat_of(identity)
            .ok_or_else(|| GameError::IllegalMove(format!("{} has no seat in session {}", identity, session_id)))?;

        let result = self.engine.apply_move(session_id, seat, mv)?;
        if result.is_terminal() {
            self.complete_session(session_id);
        } else if let Some(handle) = self.engine.handle(session_id) {
            self.scheduler.drive(&handle);
        }
        Ok(result)
    }

    /// Drop an unfinished session. Its room, if any, finishes without a winner.
    pub fn abandon(&self, session_id: &SessionId) -> bool {
        self.scheduler.cancel(session_id);
        let abandoned = self.engine.abandon(session_id);
        if let Some((_, context)) = self.contexts.remove(session_id) {
            if let Some(room_id) = &context.room {
                let outcome = Outcome {
                    winner_seat: None,
                    score_per_seat: vec![0; context.names.len()],
                    is_draw: false,
                };
                if let Err(e) = self.rooms.finish(room_id, &outcome) {
                    warn!(room_id = %room_id, error = %e, "Could not close room of abandoned session");
                }
            }
        }
        abandoned
    }

    pub fn snapshot(&self, session_id: &SessionId) -> ArcadiumResult<SessionSnapshot> {
        Ok(self.engine.snapshot(session_id)?)
    }

    /// Follow a room; background rooms tick while watched
    pub fn spectate(&self, room_id: &RoomId) -> ArcadiumResult<WatchStream<Room>> {
        Ok(self.spectator.watch(room_id)?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }

    pub fn is_tracking(&self, session_id: &SessionId) -> bool {
        self.contexts.contains_key(session_id)
    }

    pub fn config(&self) -> &ArcadiumConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<GameEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<TurnScheduler> {
        &self.scheduler
    }

    pub fn rooms(&self) -> &Arc<RoomOrchestrator> {
        &self.rooms
    }

    pub fn spectator(&self) -> &SpectatorFeed {
        &self.spectator
    }

    pub fn ledger(&self) -> &Arc<RewardLedger> {
        &self.ledger
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn metrics(&self) -> &Arc<PlatformMetrics> {
        &self.metrics
    }

    /// Stop all timers and the event consumer
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.spectator.shutdown();
        if let Some(task) = self.consumer.get() {
            task.abort();
        }
        info!(tracked_sessions = self.contexts.len(), "Platform shut down");
    }

    fn profile(&self, identity: &Identity) -> Result<WalletProfile, LedgerError> {
        self.ledger
            .wallet(identity)
            .map(|w| WalletProfile {
                identity: w.identity,
                display_name: w.display_name,
                avatar: w.avatar,
                base_balance: w.base_balance,
            })
            .ok_or_else(|| LedgerError::WalletNotFound(identity.to_string()))
    }

    fn register_room(&self, room: &Room) {
        let Some(session_id) = &room.session else { return };
        let Some(handle) = self.engine.handle(session_id) else { return };
        let context = SessionContext::from_participants(room.kind, &room.participants(), Some(room));
        self.register(&handle, context);
    }

    fn register(&self, handle: &SessionHandle, context: SessionContext) {
        self.contexts.insert(handle.id.clone(), context);
        // A fast computer seat may already have finished the game.
        if self.engine.outcome(&handle.id).is_some() {
            self.complete_session(&handle.id);
        } else {
            self.scheduler.drive(handle);
        }
    }

    /// Settle every tracked session that already has an outcome
    fn reconcile(&self) {
        let finished: Vec<SessionId> = self
            .contexts
            .iter()
            .filter(|entry| self.engine.outcome(entry.key()).is_some())
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in finished {
            self.complete_session(&session_id);
        }
    }

    /// Credit rewards, record history, settle wagers and finish the room of a
    /// terminal session. Runs at most once per session.
    fn complete_session(&self, session_id: &SessionId) -> Option<SessionReport> {
        let outcome = self.engine.outcome(session_id)?;
        let (_, context) = self.contexts.remove(session_id)?;
        self.engine.close(session_id);

        let mut entries = Vec::with_capacity(context.humans.len());
        for (seat, identity) in &context.humans {
            let seat = *seat;
            let score = outcome.score_for(seat);
            let reward = if score > 0 {
                match self.ledger.credit_reward(identity, score) {
                    Ok(tx) => tx.amount,
                    Err(e) => {
                        warn!(%identity, error = %e, "Reward credit failed");
                        0.0
                    }
                }
            } else {
                0.0
            };

            let result = classify(&outcome, seat, context.names.len());

            let entry = GameHistoryEntry {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                game_kind: context.kind,
                result,
                player_score: score,
                opponent_score: outcome.opponent_score(seat),
                opponent_name: context.opponent_name(seat),
                reward,
                timestamp: now(),
                is_multiplayer: context.room.is_some(),
            };
            self.stats.record(identity, entry.clone());

            if let (Some(wager), false) = (context.wager, outcome.is_draw) {
                if let Err(e) = self.ledger.settle_wager(identity, wager, result == GameResult::Won) {
                    warn!(%identity, wager, error = %e, "Wager settlement failed");
                }
            }
            entries.push((identity.clone(), entry));
        }

        if let Some(room_id) = &context.room {
            if let Err(e) = self.rooms.finish(room_id, &outcome) {
                warn!(room_id = %room_id, error = %e, "Room finish failed");
            }
        }

        info!(
            session_id = %session_id,
            kind = %context.kind,
            winner = ?outcome.winner_seat,
            draw = outcome.is_draw,
            "Session completed"
        );
        let report = SessionReport {
            session_id: session_id.clone(),
            kind: context.kind,
            room: context.room,
            outcome,
            entries,
        };
        // Nobody listening is fine.
        let _ = self.events.send(PlatformEvent::SessionCompleted(report.clone()));
        Some(report)
    }
}

/// One-seat games have no opponent to beat; only a score above the
/// pair-matching floor counts as a win.
fn classify(outcome: &Outcome, seat: usize, seats: usize) -> GameResult {
    if outcome.is_draw {
        GameResult::Draw
    } else if seats == 1 {
        if outcome.score_for(seat) > pairs::MIN_SCORE {
            GameResult::Won
        } else {
            GameResult::Lost
        }
    } else if outcome.winner_seat == Some(seat) {
        GameResult::Won
    } else {
        GameResult::Lost
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        if let Some(task) = self.consumer.get() {
            task.abort();
        }
    }
}

/// Builder for a configured platform
pub struct PlatformBuilder {
    config_path: Option<PathBuf>,
    config: Option<ArcadiumConfig>,
    opponent: Option<Arc<dyn MoveSource>>,
}

impl PlatformBuilder {
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            opponent: None,
        }
    }

    /// Load configuration from a TOML file, with environment overrides
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use this configuration as-is; takes precedence over a config path
    pub fn with_config(mut self, config: ArcadiumConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the computer opponent (useful for testing)
    pub fn with_opponent(mut self, opponent: Arc<dyn MoveSource>) -> Self {
        self.opponent = Some(opponent);
        self
    }

    /// Build the platform and start its event consumer. Needs a tokio runtime.
    pub async fn build(self) -> ArcadiumResult<Arc<Platform>> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ConfigLoader::new().with_path(path).load()?,
            (None, None) => ArcadiumConfig::default(),
        };
        let opponent = self
            .opponent
            .unwrap_or_else(|| Arc::new(ComputerOpponent::new()));

        let platform = Arc::new(Platform::new(config, opponent));
        platform.spawn_consumer();
        info!("Platform ready");
        Ok(platform)
    }
}

impl Default for PlatformBuilder {
    fn default() -> Self {
        Self::new()
    }
}
