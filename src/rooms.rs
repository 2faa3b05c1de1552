//! Room lifecycle and matchmaking
//!
//! Rooms move waiting → playing → finished and never back. Every mutation
//! happens under the room's map entry lock, so two concurrent joins cannot
//! both fill the open seat. Each room publishes its latest state on a watch
//! channel for spectators.

use crate::catalog::{demo_rooms, demo_wallets};
use crate::common::types::{now, Identity, Player, RoomId, SessionId, WalletProfile};
use crate::config::RoomConfig;
use crate::errors::RoomError;
use crate::games::{GameEngine, GameKind, Outcome, SessionHandle};
use crate::ledger::RewardLedger;
use crate::metrics::PlatformMetrics;
use crate::scheduler::TurnScheduler;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

pub const SEATS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

/// Who takes seat 1 when a room is created
#[derive(Debug, Clone, PartialEq)]
pub enum OpponentSpec {
    /// Leave the seat open for `join_room`
    Open,
    /// The configured computer opponent
    Computer,
    /// A known profile whose moves are driven locally
    Simulated(WalletProfile),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub kind: GameKind,
    pub wager: f64,
    pub seats: [Option<Player>; SEATS],
    pub status: RoomStatus,
    pub winner: Option<Identity>,
    /// Engine session backing the match, if any
    pub session: Option<SessionId>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    fn new(id: RoomId, kind: GameKind, wager: f64, seats: [Option<Player>; SEATS]) -> Self {
        Self {
            id,
            kind,
            wager,
            seats,
            status: RoomStatus::Waiting,
            winner: None,
            session: None,
            created_at: now(),
        }
    }

    pub fn host(&self) -> Option<&Player> {
        self.seats[0].as_ref()
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    /// Occupied seats in seat order
    pub fn participants(&self) -> Vec<Player> {
        self.seats.iter().flatten().cloned().collect()
    }

    /// Seat index and identity of every human seat
    pub fn human_seats(&self) -> Vec<(usize, Identity)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(seat, p)| p.as_ref().filter(|p| !p.is_computer).map(|p| (seat, p.identity.clone())))
            .collect()
    }

    /// A full room with only computer-driven seats and no engine session
    pub fn is_background(&self) -> bool {
        self.session.is_none() && self.is_full() && self.human_seats().is_empty()
    }

    pub fn scores(&self) -> Vec<u32> {
        self.seats.iter().map(|s| s.as_ref().map_or(0, |p| p.score)).collect()
    }
}

struct RoomEntry {
    room: Room,
    feed: watch::Sender<Room>,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        let (feed, _) = watch::channel(room.clone());
        Self { room, feed }
    }

    fn publish(&self) {
        self.feed.send_replace(self.room.clone());
    }

    fn finish(&mut self, outcome: &Outcome) {
        let room = &mut self.room;
        for (seat, score) in room.seats.iter_mut().zip(&outcome.score_per_seat) {
            if let Some(player) = seat {
                player.score = *score;
            }
        }
        room.winner = outcome
            .winner_seat
            .and_then(|seat| room.seats.get(seat))
            .and_then(|p| p.as_ref())
            .map(|p| p.identity.clone());
        room.status = RoomStatus::Finished;
        self.publish();
    }
}

pub struct RoomOrchestrator {
    rooms: DashMap<RoomId, RoomEntry>,
    by_session: DashMap<SessionId, RoomId>,
    engine: Arc<GameEngine>,
    scheduler: Arc<TurnScheduler>,
    ledger: Arc<RewardLedger>,
    config: RoomConfig,
    metrics: Arc<PlatformMetrics>,
}

impl RoomOrchestrator {
    pub fn new(
        engine: Arc<GameEngine>,
        scheduler: Arc<TurnScheduler>,
        ledger: Arc<RewardLedger>,
        config: RoomConfig,
        metrics: Arc<PlatformMetrics>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            by_session: DashMap::new(),
            engine,
            scheduler,
            ledger,
            config,
            metrics,
        }
    }

    /// Open a room with the creator in seat 0
    pub fn create_room(
        &self,
        creator: &WalletProfile,
        kind: GameKind,
        wager: f64,
        opponent: OpponentSpec,
    ) -> Result<Room, RoomError> {
        if !(wager.is_finite() && wager > 0.0) {
            return Err(RoomError::InvalidWager(wager));
        }
        if let Some(balance) = self.ledger.base_balance(&creator.identity) {
            if wager > balance {
                return Err(RoomError::InsufficientFunds { wager, balance });
            }
        }

        let guest = match opponent {
            OpponentSpec::Open => None,
            OpponentSpec::Computer => Some(Player::computer(
                self.config.computer_identity.as_str(),
                self.config.computer_name.as_str(),
                self.config.computer_avatar.as_str(),
            )),
            OpponentSpec::Simulated(profile) => {
                if profile.identity == creator.identity {
                    return Err(RoomError::SelfJoinForbidden(creator.identity.to_string()));
                }
                Some(Player::simulated(&profile))
            }
        };

        let mut room = Room::new(RoomId::generate(), kind, wager, [Some(Player::human(creator)), guest]);
        let handle = if room.is_full() {
            room.status = RoomStatus::Playing;
            self.start_session(&mut room)?
        } else {
            None
        };

        info!(
            room_id = %room.id,
            kind = %kind,
            wager,
            status = ?room.status,
            "Room created"
        );
        self.rooms.insert(room.id.clone(), RoomEntry::new(room.clone()));
        if let Some(handle) = handle {
            self.scheduler.drive(&handle);
        }
        Ok(room)
    }

    /// Take the open seat of a waiting room
    pub fn join_room(&self, room_id: &RoomId, joiner: &WalletProfile, wager: f64) -> Result<Room, RoomError> {
        if !(wager.is_finite() && wager > 0.0) {
            return Err(RoomError::InvalidWager(wager));
        }

        let mut entry = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if entry.room.status != RoomStatus::Waiting || entry.room.is_full() {
            return Err(RoomError::RoomUnavailable(room_id.clone()));
        }
        if entry.room.host().map(|p| &p.identity) == Some(&joiner.identity) {
            return Err(RoomError::SelfJoinForbidden(joiner.identity.to_string()));
        }
        let balance = self
            .ledger
            .base_balance(&joiner.identity)
            .unwrap_or(joiner.base_balance);
        if wager > balance {
            return Err(RoomError::InsufficientFunds { wager, balance });
        }

        let mut room = entry.room.clone();
        room.seats[1] = Some(Player::human(joiner));
        room.wager = wager;
        room.status = RoomStatus::Playing;
        let handle = self.start_session(&mut room)?;

        entry.room = room.clone();
        entry.publish();
        drop(entry);

        info!(room_id = %room_id, joiner = %joiner.identity, wager, "Room joined");
        if let Some(handle) = handle {
            self.scheduler.drive(&handle);
        }
        Ok(room)
    }

    /// Engine session for a room with at least one human seat
    fn start_session(&self, room: &mut Room) -> Result<Option<SessionHandle>, RoomError> {
        if room.human_seats().is_empty() {
            return Ok(None);
        }
        let handle = self.engine.start(room.kind, room.participants())?;
        room.session = Some(handle.id.clone());
        self.by_session.insert(handle.id.clone(), room.id.clone());
        Ok(Some(handle))
    }

    /// Record the result and close the room. Finishing twice is a no-op.
    pub fn finish(&self, room_id: &RoomId, outcome: &Outcome) -> Result<Room, RoomError> {
        let mut entry = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if entry.room.status == RoomStatus::Finished {
            return Ok(entry.room.clone());
        }

        entry.finish(outcome);
        let room = entry.room.clone();
        drop(entry);

        self.metrics.record_room_finished();
        info!(room_id = %room_id, winner = ?room.winner, "Room finished");
        if let Some(session) = &room.session {
            self.scheduler.cancel(session);
            self.by_session.remove(session);
        }
        Ok(room)
    }

    /// Add display points to a background room, finishing it the first time
    /// a seat passes `threshold`. Lower seats win ties.
    pub fn apply_display_tick(
        &self,
        room_id: &RoomId,
        increments: [u32; SEATS],
        threshold: u32,
    ) -> Result<Room, RoomError> {
        let mut entry = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;
        if entry.room.status != RoomStatus::Playing || !entry.room.is_background() {
            return Err(RoomError::RoomUnavailable(room_id.clone()));
        }

        for (seat, increment) in entry.room.seats.iter_mut().zip(increments) {
            if let Some(player) = seat {
                player.score += increment;
            }
        }
        self.metrics.record_display_tick();

        let scores = entry.room.scores();
        match scores.iter().position(|&score| score > threshold) {
            Some(seat) => {
                let outcome = Outcome {
                    winner_seat: Some(seat),
                    score_per_seat: scores,
                    is_draw: false,
                };
                entry.finish(&outcome);
                self.metrics.record_room_finished();
                info!(room_id = %room_id, winner_seat = seat, "Background room finished");
            }
            None => {
                entry.publish();
                debug!(room_id = %room_id, ?scores, "Display scores advanced");
            }
        }
        Ok(entry.room.clone())
    }

    /// Read-only stream of room snapshots, starting with the current one
    pub fn spectate(&self, room_id: &RoomId) -> Result<WatchStream<Room>, RoomError> {
        self.subscribe(room_id).map(WatchStream::new)
    }

    pub fn subscribe(&self, room_id: &RoomId) -> Result<watch::Receiver<Room>, RoomError> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.feed.subscribe())
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Room> {
        self.rooms.get(room_id).map(|entry| entry.room.clone())
    }

    /// All rooms, oldest first
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|entry| entry.room.clone()).collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rooms
    }

    pub fn rooms_by_status(&self, status: RoomStatus) -> Vec<Room> {
        self.rooms()
            .into_iter()
            .filter(|room| room.status == status)
            .collect()
    }

    pub fn session_for(&self, room_id: &RoomId) -> Option<SessionId> {
        self.rooms.get(room_id).and_then(|entry| entry.room.session.clone())
    }

    pub fn room_for_session(&self, session_id: &SessionId) -> Option<RoomId> {
        self.by_session.get(session_id).map(|id| id.value().clone())
    }

    /// Populate the lobby with the demo rooms, hosted by demo wallets other
    /// than `exclude`. Rooms that already exist are left alone.
    pub fn seed_demo_rooms(&self, exclude: Option<&Identity>) -> Vec<Room> {
        let available: Vec<WalletProfile> = demo_wallets()
            .into_iter()
            .filter(|w| Some(&w.identity) != exclude)
            .collect();
        if available.is_empty() {
            return Vec::new();
        }

        let mut seeded = Vec::new();
        for demo in demo_rooms() {
            let id = RoomId::from(demo.id);
            if self.rooms.contains_key(&id) {
                continue;
            }
            let seats = demo.seats.map(|seat| {
                seat.map(|s| Player {
                    score: s.score,
                    ..Player::simulated(&available[s.wallet % available.len()])
                })
            });
            let mut room = Room::new(id.clone(), demo.kind, demo.wager, seats);
            room.status = demo.status;
            self.rooms.insert(id, RoomEntry::new(room.clone()));
            seeded.push(room);
        }
        info!(rooms = seeded.len(), "Demo rooms seeded");
        seeded
    }
}
