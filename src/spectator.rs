//! Display-only score simulation for background rooms
//!
//! While a background room is watched, a ticker task adds small random
//! increments to both seats on every poll interval until one seat passes the
//! win threshold. Rooms backed by an engine session are streamed as they are;
//! the feed never writes to them.

use crate::common::types::RoomId;
use crate::config::SpectatorConfig;
use crate::errors::RoomError;
use crate::rooms::{Room, RoomOrchestrator, RoomStatus, SEATS};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct SpectatorFeed {
    rooms: Arc<RoomOrchestrator>,
    config: SpectatorConfig,
    /// A ticker's token is cancelled when it is stopped or its room finishes
    tickers: DashMap<RoomId, CancellationToken>,
    root: CancellationToken,
}

impl SpectatorFeed {
    pub fn new(rooms: Arc<RoomOrchestrator>, config: SpectatorConfig) -> Self {
        Self {
            rooms,
            config,
            tickers: DashMap::new(),
            root: CancellationToken::new(),
        }
    }

    /// Apply one random display tick to a background room
    pub fn tick(&self, room_id: &RoomId) -> Result<Room, RoomError> {
        let increments = roll_increments(&self.config);
        self.rooms
            .apply_display_tick(room_id, increments, self.config.win_threshold)
    }

    /// Stream a room's snapshots. Background rooms start ticking while watched.
    pub fn watch(&self, room_id: &RoomId) -> Result<WatchStream<Room>, RoomError> {
        let stream = self.rooms.spectate(room_id)?;
        let ticking = self
            .rooms
            .room(room_id)
            .map(|room| room.status == RoomStatus::Playing && room.is_background())
            .unwrap_or(false);
        if ticking {
            self.start_ticker(room_id);
        }
        Ok(stream)
    }

    /// Start tickers for every background room that is still playing.
    /// Returns how many are now running.
    pub fn watch_all_background(&self) -> usize {
        for room in self.rooms.rooms_by_status(RoomStatus::Playing) {
            if room.is_background() {
                self.start_ticker(&room.id);
            }
        }
        self.tickers.iter().filter(|t| !t.is_cancelled()).count()
    }

    pub fn is_ticking(&self, room_id: &RoomId) -> bool {
        self.tickers
            .get(room_id)
            .map(|t| !t.is_cancelled())
            .unwrap_or(false)
    }

    /// Stop ticking a room; its state stays where it is
    pub fn stop(&self, room_id: &RoomId) -> bool {
        match self.tickers.remove(room_id) {
            Some((_, token)) => {
                let running = !token.is_cancelled();
                token.cancel();
                running
            }
            None => false,
        }
    }

    /// Stop every ticker; no new ones start afterwards
    pub fn shutdown(&self) {
        if self.root.is_cancelled() {
            return;
        }
        self.root.cancel();
        let count = self.tickers.len();
        self.tickers.clear();
        if count > 0 {
            info!(tickers = count, "Spectator feed shut down");
        }
    }

    fn start_ticker(&self, room_id: &RoomId) {
        if self.root.is_cancelled() {
            return;
        }
        match self.tickers.entry(room_id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_cancelled() {
                    slot.insert(self.spawn_ticker(room_id.clone()));
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn_ticker(room_id.clone()));
            }
        }
    }

    fn spawn_ticker(&self, id: RoomId) -> CancellationToken {
        let rooms = Arc::clone(&self.rooms);
        let config = self.config.clone();
        let token = self.root.child_token();
        let cancel = token.clone();
        debug!(room_id = %id, "Ticker started");
        tokio::spawn(async move {
            let period = config.poll_interval();
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(room_id = %id, "Ticker cancelled");
                        break;
                    }
                    _ = ticks.tick() => {}
                }
                match rooms.apply_display_tick(&id, roll_increments(&config), config.win_threshold) {
                    Ok(room) if room.status == RoomStatus::Finished => {
                        debug!(room_id = %id, "Ticker finished with room");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(room_id = %id, error = %e, "Ticker stopped");
                        break;
                    }
                }
            }
            cancel.cancel();
        });
        token
    }
}

impl Drop for SpectatorFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn roll_increments(config: &SpectatorConfig) -> [u32; SEATS] {
    let mut rng = rand::thread_rng();
    [(); SEATS].map(|_| rng.gen_range(config.min_increment..=config.max_increment))
}
