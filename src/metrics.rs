//! Platform counters and metrics collection

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters shared by every component. A disabled instance
/// ignores every `record_*` call.
#[derive(Debug)]
pub struct PlatformMetrics {
    enabled: bool,
    start_time: Instant,
    sessions_started: AtomicU64,
    moves_applied: AtomicU64,
    sessions_finished: AtomicU64,
    sessions_abandoned: AtomicU64,
    stale_actions_suppressed: AtomicU64,
    rewards_credited: AtomicU64,
    rooms_finished: AtomicU64,
    display_ticks: AtomicU64,
}

impl PlatformMetrics {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            start_time: Instant::now(),
            sessions_started: AtomicU64::new(0),
            moves_applied: AtomicU64::new(0),
            sessions_finished: AtomicU64::new(0),
            sessions_abandoned: AtomicU64::new(0),
            stale_actions_suppressed: AtomicU64::new(0),
            rewards_credited: AtomicU64::new(0),
            rooms_finished: AtomicU64::new(0),
            display_ticks: AtomicU64::new(0),
        }
    }

    pub fn record_session_started(&self) {
        self.bump(&self.sessions_started);
    }

    pub fn record_move(&self) {
        self.bump(&self.moves_applied);
    }

    pub fn record_session_finished(&self) {
        self.bump(&self.sessions_finished);
    }

    pub fn record_session_abandoned(&self) {
        self.bump(&self.sessions_abandoned);
    }

    pub fn record_stale_action(&self) {
        self.bump(&self.stale_actions_suppressed);
    }

    pub fn record_reward(&self) {
        self.bump(&self.rewards_credited);
    }

    pub fn record_room_finished(&self) {
        self.bump(&self.rooms_finished);
    }

    pub fn record_display_tick(&self) {
        self.bump(&self.display_ticks);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.enabled {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn stale_actions_suppressed(&self) -> u64 {
        self.stale_actions_suppressed.load(Ordering::SeqCst)
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.total_runtime().as_secs(),
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            moves_applied: self.moves_applied.load(Ordering::SeqCst),
            sessions_finished: self.sessions_finished.load(Ordering::SeqCst),
            sessions_abandoned: self.sessions_abandoned.load(Ordering::SeqCst),
            stale_actions_suppressed: self.stale_actions_suppressed.load(Ordering::SeqCst),
            rewards_credited: self.rewards_credited.load(Ordering::SeqCst),
            rooms_finished: self.rooms_finished.load(Ordering::SeqCst),
            display_ticks: self.display_ticks.load(Ordering::SeqCst),
        }
    }
}

impl Default for PlatformMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub sessions_started: u64,
    pub moves_applied: u64,
    pub sessions_finished: u64,
    pub sessions_abandoned: u64,
    pub stale_actions_suppressed: u64,
    pub rewards_credited: u64,
    pub rooms_finished: u64,
    pub display_ticks: u64,
}

impl MetricsSnapshot {
    /// Share of started sessions that reached a terminal state
    pub fn completion_rate(&self) -> f64 {
        if self.sessions_started == 0 {
            return 0.0;
        }
        self.sessions_finished as f64 / self.sessions_started as f64
    }
}
