//! Arcadium - multiplayer mini-game platform core
//!
//! Game sessions for grid-capture, pair-matching and combat, timer-driven
//! computer opponents, rooms with spectators, a multi-currency reward ledger
//! and player statistics.

pub mod catalog;
pub mod common;
pub mod config;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod platform;
pub mod rooms;
pub mod scheduler;
pub mod spectator;
pub mod stats;

pub use common::types::{Currency, Identity, Player, RoomId, SessionId, WalletProfile};
pub use config::ArcadiumConfig;
pub use errors::{ArcadiumError, ArcadiumResult, GameError, LedgerError, RoomError};
pub use games::{GameEngine, GameKind, Move, MoveResult, Outcome, SessionSnapshot};
pub use ledger::{RewardLedger, Transaction, TransactionKind, TransactionStatus, Wallet};
pub use metrics::PlatformMetrics;
pub use platform::{Platform, PlatformBuilder, PlatformEvent, SessionReport};
pub use rooms::{OpponentSpec, Room, RoomOrchestrator, RoomStatus};
pub use scheduler::{TurnEvent, TurnScheduler};
pub use spectator::SpectatorFeed;
pub use stats::{GameHistoryEntry, GameResult, LeaderboardEntry, PlayerStats, StatsAggregator};
