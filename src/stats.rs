//! Player statistics, achievements and the leaderboard
//!
//! Everything here is a projection of the game history log and the ledger.

use crate::catalog::{AchievementId, ACHIEVEMENTS};
use crate::common::types::{Identity, SessionId};
use crate::games::GameKind;
use crate::ledger::{RewardLedger, TransactionKind};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const STREAK_TARGET: u32 = 5;
const MULTIPLAYER_WIN_TARGET: u32 = 10;
const TOKEN_TARGET: f64 = 1000.0;
const OPPONENT_TARGET: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Won,
    Lost,
    Draw,
}

/// One finished session from one player's point of view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameHistoryEntry {
    pub id: String,
    pub session_id: SessionId,
    pub game_kind: GameKind,
    pub result: GameResult,
    pub player_score: u32,
    pub opponent_score: u32,
    pub opponent_name: String,
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
    pub is_multiplayer: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerStats {
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub draws: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub win_rate: f64,
    pub multiplayer_wins: u32,
    pub distinct_opponents: usize,
    pub total_score: u64,
    pub bets_won: u32,
    pub bets_lost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub identity: Identity,
    pub display_name: String,
    pub avatar: String,
    pub score: u64,
    pub level: u32,
    pub games_won: u32,
}

pub struct StatsAggregator {
    /// Oldest first
    history: DashMap<Identity, Vec<GameHistoryEntry>>,
    recorded: DashSet<(Identity, SessionId)>,
    seeded: DashMap<Identity, LeaderboardEntry>,
    ledger: Arc<RewardLedger>,
}

impl StatsAggregator {
    pub fn new(ledger: Arc<RewardLedger>) -> Self {
        Self {
            history: DashMap::new(),
            recorded: DashSet::new(),
            seeded: DashMap::new(),
            ledger,
        }
    }

    /// Append a history entry. A session is recorded at most once per player;
    /// returns false for a repeat.
    pub fn record(&self, identity: &Identity, entry: GameHistoryEntry) -> bool {
        if !self.recorded.insert((identity.clone(), entry.session_id.clone())) {
            debug!(%identity, session_id = %entry.session_id, "History entry already recorded");
            return false;
        }
        debug!(%identity, session_id = %entry.session_id, result = ?entry.result, "History recorded");
        self.history.entry(identity.clone()).or_default().push(entry);
        true
    }

    /// Game history, newest first
    pub fn history(&self, identity: &Identity) -> Vec<GameHistoryEntry> {
        self.history
            .get(identity)
            .map(|h| h.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self, identity: &Identity) -> PlayerStats {
        let mut stats = PlayerStats::default();
        if let Some(history) = self.history.get(identity) {
            let mut opponents = HashSet::new();
            for entry in history.iter() {
                stats.games_played += 1;
                stats.total_score += entry.player_score as u64;
                match entry.result {
                    GameResult::Won => {
                        stats.games_won += 1;
                        stats.current_streak += 1;
                        stats.best_streak = stats.best_streak.max(stats.current_streak);
                        if entry.is_multiplayer {
                            stats.multiplayer_wins += 1;
                        }
                    }
                    GameResult::Lost => {
                        stats.games_lost += 1;
                        stats.current_streak = 0;
                    }
                    GameResult::Draw => {
                        stats.draws += 1;
                        stats.current_streak = 0;
                    }
                }
                if entry.is_multiplayer {
                    opponents.insert(entry.opponent_name.as_str());
                }
            }
            stats.distinct_opponents = opponents.len();
            stats.win_rate = stats.games_won as f64 / stats.games_played as f64;
        }

        for tx in self.ledger.transactions(identity) {
            match tx.kind {
                TransactionKind::BetWin => stats.bets_won += 1,
                TransactionKind::BetLose => stats.bets_lost += 1,
                _ => {}
            }
        }
        stats
    }

    /// Unlocked achievements, in catalog order
    pub fn achievements(&self, identity: &Identity) -> Vec<AchievementId> {
        let stats = self.stats(identity);
        let earned = self
            .ledger
            .wallet(identity)
            .map(|w| w.total_earned)
            .unwrap_or(0.0);

        ACHIEVEMENTS
            .iter()
            .map(|def| def.id)
            .filter(|id| match id {
                AchievementId::FirstWin => stats.games_won >= 1,
                AchievementId::WinStreak5 => stats.best_streak >= STREAK_TARGET,
                AchievementId::MultiplayerMaster => stats.multiplayer_wins >= MULTIPLAYER_WIN_TARGET,
                AchievementId::TokenCollector => earned >= TOKEN_TARGET,
                AchievementId::SocialPlayer => stats.distinct_opponents >= OPPONENT_TARGET,
            })
            .collect()
    }

    /// Entries shown before live results exist; a live entry for the same
    /// identity replaces its seed
    pub fn seed_leaderboard(&self, entries: impl IntoIterator<Item = LeaderboardEntry>) {
        for entry in entries {
            self.seeded.insert(entry.identity.clone(), entry);
        }
    }

    /// Ordered by score, then games won, then display name
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let live: Vec<LeaderboardEntry> = self
            .history
            .iter()
            .map(|entry| {
                let identity = entry.key().clone();
                let score = entry.iter().map(|h| h.player_score as u64).sum();
                let games_won = entry.iter().filter(|h| h.result == GameResult::Won).count() as u32;
                let (display_name, avatar, level) = match self.ledger.wallet(&identity) {
                    Some(w) => (w.display_name, w.avatar, w.level),
                    None => (identity.to_string(), String::new(), 1),
                };
                LeaderboardEntry {
                    identity,
                    display_name,
                    avatar,
                    score,
                    level,
                    games_won,
                }
            })
            .collect();

        let mut board: Vec<LeaderboardEntry> = self
            .seeded
            .iter()
            .filter(|seed| !live.iter().any(|l| l.identity == *seed.key()))
            .map(|seed| seed.value().clone())
            .collect();
        board.extend(live);
        board.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.games_won.cmp(&a.games_won))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        board.truncate(limit);
        board
    }
}
