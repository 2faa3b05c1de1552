//! Static platform metadata
//!
//! Display-only information about the games, achievement definitions and the
//! demo wallets and rooms a fresh platform is seeded with. Nothing here feeds
//! into the game rules.

use crate::common::types::{Identity, WalletProfile};
use crate::games::GameKind;
use crate::rooms::RoomStatus;
use crate::stats::LeaderboardEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Game catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameInfo {
    pub kind: GameKind,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    /// Advertised reward range in base units
    pub reward_range: (u32, u32),
}

pub fn game_catalog() -> Vec<GameInfo> {
    GameKind::ALL.iter().map(|kind| game_info(*kind)).collect()
}

pub fn game_info(kind: GameKind) -> GameInfo {
    let (name, description, difficulty, reward_range) = match kind {
        GameKind::GridCapture => ("Tic Tac Toe", "Classic 3x3 grid strategy game", Difficulty::Easy, (10, 30)),
        GameKind::PairMatch => ("Memory Match", "Match pairs of cards in sequence", Difficulty::Medium, (25, 75)),
        GameKind::Combat => ("Strategy Battle", "Turn-based tactical combat game", Difficulty::Hard, (50, 150)),
    };
    GameInfo {
        kind,
        name: name.to_string(),
        description: description.to_string(),
        difficulty,
        reward_range,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstWin,
    #[serde(rename = "win_streak_5")]
    WinStreak5,
    MultiplayerMaster,
    TokenCollector,
    SocialPlayer,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

pub const ACHIEVEMENTS: [AchievementDef; 5] = [
    AchievementDef {
        id: AchievementId::FirstWin,
        name: "First Victory",
        description: "Win your first game",
        icon: "🏆",
    },
    AchievementDef {
        id: AchievementId::WinStreak5,
        name: "Hot Streak",
        description: "Win 5 games in a row",
        icon: "🔥",
    },
    AchievementDef {
        id: AchievementId::MultiplayerMaster,
        name: "Multiplayer Master",
        description: "Win 10 multiplayer games",
        icon: "👑",
    },
    AchievementDef {
        id: AchievementId::TokenCollector,
        name: "Token Collector",
        description: "Earn 1000 JUP tokens",
        icon: "💰",
    },
    AchievementDef {
        id: AchievementId::SocialPlayer,
        name: "Social Player",
        description: "Play with 5 different friends",
        icon: "🤝",
    },
];

const DEMO_WALLETS: [(&str, &str, &str); 6] = [
    ("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU", "AliceGamer", "🚀"),
    ("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM", "BobPlayer", "🌟"),
    ("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1", "CharlieWin", "💎"),
    ("BUGuuhPsHpk8YZrL2GctsCtXGneL1gmT5zYb7eMHZDWf", "DianaChamp", "👑"),
    ("3NC2FQpqXwvgXWjd9HfxQsQ8DveLQpnLMwcxvQMfcXRD", "EveStrategist", "⚡"),
    ("8YHFGnO4vwvgXWjd9HfxQsQ8DveLQpnLMwcxvQMfcXRD", "FrankMaster", "🎯"),
];

pub const DEMO_STARTING_BALANCE: f64 = 100.0;

/// Profiles the demo wallet provider hands out
pub fn demo_wallets() -> Vec<WalletProfile> {
    DEMO_WALLETS
        .iter()
        .map(|(address, name, avatar)| WalletProfile {
            identity: Identity::from(*address),
            display_name: name.to_string(),
            avatar: avatar.to_string(),
            base_balance: DEMO_STARTING_BALANCE,
        })
        .collect()
}

/// Leaderboard entries that exist before anyone plays
pub fn leaderboard_seed() -> Vec<LeaderboardEntry> {
    let seeded = [(0, 2450, 15, 89), (1, 1890, 12, 67), (2, 3200, 22, 124), (3, 2100, 18, 95)];
    let wallets = demo_wallets();
    seeded
        .iter()
        .map(|&(index, score, level, games_won)| {
            let wallet = &wallets[index];
            LeaderboardEntry {
                identity: wallet.identity.clone(),
                display_name: wallet.display_name.clone(),
                avatar: wallet.avatar.clone(),
                score,
                level,
                games_won,
            }
        })
        .collect()
}

/// A seat in a seeded room: index into the available demo wallets and the
/// displayed starting score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSeat {
    pub wallet: usize,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoRoom {
    pub id: &'static str,
    pub kind: GameKind,
    pub wager: f64,
    pub status: RoomStatus,
    pub seats: [Option<DemoSeat>; 2],
}

/// Rooms a fresh lobby shows: two open rooms hosted by simulated players and
/// three background matches
pub fn demo_rooms() -> Vec<DemoRoom> {
    let seat = |wallet, score| Some(DemoSeat { wallet, score });
    vec![
        DemoRoom {
            id: "room_001",
            kind: GameKind::GridCapture,
            wager: 15.0,
            status: RoomStatus::Waiting,
            seats: [seat(0, 0), None],
        },
        DemoRoom {
            id: "room_002",
            kind: GameKind::PairMatch,
            wager: 25.0,
            status: RoomStatus::Waiting,
            seats: [seat(1, 0), None],
        },
        DemoRoom {
            id: "room_003",
            kind: GameKind::Combat,
            wager: 30.0,
            status: RoomStatus::Playing,
            seats: [seat(2, 85), seat(3, 92)],
        },
        DemoRoom {
            id: "live_001",
            kind: GameKind::GridCapture,
            wager: 20.0,
            status: RoomStatus::Playing,
            seats: [seat(4, 2), seat(5, 1)],
        },
        DemoRoom {
            id: "live_002",
            kind: GameKind::PairMatch,
            wager: 35.0,
            status: RoomStatus::Playing,
            seats: [seat(2, 56), seat(3, 34)],
        },
    ]
}
