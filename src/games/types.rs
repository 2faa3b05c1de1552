use crate::common::types::{Player, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Supported game kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GameKind {
    /// 3x3 grid capture
    GridCapture,
    /// Eight shuffled symbol pairs
    PairMatch,
    /// Health/energy duel
    Combat,
}

impl GameKind {
    pub const ALL: [GameKind; 3] = [GameKind::GridCapture, GameKind::PairMatch, GameKind::Combat];

    /// Participant counts accepted by `GameEngine::start`
    pub fn seat_range(&self) -> RangeInclusive<usize> {
        match self {
            GameKind::GridCapture | GameKind::Combat => 2..=2,
            GameKind::PairMatch => 1..=2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::GridCapture => "grid-capture",
            GameKind::PairMatch => "pair-match",
            GameKind::Combat => "combat",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grid-capture" | "tic-tac-toe" => Ok(GameKind::GridCapture),
            "pair-match" | "memory-match" => Ok(GameKind::PairMatch),
            "combat" | "strategy-battle" => Ok(GameKind::Combat),
            other => Err(format!("unknown game kind '{}'", other)),
        }
    }
}

/// Combat actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CombatAction {
    Attack,
    Defend,
    Charge,
}

/// A move submitted for the turn owner's seat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Move {
    /// Claim a grid cell (0..9, row-major)
    Claim { cell: usize },
    /// Turn a hidden card face-up (0..16)
    Reveal { position: usize },
    /// Take a combat action
    Combat { action: CombatAction },
}

impl Move {
    pub fn kind(&self) -> GameKind {
        match self {
            Move::Claim { .. } => GameKind::GridCapture,
            Move::Reveal { .. } => GameKind::PairMatch,
            Move::Combat { .. } => GameKind::Combat,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

/// Final result of a terminal session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub winner_seat: Option<usize>,
    pub score_per_seat: Vec<u32>,
    pub is_draw: bool,
}

impl Outcome {
    /// Winner takes the natural score, every other seat gets 0
    pub fn win(seat: usize, seats: usize, score: u32) -> Self {
        let mut score_per_seat = vec![0; seats];
        score_per_seat[seat] = score;
        Self {
            winner_seat: Some(seat),
            score_per_seat,
            is_draw: false,
        }
    }

    /// Every seat receives the draw score
    pub fn draw(seats: usize, score: u32) -> Self {
        Self {
            winner_seat: None,
            score_per_seat: vec![score; seats],
            is_draw: true,
        }
    }

    pub fn score_for(&self, seat: usize) -> u32 {
        self.score_per_seat.get(seat).copied().unwrap_or(0)
    }

    /// Highest score among the other seats
    pub fn opponent_score(&self, seat: usize) -> u32 {
        self.score_per_seat
            .iter()
            .enumerate()
            .filter(|(s, _)| *s != seat)
            .map(|(_, score)| *score)
            .max()
            .unwrap_or(0)
    }
}

/// What a successful move did to the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum MoveEffect {
    Claimed { cell: usize },
    Revealed { position: usize, symbol: char },
    Compared { first: usize, second: usize, matched: bool },
    Attacked { damage: u32 },
    Defended,
    Charged,
}

/// Result of `apply_move` or `settle`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveResult {
    pub session_id: SessionId,
    /// Seat that acted
    pub seat: usize,
    pub effect: MoveEffect,
    /// Turn owner after the move
    pub turn_owner: usize,
    pub status: SessionStatus,
    /// True while two revealed cards wait for their compare
    pub awaiting_settle: bool,
    pub outcome: Option<Outcome>,
}

impl MoveResult {
    pub fn is_terminal(&self) -> bool {
        self.status == SessionStatus::Finished
    }
}

/// Work the scheduler should arrange for a session, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Two revealed cards must be compared
    Settle,
    /// A computer-controlled seat owns the turn
    ComputerTurn { seat: usize },
}

/// Card as visible to the players; hidden symbols are masked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CardView {
    Hidden,
    FaceUp { symbol: char },
    Matched { symbol: char, seat: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FighterView {
    pub health: u32,
    pub energy: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardView {
    Grid { cells: [Option<usize>; 9] },
    Pairs { cards: Vec<CardView>, moves_used: u32, pairs_per_seat: Vec<u32> },
    Combat { fighters: [FighterView; 2] },
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub kind: GameKind,
    pub participants: Vec<Player>,
    pub turn_owner: usize,
    pub status: SessionStatus,
    pub move_count: u32,
    pub awaiting_settle: bool,
    pub board: BoardView,
    pub outcome: Option<Outcome>,
}
