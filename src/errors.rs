//! Error types for the Arcadium platform
//!
//! Every failure in the core is a rejected operation: the error is returned to
//! the immediate caller and the entity it targeted is left unchanged.

use crate::common::types::{Currency, RoomId, SessionId};

/// Root error type for all Arcadium operations
#[derive(Debug, thiserror::Error)]
pub enum ArcadiumError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Game rule and session errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Room lifecycle errors
    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    /// Wallet and ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Errors raised by the game engine. Session state is unchanged when returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Seat {seat} moved out of turn (turn owner is seat {turn_owner})")]
    NotYourTurn { seat: usize, turn_owner: usize },

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Session {0} has already finished")]
    SessionFinished(SessionId),

    #[error("Invalid session configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
}

/// Errors raised by the room orchestrator. No seat is mutated when returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room {0} is not accepting players")]
    RoomUnavailable(RoomId),

    #[error("Player {0} already occupies the host seat")]
    SelfJoinForbidden(String),

    #[error("Insufficient funds: wager {wager} exceeds balance {balance}")]
    InsufficientFunds { wager: f64, balance: f64 },

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Invalid wager: {0}")]
    InvalidWager(f64),

    #[error(transparent)]
    Game(#[from] GameError),
}

/// Errors raised by the reward ledger. No balance is mutated when returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: f64, available: f64 },

    #[error("Cannot convert {0} into itself")]
    SameCurrency(Currency),
}

impl From<toml::de::Error> for ArcadiumError {
    fn from(e: toml::de::Error) -> Self {
        ArcadiumError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

impl From<std::io::Error> for ArcadiumError {
    fn from(e: std::io::Error) -> Self {
        ArcadiumError::Configuration(ConfigurationError::LoadFailed(e.to_string()))
    }
}

/// Convenience type alias for Results
pub type ArcadiumResult<T> = Result<T, ArcadiumError>;
