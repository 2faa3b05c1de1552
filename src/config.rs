//! Configuration sections with validation and defaults

use crate::common::types::Currency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete platform configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ArcadiumConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub spectator: SpectatorConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub rooms: RoomConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Timer delays for computer turns and pair-matching compares
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Delay before a computer-controlled seat moves
    pub thinking_delay_ms: u64,
    /// Delay between the second reveal and the compare in pair-matching
    pub settle_delay_ms: u64,
    /// Capacity of the turn event broadcast channel
    pub event_buffer: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thinking_delay_ms: 1500,
            settle_delay_ms: 1000,
            event_buffer: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn thinking_delay(&self) -> Duration {
        Duration::from_millis(self.thinking_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Display simulation for background rooms
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpectatorConfig {
    pub poll_interval_ms: u64,
    /// A room finishes the first time a seat's score exceeds this
    pub win_threshold: u32,
    pub min_increment: u32,
    pub max_increment: u32,
}

impl Default for SpectatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3000,
            win_threshold: 100,
            min_increment: 1,
            max_increment: 5,
        }
    }
}

impl SpectatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Fixed exchange rates relative to the base currency
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RateTable {
    pub jup: f64,
    pub sol: f64,
    pub usdc: f64,
    pub btc: f64,
    pub eth: f64,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            jup: 1.0,
            sol: 0.0045,
            usdc: 0.85,
            btc: 0.0000087,
            eth: 0.00025,
        }
    }
}

impl RateTable {
    pub fn rate(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Jup => self.jup,
            Currency::Sol => self.sol,
            Currency::Usdc => self.usdc,
            Currency::Btc => self.btc,
            Currency::Eth => self.eth,
        }
    }
}

/// Reward crediting and currency settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// reward = round(raw_score * reward_multiplier)
    pub reward_multiplier: f64,
    pub rates: RateTable,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reward_multiplier: 0.5,
            rates: RateTable::default(),
        }
    }
}

/// Defaults for computer opponents seated by the orchestrator
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RoomConfig {
    pub computer_identity: String,
    pub computer_name: String,
    pub computer_avatar: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            computer_identity: "computer_1".to_string(),
            computer_name: "AI Bot 1".to_string(),
            computer_avatar: "🤖".to_string(),
        }
    }
}

/// Logging and metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_level: LogLevel::Info,
        }
    }
}

impl ArcadiumConfig {
    /// Near-zero delays for tests and fast demos
    pub fn fast() -> Self {
        Self {
            scheduler: SchedulerConfig {
                thinking_delay_ms: 10,
                settle_delay_ms: 10,
                ..Default::default()
            },
            spectator: SpectatorConfig {
                poll_interval_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.thinking_delay_ms == 0 {
            return Err("scheduler.thinking_delay_ms must be greater than 0".to_string());
        }
        if self.scheduler.settle_delay_ms == 0 {
            return Err("scheduler.settle_delay_ms must be greater than 0".to_string());
        }
        if self.scheduler.event_buffer == 0 {
            return Err("scheduler.event_buffer must be greater than 0".to_string());
        }
        if self.spectator.poll_interval_ms == 0 {
            return Err("spectator.poll_interval_ms must be greater than 0".to_string());
        }
        if self.spectator.min_increment == 0
            || self.spectator.min_increment > self.spectator.max_increment
        {
            return Err("spectator increments must satisfy 0 < min_increment <= max_increment".to_string());
        }
        if !(self.ledger.reward_multiplier.is_finite() && self.ledger.reward_multiplier >= 0.0) {
            return Err("ledger.reward_multiplier must be a non-negative number".to_string());
        }
        if (self.ledger.rates.jup - 1.0).abs() > f64::EPSILON {
            return Err("ledger.rates.jup is the base currency and must be 1".to_string());
        }
        for currency in Currency::ALL {
            let rate = self.ledger.rates.rate(currency);
            if !(rate.is_finite() && rate > 0.0) {
                return Err(format!("ledger.rates.{} must be positive", currency.symbol().to_lowercase()));
            }
        }
        Ok(())
    }
}
