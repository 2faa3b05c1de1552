//! Configuration loading with environment variable support
//!
//! Configuration is read from an optional TOML file, then `ARCADIUM_*`
//! environment variables are applied on top, then the result is validated.

use crate::config::{
    ArcadiumConfig, LedgerConfig, LogLevel, MonitoringConfig, RoomConfig, SchedulerConfig,
    SpectatorConfig,
};
use crate::errors::{ArcadiumResult, ConfigurationError};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> ArcadiumResult<ArcadiumConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => ArcadiumConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> ArcadiumResult<ArcadiumConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut ArcadiumConfig) -> ArcadiumResult<()> {
        if let Some(delay) = parse_env::<u64>("ARCADIUM_THINKING_DELAY_MS", "Invalid delay")? {
            config.scheduler.thinking_delay_ms = delay;
        }
        if let Some(delay) = parse_env::<u64>("ARCADIUM_SETTLE_DELAY_MS", "Invalid delay")? {
            config.scheduler.settle_delay_ms = delay;
        }
        if let Some(interval) = parse_env::<u64>("ARCADIUM_POLL_INTERVAL_MS", "Invalid interval")? {
            config.spectator.poll_interval_ms = interval;
        }
        if let Some(threshold) = parse_env::<u32>("ARCADIUM_WIN_THRESHOLD", "Invalid threshold")? {
            config.spectator.win_threshold = threshold;
        }
        if let Some(level) = parse_env::<LogLevel>("ARCADIUM_LOG_LEVEL", "Invalid log level")? {
            config.monitoring.log_level = level;
        }
        Ok(())
    }

    fn validate(&self, config: &ArcadiumConfig) -> ArcadiumResult<()> {
        config
            .validate()
            .map_err(|reason| ConfigurationError::ValidationFailed(reason).into())
    }

    /// Save configuration to file
    pub fn save(&self, config: &ArcadiumConfig, path: &str) -> ArcadiumResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: FromStr>(key: &str, reason: &str) -> ArcadiumResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ConfigurationError::InvalidValue {
                field: key.to_string(),
                value: raw,
                reason: reason.to_string(),
            }
            .into()
        }),
        Err(_) => Ok(None),
    }
}

/// Builder pattern for creating configurations
pub struct ConfigBuilder {
    config: ArcadiumConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ArcadiumConfig::default(),
        }
    }

    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn spectator(mut self, spectator: SpectatorConfig) -> Self {
        self.config.spectator = spectator;
        self
    }

    pub fn ledger(mut self, ledger: LedgerConfig) -> Self {
        self.config.ledger = ledger;
        self
    }

    pub fn rooms(mut self, rooms: RoomConfig) -> Self {
        self.config.rooms = rooms;
        self
    }

    pub fn monitoring(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    pub fn build(self) -> ArcadiumConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> ArcadiumResult<()> {
    ConfigLoader::new().save(&ArcadiumConfig::default(), path)
}
