use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "CONNECT4_CONFIG";

const QUEUE_WAIT_VAR: &str = "CONNECT4_QUEUE_WAIT_MS";
const RECONNECT_GRACE_VAR: &str = "CONNECT4_RECONNECT_GRACE_MS";
const BOT_DELAY_VAR: &str = "CONNECT4_BOT_DELAY_MS";
const BOT_IDENTITY_VAR: &str = "CONNECT4_BOT_IDENTITY";
const BOT_STRATEGY_VAR: &str = "CONNECT4_BOT_STRATEGY";
const LOG_FORMAT_VAR: &str = "CONNECT4_LOG_FORMAT";

/// Timings and identities the gateway runs with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GatewaySettings {
    /// How long a queued player waits before being matched with the bot.
    pub queue_wait_ms: u64,
    /// How long a disconnected player may stay away before forfeiting.
    pub reconnect_grace_ms: u64,
    /// Pause before the bot plays its move.
    pub bot_think_delay_ms: u64,
    pub bot_identity: String,
    pub bot_strategy: String,
    pub log_format: LogFormat,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            queue_wait_ms: 10_000,
            reconnect_grace_ms: 30_000,
            bot_think_delay_ms: 750,
            bot_identity: "BOT".to_string(),
            bot_strategy: connect4_ai::DEFAULT_STRATEGY.to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl GatewaySettings {
    /// Defaults, then the file named by `CONNECT4_CONFIG`, then `CONNECT4_*` variables.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::resolve(path.as_deref(), |name| std::env::var(name).ok())
    }

    /// Same layering as [`GatewaySettings::load`] with explicit sources.
    pub fn resolve(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(value) = env(QUEUE_WAIT_VAR) {
            settings.queue_wait_ms = parse_millis(QUEUE_WAIT_VAR, &value)?;
        }
        if let Some(value) = env(RECONNECT_GRACE_VAR) {
            settings.reconnect_grace_ms = parse_millis(RECONNECT_GRACE_VAR, &value)?;
        }
        if let Some(value) = env(BOT_DELAY_VAR) {
            settings.bot_think_delay_ms = parse_millis(BOT_DELAY_VAR, &value)?;
        }
        if let Some(value) = env(BOT_IDENTITY_VAR) {
            settings.bot_identity = value;
        }
        if let Some(value) = env(BOT_STRATEGY_VAR) {
            settings.bot_strategy = value;
        }
        if let Some(value) = env(LOG_FORMAT_VAR) {
            settings.log_format = value.parse().map_err(|_| SettingsError::InvalidEnv {
                var: LOG_FORMAT_VAR,
                value: value.clone(),
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, SettingsError> {
        toml::from_str(raw).map_err(|err| SettingsError::Parse(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.queue_wait_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "queue_wait_ms must be greater than 0".to_string(),
            ));
        }
        if self.reconnect_grace_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "reconnect_grace_ms must be greater than 0".to_string(),
            ));
        }
        if self.bot_identity.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "bot_identity cannot be empty".to_string(),
            ));
        }
        if connect4_ai::create_bot(&self.bot_strategy).is_err() {
            return Err(SettingsError::InvalidValue(format!(
                "unknown bot_strategy: {}",
                self.bot_strategy
            )));
        }
        Ok(())
    }

    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_millis(self.reconnect_grace_ms)
    }

    pub fn bot_think_delay(&self) -> Duration {
        Duration::from_millis(self.bot_think_delay_ms)
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<u64, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidEnv {
            var,
            value: value.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = GatewaySettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.queue_wait(), Duration::from_secs(10));
        assert_eq!(settings.reconnect_grace(), Duration::from_secs(30));
        assert_eq!(settings.bot_think_delay(), Duration::from_millis(750));
        assert_eq!(settings.bot_identity, "BOT");
    }

    #[test]
    fn validates_durations_identity_and_strategy() {
        let mut settings = GatewaySettings {
            queue_wait_ms: 0,
            ..GatewaySettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("queue_wait_ms")
        ));

        settings = GatewaySettings {
            reconnect_grace_ms: 0,
            ..GatewaySettings::default()
        };
        assert!(settings.validate().is_err());

        settings = GatewaySettings {
            bot_identity: "  ".into(),
            ..GatewaySettings::default()
        };
        assert!(settings.validate().is_err());

        settings = GatewaySettings {
            bot_strategy: "minimax".into(),
            ..GatewaySettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("minimax")
        ));
    }

    #[test]
    fn zero_bot_delay_is_allowed() {
        let settings = GatewaySettings {
            bot_think_delay_ms: 0,
            ..GatewaySettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn toml_file_overrides_defaults_and_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "queue_wait_ms = 2000\nbot_identity = \"CPU\"\nlog_format = \"json\""
        )
        .unwrap();

        let settings = GatewaySettings::resolve(
            Some(file.path()),
            env_of(&[(QUEUE_WAIT_VAR, "500"), (BOT_DELAY_VAR, "0")]),
        )
        .unwrap();

        assert_eq!(settings.queue_wait_ms, 500);
        assert_eq!(settings.bot_think_delay_ms, 0);
        assert_eq!(settings.bot_identity, "CPU");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.reconnect_grace_ms, 30_000);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        assert!(matches!(
            GatewaySettings::from_toml("queue_wait = 5"),
            Err(SettingsError::Parse(_))
        ));
        assert!(matches!(
            GatewaySettings::resolve(None, env_of(&[(RECONNECT_GRACE_VAR, "soon")])),
            Err(SettingsError::InvalidEnv { var: RECONNECT_GRACE_VAR, .. })
        ));
        assert!(matches!(
            GatewaySettings::resolve(None, env_of(&[(LOG_FORMAT_VAR, "xml")])),
            Err(SettingsError::InvalidEnv { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            GatewaySettings::resolve(Some(&missing), env_of(&[])),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    #[serial]
    fn load_reads_process_environment() {
        std::env::remove_var(CONFIG_PATH_VAR);
        std::env::set_var(BOT_STRATEGY_VAR, "baseline");
        std::env::set_var(RECONNECT_GRACE_VAR, "1500");

        let settings = GatewaySettings::load();

        std::env::remove_var(BOT_STRATEGY_VAR);
        std::env::remove_var(RECONNECT_GRACE_VAR);

        let settings = settings.unwrap();
        assert_eq!(settings.bot_strategy, "baseline");
        assert_eq!(settings.reconnect_grace_ms, 1500);
    }
}
