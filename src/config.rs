use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::catalog::DEFAULT_WORDS;

pub const CONFIG_ENV_VAR: &str = "DAHLIA_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayWindow {
    fn default() -> Self {
        Self {
            min_ms: 800,
            max_ms: 1300,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnWeights {
    pub word: u32,
    pub image: u32,
    pub video: u32,
}

impl Default for SpawnWeights {
    fn default() -> Self {
        Self {
            word: 40,
            image: 45,
            video: 15,
        }
    }
}

impl SpawnWeights {
    /// `None` when the sum overflows.
    pub fn total(&self) -> Option<u32> {
        self.word.checked_add(self.image)?.checked_add(self.video)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamCountConfig {
    pub ceiling: u32,
    pub failure_penalty: u32,
}

impl Default for SpamCountConfig {
    fn default() -> Self {
        Self {
            ceiling: 25,
            failure_penalty: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalConfig {
    pub recovery_rate: f32,
    pub decay_rate: f32,
    pub failure_drain: f32,
    pub alarm_threshold: f32,
    pub frame_ms: u64,
    pub slow_period_ms: u64,
    pub fast_period_ms: u64,
    pub wallet_start: f32,
    pub wallet_drain_per_tick: f32,
    pub wallet_failure_cost: f32,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            recovery_rate: 0.6,
            decay_rate: 0.15,
            failure_drain: 8.0,
            alarm_threshold: 20.0,
            frame_ms: 16,
            slow_period_ms: 2000,
            fast_period_ms: 450,
            wallet_start: 500.0,
            wallet_drain_per_tick: 0.05,
            wallet_failure_cost: 25.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ResourceMode {
    SpamCount(SpamCountConfig),
    Survival(SurvivalConfig),
}

impl Default for ResourceMode {
    fn default() -> Self {
        ResourceMode::SpamCount(SpamCountConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gate_credential: String,
    pub release_credential: String,
    pub boot_ms: u64,
    pub reveal_delay: DelayWindow,
    pub spawn_interval_ms: u64,
    pub worship_timeout_ms: u64,
    pub item_lifetime_ms: Option<u64>,
    pub weights: SpawnWeights,
    pub words: Vec<String>,
    pub media_root: PathBuf,
    pub resource: ResourceMode,
    pub gps_lock: [f64; 2],
    pub displacement_epsilon: f64,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gate_credential: "DAHLIA".to_string(),
            release_credential: "RELEASE".to_string(),
            boot_ms: 1500,
            reveal_delay: DelayWindow::default(),
            spawn_interval_ms: 2000,
            worship_timeout_ms: 2500,
            item_lifetime_ms: None,
            weights: SpawnWeights::default(),
            words: DEFAULT_WORDS.iter().map(|word| word.to_string()).collect(),
            media_root: PathBuf::from("."),
            resource: ResourceMode::default(),
            gps_lock: [45.4642, 9.1900],
            displacement_epsilon: 0.0005,
            seed: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file named by `DAHLIA_CONFIG`, or falls back to defaults
    /// when the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gate_credential.trim().is_empty() {
            return Err(ConfigError::Invalid("gate_credential is empty".into()));
        }
        if self.release_credential.trim().is_empty() {
            return Err(ConfigError::Invalid("release_credential is empty".into()));
        }
        if self.reveal_delay.min_ms > self.reveal_delay.max_ms {
            return Err(ConfigError::Invalid(format!(
                "reveal_delay min {} exceeds max {}",
                self.reveal_delay.min_ms, self.reveal_delay.max_ms
            )));
        }
        if self.spawn_interval_ms == 0 {
            return Err(ConfigError::Invalid("spawn_interval_ms must be positive".into()));
        }
        match self.weights.total() {
            Some(0) => return Err(ConfigError::Invalid("spawn weights sum to zero".into())),
            Some(total) if i32::try_from(total).is_ok() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "spawn weights sum past {}",
                    i32::MAX
                )));
            }
        }
        if let Some(lifetime) = self.item_lifetime_ms {
            if lifetime <= self.worship_timeout_ms {
                return Err(ConfigError::Invalid(format!(
                    "item_lifetime_ms {lifetime} must exceed worship_timeout_ms {}",
                    self.worship_timeout_ms
                )));
            }
        }
        if self.words.is_empty() {
            return Err(ConfigError::Invalid("word list is empty".into()));
        }
        match &self.resource {
            ResourceMode::SpamCount(spam) if spam.ceiling == 0 => {
                Err(ConfigError::Invalid("spam ceiling must be positive".into()))
            }
            ResourceMode::Survival(survival) if survival.frame_ms == 0 => {
                Err(ConfigError::Invalid("survival frame_ms must be positive".into()))
            }
            ResourceMode::Survival(survival)
                if survival.fast_period_ms == 0 || survival.slow_period_ms == 0 =>
            {
                Err(ConfigError::Invalid("survival spawn periods must be positive".into()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(body.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_match_the_shipped_experience() {
        let config = Config::default();
        assert_eq!(config.gate_credential, "DAHLIA");
        assert_eq!(config.spawn_interval_ms, 2000);
        assert_eq!(config.worship_timeout_ms, 2500);
        assert_eq!(config.words.len(), 8);
        assert_eq!(
            config.resource,
            ResourceMode::SpamCount(SpamCountConfig {
                ceiling: 25,
                failure_penalty: 2
            })
        );
        config.validate().expect("defaults validate");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let file = write_config(
            r#"{
                "gate_credential": "orchid",
                "resource": { "model": "survival", "decay_rate": 0.5 }
            }"#,
        );
        let config = Config::load(file.path()).expect("load config");
        assert_eq!(config.gate_credential, "orchid");
        assert_eq!(config.release_credential, "RELEASE");
        match config.resource {
            ResourceMode::Survival(survival) => {
                assert_eq!(survival.decay_rate, 0.5);
                assert_eq!(survival.frame_ms, 16);
            }
            other => panic!("expected survival, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_reports_the_path() {
        let file = write_config("{ not json");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = Config::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn rejects_inverted_delay_window() {
        let file = write_config(r#"{ "reveal_delay": { "min_ms": 900, "max_ms": 100 } }"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_zero_weights_and_empty_credentials() {
        let mut config = Config::default();
        config.weights = SpawnWeights {
            word: 0,
            image: 0,
            video: 0,
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.release_credential = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_weights_that_overflow() {
        let file = write_config(
            r#"{ "weights": { "word": 4294967295, "image": 1, "video": 0 } }"#,
        );
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut config = Config::default();
        config.weights = SpawnWeights {
            word: i32::MAX as u32,
            image: 1,
            video: 0,
        };
        assert_eq!(config.weights.total(), Some(i32::MAX as u32 + 1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_a_lifetime_that_ends_before_the_countdown() {
        let mut config = Config::default();
        config.item_lifetime_ms = Some(1000);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.item_lifetime_ms = Some(config.worship_timeout_ms);
        assert!(config.validate().is_err());
        config.item_lifetime_ms = Some(6000);
        assert!(config.validate().is_ok());
    }
}
