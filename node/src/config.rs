use rollcall_engine::{EngineConfig, ProximityConfig, ProximityMode};
use rollcall_primitives::{
    AttendanceError, ACQUISITION_TIMEOUT_MS, MAX_DISTANCE_METERS, ORGANIZER_POLL_INTERVAL_MS,
    PARTICIPANT_POLL_INTERVAL_MS, SECONDARY_CHECK_LATENCY_MS, SECONDARY_CHECK_SUCCESS_PROBABILITY,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;

pub const DEFAULT_STORE_PATH: &str = "rollcall-session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid proximity mode: {0}")]
    ProximityMode(String),
    #[error(transparent)]
    Setting(#[from] AttendanceError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub store: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub engine: EngineSection,
    pub proximity: ProximitySection,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from(DEFAULT_STORE_PATH),
            log_level: "info".to_string(),
            log_file: None,
            engine: EngineSection::default(),
            proximity: ProximitySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub max_distance_meters: f64,
    pub acquisition_timeout_ms: u64,
    pub organizer_poll_interval_ms: u64,
    pub participant_poll_interval_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_distance_meters: MAX_DISTANCE_METERS,
            acquisition_timeout_ms: ACQUISITION_TIMEOUT_MS,
            organizer_poll_interval_ms: ORGANIZER_POLL_INTERVAL_MS,
            participant_poll_interval_ms: PARTICIPANT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProximitySection {
    pub mode: String,
    pub success_probability: f64,
    pub latency_ms: u64,
    pub seed: Option<u64>,
}

impl Default for ProximitySection {
    fn default() -> Self {
        Self {
            mode: "randomized".to_string(),
            success_probability: SECONDARY_CHECK_SUCCESS_PROBABILITY,
            latency_ms: SECONDARY_CHECK_LATENCY_MS,
            seed: None,
        }
    }
}

impl NodeConfig {
    /// Defaults when `path` is `None`; a named file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Global flags override the file.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(store) = &cli.store {
            self.store = store.clone();
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        if let Some(file) = &cli.log_file {
            self.log_file = Some(file.clone());
        }
        self
    }

    pub fn engine(&self) -> Result<EngineConfig, ConfigError> {
        let mut engine = EngineConfig::default()
            .with_max_distance(self.engine.max_distance_meters)?
            .with_acquisition_timeout(Duration::from_millis(self.engine.acquisition_timeout_ms));
        engine.organizer_poll_interval = Duration::from_millis(self.engine.organizer_poll_interval_ms);
        engine.participant_poll_interval =
            Duration::from_millis(self.engine.participant_poll_interval_ms);
        Ok(engine)
    }

    pub fn proximity(&self) -> Result<ProximityConfig, ConfigError> {
        let mode = self
            .proximity
            .mode
            .parse::<ProximityMode>()
            .map_err(ConfigError::ProximityMode)?;
        let proximity = ProximityConfig {
            mode,
            success_probability: self.proximity.success_probability,
            latency: Duration::from_millis(self.proximity.latency_ms),
            seed: self.proximity.seed,
        };
        proximity.validate()?;
        Ok(proximity)
    }
}
