//! Configuration for a harvest run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::executor::DEFAULT_CONCURRENCY;

/// Errors raised before harvesting starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("Probe timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Unknown output target: {path} (parent directory does not exist)")]
    UnknownOutputTarget { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Where the finished playlist goes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    #[default]
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map(Self::File).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Stdout => Ok(()),
            Self::File(path) => {
                let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
                match parent {
                    Some(dir) if !dir.is_dir() => Err(ConfigError::UnknownOutputTarget {
                        path: path.clone(),
                    }),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// Settings for one harvest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Path to the ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Maximum number of probes in flight.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Deadline for a single probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Whether to probe files at all.
    #[serde(default = "default_metadata")]
    pub metadata: bool,

    /// Prepended verbatim to every track location.
    #[serde(default)]
    pub location_prefix: String,

    /// Playlist title.
    #[serde(default)]
    pub title: Option<String>,

    /// File extensions (without dot) treated as media.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub follow_links: bool,

    #[serde(default)]
    pub output: OutputTarget,
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_metadata() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    ["mp3", "flac", "ogg", "m4a", "ape", "aac", "wav"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
            concurrency: default_concurrency(),
            probe_timeout_secs: default_probe_timeout(),
            metadata: default_metadata(),
            location_prefix: String::new(),
            title: None,
            extensions: default_extensions(),
            follow_links: false,
            output: OutputTarget::Stdout,
        }
    }
}

impl HarvestConfig {
    /// Loads a TOML config file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Rejects settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }
        if self.metadata && self.probe_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        self.output.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarvestConfig::default();
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.probe_timeout(), Duration::from_secs(10));
        assert!(config.metadata);
        assert_eq!(config.output, OutputTarget::Stdout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = HarvestConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn test_zero_timeout_only_matters_when_probing() {
        let mut config = HarvestConfig {
            probe_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
        config.metadata = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_in_missing_directory_rejected() {
        let target = OutputTarget::File(PathBuf::from("/definitely/not/here/list.xspf"));
        assert!(matches!(
            target.validate(),
            Err(ConfigError::UnknownOutputTarget { .. })
        ));
        assert!(OutputTarget::File(PathBuf::from("list.xspf")).validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: HarvestConfig =
            toml::from_str("concurrency = 2\nlocation_prefix = \"file://\"\n").unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.location_prefix, "file://");
        assert_eq!(config.probe_timeout_secs, 10);
        assert_eq!(config.extensions.len(), 7);
    }

    #[test]
    fn test_missing_config_file() {
        let err = HarvestConfig::from_toml_file(Path::new("/no/such/harvest.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
