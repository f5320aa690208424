//! Runtime configuration.
//!
//! # Responsibility
//! - Describe every tunable of the import, listing and squash paths.
//! - Load it from TOML, with a default for every field.
//!
//! # Invariants
//! - A missing section or key always falls back to its default.
//! - `load_or_default` never fails; it logs and returns defaults.

use crate::dedupe::squash::MergePolicy;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub listing: ListingConfig,
    pub squash: SquashConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("eventdesk.sqlite3"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Offset applied to the start time when a candidate has no usable end.
    pub default_duration_minutes: i64,
    /// Drop candidates that already ended at import time.
    pub skip_past_events: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            user_agent: format!("eventdesk/{}", env!("CARGO_PKG_VERSION")),
            default_duration_minutes: 0,
            skip_past_events: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Events listed by title in an import summary before "+N more".
    pub summary_limit: usize,
    /// Default length of a date-range filter, counted from today.
    pub default_range_months: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            summary_limit: 5,
            default_range_months: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquashConfig {
    pub merge_policy: MergePolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "cannot parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

impl CoreConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(config)
    }

    /// Loads configuration, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    "event=config_load module=config status=fallback error={}",
                    err
                );
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use crate::dedupe::squash::MergePolicy;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = CoreConfig::from_toml(
            "[import]\nskip_past_events = true\n\n[squash]\nmerge_policy = \"union_tags\"\n",
        )
        .unwrap();
        assert!(config.import.skip_past_events);
        assert_eq!(config.import.fetch_timeout_secs, 30);
        assert_eq!(config.listing.summary_limit, 5);
        assert_eq!(config.squash.merge_policy, MergePolicy::UnionTags);
    }

    #[test]
    fn load_or_default_falls_back_on_broken_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[import\nbroken").unwrap();
        let config = CoreConfig::load_or_default(file.path());
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CoreConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }
}
