//! Merge configuration and schema source resolution.
//!
//! Configuration files are JSON or TOML, picked by extension. The schema used
//! by the CLI resolves in order:
//! 1. `--schema` argument
//! 2. `TA_SCHEMA` environment variable
//! 3. The built-in table

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::limiter::DEFAULT_LIMITED_CAPACITY;

/// Environment variable naming a schema document.
pub const SCHEMA_ENV_VAR: &str = "TA_SCHEMA";

fn default_limited_capacity() -> usize {
    DEFAULT_LIMITED_CAPACITY
}

fn default_parallel_threshold() -> usize {
    64
}

fn default_true() -> bool {
    true
}

/// Tunables for one [`TreeMerger`](crate::TreeMerger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Maximum groups kept in a `limited` collection.
    #[serde(default = "default_limited_capacity")]
    pub limited_capacity: usize,

    /// Merge sibling partitions of one collection on the rayon pool.
    #[serde(default)]
    pub parallel_partitions: bool,

    /// Minimum number of partitions before fanning out.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Record unlisted fields in the merge report.
    #[serde(default = "default_true")]
    pub report_unknown_fields: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            limited_capacity: default_limited_capacity(),
            parallel_partitions: false,
            parallel_threshold: default_parallel_threshold(),
            report_unknown_fields: true,
        }
    }
}

impl MergeConfig {
    /// Load from a JSON or TOML file and validate.
    pub fn from_file(path: &Path) -> Result<Self, MergeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MergeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::parse_toml(&content)
        } else {
            Self::parse_json(&content)
        }
    }

    pub fn parse_json(json: &str) -> Result<Self, MergeError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MergeError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_toml(content: &str) -> Result<Self, MergeError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MergeError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MergeError> {
        if self.limited_capacity == 0 {
            return Err(MergeError::Config(
                "limited_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_limited_capacity(mut self, capacity: usize) -> Self {
        self.limited_capacity = capacity;
        self
    }

    pub fn with_parallel_partitions(mut self, threshold: usize) -> Self {
        self.parallel_partitions = true;
        self.parallel_threshold = threshold;
        self
    }
}

/// Where the schema came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    CliArgument(PathBuf),
    Environment(PathBuf),
    Builtin,
}

impl SchemaSource {
    /// Resolve from an optional CLI path and the environment.
    pub fn resolve(cli_path: Option<&Path>) -> Self {
        Self::resolve_with(cli_path, std::env::var_os(SCHEMA_ENV_VAR).map(PathBuf::from))
    }

    fn resolve_with(cli_path: Option<&Path>, env_path: Option<PathBuf>) -> Self {
        if let Some(path) = cli_path {
            return SchemaSource::CliArgument(path.to_path_buf());
        }
        match env_path {
            Some(path) if !path.as_os_str().is_empty() => SchemaSource::Environment(path),
            _ => SchemaSource::Builtin,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            SchemaSource::CliArgument(p) | SchemaSource::Environment(p) => Some(p),
            SchemaSource::Builtin => None,
        }
    }
}

impl std::fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaSource::CliArgument(p) => write!(f, "CLI argument ({})", p.display()),
            SchemaSource::Environment(p) => {
                write!(f, "{} ({})", SCHEMA_ENV_VAR, p.display())
            }
            SchemaSource::Builtin => write!(f, "built-in table"),
        }
    }
}
