//! Configuration type definitions

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PlanResult;

use super::loader::{self, ConfigWarning};

/// Output encoding defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Indentation of CUE and JSON output
    #[serde(default = "default_indent")]
    pub indent: usize,

    /// Escape `<`, `>` and `&` in JSON output
    #[serde(default)]
    pub escape_html: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            escape_html: false,
        }
    }
}

fn default_indent() -> usize {
    4
}

/// Import defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImportConfig {
    /// Regular expression data files of package directories must match
    #[serde(default)]
    pub file_filter: Option<String>,
}

/// Protocol buffer import paths
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProtoConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Error reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ErrorsConfig {
    /// Report every error instead of the first
    #[serde(default)]
    pub all_errors: bool,
}

/// Defaults read from `cueplan.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub proto: ProtoConfig,

    #[serde(default)]
    pub errors: ErrorsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> PlanResult<Self> {
        let (config, _warnings) = loader::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys).
    pub fn load_with_warnings(path: &Path) -> PlanResult<(Self, Vec<ConfigWarning>)> {
        loader::load_with_warnings(path)
    }

    /// Project file, user file or defaults, with environment overrides.
    pub fn load_or_default(project_root: &Path) -> PlanResult<(Self, Vec<ConfigWarning>)> {
        loader::load_or_default(project_root)
    }

    /// Apply environment variable overrides (CUEPLAN_* prefix)
    pub fn with_env_overrides(self) -> Self {
        loader::with_env_overrides(self, |key| std::env::var(key).ok())
    }
}
