//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};

use super::types::Config;

/// Name of the project defaults file.
pub const PROJECT_FILE: &str = "cueplan.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown configuration key {:?} in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(s) = &self.suggestion {
            write!(f, " (did you mean {:?}?)", s)?;
        }
        Ok(())
    }
}

/// Load configuration and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> PlanResult<(Config, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| PlanError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                key: key.clone(),
                file: path.to_path_buf(),
                line: find_line_number(&content, &key),
                suggestion: suggest_key(&key),
            }
        })
        .collect();

    Ok((config, warnings))
}

/// Load from the project file, the user file, or defaults.
pub fn load_or_default(project_root: &Path) -> PlanResult<(Config, Vec<ConfigWarning>)> {
    let project = project_root.join(PROJECT_FILE);
    let user = dirs::config_dir().map(|d| d.join("cueplan").join("config.toml"));

    for path in std::iter::once(project).chain(user) {
        if path.is_file() {
            debug!(file = %path.display(), "loading configuration");
            let (config, warnings) = load_with_warnings(&path)?;
            return Ok((config.with_env_overrides(), warnings));
        }
    }
    Ok((Config::default().with_env_overrides(), Vec::new()))
}

/// Apply environment variable overrides (CUEPLAN_* prefix). `var` looks up
/// one variable.
pub fn with_env_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    // CUEPLAN_INDENT
    if let Some(indent) = var("CUEPLAN_INDENT") {
        match indent.trim().parse() {
            Ok(n) => config.output.indent = n,
            Err(_) => warn!(value = %indent, "ignoring invalid CUEPLAN_INDENT"),
        }
    }

    // CUEPLAN_PROTO_PATH (path-list separated)
    if let Some(paths) = var("CUEPLAN_PROTO_PATH") {
        config
            .proto
            .paths
            .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
    }

    // CUEPLAN_ALL_ERRORS
    if let Some(val) = var("CUEPLAN_ALL_ERRORS") {
        config.errors.all_errors = val.to_lowercase() != "false" && val != "0";
    }

    config
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    for (i, line) in content.lines().enumerate() {
        if line.contains(needle) {
            return Some(i + 1);
        }
    }
    None
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "output",
        "indent",
        "escape_html",
        "import",
        "file_filter",
        "proto",
        "paths",
        "errors",
        "all_errors",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a_bytes.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = if ac == bc { 0 } else { 1 };
            curr[j + 1] =
                std::cmp::min(std::cmp::min(prev[j + 1] + 1, curr[j] + 1), prev[j] + cost);
        }
        prev.clone_from_slice(&curr);
    }

    prev[b_bytes.len()]
}
