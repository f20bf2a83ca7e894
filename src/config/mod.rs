//! Configuration module for cueplan
//!
//! Settings are resolved once per invocation, highest priority first:
//! 1. CLI flags
//! 2. Environment variables (CUEPLAN_*)
//! 3. Project config (./cueplan.toml)
//! 4. User config (<config dir>/cueplan/config.toml)
//! 5. Built-in defaults

mod loader;
mod types;

pub use loader::{with_env_overrides, ConfigWarning, PROJECT_FILE};
pub use types::{Config, ErrorsConfig, ImportConfig, OutputConfig, ProtoConfig};
