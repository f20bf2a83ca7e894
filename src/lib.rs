//! cueplan - build plans for configuration instances and orphaned data files
//!
//! Arguments are loaded into build units, data files are sorted into schemas
//! and values, and the resulting build plan yields the values a command
//! prints: evaluated instances, streamed documents or projections of either.

pub mod build;
pub mod config;
pub mod encoding;
pub mod error;
pub mod output;
pub mod plan;
pub mod syntax;
pub mod value;

// Re-exports for convenience
pub use build::{load_units, BuildUnit, LoadConfig};
pub use config::{Config, ConfigWarning};
pub use encoding::{CodecRegistry, Decoder, Encoder, Encoding, EncodingConfig, FileSpec, Mode};
pub use error::{ErrorCategory, ErrorList, PlanError, PlanResult};
pub use output::{write_atomic, OutputRegistry};
pub use plan::{assemble, BuildPlan, PlacementFlags, PlanFlags, PlanIter};
pub use syntax::{format_file, parse_expr, parse_file, File};
pub use value::{Instance, Runtime, Value};
