//! Command drivers.

pub mod def;
pub mod eval;
pub mod export;
pub mod fmt;
pub mod import;
mod values;

use anyhow::Result;
use cueplan::encoding::Mode;
use cueplan::plan::{PlacementFlags, PlanFlags};
use cueplan::{Config, EncodingConfig, LoadConfig};
use regex::Regex;

use crate::cli::PlanArgs;

/// Settings for one invocation, resolved once from the defaults file, the
/// environment and the command line.
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    pub settings: Config,
}

impl InvocationConfig {
    /// Load the defaults for the working directory. Unknown keys in the
    /// defaults file are reported on stderr.
    pub fn load() -> Result<Self> {
        let dir = std::env::current_dir()?;
        let (settings, warnings) = Config::load_or_default(&dir)?;
        for w in &warnings {
            eprintln!("warning: {}", w);
        }
        Ok(Self { settings })
    }

    /// Report every error rather than the first.
    pub fn all_errors(&self, args: &PlanArgs) -> bool {
        args.all_errors || self.settings.errors.all_errors
    }

    pub fn encoding_config(&self, mode: Mode, args: &PlanArgs) -> EncodingConfig {
        let mut cfg = EncodingConfig::new(mode);
        cfg.force = args.force;
        cfg.merge = args.merge;
        cfg.ignore = args.ignore;
        cfg.all_errors = self.all_errors(args);
        cfg.pkg_name = args.package.clone();
        cfg.indent = self.settings.output.indent;
        cfg.escape_html = args.escape || self.settings.output.escape_html;
        cfg.proto_path = args
            .proto_path
            .iter()
            .chain(&self.settings.proto.paths)
            .cloned()
            .collect();
        cfg
    }

    /// How arguments are loaded. Relative paths stay relative to the
    /// working directory, which keeps diagnostics short.
    pub fn load_config(&self, data_files: bool, file_filter: Option<Regex>) -> LoadConfig {
        LoadConfig {
            data_files,
            file_filter,
            ..LoadConfig::default()
        }
    }

    pub fn plan_flags(&self, args: &PlanArgs, importing: bool, file_filter: Option<Regex>) -> PlanFlags {
        PlanFlags {
            expressions: args.expressions.clone(),
            schema: args.schema.clone(),
            merge: args.merge,
            importing,
            placement: PlacementFlags {
                files: args.files,
                list: args.list,
                paths: args.paths.clone(),
                with_context: args.with_context,
                pkg_name: args.package.clone(),
                force: args.force,
                file_filter,
            },
        }
    }
}
