use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// cueplan - evaluate, export and import configuration and data files
#[derive(Parser, Debug)]
#[command(name = "cueplan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Output data in a standard format (JSON by default)
    Export {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Print consolidated definitions and constraints
    Def {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Evaluate and print a configuration
    Eval {
        #[command(flatten)]
        plan: PlanArgs,

        /// Require the evaluation to be concrete
        #[arg(short, long)]
        concrete: bool,
    },

    /// Convert data files to CUE files
    ///
    /// An optional first argument selects the mode: json, yaml, toml, text,
    /// binary, proto, jsonschema, openapi, auto or data.
    Import {
        #[command(flatten)]
        plan: PlanArgs,

        /// Only report which files would be written
        #[arg(long)]
        dry_run: bool,

        /// File extensions to import (comma separated)
        #[arg(long, value_delimiter = ',')]
        ext: Vec<String>,
    },

    /// Format CUE files in place
    Fmt {
        /// Files or directories (default: the current directory)
        files: Vec<PathBuf>,

        /// Report unformatted files and exit non-zero instead of writing
        #[arg(long)]
        check: bool,

        /// Print a unified diff instead of writing
        #[arg(long)]
        diff: bool,
    },
}

/// Flags shared by the commands that assemble a build plan.
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Directories and files, optionally qualified (`json: a.data`)
    pub args: Vec<String>,

    /// Evaluate this expression against every value (repeatable)
    #[arg(short = 'e', long = "expression")]
    pub expressions: Vec<String>,

    /// Expression selecting the schema data files are checked against
    #[arg(short = 'd', long)]
    pub schema: Option<String>,

    /// Output encoding (json, yaml, cue, text, ...)
    #[arg(long)]
    pub out: Option<String>,

    /// Write to this file instead of standard output
    #[arg(short = 'o', long)]
    pub outfile: Option<String>,

    /// Merge data files into the configuration (--merge=false streams them)
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub merge: bool,

    /// Place each data object at this label path (repeatable)
    #[arg(short = 'l', long = "path")]
    pub paths: Vec<String>,

    /// Concatenate data objects into a list
    #[arg(long)]
    pub list: bool,

    /// Keep every data object in a file of its own
    #[arg(long)]
    pub files: bool,

    /// Evaluate --path against the object's context (data, filename, index, recordCount)
    #[arg(long)]
    pub with_context: bool,

    /// Package name of the output
    #[arg(short = 'p', long = "package")]
    pub package: Option<String>,

    /// Overwrite existing files
    #[arg(short, long)]
    pub force: bool,

    /// Continue past validation errors and report them at the end
    #[arg(short, long)]
    pub ignore: bool,

    /// Report all errors rather than the first
    #[arg(short = 'E', long)]
    pub all_errors: bool,

    /// Escape <, > and & in JSON output
    #[arg(long)]
    pub escape: bool,

    /// Directories searched for imported protocol buffer files
    #[arg(short = 'I', long = "proto_path")]
    pub proto_path: Vec<PathBuf>,
}
