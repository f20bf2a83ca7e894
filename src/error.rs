//! Error types for cueplan
//!
//! Uses `thiserror` for library errors; the binary wraps them with `anyhow`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::syntax::Pos;
use crate::value::ValueError;

/// Result type alias for cueplan operations
pub type PlanResult<T> = Result<T, PlanError>;

/// The failure classes a command reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Flag misuse, unsupported inputs, conflicting packages.
    Configuration,
    /// Malformed input documents.
    Decode,
    /// Values that fail unification or validation.
    Validation,
    /// Output files that cannot be created or written.
    Resource,
}

/// Main error type for cueplan operations
#[derive(Error, Debug)]
pub enum PlanError {
    /// Syntax error in a configuration file or expression
    #[error("{pos}: {message}")]
    Syntax { pos: Pos, message: String },

    /// Malformed document in a data file
    #[error("{pos}: {message}")]
    Decode { pos: Pos, message: String },

    /// A file whose encoding no codec understands
    #[error("unsupported encoding {encoding:?} for file {file}")]
    UnsupportedEncoding { file: String, encoding: String },

    /// Text protocol buffers cannot be turned into configuration source
    #[error("cannot import {file}: textproto files require a schema and cannot be imported")]
    TextProtoImport { file: String },

    /// The encoding is known but no codec was registered for it
    #[error("no codec registered for encoding {encoding} (file {file})")]
    NoCodec { file: String, encoding: String },

    #[error("unsupported interpretation {interpretation:?} for file {file}")]
    UnsupportedInterpretation { file: String, interpretation: String },

    /// More than one ad-hoc file package on the command line
    #[error("builds contain two file packages")]
    TwoFilePackages,

    #[error("cannot use schema flag with more than one schema")]
    MultipleSchemas,

    #[error("schema flag specified without a schema")]
    SchemaWithoutSchema,

    #[error("cannot combine data streaming with multiple instances")]
    StreamWithMultipleInstances,

    #[error("found packages {first:?} and {second:?} in {dir}")]
    AmbiguousPackage {
        first: String,
        second: String,
        dir: String,
    },

    /// Invalid flag value or combination
    #[error("{message}")]
    Flag { flag: String, message: String },

    /// Malformed defaults file
    #[error("invalid configuration in {}: {message}", file.display())]
    Config { file: PathBuf, message: String },

    /// Placement of orphaned values failed
    #[error("{message}")]
    Placement { message: String },

    /// A value failed unification or validation
    #[error(transparent)]
    Validation(#[from] ValueError),

    /// A value that the output encoding cannot represent
    #[error("cannot encode {file} as {encoding}: {message}")]
    Encode {
        file: String,
        encoding: String,
        message: String,
    },

    /// Several errors collected before reporting
    #[error("{0}")]
    Multiple(ErrorList),

    #[error("output file {} already exists (use --force to overwrite)", path.display())]
    OutputExists { path: PathBuf },

    #[error("output file {} is written more than once", path.display())]
    DuplicateOutput { path: PathBuf },

    #[error("{}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    pub fn flag(flag: impl Into<String>, message: impl Into<String>) -> Self {
        PlanError::Flag {
            flag: flag.into(),
            message: message.into(),
        }
    }

    pub fn placement(message: impl Into<String>) -> Self {
        PlanError::Placement {
            message: message.into(),
        }
    }

    pub fn decode(pos: Pos, message: impl fmt::Display) -> Self {
        PlanError::Decode {
            pos,
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PlanError::Syntax { .. } | PlanError::Decode { .. } | PlanError::Read { .. } => {
                ErrorCategory::Decode
            }
            PlanError::Validation(_) | PlanError::Encode { .. } => ErrorCategory::Validation,
            PlanError::Multiple(list) => list
                .0
                .first()
                .map(PlanError::category)
                .unwrap_or(ErrorCategory::Validation),
            PlanError::OutputExists { .. }
            | PlanError::DuplicateOutput { .. }
            | PlanError::Io(_) => ErrorCategory::Resource,
            _ => ErrorCategory::Configuration,
        }
    }

    /// Attach the originating file to value errors that do not know it yet.
    pub fn in_file(self, file: &str) -> Self {
        match self {
            PlanError::Validation(err) => PlanError::Validation(err.in_file(file)),
            other => other,
        }
    }
}

/// An ordered collection of errors reported together.
#[derive(Debug, Default)]
pub struct ErrorList(pub Vec<PlanError>);

impl ErrorList {
    pub fn push(&mut self, err: PlanError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok` when empty, the single error, or all of them.
    pub fn into_result(mut self) -> PlanResult<()> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(PlanError::Multiple(self)),
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}
