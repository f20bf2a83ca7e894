//! File types, codecs, decoders and encoders
//!
//! Every input file is described by a [`FileSpec`]: where it comes from and
//! how its bytes are to be read. The [`CodecRegistry`] turns a spec into a
//! [`Decoder`] producing one syntax file per document; the [`Encoder`] writes
//! values back out in the requested format.

mod codec;
mod decoder;
mod encoder;
pub mod filetypes;
mod interpret;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{PlanError, PlanResult};
use crate::value::Value;

pub use codec::{Codec, CodecRegistry, DocumentStream};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use interpret::detect_interpretation;

/// Byte-level format of a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Cue,
    Json,
    Jsonl,
    Yaml,
    Toml,
    Text,
    Binary,
    Protobuf,
    TextProto,
    /// Anything else, keyed by its extension or tag.
    Other(String),
}

impl Encoding {
    pub fn as_str(&self) -> &str {
        match self {
            Encoding::Cue => "cue",
            Encoding::Json => "json",
            Encoding::Jsonl => "jsonl",
            Encoding::Yaml => "yaml",
            Encoding::Toml => "toml",
            Encoding::Text => "text",
            Encoding::Binary => "binary",
            Encoding::Protobuf => "proto",
            Encoding::TextProto => "textproto",
            Encoding::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Encoding::Other(_))
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic reading of a file's content on top of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpretation {
    /// Detect JSON Schema or OpenAPI from the content.
    Auto,
    JsonSchema,
    OpenApi,
    /// Protobuf messages encoded as JSON; needs a schema to decode.
    ProtobufJson,
}

impl Interpretation {
    pub fn as_str(self) -> &'static str {
        match self {
            Interpretation::Auto => "auto",
            Interpretation::JsonSchema => "jsonschema",
            Interpretation::OpenApi => "openapi",
            Interpretation::ProtobufJson => "pb",
        }
    }
}

/// The role a file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    Schema,
    Final,
    Data,
    Graph,
    Dag,
}

/// What a file is read or written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Input,
    Export,
    Def,
}

/// One input or output file (an orphaned file when not CUE).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileSpec {
    /// Path as given; `-` is standard input or output.
    pub path: String,
    pub encoding: Encoding,
    pub interpretation: Option<Interpretation>,
    pub form: Option<Form>,
    /// `key=value` tags.
    pub tags: BTreeMap<String, String>,
    pub bool_tags: BTreeMap<String, bool>,
    /// In-memory content, used instead of reading `path`.
    pub source: Option<Vec<u8>>,
}

impl FileSpec {
    /// A spec whose encoding follows from the file extension.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let encoding = filetypes::encoding_for_path(&path);
        Self {
            path,
            encoding,
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_interpretation(mut self, interpretation: Interpretation) -> Self {
        self.interpretation = Some(interpretation);
        self
    }

    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_source(mut self, source: impl Into<Vec<u8>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_stdio(&self) -> bool {
        self.path == "-"
    }

    /// Encodings whose documents cannot be decoded without a schema.
    pub fn requires_schema(&self) -> bool {
        self.encoding == Encoding::TextProto
            || self.interpretation == Some(Interpretation::ProtobufJson)
    }
}

/// Per-invocation encoding settings.
///
/// Built once from the command line. The schema is resolved later and set
/// exactly once; decoders consult it afterwards.
#[derive(Debug, Default, Clone)]
pub struct EncodingConfig {
    pub mode: Mode,
    schema: OnceLock<Value>,
    pub force: bool,
    pub stream: bool,
    pub merge: bool,
    pub proto_path: Vec<PathBuf>,
    pub all_errors: bool,
    pub ignore: bool,
    pub pkg_name: Option<String>,
    pub indent: usize,
    pub escape_html: bool,
}

impl EncodingConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            merge: true,
            indent: 4,
            ..Default::default()
        }
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.get()
    }

    /// Record the resolved schema. A second call is rejected.
    pub fn set_schema(&self, schema: Value) -> PlanResult<()> {
        self.schema
            .set(schema)
            .map_err(|_| PlanError::flag("schema", "schema already resolved for this invocation"))
    }

    /// Copy of the settings for a decoder that needs extra proto paths.
    pub fn with_proto_path(&self, extra: PathBuf) -> EncodingConfig {
        let mut cfg = self.clone();
        cfg.proto_path.push(extra);
        cfg
    }
}
