//! Parsing of file arguments and their type qualifiers.
//!
//! Arguments have the form `file* (qualifier: file+)*` where a qualifier is
//! `tag(+tag)*` and a tag is either a name (`json`, `schema`, `jsonschema`)
//! or a `key=value` pair. A qualifier applies to every file that follows it
//! until the next qualifier. A qualifier can also be glued to a single file:
//! `json:data.txt`.

use std::path::Path;

use super::{Encoding, FileSpec, Form, Interpretation, Mode};
use crate::error::{PlanError, PlanResult};

/// Encoding implied by a path's extension.
pub fn encoding_for_path(path: &str) -> Encoding {
    if path == "-" {
        return Encoding::Cue;
    }
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "cue" => Encoding::Cue,
        "json" => Encoding::Json,
        "jsonl" | "ndjson" | "ldjson" => Encoding::Jsonl,
        "yaml" | "yml" => Encoding::Yaml,
        "toml" => Encoding::Toml,
        "txt" => Encoding::Text,
        "proto" => Encoding::Protobuf,
        "textproto" | "textpb" => Encoding::TextProto,
        other => Encoding::Other(other.to_string()),
    }
}

/// Accumulated effect of a qualifier.
#[derive(Debug, Clone, Default)]
struct TypeSpec {
    encoding: Option<Encoding>,
    interpretation: Option<Interpretation>,
    form: Option<Form>,
    spec: FileSpec,
}

impl TypeSpec {
    fn parse(qualifier: &str, mode: Mode) -> PlanResult<TypeSpec> {
        let mut t = TypeSpec::default();
        if qualifier.is_empty() {
            return Ok(t);
        }
        for tag in qualifier.split('+') {
            if let Some((key, value)) = tag.split_once('=') {
                match value {
                    "true" => {
                        t.spec.bool_tags.insert(key.to_string(), true);
                    }
                    "false" => {
                        t.spec.bool_tags.insert(key.to_string(), false);
                    }
                    _ => {
                        t.spec.tags.insert(key.to_string(), value.to_string());
                    }
                }
                continue;
            }
            match tag {
                "cue" => t.encoding = Some(Encoding::Cue),
                "json" => t.encoding = Some(Encoding::Json),
                "jsonl" => t.encoding = Some(Encoding::Jsonl),
                "yaml" => t.encoding = Some(Encoding::Yaml),
                "toml" => t.encoding = Some(Encoding::Toml),
                "text" => t.encoding = Some(Encoding::Text),
                "binary" => t.encoding = Some(Encoding::Binary),
                "proto" => t.encoding = Some(Encoding::Protobuf),
                "textproto" => t.encoding = Some(Encoding::TextProto),
                "auto" => t.interpretation = Some(Interpretation::Auto),
                "jsonschema" => t.interpretation = Some(Interpretation::JsonSchema),
                "openapi" => t.interpretation = Some(Interpretation::OpenApi),
                "pb" => t.interpretation = Some(Interpretation::ProtobufJson),
                "schema" => t.form = Some(Form::Schema),
                "final" => t.form = Some(Form::Final),
                "data" => t.form = Some(Form::Data),
                "graph" => t.form = Some(Form::Graph),
                "dag" => t.form = Some(Form::Dag),
                "stream" | "docs" | "attributes" => {
                    t.spec.bool_tags.insert(tag.to_string(), true);
                }
                other => {
                    return Err(PlanError::flag(
                        "filetype",
                        format!("unknown filetype {:?} in {:?} (mode {:?})", other, qualifier, mode),
                    ))
                }
            }
        }
        Ok(t)
    }

    fn apply(&self, path: &str) -> FileSpec {
        let mut spec = self.spec.clone();
        spec.path = path.to_string();
        spec.interpretation = self.interpretation;
        spec.encoding = match (&self.encoding, self.interpretation) {
            (Some(e), _) => e.clone(),
            (None, Some(_)) if path == "-" => Encoding::Json,
            (None, _) => encoding_for_path(path),
        };
        spec.form = self.form.or(match (&spec.encoding, spec.interpretation) {
            (_, Some(Interpretation::JsonSchema | Interpretation::OpenApi)) => Some(Form::Schema),
            (Encoding::Protobuf, _) => Some(Form::Schema),
            _ => None,
        });
        spec
    }
}

/// Parse positional arguments into file specs.
pub fn parse_args(args: &[String]) -> PlanResult<Vec<FileSpec>> {
    let mut files = Vec::new();
    let mut current = TypeSpec::default();
    let mut qualifier: Option<&str> = None;
    let mut has_files = false;

    for (i, arg) in args.iter().enumerate() {
        let Some((scope, rest)) = split_qualifier(arg) else {
            files.push(current.apply(arg));
            has_files = true;
            continue;
        };
        if scope.is_empty() || rest.contains(':') {
            return Err(PlanError::flag(
                "args",
                format!("unsupported file name {:?}: may not have ':'", arg),
            ));
        }
        if !rest.is_empty() {
            files.push(TypeSpec::parse(scope, Mode::Input)?.apply(rest));
            continue;
        }
        if i == args.len() - 1 {
            return Err(PlanError::flag(
                "args",
                format!("scoped qualifier {:?} without file", format!("{}:", scope)),
            ));
        }
        if let Some(prev) = qualifier {
            if !has_files {
                return Err(PlanError::flag(
                    "args",
                    format!("scoped qualifier {:?} without file", format!("{}:", prev)),
                ));
            }
        }
        current = TypeSpec::parse(scope, Mode::Input)?;
        qualifier = Some(scope);
        has_files = false;
    }
    Ok(files)
}

/// Directories and plain file names never carry a qualifier, so only split
/// when the part before the colon is a plausible tag list.
fn split_qualifier(arg: &str) -> Option<(&str, &str)> {
    let (scope, rest) = arg.split_once(':')?;
    if scope.contains('/') || scope.contains('\\') || scope.contains('.') {
        return None;
    }
    Some((scope, rest))
}

/// Parse a single `qualifier:file` or `file` argument.
pub fn parse_file(s: &str, mode: Mode) -> PlanResult<FileSpec> {
    let (scope, file) = match s.rfind(':') {
        Some(p) => {
            let scope = &s[..p];
            if scope.is_empty() {
                return Err(PlanError::flag(
                    "out",
                    format!("unsupported file name {:?}: may not have ':'", s),
                ));
            }
            (scope, &s[p + 1..])
        }
        None => ("", s),
    };
    if file.is_empty() {
        return Err(PlanError::flag("out", format!("empty file name in {:?}", s)));
    }
    Ok(TypeSpec::parse(scope, mode)?.apply(file))
}

/// Combine `--out` and `--outfile` into the output file spec.
///
/// `default_out` is used when neither flag names an encoding and the file
/// name does not imply one.
pub fn parse_output(
    out: Option<&str>,
    outfile: Option<&str>,
    default_out: &str,
    mode: Mode,
) -> PlanResult<FileSpec> {
    if out.is_some_and(|o| o.contains(':')) && outfile.is_some_and(|o| o.contains(':')) {
        return Err(PlanError::flag(
            "out",
            "cannot specify qualifier in both --out and --outfile",
        ));
    }
    let file = outfile.unwrap_or("-");
    let qualified = match out {
        Some(out) => format!("{}:{}", out, file),
        None if file == "-" => format!("{}:-", default_out),
        None if !encoding_for_path(file).is_known() => format!("{}:{}", default_out, file),
        None => file.to_string(),
    };
    parse_file(&qualified, mode)
}
