//! Codecs: byte formats to syntax documents.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Encoding;
use crate::error::{PlanError, PlanResult};
use crate::syntax::{parse_file, Decl, Expr, Field, File, Label, ListLit, Pos, StructLit};

/// A sequence of decoded documents.
pub trait DocumentStream: Send {
    /// The next document, `None` once the input is exhausted.
    fn next_document(&mut self) -> Option<PlanResult<File>>;

    /// Release the underlying input. Called once by the owning decoder.
    fn close(&mut self) {}
}

/// Turns the bytes of one file into a stream of documents.
pub trait Codec: Send + Sync {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>>;
}

/// Codecs by encoding.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<Encoding, Arc<dyn Codec>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.codecs.keys().map(Encoding::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CodecRegistry").field("codecs", &names).finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// CUE, JSON, JSON Lines, YAML, TOML, text and binary.
    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register(Encoding::Cue, CueCodec);
        r.register(Encoding::Json, JsonCodec);
        r.register(Encoding::Jsonl, JsonCodec);
        r.register(Encoding::Yaml, YamlCodec);
        r.register(Encoding::Toml, TomlCodec);
        r.register(Encoding::Text, TextCodec);
        r.register(Encoding::Binary, BinaryCodec);
        r
    }

    pub fn register(&mut self, encoding: Encoding, codec: impl Codec + 'static) {
        self.codecs.insert(encoding, Arc::new(codec));
    }

    pub fn get(&self, encoding: &Encoding) -> Option<Arc<dyn Codec>> {
        self.codecs.get(encoding).cloned()
    }
}

/// Documents computed up front.
struct Collected(std::vec::IntoIter<PlanResult<File>>);

impl DocumentStream for Collected {
    fn next_document(&mut self) -> Option<PlanResult<File>> {
        self.0.next()
    }
}

fn collected(docs: Vec<PlanResult<File>>) -> Box<dyn DocumentStream> {
    Box::new(Collected(docs.into_iter()))
}

fn utf8(filename: &str, src: Vec<u8>) -> PlanResult<String> {
    String::from_utf8(src).map_err(|e| {
        PlanError::decode(Pos::in_file(filename), format!("invalid UTF-8: {}", e.utf8_error()))
    })
}

/// 1-based line and column of a byte offset.
fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map(|i| offset - i).unwrap_or(offset + 1);
    (line, column)
}

fn pos_at(filename: &str, line: usize, column: usize) -> Pos {
    let file: Arc<str> = Arc::from(filename);
    Pos::new(&file, line, column)
}

struct CueCodec;

impl Codec for CueCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        let src = utf8(filename, src)?;
        Ok(collected(vec![parse_file(filename, &src)]))
    }
}

/// JSON and JSON Lines: whitespace-separated values, read one at a time.
struct JsonCodec;

struct JsonStream {
    filename: String,
    src: Vec<u8>,
    offset: usize,
}

impl DocumentStream for JsonStream {
    fn next_document(&mut self) -> Option<PlanResult<File>> {
        let rest = &self.src[self.offset..];
        let mut stream = serde_json::Deserializer::from_slice(rest).into_iter::<serde_json::Value>();
        match stream.next()? {
            Ok(value) => {
                let start = self.offset;
                self.offset += stream.byte_offset();
                match json_to_expr(value, &self.filename) {
                    Ok(expr) => Some(Ok(File::from_expr(self.filename.clone(), expr))),
                    Err(overflow) => {
                        let pos = literal_pos(&self.filename, &self.src[..self.offset], start, &overflow.0);
                        self.offset = self.src.len();
                        Some(Err(PlanError::decode(pos, overflow.to_string())))
                    }
                }
            }
            Err(err) => {
                // Report against the whole file, then stop.
                let consumed = &self.src[..self.offset];
                let lines_before = consumed.iter().filter(|&&b| b == b'\n').count();
                let line = lines_before + err.line();
                let column = if err.line() == 1 {
                    let line_start = consumed.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
                    err.column() + (self.offset - line_start)
                } else {
                    err.column()
                };
                self.offset = self.src.len();
                Some(Err(PlanError::decode(
                    pos_at(&self.filename, line, column),
                    strip_location(&err.to_string()),
                )))
            }
        }
    }
}

fn strip_location(msg: &str) -> String {
    match msg.rfind(" at line ") {
        Some(i) => msg[..i].to_string(),
        None => msg.to_string(),
    }
}

impl Codec for JsonCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        Ok(Box::new(JsonStream {
            filename: filename.to_string(),
            src,
            offset: 0,
        }))
    }
}

/// An integer literal outside the signed 64-bit range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IntegerOverflow(pub String);

impl fmt::Display for IntegerOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "integer {} overflows int64", self.0)
    }
}

/// Position of the first standalone occurrence of a number literal at or
/// after `from`.
fn literal_pos(filename: &str, src: &[u8], from: usize, text: &str) -> Pos {
    let Ok(src) = std::str::from_utf8(src) else {
        return Pos::in_file(filename);
    };
    let Some(rest) = src.get(from..) else {
        return Pos::in_file(filename);
    };
    let number_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '"' | '.' | '-' | '+');
    let found = rest.match_indices(text).map(|(i, _)| from + i).find(|&i| {
        let before = src[..i].chars().next_back();
        let after = src[i + text.len()..].chars().next();
        !before.is_some_and(number_char) && !after.is_some_and(number_char)
    });
    match found {
        Some(i) => {
            let (line, column) = line_col(src, i);
            pos_at(filename, line, column)
        }
        None => Pos::in_file(filename),
    }
}

pub(crate) fn json_to_expr(value: serde_json::Value, filename: &str) -> Result<Expr, IntegerOverflow> {
    use serde_json::Value as J;
    let pos = || Pos::in_file(filename);
    Ok(match value {
        J::Null => Expr::Null(pos()),
        J::Bool(b) => Expr::Bool(b, pos()),
        J::Number(n) => match n.as_i64() {
            Some(i) => Expr::Int(i, pos()),
            None if n.is_u64() => return Err(IntegerOverflow(n.to_string())),
            None => Expr::Float(n.as_f64().unwrap_or(f64::NAN), pos()),
        },
        J::String(s) => Expr::Str(s, pos()),
        J::Array(items) => Expr::List(ListLit {
            elems: items
                .into_iter()
                .map(|v| json_to_expr(v, filename))
                .collect::<Result<_, _>>()?,
            rest: None,
            pos: pos(),
        }),
        J::Object(map) => Expr::Struct(StructLit {
            decls: map
                .into_iter()
                .map(|(k, v)| json_to_expr(v, filename).map(|v| data_field(k, v, pos())))
                .collect::<Result<_, _>>()?,
            pos: pos(),
        }),
    })
}

fn data_field(key: String, value: Expr, pos: Pos) -> Decl {
    Decl::Field(Field {
        label: Label::data(key),
        optional: false,
        value,
        pos,
    })
}

/// YAML: every `---` separated document.
struct YamlCodec;

impl Codec for YamlCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        use serde::Deserialize;

        let src = utf8(filename, src)?;
        let mut docs = Vec::new();
        for doc in serde_yaml_ng::Deserializer::from_str(&src) {
            match serde_yaml_ng::Value::deserialize(doc) {
                Ok(value) => match yaml_to_expr(value, filename) {
                    Ok(expr) => docs.push(Ok(File::from_expr(filename, expr))),
                    Err(overflow) => {
                        let pos = literal_pos(filename, src.as_bytes(), 0, &overflow.0);
                        docs.push(Err(PlanError::decode(pos, overflow.to_string())));
                        break;
                    }
                },
                Err(err) => {
                    let pos = match err.location() {
                        Some(loc) => pos_at(filename, loc.line(), loc.column()),
                        None => Pos::in_file(filename),
                    };
                    docs.push(Err(PlanError::decode(pos, strip_location(&err.to_string()))));
                    break;
                }
            }
        }
        Ok(collected(docs))
    }
}

fn yaml_key(key: serde_yaml_ng::Value) -> String {
    use serde_yaml_ng::Value as Y;
    match key {
        Y::String(s) => s,
        Y::Bool(b) => b.to_string(),
        Y::Number(n) => n.to_string(),
        Y::Null => "null".to_string(),
        other => serde_yaml_ng::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn yaml_to_expr(value: serde_yaml_ng::Value, filename: &str) -> Result<Expr, IntegerOverflow> {
    use serde_yaml_ng::Value as Y;
    let pos = || Pos::in_file(filename);
    Ok(match value {
        Y::Null => Expr::Null(pos()),
        Y::Bool(b) => Expr::Bool(b, pos()),
        Y::Number(n) => match n.as_i64() {
            Some(i) => Expr::Int(i, pos()),
            None if n.is_u64() => return Err(IntegerOverflow(n.to_string())),
            None => Expr::Float(n.as_f64().unwrap_or(f64::NAN), pos()),
        },
        Y::String(s) => Expr::Str(s, pos()),
        Y::Sequence(items) => Expr::List(ListLit {
            elems: items
                .into_iter()
                .map(|v| yaml_to_expr(v, filename))
                .collect::<Result<_, _>>()?,
            rest: None,
            pos: pos(),
        }),
        Y::Mapping(map) => Expr::Struct(StructLit {
            decls: map
                .into_iter()
                .map(|(k, v)| yaml_to_expr(v, filename).map(|v| data_field(yaml_key(k), v, pos())))
                .collect::<Result<_, _>>()?,
            pos: pos(),
        }),
        Y::Tagged(tagged) => return yaml_to_expr(tagged.value, filename),
    })
}

/// TOML: a single table per file.
struct TomlCodec;

impl Codec for TomlCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        let src = utf8(filename, src)?;
        let doc = match toml::from_str::<toml::Value>(&src) {
            Ok(value) => Ok(File::from_expr(filename, toml_to_expr(value, filename))),
            Err(err) => {
                let pos = match err.span() {
                    Some(span) => {
                        let (line, col) = line_col(&src, span.start);
                        pos_at(filename, line, col)
                    }
                    None => Pos::in_file(filename),
                };
                Err(PlanError::decode(pos, err.message()))
            }
        };
        Ok(collected(vec![doc]))
    }
}

fn toml_to_expr(value: toml::Value, filename: &str) -> Expr {
    use toml::Value as T;
    let pos = || Pos::in_file(filename);
    match value {
        T::String(s) => Expr::Str(s, pos()),
        T::Integer(i) => Expr::Int(i, pos()),
        T::Float(f) => Expr::Float(f, pos()),
        T::Boolean(b) => Expr::Bool(b, pos()),
        T::Datetime(d) => Expr::Str(d.to_string(), pos()),
        T::Array(items) => Expr::List(ListLit {
            elems: items.into_iter().map(|v| toml_to_expr(v, filename)).collect(),
            rest: None,
            pos: pos(),
        }),
        T::Table(table) => Expr::Struct(StructLit {
            decls: table
                .into_iter()
                .map(|(k, v)| data_field(k, toml_to_expr(v, filename), pos()))
                .collect(),
            pos: pos(),
        }),
    }
}

/// The whole file as one string.
struct TextCodec;

impl Codec for TextCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        let src = utf8(filename, src)?;
        let file = File::from_expr(filename, Expr::Str(src, Pos::in_file(filename)));
        Ok(collected(vec![Ok(file)]))
    }
}

/// The whole file as one byte string.
struct BinaryCodec;

impl Codec for BinaryCodec {
    fn open(&self, filename: &str, src: Vec<u8>) -> PlanResult<Box<dyn DocumentStream>> {
        let file = File::from_expr(filename, Expr::Bytes(src, Pos::in_file(filename)));
        Ok(collected(vec![Ok(file)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::format_file;

    fn decode_all(enc: Encoding, src: &str) -> Vec<PlanResult<File>> {
        let codec = CodecRegistry::with_builtins().get(&enc).unwrap();
        let mut stream = codec.open("in", src.as_bytes().to_vec()).unwrap();
        std::iter::from_fn(|| stream.next_document()).collect()
    }

    #[test]
    fn json_streams_concatenated_values() {
        let docs = decode_all(Encoding::Jsonl, "{\"a\": 1}\n{\"a\": 2}\n");
        assert_eq!(docs.len(), 2);
        let second = docs[1].as_ref().unwrap();
        assert_eq!(format_file(second, 4), "a: 2\n");
    }

    #[test]
    fn json_error_has_position() {
        let docs = decode_all(Encoding::Json, "{\"a\": 1}\n{\"a\": }");
        assert!(docs[0].is_ok());
        let err = docs[1].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "in:2:7: expected value");
    }

    #[test]
    fn json_integer_beyond_int64_is_a_decode_error() {
        let docs = decode_all(
            Encoding::Jsonl,
            "{\"a\": 1}\n{\"s\": \"18446744073709551615\", \"big\": 18446744073709551615}\n{\"a\": 3}",
        );
        assert_eq!(docs.len(), 2);
        assert!(docs[0].is_ok());
        let err = docs[1].as_ref().unwrap_err();
        assert_eq!(
            err.to_string(),
            "in:2:38: integer 18446744073709551615 overflows int64"
        );

        let docs = decode_all(Encoding::Json, "{\"max\": 9223372036854775807, \"f\": 1e300}");
        assert!(docs[0].is_ok());
    }

    #[test]
    fn yaml_integer_beyond_int64_is_a_decode_error() {
        let docs = decode_all(Encoding::Yaml, "a: 1\nn: 18446744073709551615\n");
        let err = docs[0].as_ref().unwrap_err();
        assert_eq!(err.to_string(), "in:2:4: integer 18446744073709551615 overflows int64");
    }

    #[test]
    fn yaml_documents() {
        let docs = decode_all(Encoding::Yaml, "a: 1\n---\nb: [x, 2.5]\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(format_file(docs[1].as_ref().unwrap(), 4), "b: [\"x\", 2.5]\n");
    }

    #[test]
    fn data_keys_never_become_definitions() {
        let docs = decode_all(Encoding::Json, "{\"#a\": 1, \"_b\": 2}");
        assert_eq!(format_file(docs[0].as_ref().unwrap(), 4), "\"#a\": 1\n\"_b\": 2\n");
    }

    #[test]
    fn toml_table() {
        let docs = decode_all(Encoding::Toml, "name = \"x\"\n[server]\nport = 80\n");
        assert_eq!(
            format_file(docs[0].as_ref().unwrap(), 4),
            "name: \"x\"\nserver: {\n    port: 80\n}\n"
        );
    }

    #[test]
    fn text_and_binary_are_single_documents() {
        let docs = decode_all(Encoding::Text, "hello\n");
        assert_eq!(format_file(docs[0].as_ref().unwrap(), 4), "\"hello\\n\"\n");
        let docs = decode_all(Encoding::Binary, "hi");
        assert_eq!(format_file(docs[0].as_ref().unwrap(), 4), "'hi'\n");
    }

    #[test]
    fn protobuf_has_no_builtin_codec() {
        assert!(CodecRegistry::with_builtins().get(&Encoding::Protobuf).is_none());
    }
}
