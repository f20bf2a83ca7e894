use std::io::Write;

use serde::Serialize as _;
use tracing::trace;

use super::{Encoding, EncodingConfig, FileSpec, Mode};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{format_file, File};
use crate::value::{Runtime, SyntaxOptions, Value};

/// Writes a stream of values in one output encoding.
pub struct Encoder<W: Write> {
    out: W,
    filename: String,
    encoding: Encoding,
    pkg_name: Option<String>,
    indent: usize,
    escape_html: bool,
    syntax: SyntaxOptions,
    count: usize,
}

fn syntax_for(mode: Mode) -> SyntaxOptions {
    match mode {
        Mode::Export => SyntaxOptions {
            final_values: true,
            ..SyntaxOptions::default()
        },
        Mode::Def | Mode::Input => SyntaxOptions::full(),
    }
}

impl<W: Write> Encoder<W> {
    pub fn new(spec: &FileSpec, cfg: &EncodingConfig, out: W) -> PlanResult<Self> {
        match spec.encoding {
            Encoding::Cue
            | Encoding::Json
            | Encoding::Jsonl
            | Encoding::Yaml
            | Encoding::Toml
            | Encoding::Text
            | Encoding::Binary => {}
            Encoding::Other(_) => {
                return Err(PlanError::UnsupportedEncoding {
                    file: spec.path.clone(),
                    encoding: spec.encoding.to_string(),
                })
            }
            Encoding::Protobuf | Encoding::TextProto => {
                return Err(PlanError::NoCodec {
                    file: spec.path.clone(),
                    encoding: spec.encoding.to_string(),
                })
            }
        }
        Ok(Self {
            out,
            filename: spec.path.clone(),
            encoding: spec.encoding.clone(),
            pkg_name: cfg.pkg_name.clone(),
            indent: cfg.indent,
            escape_html: cfg.escape_html,
            syntax: syntax_for(cfg.mode),
            count: 0,
        })
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    fn encode_err(&self, message: impl std::fmt::Display) -> PlanError {
        PlanError::Encode {
            file: self.filename.clone(),
            encoding: self.encoding.to_string(),
            message: message.to_string(),
        }
    }

    pub fn encode(&mut self, value: &Value) -> PlanResult<()> {
        let text = match &self.encoding {
            Encoding::Cue => {
                let mut file = File::from_expr(self.filename.clone(), value.to_expr(self.syntax));
                file.package = self.pkg_name.clone();
                format_file(&file, self.indent)
            }
            Encoding::Json => {
                let json = value.to_json()?;
                let indent = " ".repeat(self.indent);
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                json.serialize(&mut ser).map_err(|e| self.encode_err(e))?;
                let mut text = String::from_utf8(buf).map_err(|e| self.encode_err(e))?;
                text.push('\n');
                self.escape(text)
            }
            Encoding::Jsonl => {
                let json = value.to_json()?;
                let mut text = serde_json::to_string(&json).map_err(|e| self.encode_err(e))?;
                text.push('\n');
                self.escape(text)
            }
            Encoding::Yaml => {
                let doc = value.to_yaml()?;
                if self.count > 0 {
                    format!("---\n{}", doc)
                } else {
                    doc
                }
            }
            Encoding::Toml => {
                if self.count > 0 {
                    return Err(self.encode_err("TOML output holds a single document"));
                }
                let json = value.to_json()?;
                toml::to_string(&json).map_err(|e| self.encode_err(e))?
            }
            Encoding::Text => match value.resolved() {
                Value::String(s) => format!("{}\n", s),
                other => {
                    return Err(self.encode_err(format!(
                        "expected string, found {}",
                        other.type_name()
                    )))
                }
            },
            Encoding::Binary => {
                let bytes = match value.resolved() {
                    Value::Bytes(b) => b.clone(),
                    Value::String(s) => s.clone().into_bytes(),
                    other => {
                        return Err(self.encode_err(format!(
                            "expected bytes or string, found {}",
                            other.type_name()
                        )))
                    }
                };
                self.out.write_all(&bytes)?;
                self.count += 1;
                return Ok(());
            }
            Encoding::Protobuf | Encoding::TextProto | Encoding::Other(_) => {
                return Err(self.encode_err("no encoder"))
            }
        };
        self.out.write_all(text.as_bytes())?;
        self.count += 1;
        trace!(file = %self.filename, count = self.count, "encoded value");
        Ok(())
    }

    /// Write syntax. CUE output keeps it as is; other encodings evaluate it
    /// first.
    pub fn encode_file(&mut self, file: &File) -> PlanResult<()> {
        if self.encoding == Encoding::Cue {
            let mut file = file.clone();
            if self.pkg_name.is_some() {
                file.package = self.pkg_name.clone();
            }
            self.out.write_all(format_file(&file, self.indent).as_bytes())?;
            self.count += 1;
            return Ok(());
        }
        let value = Runtime::new().compile_file(file);
        self.encode(&value)
    }

    /// Write a `// text` line. Only CUE output has comments; other
    /// encodings ignore the call.
    pub fn comment(&mut self, text: &str) -> PlanResult<()> {
        if self.encoding == Encoding::Cue {
            writeln!(self.out, "// {}", text)?;
        }
        Ok(())
    }

    /// Number of values written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flush and hand back the writer.
    pub fn close(mut self) -> PlanResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn escape(&self, text: String) -> String {
        if !self.escape_html {
            return text;
        }
        text.replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    fn value(src: &str) -> Value {
        Runtime::new().compile_file(&parse_file("v.cue", src).unwrap())
    }

    fn encode_all(out: &str, mode: Mode, values: &[&str]) -> PlanResult<String> {
        let spec = FileSpec::new("-").with_encoding(super::super::filetypes::encoding_for_path(out));
        let mut enc = Encoder::new(&spec, &EncodingConfig::new(mode), Vec::new())?;
        for v in values {
            enc.encode(&value(v))?;
        }
        Ok(String::from_utf8(enc.close()?).unwrap())
    }

    #[test]
    fn json_stream_is_pretty_and_newline_separated() {
        let text = encode_all("x.json", Mode::Export, &["a: 1", "b: [1, 2]"]).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}\n{\n    \"b\": [\n        1,\n        2\n    ]\n}\n");
    }

    #[test]
    fn jsonl_is_one_line_per_value() {
        let text = encode_all("x.jsonl", Mode::Export, &["a: 1", "a: 2"]).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn yaml_separates_documents() {
        let text = encode_all("x.yaml", Mode::Export, &["a: 1", "b: 2"]).unwrap();
        assert_eq!(text, "a: 1\n---\nb: 2\n");
    }

    #[test]
    fn toml_holds_one_document() {
        assert_eq!(encode_all("x.toml", Mode::Export, &["a: 1"]).unwrap(), "a = 1\n");
        assert!(encode_all("x.toml", Mode::Export, &["a: 1", "b: 2"]).is_err());
    }

    #[test]
    fn text_requires_strings() {
        assert_eq!(encode_all("x.txt", Mode::Export, &["\"hi\""]).unwrap(), "hi\n");
        let err = encode_all("x.txt", Mode::Export, &["a: 1"]).unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn export_rejects_incomplete_json() {
        let err = encode_all("x.json", Mode::Export, &["a: int"]).unwrap_err();
        assert_eq!(err.to_string(), "a: incomplete value int");
    }

    #[test]
    fn cue_def_keeps_definitions() {
        let text = encode_all("x.cue", Mode::Def, &["#A: {x: int}\na: 1"]).unwrap();
        assert_eq!(text, "#A: {\n    x: int\n}\na: 1\n");
        let text = encode_all("x.cue", Mode::Export, &["#A: {x: int}\na: 1"]).unwrap();
        assert_eq!(text, "a: 1\n");
    }

    #[test]
    fn escape_html_in_json() {
        let spec = FileSpec::new("-").with_encoding(Encoding::Jsonl);
        let mut cfg = EncodingConfig::new(Mode::Export);
        cfg.escape_html = true;
        let mut enc = Encoder::new(&spec, &cfg, Vec::new()).unwrap();
        enc.encode(&value("a: \"<b>&\"")).unwrap();
        let text = String::from_utf8(enc.close().unwrap()).unwrap();
        assert_eq!(text, "{\"a\":\"\\u003cb\\u003e\\u0026\"}\n");
    }

    #[test]
    fn unknown_output_encoding() {
        let spec = FileSpec::new("out.xyz");
        assert!(matches!(
            Encoder::new(&spec, &EncodingConfig::new(Mode::Export), Vec::new()),
            Err(PlanError::UnsupportedEncoding { .. })
        ));
    }
}
