use std::io::Read as _;
use std::path::PathBuf;

use tracing::{debug, trace};

use super::codec::{CodecRegistry, DocumentStream};
use super::interpret::interpret;
use super::{Encoding, EncodingConfig, FileSpec, Interpretation};
use crate::error::{PlanError, PlanResult};
use crate::syntax::File;
use crate::value::Value;

/// Reads the documents of one file.
///
/// The first document is decoded on open. Errors are latched: once set,
/// [`Decoder::done`] reports true and [`Decoder::err`] keeps returning the
/// error. The input is released exactly once, by [`Decoder::close`] or on
/// drop.
pub struct Decoder {
    filename: String,
    requested: Option<Interpretation>,
    schema: Option<Value>,
    stream: Option<Box<dyn DocumentStream>>,
    file: Option<File>,
    interpretation: Option<Interpretation>,
    err: Option<PlanError>,
    index: usize,
    closed: bool,
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("filename", &self.filename)
            .field("index", &self.index)
            .field("done", &self.done())
            .field("closed", &self.closed)
            .finish()
    }
}

fn read_source(spec: &FileSpec) -> PlanResult<Vec<u8>> {
    if let Some(src) = &spec.source {
        return Ok(src.clone());
    }
    if spec.is_stdio() {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read(&spec.path).map_err(|source| PlanError::Read {
        path: PathBuf::from(&spec.path),
        source,
    })
}

impl Decoder {
    /// Open `spec` with the codec registered for its encoding.
    ///
    /// Never fails directly; problems are reported through [`Decoder::err`].
    pub fn open(spec: &FileSpec, cfg: &EncodingConfig, registry: &CodecRegistry) -> Decoder {
        let mut d = Decoder {
            filename: spec.path.clone(),
            requested: spec.interpretation,
            schema: cfg.schema().cloned(),
            stream: None,
            file: None,
            interpretation: None,
            err: None,
            index: 0,
            closed: false,
        };
        match d.open_stream(spec, registry) {
            Ok(stream) => {
                debug!(file = %spec.path, encoding = %spec.encoding, "opened decoder");
                d.stream = Some(stream);
                d.advance();
            }
            Err(err) => d.err = Some(err),
        }
        d
    }

    fn open_stream(
        &self,
        spec: &FileSpec,
        registry: &CodecRegistry,
    ) -> PlanResult<Box<dyn DocumentStream>> {
        let codec = match registry.get(&spec.encoding) {
            Some(codec) => codec,
            None if matches!(spec.encoding, Encoding::Other(_)) => {
                return Err(PlanError::UnsupportedEncoding {
                    file: spec.path.clone(),
                    encoding: spec.encoding.to_string(),
                })
            }
            None => {
                return Err(PlanError::NoCodec {
                    file: spec.path.clone(),
                    encoding: spec.encoding.to_string(),
                })
            }
        };
        let src = read_source(spec)?;
        codec.open(&spec.path, src)
    }

    fn advance(&mut self) {
        self.file = None;
        self.interpretation = None;
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let doc = match stream.next_document() {
            None => return,
            Some(doc) => doc,
        };
        match doc.and_then(|f| interpret(f, self.requested, self.schema.as_ref())) {
            Ok((file, interpretation)) => {
                trace!(file = %self.filename, index = self.index, "decoded document");
                self.file = Some(file);
                self.interpretation = interpretation;
            }
            Err(err) => self.err = Some(err),
        }
    }

    /// True when there is no current document.
    pub fn done(&self) -> bool {
        self.file.is_none() || self.err.is_some()
    }

    /// Move to the next document.
    pub fn next(&mut self) {
        if self.done() || self.closed {
            self.file = None;
            return;
        }
        self.index += 1;
        self.advance();
    }

    /// The current document.
    pub fn file(&self) -> Option<&File> {
        if self.err.is_some() {
            return None;
        }
        self.file.as_ref()
    }

    /// The interpretation applied to the current document, if any.
    ///
    /// For `auto` this is what was detected, so plain data reports `None`.
    pub fn interpretation(&self) -> Option<Interpretation> {
        self.interpretation
    }

    pub fn err(&self) -> Option<&PlanError> {
        self.err.as_ref()
    }

    pub fn take_err(&mut self) -> Option<PlanError> {
        self.err.take()
    }

    /// Zero-based index of the current document within the file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the input. Further calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.file = None;
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            debug!(file = %self.filename, documents = self.index + 1, "closed decoder");
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.close();
    }
}
