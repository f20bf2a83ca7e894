//! Iteration over the values a build plan produces.
//!
//! All iterators share one protocol: [`PlanIter::scan`] advances and returns
//! false when exhausted or failed, [`PlanIter::value`] is the current value,
//! [`PlanIter::err`] stays queryable after exhaustion and
//! [`PlanIter::close`] may be called any number of times.

use std::collections::VecDeque;

use tracing::{debug, trace};

use super::classify::DecoderSlot;
use crate::encoding::{CodecRegistry, Decoder, EncodingConfig};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{Expr, File};
use crate::value::{Instance, Runtime, Value};

/// The iterator selected when the plan was assembled.
#[derive(Debug)]
pub enum PlanIter {
    Instances(InstanceIter),
    Stream(StreamIter),
    Expressions(ExprIter),
}

impl PlanIter {
    pub fn scan(&mut self) -> bool {
        match self {
            PlanIter::Instances(i) => i.scan(),
            PlanIter::Stream(i) => i.scan(),
            PlanIter::Expressions(i) => i.scan(),
        }
    }

    /// The current value; `None` before the first and after the last scan.
    pub fn value(&self) -> Option<&Value> {
        match self {
            PlanIter::Instances(i) => i.value(),
            PlanIter::Stream(i) => i.value(),
            PlanIter::Expressions(i) => i.value(),
        }
    }

    /// Source syntax of the current value, when it is still meaningful.
    pub fn file(&self) -> Option<&File> {
        match self {
            PlanIter::Instances(_) | PlanIter::Expressions(_) => None,
            PlanIter::Stream(i) => i.file(),
        }
    }

    pub fn err(&self) -> Option<&PlanError> {
        match self {
            PlanIter::Instances(i) => i.err(),
            PlanIter::Stream(i) => i.err(),
            PlanIter::Expressions(i) => i.err(),
        }
    }

    pub fn take_err(&mut self) -> Option<PlanError> {
        match self {
            PlanIter::Instances(i) => i.err.take(),
            PlanIter::Stream(i) => i.err.take(),
            PlanIter::Expressions(i) => i.inner.take_err(),
        }
    }

    pub fn close(&mut self) {
        match self {
            PlanIter::Instances(i) => i.close(),
            PlanIter::Stream(i) => i.close(),
            PlanIter::Expressions(i) => i.close(),
        }
    }

    /// Name of the source of the current value.
    pub fn id(&self) -> &str {
        match self {
            PlanIter::Instances(i) => i.id(),
            PlanIter::Stream(i) => i.id(),
            PlanIter::Expressions(i) => i.inner.id(),
        }
    }

    /// Source text of the expression that produced the current value.
    pub fn expr(&self) -> Option<&str> {
        match self {
            PlanIter::Expressions(i) => i.expr(),
            _ => None,
        }
    }
}

/// Evaluated instances, in order.
///
/// Instances that failed to build are kept in place and latch their error
/// when reached.
#[derive(Debug)]
pub struct InstanceIter {
    pending: VecDeque<PlanResult<Instance>>,
    current: Option<Instance>,
    value: Option<Value>,
    orphan_schema: Option<Value>,
    err: Option<PlanError>,
}

impl InstanceIter {
    pub fn new(instances: Vec<PlanResult<Instance>>) -> Self {
        Self {
            pending: instances.into(),
            current: None,
            value: None,
            orphan_schema: None,
            err: None,
        }
    }

    /// Unify `schema` into every value produced.
    pub fn with_orphan_schema(mut self, schema: Option<Value>) -> Self {
        self.orphan_schema = schema;
        self
    }

    pub fn scan(&mut self) -> bool {
        self.current = None;
        self.value = None;
        if self.err.is_some() {
            return false;
        }
        match self.pending.pop_front() {
            None => false,
            Some(Err(err)) => {
                self.err = Some(err);
                false
            }
            Some(Ok(inst)) => {
                self.value = Some(match &self.orphan_schema {
                    Some(schema) => inst.value.unify(schema),
                    None => inst.value.clone(),
                });
                trace!(instance = %inst.id, "scanned instance");
                self.current = Some(inst);
                true
            }
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn err(&self) -> Option<&PlanError> {
        self.err.as_ref()
    }

    pub fn close(&mut self) {
        self.pending.clear();
        self.current = None;
        self.value = None;
    }

    pub fn id(&self) -> &str {
        self.current.as_ref().map_or("", |i| i.id.as_str())
    }
}

/// Documents of a list of data files, one value per document.
#[derive(Debug)]
pub struct StreamIter {
    slots: VecDeque<DecoderSlot>,
    decoder: Option<Decoder>,
    cfg: EncodingConfig,
    registry: CodecRegistry,
    runtime: Runtime,
    schema_label: Option<String>,
    id: String,
    value: Option<Value>,
    file: Option<File>,
    err: Option<PlanError>,
    closed: bool,
}

impl StreamIter {
    /// Stream `slots`; values are unified with `cfg`'s schema when it has one.
    pub fn new(
        slots: Vec<DecoderSlot>,
        cfg: EncodingConfig,
        registry: CodecRegistry,
        schema_label: Option<String>,
    ) -> Self {
        Self {
            slots: slots.into(),
            decoder: None,
            cfg,
            registry,
            runtime: Runtime::new(),
            schema_label,
            id: String::new(),
            value: None,
            file: None,
            err: None,
            closed: false,
        }
    }

    pub fn scan(&mut self) -> bool {
        self.value = None;
        self.file = None;
        if self.err.is_some() || self.closed {
            return false;
        }

        if let Some(d) = self.decoder.as_mut() {
            if !d.done() {
                d.next();
            }
        }

        loop {
            match self.decoder.as_mut() {
                Some(d) if !d.done() => break,
                Some(d) => {
                    let err = d.take_err();
                    d.close();
                    self.decoder = None;
                    if let Some(err) = err {
                        self.err = Some(err);
                        return false;
                    }
                }
                None => {}
            }
            let Some(slot) = self.slots.pop_front() else {
                return false;
            };
            let d = slot.into_decoder(&self.cfg, &self.registry);
            debug!(file = d.filename(), "streaming data file");
            self.decoder = Some(d);
        }

        let Some(d) = self.decoder.as_ref() else {
            return false;
        };
        let Some(file) = d.file().cloned() else {
            return false;
        };
        let filename = d.filename().to_string();
        let value = self.runtime.compile_file(&file);
        match self.cfg.schema() {
            Some(schema) => {
                let merged = value.unify(schema);
                // With --ignore the caller validates and skips failing values.
                if !self.cfg.ignore {
                    if let Some(err) = merged.err() {
                        self.err = Some(PlanError::Validation(err.in_file(&filename)));
                        return false;
                    }
                }
                self.id = match &self.schema_label {
                    Some(label) => format!("{}|{}", filename, label),
                    None => filename,
                };
                self.value = Some(merged);
            }
            None => {
                self.id = filename;
                self.value = Some(value);
                self.file = Some(file);
            }
        }
        true
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The decoded document; dropped once a schema has been applied.
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn err(&self) -> Option<&PlanError> {
        self.err.as_ref()
    }

    /// Release the current decoder and any decoder opened ahead of time.
    pub fn close(&mut self) {
        if let Some(d) = self.decoder.as_mut() {
            d.close();
        }
        self.decoder = None;
        for slot in self.slots.iter_mut() {
            slot.close();
        }
        self.slots.clear();
        self.value = None;
        self.file = None;
        self.closed = true;
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for StreamIter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Projects every value of an inner iterator through a list of
/// expressions: for values `v0, v1` and expressions `e0, e1` it yields
/// `e0(v0), e1(v0), e0(v1), e1(v1)`.
#[derive(Debug)]
pub struct ExprIter {
    inner: Box<PlanIter>,
    exprs: Vec<(String, Expr)>,
    index: usize,
    value: Option<Value>,
}

impl ExprIter {
    /// `exprs` pairs each expression with its source text.
    pub fn new(inner: PlanIter, exprs: Vec<(String, Expr)>) -> Self {
        let index = exprs.len();
        Self {
            inner: Box::new(inner),
            exprs,
            index,
            value: None,
        }
    }

    pub fn scan(&mut self) -> bool {
        self.value = None;
        self.index += 1;
        if self.index >= self.exprs.len() {
            if !self.inner.scan() {
                return false;
            }
            self.index = 0;
        }
        let Some(base) = self.inner.value() else {
            return false;
        };
        self.value = Some(match self.exprs.get(self.index) {
            Some((_, expr)) => base.eval(expr),
            None => base.clone(),
        });
        true
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn err(&self) -> Option<&PlanError> {
        self.inner.err()
    }

    pub fn close(&mut self) {
        self.value = None;
        self.inner.close();
    }

    pub fn expr(&self) -> Option<&str> {
        self.value
            .as_ref()
            .and(self.exprs.get(self.index))
            .map(|(text, _)| text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{FileSpec, Mode};
    use crate::syntax::{parse_expr, parse_file};

    fn inst(id: &str, src: &str) -> PlanResult<Instance> {
        Runtime::new().build(id, &[parse_file("i.cue", src).unwrap()])
    }

    fn collect(it: &mut PlanIter) -> Vec<String> {
        let mut out = Vec::new();
        while it.scan() {
            out.push(it.value().unwrap().to_string());
        }
        out
    }

    fn stream(files: &[(&str, &str)], cfg: EncodingConfig) -> PlanIter {
        let slots = files
            .iter()
            .map(|(name, src)| DecoderSlot::new(FileSpec::new(*name).with_source(*src)))
            .collect();
        PlanIter::Stream(StreamIter::new(slots, cfg, CodecRegistry::default(), Some("#S".into())))
    }

    #[test]
    fn instances_in_order_with_orphan_schema() {
        let schema = Runtime::new().compile_file(&parse_file("s.cue", "b: *2 | int").unwrap());
        let it = InstanceIter::new(vec![inst("x", "a: 1"), inst("y", "a: 2")]).with_orphan_schema(Some(schema));
        let mut it = PlanIter::Instances(it);
        assert!(it.scan());
        assert_eq!(it.id(), "x");
        assert_eq!(it.value().unwrap().to_json().unwrap(), serde_json::json!({"a": 1, "b": 2}));
        assert!(it.scan());
        assert_eq!(it.id(), "y");
        assert!(!it.scan());
        assert!(it.value().is_none());
        assert!(it.err().is_none());
    }

    #[test]
    fn instance_build_failure_is_latched() {
        let bad = Err(PlanError::TwoFilePackages);
        let mut it = PlanIter::Instances(InstanceIter::new(vec![inst("x", "a: 1"), bad, inst("z", "a: 3")]));
        assert!(it.scan());
        assert!(!it.scan());
        assert!(!it.scan());
        assert!(matches!(it.err(), Some(PlanError::TwoFilePackages)));
    }

    #[test]
    fn stream_concatenates_files_then_documents() {
        let mut it = stream(
            &[("a.yaml", "a: 1\n---\na: 2\n"), ("b.json", "{\"b\": 1} {\"b\": 2}"), ("c.json", "")],
            EncodingConfig::new(Mode::Export),
        );
        let got = collect(&mut it);
        assert_eq!(got, vec!["{\n    a: 1\n}", "{\n    a: 2\n}", "{\n    b: 1\n}", "{\n    b: 2\n}"]);
        assert!(it.err().is_none());
        it.close();
        it.close();
        assert!(!it.scan());
    }

    #[test]
    fn stream_keeps_file_without_schema_and_drops_it_with_one() {
        let mut it = stream(&[("a.json", "{\"a\": 1}")], EncodingConfig::new(Mode::Export));
        assert!(it.scan());
        assert!(it.file().is_some());
        assert_eq!(it.id(), "a.json");

        let cfg = EncodingConfig::new(Mode::Export);
        cfg.set_schema(Runtime::new().compile_file(&parse_file("s.cue", "a: int, b: *\"x\" | string").unwrap()))
            .unwrap();
        let mut it = stream(&[("a.json", "{\"a\": 1}")], cfg);
        assert!(it.scan());
        assert!(it.file().is_none());
        assert_eq!(it.id(), "a.json|#S");
        assert_eq!(it.value().unwrap().to_json().unwrap(), serde_json::json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn schema_violation_stops_the_stream() {
        let cfg = EncodingConfig::new(Mode::Export);
        cfg.set_schema(Runtime::new().compile_file(&parse_file("s.cue", "a: int").unwrap()))
            .unwrap();
        let mut it = stream(&[("a.json", "{\"a\": \"x\"}"), ("b.json", "{\"a\": 1}")], cfg);
        assert!(!it.scan());
        let err = it.err().unwrap().to_string();
        assert!(err.starts_with("a.json: a: conflicting values"), "{}", err);
        assert!(!it.scan());
    }

    #[test]
    fn decode_error_stops_before_later_files() {
        let mut it = stream(
            &[("a.json", "{\"a\": 1} {"), ("b.json", "{\"b\": 1}")],
            EncodingConfig::new(Mode::Export),
        );
        assert!(it.scan());
        assert!(!it.scan());
        assert!(matches!(it.err(), Some(PlanError::Decode { .. })));
        assert!(!it.scan());
    }

    #[test]
    fn close_before_scan_is_safe() {
        let mut it = stream(&[("a.json", "{}")], EncodingConfig::new(Mode::Export));
        it.close();
        it.close();
        assert!(!it.scan());
        assert!(it.err().is_none());
    }

    #[test]
    fn expressions_are_the_inner_loop() {
        let base = InstanceIter::new(vec![inst("v0", "x: 0, y: 10"), inst("v1", "x: 1, y: 11")]);
        let exprs = ["x", "y"]
            .iter()
            .map(|e| (e.to_string(), parse_expr("-e", e).unwrap()))
            .collect();
        let mut it = PlanIter::Expressions(ExprIter::new(PlanIter::Instances(base), exprs));
        let mut seen = Vec::new();
        while it.scan() {
            seen.push(format!("{}:{}={}", it.id(), it.expr().unwrap(), it.value().unwrap()));
        }
        assert_eq!(seen, vec!["v0:x=0", "v0:y=10", "v1:x=1", "v1:y=11"]);
        it.close();
        it.close();
    }
}
