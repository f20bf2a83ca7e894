//! Evaluated configuration values
//!
//! A [`Value`] is the result of evaluating syntax: a point in the value
//! lattice between top (`_`) and bottom (`_|_`). Values are immutable;
//! [`Value::unify`] computes the meet of two values.

mod eval;
mod export;
mod unify;

use std::fmt;

use crate::syntax::{format_expr, BoundOp, Expr, Kind};

pub use eval::{Instance, Runtime};
pub use export::SyntaxOptions;

/// An error attached to a value, with the field path leading to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub path: Vec<String>,
    pub message: String,
    /// File the failing value came from, when known.
    pub file: Option<String>,
}

impl ValueError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
            file: None,
        }
    }

    pub fn at(mut self, path: &[String]) -> Self {
        let mut full = path.to_vec();
        full.append(&mut self.path);
        self.path = full;
        self
    }

    pub fn in_file(mut self, file: &str) -> Self {
        if self.file.is_none() && !file.is_empty() {
            self.file = Some(file.to_string());
        }
        self
    }
}

impl std::error::Error for ValueError {}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file)?;
        }
        if !self.path.is_empty() {
            write!(f, "{}: ", self.path.join("."))?;
        }
        f.write_str(&self.message)
    }
}

/// How a struct field participates in output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Regular,
    /// `#Name`: a closed type, never emitted as data.
    Definition,
    /// `_name`: visible to references only.
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    pub name: String,
    pub value: Value,
    pub optional: bool,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    pub fields: Vec<FieldValue>,
    /// Closed structs reject fields they do not declare.
    pub closed: bool,
}

impl StructValue {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields emitted as data: regular and not optional.
    pub fn regular(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Regular && !f.optional)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListValue {
    pub elems: Vec<Value>,
    /// Element constraint for an open list.
    pub rest: Option<Box<Value>>,
}

/// A numeric or string bound such as `>=1` or `!=""`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub op: BoundOp,
    pub limit: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disjunct {
    pub value: Value,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Top,
    Bottom(ValueError),
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// A kind and/or bounds that a concrete value must satisfy.
    Constraint {
        kind: Option<Kind>,
        bounds: Vec<Bound>,
    },
    Disjunction(Vec<Disjunct>),
    List(ListValue),
    Struct(StructValue),
}

impl Default for Value {
    fn default() -> Self {
        Value::Top
    }
}

/// Options for [`Value::validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Require every regular field to be concrete.
    pub concrete: bool,
    /// Descend into definitions as well.
    pub definitions: bool,
}

impl Value {
    pub fn bottom(message: impl Into<String>) -> Value {
        Value::Bottom(ValueError::new(message))
    }

    pub fn kind(kind: Kind) -> Value {
        Value::Constraint {
            kind: Some(kind),
            bounds: Vec::new(),
        }
    }

    pub fn empty_struct() -> Value {
        Value::Struct(StructValue::default())
    }

    /// Struct from `(name, value)` pairs of regular fields.
    pub fn structure<I, S>(fields: I) -> Value
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Struct(StructValue {
            fields: fields
                .into_iter()
                .map(|(name, value)| FieldValue {
                    name: name.into(),
                    value,
                    optional: false,
                    kind: FieldKind::Regular,
                })
                .collect(),
            closed: false,
        })
    }

    pub fn list(elems: Vec<Value>) -> Value {
        Value::List(ListValue { elems, rest: None })
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Value::Bottom(_))
    }

    pub fn is_concrete(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::Float(_)
                | Value::String(_)
                | Value::Bytes(_)
                | Value::List(_)
                | Value::Struct(_)
        )
    }

    /// The first error anywhere inside this value, with its path.
    pub fn err(&self) -> Option<ValueError> {
        self.first_error(&mut Vec::new())
    }

    fn first_error(&self, path: &mut Vec<String>) -> Option<ValueError> {
        match self {
            Value::Bottom(e) => Some(e.clone().at(path)),
            Value::Struct(s) => s.fields.iter().find_map(|f| {
                path.push(f.name.clone());
                let found = f.value.first_error(path);
                path.pop();
                found
            }),
            Value::List(l) => l.elems.iter().enumerate().find_map(|(i, v)| {
                path.push(i.to_string());
                let found = v.first_error(path);
                path.pop();
                found
            }),
            _ => None,
        }
    }

    /// Resolve a disjunction to its single default, if it has one.
    pub fn default_value(&self) -> Value {
        self.resolved().clone()
    }

    /// Borrowing form of [`Value::default_value`].
    pub fn resolved(&self) -> &Value {
        if let Value::Disjunction(ds) = self {
            let mut defaults = ds.iter().filter(|d| d.default);
            if let (Some(only), None) = (defaults.next(), defaults.next()) {
                return only.value.resolved();
            }
        }
        self
    }

    /// Look up a regular, hidden or definition field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(s) => s.get(name).map(|f| &f.value),
            _ => None,
        }
    }

    /// Follow a dotted path of field names and list indexes.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = self;
        for seg in path {
            cur = match cur {
                Value::Struct(s) => &s.get(seg)?.value,
                Value::List(l) => l.elems.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check the value for errors, and for concreteness when asked to.
    pub fn validate(&self, opts: ValidateOptions) -> Result<(), ValueError> {
        match self.errors(opts).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every error [`Value::validate`] would report.
    pub fn errors(&self, opts: ValidateOptions) -> Vec<ValueError> {
        let mut out = Vec::new();
        self.collect_errors(opts, &mut Vec::new(), &mut out);
        out
    }

    fn collect_errors(&self, opts: ValidateOptions, path: &mut Vec<String>, out: &mut Vec<ValueError>) {
        let value = if opts.concrete { self.resolved() } else { self };
        match value {
            Value::Bottom(e) => out.push(e.clone().at(path)),
            Value::Struct(s) => {
                for f in &s.fields {
                    let check = match f.kind {
                        FieldKind::Regular => !(f.optional && opts.concrete),
                        FieldKind::Hidden => !opts.concrete,
                        FieldKind::Definition => opts.definitions,
                    };
                    if !check {
                        continue;
                    }
                    path.push(f.name.clone());
                    f.value.collect_errors(opts, path, out);
                    path.pop();
                }
            }
            Value::List(l) => {
                for (i, v) in l.elems.iter().enumerate() {
                    path.push(i.to_string());
                    v.collect_errors(opts, path, out);
                    path.pop();
                }
            }
            v if opts.concrete && !v.is_concrete() => out.push(
                ValueError::new(format!("incomplete value {}", v.describe())).at(path),
            ),
            _ => {}
        }
    }

    /// Short rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Struct(_) => "struct".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Bottom(e) => format!("_|_ ({})", e.message),
            other => format_expr(&other.to_expr(SyntaxOptions::default()), 4),
        }
    }

    /// Name of the value's type for mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Top => "_",
            Value::Bottom(_) => "_|_",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Constraint { kind: Some(k), .. } => k.as_str(),
            Value::Constraint { kind: None, bounds } => bounds
                .first()
                .map(|b| b.limit.type_name())
                .unwrap_or("_"),
            Value::Disjunction(_) => "disjunction",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    /// Evaluate `expr` with this value as the lookup scope.
    pub fn eval(&self, expr: &Expr) -> Value {
        eval::eval_in_value(self, expr)
    }

    /// Mark this value and every struct it contains as closed.
    pub fn close(self) -> Value {
        match self {
            Value::Struct(mut s) => {
                s.closed = true;
                for f in &mut s.fields {
                    f.value = std::mem::take(&mut f.value).close();
                }
                Value::Struct(s)
            }
            Value::List(mut l) => {
                l.elems = l.elems.into_iter().map(Value::close).collect();
                l.rest = l.rest.map(|r| Box::new(r.close()));
                Value::List(l)
            }
            Value::Disjunction(ds) => Value::Disjunction(
                ds.into_iter()
                    .map(|d| Disjunct {
                        value: d.value.close(),
                        default: d.default,
                    })
                    .collect(),
            ),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_expr(&self.to_expr(SyntaxOptions::default()), 4))
    }
}
