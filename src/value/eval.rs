//! Evaluation of syntax into values.
//!
//! References resolve lexically: an identifier names the closest enclosing
//! struct literal (or file) that declares a field with that label. The value
//! it denotes is the unification of every declaration of that label in the
//! literal. Field values are computed once per literal and memoised; a
//! reference back into a field that is still being computed evaluates to
//! top, which leaves the field incomplete rather than looping.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::unify::disjunction;
use super::{Bound, Disjunct, FieldKind, FieldValue, ListValue, StructValue, Value};
use crate::error::{PlanError, PlanResult};
use crate::syntax::{Decl, Expr, File, Label};

/// An evaluated package or file set.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Display name used in diagnostics and `// <id>` headers.
    pub id: String,
    pub pkg_name: Option<String>,
    pub value: Value,
    pub files: Vec<File>,
}

impl Instance {
    /// The first error of the instance value, attributed to the instance.
    pub fn err(&self) -> Option<PlanError> {
        self.value
            .err()
            .map(|e| PlanError::Validation(e.in_file(&self.id)))
    }
}

/// Entry point to the evaluation engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct Runtime;

impl Runtime {
    pub fn new() -> Self {
        Runtime
    }

    /// Unify the top-level declarations of all `files` into one instance.
    pub fn build(&self, id: &str, files: &[File]) -> PlanResult<Instance> {
        let mut pkg: Option<&str> = None;
        for file in files {
            if let Some(name) = file.package.as_deref() {
                match pkg {
                    None => pkg = Some(name),
                    Some(first) if first != name => {
                        return Err(PlanError::AmbiguousPackage {
                            first: first.to_string(),
                            second: name.to_string(),
                            dir: id.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let decls: Vec<&Decl> = files.iter().flat_map(|f| f.decls.iter()).collect();
        let root = Frame::decls(decls.clone(), None);
        let value = struct_from_decls(&root, &decls);
        debug!(instance = id, files = files.len(), "built instance");

        Ok(Instance {
            id: id.to_string(),
            pkg_name: pkg.map(str::to_string),
            value,
            files: files.to_vec(),
        })
    }

    pub fn compile_file(&self, file: &File) -> Value {
        let decls: Vec<&Decl> = file.decls.iter().collect();
        let root = Frame::decls(decls.clone(), None);
        struct_from_decls(&root, &decls)
    }

    pub fn compile_expr(&self, expr: &Expr) -> Value {
        let root = Frame::decls(Vec::new(), None);
        eval(expr, &root)
    }
}

pub(super) fn eval_in_value(scope: &Value, expr: &Expr) -> Value {
    let frame = Frame {
        scope: Scope::Value(scope),
        parent: None,
    };
    eval(expr, &frame)
}

enum Scope<'a> {
    Decls {
        decls: Vec<&'a Decl>,
        memo: RefCell<HashMap<String, Value>>,
        active: RefCell<HashSet<String>>,
    },
    Value(&'a Value),
}

struct Frame<'a> {
    scope: Scope<'a>,
    parent: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    fn decls(decls: Vec<&'a Decl>, parent: Option<&'a Frame<'a>>) -> Self {
        Frame {
            scope: Scope::Decls {
                decls,
                memo: RefCell::new(HashMap::new()),
                active: RefCell::new(HashSet::new()),
            },
            parent,
        }
    }
}

fn field_kind(label: &Label) -> FieldKind {
    match label {
        Label::Ident(name) if name.starts_with('#') => FieldKind::Definition,
        Label::Ident(name) if name.starts_with('_') && name.len() > 1 => FieldKind::Hidden,
        _ => FieldKind::Regular,
    }
}

/// Whether `decl` declares a field an identifier `name` can refer to.
fn declares(decl: &Decl, name: &str) -> bool {
    match decl {
        Decl::Field(f) => match &f.label {
            Label::Ident(n) => n == name,
            Label::Str(s) => s == name && !name.starts_with('#') && !name.starts_with('_'),
        },
        Decl::Embed(_) => false,
    }
}

fn lookup<'a>(frame: &'a Frame<'a>, name: &str) -> Option<Value> {
    let mut cur = Some(frame);
    while let Some(f) = cur {
        match &f.scope {
            Scope::Value(v) => {
                if let Some(found) = v.resolved().field(name) {
                    return Some(found.clone());
                }
            }
            Scope::Decls { decls, .. } => {
                if decls.iter().any(|d| declares(d, name)) {
                    return Some(field_value(f, name));
                }
            }
        }
        cur = f.parent;
    }
    None
}

fn field_value<'a>(frame: &'a Frame<'a>, name: &str) -> Value {
    let Scope::Decls {
        decls,
        memo,
        active,
    } = &frame.scope
    else {
        return Value::Top;
    };
    if let Some(v) = memo.borrow().get(name).cloned() {
        return v;
    }
    if !active.borrow_mut().insert(name.to_string()) {
        return Value::Top;
    }

    let mut value = Value::Top;
    let mut definition = false;
    for decl in decls {
        if let Decl::Field(f) = decl {
            if f.label.name() == name {
                definition |= f.label.is_definition();
                value = value.unify(&eval(&f.value, frame));
            }
        }
    }
    if definition {
        value = value.close();
    }

    active.borrow_mut().remove(name);
    memo.borrow_mut().insert(name.to_string(), value.clone());
    value
}

fn struct_from_decls<'a>(frame: &'a Frame<'a>, decls: &[&'a Decl]) -> Value {
    let mut fields: Vec<FieldValue> = Vec::new();
    let mut embeds: Vec<&Expr> = Vec::new();
    for decl in decls {
        match decl {
            Decl::Field(f) => {
                let name = f.label.name();
                match fields.iter_mut().find(|x| x.name == name) {
                    Some(existing) => existing.optional &= f.optional,
                    None => fields.push(FieldValue {
                        name: name.to_string(),
                        value: Value::Top,
                        optional: f.optional,
                        kind: field_kind(&f.label),
                    }),
                }
            }
            Decl::Embed(e) => embeds.push(e),
        }
    }
    for f in &mut fields {
        f.value = field_value(frame, &f.name);
    }

    let fields = Value::Struct(StructValue {
        fields,
        closed: false,
    });
    if embeds.is_empty() {
        return fields;
    }
    let mut embedded = Value::Top;
    for e in embeds {
        embedded = embedded.unify(&eval(e, frame));
    }
    // Scalars and lists embed beside definitions only; the definitions
    // stay reachable through references.
    let only_meta = matches!(&fields, Value::Struct(s) if s.fields.iter().all(|f| f.kind != FieldKind::Regular));
    match embedded.resolved() {
        Value::Struct(_) | Value::Top | Value::Bottom(_) => fields.unify(&embedded),
        _ if only_meta => embedded,
        _ => fields.unify(&embedded),
    }
}

fn eval<'a>(expr: &'a Expr, frame: &'a Frame<'a>) -> Value {
    match expr {
        Expr::Null(_) => Value::Null,
        Expr::Bool(b, _) => Value::Bool(*b),
        Expr::Int(i, _) => Value::Int(*i),
        Expr::Float(f, _) => Value::Float(*f),
        Expr::Str(s, _) => Value::String(s.clone()),
        Expr::Bytes(b, _) => Value::Bytes(b.clone()),
        Expr::Top(_) => Value::Top,
        Expr::Bottom(_) => Value::bottom("explicit error (_|_ literal) in source"),
        Expr::Kind(k, _) => Value::kind(*k),
        Expr::Struct(lit) => {
            let decls: Vec<&Decl> = lit.decls.iter().collect();
            let child = Frame::decls(decls.clone(), Some(frame));
            struct_from_decls(&child, &decls)
        }
        Expr::List(l) => Value::List(ListValue {
            elems: l.elems.iter().map(|e| eval(e, frame)).collect(),
            rest: l.rest.as_ref().map(|r| Box::new(eval(r, frame))),
        }),
        Expr::Ident(name, _) => lookup(frame, name)
            .unwrap_or_else(|| Value::bottom(format!("reference {:?} not found", name))),
        Expr::Select(x, name, _) => select(&eval(x, frame), name),
        Expr::Index(x, i, _) => index(&eval(x, frame), &eval(i, frame)),
        Expr::Unify(a, b) => eval(a, frame).unify(&eval(b, frame)),
        Expr::Disjoin(..) => {
            let mut items = Vec::new();
            collect_disjuncts(expr, frame, &mut items, false);
            disjunction(items)
        }
        Expr::Default(x) => eval(x, frame),
        Expr::Bound(op, x, _) => match eval(x, frame).resolved() {
            limit @ (Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Bytes(_)) => {
                Value::Constraint {
                    kind: None,
                    bounds: vec![Bound {
                        op: *op,
                        limit: limit.clone(),
                    }],
                }
            }
            Value::Bottom(e) => Value::Bottom(e.clone()),
            other => Value::bottom(format!(
                "invalid operand {} for bound {}",
                other.describe(),
                op.as_str()
            )),
        },
        Expr::Neg(x, _) => match eval(x, frame).resolved() {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .unwrap_or_else(|| Value::bottom("integer overflow")),
            Value::Float(f) => Value::Float(-f),
            Value::Bottom(e) => Value::Bottom(e.clone()),
            other => Value::bottom(format!("invalid operand {} for '-'", other.describe())),
        },
    }
}

fn collect_disjuncts<'a>(expr: &'a Expr, frame: &'a Frame<'a>, out: &mut Vec<Disjunct>, default: bool) {
    match expr {
        Expr::Disjoin(a, b) => {
            collect_disjuncts(a, frame, out, default);
            collect_disjuncts(b, frame, out, default);
        }
        Expr::Default(x) => collect_disjuncts(x, frame, out, true),
        other => out.push(Disjunct {
            value: eval(other, frame),
            default,
        }),
    }
}

fn select(base: &Value, name: &str) -> Value {
    match base.resolved() {
        Value::Struct(s) => match s.get(name) {
            Some(f) => f.value.clone(),
            None => Value::bottom(format!("undefined field: {}", name)),
        },
        Value::Bottom(e) => Value::Bottom(e.clone()),
        Value::Top | Value::Constraint { .. } | Value::Disjunction(_) => Value::Top,
        other => Value::bottom(format!(
            "invalid selector {}: value of type {} has no fields",
            name,
            other.type_name()
        )),
    }
}

fn index(base: &Value, idx: &Value) -> Value {
    match (base.resolved(), idx.resolved()) {
        (Value::Bottom(e), _) | (_, Value::Bottom(e)) => Value::Bottom(e.clone()),
        (Value::List(l), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| l.elems.get(i).cloned())
            .unwrap_or_else(|| Value::bottom(format!("index {} out of range", i))),
        (Value::Struct(_), Value::String(name)) => select(base, name),
        (b, i) => Value::bottom(format!(
            "invalid index {} for value of type {}",
            i.describe(),
            b.type_name()
        )),
    }
}
