//! Unification: the meet of two values.

use std::cmp::Ordering;

use super::{Bound, Disjunct, FieldValue, ListValue, StructValue, Value};
use crate::syntax::{BoundOp, Kind};

impl Value {
    /// Compute the most general value that is an instance of both inputs.
    pub fn unify(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Bottom(_), _) => self.clone(),
            (_, Value::Bottom(_)) => other.clone(),
            (Value::Top, _) => other.clone(),
            (_, Value::Top) => self.clone(),
            (Value::Disjunction(a), Value::Disjunction(b)) => unify_disjunctions(a, b),
            (Value::Disjunction(a), v) => unify_disjunctions(a, &[plain(v)]),
            (v, Value::Disjunction(b)) => unify_disjunctions(&[plain(v)], b),
            (
                Value::Constraint {
                    kind: ka,
                    bounds: ba,
                },
                Value::Constraint {
                    kind: kb,
                    bounds: bb,
                },
            ) => unify_constraints(*ka, ba, *kb, bb),
            (Value::Constraint { kind, bounds }, v) | (v, Value::Constraint { kind, bounds }) => {
                check_constraint(*kind, bounds, v)
            }
            (Value::Struct(a), Value::Struct(b)) => unify_structs(a, b),
            (Value::List(a), Value::List(b)) => unify_lists(a, b),
            (a, b) if scalar_eq(a, b) => a.clone(),
            (a, b) if a.type_name() == b.type_name() => Value::bottom(format!(
                "conflicting values {} and {}",
                a.describe(),
                b.describe()
            )),
            (a, b) => Value::bottom(format!(
                "conflicting values {} and {} (mismatched types {} and {})",
                a.describe(),
                b.describe(),
                a.type_name(),
                b.type_name()
            )),
        }
    }
}

fn plain(v: &Value) -> Disjunct {
    Disjunct {
        value: v.clone(),
        default: false,
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        _ => false,
    }
}

/// Build a normalized disjunction: bottoms dropped, duplicates merged.
pub(crate) fn disjunction(items: Vec<Disjunct>) -> Value {
    let mut out: Vec<Disjunct> = Vec::new();
    let mut first_err = None;
    for d in items {
        if let Some(err) = d.value.err() {
            first_err.get_or_insert(err);
            continue;
        }
        match d.value {
            Value::Disjunction(inner) => {
                for i in inner {
                    push_unique(&mut out, Disjunct {
                        value: i.value,
                        default: i.default && d.default,
                    });
                }
            }
            value => push_unique(&mut out, Disjunct {
                value,
                default: d.default,
            }),
        }
    }
    match out.len() {
        0 => Value::Bottom(first_err.unwrap_or_else(|| {
            super::ValueError::new("empty disjunction")
        })),
        1 => out.remove(0).value,
        _ => Value::Disjunction(out),
    }
}

fn push_unique(out: &mut Vec<Disjunct>, d: Disjunct) {
    match out.iter_mut().find(|o| o.value == d.value) {
        Some(existing) => existing.default |= d.default,
        None => out.push(d),
    }
}

fn unify_disjunctions(a: &[Disjunct], b: &[Disjunct]) -> Value {
    let a_marked = a.iter().any(|d| d.default);
    let b_marked = b.iter().any(|d| d.default);
    let mut items = Vec::with_capacity(a.len() * b.len());
    for x in a {
        for y in b {
            items.push(Disjunct {
                value: x.value.unify(&y.value),
                default: (x.default || !a_marked) && (y.default || !b_marked),
            });
        }
    }
    let value = disjunction(items);
    // Without any surviving default the marks are meaningless.
    match value {
        Value::Disjunction(mut ds) if ds.iter().all(|d| d.default) => {
            if !(a_marked || b_marked) {
                for d in &mut ds {
                    d.default = false;
                }
            }
            Value::Disjunction(ds)
        }
        other => other,
    }
}

fn meet_kinds(a: Option<Kind>, b: Option<Kind>) -> Result<Option<Kind>, (Kind, Kind)> {
    match (a, b) {
        (None, k) | (k, None) => Ok(k),
        (Some(x), Some(y)) if x == y => Ok(Some(x)),
        (Some(Kind::Number), Some(k @ (Kind::Int | Kind::Float)))
        | (Some(k @ (Kind::Int | Kind::Float)), Some(Kind::Number)) => Ok(Some(k)),
        (Some(x), Some(y)) => Err((x, y)),
    }
}

fn unify_constraints(ka: Option<Kind>, ba: &[Bound], kb: Option<Kind>, bb: &[Bound]) -> Value {
    let kind = match meet_kinds(ka, kb) {
        Ok(k) => k,
        Err((x, y)) => {
            return Value::bottom(format!(
                "conflicting values {} and {} (mismatched types {} and {})",
                x, y, x, y
            ))
        }
    };
    let mut bounds: Vec<Bound> = ba.to_vec();
    for b in bb {
        if !bounds.contains(b) {
            bounds.push(b.clone());
        }
    }
    if let Some(k) = kind {
        if let Some(b) = bounds.iter().find(|b| !bound_fits(k, &b.limit)) {
            return Value::bottom(format!(
                "conflicting values {} and {}{} (mismatched types {} and {})",
                k,
                b.op.as_str(),
                b.limit.describe(),
                k,
                b.limit.type_name()
            ));
        }
    }
    Value::Constraint { kind, bounds }
}

fn kind_accepts(kind: Kind, v: &Value) -> bool {
    matches!(
        (kind, v),
        (Kind::Null, Value::Null)
            | (Kind::Bool, Value::Bool(_))
            | (Kind::Int, Value::Int(_))
            | (Kind::Float, Value::Float(_))
            | (Kind::Number, Value::Int(_) | Value::Float(_))
            | (Kind::String, Value::String(_))
            | (Kind::Bytes, Value::Bytes(_))
            | (Kind::List, Value::List(_))
            | (Kind::Struct, Value::Struct(_))
    )
}

fn bound_fits(kind: Kind, limit: &Value) -> bool {
    match kind {
        Kind::Int | Kind::Float | Kind::Number => {
            matches!(limit, Value::Int(_) | Value::Float(_))
        }
        other => kind_accepts(other, limit),
    }
}

fn check_constraint(kind: Option<Kind>, bounds: &[Bound], v: &Value) -> Value {
    if let Some(k) = kind {
        if !kind_accepts(k, v) {
            return Value::bottom(format!(
                "conflicting values {} and {} (mismatched types {} and {})",
                k,
                v.describe(),
                k,
                v.type_name()
            ));
        }
    }
    for b in bounds {
        if !satisfies(v, b) {
            return Value::bottom(format!(
                "invalid value {} (out of bound {}{})",
                v.describe(),
                b.op.as_str(),
                b.limit.describe()
            ));
        }
    }
    v.clone()
}

fn compare(v: &Value, limit: &Value) -> Option<Ordering> {
    match (v, limit) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn satisfies(v: &Value, b: &Bound) -> bool {
    if b.op == BoundOp::Ne {
        return compare(v, &b.limit) != Some(Ordering::Equal) && !scalar_eq(v, &b.limit);
    }
    match compare(v, &b.limit) {
        Some(ord) => match b.op {
            BoundOp::Lt => ord == Ordering::Less,
            BoundOp::Le => ord != Ordering::Greater,
            BoundOp::Gt => ord == Ordering::Greater,
            BoundOp::Ge => ord != Ordering::Less,
            BoundOp::Ne => unreachable!("handled above"),
        },
        None => false,
    }
}

fn unify_structs(a: &StructValue, b: &StructValue) -> Value {
    let mut fields: Vec<FieldValue> = Vec::with_capacity(a.fields.len() + b.fields.len());
    for fa in &a.fields {
        match b.get(&fa.name) {
            Some(fb) => fields.push(FieldValue {
                name: fa.name.clone(),
                value: fa.value.unify(&fb.value),
                optional: fa.optional && fb.optional,
                kind: fa.kind,
            }),
            None => fields.push(not_allowed(fa, b.closed)),
        }
    }
    for fb in &b.fields {
        if a.get(&fb.name).is_none() {
            fields.push(not_allowed(fb, a.closed));
        }
    }
    Value::Struct(StructValue {
        fields,
        closed: a.closed || b.closed,
    })
}

/// A field present on one side only; closed structs reject regular fields.
fn not_allowed(f: &FieldValue, other_closed: bool) -> FieldValue {
    let mut f = f.clone();
    if other_closed && f.kind == super::FieldKind::Regular && !f.optional {
        f.value = Value::bottom("field not allowed");
    }
    f
}

fn unify_lists(a: &ListValue, b: &ListValue) -> Value {
    let (la, lb) = (a.elems.len(), b.elems.len());
    if (la < lb && a.rest.is_none()) || (lb < la && b.rest.is_none()) {
        return Value::bottom(format!(
            "incompatible list lengths ({} and {})",
            la, lb
        ));
    }
    let len = la.max(lb);
    let mut elems = Vec::with_capacity(len);
    for i in 0..len {
        let x = a.elems.get(i).or(a.rest.as_deref()).cloned().unwrap_or(Value::Top);
        let y = b.elems.get(i).or(b.rest.as_deref()).cloned().unwrap_or(Value::Top);
        elems.push(x.unify(&y));
    }
    let rest = match (&a.rest, &b.rest) {
        (Some(x), Some(y)) => Some(Box::new(x.unify(y))),
        _ => None,
    };
    Value::List(ListValue { elems, rest })
}
