//! Conversion of values back to data and syntax.

use base64::Engine as _;

use super::{FieldKind, Value, ValueError};
use crate::syntax::{Decl, Expr, Field, Label, ListLit, Pos, StructLit};

/// Which parts of a value [`Value::to_expr`] keeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxOptions {
    /// Resolve defaults and drop optional fields.
    pub final_values: bool,
    pub definitions: bool,
    pub hidden: bool,
    pub optional: bool,
}

impl SyntaxOptions {
    /// Keep everything: definitions, hidden and optional fields.
    pub fn full() -> Self {
        Self {
            final_values: false,
            definitions: true,
            hidden: true,
            optional: true,
        }
    }
}

impl Value {
    /// Concrete data for JSON-like encoders.
    ///
    /// Defaults are resolved; definitions, hidden and optional fields are
    /// left out. Any non-concrete value is an "incomplete value" error.
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        self.json_at(&mut Vec::new())
    }

    fn json_at(&self, path: &mut Vec<String>) -> Result<serde_json::Value, ValueError> {
        use serde_json::Value as J;
        Ok(match self.resolved() {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => J::Number(n),
                None => {
                    return Err(ValueError::new(format!("cannot represent {} as JSON", f)).at(path))
                }
            },
            Value::String(s) => J::String(s.clone()),
            Value::Bytes(b) => J::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::List(l) => {
                let mut out = Vec::with_capacity(l.elems.len());
                for (i, elem) in l.elems.iter().enumerate() {
                    path.push(i.to_string());
                    out.push(elem.json_at(path)?);
                    path.pop();
                }
                J::Array(out)
            }
            Value::Struct(s) => {
                let mut map = serde_json::Map::new();
                for f in s.regular() {
                    path.push(f.name.clone());
                    map.insert(f.name.clone(), f.value.json_at(path)?);
                    path.pop();
                }
                J::Object(map)
            }
            Value::Bottom(e) => return Err(e.clone().at(path)),
            other => {
                return Err(ValueError::new(format!("incomplete value {}", other.describe())).at(path))
            }
        })
    }

    /// Concrete data as a YAML document.
    pub fn to_yaml(&self) -> Result<String, ValueError> {
        let json = self.to_json()?;
        serde_yaml_ng::to_string(&json).map_err(|e| ValueError::new(e.to_string()))
    }

    /// Render the value as syntax.
    pub fn to_expr(&self, opts: SyntaxOptions) -> Expr {
        let pos = Pos::default;
        let value = if opts.final_values {
            self.resolved()
        } else {
            self
        };
        match value {
            Value::Top => Expr::Top(pos()),
            Value::Bottom(_) => Expr::Bottom(pos()),
            Value::Null => Expr::Null(pos()),
            Value::Bool(b) => Expr::Bool(*b, pos()),
            Value::Int(i) => Expr::Int(*i, pos()),
            Value::Float(f) => Expr::Float(*f, pos()),
            Value::String(s) => Expr::Str(s.clone(), pos()),
            Value::Bytes(b) => Expr::Bytes(b.clone(), pos()),
            Value::Constraint { kind, bounds } => {
                let mut parts: Vec<Expr> = Vec::new();
                if let Some(k) = kind {
                    parts.push(Expr::Kind(*k, pos()));
                }
                for b in bounds {
                    parts.push(Expr::Bound(b.op, Box::new(b.limit.to_expr(opts)), pos()));
                }
                join(parts, Expr::Unify).unwrap_or_else(|| Expr::Top(pos()))
            }
            Value::Disjunction(ds) => {
                let parts = ds
                    .iter()
                    .map(|d| {
                        let e = d.value.to_expr(opts);
                        if d.default {
                            Expr::Default(Box::new(e))
                        } else {
                            e
                        }
                    })
                    .collect();
                join(parts, Expr::Disjoin).unwrap_or_else(|| Expr::Bottom(pos()))
            }
            Value::List(l) => Expr::List(ListLit {
                elems: l.elems.iter().map(|e| e.to_expr(opts)).collect(),
                rest: if opts.final_values {
                    None
                } else {
                    l.rest.as_ref().map(|r| Box::new(r.to_expr(opts)))
                },
                pos: pos(),
            }),
            Value::Struct(s) => {
                let decls = s
                    .fields
                    .iter()
                    .filter(|f| match f.kind {
                        FieldKind::Regular => !f.optional || (opts.optional && !opts.final_values),
                        FieldKind::Definition => opts.definitions,
                        FieldKind::Hidden => opts.hidden,
                    })
                    .map(|f| {
                        let label = match f.kind {
                            FieldKind::Regular => Label::data(f.name.as_str()),
                            _ => Label::Ident(f.name.clone()),
                        };
                        Decl::Field(Field {
                            label,
                            optional: f.optional,
                            value: f.value.to_expr(opts),
                            pos: pos(),
                        })
                    })
                    .collect();
                Expr::Struct(StructLit { decls, pos: pos() })
            }
        }
    }
}

fn join(parts: Vec<Expr>, op: fn(Box<Expr>, Box<Expr>) -> Expr) -> Option<Expr> {
    parts
        .into_iter()
        .reduce(|acc, next| op(Box::new(acc), Box::new(next)))
}
