//! Semantic interpretations of decoded data: JSON Schema, OpenAPI and
//! protobuf JSON.

use super::Interpretation;
use crate::error::{PlanError, PlanResult};
use crate::syntax::{BoundOp, Decl, Expr, Field, File, Kind, Label, ListLit, Pos, StructLit};
use crate::value::Value;

fn get<'a>(doc: &'a Expr, key: &str) -> Option<&'a Expr> {
    match doc {
        Expr::Struct(s) => s.decls.iter().find_map(|d| match d {
            Decl::Field(f) if f.label.name() == key => Some(&f.value),
            _ => None,
        }),
        _ => None,
    }
}

fn get_str<'a>(doc: &'a Expr, key: &str) -> Option<&'a str> {
    match get(doc, key)? {
        Expr::Str(s, _) => Some(s),
        _ => None,
    }
}

fn fields(doc: &Expr) -> Vec<(&str, &Expr)> {
    match doc {
        Expr::Struct(s) => s
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Field(f) => Some((f.label.name(), &f.value)),
                Decl::Embed(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Recognize JSON Schema and OpenAPI documents.
pub fn detect_interpretation(doc: &Expr) -> Option<Interpretation> {
    if get_str(doc, "$schema").is_some_and(|s| s.contains("json-schema")) {
        return Some(Interpretation::JsonSchema);
    }
    if get_str(doc, "openapi").is_some() && get(doc, "info").is_some() {
        return Some(Interpretation::OpenApi);
    }
    None
}

/// Apply the interpretation to one decoded document.
///
/// Returns the rewritten file and the interpretation that was applied, which
/// is `None` when `Auto` did not recognize the content.
pub(crate) fn interpret(
    file: File,
    requested: Option<Interpretation>,
    schema: Option<&Value>,
) -> PlanResult<(File, Option<Interpretation>)> {
    let applied = match requested {
        None => return Ok((file, None)),
        Some(Interpretation::Auto) => match detect_interpretation(&file.to_expr()) {
            Some(found) => found,
            None => return Ok((file, None)),
        },
        Some(other) => other,
    };
    let doc = file.to_expr();
    let name = file.filename.clone();
    let converted = match applied {
        Interpretation::JsonSchema => json_schema_file(&doc, &name)?,
        Interpretation::OpenApi => openapi_file(&doc, &name)?,
        Interpretation::ProtobufJson => {
            let schema = schema.ok_or_else(|| {
                PlanError::decode(
                    Pos::in_file(&name),
                    "no schema specified for protobuf interpretation",
                )
            })?;
            File::from_expr(name, protobuf_json(doc, schema))
        }
        Interpretation::Auto => return Ok((file, None)),
    };
    Ok((converted, Some(applied)))
}

fn definition_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("#{}", cleaned)
}

fn ref_target(reference: &str) -> Option<String> {
    ["#/$defs/", "#/definitions/", "#/components/schemas/"]
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))
        .map(definition_name)
}

fn field(name: &str, value: Expr, optional: bool) -> Decl {
    let label = if name.starts_with('#') {
        Label::Ident(name.to_string())
    } else {
        Label::data(name)
    };
    Decl::Field(Field {
        label,
        optional,
        value,
        pos: Pos::default(),
    })
}

fn unify_all(parts: Vec<Expr>) -> Expr {
    parts
        .into_iter()
        .reduce(|a, b| Expr::Unify(Box::new(a), Box::new(b)))
        .unwrap_or(Expr::Top(Pos::default()))
}

fn disjoin_all(parts: Vec<Expr>) -> Expr {
    parts
        .into_iter()
        .reduce(|a, b| Expr::Disjoin(Box::new(a), Box::new(b)))
        .unwrap_or(Expr::Bottom(Pos::default()))
}

fn definitions(doc: &Expr, file: &str, out: &mut Vec<Decl>) -> PlanResult<()> {
    for key in ["$defs", "definitions"] {
        if let Some(defs) = get(doc, key) {
            for (name, schema) in fields(defs) {
                out.push(field(&definition_name(name), schema_expr(schema, file)?, false));
            }
        }
    }
    Ok(())
}

fn json_schema_file(doc: &Expr, file: &str) -> PlanResult<File> {
    let mut decls = Vec::new();
    let root = schema_expr(doc, file)?;
    match root {
        Expr::Struct(lit) => decls.extend(lit.decls),
        Expr::Top(_) => {}
        other => decls.push(Decl::Embed(other)),
    }
    definitions(doc, file, &mut decls)?;
    Ok(File {
        filename: file.to_string(),
        package: None,
        decls,
    })
}

fn openapi_file(doc: &Expr, file: &str) -> PlanResult<File> {
    let mut decls = Vec::new();
    if let Some(schemas) = get(doc, "components").and_then(|c| get(c, "schemas")) {
        for (name, schema) in fields(schemas) {
            decls.push(field(&definition_name(name), schema_expr(schema, file)?, false));
        }
    }
    Ok(File {
        filename: file.to_string(),
        package: None,
        decls,
    })
}

fn bound(doc: &Expr, key: &str, op: BoundOp) -> Option<Expr> {
    match get(doc, key)? {
        limit @ (Expr::Int(..) | Expr::Float(..)) => {
            Some(Expr::Bound(op, Box::new(limit.clone()), Pos::default()))
        }
        _ => None,
    }
}

fn type_expr(ty: &str, doc: &Expr, file: &str) -> PlanResult<Expr> {
    let kind = |k| Expr::Kind(k, Pos::default());
    Ok(match ty {
        "string" => kind(Kind::String),
        "boolean" => kind(Kind::Bool),
        "null" => Expr::Null(Pos::default()),
        "integer" | "number" => {
            let mut parts = vec![kind(if ty == "integer" { Kind::Int } else { Kind::Number })];
            parts.extend(bound(doc, "minimum", BoundOp::Ge));
            parts.extend(bound(doc, "maximum", BoundOp::Le));
            parts.extend(bound(doc, "exclusiveMinimum", BoundOp::Gt));
            parts.extend(bound(doc, "exclusiveMaximum", BoundOp::Lt));
            unify_all(parts)
        }
        "array" => {
            let rest = match get(doc, "items") {
                Some(items) => schema_expr(items, file)?,
                None => Expr::Top(Pos::default()),
            };
            Expr::List(ListLit {
                elems: Vec::new(),
                rest: Some(Box::new(rest)),
                pos: Pos::default(),
            })
        }
        "object" => object_expr(doc, file)?,
        other => {
            return Err(PlanError::decode(
                Pos::in_file(file),
                format!("unsupported JSON Schema type {:?}", other),
            ))
        }
    })
}

fn object_expr(doc: &Expr, file: &str) -> PlanResult<Expr> {
    let required: Vec<&str> = match get(doc, "required") {
        Some(Expr::List(l)) => l
            .elems
            .iter()
            .filter_map(|e| match e {
                Expr::Str(s, _) => Some(s.as_str()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    let mut decls = Vec::new();
    if let Some(props) = get(doc, "properties") {
        for (name, schema) in fields(props) {
            let value = schema_expr(schema, file)?;
            decls.push(field(name, value, !required.contains(&name)));
        }
    }
    Ok(Expr::Struct(StructLit {
        decls,
        pos: Pos::default(),
    }))
}

/// Convert one JSON Schema node into a constraint expression.
fn schema_expr(doc: &Expr, file: &str) -> PlanResult<Expr> {
    match doc {
        Expr::Bool(true, _) => return Ok(Expr::Top(Pos::default())),
        Expr::Bool(false, _) => return Ok(Expr::Bottom(Pos::default())),
        Expr::Struct(_) => {}
        _ => {
            return Err(PlanError::decode(
                Pos::in_file(file),
                "JSON Schema node must be an object or boolean",
            ))
        }
    }
    if let Some(target) = get_str(doc, "$ref").and_then(ref_target) {
        return Ok(Expr::Ident(target, Pos::default()));
    }

    let mut parts = Vec::new();
    if let Some(Expr::List(values)) = get(doc, "enum") {
        parts.push(disjoin_all(values.elems.clone()));
    }
    if let Some(value) = get(doc, "const") {
        parts.push(value.clone());
    }
    match get(doc, "type") {
        Some(Expr::Str(ty, _)) => parts.push(type_expr(ty, doc, file)?),
        Some(Expr::List(types)) => {
            let mut alts = Vec::new();
            for t in &types.elems {
                if let Expr::Str(ty, _) = t {
                    alts.push(type_expr(ty, doc, file)?);
                }
            }
            parts.push(disjoin_all(alts));
        }
        _ if get(doc, "properties").is_some() => parts.push(object_expr(doc, file)?),
        _ => {}
    }
    let combinators: [(&str, fn(Vec<Expr>) -> Expr); 3] =
        [("anyOf", disjoin_all), ("oneOf", disjoin_all), ("allOf", unify_all)];
    for (key, combine) in combinators {
        if let Some(Expr::List(subs)) = get(doc, key) {
            let mut alts = Vec::new();
            for s in &subs.elems {
                alts.push(schema_expr(s, file)?);
            }
            parts.push(combine(alts));
        }
    }

    let expr = unify_all(parts);
    Ok(match get(doc, "default") {
        Some(default) => Expr::Disjoin(
            Box::new(Expr::Default(Box::new(default.clone()))),
            Box::new(expr),
        ),
        None => expr,
    })
}

/// Rewrite decimal strings to numbers where the schema asks for numbers.
fn protobuf_json(doc: Expr, schema: &Value) -> Expr {
    let schema = schema.resolved();
    match doc {
        Expr::Struct(mut lit) => {
            for decl in &mut lit.decls {
                if let Decl::Field(f) = decl {
                    if let Some(sub) = schema.field(f.label.name()) {
                        let value = std::mem::replace(&mut f.value, Expr::Top(Pos::default()));
                        f.value = protobuf_json(value, sub);
                    }
                }
            }
            Expr::Struct(lit)
        }
        Expr::List(mut list) => {
            if let Value::List(sl) = schema {
                list.elems = list
                    .elems
                    .into_iter()
                    .enumerate()
                    .map(|(i, e)| match sl.elems.get(i).or(sl.rest.as_deref()) {
                        Some(sub) => protobuf_json(e, sub),
                        None => e,
                    })
                    .collect();
            }
            Expr::List(list)
        }
        Expr::Str(s, pos) => match schema {
            Value::Constraint {
                kind: Some(Kind::Int),
                ..
            }
            | Value::Int(_) => match s.parse::<i64>() {
                Ok(i) => Expr::Int(i, pos),
                Err(_) => Expr::Str(s, pos),
            },
            Value::Constraint {
                kind: Some(Kind::Float | Kind::Number),
                ..
            }
            | Value::Float(_) => match s.parse::<f64>() {
                Ok(f) => Expr::Float(f, pos),
                Err(_) => Expr::Str(s, pos),
            },
            _ => Expr::Str(s, pos),
        },
        other => other,
    }
}
