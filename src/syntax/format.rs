//! Canonical text rendering of syntax trees.

use super::{is_identifier, is_reserved, Decl, Expr, File, Label};

/// Render a file with the given indentation width.
pub fn format_file(file: &File, indent: usize) -> String {
    let mut p = Printer::new(indent);
    if let Some(pkg) = &file.package {
        p.out.push_str("package ");
        p.out.push_str(pkg);
        p.out.push('\n');
        if !file.decls.is_empty() {
            p.out.push('\n');
        }
    }
    for decl in &file.decls {
        p.decl(decl);
        p.out.push('\n');
    }
    p.out
}

/// Render a single expression; multi-line structs use the given indentation.
pub fn format_expr(expr: &Expr, indent: usize) -> String {
    let mut p = Printer::new(indent);
    p.expr(expr, Prec::Lowest);
    p.out
}

/// Label text as it must appear in source.
pub fn quote_label(label: &Label) -> String {
    match label {
        Label::Ident(name) => name.clone(),
        Label::Str(name) if is_identifier(name) && !is_reserved(name) && !name.starts_with('#') && !name.starts_with('_') => {
            name.clone()
        }
        Label::Str(name) => quote_string(name),
    }
}

fn quote_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn quote_bytes(b: &[u8]) -> String {
    let mut out = String::from("'");
    for &byte in b {
        match byte {
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            other => out.push_str(&format!("\\u{:04x}", other)),
        }
    }
    out.push('\'');
    out
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Or,
    And,
    Unary,
    Postfix,
}

struct Printer {
    out: String,
    indent: usize,
    depth: usize,
}

impl Printer {
    fn new(indent: usize) -> Self {
        Self {
            out: String::new(),
            indent: indent.max(1),
            depth: 0,
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.depth * self.indent {
            self.out.push(' ');
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Field(f) => {
                self.out.push_str(&quote_label(&f.label));
                if f.optional {
                    self.out.push('?');
                }
                self.out.push_str(": ");
                self.expr(&f.value, Prec::Lowest);
            }
            Decl::Embed(e) => self.expr(e, Prec::Lowest),
        }
    }

    fn expr(&mut self, expr: &Expr, prec: Prec) {
        match expr {
            Expr::Null(_) => self.out.push_str("null"),
            Expr::Bool(b, _) => self.out.push_str(if *b { "true" } else { "false" }),
            Expr::Int(i, _) => self.out.push_str(&i.to_string()),
            Expr::Float(f, _) => self.out.push_str(&format_float(*f)),
            Expr::Str(s, _) => self.out.push_str(&quote_string(s)),
            Expr::Bytes(b, _) => self.out.push_str(&quote_bytes(b)),
            Expr::Top(_) => self.out.push('_'),
            Expr::Bottom(_) => self.out.push_str("_|_"),
            Expr::Kind(k, _) => self.out.push_str(k.as_str()),
            Expr::Ident(name, _) => self.out.push_str(name),
            Expr::Select(x, name, _) => {
                self.expr(x, Prec::Postfix);
                self.out.push('.');
                self.out.push_str(&quote_label(&Label::new(name.clone())));
            }
            Expr::Index(x, i, _) => {
                self.expr(x, Prec::Postfix);
                self.out.push('[');
                self.expr(i, Prec::Lowest);
                self.out.push(']');
            }
            Expr::Struct(s) => {
                if s.decls.is_empty() {
                    self.out.push_str("{}");
                    return;
                }
                self.out.push('{');
                self.depth += 1;
                for d in &s.decls {
                    self.newline();
                    self.decl(d);
                }
                self.depth -= 1;
                self.newline();
                self.out.push('}');
            }
            Expr::List(l) => {
                let multiline = l
                    .elems
                    .iter()
                    .any(|e| matches!(e, Expr::Struct(s) if !s.decls.is_empty()));
                self.out.push('[');
                if multiline {
                    self.depth += 1;
                    for e in &l.elems {
                        self.newline();
                        self.expr(e, Prec::Lowest);
                        self.out.push(',');
                    }
                    if let Some(rest) = &l.rest {
                        self.newline();
                        self.rest(rest);
                    }
                    self.depth -= 1;
                    self.newline();
                } else {
                    let mut first = true;
                    for e in &l.elems {
                        if !first {
                            self.out.push_str(", ");
                        }
                        first = false;
                        self.expr(e, Prec::Lowest);
                    }
                    if let Some(rest) = &l.rest {
                        if !first {
                            self.out.push_str(", ");
                        }
                        self.rest(rest);
                    }
                }
                self.out.push(']');
            }
            Expr::Unify(a, b) => self.binary(a, " & ", b, Prec::And, prec),
            Expr::Disjoin(a, b) => self.binary(a, " | ", b, Prec::Or, prec),
            Expr::Default(x) => self.prefix("*", x, prec),
            Expr::Bound(op, x, _) => self.prefix(op.as_str(), x, prec),
            Expr::Neg(x, _) => self.prefix("-", x, prec),
        }
    }

    fn rest(&mut self, rest: &Expr) {
        self.out.push_str("...");
        if !matches!(rest, Expr::Top(_)) {
            self.expr(rest, Prec::Unary);
        }
    }

    fn prefix(&mut self, op: &str, x: &Expr, outer: Prec) {
        let paren = outer > Prec::Unary;
        if paren {
            self.out.push('(');
        }
        self.out.push_str(op);
        self.expr(x, Prec::Unary);
        if paren {
            self.out.push(')');
        }
    }

    fn binary(&mut self, a: &Expr, op: &str, b: &Expr, own: Prec, outer: Prec) {
        let paren = outer > own;
        if paren {
            self.out.push('(');
        }
        self.expr(a, own);
        self.out.push_str(op);
        self.expr(b, own);
        if paren {
            self.out.push(')');
        }
    }
}
