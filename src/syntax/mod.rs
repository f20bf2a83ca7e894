//! Configuration-language syntax
//!
//! A compact subset of the configuration language: struct and list literals,
//! references, selectors, unification, disjunctions with defaults and numeric
//! bounds. Decoders for foreign formats produce the same tree so every input
//! flows through one representation.

mod format;
mod parser;

use std::fmt;
use std::sync::Arc;

pub use format::{format_expr, format_file, quote_label};
pub use parser::{parse_expr, parse_file};

/// A source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(file: &Arc<str>, line: usize, column: usize) -> Self {
        Self {
            file: Arc::clone(file),
            line,
            column,
        }
    }

    /// Position for synthesized nodes that only know their file.
    pub fn in_file(file: &str) -> Self {
        Self {
            file: Arc::from(file),
            line: 0,
            column: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl Default for Pos {
    fn default() -> Self {
        Self::in_file("")
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// One parsed or decoded source file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub filename: String,
    pub package: Option<String>,
    pub decls: Vec<Decl>,
}

impl File {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            package: None,
            decls: Vec::new(),
        }
    }

    /// Wrap a single decoded expression as a file.
    ///
    /// Struct literals are spliced in as top-level declarations; anything
    /// else becomes an embedding.
    pub fn from_expr(filename: impl Into<String>, expr: Expr) -> Self {
        let decls = match expr {
            Expr::Struct(lit) => lit.decls,
            other => vec![Decl::Embed(other)],
        };
        Self {
            filename: filename.into(),
            package: None,
            decls,
        }
    }

    /// The file body as a single expression.
    pub fn to_expr(&self) -> Expr {
        match self.decls.as_slice() {
            [Decl::Embed(expr)] => expr.clone(),
            decls => Expr::Struct(StructLit {
                decls: decls.to_vec(),
                pos: Pos::in_file(&self.filename),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Field(Field),
    Embed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: Label,
    pub optional: bool,
    pub value: Expr,
    pub pos: Pos,
}

impl Field {
    pub fn new(label: Label, value: Expr) -> Self {
        let pos = value.pos().clone();
        Self {
            label,
            optional: false,
            value,
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Ident(String),
    Str(String),
}

impl Label {
    /// Build a label, preferring the identifier form when the name allows it.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if is_identifier(&name) && !is_reserved(&name) {
            Label::Ident(name)
        } else {
            Label::Str(name)
        }
    }

    /// Label for a data key: never a definition or hidden field.
    pub fn data(name: impl Into<String>) -> Self {
        let name = name.into();
        if is_identifier(&name) && !is_reserved(&name) && !name.starts_with('#') && !name.starts_with('_') {
            Label::Ident(name)
        } else {
            Label::Str(name)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Label::Ident(s) | Label::Str(s) => s,
        }
    }

    /// Definitions are only addressable through identifiers.
    pub fn is_definition(&self) -> bool {
        matches!(self, Label::Ident(s) if s.starts_with('#'))
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Label::Ident(s) if s.starts_with('_'))
    }
}

/// Basic value kinds used by kind constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Number,
    String,
    Bytes,
    List,
    Struct,
}

impl Kind {
    pub fn keyword(name: &str) -> Option<Kind> {
        Some(match name {
            "bool" => Kind::Bool,
            "int" => Kind::Int,
            "float" => Kind::Float,
            "number" => Kind::Number,
            "string" => Kind::String,
            "bytes" => Kind::Bytes,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::List => "list",
            Kind::Struct => "struct",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundOp {
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl BoundOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BoundOp::Lt => "<",
            BoundOp::Le => "<=",
            BoundOp::Gt => ">",
            BoundOp::Ge => ">=",
            BoundOp::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructLit {
    pub decls: Vec<Decl>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListLit {
    pub elems: Vec<Expr>,
    /// `[...T]` tail; `Some(Top)` for a bare `...`.
    pub rest: Option<Box<Expr>>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null(Pos),
    Bool(bool, Pos),
    Int(i64, Pos),
    Float(f64, Pos),
    Str(String, Pos),
    Bytes(Vec<u8>, Pos),
    Top(Pos),
    Bottom(Pos),
    Kind(Kind, Pos),
    Struct(StructLit),
    List(ListLit),
    Ident(String, Pos),
    Select(Box<Expr>, String, Pos),
    Index(Box<Expr>, Box<Expr>, Pos),
    Unify(Box<Expr>, Box<Expr>),
    Disjoin(Box<Expr>, Box<Expr>),
    /// `*x` inside a disjunction.
    Default(Box<Expr>),
    Bound(BoundOp, Box<Expr>, Pos),
    Neg(Box<Expr>, Pos),
}

impl Expr {
    pub fn pos(&self) -> &Pos {
        match self {
            Expr::Null(p)
            | Expr::Bool(_, p)
            | Expr::Int(_, p)
            | Expr::Float(_, p)
            | Expr::Str(_, p)
            | Expr::Bytes(_, p)
            | Expr::Top(p)
            | Expr::Bottom(p)
            | Expr::Kind(_, p)
            | Expr::Ident(_, p)
            | Expr::Select(_, _, p)
            | Expr::Index(_, _, p)
            | Expr::Bound(_, _, p)
            | Expr::Neg(_, p) => p,
            Expr::Struct(s) => &s.pos,
            Expr::List(l) => &l.pos,
            Expr::Unify(a, _) | Expr::Disjoin(a, _) | Expr::Default(a) => a.pos(),
        }
    }

    pub fn string(s: impl Into<String>) -> Expr {
        Expr::Str(s.into(), Pos::default())
    }

    pub fn int(i: i64) -> Expr {
        Expr::Int(i, Pos::default())
    }

    /// Struct literal from `(name, value)` pairs.
    pub fn structure<I, S>(fields: I) -> Expr
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: Into<String>,
    {
        let decls = fields
            .into_iter()
            .map(|(name, value)| Decl::Field(Field::new(Label::new(name), value)))
            .collect();
        Expr::Struct(StructLit {
            decls,
            pos: Pos::default(),
        })
    }

    pub fn list(elems: Vec<Expr>) -> Expr {
        Expr::List(ListLit {
            elems,
            rest: None,
            pos: Pos::default(),
        })
    }
}

pub fn is_identifier(s: &str) -> bool {
    if s == "_" {
        return true;
    }
    let body = s.strip_prefix('#').unwrap_or(s);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Names that cannot be used as bare labels.
pub fn is_reserved(s: &str) -> bool {
    matches!(
        s,
        "null" | "true" | "false" | "package" | "import" | "_"
    ) || Kind::keyword(s).is_some()
}
