//! Parser for the configuration syntax, built from `nom` combinators over
//! position-tracking spans.
//!
//! Declarations are separated by commas or newlines: a line break after a
//! complete declaration acts as a comma. Binary operators and selectors may
//! continue on the next line; an index may not.

use std::sync::Arc;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_while, take_while1, take_while_m_n};
use nom::character::complete::{anychar, char, digit1, one_of, satisfy};
use nom::combinator::{map, not, opt, peek, recognize, value};
use nom::error::{ErrorKind, ParseError};
use nom::multi::many0_count;
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;
use nom_locate::LocatedSpan;

use super::{BoundOp, Decl, Expr, Field, File, Kind, Label, ListLit, Pos, StructLit};
use crate::error::{PlanError, PlanResult};

// ============================================================================
// Public API
// ============================================================================

/// Parse a complete source file.
pub fn parse_file(filename: &str, src: &str) -> PlanResult<File> {
    let name: Arc<str> = Arc::from(filename);
    let input = Span::new_extra(strip_bom(src), &name);
    let (package, decls) = finish(&name, file_body(input))?;
    Ok(File {
        filename: filename.to_string(),
        package,
        decls,
    })
}

/// Parse a standalone expression such as a `--expression` flag value.
pub fn parse_expr(name: &str, src: &str) -> PlanResult<Expr> {
    let file: Arc<str> = Arc::from(name);
    let input = Span::new_extra(strip_bom(src), &file);
    finish(&file, standalone(input))
}

// ============================================================================
// Input and errors
// ============================================================================

/// Source text tagged with the name used in positions.
type Span<'a> = LocatedSpan<&'a str, &'a Arc<str>>;

type PResult<'a, T> = IResult<Span<'a>, T, SyntaxError<'a>>;

/// Where parsing stopped, and why when a parser said so explicitly.
#[derive(Debug)]
struct SyntaxError<'a> {
    input: Span<'a>,
    message: Option<String>,
}

impl<'a> SyntaxError<'a> {
    fn into_plan_error(self) -> PlanError {
        let message = self
            .message
            .unwrap_or_else(|| format!("unexpected {}", describe(&self.input)));
        PlanError::Syntax {
            pos: pos_of(&self.input),
            message,
        }
    }
}

impl<'a> ParseError<Span<'a>> for SyntaxError<'a> {
    fn from_error_kind(input: Span<'a>, _kind: ErrorKind) -> Self {
        Self {
            input,
            message: None,
        }
    }

    fn append(_input: Span<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    /// Keep the alternative that got furthest.
    fn or(self, other: Self) -> Self {
        if other.input.location_offset() > self.input.location_offset() {
            other
        } else {
            self
        }
    }
}

/// Stop with `message` at `input`; enclosing alternatives are not tried.
fn fail<'a, T>(input: Span<'a>, message: impl Into<String>) -> PResult<'a, T> {
    Err(nom::Err::Failure(SyntaxError {
        input,
        message: Some(message.into()),
    }))
}

fn finish<T>(file: &Arc<str>, result: PResult<'_, T>) -> PlanResult<T> {
    match result {
        Ok((_, out)) => Ok(out),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e.into_plan_error()),
        Err(nom::Err::Incomplete(_)) => Err(PlanError::Syntax {
            pos: Pos::in_file(file),
            message: "unexpected end of input".to_string(),
        }),
    }
}

fn pos_of(input: &Span<'_>) -> Pos {
    Pos::new(
        input.extra,
        input.location_line() as usize,
        input.get_utf8_column(),
    )
}

fn strip_bom(src: &str) -> &str {
    src.strip_prefix('\u{feff}').unwrap_or(src)
}

/// What the input starts with, for messages.
fn describe(input: &Span<'_>) -> String {
    let rest: &str = input.fragment();
    let Some(c) = rest.chars().next() else {
        return "end of input".to_string();
    };
    if let Some(op) = ["_|_", "...", "<=", ">=", "!="]
        .into_iter()
        .find(|op| rest.starts_with(op))
    {
        return format!("'{}'", op);
    }
    match c {
        '"' => "string".to_string(),
        '\'' => "bytes".to_string(),
        '\n' => "newline".to_string(),
        c if is_ident_start(c) => {
            let end = rest
                .char_indices()
                .skip(1)
                .find(|&(_, c)| !is_ident_char(c))
                .map_or(rest.len(), |(i, _)| i);
            format!("identifier {}", &rest[..end])
        }
        c if c.is_ascii_digit() => rest
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
            .next()
            .unwrap_or_default()
            .to_string(),
        c => format!("'{}'", c),
    }
}

// ============================================================================
// Lexical elements
// ============================================================================

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '_' | '#' | '$')
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$')
}

fn comment<'a>(input: Span<'a>) -> PResult<'a, Span<'a>> {
    recognize(pair(tag("//"), take_till(|c| c == '\n')))(input)
}

/// Blanks and comments, stopping before a newline.
fn blank<'a>(input: Span<'a>) -> PResult<'a, ()> {
    value(
        (),
        many0_count(alt((
            take_while1(|c: char| c.is_whitespace() && c != '\n'),
            comment,
        ))),
    )(input)
}

/// Blanks, comments and newlines.
fn ws<'a>(input: Span<'a>) -> PResult<'a, ()> {
    value((), many0_count(alt((take_while1(char::is_whitespace), comment))))(input)
}

fn identifier<'a>(input: Span<'a>) -> PResult<'a, String> {
    map(
        recognize(pair(satisfy(is_ident_start), take_while(is_ident_char))),
        |s: Span<'a>| s.fragment().to_string(),
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(Span<'a>) -> PResult<'a, Span<'a>> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

/// `c`, or a failure naming what was found instead.
fn expect<'a>(c: char) -> impl FnMut(Span<'a>) -> PResult<'a, char> {
    move |input: Span<'a>| match char::<_, SyntaxError<'a>>(c)(input) {
        Ok(done) => Ok(done),
        Err(_) => fail(input, format!("expected '{}', found {}", c, describe(&input))),
    }
}

/// A quoted literal on one line: `"` for strings, `'` for bytes.
fn quoted<'a>(quote: char) -> impl FnMut(Span<'a>) -> PResult<'a, String> {
    move |input: Span<'a>| {
        let (mut rest, _) = char(quote)(input)?;
        let mut out = String::new();
        loop {
            let (after, chunk) = take_till(|c| c == quote || c == '\\' || c == '\n')(rest)?;
            out.push_str(chunk.fragment());
            let (after, end) = opt(anychar)(after)?;
            match end {
                Some(c) if c == quote => return Ok((after, out)),
                Some('\\') => {
                    let (after, c) = escape(input, after)?;
                    out.push(c);
                    rest = after;
                }
                _ => return fail(input, "string literal not terminated"),
            }
        }
    }
}

/// The character after a backslash. Errors point at the literal's start.
fn escape<'a>(start: Span<'a>, input: Span<'a>) -> PResult<'a, char> {
    let simple = alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        value('\u{8}', char('b')),
        value('\u{c}', char('f')),
        value('/', char('/')),
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
    ))(input);
    match simple {
        Ok(done) => return Ok(done),
        Err(nom::Err::Error(_)) => {}
        Err(e) => return Err(e),
    }
    if let Ok((rest, _)) = char::<_, SyntaxError<'a>>('u')(input) {
        let (rest, hex) = take_while_m_n(0, 4, |c: char| c.is_ascii_hexdigit())(rest)?;
        let code = hex.fragment();
        return match u32::from_str_radix(code, 16).ok().and_then(char::from_u32) {
            Some(c) if code.len() == 4 => Ok((rest, c)),
            _ => fail(start, format!("invalid escape \\u{}", code)),
        };
    }
    let shown: String = input.fragment().chars().take(1).collect();
    fail(start, format!("unknown escape sequence \\{}", shown))
}

fn digits<'a>(input: Span<'a>) -> PResult<'a, Span<'a>> {
    recognize(pair(
        digit1,
        take_while(|c: char| c.is_ascii_digit() || c == '_'),
    ))(input)
}

/// Integers, decimals and exponents; `_` may separate digits.
fn number<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let pos = pos_of(&input);
    let (rest, text) = recognize(tuple((
        digits,
        opt(pair(char('.'), digits)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let text: String = text.fragment().chars().filter(|&c| c != '_').collect();
    if text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        match text.parse::<f64>() {
            Ok(f) => Ok((rest, Expr::Float(f, pos))),
            Err(_) => fail(input, format!("invalid number {}", text)),
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Ok((rest, Expr::Int(i, pos))),
            Err(_) => fail(input, format!("integer {} overflows int64", text)),
        }
    }
}

// ============================================================================
// Files and declarations
// ============================================================================

fn file_body<'a>(input: Span<'a>) -> PResult<'a, (Option<String>, Vec<Decl>)> {
    let (rest, _) = ws(input)?;
    let (rest, package) = opt(preceded(pair(keyword("package"), blank), identifier))(rest)?;
    let rest = match package {
        Some(_) => separator(rest, None)?.0,
        None => rest,
    };
    let (rest, _) = ws(rest)?;
    if keyword("import")(rest).is_ok() {
        return fail(rest, "imports are not supported");
    }
    let (rest, decls) = decls(rest, None)?;
    Ok((rest, (package, decls)))
}

fn standalone<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let (rest, _) = ws(input)?;
    let (rest, e) = expr(rest)?;
    let (rest, _) = ws(rest)?;
    if !rest.fragment().is_empty() {
        return fail(rest, format!("expected end of input, found {}", describe(&rest)));
    }
    Ok((rest, e))
}

/// Declarations up to `close`, or to the end of input for a file body.
fn decls<'a>(input: Span<'a>, close: Option<char>) -> PResult<'a, Vec<Decl>> {
    let mut out = Vec::new();
    let (mut rest, _) = ws(input)?;
    loop {
        let next = rest.fragment().chars().next();
        if next.is_none() || next == close {
            return Ok((rest, out));
        }
        let (after, d) = decl(rest)?;
        out.push(d);
        let (after, _) = separator(after, close)?;
        let (after, _) = ws(after)?;
        rest = after;
    }
}

/// A comma, a line break or the closing delimiter ends a declaration.
fn separator<'a>(input: Span<'a>, close: Option<char>) -> PResult<'a, ()> {
    let (rest, _) = blank(input)?;
    match rest.fragment().chars().next() {
        Some(',') => value((), char(','))(rest),
        None | Some('\n') => Ok((rest, ())),
        next if next == close => Ok((rest, ())),
        _ => fail(rest, format!("missing ',' before {}", describe(&rest))),
    }
}

/// `label:`, `label?:` or `"quoted label":`.
fn field_head<'a>(input: Span<'a>) -> PResult<'a, (Label, bool)> {
    let (rest, label) = alt((map(identifier, Label::Ident), map(quoted('"'), Label::Str)))(input)?;
    let (rest, question) = opt(preceded(blank, char('?')))(rest)?;
    let (rest, _) = preceded(blank, char(':'))(rest)?;
    Ok((rest, (label, question.is_some())))
}

fn decl<'a>(input: Span<'a>) -> PResult<'a, Decl> {
    let pos = pos_of(&input);
    let (rest, head) = opt(field_head)(input)?;
    let Some((label, optional)) = head else {
        return map(expr, Decl::Embed)(input);
    };
    let (rest, _) = ws(rest)?;
    // `a: b: 1` nests the remainder as a single-field struct.
    let (rest, value) = if peek(field_head)(rest).is_ok() {
        let inner_pos = pos_of(&rest);
        let (rest, inner) = decl(rest)?;
        let lit = StructLit {
            decls: vec![inner],
            pos: inner_pos,
        };
        (rest, Expr::Struct(lit))
    } else {
        expr(rest)?
    };
    Ok((
        rest,
        Decl::Field(Field {
            label,
            optional,
            value,
            pos,
        }),
    ))
}

// ============================================================================
// Expressions
// ============================================================================

/// Disjunction, the loosest binding operator.
fn expr<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let (mut rest, mut left) = conjunction(input)?;
    while let (after, Some(_)) = opt(preceded(ws, char('|')))(rest)? {
        let (after, _) = ws(after)?;
        let (after, right) = conjunction(after)?;
        left = Expr::Disjoin(Box::new(left), Box::new(right));
        rest = after;
    }
    Ok((rest, left))
}

fn conjunction<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let (mut rest, mut left) = unary(input)?;
    while let (after, Some(_)) = opt(preceded(ws, char('&')))(rest)? {
        let (after, _) = ws(after)?;
        let (after, right) = unary(after)?;
        left = Expr::Unify(Box::new(left), Box::new(right));
        rest = after;
    }
    Ok((rest, left))
}

fn bound_op<'a>(input: Span<'a>) -> PResult<'a, BoundOp> {
    alt((
        value(BoundOp::Le, tag("<=")),
        value(BoundOp::Ge, tag(">=")),
        value(BoundOp::Ne, tag("!=")),
        value(BoundOp::Lt, char('<')),
        value(BoundOp::Gt, char('>')),
    ))(input)
}

fn unary<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let pos = pos_of(&input);
    if let (rest, Some(op)) = opt(bound_op)(input)? {
        let (rest, _) = ws(rest)?;
        let (rest, operand) = unary(rest)?;
        return Ok((rest, Expr::Bound(op, Box::new(operand), pos)));
    }
    if let (rest, Some(_)) = opt(char('*'))(input)? {
        let (rest, _) = ws(rest)?;
        let (rest, operand) = unary(rest)?;
        return Ok((rest, Expr::Default(Box::new(operand))));
    }
    if let (rest, Some(_)) = opt(char('-'))(input)? {
        let (rest, _) = ws(rest)?;
        let (rest, operand) = unary(rest)?;
        let negated = match operand {
            Expr::Int(i, _) if i != i64::MIN => Expr::Int(-i, pos),
            Expr::Float(f, _) => Expr::Float(-f, pos),
            other => Expr::Neg(Box::new(other), pos),
        };
        return Ok((rest, negated));
    }
    postfix(input)
}

fn postfix<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let (mut rest, mut base) = primary(input)?;
    loop {
        let dot = terminated(recognize(char('.')), not(char('.')));
        if let (after, Some(dot)) = opt(preceded(ws, dot))(rest)? {
            let (after, _) = ws(after)?;
            let (after, name) = match alt((identifier, quoted('"')))(after) {
                Ok(done) => done,
                Err(nom::Err::Error(_)) => {
                    return fail(after, format!("expected selector, found {}", describe(&after)))
                }
                Err(e) => return Err(e),
            };
            base = Expr::Select(Box::new(base), name, pos_of(&dot));
            rest = after;
            continue;
        }
        if let (after, Some(bracket)) = opt(preceded(blank, recognize(char('['))))(rest)? {
            let (after, _) = ws(after)?;
            let (after, index) = expr(after)?;
            let (after, _) = ws(after)?;
            let (after, _) = expect(']')(after)?;
            base = Expr::Index(Box::new(base), Box::new(index), pos_of(&bracket));
            rest = after;
            continue;
        }
        return Ok((rest, base));
    }
}

fn primary<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let pos = pos_of(&input);
    match input.fragment().chars().next() {
        Some('"') => {
            let (rest, s) = quoted('"')(input)?;
            Ok((rest, Expr::Str(s, pos)))
        }
        Some('\'') => {
            let (rest, s) = quoted('\'')(input)?;
            Ok((rest, Expr::Bytes(s.into_bytes(), pos)))
        }
        Some('(') => {
            let (rest, _) = char('(')(input)?;
            let (rest, _) = ws(rest)?;
            let (rest, inner) = expr(rest)?;
            let (rest, _) = ws(rest)?;
            let (rest, _) = expect(')')(rest)?;
            Ok((rest, inner))
        }
        Some('{') => structure(input),
        Some('[') => list(input),
        Some(c) if c.is_ascii_digit() => number(input),
        Some('_') if input.fragment().starts_with("_|_") => {
            let (rest, _) = tag("_|_")(input)?;
            Ok((rest, Expr::Bottom(pos)))
        }
        Some(c) if is_ident_start(c) => {
            let (rest, name) = identifier(input)?;
            let expr = match name.as_str() {
                "null" => Expr::Null(pos),
                "true" => Expr::Bool(true, pos),
                "false" => Expr::Bool(false, pos),
                "_" => Expr::Top(pos),
                _ => match Kind::keyword(&name) {
                    Some(kind) => Expr::Kind(kind, pos),
                    None => Expr::Ident(name, pos),
                },
            };
            Ok((rest, expr))
        }
        _ => fail(input, format!("unexpected {}", describe(&input))),
    }
}

fn structure<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let pos = pos_of(&input);
    let (rest, _) = char('{')(input)?;
    let (rest, decls) = decls(rest, Some('}'))?;
    let (rest, _) = expect('}')(rest)?;
    Ok((rest, Expr::Struct(StructLit { decls, pos })))
}

/// `[a, b]`, with an optional `...T` tail; a bare `...` is open to anything.
fn list<'a>(input: Span<'a>) -> PResult<'a, Expr> {
    let pos = pos_of(&input);
    let (mut rest, _) = char('[')(input)?;
    let mut elems = Vec::new();
    let mut tail = None;
    loop {
        let (after, _) = ws(rest)?;
        rest = after;
        if rest.fragment().starts_with(']') {
            break;
        }
        if let (after, Some(ellipsis)) = opt(tag("..."))(rest)? {
            let (after, _) = ws(after)?;
            let (after, t) = match after.fragment().chars().next() {
                Some(']') | Some(',') => (after, Expr::Top(pos_of(&ellipsis))),
                _ => expr(after)?,
            };
            let (after, _) = ws(after)?;
            let (after, _) = opt(char(','))(after)?;
            let (after, _) = ws(after)?;
            tail = Some(Box::new(t));
            rest = after;
            break;
        }
        let (after, elem) = expr(rest)?;
        elems.push(elem);
        let (after, _) = blank(after)?;
        rest = match after.fragment().chars().next() {
            Some(',') => char(',')(after)?.0,
            Some(']') | Some('\n') => after,
            _ => {
                return fail(
                    after,
                    format!("missing ',' in list literal before {}", describe(&after)),
                )
            }
        };
    }
    let (rest, _) = expect(']')(rest)?;
    Ok((
        rest,
        Expr::List(ListLit {
            elems,
            rest: tail,
            pos,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(file: &'a File, name: &str) -> &'a Field {
        file.decls
            .iter()
            .find_map(|d| match d {
                Decl::Field(f) if f.label.name() == name => Some(f),
                _ => None,
            })
            .unwrap()
    }

    fn elems(src: &str) -> Vec<Expr> {
        match parse_expr("e", src).unwrap() {
            Expr::List(l) => l.elems,
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn parses_package_and_fields() {
        let file = parse_file("a.cue", "package foo\n\na: 1\nb?: string\n\"c d\": [1, 2]").unwrap();
        assert_eq!(file.package.as_deref(), Some("foo"));
        assert_eq!(file.decls.len(), 3);
        assert!(field(&file, "b").optional);
        assert_eq!(field(&file, "c d").label, Label::Str("c d".into()));
    }

    #[test]
    fn package_is_only_a_clause_when_followed_by_a_name() {
        let file = parse_file("a.cue", "package: 1").unwrap();
        assert_eq!(file.package, None);
        assert_eq!(file.decls.len(), 1);
    }

    #[test]
    fn optional_field_with_bound() {
        let file = parse_file("t.cue", "a?: >=1 & int").unwrap();
        let a = field(&file, "a");
        assert!(a.optional);
        match &a.value {
            Expr::Unify(left, right) => {
                assert!(matches!(**left, Expr::Bound(BoundOp::Ge, _, _)));
                assert!(matches!(**right, Expr::Kind(Kind::Int, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn newlines_separate_and_comments_are_skipped() {
        let file = parse_file("t.cue", "a: 1 // one\nb: 2").unwrap();
        assert_eq!(file.decls.len(), 2);
        let b = field(&file, "b");
        assert_eq!(b.pos.line, 2);
        assert_eq!(b.pos.column, 1);
        assert_eq!(b.pos.to_string(), "t.cue:2:1");
    }

    #[test]
    fn literals_and_specials() {
        let items = elems(r#"["a\"b", 1.5, 1e3, 1_000, _|_, #D, 'x', null, _]"#);
        assert!(matches!(&items[0], Expr::Str(s, _) if s == "a\"b"));
        assert!(matches!(items[1], Expr::Float(f, _) if f == 1.5));
        assert!(matches!(items[2], Expr::Float(f, _) if f == 1000.0));
        assert!(matches!(items[3], Expr::Int(1000, _)));
        assert!(matches!(items[4], Expr::Bottom(_)));
        assert!(matches!(&items[5], Expr::Ident(s, _) if s == "#D"));
        assert!(matches!(&items[6], Expr::Bytes(b, _) if b == b"x"));
        assert!(matches!(items[7], Expr::Null(_)));
        assert!(matches!(items[8], Expr::Top(_)));
    }

    #[test]
    fn string_escapes() {
        let items = elems(r#"["tab\there", "é"]"#);
        assert!(matches!(&items[0], Expr::Str(s, _) if s == "tab\there"));
        assert!(matches!(&items[1], Expr::Str(s, _) if s == "é"));

        let err = parse_expr("e", r#""\q""#).unwrap_err();
        assert_eq!(err.to_string(), "e:1:1: unknown escape sequence \\q");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = parse_file("t.cue", "a: \"abc").unwrap_err();
        assert_eq!(err.to_string(), "t.cue:1:4: string literal not terminated");

        let err = parse_file("t.cue", "a: \"abc\nb: 1").unwrap_err();
        assert!(err.to_string().contains("not terminated"));
    }

    #[test]
    fn integer_literal_beyond_int64_is_an_error() {
        let err = parse_file("t.cue", "n: 18446744073709551615").unwrap_err();
        assert_eq!(err.to_string(), "t.cue:1:4: integer 18446744073709551615 overflows int64");
        assert!(matches!(
            parse_expr("e", "9223372036854775807").unwrap(),
            Expr::Int(i64::MAX, _)
        ));
    }

    #[test]
    fn nested_label_shorthand() {
        let file = parse_file("a.cue", "a: b: c: 1").unwrap();
        let a = field(&file, "a");
        match &a.value {
            Expr::Struct(s) => assert_eq!(s.decls.len(), 1),
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn operators_bind_and_tighter_than_or() {
        let expr = parse_expr("e", "*1 | int & >0").unwrap();
        match expr {
            Expr::Disjoin(left, right) => {
                assert!(matches!(*left, Expr::Default(_)));
                assert!(matches!(*right, Expr::Unify(_, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn operators_continue_across_lines() {
        let file = parse_file("a.cue", "a: int &\n    >0\nb: 2").unwrap();
        assert_eq!(file.decls.len(), 2);
        assert!(matches!(field(&file, "a").value, Expr::Unify(_, _)));
    }

    #[test]
    fn selectors_and_indexes() {
        let expr = parse_expr("e", "a.b[0].#C").unwrap();
        match expr {
            Expr::Select(inner, name, pos) => {
                assert_eq!(name, "#C");
                assert_eq!(pos.column, 7);
                assert!(matches!(*inner, Expr::Index(_, _, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn index_does_not_continue_across_lines() {
        let file = parse_file("a.cue", "a: b\n[1]").unwrap();
        assert_eq!(file.decls.len(), 2);
        assert!(matches!(file.decls[1], Decl::Embed(Expr::List(_))));
    }

    #[test]
    fn open_lists() {
        let expr = parse_expr("e", "[int, ...string]").unwrap();
        match expr {
            Expr::List(l) => {
                assert_eq!(l.elems.len(), 1);
                assert!(matches!(l.rest.as_deref(), Some(Expr::Kind(Kind::String, _))));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_expr("e", "[...]").unwrap() {
            Expr::List(l) => assert!(matches!(l.rest.as_deref(), Some(Expr::Top(_)))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn lists_accept_newlines_as_separators() {
        assert_eq!(elems("[\n    1\n    2,\n]").len(), 2);
        let err = parse_expr("e", "[1 2]").unwrap_err();
        assert_eq!(err.to_string(), "e:1:4: missing ',' in list literal before 2");
    }

    #[test]
    fn negative_numbers_fold() {
        assert!(matches!(parse_expr("e", "-3").unwrap(), Expr::Int(-3, _)));
        assert!(matches!(parse_expr("e", ">=-1.5").unwrap(), Expr::Bound(BoundOp::Ge, _, _)));
        assert!(matches!(parse_expr("e", "-a").unwrap(), Expr::Neg(_, _)));
    }

    #[test]
    fn missing_separator_reports_position() {
        let err = parse_file("bad.cue", "a: 1 b: 2").unwrap_err();
        assert_eq!(err.to_string(), "bad.cue:1:6: missing ',' before identifier b");
    }

    #[test]
    fn unclosed_struct_reports_end_of_input() {
        let err = parse_file("bad.cue", "a: {\n").unwrap_err();
        assert_eq!(err.to_string(), "bad.cue:2:1: expected '}', found end of input");
    }

    #[test]
    fn rejects_imports() {
        let err = parse_file("i.cue", "import \"strings\"").unwrap_err();
        assert!(err.to_string().contains("imports are not supported"));
    }

    #[test]
    fn trailing_garbage_in_expression() {
        let err = parse_expr("--expression", "a b").unwrap_err();
        assert_eq!(
            err.to_string(),
            "--expression:1:3: expected end of input, found identifier b"
        );
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let file = parse_file("a.cue", "\u{feff}a: 1").unwrap();
        assert_eq!(field(&file, "a").pos.column, 1);
    }
}
