//! Expression AST and parser.
//!
//! Two entry points share one character cursor:
//!
//! - [`parse_template`] reads literal text with `${expr}` splices (`$$` is a
//!   literal `$`) and yields an [`Expr::Concat`].
//! - [`parse_expression`] reads a single full expression.
//!
//! Operator precedence (loosest → tightest):
//!   `or`  →  `and`  →  relational (`=` `!=` `LT` `GT` `LE` `GE`)  →
//!   additive  →  multiplicative  →  unary (`-` `#`)  →  postfix  →  primary
//!
//! Every operator is sugar for a call into the function library: `a + b`
//! parses as `Call("+", [a, b])`, `-a` as `Call("negate", [a])` and `#a` as
//! `Call("len", [a])`.

use super::value::Value;
use crate::error::{Result, ValidateError};

// ── AST ───────────────────────────────────────────────────────────────────────

/// A compiled expression.  Built once, then evaluated read-only any number of
/// times by any number of executors.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Identifier(String),
    /// Pieces are stringified and joined.
    Concat(Vec<Expr>),
    /// `base.name`
    Field(Box<Expr>, String),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Identifier(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    pub fn field(base: Expr, name: impl Into<String>) -> Self {
        Expr::Field(Box::new(base), name.into())
    }
}

// ── Operator tables ───────────────────────────────────────────────────────────

const UNARY_LEVEL: u8 = 0;
const MUL_LEVEL: u8 = 1;
const ADD_LEVEL: u8 = 2;
const REL_LEVEL: u8 = 3;
const AND_LEVEL: u8 = 4;
const OR_LEVEL: u8 = 5;

/// `(source symbol, function name, level)`, longest symbols first so that a
/// scan stops at the longest match.
const SYMBOL_OPS: &[(&str, &str, u8)] = &[
    ("!=", "!=", REL_LEVEL),
    ("<=", "LE", REL_LEVEL),
    (">=", "GE", REL_LEVEL),
    ("=", "=", REL_LEVEL),
    ("<", "LT", REL_LEVEL),
    (">", "GT", REL_LEVEL),
    ("+", "+", ADD_LEVEL),
    ("-", "-", ADD_LEVEL),
    ("*", "*", MUL_LEVEL),
    ("/", "/", MUL_LEVEL),
    ("%", "%", MUL_LEVEL),
];

/// Operators spelled as bare identifiers.  XML attribute values can't
/// comfortably hold `<`, so the relational ones have word forms.
const WORD_OPS: &[(&str, u8)] = &[
    ("LT", REL_LEVEL),
    ("GT", REL_LEVEL),
    ("LE", REL_LEVEL),
    ("GE", REL_LEVEL),
    ("and", AND_LEVEL),
    ("or", OR_LEVEL),
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Character-cursor parser.  Positions reported in errors are character
/// offsets into the source string.
pub struct Parser {
    src: Vec<char>,
    pos: usize,
    depth: usize,
}

/// Deepest nesting of parentheses, calls and prefix operators accepted.
const MAX_DEPTH: usize = 128;

impl Parser {
    pub fn new(src: &str) -> Self {
        Parser {
            src: src.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    /// Current cursor offset, in characters.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn looking_at(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
    }

    pub fn skip_ws(&mut self) {
        while self.peek().is_some_and(is_ws) {
            self.pos += 1;
        }
    }

    fn error(&self, msg: impl std::fmt::Display) -> ValidateError {
        ValidateError::at_position(self.pos, msg)
    }

    // ── Template strings ──────────────────────────────────────────────────────

    /// Parse the rest of the input as literal text with `${…}` splices.
    pub fn parse_template(&mut self) -> Result<Expr> {
        let mut pieces = Vec::new();
        while let Some(ch) = self.peek() {
            if ch != '$' {
                let begin = self.pos;
                while self.peek().is_some_and(|c| c != '$') {
                    self.pos += 1;
                }
                let text: String = self.src[begin..self.pos].iter().collect();
                pieces.push(Expr::Literal(Value::Str(text)));
                continue;
            }
            self.pos += 1;
            match self.peek() {
                Some('$') => {
                    self.pos += 1;
                    pieces.push(Expr::literal("$"));
                }
                Some('{') => {
                    self.pos += 1;
                    let inner = self.parse_expr()?;
                    self.skip_ws();
                    match self.peek() {
                        Some('}') => self.pos += 1,
                        None => return Err(self.error("unterminated '${', expected '}'")),
                        Some(c) => return Err(self.error(format!("expected '}}', found '{c}'"))),
                    }
                    pieces.push(inner);
                }
                _ => {
                    return Err(self.error(
                        "'$' must be followed by '{' or another '$' (write '$$' for a literal dollar sign)",
                    ))
                }
            }
        }
        Ok(Expr::Concat(pieces))
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    /// Parse one expression starting at the cursor.  Trailing input is left
    /// unconsumed.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_binary(OR_LEVEL)
    }

    /// Left-associative binary operators of `level`, operands at `level - 1`.
    fn parse_binary(&mut self, level: u8) -> Result<Expr> {
        if level == UNARY_LEVEL {
            return self.parse_unary();
        }
        let mut lhs = self.parse_binary(level - 1)?;
        loop {
            self.skip_ws();
            let Some((name, width)) = self.match_operator(level) else {
                break;
            };
            self.pos += width;
            let rhs = self.parse_binary(level - 1)?;
            lhs = Expr::call(name, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// Which operator of `level` starts at the cursor, as
    /// `(function name, width in chars)`.  Never consumes.
    fn match_operator(&self, level: u8) -> Option<(&'static str, usize)> {
        if self.peek().is_some_and(is_ident_start) {
            let width = self.src[self.pos..]
                .iter()
                .take_while(|c| is_ident_continue(**c))
                .count();
            let word: String = self.src[self.pos..self.pos + width].iter().collect();
            return WORD_OPS
                .iter()
                .find(|(w, l)| *w == word && *l == level)
                .map(|(w, _)| (*w, width));
        }
        SYMBOL_OPS
            .iter()
            .find(|(sym, _, _)| self.looking_at(sym))
            .filter(|(_, _, l)| *l == level)
            .map(|(sym, name, _)| (*name, sym.chars().count()))
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        self.depth += 1;
        let result = self.parse_prefixed();
        self.depth -= 1;
        result
    }

    fn parse_prefixed(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(Expr::call("negate", vec![self.parse_unary()?]))
            }
            Some('#') => {
                self.pos += 1;
                Ok(Expr::call("len", vec![self.parse_unary()?]))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    self.skip_ws();
                    let name = self.read_ident();
                    if name.is_empty() {
                        return Err(self.error("expected identifier after '.'"));
                    }
                    expr = Expr::field(expr, name);
                }
                Some('(') => {
                    // Only a bare name can be called.
                    let Expr::Identifier(name) = &expr else {
                        break;
                    };
                    let name = name.clone();
                    self.pos += 1;
                    expr = Expr::Call(name, self.parse_args()?);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Argument list after the opening `(`.
    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(')') {
                return Ok(args);
            }
            return Err(match self.peek() {
                None => self.error("unterminated argument list, expected ')'"),
                Some(c) => self.error(format!("expected ',' or ')', found '{c}'")),
            });
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_ws();
        match self.peek() {
            Some(c) if is_ident_start(c) => Ok(Expr::Identifier(self.read_ident())),
            Some(c) if c.is_ascii_digit() => self.read_number(),
            Some('\'') => self.read_string(),
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.skip_ws();
                if !self.eat(')') {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(c) => Err(self.error(format!("expected expression, found '{c}'"))),
            None => Err(self.error("expected expression")),
        }
    }

    fn read_ident(&mut self) -> String {
        let mut name = String::new();
        if self.peek().is_some_and(is_ident_start) {
            while let Some(c) = self.peek().filter(|c| is_ident_continue(*c)) {
                name.push(c);
                self.pos += 1;
            }
        }
        name
    }

    fn read_number(&mut self) -> Result<Expr> {
        let begin = self.pos;
        // A leading zero is a number on its own: `007` is `0` then `07`.
        if self.peek() == Some('0') {
            self.pos += 1;
        } else {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.src[begin..self.pos].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(|x| Expr::Literal(Value::Float(x)))
                .map_err(|_| ValidateError::at_position(begin, format!("invalid number '{text}'")))
        } else {
            text.parse::<i64>()
                .map(|n| Expr::Literal(Value::Int(n)))
                .map_err(|_| ValidateError::at_position(begin, "integer literal out of range"))
        }
    }

    fn read_string(&mut self) -> Result<Expr> {
        let begin = self.pos;
        self.pos += 1; // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ValidateError::at_position(begin, "unterminated string literal"))
                }
                Some('\'') => break,
                Some('\\') => s.push(self.read_escape()?),
                Some(c) => s.push(c),
            }
        }
        Ok(Expr::Literal(Value::Str(s)))
    }

    /// Decode the escape after a backslash.
    fn read_escape(&mut self) -> Result<char> {
        let at = self.pos - 1;
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('0') => Ok('\0'),
            Some(c @ ('\\' | '\'' | '"' | '$' | '{' | '}' | '@' | '*')) => Ok(c),
            Some('x') => self.read_code_point(2, at),
            Some('u') => self.read_code_point(4, at),
            Some('U') => self.read_code_point(8, at),
            Some(c) => Err(ValidateError::at_position(
                at,
                format!("invalid escape sequence '\\{c}'"),
            )),
            None => Err(ValidateError::at_position(at, "unterminated string literal")),
        }
    }

    /// Exactly `digits` hex digits naming a Unicode scalar value.
    fn read_code_point(&mut self, digits: usize, at: usize) -> Result<char> {
        let mut code: u32 = 0;
        for _ in 0..digits {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error(format!("expected {digits} hex digits in escape")))?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        char::from_u32(code).ok_or_else(|| {
            ValidateError::at_position(at, format!("invalid code point U+{code:X}"))
        })
    }
}

/// Parse `src` as a single expression; trailing input is an error.
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(src);
    let expr = parser.parse_expr()?;
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected character '{c}'")));
    }
    Ok(expr)
}

/// Parse `src` as a template string (`literal ${expr} literal`).
pub fn parse_template(src: &str) -> Result<Expr> {
    Parser::new(src).parse_template()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
