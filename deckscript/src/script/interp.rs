//! Statement executor.
//!
//! An [`Executor`] walks one statement tree for one card (or one shared
//! template face).  It owns the variable [`Environment`], tracks which face
//! draw commands go to, and counts down a fuel budget so runaway `while`
//! loops terminate.  Executors are cheap and never reused.
//!
//! | Statement | Needs |
//! |-----------|-------|
//! | draw rect / text / image | an active face |
//! | select face | an active card and no active face |
//! | set name / description | an active card |
//! | everything else | nothing |

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use super::builtins::{self, to_list, to_number};
use super::expr::Expr;
use super::markup::render_markup;
use super::stmt::{Stmt, StmtKind};
use super::value::Value;
use crate::context::Resolver;
use crate::error::{Result, ValidateError};
use crate::face::{Card, Face, Rect};

/// Statements one executor may run before giving up.
pub const DEFAULT_FUEL: u64 = 50_000;

/// Per-execution limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    pub fuel: u64,
}

impl Default for ExecOptions {
    fn default() -> Self {
        ExecOptions { fuel: DEFAULT_FUEL }
    }
}

// ── Environment ───────────────────────────────────────────────────────────────

/// Flat variable store.
///
/// There is no block scoping: a variable assigned inside an `if` or `while`
/// body stays visible afterwards.  Only loop variables are scoped, through
/// [`enter_loop_scope`](Environment::enter_loop_scope) and
/// [`exit_loop_scope`](Environment::exit_loop_scope).
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Capture the current binding of a loop variable.
    pub fn enter_loop_scope(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    /// Put back what [`enter_loop_scope`](Self::enter_loop_scope) captured,
    /// unbinding the name if it had no value before the loop.
    pub fn exit_loop_scope(&mut self, name: &str, saved: Option<Value>) {
        match saved {
            Some(value) => {
                self.vars.insert(name.to_owned(), value);
            }
            None => {
                self.vars.remove(name);
            }
        }
    }
}

// ── Executor ──────────────────────────────────────────────────────────────────

/// Where draw commands currently go.
enum FaceSlot<'a> {
    Inactive,
    /// A face handed in by the caller (shared template faces).
    Template(&'a mut dyn Face),
    /// The active card's front face, inside a `SelectFace` body.
    CardFront,
}

pub struct Executor<'a> {
    resolver: &'a dyn Resolver,
    card: Option<&'a mut dyn Card>,
    face: FaceSlot<'a>,
    env: Environment,
    fuel: u64,
}

impl<'a> Executor<'a> {
    /// An executor with no card and no face; only expressions, variables and
    /// control flow are usable.
    pub fn new(resolver: &'a dyn Resolver, options: ExecOptions) -> Self {
        Executor {
            resolver,
            card: None,
            face: FaceSlot::Inactive,
            env: Environment::new(),
            fuel: options.fuel,
        }
    }

    /// An executor for one card; faces are selected by the template.
    pub fn for_card(resolver: &'a dyn Resolver, card: &'a mut dyn Card, options: ExecOptions) -> Self {
        Executor {
            card: Some(card),
            ..Executor::new(resolver, options)
        }
    }

    /// An executor drawing straight onto `face`, with no card.
    pub fn for_face(resolver: &'a dyn Resolver, face: &'a mut dyn Face, options: ExecOptions) -> Self {
        Executor {
            face: FaceSlot::Template(face),
            ..Executor::new(resolver, options)
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Statements left before the budget runs out.
    pub fn fuel(&self) -> u64 {
        self.fuel
    }

    /// Run one statement (and its children).
    ///
    /// Any failure is prefixed with the statement's location, so an error
    /// raised deep inside nested bodies carries the whole trail.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        self.fuel = self.fuel.saturating_sub(1);
        if self.fuel == 0 {
            debug!("fuel exhausted at {}", stmt.location);
            return Err(ValidateError::new("evaluation took too many steps"));
        }
        self.execute_kind(&stmt.kind)
            .map_err(|e| e.context(format!("at {}", stmt.location)))
    }

    fn execute_kind(&mut self, kind: &StmtKind) -> Result<()> {
        match kind {
            StmtKind::Sequence(stmts) => {
                for stmt in stmts {
                    self.execute(stmt)?;
                }
                Ok(())
            }

            StmtKind::DrawRect {
                x,
                y,
                width,
                height,
                fill,
                line_color,
                line_width,
            } => {
                self.require_face()?;
                let rect = self.eval_rect(x, y, width, height)?;
                let fill = self.eval_optional(fill.as_ref(), parse_color)?;
                let line_color = self.eval_optional(line_color.as_ref(), parse_color)?;
                let line_width = self.eval_optional(line_width.as_ref(), parse_int)?.unwrap_or(1);
                self.face_mut()?.draw_rect(rect, fill, line_color, line_width);
                Ok(())
            }

            StmtKind::DrawText {
                x,
                y,
                width,
                height,
                style,
                text,
            } => {
                self.require_face()?;
                let resolver = self.resolver;
                let rect = self.eval_rect(x, y, width, height)?;
                let style = resolver.resolve_style(&self.eval(style)?)?;
                let markup = render_markup(&self.eval(text)?, resolver)?;
                self.face_mut()?.draw_text(rect, style, markup);
                Ok(())
            }

            StmtKind::DrawImage {
                x,
                y,
                src,
                align_x,
                align_y,
            } => {
                self.require_face()?;
                let pos = (parse_int(&self.eval(x)?)?, parse_int(&self.eval(y)?)?);
                let src = self.resolver.resolve_path(&self.eval(src)?);
                let align = (
                    self.eval_optional(align_x.as_ref(), parse_float)?.unwrap_or(0.0),
                    self.eval_optional(align_y.as_ref(), parse_float)?.unwrap_or(0.0),
                );
                self.face_mut()?.draw_image(pos, src, align);
                Ok(())
            }

            StmtKind::SelectFace(body) => {
                if !matches!(self.face, FaceSlot::Inactive) {
                    return Err(ValidateError::new("face already selected"));
                }
                let card = self
                    .card
                    .as_deref_mut()
                    .ok_or_else(|| ValidateError::new("no active card"))?;
                // Attached even if the body draws nothing.
                card.front_face();
                self.face = FaceSlot::CardFront;
                let result = self.execute(body);
                self.face = FaceSlot::Inactive;
                result
            }

            StmtKind::ForEach { var, source, body } => {
                let items = to_list(self.compute(source)?)?;
                let saved = self.env.enter_loop_scope(var);
                let result = items.into_iter().try_for_each(|item| {
                    self.env.set(var.as_str(), item);
                    self.execute(body)
                });
                self.env.exit_loop_scope(var, saved);
                result
            }

            StmtKind::For {
                var,
                from,
                to,
                step,
                body,
            } => {
                let from = to_number(self.compute(from)?)?;
                let to = to_number(self.compute(to)?)?;
                let step = match step {
                    Some(step) => to_number(self.compute(step)?)?,
                    None => Value::Int(1),
                };
                if step.is_zero() {
                    return Err(ValidateError::new("step is 0"));
                }
                let saved = self.env.enter_loop_scope(var);
                let result = self.run_for(var, from, &to, &step, body);
                self.env.exit_loop_scope(var, saved);
                result
            }

            StmtKind::If { cond, body } => {
                if self.condition(cond)? {
                    self.execute(body)?;
                }
                Ok(())
            }

            StmtKind::While { cond, body } => {
                while self.condition(cond)? {
                    self.execute(body)?;
                }
                Ok(())
            }

            StmtKind::Case { whens, else_body } => {
                for when in whens {
                    let taken = self
                        .condition(&when.cond)
                        .map_err(|e| e.context(format!("at {}", when.location)))?;
                    if taken {
                        return self.execute(&when.body);
                    }
                }
                match else_body {
                    Some(body) => self.execute(body),
                    None => Ok(()),
                }
            }

            StmtKind::SetName(value) => {
                self.require_card()?;
                let name = self.eval(value)?;
                self.card_mut()?.set_name(name);
                Ok(())
            }

            StmtKind::SetDescription(value) => {
                self.require_card()?;
                let description = self.eval(value)?;
                self.card_mut()?.set_description(description);
                Ok(())
            }

            StmtKind::SetVar { var, value } => {
                let value = self.compute(value)?;
                self.env.set(var.as_str(), value);
                Ok(())
            }
        }
    }

    /// Inclusive numeric range in the direction of `step`.
    fn run_for(&mut self, var: &str, from: Value, to: &Value, step: &Value, body: &Stmt) -> Result<()> {
        let ascending = step.as_f64().is_some_and(|s| s > 0.0);
        let mut value = from;
        loop {
            let past_end = match value.compare(to)? {
                Ordering::Greater => ascending,
                Ordering::Less => !ascending,
                Ordering::Equal => false,
            };
            if past_end {
                return Ok(());
            }
            self.env.set(var, value.clone());
            self.execute(body)?;
            // Stepping past the integer range also steps past `to`.
            match value.checked_add(step)? {
                Some(next) => value = next,
                None => return Ok(()),
            }
        }
    }

    fn condition(&self, cond: &Expr) -> Result<bool> {
        Ok(!to_number(self.compute(cond)?)?.is_zero())
    }

    // ── Expressions ──────────────────────────────────────────────────────────

    /// Evaluate an expression to a value.
    pub fn compute(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Concat(pieces) => {
                let mut out = String::new();
                for piece in pieces {
                    out.push_str(&self.eval(piece)?);
                }
                Ok(Value::Str(out))
            }
            Expr::Field(base, name) => match self.compute(base)? {
                Value::Record(fields) => Ok(fields
                    .get(name)
                    .map_or(Value::Null, |v| Value::Str(v.clone()))),
                _ => Err(ValidateError::new(format!(
                    "cannot read property '{name}' of non-object"
                ))),
            },
            Expr::Identifier(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| ValidateError::new(format!("variable '{name}' doesn't exist"))),
            Expr::Call(name, args) => {
                if builtins::lookup(name).is_none() {
                    return Err(ValidateError::new(format!("unknown function '{name}'")));
                }
                let args = args
                    .iter()
                    .map(|arg| self.compute(arg))
                    .collect::<Result<Vec<_>>>()?;
                builtins::call_builtin(name, args)
            }
        }
    }

    /// Evaluate an expression and stringify the result.
    pub fn eval(&self, expr: &Expr) -> Result<String> {
        Ok(match self.compute(expr)? {
            Value::Str(s) => s,
            other => other.to_string(),
        })
    }

    fn eval_rect(&self, x: &Expr, y: &Expr, width: &Expr, height: &Expr) -> Result<Rect> {
        Ok(Rect::new(
            parse_int(&self.eval(x)?)?,
            parse_int(&self.eval(y)?)?,
            parse_int(&self.eval(width)?)?,
            parse_int(&self.eval(height)?)?,
        ))
    }

    /// Absent operands and operands evaluating to null yield `None`.
    fn eval_optional<T>(&self, expr: Option<&Expr>, parse: fn(&str) -> Result<T>) -> Result<Option<T>> {
        let Some(expr) = expr else {
            return Ok(None);
        };
        let value = self.compute(expr)?;
        if value.is_null() {
            return Ok(None);
        }
        match value {
            Value::Str(s) => parse(&s).map(Some),
            other => parse(&other.to_string()).map(Some),
        }
    }

    // ── Targets ──────────────────────────────────────────────────────────────

    fn require_face(&self) -> Result<()> {
        match self.face {
            FaceSlot::Inactive => Err(ValidateError::new("no card face selected")),
            _ => Ok(()),
        }
    }

    fn face_mut(&mut self) -> Result<&mut dyn Face> {
        match &mut self.face {
            FaceSlot::Template(face) => Ok(&mut **face),
            FaceSlot::CardFront => match self.card.as_deref_mut() {
                Some(card) => Ok(card.front_face()),
                None => Err(ValidateError::new("no card face selected")),
            },
            FaceSlot::Inactive => Err(ValidateError::new("no card face selected")),
        }
    }

    fn require_card(&self) -> Result<()> {
        match self.card {
            Some(_) => Ok(()),
            None => Err(ValidateError::new("no card selected")),
        }
    }

    fn card_mut(&mut self) -> Result<&mut dyn Card> {
        match self.card.as_deref_mut() {
            Some(card) => Ok(card),
            None => Err(ValidateError::new("no card selected")),
        }
    }
}

// ── Operand parsing ───────────────────────────────────────────────────────────

fn parse_int(s: &str) -> Result<i64> {
    s.trim()
        .parse()
        .map_err(|_| ValidateError::new(format!("expected integer, got '{s}'")))
}

fn parse_float(s: &str) -> Result<f64> {
    s.trim()
        .parse()
        .map_err(|_| ValidateError::new(format!("expected number, got '{s}'")))
}

fn color_regex() -> Result<&'static Regex> {
    static COLOR: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = COLOR.get() {
        return Ok(re);
    }
    let re = Regex::new(r"^#[0-9a-fA-F]{6}([0-9a-fA-F]{2})?$")
        .map_err(|e| ValidateError::new(format!("color: {e}")))?;
    Ok(COLOR.get_or_init(|| re))
}

fn parse_color(s: &str) -> Result<String> {
    if color_regex()?.is_match(s) {
        Ok(s.to_owned())
    } else {
        Err(ValidateError::new(format!(
            "invalid color '{s}' (expected #RRGGBB or #RRGGBBAA)"
        )))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
