//! The template language.
//!
//! Expressions appear in template attributes, either as a whole expression
//! (`cost + 1`) or spliced into literal text (`Costs ${cost} gold`).
//! Statements are built by the template loader and run by an [`Executor`]
//! once per card, sending draw commands to a face.
//!
//! - [`expr`]: parser for expressions and template strings
//! - [`value`]: runtime values and arithmetic
//! - [`builtins`]: the fixed function table (operators included)
//! - [`stmt`]: statement trees with source locations
//! - [`interp`]: the executor
//! - [`markup`]: `*italic*`, `**bold**` and `@icon` markup in drawn text
//!
//! # Quick start
//!
//! ```rust
//! use deckscript::context::TemplateContext;
//! use deckscript::script::{parse_expression, ExecOptions, Executor, Value};
//!
//! let ctx = TemplateContext::new("/decks");
//! let mut ex = Executor::new(&ctx, ExecOptions::default());
//! ex.env_mut().set("cost", Value::Int(6));
//! let expr = parse_expression("cost * 7").unwrap();
//! assert_eq!(ex.eval(&expr).unwrap(), "42");
//! ```

pub mod builtins;
pub mod expr;
pub mod interp;
pub mod markup;
pub mod stmt;
pub mod value;

pub use expr::{parse_expression, parse_template, Expr, Parser};
pub use interp::{Environment, ExecOptions, Executor, DEFAULT_FUEL};
pub use markup::render_markup;
pub use stmt::{Location, Stmt, StmtKind, WhenBlock};
pub use value::{Record, Value};
