//! Template scripting engine for printable card-game decks.
//!
//! Deck templates mix literal markup with a small expression and statement
//! language.  This crate parses the expressions, executes the statements once
//! per card, and sends the resulting draw commands to a face.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`script`] | expressions, values, built-ins, statements, executor, text markup |
//! | [`context`] | the [`Resolver`](context::Resolver) for styles, icons and paths |
//! | [`face`] | the [`Face`](face::Face) / [`Card`](face::Card) draw targets |
//! | [`deck`] | building whole decks from card data |
//! | [`config`] | the configuration file loader |
//! | [`cli`] | argument parsing for the `deckscript` binary |
//! | [`error`] | [`ValidateError`] |

pub mod cli;
pub mod config;
pub mod context;
pub mod deck;
pub mod error;
pub mod face;
pub mod script;

pub use error::{Result, ValidateError};
