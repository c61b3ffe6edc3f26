//! The single error kind raised by the template engine.
//!
//! Parsing, evaluation and execution all fail with a [`ValidateError`]
//! carrying a human-readable message.  There are no subtypes: callers tell
//! failures apart only by message content.  As an error unwinds through
//! statements, cards and decks, each layer prepends its own context with
//! [`ValidateError::context`].

use thiserror::Error;

/// A template validation or evaluation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidateError {
    message: String,
}

impl ValidateError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidateError {
            message: message.into(),
        }
    }

    /// Parser failure at a character offset of the source string.
    pub fn at_position(pos: usize, message: impl std::fmt::Display) -> Self {
        ValidateError::new(format!("at position {pos}: {message}"))
    }

    /// Prepend `prefix` to the message, e.g. a source location.
    pub fn context(self, prefix: impl std::fmt::Display) -> Self {
        ValidateError::new(format!("{prefix}: {}", self.message))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ValidateError {
    fn from(message: String) -> Self {
        ValidateError::new(message)
    }
}

impl From<&str> for ValidateError {
    fn from(message: &str) -> Self {
        ValidateError::new(message)
    }
}

pub type Result<T, E = ValidateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_nests_outermost_first() {
        let e = ValidateError::new("step is 0")
            .context("at line 3, col 5")
            .context("at line 1, col 1");
        assert_eq!(e.to_string(), "at line 1, col 1: at line 3, col 5: step is 0");
    }

    #[test]
    fn position_prefix() {
        let e = ValidateError::at_position(7, "expected ')'");
        assert_eq!(e.message(), "at position 7: expected ')'");
    }
}
