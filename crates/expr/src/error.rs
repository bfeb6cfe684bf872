//! Parse and evaluation errors for the expression sublanguages.

use thiserror::Error;

/// A syntax error with the byte offset of the offending token, per
/// §4.1's error taxonomy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

/// Errors raised while evaluating a parsed condition, update, or
/// key-condition AST against an item.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    /// An attribute-name placeholder (`#foo`) had no entry in the name
    /// substitution map. Per §4.1 this is not itself an error at
    /// resolution time (the placeholder simply never matches), but
    /// callers that require every placeholder to resolve (e.g. update
    /// SET right-hand sides) surface it as one.
    #[error("name placeholder '{0}' did not resolve to an attribute name")]
    UnresolvedName(String),

    /// A value placeholder resolved to "undefined", or an operation
    /// was applied to a value of the wrong type (e.g. arithmetic on a
    /// non-numeric operand, `list_append` on a non-list).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A function name that is not one of the eight defined in §4.1,
    /// or a function used in a position its return type does not
    /// support (e.g. `size(...)` used as a boolean condition atom).
    #[error("unknown or misused function: {0}")]
    UnknownFunction(String),
}
