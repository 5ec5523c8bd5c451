//! Error types for the spice-expr crate.
//!
//! This module defines the error types for every stage of the pipeline:
//!
//! - `ParseError`: Lexical and syntax errors while turning text into a `Node` tree
//! - `BuilderError`: Errors while compiling a tree into an evaluator
//! - `EquationError`: High-level errors when working with equations and systems
//!
//! A `None` derivative map ("not differentiable") is a value, not an error, and does not
//! appear here.

use thiserror::Error;

/// Errors that can occur while lexing or parsing expression text.
///
/// Both variants carry the byte offset into the source text at which the problem was found.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A character that does not start any token
    #[error("unexpected character '{character}' at offset {offset}")]
    Lexical { character: char, offset: usize },
    /// A token sequence that does not form a valid expression
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
}

impl ParseError {
    /// Returns the byte offset at which the error was detected.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::Lexical { offset, .. } | ParseError::Syntax { offset, .. } => *offset,
        }
    }

    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Errors that can occur while compiling a tree into an evaluator.
///
/// All of them are raised at build time, before any evaluator is invoked.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    /// The resolver could not provide a value source for a variable
    #[error("unresolved variable: {0}")]
    UnresolvedVariable(String),
    /// No function with this name and arity is registered
    #[error("unknown function: {name} with {arity} argument(s)")]
    UnknownFunction { name: String, arity: usize },
    /// The function exists but has no implementation for the numeric backend in use
    #[error("function {name} is not available for the {backend} backend")]
    MissingImplementation { name: String, backend: &'static str },
}

/// High-level errors that can occur when working with equations.
///
/// This enum wraps the parse and build errors and adds the failure modes of the
/// `Equation` and `EquationSystem` facades.
#[derive(Debug, Error)]
pub enum EquationError {
    /// Error when the expression text could not be parsed
    #[error("Failed to parse expression")]
    Parse(#[from] ParseError),
    /// Error when an evaluator could not be built
    #[error("Failed to build evaluator")]
    Build(#[from] BuilderError),
    /// Error when trying to get the derivative for a variable that is not in the equation
    #[error("Derivative not found for variable: {0}")]
    DerivativeNotFound(String),
    /// Error when the equation has no symbolic derivative
    #[error("Expression is not differentiable: {0}")]
    NotDifferentiable(String),
    /// Error when an output buffer has the wrong length
    #[error("Invalid output length: expected {expected}, got {got}")]
    InvalidOutputLength { expected: usize, got: usize },
}
