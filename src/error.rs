//! Error types shared by the scanner, compiler and interpreter.
//!
//! Parse errors abort a compilation immediately. Type errors are collected as
//! [`Diagnostic`]s so one compile call can surface several of them; the call fails
//! with a [`CompileError`] when any of them is fatal. Runtime failures are
//! [`RuntimeError`]s and always propagate to the caller of `execute`.

use std::fmt;

use thiserror::Error;

use crate::ast::Op;

/// Malformed syntax found by the scanner, positioned at an absolute offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize) -> Self {
        ParseError { kind, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unbalanced '{0}'")]
    Unbalanced(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("reserved word '{0}' cannot be used here")]
    ReservedWord(String),
    #[error("unexpected operator '{0}', expected an operand")]
    UnexpectedOperator(String),
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("malformed number '{0}'")]
    MalformedNumber(String),
    #[error("expected {0}")]
    Expected(String),
    #[error("missing operand after '{0}'")]
    MissingOperand(String),
}

/// Position of a diagnostic in the original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Absolute character offset
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 0-based column (offset minus the start of the line)
    pub column: usize,
    /// The offending source slice
    pub snippet: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {}, column {}",
            self.severity, self.message, self.location.line, self.location.column
        )?;
        if !self.location.snippet.is_empty() {
            write!(f, ", near '{}'", self.location.snippet)?;
        }
        f.write_str(")")
    }
}

/// A failed compilation, carrying every diagnostic that was collected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Fatal diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_fatal())
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.errors().next()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some(first) => {
                write!(f, "{first}")?;
                let rest = self.errors().count().saturating_sub(1);
                if rest > 0 {
                    write!(f, " (and {rest} more)")?;
                }
                Ok(())
            }
            None => f.write_str("compilation failed"),
        }
    }
}

/// Failure reducing one `(operator, lhs, rhs)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: Op,
        left: String,
        right: String,
    },
    #[error("arithmetic error in '{op}': {message}")]
    Arithmetic { op: Op, message: String },
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("'{op}' requires a Boolean operand, got {actual}")]
    Condition { op: Op, actual: String },
    #[error("missing operand after '{op}'")]
    Incomplete { op: Op },
}

/// Failure reported by a property resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("no property '{property}' on {type_name}")]
    NoSuchProperty { property: String, type_name: String },
    #[error("no method '{method}' on {type_name}")]
    NoSuchMethod { method: String, type_name: String },
    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("cannot access '{segment}' on null")]
    NullTarget { segment: String },
    #[error("{type_name} is not indexable")]
    NotIndexable { type_name: String },
    #[error("{type_name} is read-only")]
    ReadOnly { type_name: String },
    #[error("invalid arguments to '{method}': {message}")]
    InvalidArguments { method: String, message: String },
}

/// Failure while executing a compiled chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("unresolvable identifier '{name}'")]
    Unresolved { name: String },
    #[error("could not access '{expr}': {error}")]
    Access {
        expr: String,
        #[source]
        error: AccessError,
    },
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: Op,
        left: String,
        right: String,
    },
    #[error("arithmetic error in '{op}': {message}")]
    Arithmetic { op: Op, message: String },
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("cannot convert {actual} to {expected}")]
    Coercion { expected: String, actual: String },
    #[error("{operation} requires {expected}, got {actual}")]
    InvalidOperand {
        operation: String,
        expected: String,
        actual: String,
    },
    #[error("assertion failed: {expr}")]
    Assertion { expr: String },
    #[error("'{name}' is not callable")]
    NotCallable { name: String },
    #[error("'{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("unexpected operator '{op}', expected an operand")]
    UnexpectedOperator { op: Op },
    #[error("missing operand after '{op}'")]
    MissingOperand { op: Op },
}

impl From<ReduceError> for RuntimeError {
    fn from(e: ReduceError) -> Self {
        match e {
            ReduceError::TypeMismatch { op, left, right } => {
                RuntimeError::TypeMismatch { op, left, right }
            }
            ReduceError::Arithmetic { op, message } => RuntimeError::Arithmetic { op, message },
            ReduceError::InvalidPattern { pattern, message } => {
                RuntimeError::InvalidPattern { pattern, message }
            }
            ReduceError::Condition { op, actual } => RuntimeError::InvalidOperand {
                operation: op.lexeme().to_string(),
                expected: "Boolean".to_string(),
                actual,
            },
            ReduceError::Incomplete { op } => RuntimeError::MissingOperand { op },
        }
    }
}

/// Any failure of the one-shot [`crate::eval`] entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
