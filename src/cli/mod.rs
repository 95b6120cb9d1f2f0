//! CLI support for mace-lang
//!
//! Provides programmatic access to the `mace` subcommands so other tools can
//! embed them.

mod check;
mod eval;

pub use check::{CheckOptions, CheckReport, execute_check};
pub use eval::{EvalOptions, execute_eval, parse_variable};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Compilation failed
    Compile(crate::CompileError),
    /// Execution failed
    Runtime(crate::RuntimeError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// A `--var` argument without `=`
    InvalidVariable(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Compile(e) => {
                writeln!(f, "Compile error: {}", e)?;
                for diagnostic in e.diagnostics.iter().skip(1) {
                    writeln!(f, "  {}", diagnostic)?;
                }
                Ok(())
            }
            CliError::Runtime(e) => write!(f, "Runtime error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::InvalidVariable(arg) => {
                write!(f, "Invalid variable '{}': expected name=value", arg)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Compile(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::InvalidVariable(_) => None,
        }
    }
}

impl From<crate::CompileError> for CliError {
    fn from(e: crate::CompileError) -> Self {
        CliError::Compile(e)
    }
}

impl From<crate::RuntimeError> for CliError {
    fn from(e: crate::RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
