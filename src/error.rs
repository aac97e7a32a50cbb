// ═══════════════════════════════════════════════════════════
// Lox Errors: syntax, runtime and host-level failures
// ═══════════════════════════════════════════════════════════

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems found before any statement runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("[line {line}] Error: {message}")]
    Lex { line: usize, message: String },

    #[error("[line {line}] Error {location}: {message}")]
    Parse {
        line: usize,
        location: String,
        message: String,
    },
}

impl SyntaxError {
    pub fn line(&self) -> usize {
        match self {
            SyntaxError::Lex { line, .. } | SyntaxError::Parse { line, .. } => *line,
        }
    }
}

/// Failures that abort a running script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{message}\n[line {line}]")]
    Type { line: usize, message: String },

    #[error("Can only call functions, got {found}.\n[line {line}]")]
    NotCallable { line: usize, found: String },

    #[error("Expected {expected} arguments but got {got}.\n[line {line}]")]
    Arity {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("Undefined variable '{name}'.\n[line {line}]")]
    UndefinedVariable { line: usize, name: String },

    #[error("Stack overflow.\n[line {line}]")]
    StackOverflow { line: usize },

    #[error("Cannot write output: {message}\n[line {line}]")]
    Output { line: usize, message: String },
}

impl RuntimeError {
    pub fn line(&self) -> usize {
        match self {
            RuntimeError::Type { line, .. }
            | RuntimeError::NotCallable { line, .. }
            | RuntimeError::Arity { line, .. }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::StackOverflow { line }
            | RuntimeError::Output { line, .. } => *line,
        }
    }

    pub(crate) fn type_error(line: usize, message: impl Into<String>) -> Self {
        RuntimeError::Type { line, message: message.into() }
    }
}

/// Everything that can end a run unsuccessfully.
#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{}", render_syntax(.0))]
    Syntax(Vec<SyntaxError>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoxError {
    /// Process exit status for this failure (sysexits.h conventions).
    pub fn exit_code(&self) -> u8 {
        match self {
            LoxError::Syntax(_) => 65,
            LoxError::Runtime(_) => 70,
            LoxError::Io { .. } => 66,
        }
    }
}

impl From<Vec<SyntaxError>> for LoxError {
    fn from(errors: Vec<SyntaxError>) -> Self {
        LoxError::Syntax(errors)
    }
}

fn render_syntax(errors: &[SyntaxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn syntax_errors_render_one_per_line() {
        let err = LoxError::from(vec![
            SyntaxError::Lex { line: 1, message: "Unexpected character '@'.".into() },
            SyntaxError::Parse {
                line: 3,
                location: "at end".into(),
                message: "Expect ';' after value.".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "[line 1] Error: Unexpected character '@'.\n[line 3] Error at end: Expect ';' after value."
        );
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn runtime_errors_carry_their_line() {
        let err = RuntimeError::Arity { line: 7, expected: 1, got: 2 };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "Expected 1 arguments but got 2.\n[line 7]");
        assert_eq!(LoxError::from(err).exit_code(), 70);
    }

    #[test]
    fn every_error_has_a_nonzero_exit_code() {
        let io = LoxError::Io {
            path: PathBuf::from("missing.lox"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert!(io.exit_code() != 0);
        assert!(io.to_string().contains("missing.lox"));
    }
}
