//! A tree-walking interpreter for Lox.
//!
//! Source goes through three phases: [`lexer`] turns text into tokens,
//! [`parser`] builds the [`ast`], and [`interpreter`] walks it. Syntax errors
//! from the first two phases are collected and reported together before
//! anything runs; a runtime error stops the run where it happens.

pub mod ast;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod natives;
pub mod parser;
pub mod stack;
pub mod value;

use std::fs;
use std::io::Write;
use std::path::Path;

pub use error::{LoxError, RuntimeError, SyntaxError};
pub use interpreter::Interpreter;

use ast::Stmt;
use lexer::Lexer;
use parser::Parser;

/// Scans and parses a whole program.
pub fn parse_source(source: &str) -> Result<Vec<Stmt>, Vec<SyntaxError>> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Validates `source` without running it, returning the number of top-level
/// declarations.
pub fn check_source(source: &str) -> Result<usize, LoxError> {
    Ok(parse_source(source)?.len())
}

/// Runs a complete program in a fresh interpreter, printing to `out`.
pub fn run_source<W: Write>(source: &str, out: W) -> Result<(), LoxError> {
    let program = parse_source(source)?;
    let mut interp = Interpreter::with_output(out);
    interp.run(&program)?;
    Ok(())
}

pub fn read_script(path: &Path) -> Result<String, LoxError> {
    fs::read_to_string(path).map_err(|source| LoxError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_source_writes_program_output() {
        let mut out = Vec::new();
        run_source("var greeting = \"hi\"; print greeting;", &mut out).expect("program should run");
        assert_eq!(String::from_utf8(out).expect("utf-8"), "\"hi\"\n");
    }

    #[test]
    fn syntax_errors_prevent_execution() {
        let mut out = Vec::new();
        let err = run_source("print \"side effect\";\nprint ;", &mut out).unwrap_err();
        assert_eq!(err.exit_code(), 65);
        assert_eq!(err.to_string(), "[line 2] Error at ';': Expect expression.");
        assert!(out.is_empty());
    }

    #[test]
    fn lex_errors_stop_before_parsing() {
        let err = check_source("var a = @;\nprint ;").unwrap_err();
        let LoxError::Syntax(errors) = err else {
            panic!("expected syntax errors");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line(), 1);
    }

    #[test]
    fn runtime_errors_keep_earlier_output() {
        let mut out = Vec::new();
        let err = run_source("print 1;\nprint -\"x\";\nprint 2;", &mut out).unwrap_err();
        assert_eq!(err.exit_code(), 70);
        assert!(err.to_string().ends_with("[line 2]"));
        assert_eq!(String::from_utf8(out).expect("utf-8"), "1\n");
    }

    #[test]
    fn check_counts_declarations() {
        assert_eq!(check_source("var a = 1; fun f() { print a; } f();").expect("valid"), 3);
    }

    #[test]
    fn missing_script_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_script(&dir.path().join("absent.lox")).unwrap_err();
        assert_eq!(err.exit_code(), 66);
    }
}
