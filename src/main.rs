// ═══════════════════════════════════════════════════════════
// rlox: command-line front end for the Lox interpreter
// ═══════════════════════════════════════════════════════════

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use rlox::lexer::{Lexer, TokenKind};
use rlox::{Interpreter, LoxError, SyntaxError};

/// Tree-walking interpreter for the Lox scripting language.
#[derive(ClapParser, Debug)]
#[command(name = "rlox", version, about, long_about = None)]
struct Args {
    /// Script to run. Starts an interactive session when omitted.
    script: Option<PathBuf>,

    /// Lex and parse the script without running it.
    #[arg(long, requires = "script", conflicts_with = "dump_ast")]
    check: bool,

    /// Print the parsed program as S-expressions instead of running it.
    #[arg(long, requires = "script")]
    dump_ast: bool,

    /// Write diagnostic logs to stderr (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    log: Option<tracing::Level>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(level) = args.log {
        init_logging(level);
    }

    let result = match &args.script {
        Some(path) if args.check => check_file(path),
        Some(path) if args.dump_ast => dump_file(path),
        Some(path) => run_file(path),
        None => repl(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::default().add_directive(LevelFilter::from_level(level).into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

// ═══════════════════════════════════════════════════════════
// Script modes
// ═══════════════════════════════════════════════════════════

fn run_file(path: &Path) -> Result<(), LoxError> {
    let source = rlox::read_script(path)?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "running script");
    rlox::run_source(&source, io::stdout().lock())
}

fn check_file(path: &Path) -> Result<(), LoxError> {
    let source = rlox::read_script(path)?;
    let count = rlox::check_source(&source)?;
    tracing::debug!(path = %path.display(), declarations = count, "check passed");
    println!("OK");
    Ok(())
}

fn dump_file(path: &Path) -> Result<(), LoxError> {
    let source = rlox::read_script(path)?;
    for stmt in rlox::parse_source(&source)? {
        println!("{}", stmt);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// REPL
// ═══════════════════════════════════════════════════════════

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";

fn repl() -> Result<(), LoxError> {
    let mut editor = DefaultEditor::new().map_err(|e| LoxError::Io {
        path: PathBuf::from("<stdin>"),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    })?;
    let mut interp = Interpreter::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION_PROMPT };
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        };

        buffer.push_str(&line);
        buffer.push('\n');
        if needs_more_input(&buffer) {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        if source.trim().is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(source.trim_end()) {
            tracing::debug!(error = %e, "history entry not recorded");
        }

        let result = rlox::parse_source(&source)
            .map_err(LoxError::from)
            .and_then(|program| interp.run(&program).map_err(LoxError::from));
        if let Err(e) = result {
            eprintln!("{}", e);
        }
    }
    Ok(())
}

/// True while `source` has an open string or more openers than closers.
fn needs_more_input(source: &str) -> bool {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => {
            let depth: i64 = tokens
                .iter()
                .map(|t| match t.kind {
                    TokenKind::LParen | TokenKind::LBrace => 1,
                    TokenKind::RParen | TokenKind::RBrace => -1,
                    _ => 0,
                })
                .sum();
            depth > 0
        }
        Err(errors) => errors.iter().any(|e| {
            matches!(e, SyntaxError::Lex { message, .. } if message == "Unterminated string.")
        }),
    }
}
