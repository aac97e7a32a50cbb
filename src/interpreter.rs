// Lox Tree-Walking Interpreter

use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{BinOp, Expr, FunDecl, Literal, LogicalOp, Stmt, UnaryOp};
use crate::env::Env;
use crate::error::RuntimeError;
use crate::natives;
use crate::stack::ensure_sufficient_stack;
use crate::value::{Callable, UserFn, Value};

/// Nested Lox calls allowed before the run is aborted.
pub const MAX_CALL_DEPTH: usize = 1000;

/// How a statement finished. A `return` unwinds to the nearest call as a
/// value, never through the error channel.
#[derive(Debug, PartialEq)]
pub enum Signal {
    Next,
    Return(Value),
}

type ExecResult = Result<Signal, RuntimeError>;
type EvalResult = Result<Value, RuntimeError>;

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter<W: Write = io::Stdout> {
    globals: Env,
    out: W,
    depth: usize,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// An interpreter whose `print` writes to `out`.
    pub fn with_output(out: W) -> Self {
        let globals = Env::new();
        natives::register(&globals);
        Interpreter { globals, out, depth: 0 }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs top-level statements in the global scope. Definitions persist
    /// across calls, which is what the REPL relies on.
    pub fn run(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        let env = self.globals.clone();
        self.depth = 0;
        // A top-level `return` just ends the run.
        if let Signal::Return(_) = self.exec_block(stmts, &env)? {
            tracing::debug!("return at top level ended the run");
        }
        Ok(())
    }

    /// Runs `stmts` in `env` and yields the first `return` it meets.
    pub fn exec_block(&mut self, stmts: &[Stmt], env: &Env) -> ExecResult {
        for stmt in stmts {
            if let Signal::Return(val) = self.exec_stmt(stmt, env)? {
                return Ok(Signal::Return(val));
            }
        }
        Ok(Signal::Next)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> ExecResult {
        ensure_sufficient_stack(|| self.exec(stmt, env))
    }

    fn exec(&mut self, stmt: &Stmt, env: &Env) -> ExecResult {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr, env)?;
                Ok(Signal::Next)
            }

            Stmt::Print(expr, line) => {
                let val = self.eval_expr(expr, env)?;
                writeln!(self.out, "{}", val).map_err(|e| RuntimeError::Output {
                    line: *line,
                    message: e.to_string(),
                })?;
                Ok(Signal::Next)
            }

            Stmt::Var(name, init) => {
                let val = match init {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Nil,
                };
                env.define(&name.lexeme, val);
                Ok(Signal::Next)
            }

            Stmt::Block(stmts) => {
                tracing::trace!(statements = stmts.len(), "enter block");
                let block_env = Env::child(env);
                self.exec_block(stmts, &block_env)
            }

            Stmt::If(cond, then, otherwise) => {
                if self.eval_expr(cond, env)?.is_truthy() {
                    self.exec_stmt(then, env)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, env)
                } else {
                    Ok(Signal::Next)
                }
            }

            Stmt::While(cond, body) => {
                while self.eval_expr(cond, env)?.is_truthy() {
                    if let Signal::Return(val) = self.exec_stmt(body, env)? {
                        return Ok(Signal::Return(val));
                    }
                }
                Ok(Signal::Next)
            }

            Stmt::Function(decl) => {
                let func = UserFn { decl: Rc::clone(decl), closure: env.clone() };
                env.define(&decl.name.lexeme, Value::Function(Callable::User(Rc::new(func))));
                Ok(Signal::Next)
            }

            Stmt::Return(expr) => {
                let val = match expr {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(val))
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn eval_expr(&mut self, expr: &Expr, env: &Env) -> EvalResult {
        ensure_sufficient_stack(|| self.eval(expr, env))
    }

    fn eval(&mut self, expr: &Expr, env: &Env) -> EvalResult {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Nil       => Value::Nil,
                Literal::Bool(b)   => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s)    => Value::Str(s.clone()),
            }),

            Expr::Grouping(inner) => self.eval_expr(inner, env),

            Expr::Unary { op, right, line } => {
                let val = self.eval_expr(right, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!val.is_truthy())),
                    UnaryOp::Neg => match val {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(RuntimeError::type_error(
                            *line,
                            format!("Operand of '-' must be a number, got {}.", other.type_name()),
                        )),
                    },
                }
            }

            Expr::Binary { left, op, right, line } => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                eval_binop(l, *op, r, *line)
            }

            Expr::Logical { left, op, right } => {
                let l = self.eval_expr(left, env)?;
                let short_circuits = match op {
                    LogicalOp::Or  => l.is_truthy(),
                    LogicalOp::And => !l.is_truthy(),
                };
                if short_circuits {
                    Ok(l)
                } else {
                    self.eval_expr(right, env)
                }
            }

            Expr::Variable(name) => env.get(name),

            Expr::Assign { name, value } => {
                let val = self.eval_expr(value, env)?;
                env.assign(name, val.clone())?;
                Ok(val)
            }

            Expr::Call { callee, args, line } => {
                let callee = self.eval_expr(callee, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, env)?);
                }
                self.call_value(callee, values, *line)
            }
        }
    }

    fn call_value(&mut self, callee: Value, args: Vec<Value>, line: usize) -> EvalResult {
        let func = match callee {
            Value::Function(func) => func,
            other => {
                return Err(RuntimeError::NotCallable { line, found: other.type_name().to_string() })
            }
        };

        if args.len() != func.arity() {
            return Err(RuntimeError::Arity { line, expected: func.arity(), got: args.len() });
        }

        match &func {
            Callable::Native(native) => Ok((native.func)(&args)),
            Callable::User(user) => {
                if self.depth >= MAX_CALL_DEPTH {
                    return Err(RuntimeError::StackOverflow { line });
                }
                tracing::trace!(name = func.name(), depth = self.depth, "call");

                self.depth += 1;
                let result = self.call_user(&user.decl, &user.closure, args);
                self.depth -= 1;
                result
            }
        }
    }

    fn call_user(&mut self, decl: &FunDecl, closure: &Env, args: Vec<Value>) -> EvalResult {
        let call_env = Env::child(closure);
        for (param, arg) in decl.params.iter().zip(args) {
            call_env.define(&param.lexeme, arg);
        }
        match self.exec_block(&decl.body, &call_env)? {
            Signal::Return(val) => Ok(val),
            Signal::Next => Ok(Value::Nil),
        }
    }
}

// ── Binary operations ─────────────────────────────────────────────────────────

fn eval_binop(l: Value, op: BinOp, r: Value, line: usize) -> EvalResult {
    match (op, &l, &r) {
        (BinOp::Eq, _, _)    => Ok(Value::Bool(l == r)),
        (BinOp::NotEq, _, _) => Ok(Value::Bool(l != r)),
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (_, Value::Number(a), Value::Number(b))    => Ok(numeric_op(op, *a, *b)),
        _ => {
            let expected = if op == BinOp::Add { "two numbers or two strings" } else { "numbers" };
            Err(RuntimeError::type_error(
                line,
                format!(
                    "Operands of '{}' must be {}, got {} and {}.",
                    op,
                    expected,
                    l.type_name(),
                    r.type_name()
                ),
            ))
        }
    }
}

// Division by zero is IEEE: 1 / 0 is Infinity and 0 / 0 is NaN.
fn numeric_op(op: BinOp, a: f64, b: f64) -> Value {
    match op {
        BinOp::Add   => Value::Number(a + b),
        BinOp::Sub   => Value::Number(a - b),
        BinOp::Mul   => Value::Number(a * b),
        BinOp::Div   => Value::Number(a / b),
        BinOp::Eq    => Value::Bool(a == b),
        BinOp::NotEq => Value::Bool(a != b),
        BinOp::Lt    => Value::Bool(a < b),
        BinOp::LtEq  => Value::Bool(a <= b),
        BinOp::Gt    => Value::Bool(a > b),
        BinOp::GtEq  => Value::Bool(a >= b),
    }
}
