// Lox Abstract Syntax Tree

use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::stack::ensure_sufficient_stack;

/// An identifier as written in the source, with the line it appeared on.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub lexeme: String,
    pub line: usize,
}

impl Name {
    pub fn new(lexeme: impl Into<String>, line: usize) -> Self {
        Name { lexeme: lexeme.into(), line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    // ( expr )
    Grouping(Box<Expr>),

    Unary {
        op: UnaryOp,
        right: Box<Expr>,
        line: usize,
    },

    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
        line: usize,
    },

    // and / or: the right side may be skipped
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },

    Variable(Name),

    Assign {
        name: Name,
        value: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add, Sub, Mul, Div,
    Eq, NotEq, Lt, LtEq, Gt, GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),

    // print expr; with the line of the keyword
    Print(Expr, usize),

    // var name = init;
    Var(Name, Option<Expr>),

    Block(Vec<Stmt>),

    If(Expr, Box<Stmt>, Option<Box<Stmt>>),

    While(Expr, Box<Stmt>),

    // Shared with every closure created from this declaration
    Function(Rc<FunDecl>),

    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub name: Name,
    pub params: Vec<Name>,
    pub body: Vec<Stmt>,
}

// ── Parenthesized dump ───────────────────────────────────────────────────────

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add   => "+",
            BinOp::Sub   => "-",
            BinOp::Mul   => "*",
            BinOp::Div   => "/",
            BinOp::Eq    => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt    => "<",
            BinOp::LtEq  => "<=",
            BinOp::Gt    => ">",
            BinOp::GtEq  => ">=",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or  => write!(f, "or"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Nil       => write!(f, "nil"),
            Literal::Bool(b)   => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Str(s)    => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Expr::Literal(lit)                  => write!(f, "{}", lit),
            Expr::Grouping(inner)               => write!(f, "(group {})", inner),
            Expr::Unary { op, right, .. }       => write!(f, "({} {})", op, right),
            Expr::Binary { left, op, right, .. } => write!(f, "({} {} {})", op, left, right),
            Expr::Logical { left, op, right }   => write!(f, "({} {} {})", op, left, right),
            Expr::Variable(name)                => write!(f, "{}", name.lexeme),
            Expr::Assign { name, value }        => write!(f, "(= {} {})", name.lexeme, value),
            Expr::Call { callee, args, .. } => {
                write!(f, "(call {}", callee)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                write!(f, ")")
            }
        })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Stmt::Expr(e)                => write!(f, "(; {})", e),
            Stmt::Print(e, _)            => write!(f, "(print {})", e),
            Stmt::Var(name, None)        => write!(f, "(var {})", name.lexeme),
            Stmt::Var(name, Some(init))  => write!(f, "(var {} {})", name.lexeme, init),
            Stmt::Block(stmts) => {
                write!(f, "(block")?;
                for s in stmts {
                    write!(f, " {}", s)?;
                }
                write!(f, ")")
            }
            Stmt::If(cond, then, None)   => write!(f, "(if {} {})", cond, then),
            Stmt::If(cond, then, Some(otherwise)) => {
                write!(f, "(if-else {} {} {})", cond, then, otherwise)
            }
            Stmt::While(cond, body)      => write!(f, "(while {} {})", cond, body),
            Stmt::Function(decl) => {
                let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();
                write!(f, "(fun {} ({})", decl.name.lexeme, params.join(" "))?;
                for s in &decl.body {
                    write!(f, " {}", s)?;
                }
                write!(f, ")")
            }
            Stmt::Return(None)           => write!(f, "(return)"),
            Stmt::Return(Some(e))        => write!(f, "(return {})", e),
        })
    }
}

// ── Teardown ─────────────────────────────────────────────────────────────────
//
// Nesting depth is bounded only by the source text, so the derived drop glue
// could recurse past the end of the native stack. Each node instead hands its
// children to a work list and the list is drained in a loop.

impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut expr) = pending.pop() {
            expr.take_children(&mut pending);
        }
    }
}

impl Expr {
    fn take_children(&mut self, out: &mut Vec<Expr>) {
        match self {
            Expr::Grouping(inner)
            | Expr::Unary { right: inner, .. }
            | Expr::Assign { value: inner, .. } => out.push(detach_expr(inner)),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                out.push(detach_expr(left));
                out.push(detach_expr(right));
            }
            Expr::Call { callee, args, .. } => {
                out.push(detach_expr(callee));
                out.append(args);
            }
            Expr::Literal(_) | Expr::Variable(_) => {}
        }
    }
}

fn detach_expr(slot: &mut Box<Expr>) -> Expr {
    mem::replace(&mut **slot, Expr::Literal(Literal::Nil))
}

impl Drop for Stmt {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut stmt) = pending.pop() {
            stmt.take_children(&mut pending);
        }
    }
}

impl Stmt {
    fn take_children(&mut self, out: &mut Vec<Stmt>) {
        match self {
            Stmt::Block(stmts) => out.append(stmts),
            Stmt::If(_, then, otherwise) => {
                out.push(detach_stmt(then));
                if let Some(otherwise) = otherwise {
                    out.push(detach_stmt(otherwise));
                }
            }
            Stmt::While(_, body) => out.push(detach_stmt(body)),
            // Closures may still share the declaration; the last owner takes it apart.
            Stmt::Function(decl) => {
                if let Some(decl) = Rc::get_mut(decl) {
                    out.append(&mut decl.body);
                }
            }
            Stmt::Expr(_) | Stmt::Print(..) | Stmt::Var(..) | Stmt::Return(_) => {}
        }
    }
}

fn detach_stmt(slot: &mut Box<Stmt>) -> Stmt {
    mem::replace(&mut **slot, Stmt::Block(Vec::new()))
}
