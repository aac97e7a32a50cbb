// Runtime values

use std::fmt;
use std::rc::Rc;

use crate::ast::FunDecl;
use crate::env::Env;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Callable),
}

#[derive(Debug, Clone)]
pub enum Callable {
    User(Rc<UserFn>),
    Native(NativeFn),
}

/// A function declaration paired with the scope it was declared in.
pub struct UserFn {
    pub decl: Rc<FunDecl>,
    pub closure: Env,
}

#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> Value,
}

impl Value {
    /// `nil` and `false` are falsy; everything else, `0` and `""` included, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil         => "nil",
            Value::Bool(_)     => "boolean",
            Value::Number(_)   => "number",
            Value::Str(_)      => "string",
            Value::Function(_) => "function",
        }
    }
}

impl Callable {
    pub fn arity(&self) -> usize {
        match self {
            Callable::User(f)   => f.decl.params.len(),
            Callable::Native(f) => f.arity,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Callable::User(f)   => &f.decl.name.lexeme,
            Callable::Native(f) => f.name,
        }
    }
}

// Values compare by tag first, so `1 == "1"` and `nil == false` are false.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil)             => true,
            (Value::Bool(a), Value::Bool(b))     => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b))       => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::User(a), Callable::User(b)) => Rc::ptr_eq(a, b),
            (Callable::Native(a), Callable::Native(b)) => a.name == b.name,
            _ => false,
        }
    }
}

// The closure can reach this function again, so it is left out.
impl fmt::Debug for UserFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFn")
            .field("name", &self.decl.name.lexeme)
            .field("arity", &self.decl.params.len())
            .finish()
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil       => write!(f, "nil"),
            Value::Bool(b)   => write!(f, "{}", b),
            Value::Number(n) => fmt_number(*n, f),
            Value::Str(s)    => write!(f, "\"{}\"", s),
            Value::Function(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::User(func) => write!(f, "<fn {}>", func.decl.name.lexeme),
            Callable::Native(_)  => write!(f, "<fn native>"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_infinite() {
        write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        // f64's Display drops a zero fraction: 3.0 prints as 3.
        write!(f, "{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Name;
    use pretty_assertions::assert_eq;

    fn user_fn(name: &str, params: &[&str]) -> Value {
        let decl = FunDecl {
            name: Name::new(name, 1),
            params: params.iter().map(|p| Name::new(*p, 1)).collect(),
            body: Vec::new(),
        };
        Value::Function(Callable::User(Rc::new(UserFn {
            decl: Rc::new(decl),
            closure: Env::new(),
        })))
    }

    fn zero(_: &[Value]) -> Value {
        Value::Number(0.0)
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Str(String::new()).is_truthy());
    }

    #[test]
    fn display() {
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-5789.0).to_string(), "-5789");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::Str("OK".into()).to_string(), "\"OK\"");
        assert_eq!(user_fn("foo", &["a"]).to_string(), "<fn foo>");

        let clock = NativeFn { name: "clock", arity: 0, func: zero };
        assert_eq!(Value::Function(Callable::Native(clock)).to_string(), "<fn native>");
    }

    #[test]
    fn equality_never_crosses_types() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Str("a".into()), Value::Str("a".into()));
        assert_ne!(Value::Number(1.0), Value::Str("1".into()));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = user_fn("f", &[]);
        let same_shape = user_fn("f", &[]);
        assert_eq!(f, f.clone());
        assert_ne!(f, same_shape);
    }

    #[test]
    fn arity_and_name() {
        let Value::Function(callable) = user_fn("add", &["a", "b"]) else {
            panic!("expected a function");
        };
        assert_eq!(callable.arity(), 2);
        assert_eq!(callable.name(), "add");
    }
}
