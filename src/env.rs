// ── Environment ───────────────────────────────────────────────────────────────
//
// A scope is shared: the block or call that created it holds one handle and
// every closure defined inside holds another, so the scope lives as long as
// the longest of them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Name;
use crate::error::RuntimeError;
use crate::value::Value;

#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvInner>>);

struct EnvInner {
    vars: HashMap<String, Value>,
    // Fixed at construction.
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(RefCell::new(EnvInner {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    pub fn child(parent: &Env) -> Self {
        Env(Rc::new(RefCell::new(EnvInner {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Binds `name` in this scope, replacing any binding it already had here.
    pub fn define(&self, name: &str, val: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), val);
    }

    pub fn get(&self, name: &Name) -> Result<Value, RuntimeError> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let inner = scope.0.borrow();
                if let Some(val) = inner.vars.get(&name.lexeme) {
                    return Ok(val.clone());
                }
                inner.parent.clone()
            };
            scope = parent.ok_or_else(|| undefined(name))?;
        }
    }

    /// Overwrites the nearest existing binding. Never declares.
    pub fn assign(&self, name: &Name, val: Value) -> Result<(), RuntimeError> {
        let mut scope = self.clone();
        loop {
            let parent = {
                let mut inner = scope.0.borrow_mut();
                if let Some(slot) = inner.vars.get_mut(&name.lexeme) {
                    *slot = val;
                    return Ok(());
                }
                inner.parent.clone()
            };
            scope = parent.ok_or_else(|| undefined(name))?;
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

// Unlinks the parent chain one scope at a time, so a long chain is freed in a
// loop. Stops at the first scope someone else still holds.
impl Drop for EnvInner {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(Env(rc)) = parent {
            parent = match Rc::try_unwrap(rc) {
                Ok(cell) => {
                    let mut inner = cell.into_inner();
                    inner.parent.take()
                }
                Err(_) => None,
            };
        }
    }
}

// Scopes are cyclic through closures, so only the local names are shown.
impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        let mut names: Vec<&String> = inner.vars.keys().collect();
        names.sort();
        f.debug_struct("Env")
            .field("names", &names)
            .field("has_parent", &inner.parent.is_some())
            .finish()
    }
}

fn undefined(name: &Name) -> RuntimeError {
    RuntimeError::UndefinedVariable { line: name.line, name: name.lexeme.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(s: &str) -> Name {
        Name::new(s, 1)
    }

    #[test]
    fn lookup_walks_outward() {
        let global = Env::new();
        global.define("a", Value::Number(1.0));
        let inner = Env::child(&Env::child(&global));
        assert_eq!(inner.get(&name("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn shadowing_leaves_the_outer_binding_alone() {
        let global = Env::new();
        global.define("a", Value::Number(1.0));
        let block = Env::child(&global);
        block.define("a", Value::Str("shadow".into()));

        assert_eq!(block.get(&name("a")), Ok(Value::Str("shadow".into())));
        assert_eq!(global.get(&name("a")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn assign_updates_the_nearest_definition() {
        let global = Env::new();
        global.define("a", Value::Number(1.0));
        let block = Env::child(&global);
        block.assign(&name("a"), Value::Number(2.0)).expect("a is defined");

        assert_eq!(global.get(&name("a")), Ok(Value::Number(2.0)));
        assert_eq!(block.get(&name("a")), Ok(Value::Number(2.0)));
    }

    #[test]
    fn assign_never_declares() {
        let global = Env::new();
        let err = global.assign(&Name::new("ghost", 4), Value::Nil).unwrap_err();
        assert_eq!(err, RuntimeError::UndefinedVariable { line: 4, name: "ghost".into() });
        assert!(global.get(&name("ghost")).is_err());
    }

    #[test]
    fn redefinition_in_one_scope_overwrites() {
        let global = Env::new();
        global.define("a", Value::Number(1.0));
        global.define("a", Value::Bool(true));
        assert_eq!(global.get(&name("a")), Ok(Value::Bool(true)));
    }

    #[test]
    fn long_scope_chains_resolve() {
        let global = Env::new();
        global.define("root", Value::Number(1.0));
        let mut scope = global.clone();
        for _ in 0..100_000 {
            scope = Env::child(&scope);
        }
        scope.assign(&name("root"), Value::Number(2.0)).expect("root is defined");
        assert_eq!(scope.get(&name("root")), Ok(Value::Number(2.0)));
    }

    #[test]
    fn handles_alias_one_scope() {
        let scope = Env::new();
        let alias = scope.clone();
        alias.define("n", Value::Number(0.0));
        scope.assign(&name("n"), Value::Number(5.0)).expect("n is defined");

        assert_eq!(alias.get(&name("n")), Ok(Value::Number(5.0)));
    }
}
