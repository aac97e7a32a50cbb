// ═══════════════════════════════════════════════════════════
// Lox Native Functions, bound in the global scope at startup
// ═══════════════════════════════════════════════════════════

use std::time::{SystemTime, UNIX_EPOCH};

use crate::env::Env;
use crate::value::{Callable, NativeFn, Value};

const NATIVES: &[NativeFn] = &[
    NativeFn { name: "clock", arity: 0, func: clock },
];

pub fn register(env: &Env) {
    for native in NATIVES {
        env.define(native.name, Value::Function(Callable::Native(*native)));
    }
    tracing::trace!(count = NATIVES.len(), "registered natives");
}

/// Whole seconds since the Unix epoch.
fn clock(_args: &[Value]) -> Value {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Value::Number(secs as f64)
}
