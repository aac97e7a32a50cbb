//! Stack growth for deeply nested source and deep (but bounded) recursion.
//!
//! The parser and the evaluator both recurse on the shape of the program.
//! Wrapping the recursive entry points keeps a nested expression or a long
//! chain of Lox calls from overflowing the native stack.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
