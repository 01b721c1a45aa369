//! Stack growth for the recursive passes.
//!
//! The parser, resolver and evaluator all recurse once per nesting level of
//! the program. Each recursive entry point goes through
//! [`ensure_sufficient_stack`], which moves onto a fresh heap-allocated
//! segment when the current one runs low. Depth itself is capped elsewhere
//! (parser nesting, interpreter call depth), so growth is bounded.

/// Grow when less than this much stack remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::ensure_sufficient_stack;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
    }

    #[test]
    fn test_recursion_past_the_thread_stack() {
        assert_eq!(depth(200_000), 200_000);
    }

    #[test]
    fn test_passes_results_through() {
        let result: Result<i32, &str> = ensure_sufficient_stack(|| Ok(7));
        assert_eq!(result, Ok(7));
    }
}
