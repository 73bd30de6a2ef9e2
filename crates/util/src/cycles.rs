//! Run-length repetition detector.
//!
//! The serializer and the interpolator both keep a stack of labels (property
//! names, or expressions being resolved). A traversal that keeps revisiting
//! the same nodes shows up as the same run of labels repeated back to back,
//! e.g. `a b c a b c a b c`. [`detect_cycles`] looks for such runs.

/// Shortest run length considered by default.
pub const DEFAULT_RUN_LENGTH: usize = 5;

/// Consecutive repetitions of a run needed to flag a cycle by default.
pub const DEFAULT_MAX_REPETITIONS: usize = 5;

/// Returns true when some run of `run_length` or more labels occurs
/// `max_repetitions` or more times contiguously in `stack`.
///
/// Run lengths are tried from `run_length` upward. For each length every
/// start offset is tried, the stack is cut into back-to-back runs of that
/// length, and equal neighbours are counted.
///
/// A stack shorter than `run_length * max_repetitions` can never hold such a
/// pattern and yields `false` straight away.
///
/// ```
/// use json_graph_util::detect_cycles;
///
/// let stack = ["a", "b", "a", "b", "a", "b"];
/// assert!(detect_cycles(&stack, 2, 3));
/// assert!(!detect_cycles(&stack, 2, 4));
/// ```
pub fn detect_cycles<T: PartialEq>(stack: &[T], run_length: usize, max_repetitions: usize) -> bool {
    if run_length == 0 || max_repetitions == 0 {
        return false;
    }
    let needed = match run_length.checked_mul(max_repetitions) {
        Some(n) => n,
        None => return false,
    };
    if stack.len() < needed {
        return false;
    }
    if max_repetitions == 1 {
        return true;
    }

    let longest = stack.len() / max_repetitions;
    for len in run_length..=longest {
        for offset in 0..len {
            let mut previous: Option<&[T]> = None;
            let mut repeats = 1;
            for run in stack[offset..].chunks_exact(len) {
                if previous == Some(run) {
                    repeats += 1;
                    if repeats >= max_repetitions {
                        return true;
                    }
                } else {
                    repeats = 1;
                }
                previous = Some(run);
            }
        }
    }
    false
}
