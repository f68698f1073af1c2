// Util Module - LED range expansion and the shared done flag
use std::sync::atomic::{AtomicBool, Ordering};

/// Expand (first, last, step) into the list of covered indices.
///
/// `last` is exclusive. A positive step walks upward until strictly past
/// `last`; a negative step walks downward until strictly below it. A zero
/// step yields an empty range.
pub fn make_range(first: i64, last: i64, step: i64) -> Vec<i64> {
    let mut range = Vec::new();
    if step > 0 {
        let mut i = first;
        while i < last {
            range.push(i);
            i += step;
        }
    } else if step < 0 {
        let mut i = first;
        while i > last {
            range.push(i);
            i += step;
        }
    }
    range
}

/// Monotonic completion flag shared between the animator and the event
/// paths. Once set it never clears.
#[derive(Debug, Default)]
pub struct DoneState {
    done: AtomicBool,
}

impl DoneState {
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn set_done(&self) -> bool {
        self.done.store(true, Ordering::Release);
        true
    }
}
