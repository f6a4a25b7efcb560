//! Scoped diagnostic output prefix
//!
//! Solvers tag their log lines with the current prefix. A decorator pushes its own label for the
//! duration of a solve; the guard restores the previous prefix when dropped, also on early
//! return through `?`.

use std::cell::RefCell;

thread_local! {
    static PREFIX_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Restores the previous output prefix on drop
#[must_use = "the prefix is popped as soon as the guard is dropped"]
pub struct PrefixGuard {
    depth: usize,
}

impl Drop for PrefixGuard {
    fn drop(&mut self) {
        PREFIX_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.truncate(self.depth);
        });
    }
}

/// Make `label` the output prefix until the returned guard is dropped
pub fn push_prefix(label: impl Into<String>) -> PrefixGuard {
    PREFIX_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let depth = stack.len();
        stack.push(label.into());
        PrefixGuard { depth }
    })
}

/// Current output prefix, empty when none was pushed on this thread
pub fn prefix() -> String {
    PREFIX_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}
