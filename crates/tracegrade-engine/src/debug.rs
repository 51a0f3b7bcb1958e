//! Debug mode.
//!
//! In debug mode a custom equivalence function that fails is reported as a
//! [`VerifyError::EquivalenceFailed`](crate::VerifyError::EquivalenceFailed)
//! instead of being treated as "not equal". The switch is thread-local so a
//! diagnostic session on one thread never changes how concurrent
//! evaluations on other threads behave.

use std::cell::Cell;

thread_local! {
    static DEBUG_MODE: Cell<bool> = const { Cell::new(false) };
}

pub fn enable() {
    DEBUG_MODE.with(|m| m.set(true));
}

pub fn disable() {
    DEBUG_MODE.with(|m| m.set(false));
}

pub fn is_enabled() -> bool {
    DEBUG_MODE.with(Cell::get)
}

/// Enable debug mode until the returned guard is dropped.
///
/// The previous setting is restored on drop, so scopes nest.
pub fn scope() -> DebugModeGuard {
    let previous = is_enabled();
    enable();
    DebugModeGuard { previous }
}

#[must_use = "debug mode ends when the guard is dropped"]
#[derive(Debug)]
pub struct DebugModeGuard {
    previous: bool,
}

impl Drop for DebugModeGuard {
    fn drop(&mut self) {
        DEBUG_MODE.with(|m| m.set(self.previous));
    }
}
