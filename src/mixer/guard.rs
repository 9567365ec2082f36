//! Non-blocking exclusion between mixing and definition edits.

use core::sync::atomic::{AtomicBool, Ordering};

/// Compare-and-set flag held for the duration of a mix or an edit.
///
/// Never waits: a caller that cannot take it gets `None` and must back off.
pub struct MixGuard {
    busy: AtomicBool,
}

impl MixGuard {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    pub fn try_acquire(&self) -> Option<MixToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| MixToken { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Default for MixGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the guard is held. Released on drop.
pub struct MixToken<'g> {
    guard: &'g MixGuard,
}

impl Drop for MixToken<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}
