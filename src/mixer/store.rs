//! Mixer definition shared between the tick and the text delivery path.
//!
//! The tick mixes through [`MixerStore::lock`]; the delivery path calls
//! [`MixerStore::handle_text`] from its own context. Both go through the same
//! [`MixGuard`], so whichever side arrives second backs off instead of
//! waiting.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

use super::group::MixerGroup;
use super::guard::{MixGuard, MixToken};
use super::text::{self, MixerTextBuffer};
use crate::error::MixerLoadError;
use crate::input::ControlInput;
use crate::state::MixerLimits;

/// Definition plus the loader's scratch state.
pub(crate) struct Definition {
    pub(crate) group: MixerGroup,
    pub(crate) text: MixerTextBuffer,
    /// Set when a delivery overflowed; only a RESET clears it
    pub(crate) abandoned: bool,
}

pub struct MixerStore {
    guard: MixGuard,
    definition: UnsafeCell<Definition>,
    mixer_ok: AtomicBool,
    edit_locked: AtomicBool,
}

// Safety: `definition` is only reached through `lock`, which hands out at most
// one `MixerLock` at a time.
unsafe impl Sync for MixerStore {}

impl MixerStore {
    pub const fn new() -> Self {
        Self {
            guard: MixGuard::new(),
            definition: UnsafeCell::new(Definition {
                group: MixerGroup::new(),
                text: MixerTextBuffer::new(),
                abandoned: false,
            }),
            mixer_ok: AtomicBool::new(false),
            edit_locked: AtomicBool::new(false),
        }
    }

    /// Exclusive access to the definition, or `None` while the other side
    /// holds it.
    pub fn lock(&self) -> Option<MixerLock<'_>> {
        let token = self.guard.try_acquire()?;
        // Safety: the token proves no other `MixerLock` exists.
        let definition = unsafe { &mut *self.definition.get() };
        Some(MixerLock { token, definition })
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Last MIXER_OK decision of the loader
    pub fn mixer_ok(&self) -> bool {
        self.mixer_ok.load(Ordering::Acquire)
    }

    /// Published by the tick: edits are refused while set
    pub fn set_edit_locked(&self, locked: bool) {
        self.edit_locked.store(locked, Ordering::Release);
    }

    /// Apply one mixer text delivery.
    ///
    /// Retryable refusals (`Armed`, `Busy`) leave the definition and buffer as
    /// they were. Anything past the arming check clears MIXER_OK; see
    /// [`MixerStore::commit`].
    pub fn handle_text(&self, msg: &[u8]) -> Result<(), MixerLoadError> {
        if self.edit_locked.load(Ordering::Acquire) {
            return Err(MixerLoadError::Armed);
        }

        self.mixer_ok.store(false, Ordering::Release);

        let mut lock = self.lock().ok_or(MixerLoadError::Busy)?;
        text::apply(lock.definition, msg)
    }

    /// Mark the definition usable once every delivered byte was parsed, at
    /// least one mixer exists and no delivery was dropped since the last
    /// RESET. Returns the new MIXER_OK state; `false` without change while
    /// a mix is running.
    pub fn commit(&self) -> bool {
        let Some(lock) = self.lock() else {
            return false;
        };

        let ok = text::is_complete(lock.definition);
        self.mixer_ok.store(ok, Ordering::Release);
        if ok {
            crate::io_info!("mixer ok, {} mixers", lock.definition.group.len());
        }
        ok
    }
}

impl Default for MixerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Held guard plus the definition it protects.
pub struct MixerLock<'a> {
    token: MixToken<'a>,
    definition: &'a mut Definition,
}

impl<'a> MixerLock<'a> {
    pub fn group(&self) -> &MixerGroup {
        &self.definition.group
    }

    /// Text received but not yet parsed
    pub fn pending_text(&self) -> &[u8] {
        self.definition.text.text()
    }

    pub fn is_abandoned(&self) -> bool {
        self.definition.abandoned
    }

    pub fn token(&self) -> &MixToken<'a> {
        &self.token
    }

    pub fn mix<I: ControlInput + ?Sized>(
        &self,
        input: &mut I,
        outputs: &mut [f32],
        limits: &mut MixerLimits,
    ) -> usize {
        self.definition.group.mix(&self.token, input, outputs, limits)
    }
}
