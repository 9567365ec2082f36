//! Ordered mixer definition.

use heapless::Vec;

use super::guard::MixToken;
use super::simple::{self, Mixer, Parsed};
use crate::config::MAX_MIXERS;
use crate::error::MixerParseError;
use crate::input::ControlInput;
use crate::state::MixerLimits;

/// Ordered mixer definition. Mixer `n` drives output `n`.
#[derive(Debug, Default)]
pub struct MixerGroup {
    mixers: Vec<Mixer, MAX_MIXERS>,
}

impl MixerGroup {
    pub const fn new() -> Self {
        Self { mixers: Vec::new() }
    }

    pub fn reset(&mut self) {
        self.mixers.clear();
    }

    pub fn len(&self) -> usize {
        self.mixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixers.is_empty()
    }

    /// Parse as many complete descriptions as possible from the front of
    /// `text`, returning the bytes consumed.
    pub fn load(&mut self, text: &[u8]) -> usize {
        let mut consumed = 0;

        while consumed < text.len() {
            let rest = &text[consumed..];
            let result = simple::parse(rest).and_then(|parsed| match parsed {
                Parsed::Skip(used) => Ok(used),
                Parsed::Mixer(mixer, used) => self
                    .mixers
                    .push(mixer)
                    .map(|_| used)
                    .map_err(|_| MixerParseError::Full),
            });

            match result {
                Ok(used) => consumed += used,
                Err(MixerParseError::Incomplete) => break,
                Err(e) => {
                    crate::io_debug!("mixer load stopped at byte {}: {}", consumed, e);
                    break;
                }
            }
        }

        consumed
    }

    /// Evaluate every mixer in order into `outputs`; returns how many
    /// outputs were written.
    pub fn mix<I: ControlInput + ?Sized>(
        &self,
        _token: &MixToken<'_>,
        input: &mut I,
        outputs: &mut [f32],
        limits: &mut MixerLimits,
    ) -> usize {
        let mut index = 0;

        for mixer in &self.mixers {
            let Some(slot) = outputs.get_mut(index) else {
                break;
            };
            *slot = mixer.mix(input, limits);
            index += 1;
        }

        index
    }
}
