//! Streamed mixer definition loading.
//!
//! Each delivery is a 4-byte header followed by text:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 2 | magic `0x6d74`, little endian |
//! | 2 | 1 | action: 0 = reset, 1 = append |
//! | 3 | 1 | padding |
//!
//! Text that does not yet form a complete mixer description is kept in
//! [`MixerTextBuffer`] until the next delivery completes it. A delivery that
//! overflows the buffer abandons the load: later appends are refused until a
//! RESET starts over.

use heapless::Vec;

use super::store::Definition;
use crate::config::MIXER_TEXT_CAPACITY;
use crate::error::MixerLoadError;

// ── Header ──────────────────────────────────────────────────────────────────

pub const MIXER_TEXT_MAGIC: u16 = 0x6d74;
pub const MIXER_TEXT_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerAction {
    /// Drop the current definition, then append the payload
    Reset,
    Append,
}

impl MixerAction {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Reset),
            1 => Some(Self::Append),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerTextHeader {
    pub action: MixerAction,
}

impl MixerTextHeader {
    /// Split a delivery into header and payload.
    ///
    /// `None` for short messages, a wrong magic or an unknown action.
    pub fn parse(msg: &[u8]) -> Option<(Self, &[u8])> {
        if msg.len() < MIXER_TEXT_HEADER_LEN {
            return None;
        }
        let magic = u16::from_le_bytes([msg[0], msg[1]]);
        if magic != MIXER_TEXT_MAGIC {
            return None;
        }
        let action = MixerAction::from_u8(msg[2])?;
        Some((Self { action }, &msg[MIXER_TEXT_HEADER_LEN..]))
    }

    pub fn encode(&self) -> [u8; MIXER_TEXT_HEADER_LEN] {
        let [lo, hi] = MIXER_TEXT_MAGIC.to_le_bytes();
        let action = match self.action {
            MixerAction::Reset => 0,
            MixerAction::Append => 1,
        };
        [lo, hi, action, 0]
    }
}

// ── Text buffer ─────────────────────────────────────────────────────────────

/// Text received but not yet consumed by the parser.
///
/// Holds at most `MIXER_TEXT_CAPACITY - 1` bytes; the last slot is kept for
/// the terminator.
pub struct MixerTextBuffer {
    buf: Vec<u8, MIXER_TEXT_CAPACITY>,
}

impl MixerTextBuffer {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn text(&self) -> &[u8] {
        &self.buf
    }

    /// Append `text`, all or nothing.
    pub fn append(&mut self, text: &[u8]) -> Result<(), MixerLoadError> {
        if self.buf.len() + text.len() >= MIXER_TEXT_CAPACITY {
            return Err(MixerLoadError::Overflow);
        }
        self.buf
            .extend_from_slice(text)
            .map_err(|_| MixerLoadError::Overflow)
    }

    /// Drop `consumed` bytes from the head, moving the leftover to the front.
    pub fn consume(&mut self, consumed: usize) {
        let len = self.buf.len();
        let consumed = consumed.min(len);
        if consumed == 0 {
            return;
        }
        self.buf.copy_within(consumed.., 0);
        self.buf.truncate(len - consumed);
    }
}

impl Default for MixerTextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Loader ──────────────────────────────────────────────────────────────────

/// Guarded part of a delivery: header, reset, append and incremental parse.
pub(crate) fn apply(definition: &mut Definition, msg: &[u8]) -> Result<(), MixerLoadError> {
    let Some((header, text)) = MixerTextHeader::parse(msg) else {
        crate::io_debug!("mixer text ignored, bad header ({} bytes)", msg.len());
        return Ok(());
    };

    if header.action == MixerAction::Reset {
        crate::io_debug!("mixer reset");
        definition.group.reset();
        definition.text.clear();
        definition.abandoned = false;
    } else if definition.abandoned {
        crate::io_debug!("mixer append refused, load abandoned until reset");
        return Err(MixerLoadError::Overflow);
    }

    if let Err(e) = definition.text.append(text) {
        crate::io_warn!(
            "mixer text overflow: {} + {} bytes",
            definition.text.len(),
            text.len()
        );
        definition.abandoned = true;
        return Err(e);
    }

    let consumed = definition.group.load(definition.text.text());
    crate::io_debug!(
        "mixer text {} bytes, consumed {}, {} mixers",
        definition.text.len(),
        consumed,
        definition.group.len()
    );
    definition.text.consume(consumed);

    Ok(())
}

/// Whether the streamed definition may be trusted
pub(crate) fn is_complete(definition: &Definition) -> bool {
    !definition.abandoned && definition.text.is_empty() && !definition.group.is_empty()
}
