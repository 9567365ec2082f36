//! Null and simple mixers and their text form.
//!
//! ```text
//! Z:
//! M: <control count>
//! O: <-ve scale> <+ve scale> <offset> <lower> <upper>
//! S: <group> <index> <-ve scale> <+ve scale> <offset> <lower> <upper>
//! ```
//!
//! Numbers are integers scaled by 10000. Every line must be newline
//! terminated before the description counts as complete.

use heapless::Vec;

use super::scaler::Scaler;
use super::{int_fields, next_line, tagged};
use crate::config::MAX_MIXER_CONTROLS;
use crate::error::MixerParseError;
use crate::input::ControlInput;
use crate::state::MixerLimits;

/// One control input of a simple mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlScaler {
    pub group: u8,
    pub index: u8,
    pub scaler: Scaler,
}

/// Sum of scaled controls passed through an output scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleMixer {
    pub output: Scaler,
    pub inputs: Vec<ControlScaler, MAX_MIXER_CONTROLS>,
}

impl SimpleMixer {
    pub fn mix<I: ControlInput + ?Sized>(&self, input: &mut I, limits: &mut MixerLimits) -> f32 {
        let sum: f32 = self
            .inputs
            .iter()
            .filter_map(|c| {
                input
                    .control(c.group, c.index)
                    .map(|value| c.scaler.apply(value.as_f32()))
            })
            .sum();

        self.output.apply_tracking(sum, limits)
    }
}

/// A mixer producing one output.
#[derive(Debug, Clone, PartialEq)]
pub enum Mixer {
    /// Always outputs zero; keeps an output slot occupied
    Null,
    Simple(SimpleMixer),
}

impl Mixer {
    pub fn mix<I: ControlInput + ?Sized>(&self, input: &mut I, limits: &mut MixerLimits) -> f32 {
        match self {
            Mixer::Null => 0.0,
            Mixer::Simple(simple) => simple.mix(input, limits),
        }
    }
}

/// Result of reading one item from mixer text.
#[derive(Debug, PartialEq)]
pub enum Parsed {
    Mixer(Mixer, usize),
    /// A complete line that is not a mixer; skip it
    Skip(usize),
}

/// Parse the description at the front of `text`.
pub fn parse(text: &[u8]) -> Result<Parsed, MixerParseError> {
    let (line, used) = next_line(text)?;

    if tagged(line, 'Z').is_some() {
        return Ok(Parsed::Mixer(Mixer::Null, used));
    }

    match tagged(line, 'M') {
        Some(body) => {
            let [count] = int_fields::<1>(body)?;
            let count = usize::try_from(count).map_err(|_| MixerParseError::Malformed)?;
            parse_simple(text, used, count)
        }
        None => Ok(Parsed::Skip(used)),
    }
}

fn parse_simple(text: &[u8], mut used: usize, count: usize) -> Result<Parsed, MixerParseError> {
    if count > MAX_MIXER_CONTROLS {
        return Err(MixerParseError::Malformed);
    }

    let (line, n) = next_line(&text[used..])?;
    let body = tagged(line, 'O').ok_or(MixerParseError::Malformed)?;
    let output = Scaler::from_fields(int_fields(body)?)?;
    used += n;

    let mut inputs = Vec::new();
    for _ in 0..count {
        let (line, n) = next_line(&text[used..])?;
        let body = tagged(line, 'S').ok_or(MixerParseError::Malformed)?;
        let [group, index, neg, pos, offset, lower, upper] = int_fields::<7>(body)?;

        let control = ControlScaler {
            group: u8::try_from(group).map_err(|_| MixerParseError::Malformed)?,
            index: u8::try_from(index).map_err(|_| MixerParseError::Malformed)?,
            scaler: Scaler::from_fields([neg, pos, offset, lower, upper])?,
        };
        inputs
            .push(control)
            .map_err(|_| MixerParseError::Malformed)?;
        used += n;
    }

    Ok(Parsed::Mixer(Mixer::Simple(SimpleMixer { output, inputs }), used))
}
