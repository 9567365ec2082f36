//! Control mixing, arming and failsafe core of a flight-control IO
//! co-processor.
//!
//! Every tick [`IoMixer::tick`] picks the control source, decides whether the
//! outputs may be energized, runs the mixer and writes the result to the
//! output drivers. Mixer definitions arrive as streamed text through
//! [`IoMixer::handle_mixer_text`] without ever blocking a tick.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod arming;
pub mod config;
pub mod error;
pub mod failsafe;
pub mod input;
pub mod mixer;
pub mod output;
pub mod pwm_limit;
pub mod source;
pub mod state;
pub mod tick;

pub use error::{load_status, MixerLoadError};
pub use mixer::{MixerLock, MixerStore};
pub use output::{SbusOutput, ServoOutput};
pub use source::MixSource;
pub use state::IoState;
pub use tick::{IoMixer, TickContext};
