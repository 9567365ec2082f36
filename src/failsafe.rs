//! Failsafe pulse synthesis from the loaded mixer.

use crate::config::{scale_to_pulse, SERVO_COUNT};
use crate::input::ControlResolver;
use crate::mixer::{MixToken, MixerGroup};
use crate::state::{ArmingFlags, IoState, MixerLimits, StatusFlags};

/// Recompute the failsafe page by mixing neutral inputs once.
///
/// Does nothing when the operator supplied custom failsafe values or when the
/// mixer is not loaded. Returns whether the page was rewritten.
pub fn set_failsafe(state: &mut IoState, group: &MixerGroup, token: &MixToken<'_>) -> bool {
    if state.arming.contains(ArmingFlags::FAILSAFE_CUSTOM)
        || !state.status.contains(StatusFlags::MIXER_OK)
    {
        return false;
    }

    let mut outputs = [0.0f32; SERVO_COUNT];
    let mixed = group.mix(
        token,
        &mut ControlResolver::Neutral,
        &mut outputs,
        &mut MixerLimits::empty(),
    );

    for (i, pulse) in state.failsafe_servos.iter_mut().enumerate() {
        *pulse = if i < mixed { scale_to_pulse(outputs[i]) } else { 0 };
    }

    crate::io_debug!("failsafe from mixer, {} outputs", mixed);
    true
}
