//! Output dispatch: pages, hardware arm edges and writes to the drivers.

use crate::arming::ArmDecision;
use crate::config::{pulse_to_normalized, SERVO_COUNT};
use crate::state::{ArmingFlags, FeatureFlags, IoState, ServoPage, StatusFlags};

/// PWM driver for the servo outputs.
pub trait ServoOutput {
    fn arm(&mut self, armed: bool);
    fn set_channel(&mut self, index: usize, pulse_us: u16);
}

/// S.BUS encoders. Only one is driven per tick.
pub trait SbusOutput {
    fn sbus1_output(&mut self, pulses: &[u16]);
    fn sbus2_output(&mut self, pulses: &[u16]);
}

/// No S.BUS hardware.
impl SbusOutput for () {
    fn sbus1_output(&mut self, _: &[u16]) {}
    fn sbus2_output(&mut self, _: &[u16]) {}
}

// ── Pages ────────────────────────────────────────────────────────────────────

/// Emit the failsafe pulses and report them in normalized form.
pub fn apply_failsafe(state: &mut IoState) {
    state.servos = state.failsafe_servos;
    for (actuator, &pulse) in state.actuators.iter_mut().zip(&state.failsafe_servos) {
        *actuator = pulse_to_normalized(pulse);
    }
}

/// Store one mix pass. Channels past `mixed` are zeroed in both pages.
pub fn apply_mixed(state: &mut IoState, outputs: &[f32], pulses: &ServoPage, mixed: usize) {
    for i in 0..SERVO_COUNT {
        if i < mixed {
            state.servos[i] = pulses[i];
            state.actuators[i] = outputs.get(i).copied().unwrap_or(0.0);
        } else {
            state.servos[i] = 0;
            state.actuators[i] = 0.0;
        }
    }
}

// ── Hardware ─────────────────────────────────────────────────────────────────

/// Hardware arm state. Only changes on edges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArmState {
    armed: bool,
}

impl ArmState {
    pub const fn new() -> Self {
        Self { armed: false }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Move the hardware to `needs_to_arm`, touching the driver only when it
    /// changes. Returns true on an edge.
    pub fn update<S: ServoOutput + ?Sized>(
        &mut self,
        needs_to_arm: bool,
        servo: &mut S,
        status: &mut StatusFlags,
    ) -> bool {
        if needs_to_arm == self.armed {
            return false;
        }

        servo.arm(needs_to_arm);
        self.armed = needs_to_arm;
        status.set(StatusFlags::OUTPUTS_ARMED, needs_to_arm);

        if needs_to_arm {
            crate::io_info!("> PWM enabled");
        } else {
            crate::io_info!("> PWM disabled");
        }
        true
    }
}

fn write_sbus<B: SbusOutput + ?Sized>(features: FeatureFlags, pulses: &[u16], sbus: &mut B) {
    if features.contains(FeatureFlags::SBUS2_OUT) {
        sbus.sbus2_output(pulses);
    } else if features.contains(FeatureFlags::SBUS1_OUT) {
        sbus.sbus1_output(pulses);
    }
}

/// Arm edge handling followed by the driver writes for this tick.
pub fn dispatch<S, B>(
    state: &mut IoState,
    arm_state: &mut ArmState,
    decision: &ArmDecision,
    servo: &mut S,
    sbus: &mut B,
) where
    S: ServoOutput + ?Sized,
    B: SbusOutput + ?Sized,
{
    let lockdown = state.arming.contains(ArmingFlags::LOCKDOWN);
    arm_state.update(decision.needs_to_arm(lockdown), servo, &mut state.status);

    if !arm_state.is_armed() {
        return;
    }

    if (decision.should_arm || decision.should_arm_nothrottle) && !lockdown {
        for (i, &pulse) in state.servos.iter().enumerate() {
            servo.set_channel(i, pulse);
        }
        write_sbus(state.features, &state.servos, sbus);
    } else if decision.should_always_enable_pwm || lockdown {
        let disarmed = state.limits.disarmed;
        for (i, &pulse) in disarmed.iter().enumerate() {
            servo.set_channel(i, pulse);
        }
        // report what was actually sent
        state.servos = disarmed;
        write_sbus(state.features, &disarmed, sbus);
    }
}
