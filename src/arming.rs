//! Arming decisions and the force-failsafe latch.

use crate::source::MixSource;
use crate::state::{ArmingFlags, IoState, StatusFlags};

/// Per-tick arm booleans. Recomputed from the flag words every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmDecision {
    /// Outputs may be driven, throttle included
    pub should_arm: bool,
    /// Outputs may be driven with throttle held off
    pub should_arm_nothrottle: bool,
    /// PWM stays enabled with disarmed values
    pub should_always_enable_pwm: bool,
}

impl ArmDecision {
    pub fn compute(status: StatusFlags, arming: ArmingFlags) -> Self {
        let init_ok = status.contains(StatusFlags::INIT_OK);
        let safety_off = status.contains(StatusFlags::SAFETY_OFF);
        let mixer_ok = status.contains(StatusFlags::MIXER_OK);
        let fmu_ok = status.contains(StatusFlags::FMU_OK);

        let fmu_armed_with_mixer = arming.contains(ArmingFlags::FMU_ARMED) && mixer_ok;
        let raw_pwm = status.contains(StatusFlags::RAW_PWM);
        let custom_failsafe_without_fmu = arming.contains(ArmingFlags::FAILSAFE_CUSTOM) && !fmu_ok;

        Self {
            should_arm: init_ok
                && safety_off
                && (fmu_armed_with_mixer || raw_pwm || custom_failsafe_without_fmu),
            should_arm_nothrottle: init_ok && safety_off && mixer_ok,
            should_always_enable_pwm: arming.contains(ArmingFlags::ALWAYS_PWM_ENABLE)
                && init_ok
                && fmu_ok,
        }
    }

    /// Armed for control surfaces but not for throttle
    pub fn throttle_locked(&self) -> bool {
        self.should_arm_nothrottle && !self.should_arm
    }

    /// Whether the hardware should be armed at all
    pub fn needs_to_arm(&self, lockdown: bool) -> bool {
        // lockdown still emits disabling pulses
        self.should_arm || self.should_arm_nothrottle || self.should_always_enable_pwm || lockdown
    }
}

/// Apply the force-failsafe latch and return the final source.
///
/// The latch is set when the operator asked for termination on FMU loss, the
/// arbiter already fell back to failsafe, the vehicle would arm, and the FMU
/// was seen at least once. Once set it overrides every later selection.
pub fn resolve_failsafe(state: &mut IoState, source: MixSource, decision: &ArmDecision) -> MixSource {
    if state.arming.contains(ArmingFlags::TERMINATION_FAILSAFE)
        && source == MixSource::Failsafe
        && decision.should_arm
        && state.fmu_initialized.is_set()
        && !state.force_failsafe.is_set()
    {
        crate::io_warn!("termination failsafe latched");
        state.force_failsafe.set();
    }

    let source = if state.force_failsafe.is_set() {
        MixSource::Failsafe
    } else {
        source
    };

    state
        .status
        .set(StatusFlags::FAILSAFE, source == MixSource::Failsafe);

    source
}
