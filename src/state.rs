//! Shared state store: the register-like pages and flag words of the IO side.
//!
//! The tick logic is the only writer of the status bits it owns; the FMU link
//! (outside this crate) writes the arming/feature words and the control pages.

use bitflags::bitflags;
use embassy_time::Instant;

use crate::config::{
    control_page_index, CONTROL_CHANNELS, CONTROL_GROUPS, PWM_DEFAULT_DISARMED, PWM_DEFAULT_MAX,
    PWM_DEFAULT_MIN, RC_INPUT_CHANNELS, SERVO_COUNT,
};

// ── Flag words ────────────────────────────────────────────────────────────────

bitflags! {
    /// Status word. FMU_INITIALIZED (bit 13) is kept in a [`Latch`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u16 {
        const OUTPUTS_ARMED = 1 << 0;
        /// Manual override requested from the RC side
        const OVERRIDE = 1 << 1;
        const RC_OK = 1 << 2;
        const RC_PPM = 1 << 3;
        const RC_DSM = 1 << 4;
        const RC_SBUS = 1 << 5;
        /// FMU data arrived within the drop limit
        const FMU_OK = 1 << 6;
        /// FMU writes pulse widths directly, no mixing
        const RAW_PWM = 1 << 7;
        const MIXER_OK = 1 << 8;
        const ARM_SYNC = 1 << 9;
        const INIT_OK = 1 << 10;
        const FAILSAFE = 1 << 11;
        const SAFETY_OFF = 1 << 12;
    }
}

bitflags! {
    /// Arming setup word. FORCE_FAILSAFE (bit 8) is kept in a [`Latch`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ArmingFlags: u16 {
        const IO_ARM_OK = 1 << 0;
        const FMU_ARMED = 1 << 1;
        const MANUAL_OVERRIDE_OK = 1 << 2;
        /// Operator wrote failsafe values; never synthesize them
        const FAILSAFE_CUSTOM = 1 << 3;
        const INAIR_RESTART_OK = 1 << 4;
        const ALWAYS_PWM_ENABLE = 1 << 5;
        const RC_HANDLING_DISABLED = 1 << 6;
        /// Emit disabling pulses only
        const LOCKDOWN = 1 << 7;
        /// Failsafe on FMU loss is irrecoverable
        const TERMINATION_FAILSAFE = 1 << 9;
        const OVERRIDE_IMMEDIATE = 1 << 10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u16 {
        const SBUS1_OUT = 1 << 0;
        const SBUS2_OUT = 1 << 1;
        const PWM_RSSI = 1 << 2;
        const ADC_RSSI = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Alarms: u16 {
        const VBATT_LOW = 1 << 0;
        const TEMPERATURE = 1 << 1;
        const SERVO_CURRENT = 1 << 2;
        const ACC_CURRENT = 1 << 3;
        const FMU_LOST = 1 << 4;
        const RC_LOST = 1 << 5;
        const PWM_ERROR = 1 << 6;
        const VSERVO_FAULT = 1 << 7;
    }
}

bitflags! {
    /// Saturation report written by the mixer pipeline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MixerLimits: u16 {
        const LOWER_LIMIT = 1 << 0;
        const UPPER_LIMIT = 1 << 1;
    }
}

/// Register bit of the FMU_INITIALIZED latch in the status word
pub const STATUS_FMU_INITIALIZED: u16 = 1 << 13;
/// Register bit of the FORCE_FAILSAFE latch in the arming word
pub const ARMING_FORCE_FAILSAFE: u16 = 1 << 8;

/// A flag that the tick logic can only ever set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latch(bool);

impl Latch {
    pub const fn new() -> Self {
        Self(false)
    }

    pub fn set(&mut self) {
        self.0 = true;
    }

    pub fn is_set(self) -> bool {
        self.0
    }

    /// Clear path for the owner of the latch (power cycle, explicit operator
    /// reset). Never called from a tick.
    pub fn reset_external(&mut self) {
        self.0 = false;
    }
}

// ── Pages ─────────────────────────────────────────────────────────────────────

pub type ServoPage = [u16; SERVO_COUNT];
pub type ActuatorPage = [f32; SERVO_COUNT];

/// FMU control page and the arrival time of its last update.
#[derive(Clone, Copy)]
pub struct FmuControls {
    pub controls: [[f32; CONTROL_CHANNELS]; CONTROL_GROUPS],
    pub last_received: Option<Instant>,
}

impl Default for FmuControls {
    fn default() -> Self {
        Self {
            controls: [[0.0; CONTROL_CHANNELS]; CONTROL_GROUPS],
            last_received: None,
        }
    }
}

impl FmuControls {
    pub fn control(&self, group: u8, channel: u8) -> Option<f32> {
        self.controls
            .get(group as usize)
            .and_then(|g| g.get(channel as usize))
            .copied()
    }
}

/// RC input page with per-control validity.
///
/// Validity bit `group * CONTROL_CHANNELS + channel` gates the value held in
/// slot `channel`.
#[derive(Clone, Copy)]
pub struct RcInput {
    pub values: [f32; RC_INPUT_CHANNELS],
    pub valid: u32,
}

impl Default for RcInput {
    fn default() -> Self {
        Self {
            values: [0.0; RC_INPUT_CHANNELS],
            valid: 0,
        }
    }
}

impl RcInput {
    pub fn is_valid(&self, group: u8, channel: u8) -> bool {
        let bit = control_page_index(group, channel);
        bit < u32::BITS as usize && self.valid & (1 << bit) != 0
    }

    /// The RC value for a control, if its validity bit is set
    pub fn control(&self, group: u8, channel: u8) -> Option<f32> {
        if self.is_valid(group, channel) {
            self.values.get(channel as usize).copied()
        } else {
            None
        }
    }
}

/// Per-channel pulse bounds handed to the ramp limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputLimits {
    pub disarmed: ServoPage,
    pub min: ServoPage,
    pub max: ServoPage,
    /// Bit `i` reverses output `i`
    pub reverse_mask: u16,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            disarmed: [PWM_DEFAULT_DISARMED; SERVO_COUNT],
            min: [PWM_DEFAULT_MIN; SERVO_COUNT],
            max: [PWM_DEFAULT_MAX; SERVO_COUNT],
            reverse_mask: 0,
        }
    }
}

impl OutputLimits {
    pub fn is_reversed(&self, channel: usize) -> bool {
        channel < u16::BITS as usize && self.reverse_mask & (1 << channel) != 0
    }
}

/// Trim added to the attitude controls while RC drives the mixer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Trim {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Default)]
pub struct IoState {
    pub status: StatusFlags,
    pub arming: ArmingFlags,
    pub features: FeatureFlags,
    pub alarms: Alarms,
    pub fmu_initialized: Latch,
    pub force_failsafe: Latch,

    pub fmu: FmuControls,
    pub rc: RcInput,

    /// Pulse widths last dispatched (or that would have been)
    pub servos: ServoPage,
    /// Normalized outputs reported back to the FMU
    pub actuators: ActuatorPage,
    pub failsafe_servos: ServoPage,

    pub limits: OutputLimits,
    pub trim: Trim,
    pub mixer_limits: MixerLimits,
}

impl IoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status register image including the FMU_INITIALIZED latch
    pub fn status_register(&self) -> u16 {
        let latched = if self.fmu_initialized.is_set() {
            STATUS_FMU_INITIALIZED
        } else {
            0
        };
        self.status.bits() | latched
    }

    /// Arming register image including the FORCE_FAILSAFE latch
    pub fn arming_register(&self) -> u16 {
        let latched = if self.force_failsafe.is_set() {
            ARMING_FORCE_FAILSAFE
        } else {
            0
        };
        self.arming.bits() | latched
    }

    /// Safety off with the FMU armed: the mixer definition must not change
    pub fn mixer_edit_locked(&self) -> bool {
        self.status.contains(StatusFlags::SAFETY_OFF) && self.arming.contains(ArmingFlags::FMU_ARMED)
    }

    /// Apply an arming word written by the FMU.
    ///
    /// A set FORCE_FAILSAFE bit latches; a clear one leaves the latch alone.
    pub fn write_arming_register(&mut self, value: u16) {
        self.arming = ArmingFlags::from_bits_truncate(value);
        if value & ARMING_FORCE_FAILSAFE != 0 {
            self.force_failsafe.set();
        }
    }

    /// Store operator-provided failsafe pulses; they take precedence over
    /// values synthesized from the mixer.
    pub fn write_failsafe_servos(&mut self, pulses: &[u16]) {
        for (dst, src) in self.failsafe_servos.iter_mut().zip(pulses) {
            *dst = *src;
        }
        self.arming.insert(ArmingFlags::FAILSAFE_CUSTOM);
    }

    /// Store one FMU control group and stamp its arrival
    pub fn write_fmu_controls(&mut self, group: u8, values: &[f32], now: Instant) {
        if let Some(page) = self.fmu.controls.get_mut(group as usize) {
            for (dst, src) in page.iter_mut().zip(values) {
                *dst = *src;
            }
            self.fmu.last_received = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latches_appear_in_register_images() {
        let mut state = IoState::new();
        state.status = StatusFlags::FMU_OK;
        assert_eq!(state.status_register(), 1 << 6);

        state.fmu_initialized.set();
        assert_eq!(state.status_register(), (1 << 6) | (1 << 13));

        state.force_failsafe.set();
        assert_eq!(state.arming_register(), 1 << 8);
    }

    #[test]
    fn arming_write_cannot_clear_force_failsafe() {
        let mut state = IoState::new();
        state.write_arming_register(ARMING_FORCE_FAILSAFE | ArmingFlags::FMU_ARMED.bits());
        assert!(state.force_failsafe.is_set());
        assert!(state.arming.contains(ArmingFlags::FMU_ARMED));

        state.write_arming_register(0);
        assert!(state.force_failsafe.is_set());
        assert!(state.arming.is_empty());

        state.force_failsafe.reset_external();
        assert!(!state.force_failsafe.is_set());
    }

    #[test]
    fn rc_control_checks_validity_bit_of_the_page_slot() {
        let mut rc = RcInput::default();
        rc.values[2] = 0.25;
        rc.valid = 1 << 2;

        assert_eq!(rc.control(0, 2), Some(0.25));
        // group 1 channel 2 maps to bit 10, not set
        assert_eq!(rc.control(1, 2), None);
        // bit index beyond the mask width
        assert!(!rc.is_valid(4, 7));
    }

    #[test]
    fn fmu_control_out_of_range_is_none() {
        let fmu = FmuControls::default();
        assert_eq!(fmu.control(0, 0), Some(0.0));
        assert_eq!(fmu.control(CONTROL_GROUPS as u8, 0), None);
        assert_eq!(fmu.control(0, CONTROL_CHANNELS as u8), None);
    }

    #[test]
    fn custom_failsafe_write_sets_flag() {
        let mut state = IoState::new();
        state.write_failsafe_servos(&[1000, 1100]);
        assert_eq!(state.failsafe_servos[0], 1000);
        assert_eq!(state.failsafe_servos[1], 1100);
        assert_eq!(state.failsafe_servos[2], 0);
        assert!(state.arming.contains(ArmingFlags::FAILSAFE_CUSTOM));
    }

    #[test]
    fn fmu_write_stamps_arrival() {
        let mut state = IoState::new();
        let now = Instant::from_millis(42);
        state.write_fmu_controls(0, &[0.1, 0.2], now);
        assert_eq!(state.fmu.controls[0][1], 0.2);
        assert_eq!(state.fmu.last_received, Some(now));

        // invalid group is ignored entirely
        state.write_fmu_controls(9, &[0.5], Instant::from_millis(50));
        assert_eq!(state.fmu.last_received, Some(now));
    }
}
