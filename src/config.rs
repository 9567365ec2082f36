//! Compile-time sizing and timing for the IO mixer.

use embassy_time::Duration;

// ── Page geometry ────────────────────────────────────────────────────────────

/// Control groups exposed by the FMU (attitude, attitude alt, gimbal, manual)
pub const CONTROL_GROUPS: usize = 4;
/// Channels per control group
pub const CONTROL_CHANNELS: usize = 8;
/// PWM outputs driven by this co-processor
pub const SERVO_COUNT: usize = 8;
/// Raw RC input channels held in the RC page
pub const RC_INPUT_CHANNELS: usize = 18;

/// Attitude group and the indices the override path trims and gates
pub const GROUP_ATTITUDE: u8 = 0;
pub const INDEX_ROLL: u8 = 0;
pub const INDEX_PITCH: u8 = 1;
pub const INDEX_YAW: u8 = 2;
pub const INDEX_THROTTLE: u8 = 3;

// ── Timing ───────────────────────────────────────────────────────────────────

/// Silence from the FMU longer than this drops FMU_OK
pub const FMU_INPUT_DROP_LIMIT: Duration = Duration::from_millis(500);

/// Ramp limiter: time spent in INIT after the first armed request
pub const PWM_LIMIT_INIT_TIME: Duration = Duration::from_millis(500);
/// Ramp limiter: duration of the disarmed → min blend
pub const PWM_LIMIT_RAMP_TIME: Duration = Duration::from_millis(2500);

// ── PWM scaling ──────────────────────────────────────────────────────────────

/// Neutral pulse for the failsafe / telemetry scaling (µs)
pub const PWM_CENTER_US: f32 = 1500.0;
/// Half range for the failsafe / telemetry scaling (µs per unit)
pub const PWM_HALF_RANGE_US: f32 = 600.0;

/// Default lower bound of the controlled range (µs)
pub const PWM_DEFAULT_MIN: u16 = 900;
/// Default upper bound of the controlled range (µs)
pub const PWM_DEFAULT_MAX: u16 = 2100;
/// Default disarmed pulse; 0 keeps the output silent
pub const PWM_DEFAULT_DISARMED: u16 = 0;

// ── Mixer definition ─────────────────────────────────────────────────────────

/// Streamed mixer text buffer, large enough for one mixer description
pub const MIXER_TEXT_CAPACITY: usize = 200;
/// Mixers a definition may hold
pub const MAX_MIXERS: usize = 16;
/// Input scalers per simple mixer
pub const MAX_MIXER_CONTROLS: usize = 8;

/// Index of a (group, channel) pair in a flattened control page
pub const fn control_page_index(group: u8, channel: u8) -> usize {
    group as usize * CONTROL_CHANNELS + channel as usize
}

/// Normalized value → pulse width using the fixed failsafe scaling
pub fn scale_to_pulse(normalized: f32) -> u16 {
    (normalized * PWM_HALF_RANGE_US + PWM_CENTER_US) as u16
}

/// Pulse width → normalized value, inverse of [`scale_to_pulse`]
pub fn pulse_to_normalized(pulse_us: u16) -> f32 {
    (pulse_us as f32 - PWM_CENTER_US) / PWM_HALF_RANGE_US
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_page_index_is_row_major() {
        assert_eq!(control_page_index(0, 0), 0);
        assert_eq!(control_page_index(0, 3), 3);
        assert_eq!(control_page_index(1, 0), CONTROL_CHANNELS);
        assert_eq!(control_page_index(3, 7), 31);
    }

    #[test]
    fn pulse_scaling_round_trips_at_the_rails() {
        assert_eq!(scale_to_pulse(0.0), 1500);
        assert_eq!(scale_to_pulse(1.0), 2100);
        assert_eq!(scale_to_pulse(-1.0), 900);
        assert_eq!(pulse_to_normalized(2100), 1.0);
        assert_eq!(pulse_to_normalized(1500), 0.0);
    }

    #[test]
    fn zero_pulse_reports_below_range() {
        // an unused output (0 µs) reads back as -2.5 in telemetry
        assert_eq!(pulse_to_normalized(0), -2.5);
    }
}
