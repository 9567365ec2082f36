//! Arm-transition ramp limiter.
//!
//! Shapes normalized mixer outputs into pulse widths. After arming the lower
//! bound is blended from the disarmed pulse up to the minimum pulse so motors
//! spin up gradually instead of jumping.
//!
//! ```text
//!   INIT ──(armed, 500 ms)──▶ OFF ──armed──▶ RAMP ──2.5 s──▶ ON
//!                              ▲               │              │
//!                              └───disarmed────┴──────────────┘
//! ```

use embassy_time::{Duration, Instant};

use crate::config::{PWM_LIMIT_INIT_TIME, PWM_LIMIT_RAMP_TIME};
use crate::state::OutputLimits;

/// Fixed-point scale of ramp progress
const PROGRESS_FULL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampPhase {
    /// Waiting for the output stage to settle after the first arm request
    Init,
    Off,
    /// Lower bound moving from disarmed to min
    Ramp,
    On,
}

/// Collaborator turning mixer outputs into pulse widths.
pub trait RampLimiter {
    fn phase(&self) -> RampPhase;

    /// Shape `outputs` into `pulses` (same length is expected; extra slots on
    /// either side are left alone).
    ///
    /// `pre_armed` computes as if fully on without advancing the state.
    fn calc(
        &mut self,
        now: Instant,
        armed: bool,
        pre_armed: bool,
        outputs: &[f32],
        limits: &OutputLimits,
        pulses: &mut [u16],
    );
}

pub struct PwmLimit {
    phase: RampPhase,
    time_armed: Option<Instant>,
}

impl PwmLimit {
    pub const fn new() -> Self {
        Self {
            phase: RampPhase::Init,
            time_armed: None,
        }
    }

    fn since_armed(&self, now: Instant) -> Duration {
        self.time_armed
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::from_ticks(0))
    }

    fn advance(&mut self, now: Instant, armed: bool) {
        let next = match self.phase {
            RampPhase::Init if armed => {
                let stamped = *self.time_armed.get_or_insert(now);
                if now.saturating_duration_since(stamped) >= PWM_LIMIT_INIT_TIME {
                    RampPhase::Off
                } else {
                    RampPhase::Init
                }
            }
            RampPhase::Init => RampPhase::Init,
            RampPhase::Off if armed => {
                self.time_armed = Some(now);
                RampPhase::Ramp
            }
            RampPhase::Off => RampPhase::Off,
            RampPhase::Ramp if !armed => RampPhase::Off,
            RampPhase::Ramp if self.since_armed(now) >= PWM_LIMIT_RAMP_TIME => RampPhase::On,
            RampPhase::Ramp => RampPhase::Ramp,
            RampPhase::On if !armed => RampPhase::Off,
            RampPhase::On => RampPhase::On,
        };

        if next != self.phase {
            crate::io_debug!("pwm limit {} -> {}", self.phase as u8, next as u8);
            self.phase = next;
        }
    }

    /// Ramp progress in [0, PROGRESS_FULL]
    fn progress(&self, now: Instant) -> u64 {
        let elapsed = self.since_armed(now).as_micros();
        let total = PWM_LIMIT_RAMP_TIME.as_micros().max(1);
        (elapsed * PROGRESS_FULL / total).min(PROGRESS_FULL)
    }
}

impl Default for PwmLimit {
    fn default() -> Self {
        Self::new()
    }
}

/// Map `[-1, 1]` onto `[low, high]` and clamp. Halves of the bounds are
/// taken in integer arithmetic.
fn scale(output: f32, low: u16, high: u16) -> u16 {
    let low_i = i32::from(low);
    let high_i = i32::from(high);
    let pulse = output * (high_i - low_i) as f32 / 2.0 + ((high_i + low_i) / 2) as f32;
    let lo = f32::from(low.min(high));
    let hi = f32::from(high.max(low));
    if pulse < lo {
        lo as u16
    } else if pulse > hi {
        hi as u16
    } else {
        pulse as u16
    }
}

impl RampLimiter for PwmLimit {
    fn phase(&self) -> RampPhase {
        self.phase
    }

    fn calc(
        &mut self,
        now: Instant,
        armed: bool,
        pre_armed: bool,
        outputs: &[f32],
        limits: &OutputLimits,
        pulses: &mut [u16],
    ) {
        self.advance(now, armed);

        let phase = if pre_armed { RampPhase::On } else { self.phase };
        let progress = self.progress(now);

        for (i, (pulse, &raw)) in pulses.iter_mut().zip(outputs).enumerate() {
            let disarmed = limits.disarmed.get(i).copied().unwrap_or(0);
            let min = limits.min.get(i).copied().unwrap_or(0);
            let max = limits.max.get(i).copied().unwrap_or(0);

            if matches!(phase, RampPhase::Off | RampPhase::Init) || !raw.is_finite() {
                *pulse = disarmed;
                continue;
            }

            let output = if limits.is_reversed(i) { -raw } else { raw };

            *pulse = match phase {
                RampPhase::Ramp => {
                    let ramp_min = if disarmed > 0 {
                        let start = disarmed.min(min);
                        let span = u64::from(min - start);
                        start + (span * progress / PROGRESS_FULL) as u16
                    } else {
                        min
                    };
                    scale(output, ramp_min, max)
                }
                _ => scale(output, min, max),
            };
        }
    }
}
