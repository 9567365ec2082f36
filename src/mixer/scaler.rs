//! Output and input scaling in the mixer text fixed-point format.

use crate::error::MixerParseError;
use crate::state::MixerLimits;

/// Fixed-point factor of the mixer text format
const SCALE: f32 = 10_000.0;

/// Piecewise-linear scaler: separate gains for negative and positive input,
/// an offset, then a clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaler {
    pub negative: f32,
    pub positive: f32,
    pub offset: f32,
    pub lower: f32,
    pub upper: f32,
}

impl Scaler {
    /// Pass-through over [-1, 1]
    pub const IDENTITY: Self = Self {
        negative: 1.0,
        positive: 1.0,
        offset: 0.0,
        lower: -1.0,
        upper: 1.0,
    };

    /// Build from the five scaled integers of an `O:`/`S:` line.
    pub fn from_fields([neg, pos, offset, lower, upper]: [i32; 5]) -> Result<Self, MixerParseError> {
        if lower > upper {
            return Err(MixerParseError::Malformed);
        }
        Ok(Self {
            negative: neg as f32 / SCALE,
            positive: pos as f32 / SCALE,
            offset: offset as f32 / SCALE,
            lower: lower as f32 / SCALE,
            upper: upper as f32 / SCALE,
        })
    }

    fn scale(&self, input: f32) -> f32 {
        let gain = if input < 0.0 { self.negative } else { self.positive };
        input * gain + self.offset
    }

    pub fn apply(&self, input: f32) -> f32 {
        self.apply_tracking(input, &mut MixerLimits::empty())
    }

    /// Like [`apply`](Self::apply), recording which bound clamped.
    ///
    /// NaN passes through unclamped.
    pub fn apply_tracking(&self, input: f32, limits: &mut MixerLimits) -> f32 {
        let value = self.scale(input);
        if value < self.lower {
            limits.insert(MixerLimits::LOWER_LIMIT);
            self.lower
        } else if value > self.upper {
            limits.insert(MixerLimits::UPPER_LIMIT);
            self.upper
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_through() {
        assert_eq!(Scaler::IDENTITY.apply(0.5), 0.5);
        assert_eq!(Scaler::IDENTITY.apply(-0.25), -0.25);
    }

    #[test]
    fn asymmetric_gains() {
        let s = Scaler::from_fields([5000, 20000, 0, -10000, 10000]).unwrap();
        assert_eq!(s.apply(-1.0), -0.5);
        assert_eq!(s.apply(0.25), 0.5);
    }

    #[test]
    fn offset_then_clamp_reports_limit() {
        let s = Scaler::from_fields([10000, 10000, 5000, -10000, 10000]).unwrap();
        let mut limits = MixerLimits::empty();

        assert_eq!(s.apply_tracking(0.25, &mut limits), 0.75);
        assert!(limits.is_empty());

        assert_eq!(s.apply_tracking(0.75, &mut limits), 1.0);
        assert_eq!(limits, MixerLimits::UPPER_LIMIT);

        assert_eq!(s.apply_tracking(-2.0, &mut limits), -1.0);
        assert!(limits.contains(MixerLimits::LOWER_LIMIT));
    }

    #[test]
    fn nan_is_not_clamped() {
        let mut limits = MixerLimits::empty();
        assert!(Scaler::IDENTITY.apply_tracking(f32::NAN, &mut limits).is_nan());
        assert!(limits.is_empty());
    }

    #[test]
    fn inverted_bounds_rejected() {
        assert_eq!(
            Scaler::from_fields([10000, 10000, 0, 10000, -10000]),
            Err(MixerParseError::Malformed)
        );
    }
}
