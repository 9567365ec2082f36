//! Control input resolution for the mixer.
//!
//! The mixer pulls each (group, index) it needs through [`ControlInput`].
//! [`ControlResolver`] picks the page a value comes from based on the active
//! source; [`ShapedInput`] adds trim, clamping and the throttle lockout on top.

use crate::config::{
    CONTROL_CHANNELS, CONTROL_GROUPS, GROUP_ATTITUDE, INDEX_PITCH, INDEX_ROLL, INDEX_THROTTLE,
    INDEX_YAW,
};
use crate::source::MixSource;
use crate::state::{FmuControls, RcInput, Trim};

/// A resolved control demand.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Normalized demand
    Value(f32),
    /// Deliberately not a number: throttle while only armed for surfaces
    Invalid,
}

impl Control {
    /// Float form used by the mixer arithmetic; `Invalid` becomes NaN.
    pub fn as_f32(self) -> f32 {
        match self {
            Control::Value(v) => v,
            Control::Invalid => f32::NAN,
        }
    }
}

/// Source of control values for one mix pass.
///
/// `None` means the control is unavailable and contributes nothing.
pub trait ControlInput {
    fn control(&mut self, group: u8, index: u8) -> Option<Control>;
}

/// Where control values are read from, one variant per mix source.
#[derive(Clone, Copy)]
pub enum ControlResolver<'a> {
    Fmu(&'a FmuControls),
    /// RC only, no FMU fallback
    Override(&'a RcInput),
    /// RC where valid, FMU otherwise
    OverrideFmuOk {
        rc: &'a RcInput,
        fmu: &'a FmuControls,
    },
    /// Failsafe and raw passthrough: nothing is available
    Unavailable,
    /// Every control reads as zero; used to synthesize failsafe values
    Neutral,
}

impl<'a> ControlResolver<'a> {
    pub fn for_source(source: MixSource, fmu: &'a FmuControls, rc: &'a RcInput) -> Self {
        match source {
            MixSource::Fmu => Self::Fmu(fmu),
            MixSource::Override => Self::Override(rc),
            MixSource::OverrideFmuOk => Self::OverrideFmuOk { rc, fmu },
            MixSource::Failsafe | MixSource::None => Self::Unavailable,
        }
    }

    /// RC is (at least partly) driving the mixer
    pub fn is_override(&self) -> bool {
        matches!(self, Self::Override(_) | Self::OverrideFmuOk { .. })
    }

    /// Raw value for a control, before shaping
    pub fn resolve(&self, group: u8, index: u8) -> Option<f32> {
        if group as usize >= CONTROL_GROUPS || index as usize >= CONTROL_CHANNELS {
            return None;
        }

        match self {
            Self::Fmu(fmu) => fmu.control(group, index),
            Self::Override(rc) => rc.control(group, index),
            Self::OverrideFmuOk { rc, fmu } => rc
                .control(group, index)
                .or_else(|| fmu.control(group, index)),
            Self::Unavailable => None,
            Self::Neutral => Some(0.0),
        }
    }
}

impl ControlInput for ControlResolver<'_> {
    fn control(&mut self, group: u8, index: u8) -> Option<Control> {
        self.resolve(group, index).map(Control::Value)
    }
}

/// Resolver plus the per-tick shaping applied to every value it yields.
pub struct ShapedInput<'a> {
    pub resolver: ControlResolver<'a>,
    pub trim: Trim,
    /// Ramp limiter is spinning motors up
    pub ramping: bool,
    /// Armed for surfaces only
    pub throttle_locked: bool,
}

impl ShapedInput<'_> {
    fn trim_for(&self, group: u8, index: u8) -> f32 {
        if !self.resolver.is_override() || group != GROUP_ATTITUDE {
            return 0.0;
        }
        match index {
            INDEX_ROLL => self.trim.roll,
            INDEX_PITCH => self.trim.pitch,
            INDEX_YAW => self.trim.yaw,
            _ => 0.0,
        }
    }
}

impl ControlInput for ShapedInput<'_> {
    fn control(&mut self, group: u8, index: u8) -> Option<Control> {
        let raw = self.resolver.resolve(group, index)?;
        let value = (raw + self.trim_for(group, index)).clamp(-1.0, 1.0);

        if group == GROUP_ATTITUDE && index == INDEX_THROTTLE {
            if self.throttle_locked {
                return Some(Control::Invalid);
            }
            if self.ramping {
                return Some(Control::Value(0.0));
            }
        }

        Some(Control::Value(value))
    }
}
