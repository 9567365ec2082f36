//! Control source arbitration.
//!
//! Runs first in every tick: refreshes FMU freshness, then picks which source
//! feeds the mixer. Priority is raw passthrough, then FMU vs. RC override,
//! with failsafe as the fallback for every combination not listed.

use embassy_time::Instant;

use crate::config::FMU_INPUT_DROP_LIMIT;
use crate::state::{Alarms, ArmingFlags, IoState, StatusFlags};

/// Where the mixer's control inputs come from this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixSource {
    /// Raw PWM from the FMU, nothing to mix
    None,
    Fmu,
    /// RC only; FMU is gone
    Override,
    Failsafe,
    /// RC where valid, FMU for the remaining controls
    OverrideFmuOk,
}

/// Whether FMU data is fresh at `now`.
pub fn fmu_is_fresh(last_received: Option<Instant>, now: Instant) -> bool {
    match last_received {
        None => false,
        Some(last) => now.saturating_duration_since(last) <= FMU_INPUT_DROP_LIMIT,
    }
}

/// Update FMU_OK, the FMU_LOST alarm and the FMU_INITIALIZED latch.
pub fn update_fmu_freshness(state: &mut IoState, now: Instant) {
    if fmu_is_fresh(state.fmu.last_received, now) {
        state.status.insert(StatusFlags::FMU_OK);
        state.fmu_initialized.set();
    } else {
        if state.status.contains(StatusFlags::FMU_OK) {
            crate::io_warn!("AP RX timeout");
        }
        state.status.remove(StatusFlags::FMU_OK);
        state.alarms.insert(Alarms::FMU_LOST);
    }
}

/// Pick the mix source from the current flag words.
pub fn select_source(status: StatusFlags, arming: ArmingFlags) -> MixSource {
    let fmu_ok = status.contains(StatusFlags::FMU_OK);
    let mixer_ok = status.contains(StatusFlags::MIXER_OK);
    let override_req = status.contains(StatusFlags::OVERRIDE);
    let rc_ok = status.contains(StatusFlags::RC_OK);
    let rc_enabled = !arming.contains(ArmingFlags::RC_HANDLING_DISABLED);

    if status.contains(StatusFlags::RAW_PWM) && fmu_ok {
        return MixSource::None;
    }

    let mut source = MixSource::Failsafe;

    if !override_req && fmu_ok && mixer_ok {
        source = MixSource::Fmu;
    }

    let rc_may_drive = override_req && rc_ok && mixer_ok && rc_enabled;

    if rc_may_drive && !fmu_ok && !arming.contains(ArmingFlags::TERMINATION_FAILSAFE) {
        // termination failsafe: no manual recovery once the FMU is lost
        source = MixSource::Override;
    } else if rc_may_drive && fmu_ok {
        source = MixSource::OverrideFmuOk;
    }

    source
}

/// Freshness update followed by source selection.
pub fn arbitrate(state: &mut IoState, now: Instant) -> MixSource {
    update_fmu_freshness(state, now);
    select_source(state.status, state.arming)
}
