//! Per-tick orchestration.
//!
//! `IoMixer::tick` runs, in order: source arbitration, arming decision and
//! failsafe latch, mixing (or the failsafe copy), output dispatch. The mixer
//! definition lives in a [`MixerStore`] shared with the text delivery path,
//! which never blocks a tick.

use embassy_time::Instant;

use crate::arming::{self, ArmDecision};
use crate::config::SERVO_COUNT;
use crate::error::MixerLoadError;
use crate::failsafe;
use crate::input::{ControlResolver, ShapedInput};
use crate::mixer::MixerStore;
use crate::output::{self, ArmState, SbusOutput, ServoOutput};
use crate::pwm_limit::{PwmLimit, RampLimiter, RampPhase};
use crate::source::{self, MixSource};
use crate::state::{ArmingFlags, IoState, MixerLimits, ServoPage, StatusFlags};

/// Values decided once per tick and handed down the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickContext {
    pub now: Instant,
    /// Final source, after the force-failsafe latch
    pub source: MixSource,
    pub decision: ArmDecision,
    /// Outputs produced by the mixer this tick; 0 when it did not run
    pub mixed: usize,
}

impl TickContext {
    /// Arbitration and arming for `now`.
    pub fn begin(state: &mut IoState, now: Instant) -> Self {
        let selected = source::arbitrate(state, now);
        let decision = ArmDecision::compute(state.status, state.arming);
        let source = arming::resolve_failsafe(state, selected, &decision);

        Self {
            now,
            source,
            decision,
            mixed: 0,
        }
    }

    fn should_mix(&self, state: &IoState) -> bool {
        self.source != MixSource::None
            && state.status.contains(StatusFlags::MIXER_OK)
            && !state.arming.contains(ArmingFlags::LOCKDOWN)
    }
}

// ── Mixer core ───────────────────────────────────────────────────────────────

pub struct IoMixer<'g, L: RampLimiter = PwmLimit> {
    pub state: IoState,
    store: &'g MixerStore,
    limiter: L,
    arm_state: ArmState,
}

impl<'g> IoMixer<'g, PwmLimit> {
    pub fn new(store: &'g MixerStore) -> Self {
        Self::with_limiter(store, PwmLimit::new())
    }
}

impl<'g, L: RampLimiter> IoMixer<'g, L> {
    pub fn with_limiter(store: &'g MixerStore, limiter: L) -> Self {
        Self {
            state: IoState::new(),
            store,
            limiter,
            arm_state: ArmState::new(),
        }
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }

    /// Handle for the text delivery path
    pub fn store(&self) -> &'g MixerStore {
        self.store
    }

    pub fn is_armed(&self) -> bool {
        self.arm_state.is_armed()
    }

    /// FMU feed: store a control group received at `now`
    pub fn update_fmu_controls(&mut self, group: u8, values: &[f32], now: Instant) {
        self.state.write_fmu_controls(group, values, now);
    }

    /// Mixer text delivery from the tick's own context; `Err` maps to a
    /// non-zero status word.
    pub fn handle_mixer_text(&mut self, msg: &[u8]) -> Result<(), MixerLoadError> {
        self.sync_mixer_flags();
        let result = self.store.handle_text(msg);
        self.sync_mixer_flags();
        result
    }

    /// Set MIXER_OK if the streamed definition is complete
    pub fn commit_mixer(&mut self) -> bool {
        let ok = self.store.commit();
        self.sync_mixer_flags();
        ok
    }

    /// Recompute failsafe pulses from the mixer. `Ok(false)` when skipped.
    pub fn set_failsafe(&mut self) -> Result<bool, MixerLoadError> {
        self.sync_mixer_flags();
        let lock = self.store.lock().ok_or(MixerLoadError::Busy)?;
        Ok(failsafe::set_failsafe(&mut self.state, lock.group(), lock.token()))
    }

    /// One control tick.
    pub fn tick<S, B>(&mut self, now: Instant, servo: &mut S, sbus: &mut B) -> TickContext
    where
        S: ServoOutput + ?Sized,
        B: SbusOutput + ?Sized,
    {
        self.sync_mixer_flags();
        let mut ctx = TickContext::begin(&mut self.state, now);

        if ctx.source == MixSource::Failsafe {
            output::apply_failsafe(&mut self.state);
        } else if ctx.should_mix(&self.state) {
            ctx.mixed = self.mix(&ctx);
        }

        output::dispatch(
            &mut self.state,
            &mut self.arm_state,
            &ctx.decision,
            servo,
            sbus,
        );

        ctx
    }

    /// Publish the edit lock to the loader and pick up its MIXER_OK
    fn sync_mixer_flags(&mut self) {
        self.store.set_edit_locked(self.state.mixer_edit_locked());
        self.state
            .status
            .set(StatusFlags::MIXER_OK, self.store.mixer_ok());
    }

    fn mix(&mut self, ctx: &TickContext) -> usize {
        let Some(lock) = self.store.lock() else {
            // definition is being edited; keep last outputs
            crate::io_debug!("mix skipped, mixer busy");
            return 0;
        };

        let mut input = ShapedInput {
            resolver: ControlResolver::for_source(ctx.source, &self.state.fmu, &self.state.rc),
            trim: self.state.trim,
            ramping: self.limiter.phase() == RampPhase::Ramp,
            throttle_locked: ctx.decision.throttle_locked(),
        };

        let mut outputs = [0.0f32; SERVO_COUNT];
        let mut limits = MixerLimits::empty();
        let mixed = lock.mix(&mut input, &mut outputs, &mut limits);
        drop(lock);

        let mut pulses: ServoPage = [0; SERVO_COUNT];
        self.limiter.calc(
            ctx.now,
            ctx.decision.should_arm,
            ctx.decision.should_arm_nothrottle,
            &outputs[..mixed],
            &self.state.limits,
            &mut pulses[..mixed],
        );

        self.state.mixer_limits = limits;
        output::apply_mixed(&mut self.state, &outputs, &pulses, mixed);
        mixed
    }
}
