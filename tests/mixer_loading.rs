use embassy_time::Instant;

use io_mixer::config::{MIXER_TEXT_CAPACITY, SERVO_COUNT};
use io_mixer::input::{Control, ControlInput};
use io_mixer::mixer::{MixerAction, MixerTextHeader};
use io_mixer::state::{ArmingFlags, MixerLimits, StatusFlags};
use io_mixer::{load_status, IoMixer, MixSource, MixerLoadError, MixerStore, ServoOutput};

struct NullServo;

impl ServoOutput for NullServo {
    fn arm(&mut self, _: bool) {}
    fn set_channel(&mut self, _: usize, _: u16) {}
}

fn mixers(store: &MixerStore) -> usize {
    store.lock().expect("store free").group().len()
}

fn pending(store: &MixerStore) -> Vec<u8> {
    store.lock().expect("store free").pending_text().to_vec()
}

fn message(action: MixerAction, text: &str) -> Vec<u8> {
    let mut msg = MixerTextHeader { action }.encode().to_vec();
    msg.extend_from_slice(text.as_bytes());
    msg
}

const QUAD_X: [&str; 4] = [
    "M: 2\nO: 10000 10000 0 -10000 10000\nS: 0 0 -10000 -10000 0 -10000 10000\nS: 0 3 10000 10000 0 -10000 10000\n",
    "M: 2\nO: 10000 10000 0 -10000 10000\nS: 0 0 10000 10000 0 -10000 10000\nS: 0 3 10000 10000 0 -10000 10000\n",
    "M: 2\nO: 10000 10000 0 -10000 10000\nS: 0 1 10000 10000 0 -10000 10000\nS: 0 3 10000 10000 0 -10000 10000\n",
    "M: 2\nO: 10000 10000 0 -10000 10000\nS: 0 1 -10000 -10000 0 -10000 10000\nS: 0 3 10000 10000 0 -10000 10000\n",
];

#[test]
fn reset_then_append_round_trip_mixes_known_input() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);

    // one description per delivery, the last one split mid-line
    assert_eq!(io.handle_mixer_text(&message(MixerAction::Reset, QUAD_X[0])), Ok(()));
    assert_eq!(io.handle_mixer_text(&message(MixerAction::Append, QUAD_X[1])), Ok(()));
    assert_eq!(io.handle_mixer_text(&message(MixerAction::Append, QUAD_X[2])), Ok(()));
    let (head, tail) = QUAD_X[3].split_at(20);
    assert_eq!(io.handle_mixer_text(&message(MixerAction::Append, head)), Ok(()));
    assert!(!io.commit_mixer());
    assert_eq!(pending(&store), head.as_bytes());
    assert_eq!(io.handle_mixer_text(&message(MixerAction::Append, tail)), Ok(()));
    assert!(io.commit_mixer());
    assert_eq!(mixers(&store), 4);

    let now = Instant::from_millis(10);
    io.update_fmu_controls(0, &[0.25, -0.5, 0.0, 0.5], now);
    let ctx = io.tick(now, &mut NullServo, &mut ());

    assert_eq!(ctx.source, MixSource::Fmu);
    assert_eq!(ctx.mixed, 4);
    assert_eq!(&io.state.actuators[..4], &[0.25, 0.75, 0.0, 1.0]);
    assert_eq!(&io.state.actuators[4..], &[0.0; SERVO_COUNT - 4]);
}

#[test]
fn reset_discards_the_previous_definition() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, QUAD_X[0])).unwrap();
    io.handle_mixer_text(&message(MixerAction::Append, QUAD_X[1])).unwrap();
    assert_eq!(mixers(&store), 2);

    io.handle_mixer_text(&message(MixerAction::Reset, "Z:\n")).unwrap();

    assert_eq!(mixers(&store), 1);
    assert!(io.commit_mixer());
}

#[test]
fn overflow_abandons_load_and_keeps_buffer() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, "M: 2\nO: 10000 10000 0 -10000 10000\n"))
        .unwrap();
    let before = pending(&store);
    let flood = "#".repeat(MIXER_TEXT_CAPACITY - before.len());

    let result = io.handle_mixer_text(&message(MixerAction::Append, &flood));

    assert_eq!(result, Err(MixerLoadError::Overflow));
    assert_ne!(load_status(result), 0);
    assert!(!MixerLoadError::Overflow.is_retryable());
    assert_eq!(pending(&store), before);
    assert!(!io.state.status.contains(StatusFlags::MIXER_OK));
    assert!(!io.commit_mixer());
}

#[test]
fn armed_vehicle_rejects_edits_with_retry() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, "Z:\n")).unwrap();
    io.commit_mixer();
    io.state.status.insert(StatusFlags::SAFETY_OFF);
    io.state.arming.insert(ArmingFlags::FMU_ARMED);

    let result = io.handle_mixer_text(&message(MixerAction::Reset, QUAD_X[0]));

    assert_eq!(result, Err(MixerLoadError::Armed));
    assert_ne!(load_status(result), 0);
    assert!(MixerLoadError::Armed.is_retryable());
    assert_eq!(mixers(&store), 1);
    assert!(io.state.status.contains(StatusFlags::MIXER_OK));
}

#[test]
fn edit_during_mix_is_refused_with_retry() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, "Z:\n")).unwrap();
    io.commit_mixer();

    let held = store.lock().expect("store free");
    let result = io.handle_mixer_text(&message(MixerAction::Append, QUAD_X[0]));
    drop(held);

    assert_eq!(result, Err(MixerLoadError::Busy));
    assert!(result.unwrap_err().is_retryable());
    assert_eq!(mixers(&store), 1);
    assert!(!io.state.status.contains(StatusFlags::MIXER_OK));

    // the same message goes through once the mix is done
    assert_eq!(
        load_status(io.handle_mixer_text(&message(MixerAction::Append, QUAD_X[0]))),
        0
    );
    assert_eq!(mixers(&store), 2);
}

#[test]
fn failsafe_precomputation_is_idempotent() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    let text = format!(
        "{}Z:\nM: 1\nO: 10000 10000 -2500 -10000 10000\nS: 0 3 10000 10000 0 -10000 10000\n",
        QUAD_X[0]
    );
    io.handle_mixer_text(&message(MixerAction::Reset, &text)).unwrap();
    io.commit_mixer();

    assert_eq!(io.set_failsafe(), Ok(true));
    let first = io.state.failsafe_servos;
    assert_eq!(io.set_failsafe(), Ok(true));

    assert_eq!(first, io.state.failsafe_servos);
    assert_eq!(&first[..4], &[1500, 1500, 1350, 0]);

    // an operator page wins over the mixer
    io.state.write_failsafe_servos(&[1000; SERVO_COUNT]);
    assert_eq!(io.set_failsafe(), Ok(false));
    assert_eq!(io.state.failsafe_servos, [1000; SERVO_COUNT]);
}

#[test]
fn append_after_overflow_is_refused_until_reset() {
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, "Z:\n")).unwrap();
    let flood = "#".repeat(MIXER_TEXT_CAPACITY);
    assert_eq!(
        io.handle_mixer_text(&message(MixerAction::Append, &flood)),
        Err(MixerLoadError::Overflow)
    );

    let result = io.handle_mixer_text(&message(MixerAction::Append, "Z:\n"));

    assert_eq!(result, Err(MixerLoadError::Overflow));
    assert!(!io.commit_mixer());
    assert!(!io.state.status.contains(StatusFlags::MIXER_OK));
    assert_eq!(mixers(&store), 1);

    io.handle_mixer_text(&message(MixerAction::Reset, QUAD_X[0]))
        .unwrap();
    assert!(io.commit_mixer());
    assert!(io.state.status.contains(StatusFlags::MIXER_OK));
    assert_eq!(mixers(&store), 1);
}

/// Control input that lets the delivery path run in the middle of a mix
struct DeliveryDuringMix<'s> {
    store: &'s MixerStore,
    msg: Vec<u8>,
    results: Vec<Result<(), MixerLoadError>>,
}

impl ControlInput for DeliveryDuringMix<'_> {
    fn control(&mut self, _: u8, index: u8) -> Option<Control> {
        self.results.push(self.store.handle_text(&self.msg));
        Some(Control::Value(if index == 3 { 1.0 } else { 0.0 }))
    }
}

#[test]
fn delivery_path_overlapping_a_mix_gets_retry() {
    // mixer loaded and committed from the tick side
    let store = MixerStore::new();
    let mut io = IoMixer::new(&store);
    io.handle_mixer_text(&message(MixerAction::Reset, QUAD_X[0]))
        .unwrap();
    assert!(io.commit_mixer());

    // the delivery path fires once per control read while the mix runs
    let mut input = DeliveryDuringMix {
        store: io.store(),
        msg: message(MixerAction::Append, QUAD_X[1]),
        results: Vec::new(),
    };
    let mut outputs = [0.0f32; SERVO_COUNT];
    let lock = store.lock().expect("store free");
    let mixed = lock.mix(&mut input, &mut outputs, &mut MixerLimits::empty());
    drop(lock);

    assert_eq!(mixed, 1);
    assert_eq!(outputs[0], 1.0);
    assert_eq!(input.results.len(), 2);
    assert!(input.results.iter().all(|r| *r == Err(MixerLoadError::Busy)));
    assert_ne!(load_status(input.results[0]), 0);
    assert_eq!(mixers(&store), 1);

    // the retry after the mix lands, and the next tick sees it committed
    assert_eq!(store.handle_text(&input.msg), Ok(()));
    assert!(store.commit());
    assert_eq!(mixers(&store), 2);

    let now = Instant::from_millis(10);
    io.update_fmu_controls(0, &[0.0; 8], now);
    let ctx = io.tick(now, &mut NullServo, &mut ());
    assert_eq!(ctx.mixed, 2);
}
