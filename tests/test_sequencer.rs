/// Sequencing conformance: end-to-end scenarios over the state machine and
/// randomized in-order delivery checks.

use feed_ingress::{
    GapFillRequest, PipelineCounters, RecoveryTransport, ReleaseDecision, Sequencer,
    SequencerState,
};
use feed_ingress::sequencer::SequencerParams;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

#[derive(Default)]
struct RecordingRecovery {
    retransmits: Vec<(u64, u64)>,
    snapshots: usize,
}

impl RecoveryTransport for RecordingRecovery {
    fn request_retransmit(&mut self, request: &GapFillRequest) {
        self.retransmits.push((request.start_seq, request.end_seq));
    }

    fn request_snapshot(&mut self) {
        self.snapshots += 1;
    }
}

fn small_sequencer() -> (Sequencer<RecordingRecovery>, Arc<PipelineCounters>) {
    let counters = Arc::new(PipelineCounters::new());
    let params = SequencerParams {
        dup_window: 10,
        reorder_cap: 8,
        max_gap: 10,
        gap_timeout: 1_000_000_000,
        max_retries: 3,
    };
    (
        Sequencer::new(params, RecordingRecovery::default(), Arc::clone(&counters)),
        counters,
    )
}

/// Feed one observation and collect everything released, in release order.
fn observe(seq: &mut Sequencer<RecordingRecovery>, s: u64) -> Vec<u64> {
    let mut released = Vec::new();
    if seq.process(s, &s.to_le_bytes(), 0) == ReleaseDecision::ReleaseNow {
        released.push(s);
    }
    released.extend(
        seq.drain_ready()
            .map(|frame| u64::from_le_bytes(frame.try_into().unwrap())),
    );
    released
}

fn observe_all(seq: &mut Sequencer<RecordingRecovery>, arrivals: &[u64]) -> Vec<u64> {
    arrivals.iter().flat_map(|&s| observe(seq, s)).collect()
}

#[test]
fn scenario_clean_stream() {
    let (mut seq, counters) = small_sequencer();
    let released = observe_all(&mut seq, &[1, 2, 3, 4, 5]);
    assert_eq!(released, vec![1, 2, 3, 4, 5]);
    assert_eq!(seq.state(), SequencerState::Live);

    let snap = counters.snapshot();
    assert_eq!(snap.duplicates, 0);
    assert_eq!(snap.gaps_detected, 0);
}

#[test]
fn scenario_duplicate() {
    let (mut seq, counters) = small_sequencer();
    let released = observe_all(&mut seq, &[1, 2, 2, 3]);
    assert_eq!(released, vec![1, 2, 3]);
    assert_eq!(counters.snapshot().duplicates, 1);
}

#[test]
fn scenario_small_gap_filled_in_order() {
    let (mut seq, counters) = small_sequencer();
    let released = observe_all(&mut seq, &[1, 2, 5, 3, 4, 6]);
    assert_eq!(released, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(seq.recovery().retransmits, vec![(3, 4)]);

    let snap = counters.snapshot();
    assert_eq!(snap.gaps_detected, 1);
    assert_eq!(snap.gaps_filled, 1);
    assert_eq!(snap.out_of_order, 1);
    assert_eq!(snap.resequenced, 1);
}

#[test]
fn scenario_reorder_without_gap_extension() {
    let (mut seq, counters) = small_sequencer();
    let released = observe_all(&mut seq, &[1, 2, 4, 3, 5]);
    assert_eq!(released, vec![1, 2, 3, 4, 5]);

    let snap = counters.snapshot();
    assert_eq!(snap.gaps_detected, 1);
    assert_eq!(snap.gaps_filled, 1);
    assert_eq!(snap.out_of_order, 1);
    assert_eq!(snap.resequenced, 1);
}

#[test]
fn scenario_oversize_gap_then_resync() {
    let (mut seq, _) = small_sequencer();
    assert_eq!(observe_all(&mut seq, &[1, 2]), vec![1, 2]);

    // 20 is beyond next_expected + max_gap: stale, one snapshot request.
    assert!(observe(&mut seq, 20).is_empty());
    assert_eq!(seq.state(), SequencerState::Stale);
    assert_eq!(seq.recovery().snapshots, 1);
    assert!(observe(&mut seq, 21).is_empty());
    assert_eq!(seq.recovery().snapshots, 1);

    seq.resync();
    let released = observe_all(&mut seq, &[100, 101]);
    assert_eq!(released, vec![100, 101]);
    assert_eq!(seq.state(), SequencerState::Live);
}

#[test]
fn replay_after_resync_is_identical() {
    let arrivals = [7u64, 8, 11, 9, 10, 12];
    let (mut seq, _) = small_sequencer();
    let first = observe_all(&mut seq, &arrivals);

    seq.resync();
    let second = observe_all(&mut seq, &arrivals);
    assert_eq!(first, second);
    assert_eq!(second, vec![7, 8, 9, 10, 11, 12]);
}

#[test]
fn releases_are_strictly_increasing_under_shuffle() {
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let counters = Arc::new(PipelineCounters::new());
        let mut seq = Sequencer::new(
            SequencerParams::default(),
            RecordingRecovery::default(),
            Arc::clone(&counters),
        );

        // Fixed first packet sets the baseline, then shuffle inside small
        // windows so every gap stays recoverable.
        let mut tail: Vec<u64> = (2..=300).collect();
        for chunk in tail.chunks_mut(5) {
            chunk.shuffle(&mut rng);
        }
        let mut arrivals = vec![1u64];
        arrivals.extend(tail);

        let released = observe_all(&mut seq, &arrivals);
        let expected: Vec<u64> = (1..=300).collect();
        assert_eq!(released, expected);
        assert_eq!(seq.state(), SequencerState::Live);
    }
}

#[test]
fn duplicates_within_window_never_released_twice() {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let counters = Arc::new(PipelineCounters::new());
        let mut seq = Sequencer::new(
            SequencerParams::default(),
            RecordingRecovery::default(),
            Arc::clone(&counters),
        );

        // In-order stream with random re-sends of recently seen sequences.
        let mut arrivals = Vec::new();
        for s in 1u64..=200 {
            arrivals.push(s);
            if rng.gen_bool(0.3) {
                arrivals.push(rng.gen_range(1..=s));
            }
        }

        let released = observe_all(&mut seq, &arrivals);
        let expected: Vec<u64> = (1..=200).collect();
        assert_eq!(released, expected);
    }
}

#[test]
fn buffered_state_stays_bounded() {
    let counters = Arc::new(PipelineCounters::new());
    let params = SequencerParams {
        dup_window: 100,
        reorder_cap: 16,
        max_gap: 1_000_000,
        gap_timeout: u64::MAX,
        max_retries: 3,
    };
    let mut seq = Sequencer::new(params, RecordingRecovery::default(), Arc::clone(&counters));

    // Open a gap and stream far ahead of it; the reorder buffer must hold
    // its bound and count the spill.
    seq.process(1, b"1", 0);
    for s in 1_000..2_000u64 {
        seq.process(s, &s.to_le_bytes(), 0);
    }
    assert!(counters.snapshot().reorder_overflows > 0);
    assert_eq!(counters.snapshot().out_of_order, 1_000);
}
