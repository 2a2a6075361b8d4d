/// Packet sequencing engine
///
/// Combines the duplicate window and the reorder buffer into the feed state
/// machine: detects gaps, filters duplicates, buffers out-of-order arrivals,
/// emits gap-fill requests through the recovery transport, and decides when
/// each packet may be released downstream. State models follow the major
/// feed protocols: Initial, Live, Recovering, Stale.
///
/// Single-threaded; owned by the ingest side. Everything observable across
/// threads goes through the shared counters.

use crate::config::Config;
use crate::dup_window::DupWindow;
use crate::reorder::{InsertOutcome, ReorderBuffer};
use crate::stats::PipelineCounters;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Waiting for the first packet; any sequence is accepted as the start.
    Initial = 0,
    /// Normal operation.
    Live = 1,
    /// Gap outstanding; out-of-order arrivals are buffered.
    Recovering = 2,
    /// Gaps too large or too old to reconcile incrementally. The pipeline
    /// is no longer authoritative until a snapshot is applied and
    /// `resync()` is called.
    Stale = 3,
}

impl SequencerState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SequencerState::Initial),
            1 => Some(SequencerState::Live),
            2 => Some(SequencerState::Recovering),
            3 => Some(SequencerState::Stale),
            _ => None,
        }
    }
}

/// Per-packet verdict handed back to the ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDecision {
    ReleaseNow,
    Buffered,
    DroppedDuplicate,
    DroppedStale,
}

/// Retransmission request for an inclusive sequence range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapFillRequest {
    pub start_seq: u64,
    pub end_seq: u64,
    pub first_requested_ts: u64,
    pub retry_count: u8,
}

/// Recovery feed interface. Retransmitted packets re-enter through the
/// normal ingest path; a snapshot request is expected to be followed by an
/// external `resync()` once the snapshot has been applied.
pub trait RecoveryTransport {
    fn request_retransmit(&mut self, request: &GapFillRequest);
    fn request_snapshot(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub struct SequencerParams {
    pub dup_window: usize,
    pub reorder_cap: usize,
    pub max_gap: u64,
    pub gap_timeout: u64,
    pub max_retries: u8,
}

impl Default for SequencerParams {
    fn default() -> Self {
        SequencerParams {
            dup_window: 10_000,
            reorder_cap: 1_000,
            max_gap: 1_000,
            gap_timeout: 1_000_000_000,
            max_retries: 3,
        }
    }
}

impl SequencerParams {
    pub fn from_config(cfg: &Config) -> Self {
        SequencerParams {
            dup_window: cfg.dup_window as usize,
            reorder_cap: cfg.reorder_cap as usize,
            max_gap: cfg.max_gap,
            gap_timeout: cfg.gap_timeout_ns,
            max_retries: cfg.max_retries,
        }
    }
}

pub struct Sequencer<R: RecoveryTransport> {
    state: SequencerState,
    next_expected: u64,
    highest_seen: u64,
    dup_window: DupWindow,
    reorder: ReorderBuffer,
    pending_gaps: Vec<GapFillRequest>,
    params: SequencerParams,
    recovery: R,
    counters: Arc<PipelineCounters>,
}

impl<R: RecoveryTransport> Sequencer<R> {
    pub fn new(params: SequencerParams, recovery: R, counters: Arc<PipelineCounters>) -> Self {
        let seq = Sequencer {
            state: SequencerState::Initial,
            next_expected: 0,
            highest_seen: 0,
            dup_window: DupWindow::new(params.dup_window),
            reorder: ReorderBuffer::new(params.reorder_cap),
            pending_gaps: Vec::new(),
            params,
            recovery,
            counters,
        };
        seq.counters
            .current_state
            .store(seq.state as u8, Ordering::Relaxed);
        seq
    }

    /// Classify one packet observation.
    ///
    /// The duplicate window is the sole duplicate authority: a sequence that
    /// passes it and still compares below `next_expected` can only be a late
    /// arrival against a pending gap, and is otherwise treated as a
    /// duplicate as well.
    pub fn process(&mut self, seq: u64, frame: &[u8], recv_ts: u64) -> ReleaseDecision {
        if seq > self.highest_seen {
            self.highest_seen = seq;
        }

        if self.dup_window.contains(seq) {
            PipelineCounters::bump(&self.counters.duplicates);
            return ReleaseDecision::DroppedDuplicate;
        }
        self.dup_window.insert(seq);

        match self.state {
            SequencerState::Initial => {
                self.set_next_expected(seq + 1);
                self.set_state(SequencerState::Live);
                ReleaseDecision::ReleaseNow
            }
            SequencerState::Stale => ReleaseDecision::DroppedStale,
            SequencerState::Live | SequencerState::Recovering => {
                self.sequence(seq, frame, recv_ts)
            }
        }
    }

    fn sequence(&mut self, seq: u64, frame: &[u8], recv_ts: u64) -> ReleaseDecision {
        if seq == self.next_expected {
            self.set_next_expected(seq + 1);
            self.reconcile_gaps();
            return ReleaseDecision::ReleaseNow;
        }

        if seq < self.next_expected {
            // Late arrival. Close out a pending gap it lands in; the payload
            // itself has already been released or buffered (the window would
            // have rejected it otherwise), so it never goes downstream twice.
            if let Some(idx) = self
                .pending_gaps
                .iter()
                .position(|g| seq >= g.start_seq && seq <= g.end_seq)
            {
                if seq == self.pending_gaps[idx].end_seq {
                    self.pending_gaps.remove(idx);
                    PipelineCounters::bump(&self.counters.gaps_filled);
                    self.maybe_go_live();
                }
            }
            PipelineCounters::bump(&self.counters.duplicates);
            return ReleaseDecision::DroppedDuplicate;
        }

        // seq > next_expected: a hole opened in front of us.
        match self.state {
            SequencerState::Live => {
                let gap = seq - self.next_expected;
                PipelineCounters::bump(&self.counters.gaps_detected);

                if gap > self.params.max_gap {
                    self.enter_stale();
                    return ReleaseDecision::DroppedStale;
                }

                let request = GapFillRequest {
                    start_seq: self.next_expected,
                    end_seq: seq - 1,
                    first_requested_ts: recv_ts,
                    retry_count: 0,
                };
                self.recovery.request_retransmit(&request);
                self.pending_gaps.push(request);
                self.set_state(SequencerState::Recovering);

                self.buffer_frame(seq, frame);
                ReleaseDecision::Buffered
            }
            SequencerState::Recovering => {
                // Still ahead of the hole; the original gap request covers
                // the range being recovered, so just buffer.
                self.buffer_frame(seq, frame);
                ReleaseDecision::Buffered
            }
            SequencerState::Initial | SequencerState::Stale => unreachable!(),
        }
    }

    fn buffer_frame(&mut self, seq: u64, frame: &[u8]) {
        if let InsertOutcome::EvictedOldest(_) = self.reorder.insert(seq, frame) {
            PipelineCounters::bump(&self.counters.reorder_overflows);
        }
        PipelineCounters::bump(&self.counters.out_of_order);
    }

    /// Yield buffered frames now contiguous with `next_expected`, consuming
    /// each. Call after every `process`.
    pub fn drain_ready(&mut self) -> DrainReady<'_, R> {
        DrainReady { seq: self }
    }

    /// Periodic maintenance: time out stale gap-fill requests, re-emitting
    /// up to `max_retries` times before declaring the feed stale.
    pub fn tick(&mut self, now: u64) {
        if self.state != SequencerState::Recovering {
            return;
        }

        let mut exhausted = false;
        for gap in &mut self.pending_gaps {
            if now.saturating_sub(gap.first_requested_ts) > self.params.gap_timeout {
                if gap.retry_count < self.params.max_retries {
                    gap.retry_count += 1;
                    gap.first_requested_ts = now;
                    self.recovery.request_retransmit(gap);
                } else {
                    exhausted = true;
                }
            }
        }

        if exhausted {
            self.enter_stale();
        }
    }

    /// Confirm delivery of a recovered range, closing its pending entry.
    /// Normally implicit: retransmitted packets re-enter through `process`
    /// and the entry is reconciled as they release. Exposed for recovery
    /// transports that report completion out of band.
    pub fn on_gap_filled(&mut self, start_seq: u64, end_seq: u64) {
        let before = self.pending_gaps.len();
        self.pending_gaps
            .retain(|g| !(g.start_seq == start_seq && g.end_seq == end_seq));
        if self.pending_gaps.len() < before {
            PipelineCounters::bump(&self.counters.gaps_filled);
        }
        self.maybe_go_live();
    }

    /// Unconditional reset to `Initial`; the next packet seen restarts the
    /// sequence from its own number.
    pub fn resync(&mut self) {
        self.set_state(SequencerState::Initial);
        self.set_next_expected(0);
        self.dup_window.clear();
        self.reorder.clear();
        self.pending_gaps.clear();
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn highest_seen(&self) -> u64 {
        self.highest_seen
    }

    pub fn pending_gaps(&self) -> &[GapFillRequest] {
        &self.pending_gaps
    }

    pub fn recovery(&self) -> &R {
        &self.recovery
    }

    /// Drop gap entries whose range has been fully released and leave
    /// `Recovering` once none remain.
    fn reconcile_gaps(&mut self) {
        let next = self.next_expected;
        let before = self.pending_gaps.len();
        self.pending_gaps.retain(|g| g.end_seq >= next);
        for _ in self.pending_gaps.len()..before {
            PipelineCounters::bump(&self.counters.gaps_filled);
        }
        self.maybe_go_live();
    }

    fn maybe_go_live(&mut self) {
        if self.state == SequencerState::Recovering && self.pending_gaps.is_empty() {
            self.set_state(SequencerState::Live);
        }
    }

    fn enter_stale(&mut self) {
        // One snapshot request per entry into Stale; repeated packets in
        // Stale are dropped without re-requesting.
        if self.state != SequencerState::Stale {
            self.set_state(SequencerState::Stale);
            self.recovery.request_snapshot();
        }
    }

    fn set_state(&mut self, state: SequencerState) {
        self.state = state;
        self.counters
            .current_state
            .store(state as u8, Ordering::Relaxed);
    }

    fn set_next_expected(&mut self, next: u64) {
        self.next_expected = next;
        self.counters
            .next_expected
            .store(next, Ordering::Relaxed);
    }
}

/// Iterator over frames released by resequencing; updates `next_expected`
/// as it goes and reconciles gap state when it finishes.
pub struct DrainReady<'a, R: RecoveryTransport> {
    seq: &'a mut Sequencer<R>,
}

impl<R: RecoveryTransport> Iterator for DrainReady<'_, R> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let frame = self.seq.reorder.take(self.seq.next_expected)?;
        let next = self.seq.next_expected + 1;
        self.seq.set_next_expected(next);
        PipelineCounters::bump(&self.seq.counters.resequenced);
        Some(frame)
    }
}

impl<R: RecoveryTransport> Drop for DrainReady<'_, R> {
    fn drop(&mut self) {
        self.seq.reconcile_gaps();
    }
}
