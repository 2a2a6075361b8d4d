/// Ingest loop
///
/// Producer side of the pipeline: busy-polls the transport, timestamps each
/// packet on arrival, runs it through the sequencer, parses released frames
/// into events and pushes them onto the queue. No system call, heap
/// allocation, lock, or unbounded loop on the hot path; the only pause is a
/// CPU spin hint when the transport reports no data.

use crate::clock::TickClock;
use crate::decoder;
use crate::event::Event;
use crate::logger::{LogHandle, LogLevel};
use crate::runtime::ShutdownFlag;
use crate::sequencer::{RecoveryTransport, ReleaseDecision, Sequencer};
use crate::spsc::Producer;
use crate::stats::PipelineCounters;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Receive scratch buffer, sized for the largest datagram the feed can
/// legally carry. Owned by the loop, never resized.
pub const RECV_BUF_LEN: usize = 65_536;

/// Result of one non-blocking receive.
#[derive(Debug)]
pub enum RecvOutcome {
    /// `n` bytes landed in the buffer.
    Data(usize),
    /// Nothing ready; caller spins.
    Empty,
    /// Unrecoverable transport failure; the loop terminates.
    Fatal(io::Error),
}

/// Datagram source. Must never block.
pub trait Transport {
    fn recv_nonblocking(&mut self, buf: &mut [u8]) -> RecvOutcome;
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("transport failed: {0}")]
    Transport(#[from] io::Error),
}

pub struct IngestLoop<T, R, C>
where
    T: Transport,
    R: RecoveryTransport,
    C: TickClock,
{
    transport: T,
    sequencer: Sequencer<R>,
    queue: Producer<Event>,
    clock: C,
    counters: Arc<PipelineCounters>,
    shutdown: ShutdownFlag,
    log: LogHandle,
    recv_buf: Box<[u8; RECV_BUF_LEN]>,
    maintenance_interval: u64,
    last_maintenance: u64,
}

impl<T, R, C> IngestLoop<T, R, C>
where
    T: Transport,
    R: RecoveryTransport,
    C: TickClock,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        sequencer: Sequencer<R>,
        queue: Producer<Event>,
        clock: C,
        counters: Arc<PipelineCounters>,
        shutdown: ShutdownFlag,
        log: LogHandle,
        maintenance_interval: u64,
    ) -> Self {
        IngestLoop {
            transport,
            sequencer,
            queue,
            clock,
            counters,
            shutdown,
            log,
            recv_buf: Box::new([0u8; RECV_BUF_LEN]),
            maintenance_interval,
            last_maintenance: 0,
        }
    }

    /// Run until shutdown is requested or the transport fails.
    pub fn run(&mut self) -> Result<(), IngestError> {
        self.last_maintenance = self.clock.now();
        self.log.try_log(LogLevel::Info, "ingest loop started");

        while !self.shutdown.is_set() {
            match self.poll_once() {
                Ok(true) => {}
                Ok(false) => std::hint::spin_loop(),
                Err(err) => {
                    self.log
                        .try_log(LogLevel::Error, "transport failed, stopping ingest");
                    return Err(err);
                }
            }
        }

        self.log.try_log(LogLevel::Info, "ingest loop stopped");
        Ok(())
    }

    /// One loop iteration: maintenance, receive, sequence, parse, enqueue.
    /// `Ok(true)` means a packet was consumed from the transport.
    pub fn poll_once(&mut self) -> Result<bool, IngestError> {
        let now = self.clock.now();
        if now.saturating_sub(self.last_maintenance) > self.maintenance_interval {
            self.sequencer.tick(now);
            self.last_maintenance = now;
        }

        let n = match self.transport.recv_nonblocking(&mut self.recv_buf[..]) {
            RecvOutcome::Data(n) => n,
            RecvOutcome::Empty => return Ok(false),
            RecvOutcome::Fatal(err) => return Err(err.into()),
        };

        // Timestamp before any classification work; end-to-end latency is
        // measured against this.
        let recv_ts = self.clock.now();
        PipelineCounters::bump(&self.counters.packets_received);

        let frame = &self.recv_buf[..n];
        let seq = match decoder::read_packet_sequence(frame) {
            Some(seq) => seq,
            // Shorter than a header: nothing to sequence, drop silently.
            None => return Ok(true),
        };

        if self.sequencer.process(seq, frame, recv_ts) == ReleaseDecision::ReleaseNow {
            Self::parse_and_enqueue(frame, recv_ts, &mut self.queue, &self.counters, &mut self.log);
        }

        for released in self.sequencer.drain_ready() {
            Self::parse_and_enqueue(
                &released,
                recv_ts,
                &mut self.queue,
                &self.counters,
                &mut self.log,
            );
        }

        Ok(true)
    }

    pub fn sequencer(&self) -> &Sequencer<R> {
        &self.sequencer
    }

    /// External access for operator-driven `resync()` after a snapshot.
    pub fn sequencer_mut(&mut self) -> &mut Sequencer<R> {
        &mut self.sequencer
    }

    fn parse_and_enqueue(
        frame: &[u8],
        recv_ts: u64,
        queue: &mut Producer<Event>,
        counters: &PipelineCounters,
        log: &mut LogHandle,
    ) {
        match decoder::decode_event(frame, recv_ts) {
            Ok(Some(event)) => {
                if queue.try_push(event) {
                    PipelineCounters::bump(&counters.packets_released);
                } else {
                    // Downstream is too slow; count and move on.
                    PipelineCounters::bump(&counters.packets_dropped_queue_full);
                }
            }
            // Heartbeat or book-maintenance type: sequence consumed, no event.
            Ok(None) => {}
            Err(_) => {
                log.try_log(LogLevel::Debug, "malformed frame discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::log_channel;
    use crate::protocol::{encode_heartbeat, TradeFrame};
    use crate::sequencer::{GapFillRequest, SequencerParams};
    use crate::spsc;
    use std::collections::VecDeque;

    struct NullRecovery;

    impl RecoveryTransport for NullRecovery {
        fn request_retransmit(&mut self, _request: &GapFillRequest) {}
        fn request_snapshot(&mut self) {}
    }

    /// Replays a canned list of datagrams, then reports no data.
    struct ScriptedTransport {
        frames: VecDeque<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            ScriptedTransport {
                frames: frames.into(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn recv_nonblocking(&mut self, buf: &mut [u8]) -> RecvOutcome {
            match self.frames.pop_front() {
                Some(frame) => {
                    buf[..frame.len()].copy_from_slice(&frame);
                    RecvOutcome::Data(frame.len())
                }
                None => RecvOutcome::Empty,
            }
        }
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn recv_nonblocking(&mut self, _buf: &mut [u8]) -> RecvOutcome {
            RecvOutcome::Fatal(io::Error::new(io::ErrorKind::Other, "socket closed"))
        }
    }

    fn trade(seq: u64) -> Vec<u8> {
        TradeFrame {
            ts: seq * 10,
            seq_num: seq,
            symbol_id: 1,
            trade_id: seq as u32,
            price: 100_0000,
            qty: 10,
            side: b'B',
        }
        .encode(seq)
        .to_vec()
    }

    fn ingest(
        frames: Vec<Vec<u8>>,
        queue_capacity: usize,
    ) -> (
        IngestLoop<ScriptedTransport, NullRecovery, crate::clock::MonotonicClock>,
        spsc::Consumer<Event>,
        Arc<PipelineCounters>,
    ) {
        let counters = Arc::new(PipelineCounters::new());
        let (tx, rx) = spsc::ring(queue_capacity).unwrap();
        let (log, _lane) = log_channel(64).unwrap();
        let sequencer = Sequencer::new(
            SequencerParams::default(),
            NullRecovery,
            Arc::clone(&counters),
        );
        let ingest = IngestLoop::new(
            ScriptedTransport::new(frames),
            sequencer,
            tx,
            crate::clock::MonotonicClock::new(),
            Arc::clone(&counters),
            ShutdownFlag::new(),
            log,
            100_000_000,
        );
        (ingest, rx, counters)
    }

    fn drive_to_idle<T: Transport, R: RecoveryTransport, C: TickClock>(
        ingest: &mut IngestLoop<T, R, C>,
    ) {
        while ingest.poll_once().unwrap() {}
    }

    #[test]
    fn test_in_order_stream_reaches_queue() {
        let (mut ingest, mut rx, counters) =
            ingest((1..=5).map(trade).collect(), 64);
        drive_to_idle(&mut ingest);

        let mut seqs = Vec::new();
        while let Some(event) = rx.try_pop() {
            seqs.push(event.exchange_ts / 10);
        }
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(counters.snapshot().packets_released, 5);
        assert_eq!(counters.snapshot().packets_received, 5);
    }

    #[test]
    fn test_gap_resequenced_before_queue() {
        let (mut ingest, mut rx, counters) = ingest(
            vec![trade(1), trade(2), trade(5), trade(3), trade(4), trade(6)],
            64,
        );
        drive_to_idle(&mut ingest);

        let mut seqs = Vec::new();
        while let Some(event) = rx.try_pop() {
            seqs.push(event.exchange_ts / 10);
        }
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);

        let snap = counters.snapshot();
        assert_eq!(snap.gaps_detected, 1);
        assert_eq!(snap.gaps_filled, 1);
        assert_eq!(snap.resequenced, 1);
    }

    #[test]
    fn test_heartbeat_consumes_sequence_without_event() {
        let (mut ingest, mut rx, counters) = ingest(
            vec![trade(1), encode_heartbeat(2).to_vec(), trade(3)],
            64,
        );
        drive_to_idle(&mut ingest);

        let mut count = 0;
        while rx.try_pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(counters.snapshot().gaps_detected, 0);
        assert_eq!(ingest.sequencer().next_expected(), 4);
    }

    #[test]
    fn test_short_frame_dropped_silently() {
        let (mut ingest, mut rx, counters) =
            ingest(vec![trade(1), vec![0u8; 4], trade(2)], 64);
        drive_to_idle(&mut ingest);

        let mut count = 0;
        while rx.try_pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(counters.snapshot().packets_received, 3);
    }

    #[test]
    fn test_backpressure_counts_drops() {
        // Queue of 8, consumer never polls: the ninth event is dropped.
        let (mut ingest, _rx, counters) = ingest((1..=9).map(trade).collect(), 8);
        drive_to_idle(&mut ingest);

        let snap = counters.snapshot();
        assert_eq!(snap.packets_released, 8);
        assert_eq!(snap.packets_dropped_queue_full, 1);
    }

    #[test]
    fn test_fatal_transport_terminates_run() {
        let counters = Arc::new(PipelineCounters::new());
        let (tx, _rx) = spsc::ring(8).unwrap();
        let (log, _lane) = log_channel(64).unwrap();
        let sequencer = Sequencer::new(
            SequencerParams::default(),
            NullRecovery,
            Arc::clone(&counters),
        );
        let mut ingest = IngestLoop::new(
            FailingTransport,
            sequencer,
            tx,
            crate::clock::MonotonicClock::new(),
            counters,
            ShutdownFlag::new(),
            log,
            100_000_000,
        );
        assert!(matches!(ingest.run(), Err(IngestError::Transport(_))));
    }

    #[test]
    fn test_run_exits_on_shutdown() {
        let counters = Arc::new(PipelineCounters::new());
        let (tx, _rx) = spsc::ring(8).unwrap();
        let (log, _lane) = log_channel(64).unwrap();
        let shutdown = ShutdownFlag::new();
        shutdown.request();
        let sequencer = Sequencer::new(
            SequencerParams::default(),
            NullRecovery,
            Arc::clone(&counters),
        );
        let mut ingest = IngestLoop::new(
            ScriptedTransport::new(vec![]),
            sequencer,
            tx,
            crate::clock::MonotonicClock::new(),
            counters,
            shutdown,
            log,
            100_000_000,
        );
        assert!(ingest.run().is_ok());
    }
}
