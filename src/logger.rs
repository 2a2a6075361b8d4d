/// Asynchronous bounded logger
///
/// Hot-path API is `try_log`: format-free, fixed-size records pushed onto
/// an SPSC lane, never blocking and never failing loud. A dedicated
/// unprivileged thread drains the lanes to the sink. Records are dropped on
/// overflow and counted; losing a log line is always preferable to stalling
/// the ingest loop.
///
/// One lane per producing thread keeps the SPSC contract honest: the ingest
/// and consumer shells each get their own handle.

use crate::runtime::ShutdownFlag;
use crate::spsc::{ring, CapacityError, Consumer, Producer};
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

/// Message bytes per record; longer messages are truncated.
pub const LOG_MSG_CAP: usize = 128;

const DRAIN_IDLE_SLEEP: Duration = Duration::from_micros(100);

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Fixed-size log record; trivially copyable so it can cross the queue.
#[derive(Clone, Copy)]
pub struct LogRecord {
    ts: u64,
    level: LogLevel,
    len: u8,
    msg: [u8; LOG_MSG_CAP],
}

/// Producer end of one log lane. Owned by exactly one thread.
pub struct LogHandle {
    tx: Producer<LogRecord>,
    min_level: LogLevel,
    epoch: Instant,
    dropped: u64,
}

impl LogHandle {
    /// Enqueue a log record without blocking. Returns `false` only when the
    /// lane is full and the record was dropped; messages below the level
    /// filter are discarded silently.
    pub fn try_log(&mut self, level: LogLevel, msg: &str) -> bool {
        if level < self.min_level {
            return true;
        }

        let mut record = LogRecord {
            ts: self.epoch.elapsed().as_nanos() as u64,
            level,
            len: 0,
            msg: [0u8; LOG_MSG_CAP],
        };
        let bytes = msg.as_bytes();
        let len = bytes.len().min(LOG_MSG_CAP);
        record.msg[..len].copy_from_slice(&bytes[..len]);
        record.len = len as u8;

        if self.tx.try_push(record) {
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Records dropped on lane overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Consumer end of one log lane; handed to the drainer.
pub struct LogLane {
    rx: Consumer<LogRecord>,
}

/// Create one log lane. `capacity` must be a power of two.
pub fn log_channel(capacity: usize) -> Result<(LogHandle, LogLane), CapacityError> {
    let (tx, rx) = ring(capacity)?;
    Ok((
        LogHandle {
            tx,
            min_level: LogLevel::Info,
            epoch: Instant::now(),
            dropped: 0,
        },
        LogLane { rx },
    ))
}

/// Drains all lanes to a sink on its own thread.
pub struct LogDrainer<W: Write> {
    lanes: Vec<LogLane>,
    out: W,
    shutdown: ShutdownFlag,
}

impl<W: Write> LogDrainer<W> {
    pub fn new(lanes: Vec<LogLane>, out: W, shutdown: ShutdownFlag) -> Self {
        LogDrainer {
            lanes,
            out,
            shutdown,
        }
    }

    /// Run until shutdown is requested, then drain what remains.
    pub fn run(mut self) {
        while !self.shutdown.is_set() {
            if self.drain_once() == 0 {
                thread::sleep(DRAIN_IDLE_SLEEP);
            }
        }
        // Records published before the shutdown request are still visible
        // in the lanes; flush them before exiting.
        while self.drain_once() > 0 {}
        let _ = self.out.flush();
    }

    fn drain_once(&mut self) -> usize {
        let mut written = 0;
        for lane in &mut self.lanes {
            while let Some(record) = lane.rx.try_pop() {
                let msg = String::from_utf8_lossy(&record.msg[..record.len as usize]);
                let _ = writeln!(
                    self.out,
                    "[{}] [{}] {}",
                    record.ts,
                    record.level.as_str(),
                    msg
                );
                written += 1;
            }
        }
        written
    }
}
