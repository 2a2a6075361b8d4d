/// Consumer shell
///
/// Thin driver on the consumer core: pops events off the queue, measures
/// end-to-end latency against the ingest timestamp, and forwards each event
/// to the trading logic behind `EventHandler`. Busy-polls; drains the queue
/// before honoring shutdown so accepted packets are never abandoned.

use crate::clock::TickClock;
use crate::event::Event;
use crate::logger::{LogHandle, LogLevel};
use crate::runtime::ShutdownFlag;
use crate::spsc::Consumer;
use crate::stats::LatencyWindow;

/// Downstream trading logic. Runs on the consumer core; must not block.
pub trait EventHandler {
    fn on_event(&mut self, event: &Event);
}

pub struct ConsumerShell<H, C>
where
    H: EventHandler,
    C: TickClock,
{
    queue: Consumer<Event>,
    handler: H,
    clock: C,
    shutdown: ShutdownFlag,
    log: LogHandle,
    latency: LatencyWindow,
    events_processed: u64,
}

impl<H, C> ConsumerShell<H, C>
where
    H: EventHandler,
    C: TickClock,
{
    pub fn new(
        queue: Consumer<Event>,
        handler: H,
        clock: C,
        shutdown: ShutdownFlag,
        log: LogHandle,
    ) -> Self {
        ConsumerShell {
            queue,
            handler,
            clock,
            shutdown,
            log,
            latency: LatencyWindow::new(),
            events_processed: 0,
        }
    }

    /// Pop and dispatch one event; `false` when the queue is empty.
    pub fn poll_once(&mut self) -> bool {
        match self.queue.try_pop() {
            Some(event) => {
                let now = self.clock.now();
                self.latency.record(now.saturating_sub(event.recv_ts));
                self.handler.on_event(&event);
                self.events_processed += 1;
                true
            }
            None => false,
        }
    }

    /// Run until shutdown; the queue is drained before exit.
    pub fn run(&mut self) {
        self.log.try_log(LogLevel::Info, "consumer started");

        loop {
            if !self.poll_once() {
                if self.shutdown.is_set() {
                    break;
                }
                std::hint::spin_loop();
            }
        }

        // Anything published before the shutdown request is still ours.
        while self.poll_once() {}

        self.log.try_log(LogLevel::Info, "consumer stopped");
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn latency(&self) -> &LatencyWindow {
        &self.latency
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}
