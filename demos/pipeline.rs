/// Full ingress pipeline demo
///
/// Wires the UDP transport, sequencer, SPSC queue, consumer shell, and
/// async logger across two pinned threads, runs for a fixed duration, and
/// prints counters once per second. Pair with the feed_generator demo:
///
///   pipeline [group] [port] [runtime_secs]
///   feed_generator 127.0.0.1 15000 100000 5000

use feed_ingress::{
    log_channel, pin_to_core, Config, ConsumerShell, Event, EventBody, EventHandler,
    GapFillRequest, IngestLoop, LogDrainer, LogLevel, MonotonicClock, PipelineCounters,
    RecoveryTransport, Sequencer, SequencerState, ShutdownFlag, UdpTransport,
};
use feed_ingress::sequencer::SequencerParams;
use std::env;
use std::fs::File;
use std::net::Ipv4Addr;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Stand-in recovery feed: reports requests on stderr. A real deployment
/// points this at the exchange retransmission service.
struct StderrRecovery;

impl RecoveryTransport for StderrRecovery {
    fn request_retransmit(&mut self, request: &GapFillRequest) {
        eprintln!(
            "[recovery] gap fill requested: {}..={} (retry {})",
            request.start_seq, request.end_seq, request.retry_count
        );
    }

    fn request_snapshot(&mut self) {
        eprintln!("[recovery] snapshot requested: feed is stale, resync required");
    }
}

/// Minimal trading-logic stand-in: tracks the inside market and counts
/// wide-spread quotes.
#[derive(Default)]
struct SpreadWatcher {
    last_bid: u64,
    last_ask: u64,
    wide_spreads: u64,
    trades_seen: u64,
}

impl EventHandler for SpreadWatcher {
    fn on_event(&mut self, event: &Event) {
        match event.body {
            EventBody::Trade { .. } => self.trades_seen += 1,
            EventBody::Quote { bid_px, ask_px, .. } => {
                self.last_bid = bid_px;
                self.last_ask = ask_px;
                if ask_px.saturating_sub(bid_px) > 50 {
                    self.wide_spreads += 1;
                }
            }
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let group = args.get(1).cloned().unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(15_000);
    let runtime_secs: u64 = args.get(3).and_then(|a| a.parse().ok()).unwrap_or(30);

    let config = Config {
        transport_group: group,
        port,
        ..Config::default()
    };
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        process::exit(1);
    }

    let group_addr: Ipv4Addr = match config.transport_group.parse() {
        Ok(addr) => addr,
        Err(_) => {
            eprintln!("invalid multicast group: {}", config.transport_group);
            process::exit(1);
        }
    };

    let transport = match UdpTransport::join(group_addr, config.port) {
        Ok(t) => t,
        Err(err) => {
            eprintln!("failed to open transport: {err}");
            process::exit(1);
        }
    };
    println!(
        "listening on {}:{} (queue {} slots)",
        config.transport_group, config.port, config.queue_capacity
    );

    let shutdown = ShutdownFlag::new();
    let counters = Arc::new(PipelineCounters::new());
    let (queue_tx, queue_rx) = feed_ingress::ring::<Event>(config.queue_capacity)
        .expect("capacity validated above");

    let (mut ingest_log, ingest_lane) = log_channel(4_096).expect("pow2 lane");
    let (consumer_log, consumer_lane) = log_channel(4_096).expect("pow2 lane");
    let log_file = File::create("feed-ingress.log").expect("create log file");
    let log_shutdown = ShutdownFlag::new();
    let drainer = LogDrainer::new(
        vec![ingest_lane, consumer_lane],
        log_file,
        log_shutdown.clone(),
    );
    let log_thread = thread::spawn(move || drainer.run());

    ingest_log.try_log(LogLevel::Info, "pipeline starting");

    // Both threads share one tick epoch so end-to-end latency is coherent.
    let clock = MonotonicClock::new();

    let sequencer = Sequencer::new(
        SequencerParams::from_config(&config),
        StderrRecovery,
        Arc::clone(&counters),
    );
    let mut ingest = IngestLoop::new(
        transport,
        sequencer,
        queue_tx,
        clock.clone(),
        Arc::clone(&counters),
        shutdown.clone(),
        ingest_log,
        config.maintenance_interval_ns,
    );
    let mut shell = ConsumerShell::new(
        queue_rx,
        SpreadWatcher::default(),
        clock,
        shutdown.clone(),
        consumer_log,
    );

    let producer_cpu = config.producer_cpu;
    let consumer_cpu = config.consumer_cpu;

    let producer = thread::spawn(move || {
        if !pin_to_core(producer_cpu) {
            eprintln!("[ingest] could not pin to cpu {producer_cpu}");
        }
        let result = ingest.run();
        (ingest, result)
    });
    let consumer = thread::spawn(move || {
        if !pin_to_core(consumer_cpu) {
            eprintln!("[consumer] could not pin to cpu {consumer_cpu}");
        }
        shell.run();
        shell
    });

    for _ in 0..runtime_secs {
        thread::sleep(Duration::from_secs(1));
        let snap = counters.snapshot();
        println!(
            "{} [state {:?}]",
            snap,
            SequencerState::from_u8(snap.current_state)
        );
        if shutdown.is_set() {
            break;
        }
    }
    shutdown.request();

    let (ingest, ingest_result) = producer.join().expect("ingest thread");
    let shell = consumer.join().expect("consumer thread");
    log_shutdown.request();
    log_thread.join().expect("log thread");

    if let Err(err) = ingest_result {
        eprintln!("ingest terminated with error: {err}");
    }

    println!("--- summary ---");
    println!("{}", counters.snapshot());
    println!(
        "sequencer: state {:?}, next_expected {}, highest_seen {}",
        ingest.sequencer().state(),
        ingest.sequencer().next_expected(),
        ingest.sequencer().highest_seen()
    );
    println!(
        "consumer: {} events ({} trades, {} wide spreads), last market {}/{}",
        shell.events_processed(),
        shell.handler().trades_seen,
        shell.handler().wide_spreads,
        shell.handler().last_bid,
        shell.handler().last_ask
    );
    if let Some(stats) = shell.latency().stats() {
        println!(
            "latency ns: min {} p50 {} p99 {} max {} mean {:.0}",
            stats.min, stats.p50, stats.p99, stats.max, stats.mean
        );
    }
}
