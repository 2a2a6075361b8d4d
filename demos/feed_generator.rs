/// Synthetic market data feed generator
///
/// Sends binary trade/quote/heartbeat frames over UDP at a configurable
/// rate, with optional gap, duplicate, and reorder injection to exercise
/// the sequencing engine.
///
/// Usage: feed_generator [dest_ip] [port] [packet_count] [packets_per_sec]

use feed_ingress::protocol::{encode_heartbeat, price_to_fixed, QuoteFrame, TradeFrame};
use rand::Rng;
use std::env;
use std::net::UdpSocket;
use std::thread;
use std::time::Duration;

const GAP_PROBABILITY: f64 = 0.001;
const DUPLICATE_PROBABILITY: f64 = 0.002;
const REORDER_PROBABILITY: f64 = 0.005;

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let dest_ip = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.get(2).and_then(|a| a.parse().ok()).unwrap_or(15_000);
    let packet_count: u64 = args.get(3).and_then(|a| a.parse().ok()).unwrap_or(10_000);
    let packets_per_sec: u64 = args.get(4).and_then(|a| a.parse().ok()).unwrap_or(1_000);

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let dest = (dest_ip.as_str(), port);
    let interval = Duration::from_micros(1_000_000 / packets_per_sec.max(1));

    println!(
        "Sending {} packets to {}:{} at {}/sec",
        packet_count, dest_ip, port, packets_per_sec
    );

    let mut rng = rand::thread_rng();
    let mut sequence = 1u64;
    let mut last_frame: Option<Vec<u8>> = None;
    let mut held_frame: Option<Vec<u8>> = None;

    let mut gaps_injected = 0u64;
    let mut duplicates_sent = 0u64;
    let mut reordered = 0u64;

    for i in 0..packet_count {
        let roll: f64 = rng.gen();

        if roll < GAP_PROBABILITY {
            let skipped = rng.gen_range(1u64..=10);
            println!(
                "injecting gap: skipping sequences {}..={}",
                sequence,
                sequence + skipped - 1
            );
            sequence += skipped;
            gaps_injected += 1;
        } else if roll < GAP_PROBABILITY + DUPLICATE_PROBABILITY {
            if let Some(frame) = &last_frame {
                socket.send_to(frame, dest)?;
                duplicates_sent += 1;
            }
        }

        let frame = build_frame(&mut rng, sequence);
        sequence += 1;

        if rng.gen::<f64>() < REORDER_PROBABILITY && held_frame.is_none() {
            // Hold this frame back one slot; it goes out after its successor.
            held_frame = Some(frame.clone());
            reordered += 1;
        } else {
            socket.send_to(&frame, dest)?;
            if let Some(held) = held_frame.take() {
                socket.send_to(&held, dest)?;
            }
        }
        last_frame = Some(frame);

        if i % 10_000 == 0 && i > 0 {
            println!("sent {} packets", i);
        }
        thread::sleep(interval);
    }

    if let Some(held) = held_frame.take() {
        socket.send_to(&held, dest)?;
    }

    println!(
        "done: {} packets, {} gaps injected, {} duplicates, {} reordered",
        packet_count, gaps_injected, duplicates_sent, reordered
    );
    Ok(())
}

fn build_frame(rng: &mut impl Rng, sequence: u64) -> Vec<u8> {
    let ts = sequence * 1_000;
    let symbol_id = rng.gen_range(1u32..=8);
    let mid = price_to_fixed(100.0 + rng.gen_range(-5.0..5.0));

    match sequence % 10 {
        0 => encode_heartbeat(sequence).to_vec(),
        n if n % 2 == 1 => TradeFrame {
            ts,
            seq_num: sequence,
            symbol_id,
            trade_id: sequence as u32,
            price: mid,
            qty: rng.gen_range(1u32..1_000),
            side: if rng.gen_bool(0.5) { b'B' } else { b'S' },
        }
        .encode(sequence)
        .to_vec(),
        _ => QuoteFrame {
            ts,
            seq_num: sequence,
            symbol_id,
            bid_px: mid.saturating_sub(rng.gen_range(1..100)),
            ask_px: mid + rng.gen_range(1..100),
            bid_sz: rng.gen_range(1u32..500),
            ask_sz: rng.gen_range(1u32..500),
            n_levels: 1,
        }
        .encode(sequence)
        .to_vec(),
    }
}
