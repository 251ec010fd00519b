//! Gaze monitor: prints gaze position, confidence and the receive rate.
//!
//! Run with:
//!   cargo run --example gaze-monitor -- 127.0.0.1 50020
//!
//! Start `fake-remote` first when no eye tracker is available.

use std::time::{Duration, Instant};

use pupilnet::remote::Client;
use pupilnet::transport::TopicFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(50020);

    let mut client = Client::connect(host, port)?;
    let ports = client.ports()?;
    eprintln!("remote ports: sub={} pub={}", ports.sub, ports.publish);

    let mut gaze = client.create_streaming_channel(TopicFilter::prefixes(["gaze."]))?;

    let mut window_start = Instant::now();
    let mut window_count = 0u32;
    let deadline = Instant::now() + Duration::from_secs(10);

    while Instant::now() < deadline {
        for message in gaze.drain(50)? {
            let datum = message.gaze();
            let [x, y] = datum.norm_pos_or_default();
            println!(
                "{:<14} x={x:.3} y={y:.3} conf={:.2}",
                message.topic,
                datum.confidence_or_default()
            );
            window_count += 1;
        }

        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            eprintln!("{:.1} msg/s", f64::from(window_count) / elapsed.as_secs_f64());
            window_start = Instant::now();
            window_count = 0;
        }
    }

    eprintln!("stats: {:?}", gaze.stats());
    gaze.close();
    client.close();
    Ok(())
}
