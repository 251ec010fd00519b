//! Stand-in remote service for trying the client without an eye tracker.
//!
//! Answers `SUB_PORT`, `PUB_PORT`, `t` and notifications on the control port
//! and publishes synthetic `gaze.3d.0.` data (a point circling the frame
//! center) at 30 Hz.
//!
//! Run with:
//!   cargo run --example fake-remote -- 50020
//!
//! In another terminal:
//!   cargo run --features cli -- listen --topic gaze. --format pretty

use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use pupilnet::codec::{decode, encode, Map, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let req_port: u16 = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()?
        .unwrap_or(50020);
    let sub_port = req_port + 1;
    let pub_port = req_port + 2;

    let ctx = zmq::Context::new();
    let control = ctx.socket(zmq::REP)?;
    control.bind(&format!("tcp://127.0.0.1:{req_port}"))?;
    let publisher = ctx.socket(zmq::PUB)?;
    publisher.bind(&format!("tcp://127.0.0.1:{sub_port}"))?;
    eprintln!("control on {req_port}, telemetry on {sub_port}");

    let started = Instant::now();
    thread::spawn(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        loop {
            let t = started.elapsed().as_secs_f64();
            let angle = t * TAU / 4.0;
            let payload: Map = [
                ("topic", Value::from("gaze.3d.0.")),
                (
                    "norm_pos",
                    Value::from(vec![
                        Value::from(0.5 + 0.3 * angle.cos()),
                        Value::from(0.5 + 0.3 * angle.sin()),
                    ]),
                ),
                ("confidence", Value::from(0.8 + 0.2 * (t * 3.0).sin().abs())),
                ("timestamp", Value::from(t)),
            ]
            .into_iter()
            .collect();

            publisher.send("gaze.3d.0.", zmq::SNDMORE)?;
            publisher.send(encode(&Value::Map(payload))?, 0)?;
            thread::sleep(Duration::from_millis(33));
        }
    });

    loop {
        let request = control.recv_bytes(0)?;
        let reply = match std::str::from_utf8(&request) {
            Ok("SUB_PORT") => sub_port.to_string(),
            Ok("PUB_PORT") => pub_port.to_string(),
            Ok("t") => format!("{:.6}", started.elapsed().as_secs_f64()),
            Ok(command) if !command.is_empty() && command.is_ascii() => {
                eprintln!("command: {command}");
                "Unknown command.".to_string()
            }
            _ => match decode(&request) {
                Ok(notification) => {
                    let topic = notification.at(0).and_then(Value::as_str).unwrap_or("?");
                    eprintln!("notification: {topic}");
                    "Notification received.".to_string()
                }
                Err(err) => format!("Malformed request: {err}"),
            },
        };
        control.send(reply.as_str(), 0)?;
    }
}
