use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pupilnet_codec::Value;
use pupilnet_remote::{Ports, StreamStats, TelemetryMessage};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    topic: &'a str,
    norm_pos: Option<[f64; 2]>,
    confidence: Option<f64>,
    timestamp: Option<f64>,
    extra_frames: usize,
    payload: &'a Value,
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    command: &'a str,
    reply: &'a str,
}

pub fn print_ports(endpoint: &str, ports: &Ports, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(ports),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REMOTE", "SUB_PORT", "PUB_PORT"])
                .add_row(vec![
                    endpoint.to_string(),
                    ports.sub.to_string(),
                    ports.publish.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("remote={endpoint} sub={} pub={}", ports.sub, ports.publish);
        }
    }
}

pub fn print_reply(command: &str, reply: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReplyOutput { command, reply }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "REPLY"])
                .add_row(vec![command, reply]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{reply}"),
    }
}

pub fn print_messages(messages: &[TelemetryMessage], format: OutputFormat) {
    if messages.is_empty() {
        return;
    }
    match format {
        OutputFormat::Json => {
            for message in messages {
                let gaze = message.gaze();
                print_json(&MessageOutput {
                    topic: &message.topic,
                    norm_pos: gaze.norm_pos,
                    confidence: gaze.confidence,
                    timestamp: gaze.timestamp,
                    extra_frames: message.extra_frames.len(),
                    payload: &message.payload,
                });
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TOPIC", "NORM_POS", "CONFIDENCE", "TIMESTAMP"]);
            for message in messages {
                let gaze = message.gaze();
                table.add_row(vec![
                    message.topic.clone(),
                    gaze.norm_pos
                        .map(|[x, y]| format!("{x:.3}, {y:.3}"))
                        .unwrap_or_else(|| "-".to_string()),
                    gaze.confidence
                        .map(|c| format!("{c:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    gaze.timestamp
                        .map(|t| format!("{t:.3}"))
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for message in messages {
                println!("{}", pretty_line(message));
            }
        }
    }
}

pub fn print_stats(stats: &StreamStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "received={} malformed={} timeouts={}",
            stats.received, stats.malformed, stats.timeouts
        ),
    }
}

/// One line per message, missing gaze fields shown with their defaults.
fn pretty_line(message: &TelemetryMessage) -> String {
    let gaze = message.gaze();
    let [x, y] = gaze.norm_pos_or_default();
    format!(
        "{topic} norm_pos=({x:.3}, {y:.3}) confidence={c:.2} timestamp={t:.3}",
        topic = if message.topic.is_empty() {
            "-"
        } else {
            message.topic.as_str()
        },
        c = gaze.confidence_or_default(),
        t = gaze.timestamp_or_default(),
    )
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use pupilnet_codec::Map;

    use super::*;

    fn message(topic: &str, payload: Map) -> TelemetryMessage {
        TelemetryMessage {
            topic: topic.to_string(),
            payload: Value::Map(payload),
            received_at: Instant::now(),
            extra_frames: Vec::new(),
        }
    }

    #[test]
    fn pretty_line_shows_fields() {
        let payload: Map = [
            ("norm_pos", Value::from(vec![Value::from(0.25), Value::from(0.5)])),
            ("confidence", Value::from(0.9)),
            ("timestamp", Value::from(12.34)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            pretty_line(&message("gaze.0", payload)),
            "gaze.0 norm_pos=(0.250, 0.500) confidence=0.90 timestamp=12.340"
        );
    }

    #[test]
    fn pretty_line_uses_defaults_for_missing_fields() {
        assert_eq!(
            pretty_line(&message("", Map::new())),
            "- norm_pos=(0.500, 0.500) confidence=0.00 timestamp=0.000"
        );
    }

    #[test]
    fn json_message_keeps_unknown_fields_null() {
        let payload: Map = [("confidence", Value::from(0.5))].into_iter().collect();
        let msg = message("gaze.1", payload);
        let gaze = msg.gaze();
        let out = MessageOutput {
            topic: &msg.topic,
            norm_pos: gaze.norm_pos,
            confidence: gaze.confidence,
            timestamp: gaze.timestamp,
            extra_frames: 0,
            payload: &msg.payload,
        };
        let json: serde_json::Value = serde_json::to_value(&out).unwrap();
        assert_eq!(json["topic"], "gaze.1");
        assert!(json["norm_pos"].is_null());
        assert_eq!(json["confidence"], 0.5);
        assert_eq!(json["payload"]["confidence"], 0.5);
    }
}
