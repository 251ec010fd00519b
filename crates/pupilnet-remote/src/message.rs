use std::time::Instant;

use bytes::Bytes;
use pupilnet_codec::{decode, DecodeError, Value};
use serde::Serialize;

/// One decoded message from a streaming channel.
#[derive(Debug, Clone)]
pub struct TelemetryMessage {
    /// Topic frame as text. Empty for single-frame messages.
    pub topic: String,
    /// Decoded payload, normally a map.
    pub payload: Value,
    /// Monotonic receipt time, taken right after the receive returned.
    pub received_at: Instant,
    /// Raw frames following the payload frame (e.g. image buffers).
    pub extra_frames: Vec<Bytes>,
}

impl TelemetryMessage {
    /// Payload field `key`, if the payload is a map holding it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Typed view of the gaze fields.
    pub fn gaze(&self) -> GazeDatum {
        GazeDatum::from_value(&self.payload)
    }
}

/// Frames of a received message, split but not yet decoded.
pub(crate) struct RawMessage {
    pub topic: String,
    pub payload: Bytes,
    pub extra_frames: Vec<Bytes>,
}

impl RawMessage {
    /// Split a multipart message. `None` for an empty message.
    pub fn from_frames(frames: Vec<Bytes>) -> Option<Self> {
        let mut frames = frames.into_iter();
        let first = frames.next()?;
        match frames.next() {
            None => Some(Self {
                topic: String::new(),
                payload: first,
                extra_frames: Vec::new(),
            }),
            Some(payload) => Some(Self {
                topic: String::from_utf8_lossy(&first).into_owned(),
                payload,
                extra_frames: frames.collect(),
            }),
        }
    }

    /// Decode the payload. On failure the topic is returned with the error.
    pub fn decode(
        self,
        received_at: Instant,
    ) -> std::result::Result<TelemetryMessage, (String, DecodeError)> {
        match decode(&self.payload) {
            Ok(payload) => Ok(TelemetryMessage {
                topic: self.topic,
                payload,
                received_at,
                extra_frames: self.extra_frames,
            }),
            Err(err) => Err((self.topic, err)),
        }
    }
}

/// Gaze fields of a telemetry payload.
///
/// A field that is missing or has the wrong shape is `None`; consumers that
/// need a value use the `*_or_default` accessors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GazeDatum {
    /// Normalized position, `[x, y]`.
    pub norm_pos: Option<[f64; 2]>,
    pub confidence: Option<f64>,
    pub timestamp: Option<f64>,
}

impl GazeDatum {
    /// Position used when none was reported: the center of the frame.
    pub const DEFAULT_NORM_POS: [f64; 2] = [0.5, 0.5];

    pub fn from_value(payload: &Value) -> Self {
        let norm_pos = payload
            .get("norm_pos")
            .and_then(Value::as_array)
            .and_then(|items| match items {
                [x, y] => Some([x.as_f64()?, y.as_f64()?]),
                _ => None,
            });

        Self {
            norm_pos,
            confidence: payload.get("confidence").and_then(Value::as_f64),
            timestamp: payload.get("timestamp").and_then(Value::as_f64),
        }
    }

    pub fn norm_pos_or_default(&self) -> [f64; 2] {
        self.norm_pos.unwrap_or(Self::DEFAULT_NORM_POS)
    }

    pub fn confidence_or_default(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn timestamp_or_default(&self) -> f64 {
        self.timestamp.unwrap_or(0.0)
    }
}

impl From<&TelemetryMessage> for GazeDatum {
    fn from(message: &TelemetryMessage) -> Self {
        message.gaze()
    }
}
