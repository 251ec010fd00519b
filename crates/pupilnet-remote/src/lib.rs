//! Control and streaming channels for the pupil remote protocol.
//!
//! This is the "just works" layer. A [`Client`] connects the lock-step
//! control channel, discovers the streaming port, and hands out filtered
//! [`StreamingChannel`]s whose messages arrive decoded into
//! [`TelemetryMessage`]s.

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod message;
pub mod stream;

pub use client::Client;
pub use config::{ClientConfig, DrainPolicy, DEFAULT_HOST, DEFAULT_REQ_PORT};
pub use control::{ControlChannel, Ports, CMD_PUB_PORT, CMD_SUB_PORT, NOTIFY_PREFIX};
pub use error::{RemoteError, Result};
pub use message::{GazeDatum, TelemetryMessage};
pub use stream::{StreamStats, StreamingChannel};
