//! MessagePack value model and codec for pupil remote payloads.
//!
//! Telemetry payloads and notification records are self-describing
//! MessagePack documents. This crate decodes them into a dynamic [`Value`]
//! tree and encodes values back out.
//!
//! Decoding is strict: one complete value per input, string keys only,
//! no extension types, bounded nesting. Errors carry the byte offset where
//! decoding stopped.

pub mod decode;
pub mod encode;
pub mod error;
pub mod value;

pub use decode::{decode, MAX_DEPTH};
pub use encode::{encode, encode_notification};
pub use error::{DecodeError, EncodeError, Result};
pub use value::{Map, Value};
