//! Client for the pupil remote eye-tracker protocol.
//!
//! pupilnet talks to an eye-tracking service over two sockets: a lock-step
//! request/reply control channel for port discovery, commands and
//! notifications, and a publish/subscribe stream of MessagePack-encoded
//! measurements.
//!
//! # Crate Structure
//!
//! - [`transport`]: Socket abstraction, ZeroMQ backend, shared context
//! - [`codec`]: MessagePack value model, decoder and encoder
//! - [`remote`]: Control channel, streaming channel and client (behind `remote` feature)
//!
//! ```no_run
//! # #[cfg(all(feature = "remote", feature = "zmq"))]
//! # fn main() -> Result<(), pupilnet::remote::RemoteError> {
//! use pupilnet::remote::Client;
//! use pupilnet::transport::TopicFilter;
//!
//! let mut client = Client::connect("127.0.0.1", 50020)?;
//! let mut gaze = client.create_streaming_channel(TopicFilter::prefixes(["gaze."]))?;
//! for message in gaze.drain(10)? {
//!     let datum = message.gaze();
//!     println!("{} {:?}", message.topic, datum.norm_pos_or_default());
//! }
//! gaze.close();
//! client.close();
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "remote", feature = "zmq")))]
//! # fn main() {}
//! ```

/// Re-export transport types.
pub mod transport {
    pub use pupilnet_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pupilnet_codec::*;
}

/// Re-export client types (requires `remote` feature).
#[cfg(feature = "remote")]
pub mod remote {
    pub use pupilnet_remote::*;
}
