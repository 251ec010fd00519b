//! Socket transport abstraction for the pupil remote protocol.
//!
//! Two socket shapes are needed:
//! - a lock-step request socket for the control channel
//! - a filtered, timeout-bounded subscribe socket for the telemetry stream
//!
//! This is the lowest layer of pupilnet. Sockets are opened from a
//! [`Transport`] shared through a lease-counted [`SharedContext`]. The
//! ZeroMQ backend lives behind the `zmq` feature (on by default); the
//! in-memory [`mock`] backend behind the `mock` feature.

pub mod context;
pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(feature = "zmq")]
pub mod zeromq;

pub use context::{ContextLease, SharedContext};
pub use error::{Result, TransportError};
pub use traits::{
    Endpoint, RequestOptions, RequestSocket, SubscribeOptions, SubscribeSocket, TopicFilter,
    Transport,
};

#[cfg(feature = "zmq")]
pub use zeromq::{ZmqRequest, ZmqSubscriber, ZmqTransport};
