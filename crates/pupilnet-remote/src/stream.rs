use std::time::{Duration, Instant};

use pupilnet_codec::DecodeError;
use pupilnet_transport::{
    ContextLease, Endpoint, SharedContext, SubscribeOptions, SubscribeSocket, TopicFilter,
    Transport,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DrainPolicy;
use crate::error::{RemoteError, Result};
use crate::message::{RawMessage, TelemetryMessage};

/// Counters kept by a [`StreamingChannel`] across its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Messages decoded and returned.
    pub received: u64,
    /// Messages whose payload failed to decode.
    pub malformed: u64,
    /// Receive attempts that timed out without data.
    pub timeouts: u64,
}

struct Subscription<T: Transport> {
    // Declared before the lease so the socket always closes first.
    socket: T::Subscriber,
    lease: ContextLease<T>,
}

enum Received {
    Message(TelemetryMessage),
    Malformed { topic: String, error: DecodeError },
    Empty,
    Timeout,
}

/// Filtered, timeout-bounded receiver of telemetry messages.
///
/// Every receive attempt waits at most the configured receive timeout, so
/// [`drain`](StreamingChannel::drain) never stalls for longer than
/// `max_count × recv_timeout`.
pub struct StreamingChannel<T: Transport> {
    endpoint: Endpoint,
    options: SubscribeOptions,
    policy: DrainPolicy,
    subscription: Option<Subscription<T>>,
    stats: StreamStats,
}

impl<T: Transport> StreamingChannel<T> {
    /// Open a subscribe socket on `endpoint`, then lease `context`.
    pub fn open(
        context: &SharedContext<T>,
        endpoint: Endpoint,
        options: SubscribeOptions,
        policy: DrainPolicy,
    ) -> Result<Self> {
        let socket = context.transport().subscribe(&endpoint, &options)?;
        let lease = context.lease()?;
        debug!(
            endpoint = %endpoint,
            topics = ?options.topics,
            recv_hwm = options.recv_hwm,
            recv_timeout_ms = saturating_millis(options.recv_timeout),
            "streaming channel subscribed"
        );

        Ok(Self {
            endpoint,
            options,
            policy,
            subscription: Some(Subscription { socket, lease }),
            stats: StreamStats::default(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn topics(&self) -> &TopicFilter {
        &self.options.topics
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DrainPolicy) {
        self.policy = policy;
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Make one receive attempt.
    ///
    /// `Ok(None)` when the receive timed out (or an empty message arrived).
    /// A payload that fails to decode is returned as
    /// [`RemoteError::Decode`] regardless of the drain policy.
    pub fn receive_one(&mut self) -> Result<Option<TelemetryMessage>> {
        match self.receive()? {
            Received::Message(message) => Ok(Some(message)),
            Received::Malformed { error, .. } => Err(RemoteError::Decode(error)),
            Received::Empty | Received::Timeout => Ok(None),
        }
    }

    /// Collect up to `max_count` messages already queued.
    ///
    /// Makes at most `max_count` receive attempts and stops at the first
    /// timeout. Malformed payloads are handled per the drain policy; each
    /// still uses up one attempt. Transport errors always propagate.
    pub fn drain(&mut self, max_count: usize) -> Result<Vec<TelemetryMessage>> {
        if self.subscription.is_none() {
            return Err(RemoteError::NotConnected("streaming channel"));
        }

        let mut messages = Vec::new();
        for _ in 0..max_count {
            match self.receive()? {
                Received::Message(message) => messages.push(message),
                Received::Malformed { topic, error } => match self.policy {
                    DrainPolicy::SkipMalformed => {
                        warn!(topic = %topic, error = %error, "skipping malformed payload");
                    }
                    DrainPolicy::FailFast => return Err(RemoteError::Decode(error)),
                },
                Received::Empty => {}
                Received::Timeout => break,
            }
        }
        Ok(messages)
    }

    /// Close the socket and give back the context lease. No-op when closed.
    pub fn close(&mut self) {
        let Some(Subscription { socket, mut lease }) = self.subscription.take() else {
            return;
        };
        drop(socket);
        lease.release();
        debug!(endpoint = %self.endpoint, stats = ?self.stats, "streaming channel closed");
    }

    fn receive(&mut self) -> Result<Received> {
        let subscription = self
            .subscription
            .as_mut()
            .ok_or(RemoteError::NotConnected("streaming channel"))?;

        let Some(frames) = subscription.socket.recv_multipart()? else {
            self.stats.timeouts += 1;
            return Ok(Received::Timeout);
        };
        let received_at = Instant::now();

        let Some(raw) = RawMessage::from_frames(frames) else {
            return Ok(Received::Empty);
        };
        match raw.decode(received_at) {
            Ok(message) => {
                self.stats.received += 1;
                Ok(Received::Message(message))
            }
            Err((topic, error)) => {
                self.stats.malformed += 1;
                Ok(Received::Malformed { topic, error })
            }
        }
    }
}

impl<T: Transport> std::fmt::Debug for StreamingChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingChannel")
            .field("endpoint", &self.endpoint)
            .field("topics", &self.options.topics)
            .field("policy", &self.policy)
            .field("connected", &self.is_connected())
            .field("stats", &self.stats)
            .finish()
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
