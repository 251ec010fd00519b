use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// A `host:port` pair addressed over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp://{}:{}", self.host, self.port)
    }
}

/// Set of topic prefixes a subscriber receives.
///
/// An empty filter subscribes to everything. Matching is prefix matching on
/// the first frame of each message, which is what the publisher side
/// evaluates natively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    prefixes: Vec<String>,
}

impl TopicFilter {
    /// Filter that accepts every message.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter accepting messages whose topic starts with any of `prefixes`.
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for prefix in prefixes {
            let prefix = prefix.into();
            if !out.contains(&prefix) {
                out.push(prefix);
            }
        }
        Self { prefixes: out }
    }

    pub fn is_all(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// The subscriptions to install: one per prefix, or a single empty
    /// prefix meaning "everything".
    pub fn subscriptions(&self) -> Vec<&[u8]> {
        if self.prefixes.is_empty() {
            vec![b"".as_slice()]
        } else {
            self.prefixes.iter().map(|p| p.as_bytes()).collect()
        }
    }

    /// Whether a message whose first frame is `first_frame` passes the filter.
    pub fn matches(&self, first_frame: &[u8]) -> bool {
        self.subscriptions()
            .iter()
            .any(|prefix| first_frame.starts_with(prefix))
    }
}

/// Options for a request (lock-step) socket.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Receive timeout for replies. `None` blocks until a reply arrives.
    pub recv_timeout: Option<Duration>,
}

/// Options for a subscribe socket.
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Receive high-water-mark: maximum queued unread messages.
    pub recv_hwm: u32,
    /// Timeout for a single receive attempt.
    pub recv_timeout: Duration,
    /// Topic prefixes to subscribe to.
    pub topics: TopicFilter,
    /// Hint that payloads may be decoded on the fast path. Backends and the
    /// decoder currently ignore it.
    pub fast_decode: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            recv_hwm: 1000,
            recv_timeout: Duration::from_millis(50),
            topics: TopicFilter::all(),
            fast_decode: true,
        }
    }
}

/// A connected request socket: strictly one reply per request.
pub trait RequestSocket: Send {
    /// Send one frame.
    fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Block until exactly one reply frame arrives.
    fn recv(&mut self) -> Result<Bytes>;
}

/// A connected subscribe socket.
pub trait SubscribeSocket: Send {
    /// Attempt one multipart receive.
    ///
    /// Returns `Ok(None)` when the receive timeout elapses without data.
    fn recv_multipart(&mut self) -> Result<Option<Vec<Bytes>>>;
}

/// A transport context able to open sockets.
///
/// Implementations are shared through [`crate::SharedContext`]; sockets are
/// always closed before the context is terminated.
pub trait Transport: Send + Sync {
    type Request: RequestSocket;
    type Subscriber: SubscribeSocket;

    /// Open a request socket connected to `endpoint`. Linger is always zero.
    fn request(&self, endpoint: &Endpoint, options: &RequestOptions) -> Result<Self::Request>;

    /// Open a subscribe socket connected to `endpoint` with the filter applied.
    fn subscribe(
        &self,
        endpoint: &Endpoint,
        options: &SubscribeOptions,
    ) -> Result<Self::Subscriber>;

    /// Release the context itself. Called once, after the last socket closed.
    fn terminate(&self) {}

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_is_tcp_url() {
        assert_eq!(
            Endpoint::new("127.0.0.1", 50020).to_string(),
            "tcp://127.0.0.1:50020"
        );
    }

    #[test]
    fn empty_filter_subscribes_to_everything() {
        let filter = TopicFilter::all();
        assert!(filter.is_all());
        assert_eq!(filter.subscriptions(), vec![b"".as_slice()]);
        assert!(filter.matches(b"blink.0"));
        assert!(filter.matches(b""));
    }

    #[test]
    fn prefix_filter_matches_prefixes_only() {
        let filter = TopicFilter::prefixes(["gaze.", "pupil.0"]);
        assert!(filter.matches(b"gaze.3d.01."));
        assert!(filter.matches(b"pupil.0.2d"));
        assert!(!filter.matches(b"blink.0"));
        assert!(!filter.matches(b"xgaze."));
        assert!(!filter.matches(b"pupil.1"));
    }

    #[test]
    fn duplicate_prefixes_collapse() {
        let filter = TopicFilter::prefixes(["gaze.", "gaze."]);
        assert_eq!(filter.subscriptions().len(), 1);
    }
}
