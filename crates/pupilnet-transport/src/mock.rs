//! In-memory transport for tests.
//!
//! A [`MockTransport`] plays the remote end: request sockets consume
//! scripted replies, and [`MockTransport::publish`] fans a message out to
//! every open subscriber whose topic filter accepts it. Subscribers drop new
//! messages once their high-water-mark is reached, as a `SUB` socket does.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::traits::{
    Endpoint, RequestOptions, RequestSocket, SubscribeOptions, SubscribeSocket, TopicFilter,
    Transport,
};

/// Scripted outcome of one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Reply with this frame.
    Frame(Bytes),
    /// Never reply; the receive times out.
    Timeout,
    /// The remote goes away mid-request.
    Disconnect,
}

impl MockReply {
    pub fn text(reply: &str) -> Self {
        Self::Frame(Bytes::copy_from_slice(reply.as_bytes()))
    }
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<MockReply>,
    sent: Vec<Bytes>,
    connects: Vec<String>,
    subscribers: Vec<SubscriberSlot>,
    open_requests: usize,
    recv_attempts: usize,
    terminations: usize,
    terminated: bool,
    fail_connect: bool,
}

struct SubscriberSlot {
    topics: TopicFilter,
    hwm: usize,
    queue: VecDeque<Vec<Bytes>>,
    dropped: usize,
    open: bool,
}

/// Cloneable handle on a shared in-memory remote.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the reply for the next request.
    pub fn push_reply(&self, reply: MockReply) {
        self.state().replies.push_back(reply);
    }

    /// Queue a text reply for the next request.
    pub fn push_text_reply(&self, reply: &str) {
        self.push_reply(MockReply::text(reply));
    }

    /// Make subsequent socket opens fail with a connect error.
    pub fn fail_connects(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    /// Publish one multipart message to all matching subscribers.
    ///
    /// Returns how many subscribers queued it.
    pub fn publish(&self, frames: Vec<Bytes>) -> usize {
        let first = frames.first().cloned().unwrap_or_default();
        let mut state = self.state();
        let mut delivered = 0;
        for slot in state.subscribers.iter_mut().filter(|s| s.open) {
            if !slot.topics.matches(&first) {
                continue;
            }
            if slot.queue.len() >= slot.hwm {
                slot.dropped += 1;
                continue;
            }
            slot.queue.push_back(frames.clone());
            delivered += 1;
        }
        delivered
    }

    /// Publish a two-frame `topic` + `payload` message.
    pub fn publish_topic(&self, topic: &str, payload: &[u8]) -> usize {
        self.publish(vec![
            Bytes::copy_from_slice(topic.as_bytes()),
            Bytes::copy_from_slice(payload),
        ])
    }

    /// Frames sent by request sockets, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.state().sent.clone()
    }

    /// Endpoints sockets were connected to, in order.
    pub fn connects(&self) -> Vec<String> {
        self.state().connects.clone()
    }

    /// Total receive attempts made by all subscribers.
    pub fn recv_attempts(&self) -> usize {
        self.state().recv_attempts
    }

    /// Messages dropped because a subscriber queue was full.
    pub fn dropped(&self) -> usize {
        self.state().subscribers.iter().map(|s| s.dropped).sum()
    }

    pub fn open_requests(&self) -> usize {
        self.state().open_requests
    }

    pub fn open_subscribers(&self) -> usize {
        self.state().subscribers.iter().filter(|s| s.open).count()
    }

    /// How many times the context was terminated.
    pub fn terminations(&self) -> usize {
        self.state().terminations
    }

    fn check_open(&self, endpoint: &Endpoint) -> Result<()> {
        let mut state = self.state();
        if state.terminated {
            return Err(TransportError::ContextTerminated);
        }
        if state.fail_connect {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }
        state.connects.push(endpoint.to_string());
        Ok(())
    }
}

impl Transport for MockTransport {
    type Request = MockRequest;
    type Subscriber = MockSubscriber;

    fn request(&self, endpoint: &Endpoint, options: &RequestOptions) -> Result<MockRequest> {
        self.check_open(endpoint)?;
        self.state().open_requests += 1;
        Ok(MockRequest {
            remote: self.clone(),
            recv_timeout: options.recv_timeout,
            awaiting_reply: false,
        })
    }

    fn subscribe(&self, endpoint: &Endpoint, options: &SubscribeOptions) -> Result<MockSubscriber> {
        self.check_open(endpoint)?;
        let mut state = self.state();
        state.subscribers.push(SubscriberSlot {
            topics: options.topics.clone(),
            hwm: usize::try_from(options.recv_hwm).unwrap_or(usize::MAX),
            queue: VecDeque::new(),
            dropped: 0,
            open: true,
        });
        let slot = state.subscribers.len() - 1;
        Ok(MockSubscriber {
            remote: self.clone(),
            slot,
        })
    }

    fn terminate(&self) {
        let mut state = self.state();
        state.terminated = true;
        state.terminations += 1;
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

/// Request socket backed by a [`MockTransport`].
pub struct MockRequest {
    remote: MockTransport,
    recv_timeout: Option<Duration>,
    awaiting_reply: bool,
}

impl RequestSocket for MockRequest {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        if self.awaiting_reply {
            // A REQ socket refuses a second send before the reply (EFSM).
            return Err(TransportError::Io(std::io::Error::other(
                "operation cannot be accomplished in current state",
            )));
        }
        self.remote
            .state()
            .sent
            .push(Bytes::copy_from_slice(frame));
        self.awaiting_reply = true;
        Ok(())
    }

    fn recv(&mut self) -> Result<Bytes> {
        let reply = self.remote.state().replies.pop_front();
        match reply {
            Some(MockReply::Frame(frame)) => {
                self.awaiting_reply = false;
                Ok(frame)
            }
            Some(MockReply::Disconnect) => Err(TransportError::Shutdown),
            Some(MockReply::Timeout) | None => {
                Err(TransportError::Timeout(self.recv_timeout.unwrap_or_default()))
            }
        }
    }
}

impl Drop for MockRequest {
    fn drop(&mut self) {
        let mut state = self.remote.state();
        state.open_requests = state.open_requests.saturating_sub(1);
    }
}

/// Subscribe socket backed by a [`MockTransport`].
pub struct MockSubscriber {
    remote: MockTransport,
    slot: usize,
}

impl SubscribeSocket for MockSubscriber {
    fn recv_multipart(&mut self) -> Result<Option<Vec<Bytes>>> {
        let mut state = self.remote.state();
        state.recv_attempts += 1;
        if state.terminated {
            return Err(TransportError::Shutdown);
        }
        Ok(state
            .subscribers
            .get_mut(self.slot)
            .and_then(|slot| slot.queue.pop_front()))
    }
}

impl Drop for MockSubscriber {
    fn drop(&mut self) {
        let mut state = self.remote.state();
        if let Some(slot) = state.subscribers.get_mut(self.slot) {
            slot.open = false;
            slot.queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscribe(mock: &MockTransport, topics: TopicFilter, hwm: u32) -> MockSubscriber {
        let options = SubscribeOptions {
            recv_hwm: hwm,
            topics,
            ..SubscribeOptions::default()
        };
        mock.subscribe(&Endpoint::new("127.0.0.1", 50021), &options)
            .unwrap()
    }

    #[test]
    fn scripted_replies_in_order() {
        let mock = MockTransport::new();
        mock.push_text_reply("50021");
        mock.push_text_reply("50022");

        let mut req = mock
            .request(&Endpoint::new("127.0.0.1", 50020), &RequestOptions::default())
            .unwrap();
        req.send(b"SUB_PORT").unwrap();
        assert_eq!(req.recv().unwrap().as_ref(), b"50021");
        req.send(b"PUB_PORT").unwrap();
        assert_eq!(req.recv().unwrap().as_ref(), b"50022");

        assert_eq!(
            mock.sent(),
            vec![Bytes::from_static(b"SUB_PORT"), Bytes::from_static(b"PUB_PORT")]
        );
        assert_eq!(mock.connects(), vec!["tcp://127.0.0.1:50020".to_string()]);
    }

    #[test]
    fn request_refuses_second_send() {
        let mock = MockTransport::new();
        let mut req = mock
            .request(&Endpoint::new("127.0.0.1", 50020), &RequestOptions::default())
            .unwrap();
        req.send(b"SUB_PORT").unwrap();
        assert!(req.send(b"SUB_PORT").is_err());
    }

    #[test]
    fn publish_respects_prefix_filter() {
        let mock = MockTransport::new();
        let mut sub = subscribe(&mock, TopicFilter::prefixes(["gaze."]), 10);

        assert_eq!(mock.publish_topic("blink.0", b"\x80"), 0);
        assert_eq!(mock.publish_topic("gaze.0", b"\x80"), 1);

        let frames = sub.recv_multipart().unwrap().unwrap();
        assert_eq!(frames[0].as_ref(), b"gaze.0");
        assert!(sub.recv_multipart().unwrap().is_none());
        assert_eq!(mock.recv_attempts(), 2);
    }

    #[test]
    fn publish_drops_beyond_hwm() {
        let mock = MockTransport::new();
        let mut sub = subscribe(&mock, TopicFilter::all(), 2);

        for i in 0..5 {
            mock.publish_topic(&format!("gaze.{i}"), b"\x80");
        }
        assert_eq!(mock.dropped(), 3);

        let first = sub.recv_multipart().unwrap().unwrap();
        assert_eq!(first[0].as_ref(), b"gaze.0");
    }

    #[test]
    fn closed_subscriber_stops_receiving() {
        let mock = MockTransport::new();
        let sub = subscribe(&mock, TopicFilter::all(), 10);
        assert_eq!(mock.open_subscribers(), 1);
        drop(sub);
        assert_eq!(mock.open_subscribers(), 0);
        assert_eq!(mock.publish_topic("gaze.0", b"\x80"), 0);
    }

    #[test]
    fn terminated_mock_rejects_sockets() {
        let mock = MockTransport::new();
        mock.terminate();
        let result = mock.request(&Endpoint::new("127.0.0.1", 50020), &RequestOptions::default());
        assert!(matches!(result, Err(TransportError::ContextTerminated)));
    }
}
