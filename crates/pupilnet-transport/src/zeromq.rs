use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{
    Endpoint, RequestOptions, RequestSocket, SubscribeOptions, SubscribeSocket, Transport,
};

/// ZeroMQ transport backed by a `zmq::Context`.
///
/// Request sockets are `REQ`, subscribe sockets are `SUB`. Every socket is
/// created with `LINGER=0` so closing never waits on unsent data.
pub struct ZmqTransport {
    context: Mutex<Option<zmq::Context>>,
}

impl ZmqTransport {
    pub fn new() -> Self {
        Self {
            context: Mutex::new(Some(zmq::Context::new())),
        }
    }

    fn socket(&self, kind: zmq::SocketType, endpoint: &Endpoint) -> Result<zmq::Socket> {
        let guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        let context = guard.as_ref().ok_or(TransportError::ContextTerminated)?;
        context
            .socket(kind)
            .map_err(|err| connect_error(endpoint, err))
    }
}

impl Default for ZmqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ZmqTransport {
    type Request = ZmqRequest;
    type Subscriber = ZmqSubscriber;

    fn request(&self, endpoint: &Endpoint, options: &RequestOptions) -> Result<ZmqRequest> {
        let socket = self.socket(zmq::REQ, endpoint)?;
        socket
            .set_linger(0)
            .map_err(|err| configure_error("ZMQ_LINGER", err))?;
        socket
            .set_rcvtimeo(timeout_millis(options.recv_timeout))
            .map_err(|err| configure_error("ZMQ_RCVTIMEO", err))?;

        let url = endpoint.to_string();
        socket
            .connect(&url)
            .map_err(|err| connect_error(endpoint, err))?;
        debug!(endpoint = %url, "connected request socket");

        Ok(ZmqRequest {
            socket,
            recv_timeout: options.recv_timeout,
        })
    }

    fn subscribe(&self, endpoint: &Endpoint, options: &SubscribeOptions) -> Result<ZmqSubscriber> {
        let socket = self.socket(zmq::SUB, endpoint)?;
        socket
            .set_linger(0)
            .map_err(|err| configure_error("ZMQ_LINGER", err))?;
        socket
            .set_rcvhwm(i32::try_from(options.recv_hwm).unwrap_or(i32::MAX))
            .map_err(|err| configure_error("ZMQ_RCVHWM", err))?;
        socket
            .set_rcvtimeo(timeout_millis(Some(options.recv_timeout)))
            .map_err(|err| configure_error("ZMQ_RCVTIMEO", err))?;

        let url = endpoint.to_string();
        socket
            .connect(&url)
            .map_err(|err| connect_error(endpoint, err))?;

        for prefix in options.topics.subscriptions() {
            socket
                .set_subscribe(prefix)
                .map_err(|err| configure_error("ZMQ_SUBSCRIBE", err))?;
        }
        debug!(
            endpoint = %url,
            topics = ?options.topics,
            hwm = options.recv_hwm,
            "connected subscribe socket"
        );

        Ok(ZmqSubscriber { socket })
    }

    fn terminate(&self) {
        let mut guard = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        // Sockets keep their own handle on the context; dropping ours lets
        // libzmq terminate once the last socket is gone.
        guard.take();
    }

    fn transport_name(&self) -> &'static str {
        "zeromq"
    }
}

/// A connected ZeroMQ `REQ` socket.
pub struct ZmqRequest {
    socket: zmq::Socket,
    recv_timeout: Option<Duration>,
}

impl RequestSocket for ZmqRequest {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.socket.send(frame, 0).map_err(io_error)
    }

    fn recv(&mut self) -> Result<Bytes> {
        match self.socket.recv_bytes(0) {
            Ok(frame) => Ok(Bytes::from(frame)),
            Err(zmq::Error::EAGAIN) => {
                Err(TransportError::Timeout(self.recv_timeout.unwrap_or_default()))
            }
            Err(err) => Err(io_error(err)),
        }
    }
}

/// A connected ZeroMQ `SUB` socket.
pub struct ZmqSubscriber {
    socket: zmq::Socket,
}

impl SubscribeSocket for ZmqSubscriber {
    fn recv_multipart(&mut self) -> Result<Option<Vec<Bytes>>> {
        match self.socket.recv_multipart(0) {
            Ok(frames) => Ok(Some(frames.into_iter().map(Bytes::from).collect())),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(err) => Err(io_error(err)),
        }
    }
}

/// Version of the linked libzmq as `(major, minor, patch)`.
pub fn library_version() -> (i32, i32, i32) {
    zmq::version()
}

fn timeout_millis(timeout: Option<Duration>) -> i32 {
    match timeout {
        Some(timeout) => i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX),
        None => -1,
    }
}

fn io_error(err: zmq::Error) -> TransportError {
    match err {
        zmq::Error::ETERM => TransportError::Shutdown,
        other => TransportError::Io(std::io::Error::other(other)),
    }
}

fn connect_error(endpoint: &Endpoint, err: zmq::Error) -> TransportError {
    match err {
        zmq::Error::ETERM => TransportError::ContextTerminated,
        other => TransportError::Connect {
            endpoint: endpoint.to_string(),
            source: std::io::Error::other(other),
        },
    }
}

fn configure_error(option: &'static str, err: zmq::Error) -> TransportError {
    TransportError::Configure {
        option,
        source: std::io::Error::other(err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::traits::TopicFilter;

    fn bind_loopback(ctx: &zmq::Context, kind: zmq::SocketType) -> (zmq::Socket, u16) {
        let socket = ctx.socket(kind).unwrap();
        socket.set_linger(0).unwrap();
        socket.bind("tcp://127.0.0.1:*").unwrap();
        let last = socket.get_last_endpoint().unwrap().unwrap();
        let port = last.rsplit(':').next().unwrap().parse().unwrap();
        (socket, port)
    }

    #[test]
    fn request_reply_roundtrip() {
        let server_ctx = zmq::Context::new();
        let (rep, port) = bind_loopback(&server_ctx, zmq::REP);

        let server = std::thread::spawn(move || {
            let request = rep.recv_bytes(0).unwrap();
            assert_eq!(request, b"SUB_PORT");
            rep.send("50021", 0).unwrap();
        });

        let transport = ZmqTransport::new();
        let mut req = transport
            .request(&Endpoint::new("127.0.0.1", port), &RequestOptions::default())
            .unwrap();
        req.send(b"SUB_PORT").unwrap();
        assert_eq!(req.recv().unwrap().as_ref(), b"50021");

        server.join().unwrap();
    }

    #[test]
    fn request_timeout_surfaces_as_timeout() {
        let server_ctx = zmq::Context::new();
        let (_rep, port) = bind_loopback(&server_ctx, zmq::REP);

        let transport = ZmqTransport::new();
        let options = RequestOptions {
            recv_timeout: Some(Duration::from_millis(20)),
        };
        let mut req = transport
            .request(&Endpoint::new("127.0.0.1", port), &options)
            .unwrap();
        req.send(b"PUB_PORT").unwrap();
        assert!(matches!(req.recv(), Err(TransportError::Timeout(_))));
    }

    #[test]
    fn subscriber_times_out_without_data() {
        let server_ctx = zmq::Context::new();
        let (_publisher, port) = bind_loopback(&server_ctx, zmq::PUB);

        let transport = ZmqTransport::new();
        let options = SubscribeOptions {
            recv_timeout: Duration::from_millis(10),
            ..SubscribeOptions::default()
        };
        let mut sub = transport
            .subscribe(&Endpoint::new("127.0.0.1", port), &options)
            .unwrap();
        assert!(sub.recv_multipart().unwrap().is_none());
    }

    #[test]
    fn subscriber_applies_prefix_filter() {
        let server_ctx = zmq::Context::new();
        let (publisher, port) = bind_loopback(&server_ctx, zmq::PUB);

        let transport = ZmqTransport::new();
        let options = SubscribeOptions {
            recv_timeout: Duration::from_millis(20),
            topics: TopicFilter::prefixes(["gaze."]),
            ..SubscribeOptions::default()
        };
        let mut sub = transport
            .subscribe(&Endpoint::new("127.0.0.1", port), &options)
            .unwrap();

        // PUB/SUB joins asynchronously; keep publishing until the
        // subscription has propagated.
        let deadline = Instant::now() + Duration::from_secs(5);
        let frames = loop {
            assert!(Instant::now() < deadline, "no message delivered");
            publisher.send("blink.0", zmq::SNDMORE).unwrap();
            publisher.send(&b"\x80"[..], 0).unwrap();
            publisher.send("gaze.0", zmq::SNDMORE).unwrap();
            publisher.send(&b"\x80"[..], 0).unwrap();
            if let Some(frames) = sub.recv_multipart().unwrap() {
                break frames;
            }
        };

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref(), b"gaze.0");
        assert_eq!(frames[1].as_ref(), b"\x80");
    }

    #[test]
    fn terminated_context_rejects_new_sockets() {
        let transport = ZmqTransport::new();
        transport.terminate();
        let result = transport.request(&Endpoint::new("127.0.0.1", 1), &RequestOptions::default());
        assert!(matches!(result, Err(TransportError::ContextTerminated)));
    }
}
