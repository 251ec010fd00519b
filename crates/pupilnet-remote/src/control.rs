use bytes::Bytes;
use pupilnet_codec::{encode_notification, Map, Value};
use pupilnet_transport::{
    ContextLease, Endpoint, RequestOptions, RequestSocket, SharedContext, Transport,
};
use serde::Serialize;
use tracing::debug;

use crate::error::{RemoteError, Result};

/// Command answered with the streaming (publish side) port.
pub const CMD_SUB_PORT: &str = "SUB_PORT";
/// Command answered with the port accepting published messages.
pub const CMD_PUB_PORT: &str = "PUB_PORT";
/// Topic prefix of notifications.
pub const NOTIFY_PREFIX: &str = "notify.";

/// Ports reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ports {
    /// Port to subscribe to for telemetry.
    pub sub: u16,
    /// Port accepting published messages.
    #[serde(rename = "pub")]
    pub publish: u16,
}

struct Connection<T: Transport> {
    // Declared before the lease so the socket always closes first.
    socket: T::Request,
    lease: ContextLease<T>,
    awaiting_reply: bool,
}

/// Lock-step request/reply channel to the control port.
///
/// Every request is followed by exactly one reply. A request whose reply
/// never arrived (timeout, transport error) poisons the connection: the
/// next request fails with [`RemoteError::ProtocolViolation`] until the
/// channel is [reset](ControlChannel::reset).
pub struct ControlChannel<T: Transport> {
    context: SharedContext<T>,
    endpoint: Endpoint,
    options: RequestOptions,
    connection: Option<Connection<T>>,
}

impl<T: Transport> ControlChannel<T> {
    /// Create an unconnected channel.
    pub fn new(context: SharedContext<T>, endpoint: Endpoint, options: RequestOptions) -> Self {
        Self {
            context,
            endpoint,
            options,
            connection: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether a request is still waiting for its reply.
    pub fn is_awaiting_reply(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.awaiting_reply)
    }

    /// Open the request socket. No-op when already connected.
    ///
    /// The context is leased only once the socket is open, so a failed
    /// connect leaves the context untouched and can be retried.
    pub fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let socket = self
            .context
            .transport()
            .request(&self.endpoint, &self.options)?;
        let lease = self.context.lease()?;
        debug!(endpoint = %self.endpoint, "control channel connected");

        self.connection = Some(Connection {
            socket,
            lease,
            awaiting_reply: false,
        });
        Ok(())
    }

    /// Close the socket and give back the context lease. No-op when
    /// unconnected.
    pub fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let Connection {
            socket, mut lease, ..
        } = connection;
        drop(socket);
        lease.release();
        debug!(endpoint = %self.endpoint, "control channel closed");
    }

    /// Close and reconnect, discarding any outstanding request.
    ///
    /// The replacement socket is opened first and takes over the existing
    /// lease. If it cannot be opened the current connection is kept as it
    /// was (still awaiting its reply), so the reset can be retried.
    pub fn reset(&mut self) -> Result<()> {
        if self.connection.is_none() {
            return self.connect();
        }

        let socket = match self.context.transport().request(&self.endpoint, &self.options) {
            Ok(socket) => socket,
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "control channel reset failed");
                return Err(err.into());
            }
        };
        if let Some(connection) = self.connection.as_mut() {
            connection.socket = socket;
            connection.awaiting_reply = false;
        }
        debug!(endpoint = %self.endpoint, "control channel reset");
        Ok(())
    }

    /// Send a text command and return the text reply.
    pub fn send_command(&mut self, command: &str) -> Result<String> {
        let reply = self.request(command.as_bytes())?;
        String::from_utf8(reply.to_vec()).map_err(|err| RemoteError::Parse {
            command: command.to_string(),
            reply: String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }

    /// Port to subscribe to for telemetry.
    pub fn get_sub_port(&mut self) -> Result<u16> {
        self.query_port(CMD_SUB_PORT)
    }

    /// Port accepting published messages.
    pub fn get_pub_port(&mut self) -> Result<u16> {
        self.query_port(CMD_PUB_PORT)
    }

    /// Query both ports, SUB first.
    pub fn discover_ports(&mut self) -> Result<Ports> {
        let sub = self.get_sub_port()?;
        let publish = self.get_pub_port()?;
        Ok(Ports { sub, publish })
    }

    /// Send a notification record.
    ///
    /// The topic is `notify.<subject>`, where subject is the record's
    /// `"subject"` string (empty if missing or not a string). The reply is
    /// awaited and discarded.
    pub fn send_notification(&mut self, record: &Map) -> Result<()> {
        if self.connection.is_none() {
            return Err(RemoteError::NotConnected("control channel"));
        }

        let subject = record.get("subject").and_then(Value::as_str).unwrap_or("");
        let topic = format!("{NOTIFY_PREFIX}{subject}");
        let payload = encode_notification(&topic, record)?;

        self.request(&payload)?;
        debug!(topic = %topic, bytes = payload.len(), "notification sent");
        Ok(())
    }

    fn query_port(&mut self, command: &str) -> Result<u16> {
        let reply = self.send_command(command)?;
        reply.trim().parse::<u16>().map_err(|_| RemoteError::Parse {
            command: command.to_string(),
            reply,
        })
    }

    fn request(&mut self, frame: &[u8]) -> Result<Bytes> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(RemoteError::NotConnected("control channel"))?;

        if connection.awaiting_reply {
            return Err(RemoteError::ProtocolViolation(
                "previous request has no reply yet; reset the control channel".to_string(),
            ));
        }

        connection.socket.send(frame)?;
        connection.awaiting_reply = true;
        let reply = connection.socket.recv()?;
        connection.awaiting_reply = false;
        Ok(reply)
    }
}

impl<T: Transport> std::fmt::Debug for ControlChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .field("awaiting_reply", &self.is_awaiting_reply())
            .finish()
    }
}
