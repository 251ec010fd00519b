use pupilnet_codec::Map;
use pupilnet_transport::{Endpoint, SharedContext, TopicFilter, Transport};
use tracing::debug;

use crate::config::ClientConfig;
use crate::control::{ControlChannel, Ports};
use crate::error::Result;
use crate::stream::StreamingChannel;

/// Connected client of a remote service.
///
/// Owns the control channel and the shared transport context. Streaming
/// channels created from it share the context and belong to the caller;
/// the context is torn down once the client and every streaming channel
/// are closed (or dropped), whichever order that happens in.
pub struct Client<T: Transport> {
    config: ClientConfig,
    context: SharedContext<T>,
    control: ControlChannel<T>,
}

#[cfg(feature = "zmq")]
impl Client<pupilnet_transport::ZmqTransport> {
    /// Connect to the control port at `host:req_port` over ZeroMQ.
    pub fn connect(host: impl Into<String>, req_port: u16) -> Result<Self> {
        Self::connect_with_config(ClientConfig::new(host, req_port))
    }

    /// Connect over ZeroMQ with explicit configuration.
    pub fn connect_with_config(config: ClientConfig) -> Result<Self> {
        Self::with_transport(pupilnet_transport::ZmqTransport::new(), config)
    }
}

impl<T: Transport> Client<T> {
    /// Connect the control channel through `transport`.
    pub fn with_transport(transport: T, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let context = SharedContext::new(transport);
        let mut control = ControlChannel::new(
            context.clone(),
            config.control_endpoint(),
            config.request_options(),
        );
        control.connect()?;
        debug!(
            endpoint = %control.endpoint(),
            transport = context.transport().transport_name(),
            "client connected"
        );

        Ok(Self {
            config,
            context,
            control,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    /// The control channel, for operations not mirrored on the client.
    pub fn control(&mut self) -> &mut ControlChannel<T> {
        &mut self.control
    }

    /// Discover the streaming port and subscribe to `topics` there.
    pub fn create_streaming_channel(
        &mut self,
        topics: TopicFilter,
    ) -> Result<StreamingChannel<T>> {
        let port = self.control.get_sub_port()?;
        let endpoint = Endpoint::new(self.config.host.clone(), port);
        StreamingChannel::open(
            &self.context,
            endpoint,
            self.config.subscribe_options(topics),
            self.config.drain_policy,
        )
    }

    pub fn sub_port(&mut self) -> Result<u16> {
        self.control.get_sub_port()
    }

    pub fn pub_port(&mut self) -> Result<u16> {
        self.control.get_pub_port()
    }

    pub fn ports(&mut self) -> Result<Ports> {
        self.control.discover_ports()
    }

    pub fn send_command(&mut self, command: &str) -> Result<String> {
        self.control.send_command(command)
    }

    pub fn send_notification(&mut self, record: &Map) -> Result<()> {
        self.control.send_notification(record)
    }

    /// Close the control channel.
    ///
    /// Streaming channels created earlier keep working until they are
    /// closed themselves.
    pub fn close(&mut self) {
        self.control.close();
        debug!(
            remaining_leases = self.context.active_leases(),
            "client closed"
        );
    }
}

impl<T: Transport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("control", &self.control)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pupilnet_codec::{encode, Value};
    use pupilnet_transport::mock::MockTransport;
    use pupilnet_transport::TransportError;

    use super::*;
    use crate::error::RemoteError;

    fn client(mock: &MockTransport) -> Client<MockTransport> {
        Client::with_transport(mock.clone(), ClientConfig::default()).unwrap()
    }

    fn gaze_payload() -> Vec<u8> {
        let map: Map = [
            ("norm_pos", Value::from(vec![Value::from(0.25), Value::from(0.75)])),
            ("confidence", Value::from(0.95)),
            ("timestamp", Value::from(100.5)),
        ]
        .into_iter()
        .collect();
        encode(&Value::Map(map)).unwrap()
    }

    #[test]
    fn connect_opens_control_channel() {
        let mock = MockTransport::new();
        let client = client(&mock);
        assert!(client.is_connected());
        assert_eq!(mock.connects(), vec!["tcp://127.0.0.1:50020".to_string()]);
    }

    #[test]
    fn invalid_config_is_rejected_before_connecting() {
        let mock = MockTransport::new();
        let config = ClientConfig::new("", 50020);
        let err = Client::with_transport(mock.clone(), config).unwrap_err();
        assert!(matches!(err, RemoteError::Config(_)));
        assert!(mock.connects().is_empty());
    }

    #[test]
    fn streaming_channel_uses_discovered_port() {
        let mock = MockTransport::new();
        mock.push_text_reply("50021");
        let mut client = client(&mock);

        let mut stream = client
            .create_streaming_channel(TopicFilter::prefixes(["gaze."]))
            .unwrap();
        assert_eq!(stream.endpoint(), &Endpoint::new("127.0.0.1", 50021));

        mock.publish_topic("blink.0", &gaze_payload());
        mock.publish_topic("gaze.0", &gaze_payload());
        let messages = stream.drain(10).unwrap();
        assert_eq!(messages.len(), 1);
        let gaze = messages[0].gaze();
        assert_eq!(gaze.norm_pos, Some([0.25, 0.75]));
        assert_eq!(gaze.confidence, Some(0.95));
        assert_eq!(gaze.timestamp, Some(100.5));

        stream.close();
        client.close();
    }

    #[test]
    fn discovery_failure_creates_no_stream() {
        let mock = MockTransport::new();
        mock.push_text_reply("not-a-port");
        let mut client = client(&mock);
        assert!(matches!(
            client.create_streaming_channel(TopicFilter::all()),
            Err(RemoteError::Parse { .. })
        ));
        assert_eq!(mock.open_subscribers(), 0);
    }

    #[test]
    fn context_outlives_client_while_stream_is_open() {
        let mock = MockTransport::new();
        mock.push_text_reply("50021");
        let mut client = client(&mock);
        let mut stream = client.create_streaming_channel(TopicFilter::all()).unwrap();

        client.close();
        assert_eq!(mock.terminations(), 0);
        mock.publish_topic("gaze.0", &gaze_payload());
        assert!(stream.receive_one().unwrap().is_some());

        stream.close();
        assert_eq!(mock.terminations(), 1);
    }

    #[test]
    fn context_outlives_stream_while_client_is_open() {
        let mock = MockTransport::new();
        mock.push_text_reply("50021");
        let mut client = client(&mock);
        let mut stream = client.create_streaming_channel(TopicFilter::all()).unwrap();

        stream.close();
        assert_eq!(mock.terminations(), 0);
        mock.push_text_reply("50022");
        assert_eq!(client.pub_port().unwrap(), 50022);

        client.close();
        client.close();
        assert_eq!(mock.terminations(), 1);
    }

    #[test]
    fn closed_client_cannot_reconnect() {
        let mock = MockTransport::new();
        let mut client = client(&mock);
        client.close();
        assert!(!client.is_connected());
        assert!(matches!(
            client.sub_port(),
            Err(RemoteError::NotConnected(_))
        ));
        assert!(matches!(
            client.control().connect(),
            Err(RemoteError::Transport(TransportError::ContextTerminated))
        ));
    }

    #[test]
    fn pass_throughs_reach_control_channel() {
        let mock = MockTransport::new();
        mock.push_text_reply("50021");
        mock.push_text_reply("50022");
        mock.push_text_reply("1234.5");
        mock.push_text_reply("ok");
        let mut client = client(&mock);

        let ports = client.ports().unwrap();
        assert_eq!((ports.sub, ports.publish), (50021, 50022));
        assert_eq!(client.send_command("t").unwrap(), "1234.5");

        let record: Map = [("subject", "calibration.should_start")]
            .into_iter()
            .collect();
        client.send_notification(&record).unwrap();
        assert_eq!(mock.sent().len(), 4);
    }
}
