use std::io::Read;
use std::path::Path;
use std::time::Duration;

use pupilnet_transport::{Endpoint, RequestOptions, SubscribeOptions, TopicFilter};
use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, Result};

/// Default control port of the remote service.
pub const DEFAULT_REQ_PORT: u16 = 50020;
/// Default host of the remote service.
pub const DEFAULT_HOST: &str = "127.0.0.1";

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// What [`crate::StreamingChannel::drain`] does with a payload that fails
/// to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Log, count in [`crate::StreamStats::malformed`], keep draining.
    #[default]
    SkipMalformed,
    /// Stop and return the decode error.
    FailFast,
}

/// Client configuration.
///
/// Durations are expressed in milliseconds when (de)serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Host running the remote service.
    pub host: String,
    /// Control (request/reply) port.
    pub req_port: u16,
    /// Receive high-water-mark for streaming channels.
    pub recv_hwm: u32,
    /// Timeout of a single streaming receive attempt.
    #[serde(rename = "recv_timeout_ms", with = "duration_ms")]
    pub recv_timeout: Duration,
    /// Reply timeout for control requests. `None` blocks indefinitely.
    #[serde(rename = "request_timeout_ms", with = "option_duration_ms")]
    pub request_timeout: Option<Duration>,
    /// Malformed payload handling while draining.
    pub drain_policy: DrainPolicy,
    /// Passed through to streaming channels as a decoding hint.
    pub fast_decode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            req_port: DEFAULT_REQ_PORT,
            recv_hwm: 1000,
            recv_timeout: Duration::from_millis(50),
            request_timeout: None,
            drain_policy: DrainPolicy::SkipMalformed,
            fast_decode: true,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, req_port: u16) -> Self {
        Self {
            host: host.into(),
            req_port,
            ..Self::default()
        }
    }

    pub fn with_recv_hwm(mut self, recv_hwm: u32) -> Self {
        self.recv_hwm = recv_hwm;
        self
    }

    pub fn with_recv_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_drain_policy(mut self, drain_policy: DrainPolicy) -> Self {
        self.drain_policy = drain_policy;
        self
    }

    pub fn with_fast_decode(mut self, fast_decode: bool) -> Self {
        self.fast_decode = fast_decode;
        self
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file (at most 64 KiB).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            RemoteError::Config(format!("cannot open {}: {err}", path.display()))
        })?;

        let mut content = String::new();
        file.take(MAX_CONFIG_FILE_SIZE + 1)
            .read_to_string(&mut content)
            .map_err(|err| {
                RemoteError::Config(format!("cannot read {}: {err}", path.display()))
            })?;
        if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
            return Err(RemoteError::Config(format!(
                "{} exceeds {MAX_CONFIG_FILE_SIZE} bytes",
                path.display()
            )));
        }

        Self::from_json_str(&content)
    }

    /// Reject values no socket can be configured with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RemoteError::Config("host must not be empty".to_string()));
        }
        if self.req_port == 0 {
            return Err(RemoteError::Config("req_port must not be 0".to_string()));
        }
        if self.recv_timeout.is_zero() {
            return Err(RemoteError::Config(
                "recv_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint of the control port.
    pub fn control_endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.req_port)
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            recv_timeout: self.request_timeout,
        }
    }

    /// Subscribe options for a streaming channel filtered by `topics`.
    pub fn subscribe_options(&self, topics: TopicFilter) -> SubscribeOptions {
        SubscribeOptions {
            recv_hwm: self.recv_hwm,
            recv_timeout: self.recv_timeout,
            topics,
            fast_decode: self.fast_decode,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::duration_ms::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
