//! Client and server configuration.
//!
//! Both configs have defaults suitable for a local deployment and can be
//! loaded from JSON. Durations are written in milliseconds; a `null`
//! timeout disables the deadline.
//!
//! ```
//! use wirecall::config::ClientConfig;
//! use wirecall::protocol::{Compression, Serialization};
//!
//! let config = ClientConfig::from_json(r#"{ "compression": "lz4", "read_timeout": 250 }"#).unwrap();
//! assert_eq!(config.compression, Compression::Lz4);
//! assert_eq!(config.serialization, Serialization::MsgPack);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::{codec_for, Codec};
use crate::compress::{compressor_for, Compressor};
use crate::error::{RpcError, Result};
use crate::protocol::{
    Compression, Header, MessageType, Serialization, DEFAULT_MAX_FRAME_LEN, PROTOCOL_VERSION,
};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-call response deadline.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default client write deadline.
pub const DEFAULT_CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default server write deadline.
pub const DEFAULT_SERVER_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry count (declared, not consulted by the call path).
pub const DEFAULT_RETRIES: u32 = 3;

/// Default server bind address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6060";

/// Transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    /// Unix domain socket; the address is a filesystem path.
    Unix,
}

/// Failure policy for a call.
///
/// Carried in configuration for compatibility; the call path does not
/// retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    #[default]
    Failover,
    Failfast,
    Failtry,
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: Network,
    /// Declared retry count. Not enforced.
    pub retries: u32,
    /// Declared failure policy. Not enforced.
    pub fail_mode: FailMode,
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Deadline for a response after the request is written.
    #[serde(with = "opt_millis")]
    pub read_timeout: Option<Duration>,
    /// Deadline for writing one request frame.
    #[serde(with = "opt_millis")]
    pub write_timeout: Option<Duration>,
    pub serialization: Serialization,
    pub compression: Compression,
    /// Version byte written into every request header.
    pub version: u8,
    /// Largest accepted response body.
    pub max_frame_len: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            retries: DEFAULT_RETRIES,
            fail_mode: FailMode::Failover,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: Some(DEFAULT_CLIENT_WRITE_TIMEOUT),
            serialization: Serialization::MsgPack,
            compression: Compression::Zlib,
            version: PROTOCOL_VERSION,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RpcError::Config(e.to_string()))
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: Network,
    /// `host:port` for TCP, a socket path for Unix.
    pub address: String,
    /// Idle deadline for the next request on a connection.
    #[serde(with = "opt_millis")]
    pub read_timeout: Option<Duration>,
    /// Deadline for writing one response frame.
    #[serde(with = "opt_millis")]
    pub write_timeout: Option<Duration>,
    /// Largest accepted request body.
    pub max_frame_len: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: Network::Tcp,
            address: DEFAULT_ADDRESS.to_string(),
            read_timeout: None,
            write_timeout: Some(DEFAULT_SERVER_WRITE_TIMEOUT),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| RpcError::Config(e.to_string()))?;
        if config.address.is_empty() {
            return Err(RpcError::Config("address must not be empty".to_string()));
        }
        Ok(config)
    }
}

/// Codec and compressor resolved once for a client or for one request.
#[derive(Clone, Copy)]
pub struct Runtime {
    pub serialization: Serialization,
    pub compression: Compression,
    pub codec: &'static dyn Codec,
    pub compressor: &'static dyn Compressor,
}

impl Runtime {
    /// Resolve implementations for typed enum choices.
    pub fn new(serialization: Serialization, compression: Compression) -> Self {
        Self {
            serialization,
            compression,
            codec: codec_for(serialization),
            compressor: compressor_for(compression),
        }
    }

    /// Resolve implementations from raw header codes, failing on unknown codes.
    pub fn from_codes(serialization: u8, compression: u8) -> Result<Self> {
        Ok(Self::new(
            Serialization::try_from(serialization)?,
            Compression::try_from(compression)?,
        ))
    }

    /// Resolve the choices named in a received header.
    pub fn for_header(header: &Header) -> Self {
        Self::new(header.serialization, header.compression)
    }

    /// Header carrying this runtime's codes.
    pub fn header(&self, msg_type: MessageType, version: u8) -> Header {
        Header::new(msg_type, self.compression, self.serialization).with_version(version)
    }

    /// Serialize then compress an ordered value sequence.
    pub fn pack(&self, values: &[crate::codec::Value]) -> Result<Vec<u8>> {
        let encoded = self.codec.encode(values)?;
        self.compressor.compress(&encoded)
    }

    /// Decompress then deserialize an ordered value sequence.
    pub fn unpack(&self, payload: &[u8]) -> Result<Vec<crate::codec::Value>> {
        let decoded = self.compressor.decompress(payload)?;
        self.codec.decode(&decoded)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("serialization", &self.serialization)
            .field("compression", &self.compression)
            .finish()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
