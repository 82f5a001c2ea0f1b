use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading or writing a wire frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying stream failed.
    #[error("frame transport failed: {0}")]
    Io(#[from] io::Error),
    /// Identity longer than a single length byte can describe.
    #[error("client identity is {len} bytes, limit is {max}")]
    IdentityTooLong {
        /// Offending identity length.
        len: usize,
        /// Largest accepted identity length.
        max: usize,
    },
    /// Payload longer than the frame limit.
    #[error("frame payload is {len} bytes, limit is {max}")]
    PayloadTooLong {
        /// Offending payload length.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },
    /// Payload bytes are not a serialized transaction.
    #[error("payload is not a serialized transaction: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures surfaced to callers of the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open a connection to the emulator.
    #[error("failed to connect to emulator at {endpoint}: {source}")]
    Connect {
        /// Endpoint the client tried to reach.
        endpoint: String,
        /// Transport failure.
        #[source]
        source: io::Error,
    },
    /// Stream configuration failed after connecting.
    #[error("failed to configure emulator connection: {0}")]
    Transport(#[from] io::Error),
    /// Frame exchange failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Emulator closed the connection before replying.
    #[error("emulator closed the connection")]
    Disconnected,
    /// Reply frame belongs to a different client.
    #[error("reply identity `{received}` does not match client identity `{expected}`")]
    IdentityMismatch {
        /// Identity this client sends.
        expected: String,
        /// Identity carried by the reply.
        received: String,
    },
    /// Reply payload is shorter than the transaction sent.
    #[error("reply carries {received} bytes, expected {expected}")]
    ShortReply {
        /// Length of the transaction sent.
        expected: usize,
        /// Length of the reply payload.
        received: usize,
    },
}

/// Failures loading an emulator configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// File contents are not a valid configuration.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Failures starting or querying the emulator server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listening socket could not be bound.
    #[error("failed to bind emulator endpoint {endpoint}: {source}")]
    Bind {
        /// Requested endpoint.
        endpoint: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Server thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Processing point has stopped and can no longer service requests.
    #[error("register model processor is not running")]
    ProcessorStopped,
    /// Bound address could not be queried.
    #[error("failed to query bound address: {0}")]
    LocalAddr(#[source] io::Error),
    /// Connection to a peer could not be set up.
    #[error("failed to set up connection from {peer}: {source}")]
    Connection {
        /// Remote peer.
        peer: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Failures installing the global tracing subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Directive string could not be parsed.
    #[error("invalid log directive: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed.
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}
