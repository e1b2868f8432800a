//! The client-facing error taxonomy. Every failure mode the core can
//! surface maps to one variant here; nothing downstream of the Router
//! returns a bare `io::Error` or `anyhow::Error`.

use std::io;
use thiserror::Error;

use crate::protocol::error_codes::ProtocolErrorCode;

/// A specialized `Result` type for the client core.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Socket I/O failure, EOF, or refused connection.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The session this request was sent on terminated with it still
    /// outstanding, or a send was attempted after the session had already
    /// closed.
    #[error("session closed")]
    SessionClosed,

    /// Framing or response-body decode failure. Always escalated; the
    /// stream is considered corrupt past this point.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// The routing tables have no entry for the target (topic, partition)
    /// or consumer group.
    #[error("no route for {0}")]
    MissingRoute(MissingRouteTarget),

    /// The configured bootstrap list was exhausted without a single
    /// reachable broker.
    #[error("no bootstrap broker reachable")]
    Unreachable,

    /// A Kafka protocol error code embedded in an otherwise-successful
    /// response.
    #[error("protocol error: {0:?} (code {1})")]
    ProtocolError(ProtocolErrorCode, i16),

    /// The Recoverable Resource's recovery handler refused to recover.
    #[error("recovery escalated: {0}")]
    Escalated(String),

    /// The Connection Manager (or the channel backing this request) has
    /// been closed.
    #[error("connection closed")]
    Closed,

    /// Configuration could not be loaded: a malformed `.env` file or an
    /// unusable `KAFKA_BOOTSTRAP_SERVERS`/`KAFKA_DEFAULT_PORT` value.
    #[error("configuration error: {0}")]
    Config(String),
}

/// What routing information was missing, for `ClientError::MissingRoute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingRouteTarget {
    Partition { topic: String, partition: i32 },
    Group { group_id: String },
}

impl std::fmt::Display for MissingRouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partition { topic, partition } => {
                write!(f, "partition ({topic}, {partition})")
            }
            Self::Group { group_id } => write!(f, "group {group_id}"),
        }
    }
}
