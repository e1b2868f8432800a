//! Connection, session-multiplexing, and routing core for a Kafka
//! wire-protocol client.
//!
//! The layering, bottom to top:
//!
//! - [`framing`] turns a byte stream into length-delimited frames.
//! - [`session`] multiplexes concurrent requests over one frame stream by
//!   correlation id.
//! - [`resource`] holds a single-flight, self-healing handle to a fallible
//!   resource (used here to hold a [`session::Session`] over a socket that
//!   can drop and needs recreating).
//! - [`channel`] is a [`resource::RecoverableResource`] of a
//!   [`session::Session`], i.e. "talk to this one broker".
//! - [`reactive`] and [`routing`] track which channel serves which broker,
//!   topic-partition, or consumer group as that information changes.
//! - [`router`] dispatches a request to the right channel(s), splitting and
//!   merging multi-partition requests as needed.
//! - [`classifier`] inspects protocol-level error codes in responses and
//!   signals the caller to refresh routing state.
//! - [`manager`] is the public entry point tying all of the above together.

pub mod channel;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod framing;
pub mod manager;
pub mod protocol;
pub mod reactive;
pub mod resource;
pub mod router;
pub mod routing;
pub mod session;

pub use config::Config;
pub use data::{Endpoint, GroupId, NodeId, Partition, Topic, TopicPartition};
pub use error::{ClientError, ClientResult, MissingRouteTarget};
pub use manager::ConnectionManager;
pub use protocol::messages::{Request, Response};
