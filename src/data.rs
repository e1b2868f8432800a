//! Core data-model value types shared across the session, routing, and
//! router layers. See spec §3.

use std::fmt;

/// A (host, port) pair. Immutable value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Broker identifier assigned by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i32);

/// A named stream, partitioned across brokers.
pub type Topic = String;

/// A shard of a topic, identified by an integer within the topic.
pub type Partition = i32;

/// A (topic, partition) pair — the routing key for Fetch/Produce/Offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: Topic,
    pub partition: Partition,
}

impl TopicPartition {
    pub fn new(topic: impl Into<Topic>, partition: Partition) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

/// A consumer-group identifier.
pub type GroupId = String;
