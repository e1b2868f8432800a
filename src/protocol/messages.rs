//! Request/response envelope shapes for the API kinds the Router knows how
//! to dispatch (spec §4.6). Each type carries exactly the routing-relevant
//! fields — topic/partition/group identifiers — plus an opaque body blob
//! where the real protocol allows arbitrary per-request payload (e.g.
//! Produce record batches). Decoding the rest of a body is the caller's
//! job; this crate never interprets it.

use bytes::Bytes;

use crate::data::{GroupId, NodeId, Partition, Topic};
use crate::error::ClientResult;
use crate::protocol::codec::{ByteReader, ByteWriter};

/// Kafka API key, used to select the decoder for a Session's pending
/// reply and to classify a request for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Produce,
    Fetch,
    Offset,
    Metadata,
    OffsetCommit,
    OffsetFetch,
    GroupCoordinator,
    JoinGroup,
    Heartbeat,
    LeaveGroup,
    SyncGroup,
    DescribeGroups,
    ListGroups,
}

impl ApiKey {
    pub fn code(self) -> i16 {
        match self {
            Self::Produce => 0,
            Self::Fetch => 1,
            Self::Offset => 2,
            Self::Metadata => 3,
            Self::OffsetCommit => 8,
            Self::OffsetFetch => 9,
            Self::GroupCoordinator => 10,
            Self::JoinGroup => 11,
            Self::Heartbeat => 12,
            Self::LeaveGroup => 13,
            Self::SyncGroup => 14,
            Self::DescribeGroups => 15,
            Self::ListGroups => 16,
        }
    }
}

/// A request the core knows how to route. Construction is the caller's
/// job; this crate only ever inspects the fields it needs to route,
/// split, and merge.
#[derive(Debug, Clone)]
pub enum Request {
    Metadata(MetadataRequest),
    Fetch(FetchRequest),
    Produce(ProduceRequest),
    Offset(OffsetRequest),
    OffsetCommit(OffsetCommitRequest),
    OffsetFetch(OffsetFetchRequest),
    GroupCoordinator(GroupCoordinatorRequest),
    JoinGroup(GroupScopedRequest),
    SyncGroup(GroupScopedRequest),
    Heartbeat(GroupScopedRequest),
    LeaveGroup(GroupScopedRequest),
    ListGroups(Bytes),
    DescribeGroups(DescribeGroupsRequest),
}

impl Request {
    pub fn api_key(&self) -> ApiKey {
        match self {
            Self::Metadata(_) => ApiKey::Metadata,
            Self::Fetch(_) => ApiKey::Fetch,
            Self::Produce(_) => ApiKey::Produce,
            Self::Offset(_) => ApiKey::Offset,
            Self::OffsetCommit(_) => ApiKey::OffsetCommit,
            Self::OffsetFetch(_) => ApiKey::OffsetFetch,
            Self::GroupCoordinator(_) => ApiKey::GroupCoordinator,
            Self::JoinGroup(_) => ApiKey::JoinGroup,
            Self::SyncGroup(_) => ApiKey::SyncGroup,
            Self::Heartbeat(_) => ApiKey::Heartbeat,
            Self::LeaveGroup(_) => ApiKey::LeaveGroup,
            Self::ListGroups(_) => ApiKey::ListGroups,
            Self::DescribeGroups(_) => ApiKey::DescribeGroups,
        }
    }

    /// True for a Produce request with `required_acks == 0`: the Session
    /// must not register a pending reply for this one (spec §4.2).
    pub fn is_ackless(&self) -> bool {
        matches!(self, Self::Produce(p) if p.acks == 0)
    }

    /// The structural encoding of the routing-relevant fields. A real
    /// deployment's per-API codec supplies the rest of the body; what's
    /// encoded here is only ever decoded by this crate's own `Session` and
    /// test harnesses.
    pub fn encode_body(&self) -> Bytes {
        let mut w = ByteWriter::new();
        match self {
            Self::Metadata(r) => {
                w.write_i32(r.topics.len() as i32);
                for t in &r.topics {
                    w.write_string(t);
                }
            }
            Self::Fetch(r) => {
                w.write_i32(r.replica_id);
                w.write_i32(r.max_wait_time_ms);
                w.write_i32(r.min_bytes);
                w.write_i32(r.partitions.len() as i32);
                for p in &r.partitions {
                    w.write_string(&p.topic);
                    w.write_i32(p.partition);
                    w.write_i64(p.fetch_offset);
                    w.write_i32(p.max_bytes);
                }
            }
            Self::Produce(r) => {
                w.write_i16(r.acks);
                w.write_i32(r.timeout_ms);
                w.write_i32(r.topic_data.len() as i32);
                for t in &r.topic_data {
                    w.write_string(&t.topic);
                    w.write_i32(t.partitions.len() as i32);
                    for p in &t.partitions {
                        w.write_i32(p.partition);
                        w.write_bytes(&p.records);
                    }
                }
            }
            Self::Offset(r) => {
                w.write_i32(r.replica_id);
                w.write_i32(r.topics.len() as i32);
                for t in &r.topics {
                    w.write_string(&t.topic);
                    w.write_i32(t.partitions.len() as i32);
                    for p in &t.partitions {
                        w.write_i32(p.partition);
                        w.write_i64(p.timestamp);
                    }
                }
            }
            Self::OffsetCommit(r) => {
                w.write_string(&r.group_id);
                w.write_bytes(&r.body);
            }
            Self::OffsetFetch(r) => {
                w.write_string(&r.group_id);
                w.write_bytes(&r.body);
            }
            Self::GroupCoordinator(r) => {
                w.write_string(&r.group_id);
            }
            Self::JoinGroup(r) | Self::SyncGroup(r) | Self::Heartbeat(r) | Self::LeaveGroup(r) => {
                w.write_string(&r.group_id);
                w.write_bytes(&r.body);
            }
            Self::ListGroups(body) => {
                w.write_bytes(body);
            }
            Self::DescribeGroups(r) => {
                w.write_i32(r.group_ids.len() as i32);
                for g in &r.group_ids {
                    w.write_string(g);
                }
                w.write_bytes(&r.body);
            }
        }
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct MetadataRequest {
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub replica_id: i32,
    pub max_wait_time_ms: i32,
    pub min_bytes: i32,
    pub partitions: Vec<FetchPartitionRequest>,
}

#[derive(Debug, Clone)]
pub struct FetchPartitionRequest {
    pub topic: Topic,
    pub partition: Partition,
    pub fetch_offset: i64,
    pub max_bytes: i32,
}

#[derive(Debug, Clone)]
pub struct ProduceRequest {
    pub acks: i16,
    pub timeout_ms: i32,
    pub topic_data: Vec<ProduceTopicData>,
}

#[derive(Debug, Clone)]
pub struct ProduceTopicData {
    pub topic: Topic,
    pub partitions: Vec<ProducePartitionData>,
}

#[derive(Debug, Clone)]
pub struct ProducePartitionData {
    pub partition: Partition,
    pub records: Bytes,
}

#[derive(Debug, Clone)]
pub struct OffsetRequest {
    pub replica_id: i32,
    pub topics: Vec<OffsetTopicRequest>,
}

#[derive(Debug, Clone)]
pub struct OffsetTopicRequest {
    pub topic: Topic,
    pub partitions: Vec<OffsetPartitionRequest>,
}

#[derive(Debug, Clone)]
pub struct OffsetPartitionRequest {
    pub partition: Partition,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct OffsetCommitRequest {
    pub group_id: GroupId,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct OffsetFetchRequest {
    pub group_id: GroupId,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct GroupCoordinatorRequest {
    pub group_id: GroupId,
}

/// Shared shape for JoinGroup/SyncGroup/Heartbeat/LeaveGroup: all of these
/// route purely by `group_id` and otherwise carry an opaque body.
#[derive(Debug, Clone)]
pub struct GroupScopedRequest {
    pub group_id: GroupId,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct DescribeGroupsRequest {
    pub group_ids: Vec<GroupId>,
    pub body: Bytes,
}

/// A response the core knows how to decode far enough to merge or route
/// follow-up action on. Everything else is `Opaque`, passed through
/// unexamined.
#[derive(Debug, Clone)]
pub enum Response {
    Metadata(MetadataResponse),
    Fetch(FetchResponse),
    Produce(ProduceResponse),
    Offset(OffsetResponse),
    GroupCoordinator(GroupCoordinatorResponse),
    Opaque(Bytes),
}

impl Response {
    pub fn decode(api_key: ApiKey, bytes: Bytes) -> ClientResult<Self> {
        match api_key {
            ApiKey::Metadata => Ok(Self::Metadata(MetadataResponse::decode(&bytes)?)),
            ApiKey::Fetch => Ok(Self::Fetch(FetchResponse::decode(&bytes)?)),
            ApiKey::Produce => Ok(Self::Produce(ProduceResponse::decode(&bytes)?)),
            ApiKey::Offset => Ok(Self::Offset(OffsetResponse::decode(&bytes)?)),
            ApiKey::GroupCoordinator => {
                Ok(Self::GroupCoordinator(GroupCoordinatorResponse::decode(&bytes)?))
            }
            _ => Ok(Self::Opaque(bytes)),
        }
    }

    /// Synthesizes the reply a Session fabricates for an ackless Produce
    /// send, without ever touching the wire.
    pub fn empty_produce_ack() -> Self {
        Self::Produce(ProduceResponse { topics: Vec::new() })
    }
}

#[derive(Debug, Clone)]
pub struct MetadataBroker {
    pub node_id: NodeId,
    pub host: String,
    pub port: i32,
}

#[derive(Debug, Clone)]
pub struct MetadataPartition {
    pub partition: Partition,
    pub leader: NodeId,
    pub error_code: i16,
}

#[derive(Debug, Clone)]
pub struct MetadataTopic {
    pub topic: Topic,
    pub error_code: i16,
    pub partitions: Vec<MetadataPartition>,
}

#[derive(Debug, Clone)]
pub struct MetadataResponse {
    pub brokers: Vec<MetadataBroker>,
    pub topics: Vec<MetadataTopic>,
}

impl MetadataResponse {
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        let mut r = ByteReader::new(bytes);
        let broker_count = r.read_i32()?;
        let mut brokers = Vec::with_capacity(broker_count.max(0) as usize);
        for _ in 0..broker_count {
            brokers.push(MetadataBroker {
                node_id: NodeId(r.read_i32()?),
                host: r.read_string()?,
                port: r.read_i32()?,
            });
        }

        let topic_count = r.read_i32()?;
        let mut topics = Vec::with_capacity(topic_count.max(0) as usize);
        for _ in 0..topic_count {
            let error_code = r.read_i16()?;
            let topic = r.read_string()?;
            let partition_count = r.read_i32()?;
            let mut partitions = Vec::with_capacity(partition_count.max(0) as usize);
            for _ in 0..partition_count {
                partitions.push(MetadataPartition {
                    error_code: r.read_i16()?,
                    partition: r.read_i32()?,
                    leader: NodeId(r.read_i32()?),
                });
            }
            topics.push(MetadataTopic {
                topic,
                error_code,
                partitions,
            });
        }

        Ok(Self { brokers, topics })
    }

    pub fn encode(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_i32(self.brokers.len() as i32);
        for b in &self.brokers {
            w.write_i32(b.node_id.0);
            w.write_string(&b.host);
            w.write_i32(b.port);
        }
        w.write_i32(self.topics.len() as i32);
        for t in &self.topics {
            w.write_i16(t.error_code);
            w.write_string(&t.topic);
            w.write_i32(t.partitions.len() as i32);
            for p in &t.partitions {
                w.write_i16(p.error_code);
                w.write_i32(p.partition);
                w.write_i32(p.leader.0);
            }
        }
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct GroupCoordinatorResponse {
    pub error_code: i16,
    pub node_id: NodeId,
    pub host: String,
    pub port: i32,
}

impl GroupCoordinatorResponse {
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        let mut r = ByteReader::new(bytes);
        Ok(Self {
            error_code: r.read_i16()?,
            node_id: NodeId(r.read_i32()?),
            host: r.read_string()?,
            port: r.read_i32()?,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_i16(self.error_code)
            .write_i32(self.node_id.0)
            .write_string(&self.host)
            .write_i32(self.port);
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponsePartition {
    pub partition: Partition,
    pub error_code: i16,
    pub high_watermark: i64,
    pub records: Bytes,
}

#[derive(Debug, Clone)]
pub struct FetchResponseTopic {
    pub topic: Topic,
    pub partitions: Vec<FetchResponsePartition>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    pub topics: Vec<FetchResponseTopic>,
}

impl FetchResponse {
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        let mut r = ByteReader::new(bytes);
        let topic_count = r.read_i32()?;
        let mut topics = Vec::with_capacity(topic_count.max(0) as usize);
        for _ in 0..topic_count {
            let topic = r.read_string()?;
            let partition_count = r.read_i32()?;
            let mut partitions = Vec::with_capacity(partition_count.max(0) as usize);
            for _ in 0..partition_count {
                partitions.push(FetchResponsePartition {
                    partition: r.read_i32()?,
                    error_code: r.read_i16()?,
                    high_watermark: r.read_i64()?,
                    records: Bytes::from(r.read_bytes()?),
                });
            }
            topics.push(FetchResponseTopic { topic, partitions });
        }
        Ok(Self { topics })
    }

    pub fn encode(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_i32(self.topics.len() as i32);
        for t in &self.topics {
            w.write_string(&t.topic);
            w.write_i32(t.partitions.len() as i32);
            for p in &t.partitions {
                w.write_i32(p.partition)
                    .write_i16(p.error_code)
                    .write_i64(p.high_watermark)
                    .write_bytes(&p.records);
            }
        }
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct ProduceResponsePartition {
    pub partition: Partition,
    pub error_code: i16,
    pub base_offset: i64,
}

#[derive(Debug, Clone)]
pub struct ProduceResponseTopic {
    pub topic: Topic,
    pub partitions: Vec<ProduceResponsePartition>,
}

#[derive(Debug, Clone, Default)]
pub struct ProduceResponse {
    pub topics: Vec<ProduceResponseTopic>,
}

impl ProduceResponse {
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let mut r = ByteReader::new(bytes);
        let topic_count = r.read_i32()?;
        let mut topics = Vec::with_capacity(topic_count.max(0) as usize);
        for _ in 0..topic_count {
            let topic = r.read_string()?;
            let partition_count = r.read_i32()?;
            let mut partitions = Vec::with_capacity(partition_count.max(0) as usize);
            for _ in 0..partition_count {
                partitions.push(ProduceResponsePartition {
                    partition: r.read_i32()?,
                    error_code: r.read_i16()?,
                    base_offset: r.read_i64()?,
                });
            }
            topics.push(ProduceResponseTopic { topic, partitions });
        }
        Ok(Self { topics })
    }

    pub fn encode(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_i32(self.topics.len() as i32);
        for t in &self.topics {
            w.write_string(&t.topic);
            w.write_i32(t.partitions.len() as i32);
            for p in &t.partitions {
                w.write_i32(p.partition)
                    .write_i16(p.error_code)
                    .write_i64(p.base_offset);
            }
        }
        w.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct OffsetResponsePartition {
    pub partition: Partition,
    pub error_code: i16,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct OffsetResponseTopic {
    pub topic: Topic,
    pub partitions: Vec<OffsetResponsePartition>,
}

#[derive(Debug, Clone, Default)]
pub struct OffsetResponse {
    pub topics: Vec<OffsetResponseTopic>,
}

impl OffsetResponse {
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        let mut r = ByteReader::new(bytes);
        let topic_count = r.read_i32()?;
        let mut topics = Vec::with_capacity(topic_count.max(0) as usize);
        for _ in 0..topic_count {
            let topic = r.read_string()?;
            let partition_count = r.read_i32()?;
            let mut partitions = Vec::with_capacity(partition_count.max(0) as usize);
            for _ in 0..partition_count {
                partitions.push(OffsetResponsePartition {
                    partition: r.read_i32()?,
                    error_code: r.read_i16()?,
                    offset: r.read_i64()?,
                });
            }
            topics.push(OffsetResponseTopic { topic, partitions });
        }
        Ok(Self { topics })
    }

    pub fn encode(&self) -> Bytes {
        let mut w = ByteWriter::new();
        w.write_i32(self.topics.len() as i32);
        for t in &self.topics {
            w.write_string(&t.topic);
            w.write_i32(t.partitions.len() as i32);
            for p in &t.partitions {
                w.write_i32(p.partition)
                    .write_i16(p.error_code)
                    .write_i64(p.offset);
            }
        }
        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_response_round_trips() {
        let resp = MetadataResponse {
            brokers: vec![MetadataBroker {
                node_id: NodeId(1),
                host: "broker1".into(),
                port: 9092,
            }],
            topics: vec![MetadataTopic {
                topic: "t".into(),
                error_code: 0,
                partitions: vec![MetadataPartition {
                    partition: 0,
                    leader: NodeId(1),
                    error_code: 0,
                }],
            }],
        };
        let decoded = MetadataResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.brokers.len(), 1);
        assert_eq!(decoded.topics[0].partitions[0].leader, NodeId(1));
    }

    #[test]
    fn ackless_produce_is_detected() {
        let req = Request::Produce(ProduceRequest {
            acks: 0,
            timeout_ms: 0,
            topic_data: vec![],
        });
        assert!(req.is_ackless());

        let req = Request::Produce(ProduceRequest {
            acks: 1,
            timeout_ms: 0,
            topic_data: vec![],
        });
        assert!(!req.is_ackless());
    }
}
