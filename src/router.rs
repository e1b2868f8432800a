//! Per-request dispatch table (spec §4.6): cluster-wide requests go to the
//! bootstrap channel, Fetch/Produce/Offset are split across leader
//! channels and the partial replies merged, and group-scoped requests go
//! to the coordinator channel for their group.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::instrument;

use crate::channel::Channel;
use crate::data::{Endpoint, GroupId, Topic, TopicPartition};
use crate::error::{ClientError, ClientResult, MissingRouteTarget};
use crate::protocol::messages::{
    FetchPartitionRequest, FetchRequest, FetchResponse, FetchResponseTopic, OffsetPartitionRequest,
    OffsetRequest, OffsetResponse, OffsetResponseTopic, OffsetTopicRequest, ProducePartitionData,
    ProduceRequest, ProduceResponse, ProduceResponseTopic, ProduceTopicData, Request, Response,
};
use crate::routing::RoutingTables;

/// Combines the bootstrap channel with the routing tables into the single
/// `request -> future<response>` function the Connection Manager exposes.
pub struct Router {
    bootstrap: Channel,
    tables: Arc<RoutingTables>,
}

impl Router {
    pub fn new(bootstrap: Channel, tables: Arc<RoutingTables>) -> Self {
        Self { bootstrap, tables }
    }

    #[instrument(skip(self, request))]
    pub async fn dispatch(&self, request: Request) -> ClientResult<Response> {
        if matches!(
            request,
            Request::Metadata(_)
                | Request::GroupCoordinator(_)
                | Request::ListGroups(_)
                | Request::DescribeGroups(_)
        ) {
            return self.bootstrap.send(request).await;
        }

        match request {
            Request::Fetch(r) => self.dispatch_fetch(r).await,
            Request::Produce(r) => self.dispatch_produce(r).await,
            Request::Offset(r) => self.dispatch_offset(r).await,
            Request::OffsetCommit(r) => {
                self.route_by_group(r.group_id.clone(), Request::OffsetCommit(r)).await
            }
            Request::OffsetFetch(r) => {
                self.route_by_group(r.group_id.clone(), Request::OffsetFetch(r)).await
            }
            Request::JoinGroup(r) => {
                self.route_by_group(r.group_id.clone(), Request::JoinGroup(r)).await
            }
            Request::SyncGroup(r) => {
                self.route_by_group(r.group_id.clone(), Request::SyncGroup(r)).await
            }
            Request::Heartbeat(r) => {
                self.route_by_group(r.group_id.clone(), Request::Heartbeat(r)).await
            }
            Request::LeaveGroup(r) => {
                self.route_by_group(r.group_id.clone(), Request::LeaveGroup(r)).await
            }
            Request::Metadata(_)
            | Request::GroupCoordinator(_)
            | Request::ListGroups(_)
            | Request::DescribeGroups(_) => unreachable!("handled by the bootstrap check above"),
        }
    }

    async fn route_by_group(&self, group_id: GroupId, request: Request) -> ClientResult<Response> {
        let channel = self
            .tables
            .channel_for_group(&group_id)
            .ok_or_else(|| ClientError::MissingRoute(MissingRouteTarget::Group { group_id }))?;
        channel.send(request).await
    }

    fn channel_for(&self, topic: &Topic, partition: i32) -> ClientResult<Channel> {
        let target = TopicPartition::new(topic.clone(), partition);
        self.tables.channel_for_topic(&target).ok_or_else(|| {
            ClientError::MissingRoute(MissingRouteTarget::Partition {
                topic: topic.clone(),
                partition,
            })
        })
    }

    async fn dispatch_fetch(&self, r: FetchRequest) -> ClientResult<Response> {
        let mut shards: HashMap<Endpoint, (Channel, Vec<FetchPartitionRequest>)> = HashMap::new();
        for p in r.partitions {
            let channel = self.channel_for(&p.topic, p.partition)?;
            shards
                .entry(channel.endpoint().clone())
                .or_insert_with(|| (channel, Vec::new()))
                .1
                .push(p);
        }

        let sends = shards.into_values().map(|(channel, partitions)| {
            let request = Request::Fetch(FetchRequest {
                replica_id: r.replica_id,
                max_wait_time_ms: r.max_wait_time_ms,
                min_bytes: r.min_bytes,
                partitions,
            });
            async move { channel.send(request).await }
        });

        let mut merged = FetchResponse::default();
        for result in join_all(sends).await {
            match result? {
                Response::Fetch(partial) => merge_topics(&mut merged.topics, partial.topics, |t| {
                    FetchResponseTopic {
                        topic: t,
                        partitions: Vec::new(),
                    }
                }),
                other => return Err(unexpected_response_shape("Fetch", &other)),
            }
        }
        Ok(Response::Fetch(merged))
    }

    async fn dispatch_produce(&self, r: ProduceRequest) -> ClientResult<Response> {
        let mut shards: HashMap<Endpoint, (Channel, HashMap<Topic, Vec<ProducePartitionData>>)> =
            HashMap::new();
        for t in r.topic_data {
            for p in t.partitions {
                let channel = self.channel_for(&t.topic, p.partition)?;
                shards
                    .entry(channel.endpoint().clone())
                    .or_insert_with(|| (channel, HashMap::new()))
                    .1
                    .entry(t.topic.clone())
                    .or_default()
                    .push(p);
            }
        }

        let sends = shards.into_values().map(|(channel, by_topic)| {
            let topic_data = by_topic
                .into_iter()
                .map(|(topic, partitions)| ProduceTopicData { topic, partitions })
                .collect();
            let request = Request::Produce(ProduceRequest {
                acks: r.acks,
                timeout_ms: r.timeout_ms,
                topic_data,
            });
            async move { channel.send(request).await }
        });

        let mut merged = ProduceResponse::default();
        for result in join_all(sends).await {
            match result? {
                Response::Produce(partial) => {
                    merge_topics(&mut merged.topics, partial.topics, |t| ProduceResponseTopic {
                        topic: t,
                        partitions: Vec::new(),
                    })
                }
                other => return Err(unexpected_response_shape("Produce", &other)),
            }
        }
        Ok(Response::Produce(merged))
    }

    async fn dispatch_offset(&self, r: OffsetRequest) -> ClientResult<Response> {
        let mut shards: HashMap<Endpoint, (Channel, HashMap<Topic, Vec<OffsetPartitionRequest>>)> =
            HashMap::new();
        for t in r.topics {
            for p in t.partitions {
                let channel = self.channel_for(&t.topic, p.partition)?;
                shards
                    .entry(channel.endpoint().clone())
                    .or_insert_with(|| (channel, HashMap::new()))
                    .1
                    .entry(t.topic.clone())
                    .or_default()
                    .push(p);
            }
        }

        let sends = shards.into_values().map(|(channel, by_topic)| {
            let topics = by_topic
                .into_iter()
                .map(|(topic, partitions)| OffsetTopicRequest { topic, partitions })
                .collect();
            let request = Request::Offset(OffsetRequest {
                replica_id: r.replica_id,
                topics,
            });
            async move { channel.send(request).await }
        });

        let mut merged = OffsetResponse::default();
        for result in join_all(sends).await {
            match result? {
                Response::Offset(partial) => {
                    merge_topics(&mut merged.topics, partial.topics, |t| OffsetResponseTopic {
                        topic: t,
                        partitions: Vec::new(),
                    })
                }
                other => return Err(unexpected_response_shape("Offset", &other)),
            }
        }
        Ok(Response::Offset(merged))
    }
}

fn unexpected_response_shape(expected: &str, got: &Response) -> ClientError {
    ClientError::DecodeError(format!("expected a {expected} response shard, got {got:?}"))
}

/// Concatenates `partial`'s per-topic partition entries into `merged`, by
/// topic name, creating a fresh entry via `empty` the first time a topic is
/// seen. This is the "merge by concatenating per-topic entries" rule
/// shared by Fetch/Produce/Offset.
fn merge_topics<T>(merged: &mut Vec<T>, partial: Vec<T>, empty: impl Fn(Topic) -> T)
where
    T: TopicEntry,
{
    for entry in partial {
        let topic = entry.topic().clone();
        let existing = merged.iter_mut().find(|e| e.topic() == &topic);
        match existing {
            Some(existing) => existing.partitions_mut().extend(entry.into_partitions()),
            None => {
                let mut fresh = empty(topic);
                fresh.partitions_mut().extend(entry.into_partitions());
                merged.push(fresh);
            }
        }
    }
}

/// Lets [`merge_topics`] work generically over the three topic-scoped
/// response shapes without hand-writing the same loop three times.
trait TopicEntry {
    type Partition;
    fn topic(&self) -> &Topic;
    fn partitions_mut(&mut self) -> &mut Vec<Self::Partition>;
    fn into_partitions(self) -> Vec<Self::Partition>;
}

macro_rules! impl_topic_entry {
    ($ty:ty, $partition:ty) => {
        impl TopicEntry for $ty {
            type Partition = $partition;
            fn topic(&self) -> &Topic {
                &self.topic
            }
            fn partitions_mut(&mut self) -> &mut Vec<Self::Partition> {
                &mut self.partitions
            }
            fn into_partitions(self) -> Vec<Self::Partition> {
                self.partitions
            }
        }
    };
}

impl_topic_entry!(FetchResponseTopic, crate::protocol::messages::FetchResponsePartition);
impl_topic_entry!(ProduceResponseTopic, crate::protocol::messages::ProduceResponsePartition);
impl_topic_entry!(OffsetResponseTopic, crate::protocol::messages::OffsetResponsePartition);
