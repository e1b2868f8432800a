//! The public entry point (spec §4.7): owns configuration, performs
//! bootstrap discovery, refreshes metadata and group-coordinator routing
//! on demand, and exposes the routed `send` surface built on top of the
//! [`Router`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::channel::Channel;
use crate::classifier::{self, ClassifierAction};
use crate::config::Config;
use crate::data::{Endpoint, GroupId, NodeId, Topic, TopicPartition};
use crate::error::{ClientError, ClientResult};
use crate::protocol::messages::{
    GroupCoordinatorRequest, MetadataRequest, MetadataResponse, Request, Response,
};
use crate::router::Router;
use crate::routing::RoutingTables;

/// Owns the bootstrap channel, the routing tables, and the router built
/// over them. This is the type callers construct and hold.
pub struct ConnectionManager {
    config: Config,
    bootstrap: Channel,
    tables: Arc<RoutingTables>,
    router: Router,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Tries each configured bootstrap endpoint in order; the first that
    /// yields a working channel becomes the bootstrap channel. Fails with
    /// [`ClientError::Unreachable`] once the list is exhausted.
    #[instrument(skip(cfg), fields(client_id = %cfg.client_id))]
    pub async fn connect(cfg: Config) -> ClientResult<Self> {
        for endpoint in &cfg.bootstrap_servers {
            let candidate = Channel::new(endpoint.clone(), cfg.client_id.clone());
            match candidate.connect().await {
                Ok(()) => {
                    info!(%endpoint, "bootstrap channel established");
                    let tables = Arc::new(RoutingTables::new());
                    tables.insert_channel(endpoint.clone(), candidate.clone());
                    let router = Router::new(candidate.clone(), tables.clone());
                    return Ok(Self {
                        config: cfg,
                        bootstrap: candidate,
                        tables,
                        router,
                        closed: AtomicBool::new(false),
                    });
                }
                Err(e) => {
                    warn!(%endpoint, error = %e, "bootstrap candidate unreachable, trying next");
                }
            }
        }
        Err(ClientError::Unreachable)
    }

    /// Sends `request` on the routed channel appropriate to its kind, then
    /// runs the reply through the Error Classifier (spec §2, §7) before
    /// handing it back: `ScheduleMetadataRefresh`/`RetryAfterDelay` signals
    /// are logged for the caller's awareness, and `Escalate` turns the
    /// reply into a hard [`ClientError::ProtocolError`] instead.
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        let response = self.router.dispatch(request).await?;
        self.classify_response(&response)?;
        Ok(response)
    }

    fn classify_response(&self, response: &Response) -> ClientResult<()> {
        for signal in classifier::classify(response) {
            match signal.action {
                ClassifierAction::PassThrough => {}
                ClassifierAction::ScheduleMetadataRefresh => {
                    warn!(
                        topic = ?signal.topic,
                        partition = ?signal.partition,
                        code = ?signal.code,
                        "classifier: leader moved, metadata refresh needed"
                    );
                }
                ClassifierAction::RetryAfterDelay => {
                    warn!(
                        topic = ?signal.topic,
                        partition = ?signal.partition,
                        code = ?signal.code,
                        "classifier: transient error, retry after delay recommended"
                    );
                }
                ClassifierAction::Escalate => {
                    return Err(ClientError::ProtocolError(signal.code, signal.code.code()));
                }
            }
        }
        Ok(())
    }

    /// Requests metadata for `topics` on the bootstrap channel, then
    /// applies the reply to the routing tables: `hostByNode` for every
    /// broker entry, `nodeByTopic` for every `(topic, partition)`, and
    /// ensures a channel exists to each leader (creating one only if
    /// absent).
    #[instrument(skip(self, topics))]
    pub async fn get_metadata(&self, topics: Vec<Topic>) -> ClientResult<MetadataResponse> {
        let response = self
            .bootstrap
            .send(Request::Metadata(MetadataRequest { topics }))
            .await?;
        let metadata = match response {
            Response::Metadata(m) => m,
            other => return Err(unexpected_shape("Metadata", &other)),
        };

        for broker in &metadata.brokers {
            let endpoint = Endpoint::new(broker.host.clone(), broker.port as u16);
            self.tables.set_node_host(broker.node_id, endpoint.clone());
            self.connect_host_new(endpoint).await?;
        }

        for topic in &metadata.topics {
            for partition in &topic.partitions {
                self.tables.set_topic_node(
                    TopicPartition::new(topic.topic.clone(), partition.partition),
                    partition.leader,
                );
            }
        }

        Ok(metadata)
    }

    /// Discovers the coordinator for `group_id` via the bootstrap channel,
    /// connects (or reuses) a channel to it, and updates `hostByGroup` —
    /// the underlying `Reactive` only publishes if the endpoint actually
    /// changed.
    #[instrument(skip(self))]
    pub async fn connect_group_coordinator(&self, group_id: GroupId) -> ClientResult<()> {
        let response = self
            .bootstrap
            .send(Request::GroupCoordinator(GroupCoordinatorRequest {
                group_id: group_id.clone(),
            }))
            .await?;
        let coordinator = match response {
            Response::GroupCoordinator(c) => c,
            other => return Err(unexpected_shape("GroupCoordinator", &other)),
        };

        let endpoint = Endpoint::new(coordinator.host.clone(), coordinator.port as u16);
        self.connect_host_new(endpoint.clone()).await?;
        self.tables.set_group_host(group_id, endpoint);
        Ok(())
    }

    /// Connects a channel to `endpoint` and registers it in `chanByHost`,
    /// unless one is already present.
    async fn connect_host_new(&self, endpoint: Endpoint) -> ClientResult<()> {
        if self.tables.has_channel_for(&endpoint) {
            return Ok(());
        }
        let channel = Channel::new(endpoint.clone(), self.config.client_id.clone());
        channel.connect().await?;
        self.tables.insert_channel(endpoint, channel);
        Ok(())
    }

    /// The routed channel handle: every `send` call on this manager goes
    /// through the same router, so this mostly exists for callers that
    /// want to hold just the dispatch function.
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn tables(&self) -> &RoutingTables {
        &self.tables
    }

    pub fn node_host(&self, node: NodeId) -> Option<Endpoint> {
        self.tables.host_by_node.get_snapshot().get(&node).cloned()
    }

    /// Releases all channels (bootstrap and routed) and fails their
    /// pending futures with [`ClientError::Closed`] (spec §6).
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.bootstrap.close().await;
        for channel in self.tables.chan_by_host.get_snapshot().values() {
            channel.close().await;
        }
    }
}

fn unexpected_shape(expected: &str, got: &Response) -> ClientError {
    ClientError::DecodeError(format!("expected a {expected} response, got {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;

    async fn refused_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    async fn metadata_stub_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = crate::framing::framed(socket);
            while let Some(Ok(req)) = framed.next().await {
                let cid = i32::from_be_bytes(req[4..8].try_into().unwrap());
                let mut reply = cid.to_be_bytes().to_vec();
                reply.extend_from_slice(
                    &MetadataResponse {
                        brokers: vec![],
                        topics: vec![],
                    }
                    .encode(),
                );
                framed.send(Bytes::from(reply)).await.unwrap();
            }
        });
        Endpoint::new(addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn bootstrap_falls_back_past_refused_endpoints() {
        let bad1 = refused_endpoint().await;
        let bad2 = refused_endpoint().await;
        let good = metadata_stub_endpoint().await;

        let cfg = Config {
            bootstrap_servers: vec![bad1, bad2, good.clone()],
            client_id: "test-client".into(),
            default_port: 9092,
        };

        let manager = ConnectionManager::connect(cfg).await.unwrap();

        let snapshot = manager.tables().chan_by_host.get_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(&good));
    }

    #[tokio::test]
    async fn connect_fails_unreachable_when_every_endpoint_refuses() {
        let bad1 = refused_endpoint().await;
        let bad2 = refused_endpoint().await;
        let cfg = Config {
            bootstrap_servers: vec![bad1, bad2],
            client_id: "test-client".into(),
            default_port: 9092,
        };

        let result = ConnectionManager::connect(cfg).await;
        assert!(matches!(result, Err(ClientError::Unreachable)));
    }
}
