//! The four primary reactive maps and their two derived maps (spec §4.5).
//! Primary maps are updated directly by the [`crate::manager::ConnectionManager`]
//! as metadata and coordinator responses arrive; the derived maps recompute
//! themselves via [`combine_latest`] and are read-only from the outside.

use std::collections::HashMap;

use crate::channel::Channel;
use crate::data::{Endpoint, GroupId, NodeId, TopicPartition};
use crate::reactive::{combine_latest, Reactive};

/// `chanByHost ∘ hostByNode ∘ nodeByTopic` and `chanByHost ∘ hostByGroup`,
/// kept live by background tasks spawned in [`RoutingTables::new`].
pub struct RoutingTables {
    pub chan_by_host: Reactive<HashMap<Endpoint, Channel>>,
    pub host_by_node: Reactive<HashMap<NodeId, Endpoint>>,
    pub node_by_topic: Reactive<HashMap<TopicPartition, NodeId>>,
    pub host_by_group: Reactive<HashMap<GroupId, Endpoint>>,
    pub chan_by_topic: Reactive<HashMap<TopicPartition, Channel>>,
    pub chan_by_group: Reactive<HashMap<GroupId, Channel>>,
}

impl Default for RoutingTables {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingTables {
    pub fn new() -> Self {
        let chan_by_host = Reactive::new(HashMap::new());
        let host_by_node = Reactive::new(HashMap::new());
        let node_by_topic: Reactive<HashMap<TopicPartition, NodeId>> = Reactive::new(HashMap::new());
        let host_by_group: Reactive<HashMap<GroupId, Endpoint>> = Reactive::new(HashMap::new());

        // hostByTopic = hostByNode ∘ nodeByTopic; an intermediate map, not
        // part of the public surface, matching the composition the spec
        // writes out explicitly.
        let host_by_topic = combine_latest(&host_by_node, &node_by_topic, |hbn, nbt| {
            nbt.iter()
                .filter_map(|(tp, node)| hbn.get(node).cloned().map(|ep| (tp.clone(), ep)))
                .collect::<HashMap<_, _>>()
        });

        let chan_by_topic = combine_latest(&chan_by_host, &host_by_topic, |cbh, hbt| {
            hbt.iter()
                .filter_map(|(tp, ep)| cbh.get(ep).cloned().map(|ch| (tp.clone(), ch)))
                .collect::<HashMap<_, _>>()
        });

        let chan_by_group = combine_latest(&chan_by_host, &host_by_group, |cbh, hbg| {
            hbg.iter()
                .filter_map(|(g, ep)| cbh.get(ep).cloned().map(|ch| (g.clone(), ch)))
                .collect::<HashMap<_, _>>()
        });

        Self {
            chan_by_host,
            host_by_node,
            node_by_topic,
            host_by_group,
            chan_by_topic,
            chan_by_group,
        }
    }

    pub fn has_channel_for(&self, endpoint: &Endpoint) -> bool {
        self.chan_by_host.get_snapshot().contains_key(endpoint)
    }

    pub fn insert_channel(&self, endpoint: Endpoint, channel: Channel) {
        self.chan_by_host.update(|current| {
            let mut next = current.clone();
            next.insert(endpoint.clone(), channel.clone());
            next
        });
    }

    pub fn set_node_host(&self, node: NodeId, endpoint: Endpoint) {
        self.host_by_node.update(|current| {
            let mut next = current.clone();
            next.insert(node, endpoint.clone());
            next
        });
    }

    pub fn set_topic_node(&self, target: TopicPartition, node: NodeId) {
        self.node_by_topic.update(|current| {
            let mut next = current.clone();
            next.insert(target.clone(), node);
            next
        });
    }

    pub fn set_group_host(&self, group: GroupId, endpoint: Endpoint) {
        self.host_by_group.update(|current| {
            let mut next = current.clone();
            next.insert(group.clone(), endpoint.clone());
            next
        });
    }

    pub fn channel_for_host(&self, endpoint: &Endpoint) -> Option<Channel> {
        self.chan_by_host.get_snapshot().get(endpoint).cloned()
    }

    pub fn channel_for_topic(&self, target: &TopicPartition) -> Option<Channel> {
        self.chan_by_topic.get_snapshot().get(target).cloned()
    }

    pub fn channel_for_group(&self, group: &GroupId) -> Option<Channel> {
        self.chan_by_group.get_snapshot().get(group).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn chan_by_topic_settles_to_the_composition_of_its_inputs() {
        let tables = RoutingTables::new();
        let endpoint = Endpoint::new("broker-1", 9092);
        let channel = Channel::new(endpoint.clone(), "test-client");
        let node = NodeId(1);
        let target = TopicPartition::new("orders", 0);

        tables.insert_channel(endpoint.clone(), channel.clone());
        tables.set_node_host(node, endpoint.clone());
        tables.set_topic_node(target.clone(), node);
        settle().await;

        let resolved = tables.channel_for_topic(&target).expect("route should resolve");
        assert_eq!(resolved, channel);
    }

    #[tokio::test]
    async fn chan_by_topic_drops_entries_with_a_missing_intermediate() {
        let tables = RoutingTables::new();
        let target = TopicPartition::new("orders", 0);
        // node_by_topic points at a node with no known host: the composed
        // entry must not appear.
        tables.set_topic_node(target.clone(), NodeId(99));
        settle().await;

        assert!(tables.channel_for_topic(&target).is_none());
    }

    #[tokio::test]
    async fn chan_by_group_resolves_through_host_by_group() {
        let tables = RoutingTables::new();
        let endpoint = Endpoint::new("coordinator-1", 9092);
        let channel = Channel::new(endpoint.clone(), "test-client");

        tables.insert_channel(endpoint.clone(), channel.clone());
        tables.set_group_host("g1".to_string(), endpoint);
        settle().await;

        assert_eq!(tables.channel_for_group(&"g1".to_string()), Some(channel));
    }
}
