// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) storage for the graph.
//!
//! Every link is recorded twice: in the outgoing list of its source port and in
//! the incoming list of its destination port, so both directions are direct
//! lookups. Storage is nested as node -> port -> direction -> endpoints.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One side of a link: a port on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning node
    pub node: NodeId,
    /// Port index on that node
    pub port: u32,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node: NodeId, port: u32) -> Self {
        Self { node, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.node, self.port)
    }
}

/// A directed edge; `from` is always the owning (output) side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    /// Source endpoint
    pub from: Endpoint,
    /// Destination endpoint
    pub to: Endpoint,
}

impl Link {
    /// Create a link
    pub fn new(from: Endpoint, to: Endpoint) -> Self {
        Self { from, to }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node: NodeId) -> bool {
        self.from.node == node || self.to.node == node
    }

    /// Check if this link involves a specific endpoint
    pub fn involves(&self, endpoint: Endpoint) -> bool {
        self.from == endpoint || self.to == endpoint
    }
}

/// Links recorded at one port, per direction
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortLinks {
    /// Destinations of links leaving this port
    pub outgoing: Vec<Endpoint>,
    /// Sources of links arriving at this port
    pub incoming: Vec<Endpoint>,
}

impl PortLinks {
    /// Whether no link touches this port
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty()
    }

    /// Number of links touching this port
    pub fn len(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }
}

/// Independent copy of every link touching one node
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Node the snapshot was taken for
    pub node: Option<NodeId>,
    /// Port index -> links at that port
    pub ports: BTreeMap<u32, PortLinks>,
}

impl LinkSnapshot {
    /// Links recorded at a port of the snapshotted node
    pub fn port(&self, port: u32) -> Option<&PortLinks> {
        self.ports.get(&port)
    }

    /// Total number of links in the snapshot
    pub fn link_count(&self) -> usize {
        self.ports.values().map(PortLinks::len).sum()
    }

    /// Whether the snapshot holds no link
    pub fn is_empty(&self) -> bool {
        self.ports.values().all(PortLinks::is_empty)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Outgoing,
    Incoming,
}

/// Bidirectional adjacency store
#[derive(Debug, Default, Clone)]
pub struct LinkTable {
    /// Node -> port -> links
    nodes: HashMap<NodeId, BTreeMap<u32, PortLinks>>,
    link_count: usize,
    linked_port_count: usize,
    defer_compaction: bool,
}

impl LinkTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn port_links(&self, endpoint: Endpoint) -> Option<&PortLinks> {
        self.nodes.get(&endpoint.node)?.get(&endpoint.port)
    }

    fn list_mut(&mut self, endpoint: Endpoint, side: Side) -> &mut Vec<Endpoint> {
        let links = self
            .nodes
            .entry(endpoint.node)
            .or_default()
            .entry(endpoint.port)
            .or_default();
        match side {
            Side::Outgoing => &mut links.outgoing,
            Side::Incoming => &mut links.incoming,
        }
    }

    fn is_linked(&self, endpoint: Endpoint) -> bool {
        self.port_links(endpoint).is_some_and(|links| !links.is_empty())
    }

    /// Record `other` in `at`'s list, keeping the linked-port total current
    fn attach(&mut self, at: Endpoint, other: Endpoint, side: Side) {
        if !self.is_linked(at) {
            self.linked_port_count += 1;
        }
        self.list_mut(at, side).push(other);
    }

    /// Remove `other` from `at`'s list; returns whether it was present
    fn detach(&mut self, at: Endpoint, other: Endpoint, side: Side) -> bool {
        let Some(links) = self
            .nodes
            .get_mut(&at.node)
            .and_then(|ports| ports.get_mut(&at.port))
        else {
            return false;
        };
        let list = match side {
            Side::Outgoing => &mut links.outgoing,
            Side::Incoming => &mut links.incoming,
        };
        let Some(position) = list.iter().position(|e| *e == other) else {
            return false;
        };
        list.remove(position);
        if links.is_empty() {
            self.linked_port_count -= 1;
            if !self.defer_compaction {
                self.prune(at);
            }
        }
        true
    }

    fn prune(&mut self, endpoint: Endpoint) {
        if let Some(ports) = self.nodes.get_mut(&endpoint.node) {
            if ports.get(&endpoint.port).is_some_and(PortLinks::is_empty) {
                ports.remove(&endpoint.port);
            }
            if ports.is_empty() {
                self.nodes.remove(&endpoint.node);
            }
        }
    }

    /// Record a link from both endpoints. Returns `false` if it already exists.
    pub fn add_link(&mut self, from: Endpoint, to: Endpoint) -> bool {
        if self.contains_link(from, to) {
            return false;
        }
        self.attach(from, to, Side::Outgoing);
        self.attach(to, from, Side::Incoming);
        self.link_count += 1;
        true
    }

    /// Remove a link from both endpoints. Returns whether anything was removed.
    pub fn remove_link(&mut self, from: Endpoint, to: Endpoint) -> bool {
        if !self.detach(from, to, Side::Outgoing) {
            return false;
        }
        self.detach(to, from, Side::Incoming);
        self.link_count -= 1;
        true
    }

    /// Whether the link exists
    pub fn contains_link(&self, from: Endpoint, to: Endpoint) -> bool {
        self.outgoing(from).contains(&to)
    }

    /// Destinations of links leaving a port, in insertion order
    pub fn outgoing(&self, endpoint: Endpoint) -> &[Endpoint] {
        self.port_links(endpoint)
            .map(|links| links.outgoing.as_slice())
            .unwrap_or(&[])
    }

    /// Sources of links arriving at a port, in insertion order
    pub fn incoming(&self, endpoint: Endpoint) -> &[Endpoint] {
        self.port_links(endpoint)
            .map(|links| links.incoming.as_slice())
            .unwrap_or(&[])
    }

    /// Number of links touching a port
    pub fn port_link_count(&self, endpoint: Endpoint) -> usize {
        self.port_links(endpoint).map_or(0, PortLinks::len)
    }

    /// Remove every link touching one port, in both directions
    pub fn remove_port(&mut self, endpoint: Endpoint) -> usize {
        let Some(links) = self.port_links(endpoint).cloned() else {
            return 0;
        };
        let mut removed = 0;
        for to in links.outgoing {
            removed += usize::from(self.remove_link(endpoint, to));
        }
        for from in links.incoming {
            removed += usize::from(self.remove_link(from, endpoint));
        }
        removed
    }

    /// Remove every link touching any port of a node
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let ports: Vec<u32> = match self.nodes.get(&node) {
            Some(ports) => ports.keys().copied().collect(),
            None => return 0,
        };
        self.batch(|table| {
            ports
                .into_iter()
                .map(|port| table.remove_port(Endpoint::new(node, port)))
                .sum()
        })
    }

    /// Deep copy of every link touching a node
    pub fn copy_links(&self, node: NodeId) -> LinkSnapshot {
        LinkSnapshot {
            node: Some(node),
            ports: self
                .nodes
                .get(&node)
                .map(|ports| {
                    ports
                        .iter()
                        .filter(|(_, links)| !links.is_empty())
                        .map(|(port, links)| (*port, links.clone()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// All links, each reported once from its source side
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .nodes
            .iter()
            .flat_map(|(node, ports)| {
                ports.iter().flat_map(move |(port, port_links)| {
                    let from = Endpoint::new(*node, *port);
                    port_links.outgoing.iter().map(move |to| Link::new(from, *to))
                })
            })
            .collect();
        links.sort_unstable();
        links
    }

    /// Total number of links
    pub fn link_count(&self) -> usize {
        self.link_count
    }

    /// Number of ports with at least one link
    pub fn linked_port_count(&self) -> usize {
        self.linked_port_count
    }

    /// Whether empty containers are kept until the next [`Self::compact`]
    pub fn is_compaction_deferred(&self) -> bool {
        self.defer_compaction
    }

    /// Defer or resume compaction; resuming compacts immediately
    pub fn set_defer_compaction(&mut self, defer: bool) {
        self.defer_compaction = defer;
        if !defer {
            self.compact();
        }
    }

    /// Run `f` with compaction deferred, compacting once at the end
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_deferred = self.defer_compaction;
        self.defer_compaction = true;
        let result = f(self);
        self.defer_compaction = was_deferred;
        if !was_deferred {
            self.compact();
        }
        result
    }

    /// Drop empty port and node entries left behind by removals
    pub fn compact(&mut self) {
        if self.link_count == 0 {
            self.release_storage();
            return;
        }
        self.nodes.retain(|_, ports| {
            ports.retain(|_, links| !links.is_empty());
            !ports.is_empty()
        });
    }

    /// Discard all internal storage once no link remains
    pub fn release_storage(&mut self) {
        if self.link_count == 0 {
            self.nodes = HashMap::new();
            self.linked_port_count = 0;
        }
    }

    /// Number of node entries currently allocated
    pub fn node_entry_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::PoolId;

    fn ep(slot: u32, port: u32) -> Endpoint {
        Endpoint::new(NodeId::new(PoolId(0), slot), port)
    }

    #[test]
    fn test_add_is_bidirectional() {
        let mut table = LinkTable::new();
        assert!(table.add_link(ep(0, 1), ep(1, 0)));
        assert!(!table.add_link(ep(0, 1), ep(1, 0)));

        assert_eq!(table.outgoing(ep(0, 1)), &[ep(1, 0)]);
        assert_eq!(table.incoming(ep(1, 0)), &[ep(0, 1)]);
        assert!(table.contains_link(ep(0, 1), ep(1, 0)));
        assert!(!table.contains_link(ep(1, 0), ep(0, 1)));
        assert_eq!(table.link_count(), 1);
        assert_eq!(table.linked_port_count(), 2);
    }

    #[test]
    fn test_remove_link_idempotent() {
        let mut table = LinkTable::new();
        table.add_link(ep(0, 0), ep(1, 0));
        table.add_link(ep(0, 0), ep(2, 0));

        assert!(table.remove_link(ep(0, 0), ep(1, 0)));
        assert!(!table.remove_link(ep(0, 0), ep(1, 0)));
        assert_eq!(table.link_count(), 1);
        assert_eq!(table.linked_port_count(), 2);
        assert!(table.incoming(ep(1, 0)).is_empty());
    }

    #[test]
    fn test_remove_port_and_node() {
        let mut table = LinkTable::new();
        table.add_link(ep(0, 0), ep(1, 0));
        table.add_link(ep(0, 0), ep(2, 0));
        table.add_link(ep(3, 0), ep(0, 1));
        table.add_link(ep(3, 0), ep(1, 1));

        assert_eq!(table.remove_port(ep(0, 0)), 2);
        assert_eq!(table.link_count(), 2);

        assert_eq!(table.remove_node(ep(0, 0).node), 1);
        assert_eq!(table.links(), vec![Link::new(ep(3, 0), ep(1, 1))]);
        assert_eq!(table.linked_port_count(), 2);
        assert_eq!(table.node_entry_count(), 2);
    }

    #[test]
    fn test_copy_links_is_independent() {
        let mut table = LinkTable::new();
        table.add_link(ep(0, 0), ep(1, 0));
        table.add_link(ep(2, 0), ep(0, 1));

        let snapshot = table.copy_links(ep(0, 0).node);
        table.remove_node(ep(0, 0).node);

        assert_eq!(snapshot.link_count(), 2);
        assert_eq!(snapshot.port(0).unwrap().outgoing, vec![ep(1, 0)]);
        assert_eq!(snapshot.port(1).unwrap().incoming, vec![ep(2, 0)]);
        assert_eq!(table.link_count(), 0);
    }

    #[test]
    fn test_deferred_compaction() {
        let mut table = LinkTable::new();
        table.add_link(ep(0, 0), ep(1, 0));
        table.add_link(ep(2, 0), ep(3, 0));

        table.set_defer_compaction(true);
        table.remove_link(ep(0, 0), ep(1, 0));
        assert_eq!(table.node_entry_count(), 4);
        assert_eq!(table.linked_port_count(), 2);

        table.set_defer_compaction(false);
        assert_eq!(table.node_entry_count(), 2);
    }

    #[test]
    fn test_storage_released_when_empty() {
        let mut table = LinkTable::new();
        table.add_link(ep(0, 0), ep(1, 0));
        table.batch(|t| t.remove_link(ep(0, 0), ep(1, 0)));
        assert_eq!(table.node_entry_count(), 0);
        assert_eq!(table.linked_port_count(), 0);
    }
}
