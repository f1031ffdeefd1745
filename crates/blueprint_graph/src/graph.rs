// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph metadata: the orchestrator over node arena, port table and link table.
//!
//! All structural edits go through [`GraphMeta`]. Edits return `bool` (or
//! `Option`) and never partially apply; the editor polls the return value.
//! Consumers are told about changes through a synchronous callback invoked at
//! the end of the mutating call. The callback must not re-enter the graph.

use crate::arena::NodeArena;
use crate::config::{GraphConfig, LinkOrder};
use crate::error::Diagnostic;
use crate::link::{Endpoint, Link, LinkTable};
use crate::node::{Node, NodeContext, NodeId, NodeRegistry, NodeType, PortDeclaration};
use crate::port::{PortDescriptor, PortDirection};
use crate::port_table::PortTable;
use crate::validation::{are_ports_compatible, validate_port_declaration, PortIssue};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a graph asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoring-time layout position of a node
pub type Position = [f32; 2];

/// A node's reference to an embedded graph asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphRef {
    /// The embedded graph
    pub asset: GraphId,
    /// External ports fetched from the embedded graph, as seen by the parent
    pub ports: Vec<PortDescriptor>,
}

/// One link as persisted by the host: `(from node, from port, to node, to port)`
pub type LinkRecord = (NodeId, u32, NodeId, u32);

type ChangeListener = Box<dyn FnMut(NodeId, bool)>;

/// A node graph
pub struct GraphMeta {
    id: GraphId,
    /// Graph name
    pub name: String,
    registry: Arc<NodeRegistry>,
    config: GraphConfig,
    arena: NodeArena,
    ports: PortTable,
    links: LinkTable,
    /// Live nodes in creation order
    nodes: IndexSet<NodeId>,
    positions: HashMap<NodeId, Position>,
    subgraphs: HashMap<NodeId, SubgraphRef>,
    listener: Option<ChangeListener>,
    diagnostics: Vec<Diagnostic>,
    /// Declaration issues last reported per node
    declaration_issues: HashMap<NodeId, Vec<PortIssue>>,
}

impl GraphMeta {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, registry: Arc<NodeRegistry>) -> Self {
        Self::with_config(name, registry, GraphConfig::default())
    }

    /// Create a new empty graph with explicit settings
    pub fn with_config(
        name: impl Into<String>,
        registry: Arc<NodeRegistry>,
        config: GraphConfig,
    ) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            registry,
            config,
            arena: NodeArena::new(),
            ports: PortTable::new(),
            links: LinkTable::new(),
            nodes: IndexSet::new(),
            positions: HashMap::new(),
            subgraphs: HashMap::new(),
            listener: None,
            diagnostics: Vec::new(),
            declaration_issues: HashMap::new(),
        }
    }

    /// Graph asset ID
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Node types available to this graph
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Settings
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Install the `(node, ports_changed)` change callback
    pub fn set_change_listener(&mut self, listener: impl FnMut(NodeId, bool) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Remove the change callback
    pub fn clear_change_listener(&mut self) {
        self.listener = None;
    }

    fn notify(&mut self, id: NodeId, ports_changed: bool) {
        if let Some(listener) = self.listener.as_mut() {
            listener(id, ports_changed);
        }
    }

    fn warn(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        let diagnostic = Diagnostic::warning(Some(self.id), node, message);
        diagnostic.emit();
        self.diagnostics.push(diagnostic);
    }

    /// Drain the diagnostics raised since the last call
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    /// Add a node of a registered type. Returns `None` for unknown types.
    pub fn add_node(&mut self, type_key: &str, position: Position) -> Option<NodeId> {
        let Some(info) = self.registry.get(type_key) else {
            tracing::debug!("Rejected node of unknown type {}", type_key);
            return None;
        };
        let id = self.arena.add_node(info);
        self.finish_add(id, position);
        Some(id)
    }

    /// Add a node of type `N`
    pub fn add_typed<N: NodeType>(&mut self, position: Position) -> NodeId {
        let id = self.arena.add_typed::<N>();
        self.finish_add(id, position);
        id
    }

    fn finish_add(&mut self, id: NodeId, position: Position) {
        self.nodes.insert(id);
        if let Some(ports) = self.declare(id) {
            self.ports.set_ports(id, ports);
        }

        let ctx = NodeContext {
            id,
            subgraph: self.subgraphs.get(&id),
        };
        if let Some(node) = self.arena.node_mut(id) {
            node.set_defaults(&ctx);
            node.on_validate(&ctx);
        }
        // Defaults may reshape the ports declared above
        self.reconcile(id, false);

        self.positions.insert(id, position);
        tracing::debug!("Added node {} ({:?})", id, self.arena.type_key(id));
        self.notify(id, false);
    }

    /// Remove a node with all its ports and links
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.nodes.contains(&id) {
            return false;
        }

        let removed_links = self.links.remove_node(id);
        if self.links.link_count() == 0 {
            self.links.release_storage();
        }
        self.ports.remove_node(id);
        self.positions.remove(&id);
        self.subgraphs.remove(&id);
        self.declaration_issues.remove(&id);
        self.arena.remove_node(id);
        self.nodes.shift_remove(&id);

        tracing::debug!("Removed node {} and {} links", id, removed_links);
        self.notify(id, true);
        true
    }

    /// Whether a node exists
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// All nodes in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Type key of a node
    pub fn type_key(&self, id: NodeId) -> Option<&'static str> {
        self.arena.type_key(id)
    }

    /// A node's behavior
    pub fn node_behavior(&self, id: NodeId) -> Option<&dyn Node> {
        self.arena.node(id)
    }

    /// Typed access to a node
    pub fn node<N: NodeType>(&self, id: NodeId) -> Option<&N> {
        self.arena.get::<N>(id)
    }

    /// Edit a node's fields, then validate it and regenerate its ports with
    /// link migration. Returns `false` if the node is missing or not an `N`.
    pub fn edit_node<N: NodeType>(&mut self, id: NodeId, edit: impl FnOnce(&mut N)) -> bool {
        let ctx = NodeContext {
            id,
            subgraph: self.subgraphs.get(&id),
        };
        let Some(node) = self.arena.get_mut::<N>(id) else {
            return false;
        };
        edit(node);
        node.on_validate(&ctx);
        self.invalidate_node(id, true, false);
        true
    }

    /// Layout position of a node
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// Move a node
    pub fn set_position(&mut self, id: NodeId, position: Position) -> bool {
        match self.positions.get_mut(&id) {
            Some(slot) => {
                *slot = position;
                true
            }
            None => false,
        }
    }

    // ---------------------------------------------------------------------
    // Ports
    // ---------------------------------------------------------------------

    /// All ports of a node, in index order
    pub fn ports(&self, id: NodeId) -> &[PortDescriptor] {
        self.ports.ports(id)
    }

    /// A port by index
    pub fn port(&self, endpoint: Endpoint) -> Option<&PortDescriptor> {
        self.ports.port(endpoint.node, endpoint.port)
    }

    /// Number of ports on a node
    pub fn port_count(&self, id: NodeId) -> usize {
        self.ports.port_count(id)
    }

    fn declare(&self, id: NodeId) -> Option<Vec<PortDescriptor>> {
        let node = self.arena.node(id)?;
        let ctx = NodeContext {
            id,
            subgraph: self.subgraphs.get(&id),
        };
        let mut ports = PortDeclaration::new();
        node.declare_ports(&ctx, &mut ports);
        Some(ports.into_ports())
    }

    /// Cross-check a node's ports against its capabilities
    pub fn validate_node_ports(&self, id: NodeId) -> Vec<PortIssue> {
        match self.arena.node(id) {
            Some(node) => validate_port_declaration(self.ports.ports(id), &node.capabilities()),
            None => Vec::new(),
        }
    }

    /// Regenerate a node's ports and reconcile them with the previous list.
    ///
    /// New ports are matched to old ones by signature, preferring the same
    /// index. With `migrate_links`, links of every matched port move to its new
    /// index; links of old ports left unmatched are dropped. Returns whether
    /// the port list changed; consumers are notified when it did, or always
    /// with `force_notify`.
    pub fn invalidate_node(&mut self, id: NodeId, migrate_links: bool, force_notify: bool) -> bool {
        if !self.nodes.contains(&id) {
            return false;
        }
        let changed = self.reconcile(id, migrate_links);
        if changed || force_notify {
            self.notify(id, changed);
        }
        changed
    }

    fn reconcile(&mut self, id: NodeId, migrate_links: bool) -> bool {
        let Some(new_ports) = self.declare(id) else {
            return false;
        };

        let old_ports = self.ports.ports(id).to_vec();
        let mut old_index = self.ports.signature_index(id);
        let snapshot = migrate_links.then(|| self.links.copy_links(id));

        let mut changed = new_ports.len() != old_ports.len();
        // (new index, old index)
        let mut matches = Vec::new();
        for (index, port) in new_ports.iter().enumerate() {
            let index = index as u32;
            match old_index.take(port.signature(), index) {
                Some(old) => {
                    if old != index || old_ports[old as usize] != *port {
                        changed = true;
                    }
                    matches.push((index, old));
                }
                None => changed = true,
            }
        }
        if !old_index.is_empty() {
            changed = true;
            tracing::debug!(
                "Node {} dropped ports {:?} during reconciliation",
                id,
                old_index.remaining()
            );
        }

        self.ports.set_ports(id, new_ports);

        let ports = &self.ports;
        self.links.batch(|links| {
            links.remove_node(id);
            let Some(snapshot) = &snapshot else {
                return;
            };
            for (index, old) in matches {
                let Some(recorded) = snapshot.port(old) else {
                    continue;
                };
                let here = Endpoint::new(id, index);
                let Some(port) = ports.port(id, index) else {
                    continue;
                };
                let compatible = |other: Endpoint| {
                    ports
                        .port(other.node, other.port)
                        .is_some_and(|other| are_ports_compatible(port, other))
                };
                for &to in &recorded.outgoing {
                    if !port.is_multiple() && links.port_link_count(here) > 0 {
                        break;
                    }
                    if compatible(to) {
                        links.add_link(here, to);
                    }
                }
                for &from in &recorded.incoming {
                    if !port.is_multiple() && links.port_link_count(here) > 0 {
                        break;
                    }
                    if compatible(from) {
                        links.add_link(from, here);
                    }
                }
            }
        });

        if self.config.validate_declarations {
            self.report_declaration_issues(id);
        }
        changed
    }

    /// Warn about a node's declaration issues when they differ from the last report
    fn report_declaration_issues(&mut self, id: NodeId) {
        let issues = self.validate_node_ports(id);
        let previous = self.declaration_issues.get(&id).map_or(&[][..], Vec::as_slice);
        if previous == issues.as_slice() {
            return;
        }
        for issue in &issues {
            self.warn(Some(id), issue.to_string());
        }
        if issues.is_empty() {
            self.declaration_issues.remove(&id);
        } else {
            self.declaration_issues.insert(id, issues);
        }
    }

    // ---------------------------------------------------------------------
    // Links
    // ---------------------------------------------------------------------

    /// Whether two endpoints may be linked
    pub fn can_link(&self, a: Endpoint, b: Endpoint) -> bool {
        if a.node == b.node {
            return false;
        }
        match (self.port(a), self.port(b)) {
            (Some(port_a), Some(port_b)) => are_ports_compatible(port_a, port_b),
            _ => false,
        }
    }

    /// Link two ports, in either order.
    ///
    /// The output side becomes the link's `from`. A single-capacity endpoint
    /// drops its existing link first. Returns `false` for missing nodes or
    /// ports, same-node pairs, incompatible ports and links that already exist.
    pub fn try_create_link(&mut self, a: Endpoint, b: Endpoint) -> bool {
        if !self.can_link(a, b) {
            tracing::debug!("Rejected link {} -> {}", a, b);
            return false;
        }
        let (Some(port_a), Some(port_b)) = (self.port(a), self.port(b)) else {
            return false;
        };
        let a_is_output = port_a.direction == PortDirection::Output;
        let (from, to, from_single, to_single) = if a_is_output {
            (a, b, !port_a.is_multiple(), !port_b.is_multiple())
        } else {
            (b, a, !port_b.is_multiple(), !port_a.is_multiple())
        };

        if self.links.contains_link(from, to) {
            return false;
        }

        self.links.batch(|links| {
            if from_single {
                for existing in links.outgoing(from).to_vec() {
                    links.remove_link(from, existing);
                }
            }
            if to_single {
                for existing in links.incoming(to).to_vec() {
                    links.remove_link(existing, to);
                }
            }
            links.add_link(from, to)
        })
    }

    /// Remove a link given its endpoints in either order
    pub fn remove_link(&mut self, a: Endpoint, b: Endpoint) -> bool {
        let removed = self.links.remove_link(a, b) || self.links.remove_link(b, a);
        if removed && self.links.link_count() == 0 {
            self.links.release_storage();
        }
        removed
    }

    /// Remove every link touching one port
    pub fn disconnect_port(&mut self, endpoint: Endpoint) -> usize {
        let removed = self.links.remove_port(endpoint);
        if self.links.link_count() == 0 {
            self.links.release_storage();
        }
        removed
    }

    /// Whether the link `from -> to` exists
    pub fn contains_link(&self, from: Endpoint, to: Endpoint) -> bool {
        self.links.contains_link(from, to)
    }

    fn order_endpoints(&self, endpoints: &[Endpoint]) -> Vec<Endpoint> {
        let y = |endpoint: &Endpoint| self.positions.get(&endpoint.node).map_or(0.0, |p| p[1]);
        let mut ordered = endpoints.to_vec();
        ordered.sort_by(|a, b| {
            let by_y = match self.config.link_order {
                LinkOrder::DescendingY => y(b).total_cmp(&y(a)),
                LinkOrder::AscendingY => y(a).total_cmp(&y(b)),
            };
            by_y.then(a.port.cmp(&b.port)).then(a.node.cmp(&b.node))
        });
        ordered
    }

    /// Destinations of links leaving a port, in [`LinkOrder`]
    pub fn links_from(&self, endpoint: Endpoint) -> Vec<Endpoint> {
        self.order_endpoints(self.links.outgoing(endpoint))
    }

    /// Sources of links arriving at a port, in [`LinkOrder`]
    pub fn links_to(&self, endpoint: Endpoint) -> Vec<Endpoint> {
        self.order_endpoints(self.links.incoming(endpoint))
    }

    /// All links
    pub fn links(&self) -> Vec<Link> {
        self.links.links()
    }

    /// All links as persisted tuples
    pub fn link_records(&self) -> Vec<LinkRecord> {
        self.links
            .links()
            .into_iter()
            .map(|link| (link.from.node, link.from.port, link.to.node, link.to.port))
            .collect()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.links.link_count()
    }

    /// Number of ports with at least one link
    pub fn linked_port_count(&self) -> usize {
        self.links.linked_port_count()
    }

    /// Every endpoint in the graph that `endpoint` may be linked to
    pub fn compatible_targets(&self, endpoint: Endpoint) -> Vec<Endpoint> {
        if self.port(endpoint).is_none() {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|node| **node != endpoint.node)
            .flat_map(|node| {
                (0..self.ports.port_count(*node) as u32).map(move |port| Endpoint::new(*node, port))
            })
            .filter(|candidate| self.can_link(endpoint, *candidate))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Subgraphs
    // ---------------------------------------------------------------------

    /// A node's embedded graph
    pub fn subgraph(&self, id: NodeId) -> Option<&SubgraphRef> {
        self.subgraphs.get(&id)
    }

    /// Every `(node, embedded graph)` pair
    pub fn subgraph_refs(&self) -> impl Iterator<Item = (NodeId, GraphId)> + '_ {
        self.subgraphs.iter().map(|(node, sub)| (*node, sub.asset))
    }

    /// Store or clear a node's subgraph reference without validation or port
    /// regeneration. [`GraphLibrary`](crate::library::GraphLibrary) validates
    /// the assignment and invalidates the node afterwards.
    pub(crate) fn set_subgraph_ref(&mut self, id: NodeId, subgraph: Option<SubgraphRef>) -> bool {
        if !self.nodes.contains(&id) {
            return false;
        }
        match subgraph {
            Some(subgraph) => self.subgraphs.insert(id, subgraph),
            None => self.subgraphs.remove(&id),
        };
        true
    }
}

impl fmt::Debug for GraphMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("links", &self.links.link_count())
            .field("subgraphs", &self.subgraphs.len())
            .finish_non_exhaustive()
    }
}
