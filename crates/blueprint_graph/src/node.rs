// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node identity and the node-type contract.
//!
//! Concrete node types implement [`Node`] (port declaration, defaults,
//! validation, capabilities) and [`NodeType`] (static type key and display
//! metadata). A [`NodeRegistry`] maps type keys to the information the arena
//! needs to create pools for them, resolved once at registration time.

use crate::arena::{NodePool, Pool};
use crate::graph::SubgraphRef;
use crate::port::{DataType, PortDescriptor};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a typed node pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolId(pub u32);

/// Composite identifier of a node: its pool and its slot within that pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Pool holding every node of this node's concrete type
    pub pool: PoolId,
    /// Position within the pool
    pub slot: u32,
}

impl NodeId {
    /// Create a node ID from its parts
    pub fn new(pool: PoolId, slot: u32) -> Self {
        Self { pool, slot }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pool.0, self.slot)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Entry points (events)
    Event,
    /// Flow control
    Flow,
    /// Data sources and transforms
    Data,
    /// Embedded graphs and their boundaries
    Subgraph,
    /// Utility nodes
    Utility,
}

/// Capabilities a node exposes, checked against its declared ports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The node can be the target of control flow
    pub accepts_control: bool,
    /// The node can produce output of any type
    pub produces_any: bool,
    /// Types the node can produce
    pub produces: Vec<DataType>,
    /// The node resolves its own dynamic port types and links
    pub port_linker: bool,
}

impl Capabilities {
    /// No capabilities
    pub fn none() -> Self {
        Self::default()
    }

    /// Accept control flow
    pub fn accepts_control(mut self) -> Self {
        self.accepts_control = true;
        self
    }

    /// Produce output of any type
    pub fn produces_any(mut self) -> Self {
        self.produces_any = true;
        self
    }

    /// Produce output of `data_type`
    pub fn produces(mut self, data_type: DataType) -> Self {
        if !self.produces.contains(&data_type) {
            self.produces.push(data_type);
        }
        self
    }

    /// Resolve dynamic ports
    pub fn port_linker(mut self) -> Self {
        self.port_linker = true;
        self
    }

    /// Whether the node can produce output of `data_type`
    pub fn can_produce(&self, data_type: &DataType) -> bool {
        self.produces_any || self.produces.contains(data_type)
    }
}

/// Read-only view handed to nodes while they declare ports or validate
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// The node being processed
    pub id: NodeId,
    /// The embedded graph, for nodes that represent a subgraph
    pub subgraph: Option<&'a SubgraphRef>,
}

/// Port list being declared by a node
#[derive(Debug, Default)]
pub struct PortDeclaration {
    ports: Vec<PortDescriptor>,
}

impl PortDeclaration {
    /// Create an empty declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a port, returning its index
    pub fn add(&mut self, port: PortDescriptor) -> u32 {
        self.ports.push(port);
        (self.ports.len() - 1) as u32
    }

    /// Append several ports
    pub fn extend(&mut self, ports: impl IntoIterator<Item = PortDescriptor>) {
        self.ports.extend(ports);
    }

    /// Number of declared ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether no ports were declared
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Consume into the port list
    pub fn into_ports(self) -> Vec<PortDescriptor> {
        self.ports
    }
}

/// Behavior of a node instance
pub trait Node: fmt::Debug + 'static {
    /// Write this node's current ports, in display order
    fn declare_ports(&self, ctx: &NodeContext<'_>, ports: &mut PortDeclaration);

    /// Initialize field state after creation
    fn set_defaults(&mut self, _ctx: &NodeContext<'_>) {}

    /// Fix up field state after an edit, before the ports are regenerated
    fn on_validate(&mut self, _ctx: &NodeContext<'_>) {}

    /// Capabilities used to cross-check declared ports
    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }
}

/// Static metadata of a concrete node type
pub trait NodeType: Node + Default {
    /// Unique type key
    const KEY: &'static str;
    /// Display name
    const NAME: &'static str;
    /// Category
    const CATEGORY: NodeCategory;
    /// Description
    const DESCRIPTION: &'static str = "";
}

/// Registered node type, resolved once at registration
#[derive(Clone)]
pub struct NodeTypeInfo {
    /// Unique type key
    pub key: &'static str,
    /// Display name
    pub name: &'static str,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: &'static str,
    new_pool: fn() -> Box<dyn NodePool>,
}

impl NodeTypeInfo {
    /// Build the entry for `N`
    pub fn of<N: NodeType>() -> Self {
        Self {
            key: N::KEY,
            name: N::NAME,
            category: N::CATEGORY,
            description: N::DESCRIPTION,
            new_pool: || Box::new(Pool::<N>::new()),
        }
    }

    /// Create an empty pool for this type
    pub fn new_pool(&self) -> Box<dyn NodePool> {
        (self.new_pool)()
    }
}

impl fmt::Debug for NodeTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeInfo")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    /// Registered node types by key
    types: IndexMap<&'static str, NodeTypeInfo>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn register<N: NodeType>(&mut self) {
        self.types.insert(N::KEY, NodeTypeInfo::of::<N>());
    }

    /// Get a node type by key
    pub fn get(&self, key: &str) -> Option<&NodeTypeInfo> {
        self.types.get(key)
    }

    /// Whether a key is registered
    pub fn contains(&self, key: &str) -> bool {
        self.types.contains_key(key)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
