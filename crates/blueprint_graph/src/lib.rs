// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint graph IR for the `OrdoPlay` Editor.
//!
//! This crate holds the in-memory model of node graphs authored in the editor:
//! - Nodes stored in typed pools, one pool per node type
//! - Port schemas regenerated from node state and reconciled by signature
//! - Bidirectional links with per-port capacity rules
//! - Subgraph composition with cycle and depth checks
//!
//! ## Architecture
//!
//! [`GraphMeta`] is the single entry point for structural edits and keeps the
//! [`NodeArena`], [`PortTable`] and [`LinkTable`] in step. [`GraphLibrary`]
//! owns graph assets and validates subgraph references between them.
//! Compatibility rules live in [`validation`].

pub mod arena;
pub mod config;
pub mod error;
pub mod graph;
pub mod graphs;
pub mod library;
pub mod link;
pub mod node;
pub mod port;
pub mod port_table;
pub mod validation;

pub use arena::{NodeArena, NodePool, Pool};
pub use config::{GraphConfig, LinkOrder};
pub use error::{ConfigError, Diagnostic, Severity};
pub use graph::{GraphId, GraphMeta, LinkRecord, Position, SubgraphRef};
pub use library::GraphLibrary;
pub use link::{Endpoint, Link, LinkTable};
pub use node::{
    Capabilities, Node, NodeCategory, NodeContext, NodeId, NodeRegistry, NodeType, PoolId,
    PortDeclaration,
};
pub use port::{Capacity, DataType, LayoutSide, PortDescriptor, PortDirection, PortKind, PortSignature};
pub use port_table::PortTable;
pub use validation::{are_ports_compatible, validate_port_declaration, PortIssue};
