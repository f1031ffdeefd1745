// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed node arena.
//!
//! Node instances are grouped by concrete type into pools. A node is addressed
//! by `(pool, slot)`, which stays valid for the node's lifetime. Slots are
//! appended and never handed out twice within a pool, and pool IDs are never
//! reused, so a dead [`NodeId`] can never alias a live node.

use crate::node::{Node, NodeId, NodeType, NodeTypeInfo, PoolId};
use indexmap::IndexMap;
use std::any::Any;
use std::collections::HashMap;

/// Type-erased pool of nodes of one concrete type
pub trait NodePool: Any {
    /// Type key of the nodes in this pool
    fn type_key(&self) -> &'static str;

    /// Append a default-initialized node, returning its slot
    fn spawn(&mut self) -> u32;

    /// Free a slot; returns whether it held a node
    fn release(&mut self, slot: u32) -> bool;

    /// Whether a slot holds a live node
    fn contains(&self, slot: u32) -> bool;

    /// Number of live nodes
    fn live_count(&self) -> usize;

    /// Slots of all live nodes, ascending
    fn live_slots(&self) -> Vec<u32>;

    /// Access a node's behavior
    fn node(&self, slot: u32) -> Option<&dyn Node>;

    /// Mutable access to a node's behavior
    fn node_mut(&mut self, slot: u32) -> Option<&mut dyn Node>;

    /// Upcast for typed access
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Contiguous storage for nodes of type `N`
#[derive(Debug)]
pub struct Pool<N> {
    slots: Vec<Option<N>>,
    live: usize,
}

impl<N: NodeType> Pool<N> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Typed access to a slot
    pub fn get(&self, slot: u32) -> Option<&N> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    /// Typed mutable access to a slot
    pub fn get_mut(&mut self, slot: u32) -> Option<&mut N> {
        self.slots.get_mut(slot as usize).and_then(Option::as_mut)
    }

    /// Iterate live nodes with their slots
    pub fn iter(&self) -> impl Iterator<Item = (u32, &N)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.as_ref().map(|n| (slot as u32, n)))
    }
}

impl<N: NodeType> Default for Pool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NodeType> NodePool for Pool<N> {
    fn type_key(&self) -> &'static str {
        N::KEY
    }

    fn spawn(&mut self) -> u32 {
        self.slots.push(Some(N::default()));
        self.live += 1;
        (self.slots.len() - 1) as u32
    }

    fn release(&mut self, slot: u32) -> bool {
        match self.slots.get_mut(slot as usize) {
            Some(entry @ Some(_)) => {
                *entry = None;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    fn contains(&self, slot: u32) -> bool {
        self.get(slot).is_some()
    }

    fn live_count(&self) -> usize {
        self.live
    }

    fn live_slots(&self) -> Vec<u32> {
        self.iter().map(|(slot, _)| slot).collect()
    }

    fn node(&self, slot: u32) -> Option<&dyn Node> {
        self.get(slot).map(|n| n as &dyn Node)
    }

    fn node_mut(&mut self, slot: u32) -> Option<&mut dyn Node> {
        self.get_mut(slot).map(|n| n as &mut dyn Node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Allocates node instances grouped by concrete type
#[derive(Default)]
pub struct NodeArena {
    /// Live pools
    pools: IndexMap<PoolId, Box<dyn NodePool>>,
    /// Pool currently serving each type key
    by_type: HashMap<&'static str, PoolId>,
    next_pool: u32,
}

impl NodeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node of the given registered type
    pub fn add_node(&mut self, info: &NodeTypeInfo) -> NodeId {
        let pool_id = self.pool_for(info);
        let slot = self.pools[&pool_id].spawn();
        NodeId::new(pool_id, slot)
    }

    /// Allocate a node of type `N`
    pub fn add_typed<N: NodeType>(&mut self) -> NodeId {
        self.add_node(&NodeTypeInfo::of::<N>())
    }

    fn pool_for(&mut self, info: &NodeTypeInfo) -> PoolId {
        if let Some(id) = self.by_type.get(info.key) {
            return *id;
        }
        let id = PoolId(self.next_pool);
        self.next_pool += 1;
        self.pools.insert(id, info.new_pool());
        self.by_type.insert(info.key, id);
        tracing::debug!("Created node pool {} for {}", id.0, info.key);
        id
    }

    /// Free a node's slot, discarding its pool once empty
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(pool) = self.pools.get_mut(&id.pool) else {
            return false;
        };
        if !pool.release(id.slot) {
            return false;
        }
        if pool.live_count() == 0 {
            let key = pool.type_key();
            self.pools.shift_remove(&id.pool);
            self.by_type.remove(key);
            tracing::debug!("Released empty node pool {} for {}", id.pool.0, key);
        }
        true
    }

    /// Whether `id` refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.pools
            .get(&id.pool)
            .is_some_and(|pool| pool.contains(id.slot))
    }

    /// The pool serving `pool`, used to dispatch type-specific behavior
    pub fn get_source(&self, pool: PoolId) -> Option<&dyn NodePool> {
        self.pools.get(&pool).map(|pool| &**pool)
    }

    /// Mutable access to a pool
    pub fn get_source_mut(&mut self, pool: PoolId) -> Option<&mut dyn NodePool> {
        match self.pools.get_mut(&pool) {
            Some(pool) => Some(&mut **pool),
            None => None,
        }
    }

    /// A node's behavior
    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        self.get_source(id.pool)?.node(id.slot)
    }

    /// Mutable access to a node's behavior
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn Node> {
        self.get_source_mut(id.pool)?.node_mut(id.slot)
    }

    /// Typed access to a node
    pub fn get<N: NodeType>(&self, id: NodeId) -> Option<&N> {
        self.get_source(id.pool)?
            .as_any()
            .downcast_ref::<Pool<N>>()?
            .get(id.slot)
    }

    /// Typed mutable access to a node
    pub fn get_mut<N: NodeType>(&mut self, id: NodeId) -> Option<&mut N> {
        self.get_source_mut(id.pool)?
            .as_any_mut()
            .downcast_mut::<Pool<N>>()?
            .get_mut(id.slot)
    }

    /// Type key of a node
    pub fn type_key(&self, id: NodeId) -> Option<&'static str> {
        self.get_source(id.pool)
            .filter(|pool| pool.contains(id.slot))
            .map(|pool| pool.type_key())
    }

    /// Pool currently serving `key`, if any node of that type is live
    pub fn pool_of(&self, key: &str) -> Option<PoolId> {
        self.by_type.get(key).copied()
    }

    /// All live node IDs, grouped by pool
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.pools
            .iter()
            .flat_map(|(pool_id, pool)| {
                pool.live_slots()
                    .into_iter()
                    .map(move |slot| NodeId::new(*pool_id, slot))
            })
            .collect()
    }

    /// Number of live pools
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.pools.values().map(|pool| pool.live_count()).sum()
    }

    /// Whether no node is live
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl std::fmt::Debug for NodeArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeArena")
            .field("pools", &self.pools.len())
            .field("nodes", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::gameplay::{BranchNode, ConstantNode, SequenceNode};
    use crate::port::DataType;

    #[test]
    fn test_nodes_grouped_by_type() {
        let mut arena = NodeArena::new();
        let a = arena.add_typed::<BranchNode>();
        let b = arena.add_typed::<BranchNode>();
        let c = arena.add_typed::<SequenceNode>();

        assert_eq!(a.pool, b.pool);
        assert_ne!(a.pool, c.pool);
        assert_eq!((a.slot, b.slot), (0, 1));
        assert_eq!(arena.pool_count(), 2);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.type_key(c), Some(SequenceNode::KEY));
    }

    #[test]
    fn test_remove_releases_empty_pool() {
        let mut arena = NodeArena::new();
        let a = arena.add_typed::<BranchNode>();
        assert!(arena.remove_node(a));
        assert!(!arena.remove_node(a));
        assert!(!arena.contains(a));
        assert_eq!(arena.pool_count(), 0);
        assert!(arena.get_source(a.pool).is_none());
    }

    #[test]
    fn test_ids_never_alias() {
        let mut arena = NodeArena::new();
        let a = arena.add_typed::<BranchNode>();
        let b = arena.add_typed::<BranchNode>();
        arena.remove_node(a);
        let c = arena.add_typed::<BranchNode>();
        assert_ne!(c, a);
        assert_ne!(c, b);

        // Recreated pools get fresh IDs.
        arena.remove_node(b);
        arena.remove_node(c);
        let d = arena.add_typed::<BranchNode>();
        assert_ne!(d.pool, a.pool);
    }

    #[test]
    fn test_typed_access() {
        let mut arena = NodeArena::new();
        let id = arena.add_typed::<ConstantNode>();
        arena.get_mut::<ConstantNode>(id).unwrap().data_type = DataType::bool();

        assert_eq!(arena.get::<ConstantNode>(id).unwrap().data_type, DataType::bool());
        assert!(arena.get::<BranchNode>(id).is_none());
        assert!(arena.node(id).is_some());
    }
}
