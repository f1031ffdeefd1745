// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-node port lists.
//!
//! Ports are indexed by `(pool, slot, port index)`. Index order is display
//! order and is also the key links are stored under.

use crate::node::{NodeId, PoolId};
use crate::port::{PortDescriptor, PortSignature};
use std::collections::HashMap;

/// Ordered port lists of every node in a graph
#[derive(Debug, Default, Clone)]
pub struct PortTable {
    /// Pool -> slot -> ports
    pools: HashMap<PoolId, Vec<Vec<PortDescriptor>>>,
    total: usize,
}

impl PortTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn slots_mut(&mut self, id: NodeId) -> &mut Vec<PortDescriptor> {
        let slots = self.pools.entry(id.pool).or_default();
        let slot = id.slot as usize;
        if slots.len() <= slot {
            slots.resize_with(slot + 1, Vec::new);
        }
        &mut slots[slot]
    }

    /// Append a port to a node's list, returning its index
    pub fn add_port(&mut self, id: NodeId, port: PortDescriptor) -> u32 {
        let ports = self.slots_mut(id);
        ports.push(port);
        let index = (ports.len() - 1) as u32;
        self.total += 1;
        index
    }

    /// Replace a node's whole list
    pub fn set_ports(&mut self, id: NodeId, ports: Vec<PortDescriptor>) {
        self.remove_node(id);
        if ports.is_empty() {
            return;
        }
        self.total += ports.len();
        *self.slots_mut(id) = ports;
    }

    /// A port by index
    pub fn port(&self, id: NodeId, index: u32) -> Option<&PortDescriptor> {
        self.ports(id).get(index as usize)
    }

    /// All ports of a node, in index order
    pub fn ports(&self, id: NodeId) -> &[PortDescriptor] {
        self.pools
            .get(&id.pool)
            .and_then(|slots| slots.get(id.slot as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of ports on a node
    pub fn port_count(&self, id: NodeId) -> usize {
        self.ports(id).len()
    }

    /// Number of ports across all nodes
    pub fn total_ports(&self) -> usize {
        self.total
    }

    /// Drop every port of a node, returning the removed list
    pub fn remove_node(&mut self, id: NodeId) -> Vec<PortDescriptor> {
        let Some(slots) = self.pools.get_mut(&id.pool) else {
            return Vec::new();
        };
        let Some(ports) = slots.get_mut(id.slot as usize) else {
            return Vec::new();
        };
        let removed = std::mem::take(ports);
        self.total -= removed.len();

        while slots.last().is_some_and(Vec::is_empty) {
            slots.pop();
        }
        if slots.is_empty() {
            self.pools.remove(&id.pool);
        }
        removed
    }

    /// Snapshot a node's ports keyed by signature.
    ///
    /// The snapshot owns its data and is unaffected by later edits to the table.
    pub fn signature_index(&self, id: NodeId) -> SignatureIndex {
        SignatureIndex::from_ports(self.ports(id))
    }
}

/// Signature -> port indices snapshot used while reconciling a regenerated list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignatureIndex {
    /// Indices per signature, ascending
    entries: HashMap<PortSignature, Vec<u32>>,
    len: usize,
}

impl SignatureIndex {
    /// Build an index over a port list
    pub fn from_ports(ports: &[PortDescriptor]) -> Self {
        let mut entries: HashMap<PortSignature, Vec<u32>> = HashMap::new();
        for (index, port) in ports.iter().enumerate() {
            entries.entry(port.signature()).or_default().push(index as u32);
        }
        Self {
            entries,
            len: ports.len(),
        }
    }

    /// Indices recorded for a signature
    pub fn get(&self, signature: PortSignature) -> &[u32] {
        self.entries.get(&signature).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Consume one entry for `signature`.
    ///
    /// Prefers the entry at `preferred`; otherwise takes the lowest remaining
    /// index. Consumed entries are never returned again.
    pub fn take(&mut self, signature: PortSignature, preferred: u32) -> Option<u32> {
        let indices = self.entries.get_mut(&signature)?;
        let position = indices
            .iter()
            .position(|&index| index == preferred)
            .unwrap_or(0);
        let index = indices.remove(position);
        if indices.is_empty() {
            self.entries.remove(&signature);
        }
        self.len -= 1;
        Some(index)
    }

    /// Indices not consumed yet, ascending
    pub fn remaining(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.entries.values().flatten().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Number of unconsumed entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether every entry was consumed
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::DataType;

    fn node(pool: u32, slot: u32) -> NodeId {
        NodeId::new(PoolId(pool), slot)
    }

    #[test]
    fn test_add_and_get() {
        let mut table = PortTable::new();
        let id = node(0, 3);
        assert_eq!(table.add_port(id, PortDescriptor::enter("In")), 0);
        assert_eq!(table.add_port(id, PortDescriptor::exit("Out")), 1);

        assert_eq!(table.port_count(id), 2);
        assert_eq!(table.port(id, 1).map(|p| p.name.as_str()), Some("Out"));
        assert!(table.port(id, 2).is_none());
        assert_eq!(table.port_count(node(0, 0)), 0);
        assert_eq!(table.port_count(node(7, 0)), 0);
    }

    #[test]
    fn test_remove_node() {
        let mut table = PortTable::new();
        let a = node(0, 0);
        let b = node(0, 1);
        table.add_port(a, PortDescriptor::enter("In"));
        table.add_port(b, PortDescriptor::enter("In"));
        table.add_port(b, PortDescriptor::exit("Out"));

        assert_eq!(table.remove_node(b).len(), 2);
        assert_eq!(table.port_count(a), 1);
        assert_eq!(table.total_ports(), 1);
        assert!(table.remove_node(b).is_empty());

        table.remove_node(a);
        assert_eq!(table.total_ports(), 0);
        assert!(table.pools.is_empty());
    }

    #[test]
    fn test_signature_index_is_a_snapshot() {
        let mut table = PortTable::new();
        let id = node(1, 0);
        let port = PortDescriptor::input("Value", DataType::int());
        table.add_port(id, port.clone());

        let index = table.signature_index(id);
        table.remove_node(id);
        assert_eq!(index.get(port.signature()), &[0]);
    }

    #[test]
    fn test_take_prefers_same_index_then_lowest() {
        let exit = PortDescriptor::exit("Then");
        let ports = vec![exit.clone(), PortDescriptor::enter("In"), exit.clone(), exit.clone()];
        let mut index = SignatureIndex::from_ports(&ports);
        let sig = exit.signature();

        assert_eq!(index.take(sig, 2), Some(2));
        assert_eq!(index.take(sig, 1), Some(0));
        assert_eq!(index.take(sig, 7), Some(3));
        assert_eq!(index.take(sig, 0), None);
        assert_eq!(index.remaining(), vec![1]);
        assert_eq!(index.len(), 1);
    }
}
