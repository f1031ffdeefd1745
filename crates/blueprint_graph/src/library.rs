// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph asset library and subgraph composition.
//!
//! A graph may embed another graph through a subgraph node. Before a reference
//! is stored, [`GraphLibrary::validate_subgraph_assignment`] walks the
//! candidate's own references depth-first and refuses the assignment if it
//! would make a graph contain itself, or if the nesting exceeds the configured
//! ceiling.

use crate::config::GraphConfig;
use crate::error::Diagnostic;
use crate::graph::{GraphId, GraphMeta, SubgraphRef};
use crate::node::{NodeId, NodeRegistry};
use crate::port::{PortDescriptor, PortDirection, PortKind};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Owns graph assets and composes them as subgraphs
#[derive(Debug)]
pub struct GraphLibrary {
    registry: Arc<NodeRegistry>,
    config: GraphConfig,
    graphs: IndexMap<GraphId, GraphMeta>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphLibrary {
    /// Create an empty library
    pub fn new(registry: NodeRegistry) -> Self {
        Self::with_config(registry, GraphConfig::default())
    }

    /// Create an empty library with explicit settings
    pub fn with_config(registry: NodeRegistry, config: GraphConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
            graphs: IndexMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Settings shared by every graph
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Node types shared by every graph
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Create a new empty graph
    pub fn create_graph(&mut self, name: impl Into<String>) -> GraphId {
        let graph = GraphMeta::with_config(name, Arc::clone(&self.registry), self.config.clone());
        let id = graph.id();
        self.graphs.insert(id, graph);
        id
    }

    /// Remove a graph. Nodes embedding it keep their fetched ports.
    pub fn remove_graph(&mut self, id: GraphId) -> Option<GraphMeta> {
        self.graphs.shift_remove(&id)
    }

    /// Get a graph by ID
    pub fn graph(&self, id: GraphId) -> Option<&GraphMeta> {
        self.graphs.get(&id)
    }

    /// Get a mutable graph by ID
    pub fn graph_mut(&mut self, id: GraphId) -> Option<&mut GraphMeta> {
        self.graphs.get_mut(&id)
    }

    /// All graph IDs
    pub fn graph_ids(&self) -> impl Iterator<Item = GraphId> + '_ {
        self.graphs.keys().copied()
    }

    /// Number of graphs
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Drain the diagnostics raised since the last call
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in &diagnostics {
            diagnostic.emit();
        }
        self.diagnostics.extend(diagnostics);
    }

    /// Check whether `root` may embed `candidate`.
    ///
    /// `None` always passes (it clears the reference). A candidate that is
    /// `root`, or that reaches `root` through its own subgraph references, is
    /// refused, as is any chain nested deeper than the configured ceiling.
    pub fn validate_subgraph_assignment(&mut self, root: GraphId, candidate: Option<GraphId>) -> bool {
        let mut diagnostics = Vec::new();
        let valid = self.check_assignment(root, candidate, &mut diagnostics);
        self.report(diagnostics);
        valid
    }

    fn check_assignment(
        &self,
        root: GraphId,
        candidate: Option<GraphId>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        let Some(candidate) = candidate else {
            return true;
        };
        if !self.graphs.contains_key(&candidate) {
            diagnostics.push(Diagnostic::warning(
                Some(root),
                None,
                format!("Subgraph {candidate} is not in the library"),
            ));
            return false;
        }
        self.check_nested(root, candidate, 1, &mut HashMap::new(), diagnostics)
    }

    /// `checked` holds the deepest depth at which each graph already passed.
    /// Passing there implies passing at any shallower depth, so shared
    /// references are walked once per distinct depth rather than once per path.
    fn check_nested(
        &self,
        root: GraphId,
        candidate: GraphId,
        depth: usize,
        checked: &mut HashMap<GraphId, usize>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        if depth > self.config.max_subgraph_depth {
            diagnostics.push(Diagnostic::warning(
                Some(root),
                None,
                format!(
                    "Subgraph nesting under {candidate} exceeds the depth limit of {}",
                    self.config.max_subgraph_depth
                ),
            ));
            return false;
        }
        if candidate == root {
            tracing::debug!("Refused subgraph assignment: {} would contain itself", root);
            return false;
        }
        if checked.get(&candidate).is_some_and(|passed| *passed >= depth) {
            return true;
        }
        // Unloaded assets have nothing to descend into
        let Some(graph) = self.graphs.get(&candidate) else {
            return true;
        };
        let valid = graph
            .subgraph_refs()
            .all(|(_, asset)| self.check_nested(root, asset, depth + 1, checked, diagnostics));
        if valid {
            checked.insert(candidate, depth);
        }
        valid
    }

    /// External ports of a graph as they appear on a node embedding it.
    ///
    /// Ports with the same signature collapse into one. Duplicate data outputs
    /// are reported, since it is ambiguous which internal source feeds the
    /// parent; duplicate enters, exits and inputs are fine.
    pub fn external_ports(&mut self, asset: GraphId) -> Option<Vec<PortDescriptor>> {
        let mut diagnostics = Vec::new();
        let ports = self
            .graphs
            .get(&asset)
            .map(|graph| collect_external_ports(graph, &mut diagnostics));
        self.report(diagnostics);
        ports
    }

    /// Point a node of `graph` at `candidate` (or clear it with `None`).
    ///
    /// Validates the assignment, fetches the candidate's external ports and
    /// regenerates the node's ports, migrating links by signature.
    pub fn assign_subgraph(
        &mut self,
        graph: GraphId,
        node: NodeId,
        candidate: Option<GraphId>,
    ) -> bool {
        if !self
            .graphs
            .get(&graph)
            .is_some_and(|meta| meta.contains_node(node))
        {
            return false;
        }
        if !self.validate_subgraph_assignment(graph, candidate) {
            return false;
        }

        let subgraph = match candidate {
            Some(asset) => match self.external_ports(asset) {
                Some(ports) => Some(SubgraphRef { asset, ports }),
                None => return false,
            },
            None => None,
        };

        let Some(meta) = self.graphs.get_mut(&graph) else {
            return false;
        };
        meta.set_subgraph_ref(node, subgraph);
        meta.invalidate_node(node, true, true);
        tracing::debug!("Assigned subgraph {:?} to node {} of {}", candidate, node, graph);
        true
    }

    /// Re-fetch `asset`'s external ports into every node embedding it.
    /// Returns the number of nodes refreshed.
    pub fn refresh_subgraph_nodes(&mut self, asset: GraphId) -> usize {
        let Some(ports) = self.external_ports(asset) else {
            return 0;
        };

        let mut refreshed = 0;
        for meta in self.graphs.values_mut() {
            let embedding: Vec<NodeId> = meta
                .subgraph_refs()
                .filter(|(_, embedded)| *embedded == asset)
                .map(|(node, _)| node)
                .collect();
            for node in embedding {
                meta.set_subgraph_ref(
                    node,
                    Some(SubgraphRef {
                        asset,
                        ports: ports.clone(),
                    }),
                );
                meta.invalidate_node(node, true, false);
                refreshed += 1;
            }
        }
        refreshed
    }
}

fn collect_external_ports(graph: &GraphMeta, diagnostics: &mut Vec<Diagnostic>) -> Vec<PortDescriptor> {
    let mut seen = HashSet::new();
    let mut ports = Vec::new();

    for node in graph.node_ids() {
        for port in graph.ports(node).iter().filter(|port| port.external) {
            if !seen.insert(port.signature()) {
                if port.kind == PortKind::Data && port.direction == PortDirection::Output {
                    diagnostics.push(Diagnostic::warning(
                        Some(graph.id()),
                        Some(node),
                        format!("Duplicate external output '{}' is ambiguous", port.name),
                    ));
                }
                continue;
            }
            let mut port = port.clone();
            port.external = false;
            ports.push(port);
        }
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::gameplay::{create_gameplay_registry, BoundaryNode, ConstantNode, SubgraphNode};
    use crate::link::Endpoint;
    use crate::port::DataType;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn library() -> GraphLibrary {
        init_tracing();
        GraphLibrary::new(create_gameplay_registry())
    }

    /// Add a subgraph node to `parent` pointing at `child`
    fn embed(library: &mut GraphLibrary, parent: GraphId, child: GraphId) -> bool {
        let node = library
            .graph_mut(parent)
            .unwrap()
            .add_typed::<SubgraphNode>([0.0, 0.0]);
        library.assign_subgraph(parent, node, Some(child))
    }

    fn chain(library: &mut GraphLibrary, length: usize) -> Vec<GraphId> {
        let graphs: Vec<GraphId> = (0..length)
            .map(|i| library.create_graph(format!("G{i}")))
            .collect();
        for pair in graphs.windows(2).rev() {
            assert!(embed(library, pair[0], pair[1]));
        }
        graphs
    }

    #[test]
    fn test_none_always_valid() {
        let mut library = library();
        let g = library.create_graph("G");
        assert!(library.validate_subgraph_assignment(g, None));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut library = library();
        let g = library.create_graph("G");
        assert!(!library.validate_subgraph_assignment(g, Some(g)));
        assert!(!embed(&mut library, g, g));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut library = library();
        let g1 = library.create_graph("G1");
        let g2 = library.create_graph("G2");

        assert!(embed(&mut library, g1, g2));
        assert!(!embed(&mut library, g2, g1));

        let g3 = library.create_graph("G3");
        assert!(embed(&mut library, g2, g3));
        assert!(!embed(&mut library, g3, g1));
    }

    #[test]
    fn test_depth_ceiling() {
        let mut library = library();
        let deep = chain(&mut library, 101);
        let root = library.create_graph("Root");
        assert!(!library.validate_subgraph_assignment(root, Some(deep[0])));
        assert!(library
            .take_diagnostics()
            .iter()
            .any(|d| d.is_warning() && d.message.contains("depth limit")));

        let shallow = chain(&mut library, 99);
        assert!(library.validate_subgraph_assignment(root, Some(shallow[0])));

        let exact = chain(&mut library, 100);
        assert!(library.validate_subgraph_assignment(root, Some(exact[0])));
    }

    #[test]
    fn test_shared_references_validate_once() {
        let mut library = library();
        let graphs: Vec<GraphId> = (0..40)
            .map(|i| library.create_graph(format!("G{i}")))
            .collect();
        // Every level embeds the next one twice
        for pair in graphs.windows(2).rev() {
            assert!(embed(&mut library, pair[0], pair[1]));
            assert!(embed(&mut library, pair[0], pair[1]));
        }

        let root = library.create_graph("Root");
        let started = std::time::Instant::now();
        assert!(library.validate_subgraph_assignment(root, Some(graphs[0])));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));

        // A back reference deep in the lattice is still found
        assert!(!library.validate_subgraph_assignment(graphs[39], Some(graphs[0])));
    }

    #[test]
    fn test_shared_reference_deeper_than_first_visit() {
        let config = GraphConfig {
            max_subgraph_depth: 3,
            ..GraphConfig::default()
        };
        let mut library = GraphLibrary::with_config(create_gameplay_registry(), config);
        let [a, b, c, d] = ["A", "B", "C", "D"].map(|name| library.create_graph(name));
        assert!(embed(&mut library, c, d));
        assert!(embed(&mut library, b, c));
        assert!(embed(&mut library, a, d));
        assert!(embed(&mut library, a, b));

        // Under Root, D sits at depth 2 directly and at depth 4 through B and C
        let root = library.create_graph("Root");
        assert!(!library.validate_subgraph_assignment(root, Some(a)));
        assert!(library.validate_subgraph_assignment(root, Some(b)));
    }

    #[test]
    fn test_unknown_candidate_rejected() {
        let mut library = library();
        let g = library.create_graph("G");
        assert!(!library.validate_subgraph_assignment(g, Some(GraphId::new())));
    }

    #[test]
    fn test_external_ports_fetched_into_parent() {
        let mut library = library();
        let child = library.create_graph("Child");
        let parent = library.create_graph("Parent");

        let child_graph = library.graph_mut(child).unwrap();
        let boundary = child_graph.add_typed::<BoundaryNode>([0.0, 0.0]);
        child_graph.edit_node::<BoundaryNode>(boundary, |b| {
            b.ports = vec![
                PortDescriptor::enter("Enter"),
                PortDescriptor::output("Result", DataType::int()),
            ];
        });

        let node = library
            .graph_mut(parent)
            .unwrap()
            .add_typed::<SubgraphNode>([0.0, 0.0]);
        assert!(library.assign_subgraph(parent, node, Some(child)));

        let parent_graph = library.graph(parent).unwrap();
        let ports = parent_graph.ports(node);
        assert_eq!(ports.len(), 2);
        assert!(ports.iter().all(|p| !p.external));
        assert_eq!(ports[1].name, "Result");
        assert_eq!(parent_graph.subgraph(node).map(|s| s.asset), Some(child));

        // Clearing the reference removes the ports
        assert!(library.assign_subgraph(parent, node, None));
        assert_eq!(library.graph(parent).unwrap().port_count(node), 0);
    }

    #[test]
    fn test_duplicate_external_ports() {
        let mut library = library();
        let child = library.create_graph("Child");
        let child_graph = library.graph_mut(child).unwrap();
        for _ in 0..2 {
            let boundary = child_graph.add_typed::<BoundaryNode>([0.0, 0.0]);
            child_graph.edit_node::<BoundaryNode>(boundary, |b| {
                b.ports = vec![
                    PortDescriptor::exit("Done"),
                    PortDescriptor::input("Speed", DataType::float()),
                    PortDescriptor::output("Result", DataType::int()),
                ];
            });
        }

        let ports = library.external_ports(child).unwrap();
        assert_eq!(ports.len(), 3);

        let warnings = library.take_diagnostics();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Result"));
    }

    #[test]
    fn test_refresh_migrates_links() {
        let mut library = library();
        let child = library.create_graph("Child");
        let parent = library.create_graph("Parent");

        let child_graph = library.graph_mut(child).unwrap();
        let boundary = child_graph.add_typed::<BoundaryNode>([0.0, 0.0]);
        child_graph.edit_node::<BoundaryNode>(boundary, |b| {
            b.ports = vec![PortDescriptor::input("Amount", DataType::float())];
        });

        let parent_graph = library.graph_mut(parent).unwrap();
        let sub = parent_graph.add_typed::<SubgraphNode>([0.0, 0.0]);
        let constant = parent_graph.add_typed::<ConstantNode>([0.0, 0.0]);
        assert!(library.assign_subgraph(parent, sub, Some(child)));
        assert!(library
            .graph_mut(parent)
            .unwrap()
            .try_create_link(Endpoint::new(constant, 0), Endpoint::new(sub, 0)));

        // Grow the boundary in front of the linked port
        library
            .graph_mut(child)
            .unwrap()
            .edit_node::<BoundaryNode>(boundary, |b| {
                b.ports.insert(0, PortDescriptor::enter("Enter"));
            });
        assert_eq!(library.refresh_subgraph_nodes(child), 1);

        let parent_graph = library.graph(parent).unwrap();
        assert_eq!(parent_graph.port_count(sub), 2);
        assert!(parent_graph.contains_link(Endpoint::new(constant, 0), Endpoint::new(sub, 1)));
        assert_eq!(parent_graph.link_count(), 1);
    }
}
