// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gameplay node types for visual scripting (Blueprint-like).
//!
//! Supports execution flow and data flow, plus the boundary and subgraph
//! nodes used to embed one graph inside another.

use crate::node::{
    Capabilities, Node, NodeCategory, NodeContext, NodeRegistry, NodeType, PortDeclaration,
};
use crate::port::{DataType, PortDescriptor};

/// Most exits a sequence node may have
pub const MAX_SEQUENCE_OUTPUTS: usize = 16;

/// Entry point fired when gameplay starts
#[derive(Debug, Default)]
pub struct EventNode;

impl Node for EventNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::exit("Exit"));
    }
}

impl NodeType for EventNode {
    const KEY: &'static str = "event_begin_play";
    const NAME: &'static str = "Event Begin Play";
    const CATEGORY: NodeCategory = NodeCategory::Event;
    const DESCRIPTION: &'static str = "Triggered when gameplay starts";
}

/// If/else branching
#[derive(Debug, Default)]
pub struct BranchNode;

impl Node for BranchNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::enter("Enter"));
        ports.add(PortDescriptor::input("Condition", DataType::bool()));
        ports.add(PortDescriptor::exit("True"));
        ports.add(PortDescriptor::exit("False"));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().accepts_control()
    }
}

impl NodeType for BranchNode {
    const KEY: &'static str = "branch";
    const NAME: &'static str = "Branch";
    const CATEGORY: NodeCategory = NodeCategory::Flow;
    const DESCRIPTION: &'static str = "If/else branching";
}

/// Fires its exits one after another
#[derive(Debug)]
pub struct SequenceNode {
    /// Number of exits
    pub outputs: usize,
}

impl Default for SequenceNode {
    fn default() -> Self {
        Self { outputs: 1 }
    }
}

impl Node for SequenceNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::enter("Enter"));
        for index in 0..self.outputs {
            ports.add(PortDescriptor::exit(format!("Then {index}")));
        }
    }

    fn set_defaults(&mut self, _ctx: &NodeContext<'_>) {
        self.outputs = 2;
    }

    fn on_validate(&mut self, _ctx: &NodeContext<'_>) {
        self.outputs = self.outputs.clamp(1, MAX_SEQUENCE_OUTPUTS);
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().accepts_control()
    }
}

impl NodeType for SequenceNode {
    const KEY: &'static str = "sequence";
    const NAME: &'static str = "Sequence";
    const CATEGORY: NodeCategory = NodeCategory::Flow;
    const DESCRIPTION: &'static str = "Fire each exit in order";
}

/// Print a string to the console
#[derive(Debug, Default)]
pub struct PrintNode;

impl Node for PrintNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::enter("Enter"));
        ports.add(PortDescriptor::input("Text", DataType::string()));
        ports.add(PortDescriptor::exit("Exit"));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().accepts_control()
    }
}

impl NodeType for PrintNode {
    const KEY: &'static str = "print_string";
    const NAME: &'static str = "Print String";
    const CATEGORY: NodeCategory = NodeCategory::Utility;
    const DESCRIPTION: &'static str = "Print a string to the console";
}

/// A constant value of a configurable type
#[derive(Debug)]
pub struct ConstantNode {
    /// Type of the produced value
    pub data_type: DataType,
}

impl Default for ConstantNode {
    fn default() -> Self {
        Self {
            data_type: DataType::float(),
        }
    }
}

impl Node for ConstantNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::output("Value", self.data_type.clone()));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().produces(self.data_type.clone())
    }
}

impl NodeType for ConstantNode {
    const KEY: &'static str = "constant";
    const NAME: &'static str = "Constant";
    const CATEGORY: NodeCategory = NodeCategory::Data;
    const DESCRIPTION: &'static str = "A constant value";
}

/// Gathers many values into one array
#[derive(Debug)]
pub struct CollectNode {
    /// Element type
    pub element: DataType,
}

impl Default for CollectNode {
    fn default() -> Self {
        Self {
            element: DataType::float(),
        }
    }
}

impl Node for CollectNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        let array = DataType::array_of(self.element.clone());
        ports.add(PortDescriptor::input("Items", array.clone()).multiple());
        ports.add(PortDescriptor::output("Array", array));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().produces(DataType::array_of(self.element.clone()))
    }
}

impl NodeType for CollectNode {
    const KEY: &'static str = "collect";
    const NAME: &'static str = "Collect";
    const CATEGORY: NodeCategory = NodeCategory::Data;
    const DESCRIPTION: &'static str = "Aggregate linked values into an array";
}

/// Pass-through whose type follows whatever it is linked to
#[derive(Debug, Default)]
pub struct RerouteNode;

impl Node for RerouteNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        ports.add(PortDescriptor::dynamic_input("In"));
        ports.add(PortDescriptor::dynamic_output("Out"));
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().port_linker()
    }
}

impl NodeType for RerouteNode {
    const KEY: &'static str = "reroute";
    const NAME: &'static str = "Reroute";
    const CATEGORY: NodeCategory = NodeCategory::Utility;
    const DESCRIPTION: &'static str = "Pass a value through unchanged";
}

/// Boundary of a graph used as a subgraph.
///
/// Each configured port is declared twice: once as an external port, with the
/// direction it presents on the parent node, and once mirrored for the
/// internal side.
#[derive(Debug, Default)]
pub struct BoundaryNode {
    /// Parent-facing ports
    pub ports: Vec<PortDescriptor>,
}

impl Node for BoundaryNode {
    fn declare_ports(&self, _ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        for port in &self.ports {
            let mut external = port.clone().external();
            external.hidden = false;
            let internal = PortDescriptor::new(
                port.name.clone(),
                port.direction.opposite(),
                port.kind,
                port.data_type.clone(),
            );
            ports.add(external);
            ports.add(internal);
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().accepts_control().produces_any()
    }
}

impl NodeType for BoundaryNode {
    const KEY: &'static str = "boundary";
    const NAME: &'static str = "Graph Boundary";
    const CATEGORY: NodeCategory = NodeCategory::Subgraph;
    const DESCRIPTION: &'static str = "Ports exposed to a parent graph";
}

/// Embeds another graph; its ports are the embedded graph's external ports
#[derive(Debug, Default)]
pub struct SubgraphNode;

impl Node for SubgraphNode {
    fn declare_ports(&self, ctx: &NodeContext<'_>, ports: &mut PortDeclaration) {
        if let Some(subgraph) = ctx.subgraph {
            ports.extend(subgraph.ports.iter().cloned());
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::none().accepts_control().produces_any()
    }
}

impl NodeType for SubgraphNode {
    const KEY: &'static str = "subgraph";
    const NAME: &'static str = "Subgraph";
    const CATEGORY: NodeCategory = NodeCategory::Subgraph;
    const DESCRIPTION: &'static str = "Run another graph as a node";
}

/// Create the gameplay graph node registry
pub fn create_gameplay_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Event nodes
    registry.register::<EventNode>();

    // Flow control
    registry.register::<BranchNode>();
    registry.register::<SequenceNode>();

    // Data
    registry.register::<ConstantNode>();
    registry.register::<CollectNode>();

    // Utility
    registry.register::<PrintNode>();
    registry.register::<RerouteNode>();

    // Composition
    registry.register::<BoundaryNode>();
    registry.register::<SubgraphNode>();

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, PoolId};
    use crate::port::{PortDirection, PortKind};
    use crate::validation::validate_port_declaration;

    fn declare(node: &dyn Node) -> Vec<PortDescriptor> {
        let ctx = NodeContext {
            id: NodeId::new(PoolId(0), 0),
            subgraph: None,
        };
        let mut ports = PortDeclaration::new();
        node.declare_ports(&ctx, &mut ports);
        ports.into_ports()
    }

    #[test]
    fn test_registry_contents() {
        let registry = create_gameplay_registry();
        assert_eq!(registry.len(), 9);
        assert!(registry.contains("branch"));
        assert_eq!(registry.types_in_category(NodeCategory::Subgraph).count(), 2);
    }

    #[test]
    fn test_builtin_declarations_are_sane() {
        let boundary = BoundaryNode {
            ports: vec![
                PortDescriptor::enter("Enter"),
                PortDescriptor::output("Result", DataType::int()),
            ],
        };
        let nodes: Vec<Box<dyn Node>> = vec![
            Box::new(EventNode),
            Box::new(BranchNode),
            Box::new(SequenceNode { outputs: 3 }),
            Box::new(PrintNode),
            Box::new(ConstantNode::default()),
            Box::new(CollectNode::default()),
            Box::new(RerouteNode),
            Box::new(boundary),
            Box::new(SubgraphNode),
        ];
        for node in &nodes {
            let ports = declare(node.as_ref());
            assert!(
                validate_port_declaration(&ports, &node.capabilities()).is_empty(),
                "{node:?}"
            );
        }
    }

    #[test]
    fn test_sequence_validation_clamps() {
        let ctx = NodeContext {
            id: NodeId::new(PoolId(0), 0),
            subgraph: None,
        };
        let mut node = SequenceNode { outputs: 0 };
        node.on_validate(&ctx);
        assert_eq!(node.outputs, 1);
        node.outputs = 99;
        node.on_validate(&ctx);
        assert_eq!(node.outputs, MAX_SEQUENCE_OUTPUTS);
    }

    #[test]
    fn test_boundary_mirrors_ports() {
        let boundary = BoundaryNode {
            ports: vec![PortDescriptor::enter("Enter")],
        };
        let ports = declare(&boundary);
        assert_eq!(ports.len(), 2);
        assert!(ports[0].external);
        assert_eq!(ports[0].direction, PortDirection::Input);
        assert!(!ports[1].external);
        assert_eq!(ports[1].direction, PortDirection::Output);
        assert_eq!(ports[1].kind, PortKind::Flow);
    }
}
