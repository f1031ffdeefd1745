// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port compatibility rules.
//!
//! [`are_ports_compatible`] decides whether two ports may be linked and is
//! used both when creating links and when the editor lists compatible
//! targets. [`validate_port_declaration`] cross-checks a node's declared ports
//! against the capabilities the node exposes.

use crate::node::Capabilities;
use crate::port::{DataType, PortDescriptor, PortDirection, PortKind};

/// Problem found in a node's port declaration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortIssue {
    /// A flow input on a node that does not accept control
    #[error("Port {index} ({name}) is a flow input but the node does not accept control")]
    EnterWithoutControl {
        /// Port index
        index: u32,
        /// Port name
        name: String,
    },

    /// A typed output the node does not declare it can produce
    #[error("Port {index} ({name}) outputs {data_type} but the node does not produce it")]
    UndeclaredOutputType {
        /// Port index
        index: u32,
        /// Port name
        name: String,
        /// Declared output type
        data_type: DataType,
    },

    /// A dynamic output with nothing to resolve its type
    #[error("Port {index} ({name}) is a dynamic output but the node neither produces any type nor links ports")]
    UnresolvedDynamicOutput {
        /// Port index
        index: u32,
        /// Port name
        name: String,
    },
}

/// Check if two ports may be linked. The result does not depend on argument order.
pub fn are_ports_compatible(a: &PortDescriptor, b: &PortDescriptor) -> bool {
    // Boundary and hidden ports never link inside their own graph
    if a.external || b.external || a.hidden || b.hidden {
        return false;
    }

    if a.direction == b.direction || a.kind != b.kind {
        return false;
    }

    if a.kind == PortKind::Flow {
        return true;
    }

    let (output, input) = if a.direction == PortDirection::Output {
        (a, b)
    } else {
        (b, a)
    };
    data_compatible(output, input)
}

fn data_compatible(output: &PortDescriptor, input: &PortDescriptor) -> bool {
    let (Some(out_type), Some(in_type)) = (&output.data_type, &input.data_type) else {
        // Dynamic ports are resolved by their node at link time
        return true;
    };

    if in_type.is_value_type() {
        return out_type == in_type;
    }

    // Many singular outputs aggregate into one array input
    if output.is_multiple() && in_type.element() == Some(out_type) {
        return true;
    }

    if out_type == in_type {
        return true;
    }

    (input.accept_subclass && out_type.is_assignable_to(in_type))
        || (output.accept_subclass && in_type.is_assignable_to(out_type))
}

/// Cross-check declared ports against the owning node's capabilities
pub fn validate_port_declaration(
    ports: &[PortDescriptor],
    capabilities: &Capabilities,
) -> Vec<PortIssue> {
    let mut issues = Vec::new();

    for (index, port) in ports.iter().enumerate() {
        // Boundary ports are serviced by the parent graph
        if port.external {
            continue;
        }
        let index = index as u32;

        match (port.kind, port.direction, &port.data_type) {
            (PortKind::Flow, PortDirection::Input, _) => {
                if !capabilities.accepts_control {
                    issues.push(PortIssue::EnterWithoutControl {
                        index,
                        name: port.name.clone(),
                    });
                }
            }
            (PortKind::Data, PortDirection::Output, Some(data_type)) => {
                if !capabilities.can_produce(data_type) {
                    issues.push(PortIssue::UndeclaredOutputType {
                        index,
                        name: port.name.clone(),
                        data_type: data_type.clone(),
                    });
                }
            }
            (PortKind::Data, PortDirection::Output, None) => {
                if !capabilities.produces_any && !capabilities.port_linker {
                    issues.push(PortIssue::UnresolvedDynamicOutput {
                        index,
                        name: port.name.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{Capacity, LayoutSide};
    use proptest::prelude::*;

    #[test]
    fn test_flow_ports() {
        let enter = PortDescriptor::enter("In");
        let exit = PortDescriptor::exit("Out");
        assert!(are_ports_compatible(&exit, &enter));
        assert!(!are_ports_compatible(&exit, &exit.clone()));
        assert!(!are_ports_compatible(&exit, &PortDescriptor::input("In", DataType::int())));
    }

    #[test]
    fn test_external_and_hidden_never_link() {
        let enter = PortDescriptor::enter("In");
        assert!(!are_ports_compatible(&PortDescriptor::exit("Out").external(), &enter));
        assert!(!are_ports_compatible(&PortDescriptor::exit("Out").hidden(), &enter));
    }

    #[test]
    fn test_value_types_match_exactly() {
        let out = PortDescriptor::output("R", DataType::int());
        assert!(are_ports_compatible(&out, &PortDescriptor::input("A", DataType::int())));
        assert!(!are_ports_compatible(&out, &PortDescriptor::input("A", DataType::float())));
        assert!(!are_ports_compatible(
            &out,
            &PortDescriptor::input("A", DataType::float()).accept_subclass()
        ));
    }

    #[test]
    fn test_dynamic_ports() {
        let dynamic = PortDescriptor::dynamic_input("Any");
        assert!(are_ports_compatible(&PortDescriptor::output("R", DataType::int()), &dynamic));
        assert!(are_ports_compatible(
            &PortDescriptor::dynamic_output("Any"),
            &PortDescriptor::input("A", DataType::string())
        ));
    }

    #[test]
    fn test_array_aggregation() {
        let items = PortDescriptor::input("Items", DataType::array_of(DataType::float())).multiple();
        let single = PortDescriptor::output("R", DataType::float());
        assert!(are_ports_compatible(&single, &items));
        assert!(!are_ports_compatible(&single.clone().single(), &items));
        assert!(!are_ports_compatible(&PortDescriptor::output("R", DataType::int()), &items));
    }

    #[test]
    fn test_subclass_acceptance() {
        let actor = DataType::reference("Actor");
        let pawn = DataType::derived("Pawn", actor.clone());

        let pawn_out = PortDescriptor::output("Pawn", pawn.clone());
        let actor_in = PortDescriptor::input("Target", actor.clone());
        assert!(!are_ports_compatible(&pawn_out, &actor_in));
        assert!(are_ports_compatible(&pawn_out, &actor_in.clone().accept_subclass()));

        // The output side may request it too, accepting a narrower sink
        let actor_out = PortDescriptor::output("Actor", actor).accept_subclass();
        assert!(are_ports_compatible(&actor_out, &PortDescriptor::input("Pawn", pawn)));
        assert!(!are_ports_compatible(&actor_out, &PortDescriptor::input("S", DataType::string())));
    }

    #[test]
    fn test_declaration_requires_capabilities() {
        let ports = vec![
            PortDescriptor::enter("In"),
            PortDescriptor::output("R", DataType::int()),
            PortDescriptor::dynamic_output("Any"),
            PortDescriptor::exit("Out"),
            PortDescriptor::enter("Boundary").external(),
        ];

        let issues = validate_port_declaration(&ports, &Capabilities::none());
        assert_eq!(issues.len(), 3);
        assert!(matches!(issues[0], PortIssue::EnterWithoutControl { index: 0, .. }));
        assert!(matches!(issues[1], PortIssue::UndeclaredOutputType { index: 1, .. }));
        assert!(matches!(issues[2], PortIssue::UnresolvedDynamicOutput { index: 2, .. }));

        let typed = Capabilities::none()
            .accepts_control()
            .produces(DataType::int())
            .port_linker();
        assert!(validate_port_declaration(&ports, &typed).is_empty());
        assert!(validate_port_declaration(&ports, &Capabilities::none().accepts_control().produces_any()).is_empty());
    }

    fn data_type() -> impl Strategy<Value = Option<DataType>> {
        let actor = DataType::reference("Actor");
        let pawn = DataType::derived("Pawn", actor.clone());
        prop_oneof![
            Just(None),
            Just(Some(DataType::int())),
            Just(Some(DataType::float())),
            Just(Some(DataType::array_of(DataType::int()))),
            Just(Some(DataType::array_of(pawn.clone()))),
            Just(Some(actor)),
            Just(Some(pawn)),
        ]
    }

    fn port() -> impl Strategy<Value = PortDescriptor> {
        (
            any::<bool>(),
            any::<bool>(),
            data_type(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(output, flow, data_type, multiple, external, hidden, subclass)| {
                let direction = if output { PortDirection::Output } else { PortDirection::Input };
                let kind = if flow { PortKind::Flow } else { PortKind::Data };
                let data_type = if flow { None } else { data_type };
                let mut port = PortDescriptor::new("P", direction, kind, data_type)
                    .with_capacity(if multiple { Capacity::Multiple } else { Capacity::Single })
                    .on_side(LayoutSide::Left);
                port.external = external;
                port.hidden = hidden;
                port.accept_subclass = subclass;
                port
            })
    }

    proptest! {
        #[test]
        fn test_compatibility_is_symmetric(a in port(), b in port()) {
            prop_assert_eq!(are_ports_compatible(&a, &b), are_ports_compatible(&b, &a));
        }

        #[test]
        fn test_same_direction_never_compatible(a in port(), b in port()) {
            if a.direction == b.direction {
                prop_assert!(!are_ports_compatible(&a, &b));
            }
        }
    }
}
