// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port descriptors for node inputs/outputs.
//!
//! A port is described by value. Nodes regenerate their whole port list
//! whenever their fields change, so identity across regenerations is carried by
//! the [`PortSignature`] rather than by any stored ID.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port (flow enter or data sink)
    Input,
    /// Output port (flow exit or data source)
    Output,
}

impl PortDirection {
    /// The opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// What travels through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Control transfer, no value
    Flow,
    /// A typed value
    Data,
}

/// How many links a port may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capacity {
    /// At most one link; connecting again replaces it
    Single,
    /// Any number of links
    Multiple,
}

/// Which edge of the node the port is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutSide {
    /// Left edge
    Left,
    /// Right edge
    Right,
}

/// Data type carried by a data port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// A value type; only exact matches are assignable
    Value(String),
    /// A reference type with an optional base type
    Reference {
        /// Type name
        name: String,
        /// Base type, if any
        base: Option<Box<DataType>>,
    },
    /// An array of some element type
    Array(Box<DataType>),
}

impl DataType {
    /// Create a value type
    pub fn value(name: impl Into<String>) -> Self {
        Self::Value(name.into())
    }

    /// Create a reference type without a base
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference {
            name: name.into(),
            base: None,
        }
    }

    /// Create a reference type deriving from `base`
    pub fn derived(name: impl Into<String>, base: DataType) -> Self {
        Self::Reference {
            name: name.into(),
            base: Some(Box::new(base)),
        }
    }

    /// Create an array of `element`
    pub fn array_of(element: DataType) -> Self {
        Self::Array(Box::new(element))
    }

    /// Boolean value type
    pub fn bool() -> Self {
        Self::value("bool")
    }

    /// Integer value type
    pub fn int() -> Self {
        Self::value("int")
    }

    /// Float value type
    pub fn float() -> Self {
        Self::value("float")
    }

    /// String reference type
    pub fn string() -> Self {
        Self::reference("string")
    }

    /// Whether this is a value type
    pub fn is_value_type(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Element type if this is an array
    pub fn element(&self) -> Option<&DataType> {
        match self {
            Self::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Check whether a value of this type can be stored in a slot of `target`.
    ///
    /// Reference types are assignable to any type in their base chain. Arrays
    /// are covariant over reference element types.
    pub fn is_assignable_to(&self, target: &DataType) -> bool {
        if self == target {
            return true;
        }

        match (self, target) {
            (Self::Reference { base: Some(base), .. }, Self::Reference { .. }) => {
                base.is_assignable_to(target)
            }
            (Self::Array(from), Self::Array(to)) => {
                !from.is_value_type() && from.is_assignable_to(to)
            }
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(name) | Self::Reference { name, .. } => f.write_str(name),
            Self::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Identity surrogate of a port: a hash of direction, kind, data type and name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortSignature(pub u64);

/// Describes one connection point on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Port name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Flow or data
    pub kind: PortKind,
    /// Data type; `None` marks a dynamic port resolved by the owning node
    pub data_type: Option<DataType>,
    /// Link capacity
    pub capacity: Capacity,
    /// Layout side in the editor
    pub side: LayoutSide,
    /// Exposed to a parent graph as a subgraph boundary port
    pub external: bool,
    /// Not shown or linkable in the editor
    pub hidden: bool,
    /// Accept types assignable to this port's type instead of exact matches
    pub accept_subclass: bool,
}

impl PortDescriptor {
    /// Create a new port with the default capacity and side for its shape
    pub fn new(
        name: impl Into<String>,
        direction: PortDirection,
        kind: PortKind,
        data_type: Option<DataType>,
    ) -> Self {
        // Exits and data inputs own a single link, enters and data outputs fan out.
        let capacity = match (kind, direction) {
            (PortKind::Flow, PortDirection::Output) | (PortKind::Data, PortDirection::Input) => {
                Capacity::Single
            }
            _ => Capacity::Multiple,
        };
        let side = match direction {
            PortDirection::Input => LayoutSide::Left,
            PortDirection::Output => LayoutSide::Right,
        };
        Self {
            name: name.into(),
            direction,
            kind,
            data_type,
            capacity,
            side,
            external: false,
            hidden: false,
            accept_subclass: false,
        }
    }

    /// Flow input ("enter")
    pub fn enter(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortKind::Flow, None)
    }

    /// Flow output ("exit")
    pub fn exit(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output, PortKind::Flow, None)
    }

    /// Typed data input
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Input, PortKind::Data, Some(data_type))
    }

    /// Typed data output
    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        Self::new(name, PortDirection::Output, PortKind::Data, Some(data_type))
    }

    /// Dynamic data input
    pub fn dynamic_input(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Input, PortKind::Data, None)
    }

    /// Dynamic data output
    pub fn dynamic_output(name: impl Into<String>) -> Self {
        Self::new(name, PortDirection::Output, PortKind::Data, None)
    }

    /// Set the capacity
    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Allow any number of links
    pub fn multiple(self) -> Self {
        self.with_capacity(Capacity::Multiple)
    }

    /// Allow a single link
    pub fn single(self) -> Self {
        self.with_capacity(Capacity::Single)
    }

    /// Set the layout side
    pub fn on_side(mut self, side: LayoutSide) -> Self {
        self.side = side;
        self
    }

    /// Mark as a subgraph boundary port
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    /// Mark as hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Accept subclasses of the declared type
    pub fn accept_subclass(mut self) -> Self {
        self.accept_subclass = true;
        self
    }

    /// Whether this is a flow port
    pub fn is_flow(&self) -> bool {
        self.kind == PortKind::Flow
    }

    /// Whether this port has no declared type
    pub fn is_dynamic(&self) -> bool {
        self.kind == PortKind::Data && self.data_type.is_none()
    }

    /// Whether this port may hold more than one link
    pub fn is_multiple(&self) -> bool {
        self.capacity == Capacity::Multiple
    }

    /// Compute the identity signature of this port.
    ///
    /// Only direction, kind, data type and name take part; layout and flags
    /// may change without the port losing its links.
    pub fn signature(&self) -> PortSignature {
        let mut hasher = DefaultHasher::new();
        self.direction.hash(&mut hasher);
        self.kind.hash(&mut hasher);
        self.data_type.hash(&mut hasher);
        self.name.hash(&mut hasher);
        PortSignature(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(PortDescriptor::enter("In").capacity, Capacity::Multiple);
        assert_eq!(PortDescriptor::exit("Out").capacity, Capacity::Single);
        assert_eq!(PortDescriptor::input("A", DataType::int()).capacity, Capacity::Single);
        assert_eq!(PortDescriptor::output("R", DataType::int()).capacity, Capacity::Multiple);
        assert_eq!(PortDescriptor::output("R", DataType::int()).side, LayoutSide::Right);
    }

    #[test]
    fn test_signature_ignores_layout_and_flags() {
        let port = PortDescriptor::input("Value", DataType::float());
        let moved = port.clone().on_side(LayoutSide::Right).multiple().hidden();
        assert_eq!(port.signature(), moved.signature());
    }

    #[test]
    fn test_signature_tracks_identity_fields() {
        let port = PortDescriptor::input("Value", DataType::float());
        assert_ne!(port.signature(), PortDescriptor::input("Other", DataType::float()).signature());
        assert_ne!(port.signature(), PortDescriptor::input("Value", DataType::int()).signature());
        assert_ne!(port.signature(), PortDescriptor::output("Value", DataType::float()).signature());
        assert_ne!(port.signature(), PortDescriptor::dynamic_input("Value").signature());
    }

    #[test]
    fn test_reference_assignability() {
        let actor = DataType::reference("Actor");
        let pawn = DataType::derived("Pawn", actor.clone());
        let character = DataType::derived("Character", pawn.clone());

        assert!(character.is_assignable_to(&actor));
        assert!(pawn.is_assignable_to(&actor));
        assert!(!actor.is_assignable_to(&pawn));
        assert!(DataType::array_of(character).is_assignable_to(&DataType::array_of(actor)));
        assert!(!DataType::int().is_assignable_to(&DataType::float()));
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::array_of(DataType::float()).to_string(), "float[]");
    }
}
