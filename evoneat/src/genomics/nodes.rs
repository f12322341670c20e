//! Node genes are the structural anchors of a genome, between which
//! connection genes are created.

use crate::activations::ActivationKind;
use crate::NodeId;

use serde::{Deserialize, Serialize};

use std::fmt;

/// A `NodeKind` indicates the function of the node's network
/// equivalent. The discriminants are fixed by the genome text
/// format: 0 = Hidden, 1 = Sensor, 2 = Output, 3 = Bias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Interior nodes.
    Hidden,
    /// Input nodes taking externally loaded values.
    Sensor,
    /// Sink nodes whose activations are the network's outputs.
    Output,
    /// A constant-1 sensor.
    Bias,
}

impl NodeKind {
    /// Returns whether nodes of this kind take loaded sensor values
    /// rather than computing an activation.
    pub fn is_sensor(self) -> bool {
        matches!(self, NodeKind::Sensor | NodeKind::Bias)
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            NodeKind::Hidden => 0,
            NodeKind::Sensor => 1,
            NodeKind::Output => 2,
            NodeKind::Bias => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<NodeKind> {
        match code {
            0 => Some(NodeKind::Hidden),
            1 => Some(NodeKind::Sensor),
            2 => Some(NodeKind::Output),
            3 => Some(NodeKind::Bias),
            _ => None,
        }
    }
}

/// A node gene: an ID, a kind, the named activation its phenotype
/// node will apply, and an optional trait reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    id: NodeId,
    kind: NodeKind,
    activation: ActivationKind,
    trait_id: Option<usize>,
}

impl NodeGene {
    /// Returns a new node gene with no trait reference.
    ///
    /// # Examples
    /// ```
    /// use evoneat::activations::ActivationKind;
    /// use evoneat::genomics::{NodeGene, NodeKind};
    ///
    /// let node = NodeGene::new(4, NodeKind::Output, ActivationKind::SigmoidSteepened);
    /// assert_eq!(node.id(), 4);
    /// assert!(!node.kind().is_sensor());
    /// ```
    pub fn new(id: NodeId, kind: NodeKind, activation: ActivationKind) -> NodeGene {
        NodeGene {
            id,
            kind,
            activation,
            trait_id: None,
        }
    }

    /// Returns a new node gene referencing the given trait.
    pub fn with_trait(
        id: NodeId,
        kind: NodeKind,
        activation: ActivationKind,
        trait_id: usize,
    ) -> NodeGene {
        NodeGene {
            id,
            kind,
            activation,
            trait_id: Some(trait_id),
        }
    }

    /// Returns the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the node's activation.
    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// Returns the node's trait reference, if any.
    pub fn trait_id(&self) -> Option<usize> {
        self.trait_id
    }

    /// Reassigns the node's trait reference.
    pub fn set_trait_id(&mut self, trait_id: Option<usize>) {
        self.trait_id = trait_id;
    }
}

impl fmt::Display for NodeGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{:?}, {}]",
            self.id,
            self.kind,
            self.activation.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            NodeKind::Hidden,
            NodeKind::Sensor,
            NodeKind::Output,
            NodeKind::Bias,
        ] {
            assert_eq!(NodeKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(NodeKind::from_code(7), None);
    }

    #[test]
    fn bias_is_a_sensor() {
        assert!(NodeKind::Bias.is_sensor());
        assert!(NodeKind::Sensor.is_sensor());
        assert!(!NodeKind::Output.is_sensor());
        assert!(!NodeKind::Hidden.is_sensor());
    }
}
