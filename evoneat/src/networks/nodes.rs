//! Arena entries of the phenotype graph: nodes with their activation
//! state, and the links between them.

use crate::activations::{ActivationKind, ModuleActivationKind};
use crate::genomics::NodeKind;
use crate::NodeId;

/// A phenotype link. `source` and `target` index into the network's
/// node arena.
#[derive(Clone, Debug)]
pub struct Link {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) weight: f64,
    pub(super) recurrent: bool,
}

impl Link {
    /// Returns the arena index of the link's source node.
    pub fn source(&self) -> usize {
        self.source
    }

    /// Returns the arena index of the link's target node.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Returns the link's weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns whether the link reads its source's previous-step
    /// activation.
    pub fn recurrent(&self) -> bool {
        self.recurrent
    }
}

/// A phenotype node. Incoming and outgoing hold link indices into the
/// network's link arena.
#[derive(Clone, Debug)]
pub struct NNode {
    pub(super) id: NodeId,
    pub(super) kind: NodeKind,
    pub(super) activation_kind: ActivationKind,
    pub(super) module: Option<ModuleActivationKind>,
    pub(super) module_driven: bool,
    pub(super) incoming: Vec<usize>,
    pub(super) outgoing: Vec<usize>,
    pub(super) activation_sum: f64,
    pub(super) activation: f64,
    pub(super) activations_count: u32,
    pub(super) active_out_td: f64,
    pub(super) active: bool,
}

impl NNode {
    pub(super) fn new(id: NodeId, kind: NodeKind, activation_kind: ActivationKind) -> NNode {
        NNode {
            id,
            kind,
            activation_kind,
            module: None,
            module_driven: false,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            activation_sum: 0.0,
            activation: 0.0,
            activations_count: 0,
            active_out_td: 0.0,
            active: false,
        }
    }

    /// Returns the genome node ID this phenotype node was expanded from.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns whether the node takes loaded sensor values.
    pub fn is_sensor(&self) -> bool {
        self.kind.is_sensor()
    }

    /// Returns whether the node computes an activation, i.e. is
    /// neither a sensor nor a module control node.
    pub fn is_neuron(&self) -> bool {
        !self.kind.is_sensor() && self.module.is_none()
    }

    /// Returns the node's current activation value.
    pub fn activation(&self) -> f64 {
        self.activation
    }

    /// Returns how many times the node has activated since the last
    /// flush.
    pub fn activations_count(&self) -> u32 {
        self.activations_count
    }

    /// Returns the node's current output: its activation once it has
    /// activated at least once, zero before.
    pub fn active_out(&self) -> f64 {
        if self.activations_count > 0 {
            self.activation
        } else {
            0.0
        }
    }

    /// Returns the node's time-delayed output: the output it exposed
    /// before the most recent propagation pass. Recurrent links read
    /// this value.
    pub fn active_out_td(&self) -> f64 {
        self.active_out_td
    }

    pub(super) fn flush(&mut self) {
        self.activation_sum = 0.0;
        self.activation = 0.0;
        self.activations_count = 0;
        self.active_out_td = 0.0;
        self.active = false;
    }
}
