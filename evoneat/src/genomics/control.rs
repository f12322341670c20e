//! MIMO control genes describe genome modules: a single interior
//! control node carrying a multi-input multi-output activation, with
//! an ordered list of incoming links from base nodes and outgoing
//! links to base nodes.

use crate::activations::ModuleActivationKind;
use crate::{Innovation, NodeId};

use serde::{Deserialize, Serialize};

use std::fmt;

/// One link of a module: a base-node endpoint and a weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleLink {
    node: NodeId,
    weight: f64,
}

impl ModuleLink {
    /// Returns a new module link.
    pub fn new(node: NodeId, weight: f64) -> ModuleLink {
        ModuleLink { node, weight }
    }

    /// Returns the base node this link attaches to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the link's weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// A control gene: a module whose control node aggregates the
/// activations of its incoming base nodes, applies a module
/// activation, and writes the result to its outgoing base nodes.
/// Innovation-numbered like connection genes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MimoControlGene {
    control_node: NodeId,
    activation: ModuleActivationKind,
    inputs: Vec<ModuleLink>,
    outputs: Vec<ModuleLink>,
    innovation: Innovation,
    mutation_num: f64,
    enabled: bool,
}

impl MimoControlGene {
    /// Returns a new enabled control gene.
    ///
    /// # Examples
    /// ```
    /// use evoneat::activations::ModuleActivationKind;
    /// use evoneat::genomics::{MimoControlGene, ModuleLink};
    ///
    /// let module = MimoControlGene::new(
    ///     8,
    ///     ModuleActivationKind::Multiply,
    ///     vec![ModuleLink::new(5, 1.0), ModuleLink::new(6, 1.0)],
    ///     vec![ModuleLink::new(7, 1.0)],
    ///     7,
    ///     5.5,
    /// );
    /// assert_eq!(module.control_node(), 8);
    /// assert_eq!(module.inputs().len(), 2);
    /// ```
    pub fn new(
        control_node: NodeId,
        activation: ModuleActivationKind,
        inputs: Vec<ModuleLink>,
        outputs: Vec<ModuleLink>,
        innovation: Innovation,
        mutation_num: f64,
    ) -> MimoControlGene {
        MimoControlGene {
            control_node,
            activation,
            inputs,
            outputs,
            innovation,
            mutation_num,
            enabled: true,
        }
    }

    /// Returns the module's interior control node ID.
    pub fn control_node(&self) -> NodeId {
        self.control_node
    }

    /// Returns the module activation.
    pub fn activation(&self) -> ModuleActivationKind {
        self.activation
    }

    /// Returns the ordered incoming module links.
    pub fn inputs(&self) -> &[ModuleLink] {
        &self.inputs
    }

    /// Returns the ordered outgoing module links.
    pub fn outputs(&self) -> &[ModuleLink] {
        &self.outputs
    }

    /// Returns the gene's innovation number.
    pub fn innovation(&self) -> Innovation {
        self.innovation
    }

    /// Returns the gene's mutation number.
    pub fn mutation_num(&self) -> f64 {
        self.mutation_num
    }

    /// Returns whether the module is expressed in the phenotype.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns an iterator over the IDs of every base node the
    /// module attaches to.
    pub fn attached_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|link| link.node())
    }
}

impl fmt::Display for MimoControlGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{} @ {:?}, in: {:?}, out: {:?}]",
            self.innovation,
            self.activation.name(),
            self.control_node,
            self.inputs.iter().map(ModuleLink::node).collect::<Vec<_>>(),
            self.outputs.iter().map(ModuleLink::node).collect::<Vec<_>>(),
        )
    }
}
