//! Connection genes are the principal components of genomes. They are
//! created between two nodes, and become network links in the genome's
//! phenotype.

use crate::{Innovation, NodeId};

use serde::{Deserialize, Serialize};

use std::fmt;

/// A connection gene. The `mutation_num` tracks cumulative weight
/// perturbation and participates in compatibility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    innovation: Innovation,
    source: NodeId,
    target: NodeId,
    weight: f64,
    enabled: bool,
    recurrent: bool,
    trait_id: Option<usize>,
    mutation_num: f64,
}

impl ConnectionGene {
    /// Returns a new enabled connection gene with no trait reference
    /// and a zero mutation number.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::ConnectionGene;
    ///
    /// let gene = ConnectionGene::new(42, 3, 9, 2.0, false);
    /// assert_eq!(gene.innovation(), 42);
    /// assert!(gene.enabled());
    /// ```
    pub fn new(
        innovation: Innovation,
        source: NodeId,
        target: NodeId,
        weight: f64,
        recurrent: bool,
    ) -> ConnectionGene {
        ConnectionGene {
            innovation,
            source,
            target,
            weight,
            enabled: true,
            recurrent,
            trait_id: None,
            mutation_num: 0.0,
        }
    }

    /// Returns a new connection gene with every field specified.
    #[allow(clippy::too_many_arguments)]
    pub fn with_trait(
        innovation: Innovation,
        source: NodeId,
        target: NodeId,
        weight: f64,
        recurrent: bool,
        trait_id: Option<usize>,
        mutation_num: f64,
        enabled: bool,
    ) -> ConnectionGene {
        ConnectionGene {
            innovation,
            source,
            target,
            weight,
            enabled,
            recurrent,
            trait_id,
            mutation_num,
        }
    }

    /// Returns the gene's innovation number.
    pub fn innovation(&self) -> Innovation {
        self.innovation
    }

    /// Returns the gene's source node ID.
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Returns the gene's target node ID.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Returns the gene's `(source, target)` pair.
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }

    /// Returns the gene's weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Sets the gene's weight.
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Returns whether the gene is expressed in the phenotype.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the gene's enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns whether the gene's link reads its source's
    /// previous-step activation.
    pub fn recurrent(&self) -> bool {
        self.recurrent
    }

    /// Returns the gene's trait reference, if any.
    pub fn trait_id(&self) -> Option<usize> {
        self.trait_id
    }

    /// Reassigns the gene's trait reference.
    pub fn set_trait_id(&mut self, trait_id: Option<usize>) {
        self.trait_id = trait_id;
    }

    /// Returns the gene's mutation number.
    pub fn mutation_num(&self) -> f64 {
        self.mutation_num
    }

    /// Sets the gene's mutation number.
    pub fn set_mutation_num(&mut self, mutation_num: f64) {
        self.mutation_num = mutation_num;
    }
}

impl fmt::Display for ConnectionGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}[{:?}{}>{:?}, {:.3}]{}",
            if self.enabled { "" } else { "(" },
            self.innovation,
            self.source,
            if self.recurrent { "~" } else { "-" },
            self.target,
            self.weight,
            if self.enabled { "" } else { ")" },
        )
    }
}

/// Inserts a gene into the list, preserving innovation-number order.
pub(crate) fn gene_insert(genes: &mut Vec<ConnectionGene>, gene: ConnectionGene) {
    let position = genes
        .iter()
        .position(|g| g.innovation() > gene.innovation())
        .unwrap_or(genes.len());
    genes.insert(position, gene);
}
