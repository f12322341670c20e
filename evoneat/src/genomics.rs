//! Genomes are the focus of evolution. A genome is a collection of
//! traits, node genes, connection genes and MIMO control genes that
//! can be instantiated as a phenotype network, progressively mutated
//! under innovation-number bookkeeping, and recombined by aligning
//! connection genes on their innovation numbers.

mod control;
mod errors;
mod format;
mod genes;
mod history;
mod nodes;
mod traits;

pub use control::{MimoControlGene, ModuleLink};
pub use errors::{GenomeError, VerificationFailure};
pub use genes::ConnectionGene;
use genes::gene_insert;
pub use history::{InnovationLedger, NodeSplit};
pub use nodes::{NodeGene, NodeKind};
pub use traits::{Trait, TRAIT_PARAM_COUNT};

use crate::activations::ActivationKind;
use crate::config::{CompatMethod, NeatOptions, TieBreak};
use crate::networks::Network;
use crate::{Innovation, NodeId};

use ahash::RandomState;
use rand::prelude::{IteratorRandom, Rng, SliceRandom};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{BufRead, Write};

/// Chance that a gene disabled in either parent stays disabled in the
/// child.
const DISABLED_INHERIT_PROB: f64 = 0.75;

/// Selects how connection weights are perturbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightMutator {
    /// Perturb or replace weights with Gaussian noise.
    Gaussian,
    /// Replace every weight outright. Used when spawning a population
    /// from a seed genome.
    ColdGaussian,
}

/// An evolvable description of a network.
///
/// Invariants, restored after every operation:
/// - every connection's endpoints are resident in the node list;
/// - no two connections share a `(source, target)` pair;
/// - the connection list is sorted by innovation number, and
///   innovation numbers are unique within the genome;
/// - every referenced trait exists in the trait list.
///
/// Supports Serde for convenient genome saving and loading, plus a
/// line-oriented ASCII form via [`Genome::read_from`] and
/// [`Genome::write_to`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    id: usize,
    traits: Vec<Trait>,
    nodes: Vec<NodeGene>,
    genes: Vec<ConnectionGene>,
    control_genes: Vec<MimoControlGene>,
}

impl Genome {
    /// Creates a genome from its parts. The connection list is sorted
    /// by innovation number.
    pub fn new(
        id: usize,
        traits: Vec<Trait>,
        nodes: Vec<NodeGene>,
        genes: Vec<ConnectionGene>,
    ) -> Genome {
        Genome::with_control(id, traits, nodes, genes, Vec::new())
    }

    /// Creates a genome with MIMO control genes.
    pub fn with_control(
        id: usize,
        traits: Vec<Trait>,
        nodes: Vec<NodeGene>,
        mut genes: Vec<ConnectionGene>,
        control_genes: Vec<MimoControlGene>,
    ) -> Genome {
        genes.sort_by_key(ConnectionGene::innovation);
        Genome {
            id,
            traits,
            nodes,
            genes,
            control_genes,
        }
    }

    /// Creates a randomly connected genome: `num_in` sensors (the last
    /// one a bias when there is more than one input), `num_hidden`
    /// interior nodes and `num_out` outputs. Every hidden node reads
    /// one random input, every output reads one random hidden node (or
    /// input, if there are no hidden nodes), and each remaining
    /// input-to-interior pair is connected with probability
    /// `link_prob`.
    pub fn new_random<R: Rng>(
        id: usize,
        num_in: usize,
        num_out: usize,
        num_hidden: usize,
        link_prob: f64,
        rng: &mut R,
    ) -> Genome {
        let mut nodes = Vec::with_capacity(num_in + num_hidden + num_out);
        for i in 0..num_in {
            let kind = if i == num_in - 1 && num_in > 1 {
                NodeKind::Bias
            } else {
                NodeKind::Sensor
            };
            nodes.push(NodeGene::new(i + 1, kind, ActivationKind::Null));
        }
        for h in 0..num_hidden {
            nodes.push(NodeGene::new(
                num_in + h + 1,
                NodeKind::Hidden,
                ActivationKind::SigmoidSteepened,
            ));
        }
        for o in 0..num_out {
            nodes.push(NodeGene::new(
                num_in + num_hidden + o + 1,
                NodeKind::Output,
                ActivationKind::SigmoidSteepened,
            ));
        }

        let inputs: Vec<NodeId> = (1..=num_in).collect();
        let hiddens: Vec<NodeId> = (num_in + 1..=num_in + num_hidden).collect();
        let outputs: Vec<NodeId> =
            (num_in + num_hidden + 1..=num_in + num_hidden + num_out).collect();

        let mut genes: Vec<ConnectionGene> = Vec::new();
        let mut innovation = 1;
        let mut push = |genes: &mut Vec<ConnectionGene>, source: NodeId, target: NodeId, weight: f64| {
            let mut gene = ConnectionGene::new(innovation, source, target, weight, false);
            gene.set_mutation_num(weight);
            gene_insert(genes, gene);
            innovation += 1;
        };

        for &hidden in &hiddens {
            if let Some(&source) = inputs.choose(rng) {
                push(&mut genes, source, hidden, rng.gen_range(-1.0..=1.0));
            }
        }
        for &output in &outputs {
            let source = hiddens.choose(rng).or_else(|| inputs.choose(rng));
            if let Some(&source) = source {
                push(&mut genes, source, output, rng.gen_range(-1.0..=1.0));
            }
        }
        for &source in &inputs {
            for &target in hiddens.iter().chain(&outputs) {
                let taken = genes.iter().any(|g| g.endpoints() == (source, target));
                if !taken && rng.gen::<f64>() < link_prob {
                    push(&mut genes, source, target, rng.gen_range(-1.0..=1.0));
                }
            }
        }

        Genome::new(id, Vec::new(), nodes, genes)
    }

    /// Reads a genome from its line-oriented ASCII form.
    ///
    /// # Errors
    /// Fails with [`GenomeError::Serialization`] on malformed input
    /// and with the verification error of the parsed genome, if any.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Genome, GenomeError> {
        format::read_genome(reader)
    }

    /// Writes the genome in its line-oriented ASCII form. Reading the
    /// written form back yields an equal genome.
    ///
    /// # Errors
    /// Fails with [`GenomeError::Serialization`] on write failures.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), GenomeError> {
        format::write_genome(self, writer)
    }

    /// Returns the genome's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the genome's traits.
    pub fn traits(&self) -> &[Trait] {
        &self.traits
    }

    /// Returns the genome's node genes.
    pub fn nodes(&self) -> &[NodeGene] {
        &self.nodes
    }

    /// Returns the genome's connection genes, sorted by innovation
    /// number.
    pub fn genes(&self) -> &[ConnectionGene] {
        &self.genes
    }

    /// Returns the genome's MIMO control genes.
    pub fn control_genes(&self) -> &[MimoControlGene] {
        &self.control_genes
    }

    /// Returns the node gene with the given ID, if resident.
    pub fn node_by_id(&self, id: NodeId) -> Option<&NodeGene> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Returns the genome's complexity: its node, connection and
    /// control gene count.
    pub fn complexity(&self) -> usize {
        self.nodes.len() + self.genes.len() + self.control_genes.len()
    }

    /// Returns the highest innovation number carried by the genome.
    pub fn last_innovation(&self) -> Innovation {
        self.genes
            .last()
            .map(ConnectionGene::innovation)
            .into_iter()
            .chain(self.control_genes.iter().map(MimoControlGene::innovation))
            .max()
            .unwrap_or(0)
    }

    /// Returns the highest node ID carried by the genome, control
    /// nodes included.
    pub fn last_node_id(&self) -> NodeId {
        self.nodes
            .iter()
            .map(NodeGene::id)
            .chain(self.control_genes.iter().map(MimoControlGene::control_node))
            .max()
            .unwrap_or(0)
    }

    /// Returns a structural and parametric copy of the genome under a
    /// new ID.
    pub fn duplicate(&self, new_id: usize) -> Genome {
        let mut copy = self.clone();
        copy.id = new_id;
        copy
    }

    /// Checks the genome's invariants.
    ///
    /// # Errors
    /// Fails when a connection references an absent node, when two
    /// connections share endpoints, when two connections share an
    /// innovation number, or when a trait reference is dangling.
    pub fn verify(&self) -> Result<(), GenomeError> {
        let node_ids: HashSet<NodeId, RandomState> =
            self.nodes.iter().map(NodeGene::id).collect();
        let trait_ids: HashSet<usize, RandomState> =
            self.traits.iter().map(Trait::id).collect();

        let mut pairs: HashSet<(NodeId, NodeId), RandomState> = HashSet::default();
        let mut innovations: HashSet<Innovation, RandomState> = HashSet::default();
        for gene in &self.genes {
            if !node_ids.contains(&gene.source()) {
                return Err(VerificationFailure::MissingInputNode(gene.source()).into());
            }
            if !node_ids.contains(&gene.target()) {
                return Err(VerificationFailure::MissingOutputNode(gene.target()).into());
            }
            if !innovations.insert(gene.innovation()) {
                return Err(GenomeError::InnovationConflict(gene.innovation()));
            }
            if !pairs.insert(gene.endpoints()) {
                let (source, target) = gene.endpoints();
                return Err(VerificationFailure::DuplicateConnection(source, target).into());
            }
            if let Some(trait_id) = gene.trait_id() {
                if !trait_ids.contains(&trait_id) {
                    return Err(VerificationFailure::DanglingTraitRef(trait_id).into());
                }
            }
        }
        for node in &self.nodes {
            if let Some(trait_id) = node.trait_id() {
                if !trait_ids.contains(&trait_id) {
                    return Err(VerificationFailure::DanglingTraitRef(trait_id).into());
                }
            }
        }
        for module in &self.control_genes {
            for link in module.inputs() {
                if !node_ids.contains(&link.node()) {
                    return Err(VerificationFailure::MissingInputNode(link.node()).into());
                }
            }
            for link in module.outputs() {
                if !node_ids.contains(&link.node()) {
                    return Err(VerificationFailure::MissingOutputNode(link.node()).into());
                }
            }
        }
        Ok(())
    }

    /// Expands the genome into its phenotype network: one node per
    /// genome node plus one interior node per control gene, one link
    /// per enabled connection gene and per module link. Disabled
    /// connection genes are skipped.
    ///
    /// # Errors
    /// Fails when verification fails.
    pub fn expand(&self, net_id: usize) -> Result<Network, GenomeError> {
        self.verify()?;
        let mut net = Network::new(net_id);
        let mut index_of: HashMap<NodeId, usize, RandomState> = HashMap::default();
        for node in &self.nodes {
            let index = net.add_node(node.id(), node.kind(), node.activation());
            index_of.insert(node.id(), index);
        }
        for gene in &self.genes {
            if !gene.enabled() {
                continue;
            }
            let source = index_of[&gene.source()];
            let target = index_of[&gene.target()];
            if gene.recurrent() {
                net.connect_recurrent(source, target, gene.weight());
            } else {
                net.connect(source, target, gene.weight());
            }
        }
        for module in &self.control_genes {
            if !module.enabled() {
                continue;
            }
            let incoming: Vec<(usize, f64)> = module
                .inputs()
                .iter()
                .map(|link| (index_of[&link.node()], link.weight()))
                .collect();
            let outgoing: Vec<(usize, f64)> = module
                .outputs()
                .iter()
                .map(|link| (index_of[&link.node()], link.weight()))
                .collect();
            net.add_control_node(
                module.control_node(),
                module.activation(),
                &incoming,
                &outgoing,
            );
        }
        Ok(net)
    }

    /// Computes the compatibility distance to another genome:
    /// `c_excess·E + c_disjoint·D + c_mutdiff·W̄`, where `E` and `D`
    /// count excess and disjoint genes and `W̄` is the mean absolute
    /// mutation-number difference over matching genes. Identical
    /// genomes score 0, and the measure is symmetric.
    pub fn compatibility(&self, other: &Genome, options: &NeatOptions) -> f64 {
        match options.gen_compat_method {
            CompatMethod::Linear => self.compatibility_walk(other, options, false),
            CompatMethod::Fast => self.compatibility_walk(other, options, true),
        }
    }

    /// Walks both connection lists in innovation order, classifying
    /// genes as matching, disjoint or excess. When `short_circuit` is
    /// set, returns early once the disjoint and excess terms alone
    /// reach the compatibility threshold.
    fn compatibility_walk(
        &self,
        other: &Genome,
        options: &NeatOptions,
        short_circuit: bool,
    ) -> f64 {
        let (g1, g2) = (&self.genes, &other.genes);
        let (mut i1, mut i2) = (0, 0);
        let mut disjoint = 0usize;
        let mut excess = 0usize;
        let mut matching = 0usize;
        let mut mut_diff_total = 0.0;

        while i1 < g1.len() || i2 < g2.len() {
            if i1 >= g1.len() {
                excess += 1;
                i2 += 1;
            } else if i2 >= g2.len() {
                excess += 1;
                i1 += 1;
            } else {
                let (p1, p2) = (g1[i1].innovation(), g2[i2].innovation());
                if p1 == p2 {
                    matching += 1;
                    mut_diff_total += (g1[i1].mutation_num() - g2[i2].mutation_num()).abs();
                    i1 += 1;
                    i2 += 1;
                } else if p1 < p2 {
                    disjoint += 1;
                    i1 += 1;
                } else {
                    disjoint += 1;
                    i2 += 1;
                }
            }
            if short_circuit && options.compat_threshold > 0.0 {
                let partial = options.disjoint_coeff * disjoint as f64
                    + options.excess_coeff * excess as f64;
                if partial >= options.compat_threshold {
                    return partial;
                }
            }
        }

        let mut_diff = if matching > 0 {
            mut_diff_total / matching as f64
        } else {
            0.0
        };
        options.disjoint_coeff * disjoint as f64
            + options.excess_coeff * excess as f64
            + options.mutdiff_coeff * mut_diff
    }

    /// Applies one round of mutations chosen by the configured
    /// probabilities: a structural mutation (add-node, add-link or
    /// connect-sensors), or otherwise a set of parametric ones. A
    /// structural mutation that finds no viable site leaves the
    /// genome unchanged; that is a no-change outcome, not an error.
    pub fn mutate<R: Rng>(
        &mut self,
        rng: &mut R,
        ledger: &InnovationLedger,
        options: &NeatOptions,
    ) -> Result<(), GenomeError> {
        let hidden_budget_left = options.max_hidden_percentage <= 0.0 || {
            let hidden = self
                .nodes
                .iter()
                .filter(|n| n.kind() == NodeKind::Hidden)
                .count();
            (hidden as f64) < options.max_hidden_percentage * self.nodes.len() as f64
        };

        if hidden_budget_left && rng.gen::<f64>() < options.mutate_add_node_prob {
            self.mutate_add_node(rng, ledger)?;
        } else if rng.gen::<f64>() < options.mutate_add_link_prob {
            self.mutate_add_link(rng, ledger, options)?;
        } else if rng.gen::<f64>() < options.mutate_connect_sensors {
            self.mutate_connect_sensors(rng, ledger)?;
        } else {
            if rng.gen::<f64>() < options.mutate_random_trait_prob {
                self.mutate_random_trait(rng, options);
            }
            if rng.gen::<f64>() < options.mutate_link_trait_prob {
                self.mutate_link_trait(rng, 1);
            }
            if rng.gen::<f64>() < options.mutate_node_trait_prob {
                self.mutate_node_trait(rng, 1);
            }
            if rng.gen::<f64>() < options.mutate_link_weights_prob {
                self.mutate_link_weights(
                    rng,
                    options.weight_mut_power,
                    1.0,
                    WeightMutator::Gaussian,
                );
            }
            if rng.gen::<f64>() < options.mutate_toggle_enable_prob {
                self.mutate_toggle_enable(rng, 1);
            }
            if rng.gen::<f64>() < options.mutate_gene_reenable_prob {
                self.mutate_gene_reenable();
            }
        }
        Ok(())
    }

    /// Splits a random enabled connection: the connection is disabled,
    /// a hidden node is inserted, and two connections replace it — the
    /// incoming one with weight 1, the outgoing one with the split
    /// connection's weight. The ledger maps the split innovation to
    /// the new node ID and the two new innovation numbers, so that
    /// organisms splitting the same connection in the same generation
    /// agree on them.
    ///
    /// Returns false, leaving the genome unchanged, when no connection
    /// qualifies.
    pub fn mutate_add_node<R: Rng>(
        &mut self,
        rng: &mut R,
        ledger: &InnovationLedger,
    ) -> Result<bool, GenomeError> {
        let candidates: Vec<usize> = self
            .genes
            .iter()
            .enumerate()
            .filter(|(_, gene)| gene.enabled())
            .filter(|(_, gene)| {
                self.node_by_id(gene.source())
                    .map_or(false, |n| n.kind() != NodeKind::Bias)
            })
            .map(|(index, _)| index)
            .collect();
        let gene_index = match candidates.choose(rng) {
            Some(&index) => index,
            None => return Ok(false),
        };

        let split = ledger.node_split(self.genes[gene_index].innovation());
        if self.nodes.iter().any(|n| n.id() == split.node_id) {
            return Ok(false);
        }

        let (source, target) = self.genes[gene_index].endpoints();
        let weight = self.genes[gene_index].weight();
        let recurrent = self.genes[gene_index].recurrent();
        let trait_id = self.genes[gene_index].trait_id();
        self.genes[gene_index].set_enabled(false);

        self.nodes.push(NodeGene::new(
            split.node_id,
            NodeKind::Hidden,
            ActivationKind::SigmoidSteepened,
        ));
        gene_insert(
            &mut self.genes,
            ConnectionGene::with_trait(
                split.in_innovation,
                source,
                split.node_id,
                1.0,
                recurrent,
                trait_id,
                0.0,
                true,
            ),
        );
        gene_insert(
            &mut self.genes,
            ConnectionGene::with_trait(
                split.out_innovation,
                split.node_id,
                target,
                weight,
                false,
                trait_id,
                0.0,
                true,
            ),
        );
        Ok(true)
    }

    /// Adds a connection between a sampled source and target, obeying
    /// the configured recurrent-only probability. A candidate must not
    /// duplicate an existing edge, and its recurrency (detected on the
    /// expanded phenotype) must match what was asked for. Gives up
    /// after the configured number of tries.
    ///
    /// Returns false, leaving the genome unchanged, when no candidate
    /// was found.
    pub fn mutate_add_link<R: Rng>(
        &mut self,
        rng: &mut R,
        ledger: &InnovationLedger,
        options: &NeatOptions,
    ) -> Result<bool, GenomeError> {
        let net = self.expand(self.id)?;
        let do_recur = rng.gen::<f64>() < options.recur_only_prob;
        let non_sensor: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.kind().is_sensor())
            .map(|(index, _)| index)
            .collect();
        if non_sensor.is_empty() {
            return Ok(false);
        }
        let traversal_cap = net.node_count() * net.node_count();

        for _ in 0..options.new_link_tries {
            let (source_pos, target_pos) = if do_recur && rng.gen::<f64>() < 0.5 {
                // A loop onto a single non-sensor node.
                match non_sensor.choose(rng) {
                    Some(&pos) => (pos, pos),
                    None => return Ok(false),
                }
            } else {
                let source_pos = rng.gen_range(0..self.nodes.len());
                match non_sensor.choose(rng) {
                    Some(&pos) => (source_pos, pos),
                    None => return Ok(false),
                }
            };
            let source = self.nodes[source_pos].id();
            let target = self.nodes[target_pos].id();

            if self.genes.iter().any(|g| g.endpoints() == (source, target)) {
                continue;
            }
            let (source_index, target_index) =
                match (net.node_index_of(source), net.node_index_of(target)) {
                    (Some(s), Some(t)) => (s, t),
                    _ => continue,
                };
            let mut visited = 0;
            let recurrent = source == target
                || net.is_recurrent(source_index, target_index, &mut visited, traversal_cap);
            if recurrent != do_recur {
                continue;
            }

            let innovation = ledger.link_innovation(source, target, recurrent);
            if self.genes.iter().any(|g| g.innovation() == innovation) {
                continue;
            }
            let weight = rng.gen_range(-1.0..=1.0) * options.weight_mut_power;
            let trait_id = self.traits.choose(rng).map(Trait::id);
            gene_insert(
                &mut self.genes,
                ConnectionGene::with_trait(
                    innovation, source, target, weight, recurrent, trait_id, weight, true,
                ),
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// Connects every sensor that has no outgoing connection to a
    /// random non-sensor node, with a fresh innovation each.
    ///
    /// Returns false when every sensor is already connected.
    pub fn mutate_connect_sensors<R: Rng>(
        &mut self,
        rng: &mut R,
        ledger: &InnovationLedger,
    ) -> Result<bool, GenomeError> {
        let disconnected: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.kind().is_sensor())
            .map(NodeGene::id)
            .filter(|&id| !self.genes.iter().any(|g| g.source() == id))
            .collect();
        if disconnected.is_empty() {
            return Ok(false);
        }
        let targets: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| !n.kind().is_sensor())
            .map(NodeGene::id)
            .collect();

        let mut connected = false;
        for sensor in disconnected {
            let candidates: Vec<NodeId> = targets
                .iter()
                .copied()
                .filter(|&target| !self.genes.iter().any(|g| g.endpoints() == (sensor, target)))
                .collect();
            let target = match candidates.choose(rng) {
                Some(&target) => target,
                None => continue,
            };
            let innovation = ledger.link_innovation(sensor, target, false);
            if self.genes.iter().any(|g| g.innovation() == innovation) {
                continue;
            }
            let weight = rng.gen_range(-1.0..=1.0);
            gene_insert(
                &mut self.genes,
                ConnectionGene::with_trait(
                    innovation, sensor, target, weight, false, None, weight, true,
                ),
            );
            connected = true;
        }
        Ok(connected)
    }

    /// Perturbs the weights of the enabled connections. Each weight is
    /// either nudged by a draw from a power-scaled Gaussian or
    /// replaced by one, with replacement more likely for severe
    /// rounds and for the youngest genes at the tail of a long list.
    /// The mutation number follows the weight.
    pub fn mutate_link_weights<R: Rng>(
        &mut self,
        rng: &mut R,
        power: f64,
        rate: f64,
        mutator: WeightMutator,
    ) -> bool {
        if self.genes.is_empty() {
            return false;
        }
        let severe = rng.gen::<f64>() < 0.5;
        let gene_total = self.genes.len() as f64;
        let tail_start = gene_total * 0.8;
        let normal = Normal::new(0.0, power.abs()).ok();

        for (position, gene) in self.genes.iter_mut().enumerate() {
            if !gene.enabled() {
                continue;
            }
            let (gauss_point, cold_gauss_point) = if severe {
                (0.3, 0.1)
            } else if gene_total >= 10.0 && (position as f64) > tail_start {
                (0.5, 0.3)
            } else if rng.gen::<f64>() < 0.5 {
                (1.0 - rate, 1.0 - rate - 0.1)
            } else {
                (1.0 - rate, 1.0 - rate)
            };

            let draw = match normal {
                Some(normal) => normal.sample(rng),
                None => rng.gen_range(-1.0..=1.0) * power,
            };
            match mutator {
                WeightMutator::Gaussian => {
                    let choice = rng.gen::<f64>();
                    if choice > gauss_point {
                        gene.set_weight(gene.weight() + draw);
                    } else if choice > cold_gauss_point {
                        gene.set_weight(draw);
                    }
                }
                WeightMutator::ColdGaussian => gene.set_weight(draw),
            }
            gene.set_mutation_num(gene.weight());
        }
        true
    }

    /// Perturbs one randomly chosen trait's parameters.
    pub fn mutate_random_trait<R: Rng>(&mut self, rng: &mut R, options: &NeatOptions) -> bool {
        let trait_param_mut_prob = options.trait_param_mut_prob;
        let trait_mutation_power = options.trait_mutation_power;
        match self.traits.choose_mut(rng) {
            Some(t) => {
                t.mutate(rng, trait_mutation_power, trait_param_mut_prob);
                true
            }
            None => false,
        }
    }

    /// Reassigns random connections' trait references, `times` times.
    pub fn mutate_link_trait<R: Rng>(&mut self, rng: &mut R, times: usize) -> bool {
        if self.traits.is_empty() || self.genes.is_empty() {
            return false;
        }
        for _ in 0..times {
            let trait_id = match self.traits.choose(rng) {
                Some(t) => t.id(),
                None => return false,
            };
            if let Some(gene) = self.genes.choose_mut(rng) {
                gene.set_trait_id(Some(trait_id));
            }
        }
        true
    }

    /// Reassigns random nodes' trait references, `times` times.
    pub fn mutate_node_trait<R: Rng>(&mut self, rng: &mut R, times: usize) -> bool {
        if self.traits.is_empty() || self.nodes.is_empty() {
            return false;
        }
        for _ in 0..times {
            let trait_id = match self.traits.choose(rng) {
                Some(t) => t.id(),
                None => return false,
            };
            if let Some(node) = self.nodes.choose_mut(rng) {
                node.set_trait_id(Some(trait_id));
            }
        }
        true
    }

    /// Flips the enabled flag of random connections, `times` times.
    /// A connection is only disabled if its source keeps another
    /// enabled outgoing connection, so no node is orphaned.
    pub fn mutate_toggle_enable<R: Rng>(&mut self, rng: &mut R, times: usize) -> bool {
        if self.genes.is_empty() {
            return false;
        }
        for _ in 0..times {
            let index = match (0..self.genes.len()).choose(rng) {
                Some(index) => index,
                None => return false,
            };
            if self.genes[index].enabled() {
                let source = self.genes[index].source();
                let source_stays_connected = self
                    .genes
                    .iter()
                    .enumerate()
                    .any(|(j, g)| j != index && g.source() == source && g.enabled());
                if source_stays_connected {
                    self.genes[index].set_enabled(false);
                }
            } else {
                self.genes[index].set_enabled(true);
            }
        }
        true
    }

    /// Enables the first disabled connection encountered. Returns
    /// false when every connection is enabled.
    pub fn mutate_gene_reenable(&mut self) -> bool {
        for gene in &mut self.genes {
            if !gene.enabled() {
                gene.set_enabled(true);
                return true;
            }
        }
        false
    }

    /// Multipoint crossover: connection lists are aligned by
    /// innovation number; matching genes are inherited from a parent
    /// chosen per gene by coin flip, disjoint and excess genes from
    /// the fitter parent. On an exact fitness tie, the smaller parent
    /// counts as fitter under [`TieBreak::CoinFlip`], while
    /// [`TieBreak::TakeBoth`] admits both parents' non-matching genes.
    ///
    /// # Errors
    /// Fails when the child genome fails verification.
    pub fn mate_multipoint<R: Rng>(
        &self,
        other: &Genome,
        child_id: usize,
        fitness1: f64,
        fitness2: f64,
        rng: &mut R,
        options: &NeatOptions,
    ) -> Result<Genome, GenomeError> {
        self.mate_aligned(other, child_id, fitness1, fitness2, rng, options, false)
    }

    /// Multipoint-average crossover: like [`Genome::mate_multipoint`],
    /// but matching genes' weights and mutation numbers are the
    /// arithmetic means of the two parents'.
    ///
    /// # Errors
    /// Fails when the child genome fails verification.
    pub fn mate_multipoint_avg<R: Rng>(
        &self,
        other: &Genome,
        child_id: usize,
        fitness1: f64,
        fitness2: f64,
        rng: &mut R,
        options: &NeatOptions,
    ) -> Result<Genome, GenomeError> {
        self.mate_aligned(other, child_id, fitness1, fitness2, rng, options, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn mate_aligned<R: Rng>(
        &self,
        other: &Genome,
        child_id: usize,
        fitness1: f64,
        fitness2: f64,
        rng: &mut R,
        options: &NeatOptions,
        average: bool,
    ) -> Result<Genome, GenomeError> {
        let traits = self.mate_traits(other);
        let tie = (fitness1 - fitness2).abs() < f64::EPSILON;
        let take_both = tie && options.mate_tie_break == TieBreak::TakeBoth;
        let p1_better =
            fitness1 > fitness2 || (tie && self.genes.len() < other.genes.len());

        let (g1, g2) = (&self.genes, &other.genes);
        let (mut i1, mut i2) = (0, 0);
        let mut child_genes: Vec<ConnectionGene> = Vec::new();

        while i1 < g1.len() || i2 < g2.len() {
            let mut skip = false;
            let mut chosen: ConnectionGene;
            if i1 >= g1.len() {
                chosen = g2[i2].clone();
                i2 += 1;
                skip = p1_better && !take_both;
            } else if i2 >= g2.len() {
                chosen = g1[i1].clone();
                i1 += 1;
                skip = !p1_better && !take_both;
            } else if g1[i1].innovation() == g2[i2].innovation() {
                let (a, b) = (&g1[i1], &g2[i2]);
                chosen = if average {
                    Self::average_genes(a, b, rng)
                } else if rng.gen::<bool>() {
                    a.clone()
                } else {
                    b.clone()
                };
                chosen.set_enabled(true);
                if (!a.enabled() || !b.enabled()) && rng.gen::<f64>() < DISABLED_INHERIT_PROB {
                    chosen.set_enabled(false);
                }
                i1 += 1;
                i2 += 1;
            } else if g1[i1].innovation() < g2[i2].innovation() {
                chosen = g1[i1].clone();
                i1 += 1;
                skip = !p1_better && !take_both;
            } else {
                chosen = g2[i2].clone();
                i2 += 1;
                skip = p1_better && !take_both;
            }

            if !skip && child_genes.iter().any(|g| g.endpoints() == chosen.endpoints()) {
                skip = true;
            }
            if !skip {
                gene_insert(&mut child_genes, chosen);
            }
        }

        self.finish_child(other, child_id, traits, child_genes)
    }

    /// Single-point crossover: a crossover index is chosen along the
    /// shorter parent's matches; before it matching genes come from
    /// the shorter parent, at it the pair is averaged, after it genes
    /// come from the longer parent.
    ///
    /// # Errors
    /// Fails when the child genome fails verification.
    pub fn mate_singlepoint<R: Rng>(
        &self,
        other: &Genome,
        child_id: usize,
        rng: &mut R,
    ) -> Result<Genome, GenomeError> {
        let traits = self.mate_traits(other);
        let (p1genes, p2genes) = if self.genes.len() < other.genes.len() {
            (&self.genes, &other.genes)
        } else {
            (&other.genes, &self.genes)
        };
        let cross_point = if p1genes.is_empty() {
            0
        } else {
            rng.gen_range(0..p1genes.len())
        };

        let (mut i1, mut i2) = (0, 0);
        let mut gene_counter = 0;
        let mut child_genes: Vec<ConnectionGene> = Vec::new();

        while i1 < p1genes.len() || i2 < p2genes.len() {
            let candidate: Option<ConnectionGene> = if i1 >= p1genes.len() {
                i2 += 1;
                Some(p2genes[i2 - 1].clone())
            } else if i2 >= p2genes.len() {
                i1 += 1;
                Some(p1genes[i1 - 1].clone())
            } else {
                let (a, b) = (&p1genes[i1], &p2genes[i2]);
                if a.innovation() == b.innovation() {
                    let mut gene = if gene_counter < cross_point {
                        a.clone()
                    } else if gene_counter == cross_point {
                        Self::average_genes(a, b, rng)
                    } else {
                        b.clone()
                    };
                    gene.set_enabled(true);
                    if (!a.enabled() || !b.enabled())
                        && rng.gen::<f64>() < DISABLED_INHERIT_PROB
                    {
                        gene.set_enabled(false);
                    }
                    i1 += 1;
                    i2 += 1;
                    gene_counter += 1;
                    Some(gene)
                } else if a.innovation() < b.innovation() {
                    if gene_counter < cross_point {
                        i1 += 1;
                        gene_counter += 1;
                        Some(a.clone())
                    } else {
                        i2 += 1;
                        Some(b.clone())
                    }
                } else {
                    i2 += 1;
                    None
                }
            };

            if let Some(gene) = candidate {
                if !child_genes.iter().any(|g| g.endpoints() == gene.endpoints()) {
                    gene_insert(&mut child_genes, gene);
                }
            }
        }

        self.finish_child(other, child_id, traits, child_genes)
    }

    /// Builds a matching-pair gene whose weight and mutation number
    /// are the parents' means, with endpoints and recurrency chosen
    /// per coin flip.
    fn average_genes<R: Rng>(a: &ConnectionGene, b: &ConnectionGene, rng: &mut R) -> ConnectionGene {
        let template = if rng.gen::<bool>() { a } else { b };
        let mut gene = template.clone();
        gene.set_weight((a.weight() + b.weight()) / 2.0);
        gene.set_mutation_num((a.mutation_num() + b.mutation_num()) / 2.0);
        if rng.gen::<bool>() {
            gene.set_trait_id(b.trait_id());
        } else {
            gene.set_trait_id(a.trait_id());
        }
        gene
    }

    /// Assembles and verifies a child genome from its crossed-over
    /// gene list: control genes carried over from either parent, the
    /// union of referenced nodes, and sanitised trait references.
    fn finish_child(
        &self,
        other: &Genome,
        child_id: usize,
        traits: Vec<Trait>,
        child_genes: Vec<ConnectionGene>,
    ) -> Result<Genome, GenomeError> {
        let mut control_genes: Vec<MimoControlGene> = self.control_genes.clone();
        for module in &other.control_genes {
            if !control_genes
                .iter()
                .any(|m| m.innovation() == module.innovation())
            {
                control_genes.push(module.clone());
            }
        }
        control_genes.sort_by_key(MimoControlGene::innovation);

        let nodes = Self::mate_nodes(&child_genes, &control_genes, self, other);
        let mut child = Genome {
            id: child_id,
            traits,
            nodes,
            genes: child_genes,
            control_genes,
        };
        child.sanitize_trait_refs();
        child.verify()?;
        Ok(child)
    }

    /// Averages the parents' traits pairwise; a longer parent's
    /// unpaired traits are cloned into the child.
    fn mate_traits(&self, other: &Genome) -> Vec<Trait> {
        let count = self.traits.len().max(other.traits.len());
        (0..count)
            .map(
                |i| match (self.traits.get(i), other.traits.get(i)) {
                    (Some(a), Some(b)) => Trait::averaged(a, b),
                    (Some(a), None) => a.clone(),
                    (None, Some(b)) => b.clone(),
                    (None, None) => unreachable!("index bounded by max length"),
                },
            )
            .collect()
    }

    /// Collects the child's node genes: sensors, bias and output
    /// nodes from both parents, plus every node referenced by an
    /// inherited connection or module link. Nodes are cloned from
    /// whichever parent holds them, and sorted by ID.
    fn mate_nodes(
        genes: &[ConnectionGene],
        control_genes: &[MimoControlGene],
        first: &Genome,
        second: &Genome,
    ) -> Vec<NodeGene> {
        fn inherit(
            id: NodeId,
            first: &Genome,
            second: &Genome,
            have: &mut HashSet<NodeId, RandomState>,
            nodes: &mut Vec<NodeGene>,
        ) {
            if have.insert(id) {
                if let Some(node) = first.node_by_id(id).or_else(|| second.node_by_id(id)) {
                    nodes.push(node.clone());
                }
            }
        }

        let mut have: HashSet<NodeId, RandomState> = HashSet::default();
        let mut nodes: Vec<NodeGene> = Vec::new();
        for node in first.nodes.iter().chain(second.nodes.iter()) {
            if node.kind() != NodeKind::Hidden {
                inherit(node.id(), first, second, &mut have, &mut nodes);
            }
        }
        for gene in genes {
            inherit(gene.source(), first, second, &mut have, &mut nodes);
            inherit(gene.target(), first, second, &mut have, &mut nodes);
        }
        for module in control_genes {
            for id in module.attached_nodes() {
                inherit(id, first, second, &mut have, &mut nodes);
            }
        }
        nodes.sort_by_key(NodeGene::id);
        nodes
    }

    /// Drops trait references that point outside the trait list.
    /// Crossover can inherit a gene from a parent whose trait set the
    /// child did not receive.
    fn sanitize_trait_refs(&mut self) {
        let trait_ids: HashSet<usize, RandomState> =
            self.traits.iter().map(Trait::id).collect();
        for gene in &mut self.genes {
            if let Some(trait_id) = gene.trait_id() {
                if !trait_ids.contains(&trait_id) {
                    gene.set_trait_id(None);
                }
            }
        }
        for node in &mut self.nodes {
            if let Some(trait_id) = node.trait_id() {
                if !trait_ids.contains(&trait_id) {
                    node.set_trait_id(None);
                }
            }
        }
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Genome")
            .field("Id", &self.id)
            .field("Traits", &self.traits.len())
            .field("Nodes", &self.nodes.len())
            .field("Genes", &self.genes.len())
            .field("ControlGenes", &self.control_genes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::ModuleActivationKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const GENOME_STR: &str = "genomestart 1\n\
        trait 1 0.1 0 0 0 0 0 0 0\n\
        trait 3 0.3 0 0 0 0 0 0 0\n\
        trait 2 0.2 0 0 0 0 0 0 0\n\
        node 1 0 1 1 NullActivation\n\
        node 2 0 1 1 NullActivation\n\
        node 3 0 1 3 SigmoidSteepenedActivation\n\
        node 4 0 0 2 SigmoidSteepenedActivation\n\
        gene 1 1 4 1.5 false 1 0 true\n\
        gene 2 2 4 2.5 false 2 0 true\n\
        gene 3 3 4 3.5 false 3 0 true\n\
        genomeend 1";

    fn build_test_genome(id: usize) -> Genome {
        let traits = vec![
            Trait::new(1, [0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Trait::new(3, [0.3, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Trait::new(2, [0.2, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ];
        let nodes = vec![
            NodeGene::new(1, NodeKind::Sensor, ActivationKind::Null),
            NodeGene::new(2, NodeKind::Sensor, ActivationKind::Null),
            NodeGene::new(3, NodeKind::Bias, ActivationKind::SigmoidSteepened),
            NodeGene::new(4, NodeKind::Output, ActivationKind::SigmoidSteepened),
        ];
        let genes = vec![
            ConnectionGene::with_trait(1, 1, 4, 1.5, false, Some(1), 0.0, true),
            ConnectionGene::with_trait(2, 2, 4, 2.5, false, Some(2), 0.0, true),
            ConnectionGene::with_trait(3, 3, 4, 3.5, false, Some(3), 0.0, true),
        ];
        Genome::new(id, traits, nodes, genes)
    }

    fn build_test_modular_genome(id: usize) -> Genome {
        let base = build_test_genome(id);
        let mut nodes = base.nodes().to_vec();
        nodes.extend([
            NodeGene::new(5, NodeKind::Hidden, ActivationKind::Linear),
            NodeGene::new(6, NodeKind::Hidden, ActivationKind::Linear),
            NodeGene::new(7, NodeKind::Hidden, ActivationKind::Null),
        ]);
        let mut genes = base.genes().to_vec();
        genes.extend([
            ConnectionGene::with_trait(4, 1, 5, 1.5, false, Some(1), 0.0, true),
            ConnectionGene::with_trait(5, 2, 6, 2.5, false, Some(2), 0.0, true),
            ConnectionGene::with_trait(6, 7, 4, 3.5, false, Some(3), 0.0, true),
        ]);
        let control_genes = vec![MimoControlGene::new(
            8,
            ModuleActivationKind::Multiply,
            vec![ModuleLink::new(5, 1.0), ModuleLink::new(6, 1.0)],
            vec![ModuleLink::new(7, 1.0)],
            7,
            5.5,
        )];
        Genome::with_control(id, base.traits().to_vec(), nodes, genes, control_genes)
    }

    fn coeffs() -> NeatOptions {
        NeatOptions {
            disjoint_coeff: 0.5,
            excess_coeff: 0.5,
            mutdiff_coeff: 0.5,
            compat_threshold: 0.0,
            ..NeatOptions::default()
        }
    }

    #[test]
    fn new_random_genome() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome = Genome::new_random(1, 3, 2, 2, 0.5, &mut rng);
        assert_eq!(genome.nodes().len(), 3 + 2 + 2);
        assert!(genome.genes().len() >= 2 + 2);
        genome.verify().unwrap();
    }

    #[test]
    fn genesis() {
        let genome = build_test_genome(1);
        let net = genome.expand(10).unwrap();
        assert_eq!(net.id(), 10);
        assert_eq!(net.node_count(), genome.nodes().len());
        assert_eq!(net.link_count(), genome.genes().len());
    }

    #[test]
    fn genesis_modular() {
        let genome = build_test_modular_genome(1);
        let net = genome.expand(10).unwrap();
        assert_eq!(net.id(), 10);
        assert_eq!(
            net.node_count(),
            genome.nodes().len() + genome.control_genes().len()
        );
        let module_links: usize = genome
            .control_genes()
            .iter()
            .map(|m| m.inputs().len() + m.outputs().len())
            .sum();
        assert_eq!(net.link_count(), genome.genes().len() + module_links);
    }

    #[test]
    fn genesis_skips_disabled_genes() {
        let mut genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes[1].set_enabled(false);
        genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        let net = genome.expand(1).unwrap();
        assert_eq!(net.link_count(), 2);
    }

    #[test]
    fn duplicate_is_equal() {
        let genome = build_test_genome(1);
        let copy = genome.duplicate(2);
        assert_eq!(copy.id(), 2);
        assert_eq!(genome.traits(), copy.traits());
        assert_eq!(genome.nodes(), copy.nodes());
        assert_eq!(genome.genes(), copy.genes());
        assert_eq!(genome.duplicate(1), genome);
    }

    #[test]
    fn duplicate_modular_is_equal() {
        let genome = build_test_modular_genome(1);
        let copy = genome.duplicate(2);
        assert_eq!(copy.control_genes(), genome.control_genes());
        assert_eq!(copy.duplicate(1), genome);
    }

    #[test]
    fn verify_detects_missing_nodes() {
        let mut genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::new(7, 100, 4, 1.0, false));
        genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        assert!(matches!(
            genome.verify(),
            Err(GenomeError::VerificationFailed(
                VerificationFailure::MissingInputNode(100)
            ))
        ));

        let mut genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::new(7, 4, 400, 1.0, false));
        genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        assert!(matches!(
            genome.verify(),
            Err(GenomeError::VerificationFailed(
                VerificationFailure::MissingOutputNode(400)
            ))
        ));
    }

    #[test]
    fn verify_detects_duplicate_connection() {
        let genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::new(7, 1, 4, 1.0, false));
        let genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        assert!(matches!(
            genome.verify(),
            Err(GenomeError::VerificationFailed(
                VerificationFailure::DuplicateConnection(1, 4)
            ))
        ));
    }

    #[test]
    fn verify_detects_innovation_conflict() {
        let genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::new(3, 4, 1, 1.0, true));
        let genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        assert!(matches!(
            genome.verify(),
            Err(GenomeError::InnovationConflict(3))
        ));
    }

    #[test]
    fn verify_detects_dangling_trait_ref() {
        let genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::with_trait(7, 4, 1, 1.0, true, Some(9), 0.0, true));
        let genome = Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        assert!(matches!(
            genome.verify(),
            Err(GenomeError::VerificationFailed(
                VerificationFailure::DanglingTraitRef(9)
            ))
        ));
    }

    #[test]
    fn compatibility_linear() {
        let genome1 = build_test_genome(1);
        let mut genome2 = build_test_genome(2);
        let options = coeffs();

        assert_eq!(genome1.compatibility(&genome2, &options), 0.0);

        let mut genes = genome2.genes().to_vec();
        genes.push(ConnectionGene::with_trait(10, 1, 1, 1.0, false, None, 1.0, true));
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 0.5);

        let mut genes = genome2.genes().to_vec();
        genes.push(ConnectionGene::with_trait(5, 1, 2, 2.0, false, None, 1.0, true));
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 1.0);

        let mut genes = genome2.genes().to_vec();
        genes[1].set_mutation_num(6.0);
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 2.0);
        // Compatibility is symmetric.
        assert_eq!(genome2.compatibility(&genome1, &options), 2.0);
    }

    #[test]
    fn compatibility_fast() {
        let genome1 = build_test_genome(1);
        let mut genome2 = build_test_genome(2);
        let options = NeatOptions {
            gen_compat_method: CompatMethod::Fast,
            ..coeffs()
        };

        assert_eq!(genome1.compatibility(&genome2, &options), 0.0);

        let mut genes = genome2.genes().to_vec();
        genes.push(ConnectionGene::with_trait(10, 1, 1, 1.0, false, None, 1.0, true));
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 0.5);

        let mut genes = genome2.genes().to_vec();
        genes.push(ConnectionGene::with_trait(5, 1, 2, 2.0, false, None, 1.0, true));
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 1.0);

        let mut genes = genome2.genes().to_vec();
        genes[1].set_mutation_num(6.0);
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);
        assert_eq!(genome1.compatibility(&genome2, &options), 2.0);
    }

    #[test]
    fn compatibility_fast_short_circuits() {
        let genome1 = build_test_genome(1);
        let mut genome2 = build_test_genome(2);
        let mut genes = genome2.genes().to_vec();
        genes.push(ConnectionGene::with_trait(10, 1, 1, 1.0, false, None, 1.0, true));
        genes.push(ConnectionGene::with_trait(11, 2, 2, 1.0, false, None, 1.0, true));
        genome2 = Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes);

        let options = NeatOptions {
            gen_compat_method: CompatMethod::Fast,
            compat_threshold: 0.5,
            ..coeffs()
        };
        // The walk stops as soon as the structural terms reach the
        // threshold; the caller only needs "too far apart".
        assert!(genome1.compatibility(&genome2, &options) >= 0.5);
    }

    #[test]
    fn compatibility_of_duplicate_is_zero() {
        let genome1 = build_test_genome(1);
        let genome2 = genome1.duplicate(2);
        assert_eq!(genome1.compatibility(&genome2, &coeffs()), 0.0);
    }

    #[test]
    fn mutate_add_link_recurrent_then_forward() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        let ledger = InnovationLedger::new(4, 5);
        let options = NeatOptions {
            recur_only_prob: 1.0,
            new_link_tries: 50,
            ..NeatOptions::default()
        };

        // The only non-sensor node is the output, so the new link must
        // be the recurrent loop onto it.
        let added = genome.mutate_add_link(&mut rng, &ledger, &options).unwrap();
        assert!(added);
        assert_eq!(genome.genes().len(), 4);
        let gene = genome
            .genes()
            .iter()
            .find(|g| g.innovation() == 4)
            .expect("new gene carries the ledger's innovation");
        assert_eq!(gene.endpoints(), (4, 4));
        assert!(gene.recurrent());
        assert_eq!(ledger.link_record_count(), 1);
        assert_eq!(ledger.next_innovation(), 5);
        genome.verify().unwrap();

        // With more interior nodes available a forward link is found.
        let mut nodes = genome.nodes().to_vec();
        nodes.push(NodeGene::new(5, NodeKind::Hidden, ActivationKind::SigmoidSteepened));
        nodes.push(NodeGene::new(6, NodeKind::Sensor, ActivationKind::SigmoidSteepened));
        let mut with_hidden = Genome::new(1, genome.traits().to_vec(), nodes, genome.genes().to_vec());
        let options = NeatOptions {
            recur_only_prob: 0.0,
            new_link_tries: 50,
            ..NeatOptions::default()
        };
        let added = with_hidden.mutate_add_link(&mut rng, &ledger, &options).unwrap();
        assert!(added);
        assert_eq!(with_hidden.genes().len(), 5);
        assert_eq!(ledger.link_record_count(), 2);
        let gene = with_hidden.genes().iter().max_by_key(|g| g.innovation()).unwrap();
        assert!(!gene.recurrent());
        with_hidden.verify().unwrap();
    }

    #[test]
    fn mutate_connect_sensors() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        let ledger = InnovationLedger::new(4, 5);

        // Every sensor already feeds the output.
        let connected = genome.mutate_connect_sensors(&mut rng, &ledger).unwrap();
        assert!(!connected);

        let mut nodes = genome.nodes().to_vec();
        nodes.push(NodeGene::new(5, NodeKind::Sensor, ActivationKind::SigmoidSteepened));
        let mut genome = Genome::new(1, genome.traits().to_vec(), nodes, genome.genes().to_vec());
        let connected = genome.mutate_connect_sensors(&mut rng, &ledger).unwrap();
        assert!(connected);
        assert_eq!(genome.genes().len(), 4);
        assert_eq!(ledger.link_record_count(), 1);
        genome.verify().unwrap();
    }

    #[test]
    fn mutate_add_node() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        let ledger = InnovationLedger::new(4, 5);

        let added = genome.mutate_add_node(&mut rng, &ledger).unwrap();
        assert!(added);
        assert_eq!(genome.genes().len(), 5);
        assert_eq!(genome.nodes().len(), 5);
        assert_eq!(ledger.node_record_count(), 1);
        assert_eq!(ledger.next_innovation(), 6);
        assert!(genome.node_by_id(5).is_some());
        assert_eq!(genome.nodes()[0].id(), 1);

        let disabled: Vec<_> = genome.genes().iter().filter(|g| !g.enabled()).collect();
        assert_eq!(disabled.len(), 1);
        let into = genome.genes().iter().find(|g| g.innovation() == 4).unwrap();
        assert_eq!(into.target(), 5);
        assert_eq!(into.weight(), 1.0);
        let out_of = genome.genes().iter().find(|g| g.innovation() == 5).unwrap();
        assert_eq!(out_of.source(), 5);
        assert_eq!(out_of.weight(), disabled[0].weight());
        genome.verify().unwrap();
    }

    #[test]
    fn add_node_ledger_deduplicates_across_organisms() {
        let mut rng = StdRng::seed_from_u64(7);
        let ledger = InnovationLedger::new(4, 5);
        let mut first = build_test_genome(1);
        let mut second = build_test_genome(2);

        // Force both copies to split the same connection by leaving
        // only one enabled non-bias candidate, the sensor-fed gene 1.
        for genome in [&mut first, &mut second] {
            let mut genes = genome.genes().to_vec();
            genes[1].set_enabled(false);
            genes[2].set_enabled(false);
            *genome = Genome::new(
                genome.id(),
                genome.traits().to_vec(),
                genome.nodes().to_vec(),
                genes,
            );
        }

        assert!(first.mutate_add_node(&mut rng, &ledger).unwrap());
        assert!(second.mutate_add_node(&mut rng, &ledger).unwrap());

        assert_eq!(ledger.node_record_count(), 1);
        let first_new = first.node_by_id(5).expect("new node in first genome");
        let second_new = second.node_by_id(5).expect("new node in second genome");
        assert_eq!(first_new.id(), second_new.id());
        let innovations =
            |g: &Genome| g.genes().iter().map(|x| x.innovation()).collect::<Vec<_>>();
        assert_eq!(innovations(&first), innovations(&second));
    }

    #[test]
    fn mutate_link_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        genome.mutate_link_weights(&mut rng, 0.5, 1.0, WeightMutator::ColdGaussian);
        for (i, gene) in genome.genes().iter().enumerate() {
            assert_ne!(gene.weight(), (i as f64) + 1.5, "gene {} not mutated", i);
            assert_eq!(gene.mutation_num(), gene.weight());
        }
    }

    #[test]
    fn mutate_random_trait() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        let options = NeatOptions {
            trait_mutation_power: 0.3,
            trait_param_mut_prob: 1.0,
            ..NeatOptions::default()
        };
        assert!(genome.mutate_random_trait(&mut rng, &options));
        let mutated = genome.traits().iter().any(|t| {
            let expected_first = t.id() as f64 / 10.0;
            (t.params()[0] - expected_first).abs() > f64::EPSILON
                || t.params()[1..].iter().any(|p| *p != 0.0)
        });
        assert!(mutated, "no mutation found in genome traits");
    }

    #[test]
    fn mutate_link_trait() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        assert!(genome.mutate_link_trait(&mut rng, 10));
        genome.verify().unwrap();
    }

    #[test]
    fn mutate_node_trait() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut genome = build_test_genome(1);
        assert!(genome.mutate_node_trait(&mut rng, 10));
        genome.verify().unwrap();
        assert!(genome.nodes().iter().any(|n| n.trait_id().is_some()));
    }

    #[test]
    fn mutate_toggle_enable_keeps_sources_alive() {
        let mut rng = StdRng::seed_from_u64(41);
        let mut genome = build_test_genome(1);

        // Each source has a single outgoing connection, so disabling
        // any of them would orphan it; nothing may flip.
        assert!(genome.mutate_toggle_enable(&mut rng, 10));
        assert!(genome.genes().iter().all(ConnectionGene::enabled));

        // A second connection out of node 3 makes that pair eligible.
        let mut genes = genome.genes().to_vec();
        genes.push(ConnectionGene::with_trait(4, 3, 1, 5.5, true, Some(2), 0.0, true));
        let mut genome =
            Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);
        genome.mutate_toggle_enable(&mut rng, 5);
        let disabled: Vec<_> = genome.genes().iter().filter(|g| !g.enabled()).collect();
        assert!(disabled.len() <= 1);
        for gene in disabled {
            assert_eq!(gene.source(), 3);
        }
    }

    #[test]
    fn mutate_gene_reenable() {
        let genome = build_test_genome(1);
        let mut genes = genome.genes().to_vec();
        genes[1].set_enabled(false);
        genes.push(ConnectionGene::with_trait(4, 3, 1, 5.5, false, Some(2), 0.0, false));
        let mut genome =
            Genome::new(1, genome.traits().to_vec(), genome.nodes().to_vec(), genes);

        assert!(genome.mutate_gene_reenable());
        assert!(genome.genes()[1].enabled(), "first disabled gene re-enabled");
        assert!(!genome.genes()[3].enabled(), "later gene still disabled");
    }

    #[test]
    fn mate_multipoint() {
        let mut rng = StdRng::seed_from_u64(42);
        let options = NeatOptions::default();
        let genome1 = build_test_genome(1);
        let genome2 = build_test_genome(2);

        let child = genome1
            .mate_multipoint(&genome2, 3, 1.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.id(), 3);
        assert_eq!(child.genes().len(), 3);
        assert_eq!(child.nodes().len(), 4);
        assert_eq!(child.traits().len(), 3);

        // An excess gene duplicating existing endpoints is dropped.
        let mut genes = genome1.genes().to_vec();
        genes.push(ConnectionGene::with_trait(4, 3, 4, 5.5, false, Some(2), 0.0, true));
        let genome1 =
            Genome::new(1, genome1.traits().to_vec(), genome1.nodes().to_vec(), genes);
        let child = genome1
            .mate_multipoint(&genome2, 3, 15.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.genes().len(), 3);
        assert_eq!(child.nodes().len(), 4);
        assert_eq!(child.traits().len(), 3);
    }

    #[test]
    fn mate_multipoint_modular() {
        let mut rng = StdRng::seed_from_u64(42);
        let options = NeatOptions::default();
        let genome1 = build_test_genome(1);
        let genome2 = build_test_modular_genome(2);

        let child = genome1
            .mate_multipoint(&genome2, 3, 1.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.genes().len(), 6);
        assert_eq!(child.nodes().len(), 7);
        assert_eq!(child.traits().len(), 3);
        assert_eq!(child.control_genes().len(), 1);
    }

    #[test]
    fn mate_multipoint_avg() {
        let mut rng = StdRng::seed_from_u64(42);
        let options = NeatOptions::default();
        let genome1 = build_test_genome(1);
        let genome2 = build_test_genome(2);

        let child = genome1
            .mate_multipoint_avg(&genome2, 3, 1.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.genes().len(), 3);
        assert_eq!(child.nodes().len(), 4);
        assert_eq!(child.traits().len(), 3);
        // Identical parents average to themselves.
        for (gene, parent_gene) in child.genes().iter().zip(genome1.genes()) {
            assert_eq!(gene.weight(), parent_gene.weight());
        }

        // Matching genes beyond the common structure are averaged in.
        let loop_gene =
            |mutation: f64| ConnectionGene::with_trait(4, 4, 4, 5.5, true, Some(2), mutation, false);
        let mut genes1 = genome1.genes().to_vec();
        genes1.push(loop_gene(1.0));
        let genome1 =
            Genome::new(1, genome1.traits().to_vec(), genome1.nodes().to_vec(), genes1);
        let mut genes2 = genome2.genes().to_vec();
        genes2.push(loop_gene(3.0));
        let genome2 =
            Genome::new(2, genome2.traits().to_vec(), genome2.nodes().to_vec(), genes2);

        let child = genome1
            .mate_multipoint_avg(&genome2, 3, 15.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.genes().len(), 4);
        assert_eq!(child.nodes().len(), 4);
        let averaged = child.genes().iter().find(|g| g.innovation() == 4).unwrap();
        assert_eq!(averaged.mutation_num(), 2.0);
    }

    #[test]
    fn mate_multipoint_avg_modular() {
        let mut rng = StdRng::seed_from_u64(42);
        let options = NeatOptions::default();
        let genome1 = build_test_genome(1);
        let genome2 = build_test_modular_genome(2);

        let child = genome1
            .mate_multipoint_avg(&genome2, 3, 1.0, 2.3, &mut rng, &options)
            .unwrap();
        assert_eq!(child.genes().len(), 6);
        assert_eq!(child.nodes().len(), 7);
        assert_eq!(child.traits().len(), 3);
        assert_eq!(child.control_genes().len(), 1);
    }

    #[test]
    fn mate_singlepoint() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome1 = build_test_genome(1);
        let genome2 = build_test_genome(2);

        let child = genome1.mate_singlepoint(&genome2, 3, &mut rng).unwrap();
        assert_eq!(child.genes().len(), 3);
        assert_eq!(child.nodes().len(), 4);
        assert_eq!(child.traits().len(), 3);

        // A longer parent's extra gene with duplicate endpoints is
        // dropped.
        let mut genes = genome1.genes().to_vec();
        genes.push(ConnectionGene::with_trait(4, 3, 4, 5.5, false, Some(2), 0.0, false));
        let genome1_long =
            Genome::new(1, genome1.traits().to_vec(), genome1.nodes().to_vec(), genes);
        let child = genome1_long.mate_singlepoint(&genome2, 3, &mut rng).unwrap();
        assert_eq!(child.genes().len(), 3);
        assert_eq!(child.nodes().len(), 4);

        // Likewise for a recurrent duplicate of an inherited pair.
        let mut genes = genome1_long.genes().to_vec();
        genes.push(ConnectionGene::with_trait(7, 2, 4, 5.5, true, Some(2), 0.0, false));
        let genome2_longer =
            Genome::new(2, genome1.traits().to_vec(), genome1.nodes().to_vec(), genes);
        let child = genome1_long
            .mate_singlepoint(&genome2_longer, 3, &mut rng)
            .unwrap();
        assert_eq!(child.genes().len(), 3);
        child.verify().unwrap();
    }

    #[test]
    fn mate_singlepoint_modular() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome1 = build_test_genome(1);
        let genome2 = build_test_modular_genome(2);

        let child = genome1.mate_singlepoint(&genome2, 3, &mut rng).unwrap();
        assert_eq!(child.genes().len(), 6);
        assert_eq!(child.nodes().len(), 7);
        assert_eq!(child.traits().len(), 3);
        assert_eq!(child.control_genes().len(), 1);
    }

    #[test]
    fn crossover_inserts_in_innovation_order() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome1 = build_test_genome(1);
        let genome2 = build_test_modular_genome(2);
        let child = genome1
            .mate_multipoint(&genome2, 3, 1.0, 2.3, &mut rng, &NeatOptions::default())
            .unwrap();
        let innovations: Vec<_> = child.genes().iter().map(|g| g.innovation()).collect();
        let mut sorted = innovations.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(innovations, sorted);
    }

    #[test]
    fn text_format_read() {
        let genome = Genome::read_from(GENOME_STR.as_bytes()).unwrap();
        assert_eq!(genome, build_test_genome(1));
    }

    #[test]
    fn text_format_round_trip() {
        let genome = Genome::read_from(GENOME_STR.as_bytes()).unwrap();
        let mut written = Vec::new();
        genome.write_to(&mut written).unwrap();
        let reread = Genome::read_from(written.as_slice()).unwrap();
        assert_eq!(reread, genome);
    }

    #[test]
    fn text_format_rejects_unknown_activation() {
        let text = "genomestart 1\n\
            node 1 0 1 1 FancyActivation\n\
            genomeend 1";
        assert!(matches!(
            Genome::read_from(text.as_bytes()),
            Err(GenomeError::Activation(_))
        ));
    }

    #[test]
    fn complexity_counts_every_gene_kind() {
        assert_eq!(build_test_genome(1).complexity(), 4 + 3);
        assert_eq!(build_test_modular_genome(1).complexity(), 7 + 6 + 1);
    }
}
