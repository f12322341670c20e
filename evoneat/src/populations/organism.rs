//! An organism wraps a genome together with its expanded network and
//! evaluation results.

use crate::genomics::{Genome, GenomeError};
use crate::networks::Network;

/// A candidate solution: a genome, the network expanded from it, and
/// the fitness bookkeeping the evolutionary loop maintains around it.
///
/// Evaluators write `fitness`, `original_fitness`, `error` and
/// `winner`; during each epoch `original_fitness` is refreshed with
/// the raw pre-sharing fitness while `fitness` undergoes fitness
/// sharing within the organism's species.
#[derive(Clone, Debug)]
pub struct Organism {
    pub(crate) genome: Genome,
    pub(crate) net: Network,
    pub(crate) fitness: f64,
    pub(crate) original_fitness: f64,
    pub(crate) error: f64,
    pub(crate) winner: bool,
    pub(crate) is_champion: bool,
    pub(crate) eliminate: bool,
    pub(crate) expected_offspring: f64,
    pub(crate) generation: usize,
    pub(crate) species_id: Option<usize>,
}

impl Organism {
    /// Creates an organism by expanding the genome into its network.
    ///
    /// # Errors
    /// Fails when the genome fails verification.
    pub fn new(genome: Genome, generation: usize) -> Result<Organism, GenomeError> {
        let net = genome.expand(genome.id())?;
        Ok(Organism {
            genome,
            net,
            fitness: 0.0,
            original_fitness: 0.0,
            error: 0.0,
            winner: false,
            is_champion: false,
            eliminate: false,
            expected_offspring: 0.0,
            generation,
            species_id: None,
        })
    }

    /// Returns the organism's genome.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Returns the organism's network.
    pub fn network(&self) -> &Network {
        &self.net
    }

    /// Returns the organism's network for activation.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.net
    }

    /// Returns the organism's fitness.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Sets the organism's fitness.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    /// Returns the organism's raw fitness before fitness sharing.
    pub fn original_fitness(&self) -> f64 {
        self.original_fitness
    }

    /// Sets the organism's raw fitness.
    pub fn set_original_fitness(&mut self, fitness: f64) {
        self.original_fitness = fitness;
    }

    /// Returns the evaluation error reported for the organism.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Sets the evaluation error.
    pub fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    /// Returns whether the organism solved its task.
    pub fn winner(&self) -> bool {
        self.winner
    }

    /// Marks whether the organism solved its task.
    pub fn set_winner(&mut self, winner: bool) {
        self.winner = winner;
    }

    /// Returns whether the organism is its species' champion.
    pub fn is_champion(&self) -> bool {
        self.is_champion
    }

    /// Returns the offspring share allotted to the organism.
    pub fn expected_offspring(&self) -> f64 {
        self.expected_offspring
    }

    /// Returns the generation the organism was born in.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the ID of the species the organism belongs to, once
    /// speciated.
    pub fn species_id(&self) -> Option<usize> {
        self.species_id
    }
}
