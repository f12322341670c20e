//! A population is a collection of organisms grouped into species,
//! advanced generation by generation: evaluate (externally), adjust
//! fitness, allot offspring, reproduce, re-speciate.

mod epoch;
mod errors;
mod log;
mod organism;
mod species;

pub use epoch::{
    epoch_executor_by_name, epoch_executor_for, EpochExecutor, EpochOutcome,
    ParallelEpochExecutor, SequentialEpochExecutor,
};
pub use errors::PopulationError;
pub use log::{Generation, GenerationEvaluator, Stats};
pub use organism::Organism;
pub use species::Species;
use species::STAGNATION_MARGIN;

use crate::config::{Context, NeatOptions};
use crate::genomics::{Genome, InnovationLedger, WeightMutator};

use rand::rngs::StdRng;
use rand::SeedableRng;

use std::cmp::Ordering;
use std::error::Error;
use std::sync::atomic::AtomicUsize;

/// Derives the RNG a species' reproduction task owns, from the master
/// seed, the generation and the species ID. This keeps parallel runs
/// reproducible per species and generation.
pub(crate) fn species_rng(master: u64, generation: usize, species_id: usize) -> StdRng {
    let mix = master
        ^ (generation as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (species_id as u64).wrapping_mul(0xD2B7_4407_B1CE_6E93);
    StdRng::seed_from_u64(mix)
}

/// A population of organisms partitioned into species.
///
/// The population owns the organism arena; species refer to organisms
/// by index. It also owns the innovation ledger through which all
/// structural mutations of a generation are numbered.
#[derive(Debug)]
pub struct Population {
    organisms: Vec<Organism>,
    pub(crate) species: Vec<Species>,
    pub(crate) ledger: InnovationLedger,
    pub(crate) next_genome_id: AtomicUsize,
    next_species_id: usize,
    generation: usize,
    highest_fitness: f64,
    epochs_since_improvement: usize,
    master_seed: u64,
    final_flag: bool,
}

impl Population {
    /// Spawns a population from a seed genome: every organism is a
    /// clone with randomized connection weights and a perturbed trait,
    /// expanded into its network and assigned to a species.
    ///
    /// # Errors
    /// Fails when a spawned genome fails verification.
    pub fn spawn(seed: &Genome, ctx: &Context) -> Result<Population, Box<dyn Error + Send + Sync>> {
        let options = &ctx.options;
        let master_seed = options.rng_seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(master_seed);

        let mut organisms = Vec::with_capacity(options.population_size);
        for i in 0..options.population_size {
            let mut genome = seed.duplicate(i + 1);
            genome.mutate_link_weights(&mut rng, 1.0, 1.0, WeightMutator::ColdGaussian);
            genome.mutate_random_trait(&mut rng, options);
            organisms.push(Organism::new(genome, 1)?);
        }

        let mut population = Population {
            organisms,
            species: Vec::new(),
            ledger: InnovationLedger::new(seed.last_innovation() + 1, seed.last_node_id() + 1),
            next_genome_id: AtomicUsize::new(options.population_size + 1),
            next_species_id: 1,
            generation: 1,
            highest_fitness: 0.0,
            epochs_since_improvement: 0,
            master_seed,
            final_flag: false,
        };
        for index in 0..population.organisms.len() {
            population.speciate_organism(index, options);
        }
        Ok(population)
    }

    /// Spawns a population from a randomly connected seed genome with
    /// the configured input, output and hidden node counts.
    ///
    /// # Errors
    /// Fails when a spawned genome fails verification.
    pub fn new_random(ctx: &Context) -> Result<Population, Box<dyn Error + Send + Sync>> {
        let options = &ctx.options;
        let master_seed = options.rng_seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(master_seed.wrapping_add(0x5851_F42D_4C95_7F2D));
        let seed = Genome::new_random(
            1,
            options.num_inputs.max(1),
            options.num_outputs.max(1),
            options.num_hidden,
            0.5,
            &mut rng,
        );
        Population::spawn(&seed, ctx)
    }

    /// Returns the organisms of the current generation.
    pub fn organisms(&self) -> &[Organism] {
        &self.organisms
    }

    /// Returns the organisms mutably, for evaluation.
    pub fn organisms_mut(&mut self) -> &mut [Organism] {
        &mut self.organisms
    }

    /// Returns the species of the current generation.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Returns the population's innovation ledger.
    pub fn ledger(&self) -> &InnovationLedger {
        &self.ledger
    }

    /// Returns the current generation number, starting at 1.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the highest raw fitness seen so far.
    pub fn highest_fitness(&self) -> f64 {
        self.highest_fitness
    }

    /// Returns the currently best-performing organism.
    pub fn champion(&self) -> Option<&Organism> {
        self.organisms.iter().max_by(|a, b| {
            a.fitness()
                .partial_cmp(&b.fitness())
                .unwrap_or(Ordering::Equal)
        })
    }

    /// Returns whether the evolutionary run was marked finished.
    pub fn is_final(&self) -> bool {
        self.final_flag
    }

    /// Marks the evolutionary run as finished, e.g. once a winner has
    /// been found.
    pub fn set_final(&mut self, done: bool) {
        self.final_flag = done;
    }

    pub(crate) fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Assigns the organism to the first species whose representative
    /// is within the compatibility threshold, or founds a new species
    /// around it.
    fn speciate_organism(&mut self, index: usize, options: &NeatOptions) {
        let mut target: Option<usize> = None;
        {
            let genome = &self.organisms[index].genome;
            for (position, species) in self.species.iter().enumerate() {
                if genome.compatibility(&species.representative, options)
                    < options.compat_threshold
                {
                    target = Some(position);
                    break;
                }
            }
        }
        match target {
            Some(position) => {
                self.species[position].add_organism(index);
                self.organisms[index].species_id = Some(self.species[position].id);
            }
            None => {
                let id = self.next_species_id;
                self.next_species_id += 1;
                let mut species = Species::new(id, self.organisms[index].genome.clone());
                species.add_organism(index);
                self.organisms[index].species_id = Some(id);
                self.species.push(species);
            }
        }
    }

    /// Adjusts fitness, allots offspring quotas reconciled to the
    /// population size, reacts to prolonged global stagnation with
    /// delta coding, redistributes stolen babies, and culls the
    /// organisms below their species' survival cutoffs.
    pub(crate) fn prepare_reproduction(&mut self, options: &NeatOptions) {
        let max_fitness = self
            .organisms
            .iter()
            .map(Organism::fitness)
            .fold(0.0_f64, f64::max);
        if max_fitness > self.highest_fitness {
            self.highest_fitness = max_fitness;
            self.epochs_since_improvement = 0;
        } else {
            self.epochs_since_improvement += 1;
        }

        {
            let Population {
                species, organisms, ..
            } = self;
            for s in species.iter_mut() {
                s.adjust_fitness(organisms, options);
            }

            let total: f64 = organisms.iter().map(Organism::fitness).sum();
            let average = total / organisms.len().max(1) as f64;
            for organism in organisms.iter_mut() {
                organism.expected_offspring = if average > 0.0 {
                    organism.fitness / average
                } else {
                    0.0
                };
            }

            let mut skim = 0.0;
            let mut total_expected = 0usize;
            for s in species.iter_mut() {
                let (count, carried) = s.count_offspring(organisms, skim);
                s.expected_offspring = count;
                skim = carried;
                total_expected += count;
            }
            if total_expected < options.population_size {
                if let Some(best) = Self::best_species_position(species, organisms) {
                    species[best].expected_offspring +=
                        options.population_size - total_expected;
                }
            }
        }

        if self.epochs_since_improvement > options.dropoff_age + STAGNATION_MARGIN {
            self.delta_coding(options);
        } else if options.babies_stolen > 0 {
            self.steal_babies(options);
        }

        self.cull();
    }

    fn best_species_position(species: &[Species], organisms: &[Organism]) -> Option<usize> {
        (0..species.len()).max_by(|&a, &b| {
            species[a]
                .best_fitness(organisms)
                .partial_cmp(&species[b].best_fitness(organisms))
                .unwrap_or(Ordering::Equal)
        })
    }

    /// Population-wide restart after prolonged stagnation: the two
    /// best species split the whole offspring budget between them and
    /// get their stagnation clocks reset; everyone else gets nothing.
    fn delta_coding(&mut self, options: &NeatOptions) {
        {
            let Population {
                species, organisms, ..
            } = self;
            let mut order: Vec<usize> = (0..species.len()).collect();
            order.sort_by(|&a, &b| {
                species[b]
                    .best_fitness(organisms)
                    .partial_cmp(&species[a].best_fitness(organisms))
                    .unwrap_or(Ordering::Equal)
            });
            for &position in &order {
                species[position].expected_offspring = 0;
            }
            let half = options.population_size / 2;
            if let Some(&best) = order.first() {
                species[best].expected_offspring = if order.len() > 1 {
                    half
                } else {
                    options.population_size
                };
                species[best].age_of_last_improvement = species[best].age;
            }
            if order.len() > 1 {
                let second = order[1];
                species[second].expected_offspring = options.population_size - half;
                species[second].age_of_last_improvement = species[second].age;
            }
        }
        self.epochs_since_improvement = 0;
    }

    /// Takes up to `babies_stolen` quota units from the weakest
    /// species (never below one each) and grants them to the three
    /// leading species' champions in 2:2:1 proportion, remainder to
    /// the best.
    fn steal_babies(&mut self, options: &NeatOptions) {
        let Population {
            species, organisms, ..
        } = self;
        if species.len() < 2 {
            return;
        }
        let mut order: Vec<usize> = (0..species.len()).collect();
        order.sort_by(|&a, &b| {
            species[a]
                .best_fitness(organisms)
                .partial_cmp(&species[b].best_fitness(organisms))
                .unwrap_or(Ordering::Equal)
        });

        let mut stolen = 0usize;
        for &position in &order {
            if stolen >= options.babies_stolen {
                break;
            }
            let available = species[position].expected_offspring.saturating_sub(1);
            let take = available.min(options.babies_stolen - stolen);
            species[position].expected_offspring -= take;
            stolen += take;
        }

        let leaders: Vec<usize> = order.iter().rev().copied().collect();
        let shares = [stolen * 2 / 5, stolen * 2 / 5, stolen / 5];
        let mut granted = 0;
        for (rank, &position) in leaders.iter().take(3).enumerate() {
            species[position].expected_offspring += shares[rank];
            granted += shares[rank];
        }
        if let Some(&best) = leaders.first() {
            species[best].expected_offspring += stolen - granted;
        }
    }

    /// Removes the organisms marked for elimination, remapping every
    /// species' member indices into the compacted arena.
    fn cull(&mut self) {
        let mut remap = vec![usize::MAX; self.organisms.len()];
        let mut kept: Vec<Organism> = Vec::with_capacity(self.organisms.len());
        for (index, organism) in self.organisms.drain(..).enumerate() {
            if !organism.eliminate {
                remap[index] = kept.len();
                kept.push(organism);
            }
        }
        self.organisms = kept;
        for species in &mut self.species {
            species.members = species
                .members
                .iter()
                .filter_map(|&member| {
                    let mapped = remap[member];
                    (mapped != usize::MAX).then_some(mapped)
                })
                .collect();
        }
    }

    /// Installs the new generation: the offspring replace the old
    /// organism list, species age and are re-filled by re-speciation
    /// against their retained representatives, extinct species are
    /// removed, representatives refresh, and the innovation ledger is
    /// cleared for the next generation.
    pub(crate) fn conclude_generation(&mut self, babies: Vec<Organism>, options: &NeatOptions) {
        self.organisms = babies;
        for species in &mut self.species {
            species.members.clear();
            species.expected_offspring = 0;
            species.age_one_generation(options);
        }
        for index in 0..self.organisms.len() {
            self.speciate_organism(index, options);
        }
        self.species.retain(|s| !s.members.is_empty());
        {
            let Population {
                species, organisms, ..
            } = self;
            for s in species.iter_mut() {
                s.representative = organisms[s.members[0]].genome.clone();
            }
        }
        self.ledger.clear();
        self.generation += 1;
    }
}
