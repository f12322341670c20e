//! Species are clusters of reproductively compatible (within the
//! compatibility threshold) organisms. Membership is determined by
//! distance to a representative genome; fitness sharing, offspring
//! quotas and reproduction all happen per species.

use crate::config::{Context, NeatOptions};
use crate::genomics::{Genome, InnovationLedger};
use crate::populations::errors::PopulationError;
use crate::populations::organism::Organism;

use rand::prelude::{IteratorRandom, Rng, SliceRandom};

use std::cmp::Ordering;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// Generations past the dropoff age a species may stagnate before it
/// is marked for obliteration.
pub(crate) const STAGNATION_MARGIN: usize = 5;

/// A cluster of compatible organisms. Holds indices into the
/// population's organism arena, plus a representative genome clone
/// used for compatibility tests during re-speciation.
#[derive(Debug)]
pub struct Species {
    pub(crate) id: usize,
    pub(crate) members: Vec<usize>,
    pub(crate) representative: Genome,
    pub(crate) age: usize,
    pub(crate) age_of_last_improvement: usize,
    pub(crate) max_fitness_ever: f64,
    pub(crate) expected_offspring: usize,
    pub(crate) is_novel: bool,
    pub(crate) obliterate: bool,
}

impl Species {
    pub(crate) fn new(id: usize, representative: Genome) -> Species {
        Species {
            id,
            members: Vec::new(),
            representative,
            age: 1,
            age_of_last_improvement: 1,
            max_fitness_ever: 0.0,
            expected_offspring: 0,
            is_novel: true,
            obliterate: false,
        }
    }

    /// Returns the species' ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the indices of the species' members in the
    /// population's organism list, best first after fitness
    /// adjustment.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Returns the species' age in generations.
    pub fn age(&self) -> usize {
        self.age
    }

    /// Returns the species' offspring quota for the next generation.
    pub fn expected_offspring(&self) -> usize {
        self.expected_offspring
    }

    /// Returns the highest raw fitness the species ever reached.
    pub fn max_fitness_ever(&self) -> f64 {
        self.max_fitness_ever
    }

    /// Returns whether the species was created this generation.
    pub fn is_novel(&self) -> bool {
        self.is_novel
    }

    pub(crate) fn add_organism(&mut self, index: usize) {
        self.members.push(index);
    }

    pub(crate) fn remove_organism(&mut self, index: usize) {
        self.members.retain(|&member| member != index);
    }

    /// Applies fitness sharing: every member's fitness is divided by
    /// the species size, after a 0.01 stagnation penalty when the
    /// species is past its dropoff age and a youth boost while aged
    /// ten or less. Members are then ranked, the champion flagged,
    /// and everything below the survival cutoff marked for culling.
    pub(crate) fn adjust_fitness(&mut self, organisms: &mut [Organism], options: &NeatOptions) {
        let stagnated =
            self.age.saturating_sub(self.age_of_last_improvement) + 1 > options.dropoff_age;
        let size = self.members.len().max(1);
        for &index in &self.members {
            let organism = &mut organisms[index];
            organism.original_fitness = organism.fitness;
            if stagnated || self.obliterate {
                organism.fitness *= 0.01;
            }
            if self.age <= 10 {
                organism.fitness *= options.age_significance;
            }
            if organism.fitness <= 0.0 {
                organism.fitness = 0.0001;
            }
            organism.fitness /= size as f64;
        }

        self.members.sort_by(|&a, &b| {
            organisms[b]
                .fitness
                .partial_cmp(&organisms[a].fitness)
                .unwrap_or(Ordering::Equal)
        });

        if let Some(&best) = self.members.first() {
            if organisms[best].original_fitness > self.max_fitness_ever {
                self.max_fitness_ever = organisms[best].original_fitness;
                self.age_of_last_improvement = self.age;
            }
        }

        let survivors =
            (options.survival_thresh * self.members.len() as f64).floor() as usize + 1;
        for (rank, &index) in self.members.iter().enumerate() {
            organisms[index].is_champion = rank == 0;
            organisms[index].eliminate = rank >= survivors;
        }
    }

    /// Returns the best member's raw fitness.
    pub(crate) fn best_fitness(&self, organisms: &[Organism]) -> f64 {
        self.members
            .first()
            .map(|&index| organisms[index].original_fitness)
            .unwrap_or(0.0)
    }

    /// Computes the species' offspring count from its members'
    /// fractional shares. Fractions are accumulated into `skim`,
    /// which carries across species so the population total comes out
    /// whole.
    pub(crate) fn count_offspring(
        &self,
        organisms: &[Organism],
        mut skim: f64,
    ) -> (usize, f64) {
        let mut expected = 0usize;
        for &index in &self.members {
            let share = organisms[index].expected_offspring;
            expected += share.floor() as usize;
            skim += share.fract();
            if skim >= 1.0 {
                let whole = skim.floor();
                expected += whole as usize;
                skim -= whole;
            }
        }
        (expected, skim)
    }

    /// Ages the species one generation and flags it for obliteration
    /// once its stagnation exceeds the dropoff age plus the margin.
    pub(crate) fn age_one_generation(&mut self, options: &NeatOptions) {
        self.age += 1;
        self.is_novel = false;
        if self.age.saturating_sub(self.age_of_last_improvement)
            > options.dropoff_age + STAGNATION_MARGIN
        {
            self.obliterate = true;
        }
    }

    /// Produces the species' allotted offspring. Per slot, the species
    /// either clones its champion (once, when the quota is at least
    /// five), mutates a clone of a random surviving parent, or mates
    /// two parents — the second sampled inside the species or, rarely,
    /// as another species' champion — with a crossover variant chosen
    /// by the configured probabilities and an optional mutation on
    /// top.
    ///
    /// # Errors
    /// Fails with [`PopulationError::EmptySpecies`] when offspring are
    /// owed but no members remain, and propagates child verification
    /// failures.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reproduce<R: Rng>(
        &self,
        ctx: &Context,
        generation: usize,
        organisms: &[Organism],
        all_species: &[Species],
        ledger: &InnovationLedger,
        next_genome_id: &AtomicUsize,
        rng: &mut R,
    ) -> Result<Vec<Organism>, Box<dyn Error + Send + Sync>> {
        let options = &ctx.options;
        if self.expected_offspring > 0 && self.members.is_empty() {
            return Err(Box::new(PopulationError::EmptySpecies(self.id)));
        }
        if self.expected_offspring == 0 {
            return Ok(Vec::new());
        }

        let champion = self.members[0];
        let mut champion_cloned = false;
        let mut babies = Vec::with_capacity(self.expected_offspring);

        for _ in 0..self.expected_offspring {
            let child_id = next_genome_id.fetch_add(1, AtomicOrdering::SeqCst);

            let child_genome = if !champion_cloned && self.expected_offspring >= 5 {
                champion_cloned = true;
                organisms[champion].genome.duplicate(child_id)
            } else if self.members.len() == 1 || rng.gen::<f64>() < options.mutate_only_prob {
                let &mom = self.members.choose(rng).unwrap_or(&champion);
                let mut child = organisms[mom].genome.duplicate(child_id);
                child.mutate(rng, ledger, options)?;
                child
            } else {
                let &mom = self.members.choose(rng).unwrap_or(&champion);
                let dad = self.choose_second_parent(all_species, options, rng, champion);
                let (mom_org, dad_org) = (&organisms[mom], &organisms[dad]);

                let roll = rng.gen::<f64>();
                let mut child = if roll < options.mate_multipoint_prob {
                    mom_org.genome.mate_multipoint(
                        &dad_org.genome,
                        child_id,
                        mom_org.fitness,
                        dad_org.fitness,
                        rng,
                        options,
                    )?
                } else if roll < options.mate_multipoint_prob + options.mate_multipoint_avg_prob {
                    mom_org.genome.mate_multipoint_avg(
                        &dad_org.genome,
                        child_id,
                        mom_org.fitness,
                        dad_org.fitness,
                        rng,
                        options,
                    )?
                } else {
                    mom_org.genome.mate_singlepoint(&dad_org.genome, child_id, rng)?
                };

                if mom == dad || rng.gen::<f64>() > options.mate_only_prob {
                    child.mutate(rng, ledger, options)?;
                }
                child
            };

            babies.push(Organism::new(child_genome, generation)?);
        }
        Ok(babies)
    }

    /// Samples the second parent: a member of this species, or with
    /// the interspecies mating rate another species' champion.
    fn choose_second_parent<R: Rng>(
        &self,
        all_species: &[Species],
        options: &NeatOptions,
        rng: &mut R,
        fallback: usize,
    ) -> usize {
        if all_species.len() > 1 && rng.gen::<f64>() < options.interspecies_mate_rate {
            let other = all_species
                .iter()
                .filter(|s| s.id != self.id && !s.members.is_empty())
                .choose(rng);
            if let Some(species) = other {
                return species.members[0];
            }
        }
        *self.members.choose(rng).unwrap_or(&fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::ActivationKind;
    use crate::genomics::{ConnectionGene, NodeGene, NodeKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn minimal_genome(id: usize) -> Genome {
        let nodes = vec![
            NodeGene::new(1, NodeKind::Sensor, ActivationKind::Null),
            NodeGene::new(2, NodeKind::Bias, ActivationKind::Null),
            NodeGene::new(3, NodeKind::Output, ActivationKind::SigmoidSteepened),
        ];
        let genes = vec![
            ConnectionGene::new(1, 1, 3, 1.0, false),
            ConnectionGene::new(2, 2, 3, 0.5, false),
        ];
        Genome::new(id, Vec::new(), nodes, genes)
    }

    fn organisms_with_fitness(fitness: &[f64]) -> Vec<Organism> {
        fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let mut organism = Organism::new(minimal_genome(i + 1), 1).unwrap();
                organism.fitness = f;
                organism
            })
            .collect()
    }

    #[test]
    fn adjust_fitness_shares_and_ranks() {
        let mut organisms = organisms_with_fitness(&[2.0, 8.0, 4.0]);
        let mut species = Species::new(1, organisms[0].genome.clone());
        species.members = vec![0, 1, 2];

        let options = NeatOptions {
            survival_thresh: 0.34,
            age_significance: 1.0,
            dropoff_age: 15,
            ..NeatOptions::default()
        };
        species.adjust_fitness(&mut organisms, &options);

        // Shared fitness is raw fitness over species size, best first.
        assert_eq!(species.members, vec![1, 2, 0]);
        assert_eq!(organisms[1].fitness, 8.0 / 3.0);
        assert_eq!(organisms[1].original_fitness, 8.0);
        assert!(organisms[1].is_champion);
        // floor(0.34 * 3) + 1 = 2 survivors.
        assert!(!organisms[1].eliminate);
        assert!(!organisms[2].eliminate);
        assert!(organisms[0].eliminate);
        assert_eq!(species.max_fitness_ever, 8.0);
    }

    #[test]
    fn adjust_fitness_penalises_stagnation() {
        let mut organisms = organisms_with_fitness(&[2.0, 8.0]);
        let mut species = Species::new(1, organisms[0].genome.clone());
        species.members = vec![0, 1];
        species.age = 40;
        species.age_of_last_improvement = 1;

        let options = NeatOptions {
            dropoff_age: 15,
            age_significance: 1.0,
            ..NeatOptions::default()
        };
        species.adjust_fitness(&mut organisms, &options);
        assert_eq!(organisms[1].fitness, 8.0 * 0.01 / 2.0);
    }

    #[test]
    fn count_offspring_carries_skim() {
        let mut organisms = organisms_with_fitness(&[0.0; 3]);
        for organism in &mut organisms {
            organism.expected_offspring = 1.5;
        }
        let mut species = Species::new(1, organisms[0].genome.clone());
        species.members = vec![0, 1, 2];

        let (expected, skim) = species.count_offspring(&organisms, 0.0);
        assert_eq!(expected, 4);
        assert!((skim - 0.5).abs() < 1e-9);

        let (expected, skim) = species.count_offspring(&organisms, skim);
        assert_eq!(expected, 5);
        assert!(skim.abs() < 1e-9);
    }

    #[test]
    fn reproduce_empty_species_fails() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut species = Species::new(7, minimal_genome(1));
        species.expected_offspring = 3;
        let ctx = Context::new(NeatOptions::default());
        let next_id = AtomicUsize::new(10);
        let err = species
            .reproduce(&ctx, 2, &[], &[], &InnovationLedger::new(3, 4), &next_id, &mut rng)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PopulationError>(),
            Some(&PopulationError::EmptySpecies(7))
        );
    }

    #[test]
    fn reproduce_fills_quota() {
        let mut rng = StdRng::seed_from_u64(42);
        let organisms = organisms_with_fitness(&[3.0, 2.0, 1.0]);
        let mut species = Species::new(1, organisms[0].genome.clone());
        species.members = vec![0, 1, 2];
        species.expected_offspring = 6;

        let ctx = Context::new(NeatOptions::default());
        let ledger = InnovationLedger::new(3, 4);
        let next_id = AtomicUsize::new(10);
        let babies = species
            .reproduce(&ctx, 2, &organisms, &[], &ledger, &next_id, &mut rng)
            .unwrap();
        assert_eq!(babies.len(), 6);
        for baby in &babies {
            assert_eq!(baby.generation(), 2);
            baby.genome().verify().unwrap();
        }
        // The champion clone is present unchanged.
        assert!(babies
            .iter()
            .any(|b| b.genome().genes() == organisms[0].genome().genes()));
    }

    #[test]
    fn aging_flags_obliteration() {
        let mut species = Species::new(1, minimal_genome(1));
        species.age = 21;
        species.age_of_last_improvement = 1;
        let options = NeatOptions {
            dropoff_age: 15,
            ..NeatOptions::default()
        };
        species.age_one_generation(&options);
        assert_eq!(species.age, 22);
        assert!(species.obliterate);
    }
}
