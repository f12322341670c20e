//! Epoch executors drive one generation each: evaluate (done by the
//! caller), reproduce, age, purge. The sequential executor is fully
//! deterministic under a fixed RNG seed; the parallel one reproduces
//! distinct species concurrently, with the innovation ledger as the
//! only shared mutable state.

use crate::config::{Context, EpochExecutorType, NeatOptions};
use crate::populations::errors::PopulationError;
use crate::populations::organism::Organism;
use crate::populations::{species_rng, Population};

use rayon::prelude::*;

use std::error::Error;

/// How an epoch ended. Cancellation is a distinguished non-error
/// status: the generation in progress is finalised before returning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpochOutcome {
    /// The generation completed normally.
    Completed,
    /// Cancellation was requested; the population is still consistent.
    Cancelled,
}

/// The contract every epoch executor implements: advance the
/// population by one generation.
pub trait EpochExecutor: Send + Sync + std::fmt::Debug {
    /// Runs one epoch: fitness adjustment, offspring allotment,
    /// reproduction, re-speciation and the generation rollover.
    fn next_epoch(
        &self,
        ctx: &Context,
        population: &mut Population,
    ) -> Result<EpochOutcome, Box<dyn Error + Send + Sync>>;
}

/// Returns the executor selected by the options.
pub fn epoch_executor_for(
    options: &NeatOptions,
) -> Result<Box<dyn EpochExecutor>, PopulationError> {
    match options.epoch_executor_type {
        EpochExecutorType::Sequential => Ok(Box::new(SequentialEpochExecutor)),
        EpochExecutorType::Parallel => Ok(Box::new(ParallelEpochExecutor)),
    }
}

/// Returns the executor with the given name, `sequential` or
/// `parallel`.
///
/// # Errors
/// Fails with [`PopulationError::UnsupportedEpochExecutor`] for any
/// other name.
pub fn epoch_executor_by_name(
    name: &str,
) -> Result<Box<dyn EpochExecutor>, PopulationError> {
    match name {
        "sequential" => Ok(Box::new(SequentialEpochExecutor)),
        "parallel" => Ok(Box::new(ParallelEpochExecutor)),
        other => Err(PopulationError::UnsupportedEpochExecutor(other.to_string())),
    }
}

/// Straightforward single-threaded epoch executor.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialEpochExecutor;

impl EpochExecutor for SequentialEpochExecutor {
    fn next_epoch(
        &self,
        ctx: &Context,
        population: &mut Population,
    ) -> Result<EpochOutcome, Box<dyn Error + Send + Sync>> {
        if ctx.is_cancelled() {
            return Ok(EpochOutcome::Cancelled);
        }
        population.prepare_reproduction(&ctx.options);

        let generation = population.generation();
        let seed = population.master_seed();
        let mut cancelled = false;
        let mut babies: Vec<Organism> = Vec::with_capacity(ctx.options.population_size);
        for index in 0..population.species.len() {
            // A cancellation request seen here still finalises the
            // generation, so the population stays complete.
            cancelled = cancelled || ctx.is_cancelled();
            let species = &population.species[index];
            let mut rng = species_rng(seed, generation, species.id());
            babies.extend(species.reproduce(
                ctx,
                generation + 1,
                &population.organisms,
                &population.species,
                &population.ledger,
                &population.next_genome_id,
                &mut rng,
            )?);
        }

        population.conclude_generation(babies, &ctx.options);
        Ok(if cancelled || ctx.is_cancelled() {
            EpochOutcome::Cancelled
        } else {
            EpochOutcome::Completed
        })
    }
}

/// Epoch executor that reproduces distinct species concurrently, one
/// task per species. Tasks share only the innovation ledger, whose
/// lookup-or-append critical section keeps structurally equivalent
/// mutations on the same innovation numbers across tasks. Each task
/// owns an RNG derived from the master seed, the generation and the
/// species ID, keeping runs reproducible per species and generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelEpochExecutor;

impl EpochExecutor for ParallelEpochExecutor {
    fn next_epoch(
        &self,
        ctx: &Context,
        population: &mut Population,
    ) -> Result<EpochOutcome, Box<dyn Error + Send + Sync>> {
        if ctx.is_cancelled() {
            return Ok(EpochOutcome::Cancelled);
        }
        population.prepare_reproduction(&ctx.options);

        let generation = population.generation();
        let seed = population.master_seed();
        let broods: Vec<Result<Vec<Organism>, Box<dyn Error + Send + Sync>>> = {
            let organisms = &population.organisms;
            let species = &population.species;
            let ledger = &population.ledger;
            let next_genome_id = &population.next_genome_id;
            species
                .par_iter()
                .map(|s| {
                    let mut rng = species_rng(seed, generation, s.id());
                    s.reproduce(
                        ctx,
                        generation + 1,
                        organisms,
                        species,
                        ledger,
                        next_genome_id,
                        &mut rng,
                    )
                })
                .collect()
        };

        let mut babies: Vec<Organism> = Vec::with_capacity(ctx.options.population_size);
        for brood in broods {
            babies.extend(brood?);
        }

        population.conclude_generation(babies, &ctx.options);
        Ok(if ctx.is_cancelled() {
            EpochOutcome::Cancelled
        } else {
            EpochOutcome::Completed
        })
    }
}
