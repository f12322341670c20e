//! An implementation of NeuroEvolution of Augmenting Topologies,
//! following the 2002 paper: <http://nn.cs.utexas.edu/keyword?stanley:ec02>
//!
//! Beyond the classic algorithm, genomes carry shared *traits* (parameter
//! bundles referenced by node and connection genes) and *MIMO control genes*:
//! modules whose single control node applies a multi-input multi-output
//! activation atomically, which lets evolved networks contain sub-blocks
//! such as multipliers.
//!
//! The crate is organised around four layers:
//! - [`genomics`]: the evolvable genotype — traits, node genes, connection
//!   genes, control genes — with mutation, crossover, compatibility and
//!   innovation-number bookkeeping.
//! - [`networks`]: the phenotype — a flat-arena network activator handling
//!   feedforward, recurrent and modular graphs.
//! - [`populations`]: organisms, species, reproduction and the generational
//!   loop, with sequential and parallel epoch executors.
//! - [`config`]: recognised options and the execution context threaded
//!   through evaluation and epoch execution.
//!
//! # Example usage: one evolutionary step
//! ```
//! use evoneat::config::{Context, NeatOptions};
//! use evoneat::populations::{epoch_executor_for, Population};
//!
//! let mut options = NeatOptions::default();
//! options.population_size = 20;
//! options.num_inputs = 3;
//! options.num_outputs = 1;
//! options.rng_seed = Some(42);
//!
//! let ctx = Context::new(options);
//! let mut population = Population::new_random(&ctx).unwrap();
//!
//! // An evaluator would assign fitness here; organisms default to zero
//! // fitness, which is clamped during fitness sharing.
//! let executor = epoch_executor_for(&ctx.options).unwrap();
//! executor.next_epoch(&ctx, &mut population).unwrap();
//! assert_eq!(population.organisms().len(), 20);
//! ```

pub mod activations;
pub mod config;
pub mod genomics;
pub mod networks;
pub mod populations;

/// Identifier type for historical markings: every structural
/// addition to a genome is stamped with a monotonically
/// increasing innovation number, allowing gene alignment
/// across genomes during crossover and compatibility checks.
pub type Innovation = usize;

/// Identifier type for genome nodes. Node IDs are globally
/// unique within a genome and preserved across duplication.
pub type NodeId = usize;
