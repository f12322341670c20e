//! Recognised configuration options and the execution context
//! threaded through evaluation and epoch execution.
//!
//! Options load from RON files; a partial file is completed with the
//! defaults. Configuration errors are fatal.

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Selects the genome compatibility computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompatMethod {
    /// Full walk over both connection-gene lists.
    Linear,
    /// Same walk, short-circuiting once the disjoint and excess terms
    /// alone exceed the compatibility threshold.
    Fast,
}

/// Selects the epoch executor implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochExecutorType {
    /// Single-threaded, fully deterministic under a fixed RNG seed.
    Sequential,
    /// One task per species; the innovation ledger is the only shared
    /// mutable state.
    Parallel,
}

/// Tie-breaking policy for disjoint and excess genes during multipoint
/// crossover when the parents are exactly equally fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TieBreak {
    /// Inherit each non-matching gene from a parent chosen by coin flip.
    CoinFlip,
    /// Admit non-matching genes from both parents.
    TakeBoth,
}

/// Configuration data for genome operations, reproduction and
/// the generational loop.
///
/// # Note
/// All quantities expressing probabilities should be in the range
/// [0.0, 1.0]. Using values that are not in this bound may result
/// in odd behaviours and/or incorrect programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatOptions {
    /// Number of organisms kept in the population.
    pub population_size: usize,
    /// Number of generations to evolve in one trial.
    pub num_generations: usize,
    /// Number of independent trials in an experiment.
    pub num_runs: usize,

    /// Weight of disjoint genes in compatibility.
    pub disjoint_coeff: f64,
    /// Weight of excess genes in compatibility.
    pub excess_coeff: f64,
    /// Weight of the average mutation-number difference over
    /// matching genes in compatibility.
    pub mutdiff_coeff: f64,
    /// Compatibility radius within which two genomes share a species.
    pub compat_threshold: f64,
    /// Compatibility computation variant.
    pub gen_compat_method: CompatMethod,

    /// Chance that offspring is produced by mutation alone.
    pub mutate_only_prob: f64,
    /// Chance of perturbing connection weights.
    pub mutate_link_weights_prob: f64,
    /// Chance of an add-link structural mutation.
    pub mutate_add_link_prob: f64,
    /// Chance of an add-node structural mutation.
    pub mutate_add_node_prob: f64,
    /// Chance of connecting dangling sensors to the network.
    pub mutate_connect_sensors: f64,
    /// Chance of toggling a connection's enabled flag.
    pub mutate_toggle_enable_prob: f64,
    /// Chance of re-enabling the first disabled connection.
    pub mutate_gene_reenable_prob: f64,
    /// Chance of perturbing a random trait's parameters.
    pub mutate_random_trait_prob: f64,
    /// Chance of reassigning a random connection's trait.
    pub mutate_link_trait_prob: f64,
    /// Chance of reassigning a random node's trait.
    pub mutate_node_trait_prob: f64,
    /// Magnitude of connection weight perturbations.
    pub weight_mut_power: f64,
    /// Magnitude of trait parameter perturbations.
    pub trait_mutation_power: f64,
    /// Per-parameter chance of perturbation during trait mutation.
    pub trait_param_mut_prob: f64,
    /// Chance that add-link searches for a recurrent connection.
    pub recur_only_prob: f64,
    /// Attempts before an add-link mutation gives up.
    pub new_link_tries: usize,

    /// Chance that a mated child is not additionally mutated.
    pub mate_only_prob: f64,
    /// Chance of multipoint crossover.
    pub mate_multipoint_prob: f64,
    /// Chance of multipoint-average crossover.
    pub mate_multipoint_avg_prob: f64,
    /// Chance of single-point crossover.
    pub mate_singlepoint_prob: f64,
    /// Chance that the second parent comes from another species.
    pub interspecies_mate_rate: f64,
    /// Top fraction of each species eligible to breed.
    pub survival_thresh: f64,
    /// Tie-breaking policy for equally fit parents in multipoint
    /// crossover.
    pub mate_tie_break: TieBreak,

    /// Generations without improvement before a species is penalised.
    pub dropoff_age: usize,
    /// Fitness boost applied to species younger than ten generations.
    pub age_significance: f64,
    /// Offspring quota redistributed to leading species' champions.
    pub babies_stolen: usize,

    /// Number of input (sensor) nodes in spawned genomes.
    pub num_inputs: usize,
    /// Number of output nodes in spawned genomes.
    pub num_outputs: usize,
    /// Number of hidden nodes in spawned genomes.
    pub num_hidden: usize,
    /// Hidden-node share of a genome beyond which add-node
    /// mutations are suppressed. Zero disables the limit.
    pub max_hidden_percentage: f64,

    /// Epoch executor implementation.
    pub epoch_executor_type: EpochExecutorType,
    /// Master RNG seed. `None` seeds from entropy; a fixed value makes
    /// the sequential executor fully deterministic and parallel runs
    /// reproducible per species and generation.
    pub rng_seed: Option<u64>,
}

impl Default for NeatOptions {
    fn default() -> NeatOptions {
        NeatOptions {
            population_size: 100,
            num_generations: 100,
            num_runs: 1,
            disjoint_coeff: 1.0,
            excess_coeff: 1.0,
            mutdiff_coeff: 0.4,
            compat_threshold: 3.0,
            gen_compat_method: CompatMethod::Linear,
            mutate_only_prob: 0.25,
            mutate_link_weights_prob: 0.9,
            mutate_add_link_prob: 0.05,
            mutate_add_node_prob: 0.03,
            mutate_connect_sensors: 0.0,
            mutate_toggle_enable_prob: 0.0,
            mutate_gene_reenable_prob: 0.0,
            mutate_random_trait_prob: 0.1,
            mutate_link_trait_prob: 0.1,
            mutate_node_trait_prob: 0.1,
            weight_mut_power: 2.5,
            trait_mutation_power: 1.0,
            trait_param_mut_prob: 0.5,
            recur_only_prob: 0.0,
            new_link_tries: 20,
            mate_only_prob: 0.2,
            mate_multipoint_prob: 0.6,
            mate_multipoint_avg_prob: 0.4,
            mate_singlepoint_prob: 0.0,
            interspecies_mate_rate: 0.001,
            survival_thresh: 0.2,
            mate_tie_break: TieBreak::CoinFlip,
            dropoff_age: 15,
            age_significance: 1.0,
            babies_stolen: 0,
            num_inputs: 3,
            num_outputs: 1,
            num_hidden: 0,
            max_hidden_percentage: 0.0,
            epoch_executor_type: EpochExecutorType::Sequential,
            rng_seed: None,
        }
    }
}

impl NeatOptions {
    /// Loads options from a RON file, completing missing fields
    /// with the defaults.
    ///
    /// # Errors
    /// Fails with [`ConfigError::ConfigNotFound`] when the file cannot
    /// be read, and [`ConfigError::Parse`] when its contents are not a
    /// valid options document. Both are fatal to the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<NeatOptions, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|_| ConfigError::ConfigNotFound(path.display().to_string()))?;
        NeatOptions::from_str(&contents)
    }

    /// Parses options from a RON document.
    ///
    /// # Errors
    /// Fails with [`ConfigError::Parse`] on malformed input.
    ///
    /// # Examples
    /// ```
    /// use evoneat::config::NeatOptions;
    ///
    /// let options = NeatOptions::from_str(
    ///     "(population_size: 50, num_inputs: 2, num_outputs: 1)",
    /// ).unwrap();
    /// assert_eq!(options.population_size, 50);
    /// // Unspecified fields fall back to the defaults.
    /// assert_eq!(options.new_link_tries, 20);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<NeatOptions, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// An error type indicating a fatal configuration failure.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    ConfigNotFound(String),
    /// The configuration file contents were malformed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "configuration not found at {}", path)
            }
            ConfigError::Parse(reason) => write!(f, "malformed configuration: {}", reason),
        }
    }
}

impl Error for ConfigError {}

/// A cloneable handle used to request cancellation of a running
/// evolutionary loop. Executors consult it between generations and
/// between species reproductions.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    /// Requests cancellation. The current generation is finalised
    /// before the executor returns.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution context carrying the options and the cancellation handle.
/// Everything else threads through explicit arguments; the only
/// process-wide state admitted by the design is the optional RNG seed
/// inside the options.
#[derive(Clone, Debug)]
pub struct Context {
    /// The recognised options for this run.
    pub options: NeatOptions,
    cancel: CancellationHandle,
}

impl Context {
    /// Creates a context over the given options with a fresh
    /// cancellation handle.
    pub fn new(options: NeatOptions) -> Context {
        Context {
            options,
            cancel: CancellationHandle::default(),
        }
    }

    /// Returns a handle that can cancel work driven by this context.
    ///
    /// # Examples
    /// ```
    /// use evoneat::config::{Context, NeatOptions};
    ///
    /// let ctx = Context::new(NeatOptions::default());
    /// let handle = ctx.cancellation();
    /// assert!(!ctx.is_cancelled());
    /// handle.cancel();
    /// assert!(ctx.is_cancelled());
    /// ```
    pub fn cancellation(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Returns whether cancellation has been requested on this context.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_config_not_found() {
        let err = NeatOptions::load("/definitely/not/here.ron").unwrap_err();
        match err {
            ConfigError::ConfigNotFound(path) => assert!(path.contains("not/here.ron")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn malformed_document_is_parse_error() {
        assert!(matches!(
            NeatOptions::from_str("(population_size: \"many\")"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn partial_document_uses_defaults() {
        let options = NeatOptions::from_str(
            "(epoch_executor_type: Parallel, compat_threshold: 4.0)",
        )
        .unwrap();
        assert_eq!(options.epoch_executor_type, EpochExecutorType::Parallel);
        assert_eq!(options.compat_threshold, 4.0);
        assert_eq!(options.population_size, 100);
    }

    #[test]
    fn cancellation_propagates_through_clones() {
        let ctx = Context::new(NeatOptions::default());
        let handle = ctx.cancellation();
        let ctx2 = ctx.clone();
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(ctx2.is_cancelled());
    }
}
