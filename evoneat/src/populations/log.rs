//! Per-generation records written by evaluators and consumed by
//! experiment harnesses.

use crate::config::Context;
use crate::genomics::Genome;
use crate::populations::Population;

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;

/// Basic statistics over a sequence of samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
    pub median: f64,
}

impl Stats {
    /// Returns statistics about the numbers in a sequence. An empty
    /// sequence yields all zeros.
    ///
    /// # Examples
    /// ```
    /// use evoneat::populations::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5].iter().copied());
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    /// ```
    pub fn from(data: impl Iterator<Item = f64>) -> Stats {
        let mut data: Vec<f64> = data.collect();
        if data.is_empty() {
            return Stats::default();
        }
        data.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };
        Stats {
            maximum: *data.last().unwrap_or(&0.0),
            minimum: *data.first().unwrap_or(&0.0),
            mean: data.iter().sum::<f64>() / data.len() as f64,
            median,
        }
    }
}

/// A record of one evaluated generation: the champion, aggregate
/// statistics, and the winner's complexity when the task was solved.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Generation number within the trial.
    pub id: usize,
    /// Clone of the best organism's genome.
    pub champion: Option<Genome>,
    /// Fitness statistics over the population.
    pub fitness: Stats,
    /// Age statistics over the species.
    pub age: Stats,
    /// Complexity statistics over the population's genomes.
    pub complexity: Stats,
    /// Number of species in the population.
    pub diversity: usize,
    /// Whether some organism solved the task this generation.
    pub solved: bool,
    /// Node count of the first winner's genome.
    pub winner_nodes: usize,
    /// Connection gene count of the first winner's genome.
    pub winner_genes: usize,
    /// Organism evaluations performed up to and including the winner.
    pub winner_evals: usize,
}

impl Generation {
    /// Returns an empty record for the given generation number.
    pub fn new(id: usize) -> Generation {
        Generation {
            id,
            ..Generation::default()
        }
    }

    /// Collects champion and statistics from an evaluated population.
    pub fn fill_from(&mut self, population: &Population) {
        self.champion = population.champion().map(|o| o.genome().clone());
        self.fitness = Stats::from(population.organisms().iter().map(|o| o.fitness()));
        self.age = Stats::from(population.species().iter().map(|s| s.age() as f64));
        self.complexity = Stats::from(
            population
                .organisms()
                .iter()
                .map(|o| o.genome().complexity() as f64),
        );
        self.diversity = population.species().len();
        if let Some((position, winner)) = population
            .organisms()
            .iter()
            .enumerate()
            .find(|(_, o)| o.winner())
        {
            self.solved = true;
            self.winner_nodes = winner.genome().nodes().len();
            self.winner_genes = winner.genome().genes().len();
            self.winner_evals = population.organisms().len() * self.id + position + 1;
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Generation {} [species: {}, best: {:.4}, mean: {:.4}{}]",
            self.id,
            self.diversity,
            self.fitness.maximum,
            self.fitness.mean,
            if self.solved { ", solved" } else { "" },
        )
    }
}

/// The interface an evaluator implements to score one generation.
/// The evaluator writes fitness, raw fitness, error and winner flags
/// onto every organism, and champion plus statistics into the
/// generation record.
pub trait GenerationEvaluator {
    /// Evaluates one generation of the population within the given
    /// execution context.
    fn evaluate_generation(
        &self,
        ctx: &Context,
        population: &mut Population,
        generation: &mut Generation,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}
