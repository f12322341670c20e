//! Traits are parameter bundles shared by reference between node and
//! connection genes, so that a single trait mutation perturbs many
//! sites of the genome at once.

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;

/// Number of real parameters carried by every trait.
pub const TRAIT_PARAM_COUNT: usize = 8;

/// A `Trait` is an identifier plus a fixed-length vector of real
/// parameters. Node and connection genes reference traits by ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    id: usize,
    params: [f64; TRAIT_PARAM_COUNT],
}

impl Trait {
    /// Returns a new trait with the specified ID and parameters.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::Trait;
    ///
    /// let t = Trait::new(1, [0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    /// assert_eq!(t.id(), 1);
    /// ```
    pub fn new(id: usize, params: [f64; TRAIT_PARAM_COUNT]) -> Trait {
        Trait { id, params }
    }

    /// Returns the trait's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the trait's parameters.
    pub fn params(&self) -> &[f64; TRAIT_PARAM_COUNT] {
        &self.params
    }

    /// Perturbs each parameter independently with probability
    /// `param_prob`, by a uniform amount within `±power`.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R, power: f64, param_prob: f64) {
        for param in &mut self.params {
            if rng.gen::<f64>() < param_prob {
                *param += rng.gen_range(-1.0..=1.0) * power;
            }
        }
    }

    /// Returns a trait whose parameters are the element-wise average
    /// of the two parents' parameters. The ID is taken from the first
    /// parent, preserving reference stability in the child genome.
    pub fn averaged(first: &Trait, second: &Trait) -> Trait {
        let mut params = [0.0; TRAIT_PARAM_COUNT];
        for (i, param) in params.iter_mut().enumerate() {
            *param = (first.params[i] + second.params[i]) / 2.0;
        }
        Trait {
            id: first.id,
            params,
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trait {} {:?}", self.id, self.params)
    }
}
