use std::error::Error;
use std::fmt;

/// An error type for population-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationError {
    /// A species was asked to produce offspring with no members left.
    EmptySpecies(usize),
    /// An unrecognised epoch executor was requested.
    UnsupportedEpochExecutor(String),
}

impl fmt::Display for PopulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySpecies(id) => {
                write!(f, "species {} has offspring to produce but no members", id)
            }
            Self::UnsupportedEpochExecutor(name) => {
                write!(f, "unsupported epoch executor type requested: {}", name)
            }
        }
    }
}

impl Error for PopulationError {}
