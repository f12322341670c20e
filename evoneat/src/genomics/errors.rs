use crate::activations::ActivationNotFound;
use crate::{Innovation, NodeId};

use std::error::Error;
use std::fmt;
use std::io;

/// The reason a genome failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// A connection gene's source node is absent from the node list.
    MissingInputNode(NodeId),
    /// A connection gene's target node is absent from the node list.
    MissingOutputNode(NodeId),
    /// Two connection genes share the same `(source, target)` pair.
    DuplicateConnection(NodeId, NodeId),
    /// A gene or node references a trait absent from the trait list.
    DanglingTraitRef(usize),
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingInputNode(id) => {
                write!(f, "missing input node {} of gene in the genome nodes list", id)
            }
            Self::MissingOutputNode(id) => {
                write!(f, "missing output node {} of gene in the genome nodes list", id)
            }
            Self::DuplicateConnection(source, target) => {
                write!(f, "duplicate genes found between nodes {} -> {}", source, target)
            }
            Self::DanglingTraitRef(trait_id) => {
                write!(f, "dangling reference to trait {}", trait_id)
            }
        }
    }
}

/// An error type for genome-level failures: verification, activation
/// lookup, serialization, and innovation bookkeeping conflicts.
#[derive(Debug)]
pub enum GenomeError {
    /// The genome failed verification.
    VerificationFailed(VerificationFailure),
    /// A node gene named an activation absent from the registry.
    Activation(ActivationNotFound),
    /// Two connection genes carry the same innovation number.
    InnovationConflict(Innovation),
    /// Reading or writing a serialized genome failed.
    Serialization(String),
}

impl fmt::Display for GenomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerificationFailed(failure) => {
                write!(f, "genome verification failed: {}", failure)
            }
            Self::Activation(err) => err.fmt(f),
            Self::InnovationConflict(innovation) => {
                write!(f, "conflicting genes with innovation number {}", innovation)
            }
            Self::Serialization(reason) => write!(f, "genome serialization failed: {}", reason),
        }
    }
}

impl Error for GenomeError {}

impl From<VerificationFailure> for GenomeError {
    fn from(failure: VerificationFailure) -> GenomeError {
        GenomeError::VerificationFailed(failure)
    }
}

impl From<ActivationNotFound> for GenomeError {
    fn from(err: ActivationNotFound) -> GenomeError {
        GenomeError::Activation(err)
    }
}

impl From<io::Error> for GenomeError {
    fn from(err: io::Error) -> GenomeError {
        GenomeError::Serialization(err.to_string())
    }
}
