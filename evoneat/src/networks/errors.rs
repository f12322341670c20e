use std::error::Error;
use std::fmt;

/// An error type for network activation and analysis failures.
/// Activation step overruns are reported, never panicked on; callers
/// retry with a larger step budget or flush the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// `activate_steps` or `forward_steps` was asked for zero steps.
    ZeroStepsRequested,
    /// Outputs remained un-activated after the allowed number of
    /// propagation passes.
    MaxActivationAttemptsExceeded,
    /// Depth analysis reached the configured depth cap.
    MaxNetDepthExceeded,
    /// The fast depth analysis does not support modular networks.
    ModularDepthUnsupported,
    /// `load_sensors` was given a value count different from the
    /// network's input and bias node count.
    SensorArityMismatch {
        /// Number of input and bias nodes resident in the network.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroStepsRequested => {
                write!(f, "zero activation steps requested")
            }
            Self::MaxActivationAttemptsExceeded => {
                write!(f, "maximal network activation attempts exceeded")
            }
            Self::MaxNetDepthExceeded => {
                write!(f, "maximal network depth exceeded")
            }
            Self::ModularDepthUnsupported => {
                write!(f, "fast depth calculation is not supported for modular networks")
            }
            Self::SensorArityMismatch { expected, actual } => write!(
                f,
                "sensor arity mismatch: network has {} inputs, {} values loaded",
                expected, actual
            ),
        }
    }
}

impl Error for NetworkError {}
