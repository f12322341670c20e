//! Named activation functions for network nodes and MIMO control modules.
//!
//! The set is a closed enumeration: node genes store an activation by
//! name, and lookup of an unrecognised name fails with
//! [`ActivationNotFound`]. Scalar activations map ℝ→ℝ; module activations
//! map an input vector to one value per outgoing module link.

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;

/// Slope of the steepened sigmoid used by the canonical NEAT experiments.
const SIGMOID_STEEPNESS: f64 = 4.924273;

/// An `ActivationKind` names the scalar function a network node
/// applies to its weighted input sum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivationKind {
    /// 1 / (1 + exp(-x))
    SigmoidPlain,
    /// 1 / (1 + exp(-4.924273x))
    SigmoidSteepened,
    /// tanh(x)
    Tanh,
    /// x
    Linear,
    /// Passes the input sum through unchanged. Used for sensor nodes
    /// and for module output taps.
    Null,
    /// 1 if x > 0, else 0
    Step,
    /// -1, 0 or 1 depending on the sign of x
    Sign,
    /// sin(x)
    Sine,
    /// exp(-x²)
    Gaussian,
    /// |x|
    Abs,
    /// max(0, x)
    ReLU,
    /// x / (1 + |x|)
    Softsign,
}

impl ActivationKind {
    /// Applies the activation function to the input sum.
    ///
    /// # Examples
    /// ```
    /// use evoneat::activations::ActivationKind;
    ///
    /// assert_eq!(ActivationKind::Linear.apply(2.5), 2.5);
    /// assert_eq!(ActivationKind::SigmoidSteepened.apply(0.0), 0.5);
    /// assert_eq!(ActivationKind::ReLU.apply(-3.0), 0.0);
    /// ```
    pub fn apply(self, x: f64) -> f64 {
        match self {
            ActivationKind::SigmoidPlain => 1.0 / (1.0 + (-x).exp()),
            ActivationKind::SigmoidSteepened => 1.0 / (1.0 + (-SIGMOID_STEEPNESS * x).exp()),
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::Linear | ActivationKind::Null => x,
            ActivationKind::Step => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationKind::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            ActivationKind::Sine => x.sin(),
            ActivationKind::Gaussian => (-(x * x)).exp(),
            ActivationKind::Abs => x.abs(),
            ActivationKind::ReLU => x.max(0.0),
            ActivationKind::Softsign => x / (1.0 + x.abs()),
        }
    }

    /// Returns the canonical name of the activation, as stored by
    /// the genome text format.
    pub fn name(self) -> &'static str {
        match self {
            ActivationKind::SigmoidPlain => "SigmoidPlainActivation",
            ActivationKind::SigmoidSteepened => "SigmoidSteepenedActivation",
            ActivationKind::Tanh => "TanhActivation",
            ActivationKind::Linear => "LinearActivation",
            ActivationKind::Null => "NullActivation",
            ActivationKind::Step => "StepActivation",
            ActivationKind::Sign => "SignActivation",
            ActivationKind::Sine => "SineActivation",
            ActivationKind::Gaussian => "GaussianActivation",
            ActivationKind::Abs => "AbsActivation",
            ActivationKind::ReLU => "ReluActivation",
            ActivationKind::Softsign => "SoftsignActivation",
        }
    }

    /// Looks an activation up by its canonical name.
    ///
    /// # Errors
    /// Fails with [`ActivationNotFound`] for unrecognised names.
    ///
    /// # Examples
    /// ```
    /// use evoneat::activations::ActivationKind;
    ///
    /// let kind = ActivationKind::from_name("TanhActivation").unwrap();
    /// assert_eq!(kind, ActivationKind::Tanh);
    ///
    /// assert!(ActivationKind::from_name("FancyActivation").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<ActivationKind, ActivationNotFound> {
        match name {
            "SigmoidPlainActivation" => Ok(ActivationKind::SigmoidPlain),
            "SigmoidSteepenedActivation" => Ok(ActivationKind::SigmoidSteepened),
            "TanhActivation" => Ok(ActivationKind::Tanh),
            "LinearActivation" => Ok(ActivationKind::Linear),
            "NullActivation" => Ok(ActivationKind::Null),
            "StepActivation" => Ok(ActivationKind::Step),
            "SignActivation" => Ok(ActivationKind::Sign),
            "SineActivation" => Ok(ActivationKind::Sine),
            "GaussianActivation" => Ok(ActivationKind::Gaussian),
            "AbsActivation" => Ok(ActivationKind::Abs),
            "ReluActivation" => Ok(ActivationKind::ReLU),
            "SoftsignActivation" => Ok(ActivationKind::Softsign),
            other => Err(ActivationNotFound(other.to_string())),
        }
    }
}

/// A `ModuleActivationKind` names the multi-input multi-output function
/// applied by a MIMO control node. The scalar result is broadcast over
/// the module's outgoing links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ModuleActivationKind {
    /// Product of all inputs.
    Multiply,
    /// Minimum of all inputs.
    Min,
    /// Maximum of all inputs.
    Max,
}

impl ModuleActivationKind {
    /// Applies the module function to the input vector, producing one
    /// output value per outgoing module link.
    ///
    /// # Examples
    /// ```
    /// use evoneat::activations::ModuleActivationKind;
    ///
    /// let out = ModuleActivationKind::Multiply.apply(&[25.0, 11.0], 1);
    /// assert_eq!(out, vec![275.0]);
    /// ```
    pub fn apply(self, inputs: &[f64], outputs: usize) -> Vec<f64> {
        let value = match self {
            ModuleActivationKind::Multiply => inputs.iter().product(),
            ModuleActivationKind::Min => inputs.iter().copied().fold(f64::INFINITY, f64::min),
            ModuleActivationKind::Max => inputs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        vec![value; outputs]
    }

    /// Returns the canonical name of the module activation.
    pub fn name(self) -> &'static str {
        match self {
            ModuleActivationKind::Multiply => "MultiplyModuleActivation",
            ModuleActivationKind::Min => "MinModuleActivation",
            ModuleActivationKind::Max => "MaxModuleActivation",
        }
    }

    /// Looks a module activation up by its canonical name.
    ///
    /// # Errors
    /// Fails with [`ActivationNotFound`] for unrecognised names.
    pub fn from_name(name: &str) -> Result<ModuleActivationKind, ActivationNotFound> {
        match name {
            "MultiplyModuleActivation" => Ok(ModuleActivationKind::Multiply),
            "MinModuleActivation" => Ok(ModuleActivationKind::Min),
            "MaxModuleActivation" => Ok(ModuleActivationKind::Max),
            other => Err(ActivationNotFound(other.to_string())),
        }
    }
}

/// An error type indicating lookup of an activation name that
/// is not part of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationNotFound(pub String);

impl fmt::Display for ActivationNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "activation function not found: {}", self.0)
    }
}

impl Error for ActivationNotFound {}
