//! Sampleable parameter distributions for randomized search.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use gs_types::ParamValue;

/// Anything that can draw a parameter value from a seeded random source.
///
/// Implement this for caller-defined priors; the built-in shapes are in
/// [`BuiltinDistribution`].
pub trait ParamDistribution: Send + Sync + std::fmt::Debug {
    fn sample(&self, rng: &mut StdRng) -> ParamValue;
}

fn default_scale() -> f64 {
    1.0
}

/// Distributions that can be written inline in a JSON parameter spec,
/// e.g. `{"distribution": "loguniform", "low": 1e-4, "high": 1.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum BuiltinDistribution {
    /// Continuous uniform on `[loc, loc + scale)`.
    Uniform {
        #[serde(default)]
        loc: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Log-uniform on `[low, high)`.
    LogUniform { low: f64, high: f64 },
    /// Integers uniform on `[low, high)`.
    RandInt { low: i64, high: i64 },
    /// Gaussian with mean `loc` and standard deviation `scale`.
    Normal {
        #[serde(default)]
        loc: f64,
        #[serde(default = "default_scale")]
        scale: f64,
    },
}

impl BuiltinDistribution {
    /// Build the sampler, rejecting parameters the underlying distribution
    /// cannot be constructed with.
    pub fn build(&self) -> Result<BuiltinSampler, String> {
        let sampler = match *self {
            Self::Uniform { loc, scale } => {
                BuiltinSampler::Uniform(Uniform::new(loc, loc + scale).map_err(|e| {
                    format!("uniform requires a positive finite scale, got loc={loc}, scale={scale}: {e}")
                })?)
            }
            Self::LogUniform { low, high } => {
                if low <= 0.0 {
                    return Err(format!("loguniform requires 0 < low, got low={low}"));
                }
                BuiltinSampler::LogUniform(Uniform::new(low.ln(), high.ln()).map_err(|e| {
                    format!("loguniform requires low < high, got low={low}, high={high}: {e}")
                })?)
            }
            Self::RandInt { low, high } => BuiltinSampler::RandInt(
                Uniform::new(low, high)
                    .map_err(|e| format!("randint requires low < high, got low={low}, high={high}: {e}"))?,
            ),
            Self::Normal { loc, scale } => BuiltinSampler::Normal(
                Normal::new(loc, scale)
                    .map_err(|e| format!("invalid normal, got loc={loc}, scale={scale}: {e}"))?,
            ),
        };
        Ok(sampler)
    }

    /// Check the distribution's own parameters.
    pub fn validate(&self) -> Result<(), String> {
        self.build().map(|_| ())
    }
}

/// A validated [`BuiltinDistribution`], ready to draw from.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinSampler {
    Uniform(Uniform<f64>),
    /// Uniform over `[ln low, ln high)`, exponentiated.
    LogUniform(Uniform<f64>),
    RandInt(Uniform<i64>),
    Normal(Normal<f64>),
}

impl ParamDistribution for BuiltinSampler {
    fn sample(&self, rng: &mut StdRng) -> ParamValue {
        match self {
            Self::Uniform(dist) => ParamValue::Float(dist.sample(rng)),
            Self::LogUniform(dist) => ParamValue::Float(dist.sample(rng).exp()),
            Self::RandInt(dist) => ParamValue::Int(dist.sample(rng)),
            Self::Normal(dist) => ParamValue::Float(dist.sample(rng)),
        }
    }
}
