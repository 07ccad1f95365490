//! Sampling strategies for feature values.
//!
//! Each distribution owns its parameters. Sampling is split in two steps:
//! [`Distribution::resolve`] reads the parameters against the values already
//! produced for the current instance, then [`Distribution::sample`] draws from
//! an explicit random source so runs are reproducible from a seed.

use std::f64::consts::PI;

use rand::{Rng, RngCore};

use crate::error::{Result, SamplingError};
use crate::parameter::{InstanceValues, Parameter, ParameterDependency};
use crate::validation::{validate_finite, validate_positive, validate_probabilities, validate_probability};
use crate::value::FeatureValue;

/// Enumerates the supported distributions.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Bernoulli(BernoulliDistribution),
    Categorial(CategorialDistribution),
    Gaussian(GaussianDistribution),
    /// Test double that always yields the same value.
    Dummy(DummyDistribution),
}

/// Parameters of a distribution after resolution for one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedParameters {
    Bernoulli { p: f64 },
    Categorial { probabilities: Vec<f64> },
    Gaussian { mean: f64, sigma: f64 },
    Dummy,
}

impl ResolvedParameters {
    fn label(&self) -> &'static str {
        match self {
            ResolvedParameters::Bernoulli { .. } => "bernoulli",
            ResolvedParameters::Categorial { .. } => "categorial",
            ResolvedParameters::Gaussian { .. } => "gaussian",
            ResolvedParameters::Dummy => "dummy",
        }
    }
}

impl Distribution {
    pub fn name(&self) -> &'static str {
        match self {
            Distribution::Bernoulli(_) => "bernoulli",
            Distribution::Categorial(_) => "categorial",
            Distribution::Gaussian(_) => "gaussian",
            Distribution::Dummy(_) => "dummy",
        }
    }

    pub fn variable_parameters(&self) -> Vec<ParameterDependency> {
        match self {
            Distribution::Bernoulli(bernoulli) => {
                bernoulli.p.dependency("p").into_iter().collect()
            }
            Distribution::Categorial(categorial) => categorial
                .probabilities
                .dependency("probabilities")
                .into_iter()
                .collect(),
            Distribution::Gaussian(gaussian) => gaussian
                .mean
                .dependency("mean")
                .into_iter()
                .chain(gaussian.sigma.dependency("sigma"))
                .collect(),
            Distribution::Dummy(_) => Vec::new(),
        }
    }

    /// Resolve every parameter against the current instance and check its domain.
    pub fn resolve(&self, values: &InstanceValues) -> Result<ResolvedParameters> {
        match self {
            Distribution::Bernoulli(bernoulli) => {
                let p = bernoulli.p.resolve("p", values)?;
                validate_probability("p", p)?;
                Ok(ResolvedParameters::Bernoulli { p })
            }
            Distribution::Categorial(categorial) => {
                let probabilities = categorial.probabilities.resolve("probabilities", values)?;
                validate_probabilities("probabilities", &probabilities)?;
                Ok(ResolvedParameters::Categorial { probabilities })
            }
            Distribution::Gaussian(gaussian) => {
                let mean = gaussian.mean.resolve("mean", values)?;
                let sigma = gaussian.sigma.resolve("sigma", values)?;
                validate_finite("mean", mean)?;
                validate_positive("sigma", sigma)?;
                Ok(ResolvedParameters::Gaussian { mean, sigma })
            }
            Distribution::Dummy(_) => Ok(ResolvedParameters::Dummy),
        }
    }

    pub fn sample(
        &self,
        parameters: &ResolvedParameters,
        rng: &mut dyn RngCore,
    ) -> Result<FeatureValue> {
        match (self, parameters) {
            (Distribution::Bernoulli(_), ResolvedParameters::Bernoulli { p }) => {
                Ok(FeatureValue::Discrete(i64::from(rng.random_bool(*p))))
            }
            (Distribution::Categorial(_), ResolvedParameters::Categorial { probabilities }) => {
                Ok(FeatureValue::Discrete(sample_index(probabilities, rng)))
            }
            (Distribution::Gaussian(_), ResolvedParameters::Gaussian { mean, sigma }) => {
                Ok(FeatureValue::Continuous(mean + sigma * standard_normal(rng)))
            }
            (Distribution::Dummy(dummy), ResolvedParameters::Dummy) => Ok(dummy.sample),
            (distribution, parameters) => Err(SamplingError::ParameterMismatch {
                distribution: distribution.name(),
                found: parameters.label(),
            }
            .into()),
        }
    }

    /// Resolve then sample in one step.
    pub fn sample_in(&self, values: &InstanceValues, rng: &mut dyn RngCore) -> Result<FeatureValue> {
        let parameters = self.resolve(values)?;
        self.sample(&parameters, rng)
    }

    /// Probability mass (discrete) or density (continuous) of `value`.
    ///
    /// Variable parameters are resolved against an empty instance, so a
    /// distribution that depends on another feature needs
    /// [`Distribution::probability_of_given`].
    pub fn probability_of(&self, value: &FeatureValue) -> Result<f64> {
        self.probability_of_given(value, &InstanceValues::new())
    }

    /// A value of the wrong kind fails before any parameter is resolved.
    pub fn probability_of_given(&self, value: &FeatureValue, values: &InstanceValues) -> Result<f64> {
        let accepted = match self {
            Distribution::Bernoulli(_) | Distribution::Categorial(_) => {
                matches!(value, FeatureValue::Discrete(_))
            }
            Distribution::Gaussian(_) => matches!(value, FeatureValue::Continuous(_)),
            Distribution::Dummy(dummy) => value.kind() == dummy.sample.kind(),
        };
        if !accepted {
            return Err(SamplingError::IncompatibleValue {
                distribution: self.name(),
                found: value.kind(),
            }
            .into());
        }
        if let Distribution::Dummy(dummy) = self {
            return Ok(if *value == dummy.sample { 1.0 } else { 0.0 });
        }

        let parameters = self.resolve(values)?;
        match (parameters, value) {
            (ResolvedParameters::Bernoulli { p }, FeatureValue::Discrete(index)) => Ok(match index {
                0 => 1.0 - p,
                1 => p,
                _ => 0.0,
            }),
            (ResolvedParameters::Categorial { probabilities }, FeatureValue::Discrete(index)) => {
                Ok(usize::try_from(*index)
                    .ok()
                    .and_then(|index| probabilities.get(index).copied())
                    .unwrap_or(0.0))
            }
            (ResolvedParameters::Gaussian { mean, sigma }, FeatureValue::Continuous(x)) => {
                Ok(gaussian_density(*x, mean, sigma))
            }
            (_, value) => Err(SamplingError::IncompatibleValue {
                distribution: self.name(),
                found: value.kind(),
            }
            .into()),
        }
    }
}

/// Two-valued outcome: 1 with probability `p`, 0 otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct BernoulliDistribution {
    p: Parameter<f64>,
}

impl BernoulliDistribution {
    pub fn new(p: impl Into<Parameter<f64>>) -> Result<Self> {
        let p = p.into();
        if let Parameter::Fixed(value) = &p {
            validate_probability("p", *value)?;
        }
        Ok(Self { p })
    }

    pub fn p(&self) -> &Parameter<f64> {
        &self.p
    }
}

/// Discrete distribution over indices `0..k`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorialDistribution {
    probabilities: Parameter<Vec<f64>>,
}

impl CategorialDistribution {
    /// The caller is responsible for the probabilities summing to one.
    pub fn new(probabilities: impl Into<Parameter<Vec<f64>>>) -> Result<Self> {
        let probabilities = probabilities.into();
        if let Parameter::Fixed(values) = &probabilities {
            validate_probabilities("probabilities", values)?;
        }
        Ok(Self { probabilities })
    }

    pub fn probabilities(&self) -> &Parameter<Vec<f64>> {
        &self.probabilities
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianDistribution {
    mean: Parameter<f64>,
    sigma: Parameter<f64>,
}

impl GaussianDistribution {
    pub fn new(mean: impl Into<Parameter<f64>>, sigma: impl Into<Parameter<f64>>) -> Result<Self> {
        let mean = mean.into();
        let sigma = sigma.into();
        if let Parameter::Fixed(value) = &mean {
            validate_finite("mean", *value)?;
        }
        if let Parameter::Fixed(value) = &sigma {
            validate_positive("sigma", *value)?;
        }
        Ok(Self { mean, sigma })
    }

    pub fn mean(&self) -> &Parameter<f64> {
        &self.mean
    }

    pub fn sigma(&self) -> &Parameter<f64> {
        &self.sigma
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DummyDistribution {
    sample: FeatureValue,
}

impl DummyDistribution {
    pub const ANY_SAMPLE: FeatureValue = FeatureValue::Discrete(0);

    pub fn new() -> Self {
        Self::with_sample(Self::ANY_SAMPLE)
    }

    pub fn with_sample(sample: FeatureValue) -> Self {
        Self { sample }
    }
}

impl Default for DummyDistribution {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_index(probabilities: &[f64], rng: &mut dyn RngCore) -> i64 {
    let draw: f64 = rng.random();
    let mut cumulative = 0.0;
    for (index, probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if draw < cumulative {
            return index as i64;
        }
    }
    // rounding, or a vector summing below one
    probabilities.len().saturating_sub(1) as i64
}

/// Marsaglia polar method.
fn standard_normal(rng: &mut dyn RngCore) -> f64 {
    loop {
        let u = 2.0 * rng.random::<f64>() - 1.0;
        let v = 2.0 * rng.random::<f64>() - 1.0;
        let s = u * u + v * v;
        if s > 0.0 && s < 1.0 {
            return u * (-2.0 * s.ln() / s).sqrt();
        }
    }
}

fn gaussian_density(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}
