use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Current contract version for feature plan documents.
pub const PLAN_VERSION: &str = "0.1";

/// Declarative list of features to generate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FeaturePlan {
    /// Contract version for the plan format.
    pub plan_version: String,
    /// Seed for reproducibility; the CLI may override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Features in declaration order; exported columns follow this order.
    pub features: Vec<FeatureEntry>,
}

/// One feature: a column name and the distribution its values come from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FeatureEntry {
    pub name: String,
    pub distribution: DistributionConfig,
}

/// Distribution union, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DistributionConfig {
    /// Outcome 1 with probability `p`, 0 otherwise.
    Bernoulli { p: ParameterConfig<f64> },
    /// Category index drawn from an ordered probability vector.
    Categorial {
        probabilities: ParameterConfig<Vec<f64>>,
    },
    /// Normal distribution.
    Gaussian {
        mean: ParameterConfig<f64>,
        sigma: ParameterConfig<f64>,
    },
    /// Constant test distribution.
    Dummy,
}

impl DistributionConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            DistributionConfig::Bernoulli { .. } => "bernoulli",
            DistributionConfig::Categorial { .. } => "categorial",
            DistributionConfig::Gaussian { .. } => "gaussian",
            DistributionConfig::Dummy => "dummy",
        }
    }

    /// Named parameters that read another feature.
    pub fn variable_parameters(&self) -> Vec<(&'static str, &str)> {
        let mut variables = Vec::new();
        match self {
            DistributionConfig::Bernoulli { p } => push_variable(&mut variables, "p", p),
            DistributionConfig::Categorial { probabilities } => {
                push_variable(&mut variables, "probabilities", probabilities)
            }
            DistributionConfig::Gaussian { mean, sigma } => {
                push_variable(&mut variables, "mean", mean);
                push_variable(&mut variables, "sigma", sigma);
            }
            DistributionConfig::Dummy => {}
        }
        variables
    }
}

fn push_variable<'a, T>(
    variables: &mut Vec<(&'static str, &'a str)>,
    name: &'static str,
    parameter: &'a ParameterConfig<T>,
) {
    if let ParameterConfig::Variable(variable) = parameter {
        variables.push((name, variable.feature.as_str()));
    }
}

/// A literal value or a reference to another feature.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParameterConfig<T> {
    Fixed(T),
    Variable(VariableConfig<T>),
}

/// Parameter read from another feature's value in the same instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, bound(deserialize = "T: Deserialize<'de>"))]
pub struct VariableConfig<T> {
    /// Name of the source feature.
    pub feature: String,
    #[serde(default)]
    pub conversion: ConversionConfig<T>,
}

/// How the source value becomes the parameter value.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversionConfig<T> {
    /// Use the source value as a number.
    Identity,
    /// Index a table with the source's category index.
    Lookup(Vec<T>),
}

impl<T> Default for ConversionConfig<T> {
    fn default() -> Self {
        ConversionConfig::Identity
    }
}
