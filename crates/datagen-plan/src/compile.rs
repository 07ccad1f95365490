use std::collections::{BTreeSet, HashMap};

use datagen_core::{
    BernoulliDistribution, CategorialDistribution, Conversion, Distribution, DummyDistribution,
    FeatureDefinition, FeatureDefinitionGraph, FeatureRef, GaussianDistribution, Parameter,
    ParameterType,
};
use tracing::{debug, info};

use crate::errors::{PlanError, Result, ValidationIssue, ValidationReport};
use crate::model::{ConversionConfig, DistributionConfig, FeaturePlan, ParameterConfig};
use crate::validate::validate_plan_semantics;

/// Feature definitions built from a plan, ready for generation.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Definitions in declaration order.
    pub definitions: Vec<FeatureRef>,
    pub graph: FeatureDefinitionGraph,
    pub seed: Option<u64>,
}

/// Build feature definitions and their dependency graph from a plan.
///
/// Sources are constructed before the features that read them, so every
/// variable parameter can hold its source definition.
pub fn compile_plan(plan: &FeaturePlan) -> Result<CompiledPlan> {
    let report = validate_plan_semantics(plan);
    if !report.is_ok() {
        return Err(PlanError::Invalid(report));
    }

    let order = dependency_order(plan).map_err(|cycle| {
        invalid(
            "circular_dependency",
            "/features",
            format!("features depend on each other in a cycle: {}", cycle.join(", ")),
        )
    })?;

    let mut built: HashMap<&str, FeatureRef> = HashMap::with_capacity(plan.features.len());
    for idx in order {
        let feature = &plan.features[idx];
        let distribution = build_distribution(&feature.distribution, &built)?;
        let definition = FeatureDefinition::new(feature.name.as_str(), distribution)?;
        debug!(
            feature = %feature.name,
            distribution = feature.distribution.type_name(),
            "feature definition built"
        );
        built.insert(feature.name.as_str(), definition);
    }

    let definitions = plan
        .features
        .iter()
        .map(|feature| lookup_source(&built, &feature.name))
        .collect::<Result<Vec<_>>>()?;
    let graph = FeatureDefinitionGraph::from_definitions(&definitions)?;

    info!(
        features = definitions.len(),
        edges = graph.edge_count(),
        "plan compiled"
    );

    Ok(CompiledPlan {
        definitions,
        graph,
        seed: plan.seed,
    })
}

/// Feature indices ordered so every source comes before its readers.
///
/// Ties keep declaration order. Unknown references are ignored; on a cycle
/// the names of the features that could not be ordered are returned.
pub(crate) fn dependency_order(plan: &FeaturePlan) -> std::result::Result<Vec<usize>, Vec<String>> {
    let index: HashMap<&str, usize> = plan
        .features
        .iter()
        .enumerate()
        .map(|(idx, feature)| (feature.name.as_str(), idx))
        .collect();

    let mut indegree = vec![0usize; plan.features.len()];
    let mut readers: Vec<Vec<usize>> = vec![Vec::new(); plan.features.len()];
    for (idx, feature) in plan.features.iter().enumerate() {
        for (_, source) in feature.distribution.variable_parameters() {
            if let Some(&source_idx) = index.get(source) {
                indegree[idx] += 1;
                readers[source_idx].push(idx);
            }
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| idx)
        .collect();
    let mut ordered = Vec::with_capacity(plan.features.len());

    while let Some(idx) = ready.pop_first() {
        ordered.push(idx);
        for &reader in &readers[idx] {
            indegree[reader] -= 1;
            if indegree[reader] == 0 {
                ready.insert(reader);
            }
        }
    }

    if ordered.len() != plan.features.len() {
        let remaining = indegree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(idx, _)| plan.features[idx].name.clone())
            .collect();
        return Err(remaining);
    }

    Ok(ordered)
}

fn build_distribution(
    config: &DistributionConfig,
    built: &HashMap<&str, FeatureRef>,
) -> Result<Distribution> {
    let distribution = match config {
        DistributionConfig::Bernoulli { p } => {
            Distribution::Bernoulli(BernoulliDistribution::new(build_parameter(p, built)?)?)
        }
        DistributionConfig::Categorial { probabilities } => Distribution::Categorial(
            CategorialDistribution::new(build_parameter(probabilities, built)?)?,
        ),
        DistributionConfig::Gaussian { mean, sigma } => Distribution::Gaussian(
            GaussianDistribution::new(build_parameter(mean, built)?, build_parameter(sigma, built)?)?,
        ),
        DistributionConfig::Dummy => Distribution::Dummy(DummyDistribution::new()),
    };
    Ok(distribution)
}

fn build_parameter<T: ParameterType>(
    config: &ParameterConfig<T>,
    built: &HashMap<&str, FeatureRef>,
) -> Result<Parameter<T>> {
    match config {
        ParameterConfig::Fixed(value) => Ok(Parameter::Fixed(value.clone())),
        ParameterConfig::Variable(variable) => {
            let source = lookup_source(built, &variable.feature)?;
            let conversion = match &variable.conversion {
                ConversionConfig::Identity => Conversion::Identity,
                ConversionConfig::Lookup(table) => Conversion::Lookup(table.clone()),
            };
            Ok(Parameter::variable(source, conversion))
        }
    }
}

fn lookup_source(built: &HashMap<&str, FeatureRef>, name: &str) -> Result<FeatureRef> {
    built.get(name).cloned().ok_or_else(|| {
        invalid(
            "unknown_feature",
            "/features",
            format!("feature '{name}' was not built"),
        )
    })
}

fn invalid(code: &str, path: &str, message: String) -> PlanError {
    let mut report = ValidationReport::default();
    report.push(ValidationIssue::error(code, path, message));
    PlanError::Invalid(report)
}
