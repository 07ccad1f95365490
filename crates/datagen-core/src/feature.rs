use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::distribution::Distribution;
use crate::error::Result;
use crate::parameter::ParameterDependency;
use crate::validation::validate_feature_name;

static NEXT_FEATURE_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a feature definition within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(u64);

impl FeatureId {
    fn next() -> Self {
        Self(NEXT_FEATURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared handle to an immutable feature definition.
pub type FeatureRef = Arc<FeatureDefinition>;

/// A named column whose values are drawn from a distribution.
///
/// Definitions compare by identity: two definitions with the same name and
/// distribution are still distinct features.
#[derive(Debug)]
pub struct FeatureDefinition {
    id: FeatureId,
    name: String,
    distribution: Distribution,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Result<FeatureRef> {
        let name = name.into();
        validate_feature_name(&name)?;
        Ok(Arc::new(Self {
            id: FeatureId::next(),
            name,
            distribution,
        }))
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// Variable parameters of this definition, one per dependency edge it needs.
    pub fn dependent_parameters(&self) -> Vec<ParameterDependency> {
        self.distribution.variable_parameters()
    }
}

impl PartialEq for FeatureDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FeatureDefinition {}

impl Hash for FeatureDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{DummyDistribution, GaussianDistribution};
    use crate::error::{CoreError, ValidationError};
    use crate::parameter::{Conversion, Parameter};

    #[test]
    fn rejects_empty_name() {
        let result = FeatureDefinition::new("", Distribution::Dummy(DummyDistribution::new()));
        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::EmptyFeatureName))
        ));
    }

    #[test]
    fn definitions_compare_by_identity() {
        let a = FeatureDefinition::new("a", Distribution::Dummy(DummyDistribution::new()))
            .expect("definition");
        let twin = FeatureDefinition::new("a", Distribution::Dummy(DummyDistribution::new()))
            .expect("definition");
        assert_eq!(a, a.clone());
        assert_ne!(a, twin);
    }

    #[test]
    fn lists_variable_parameters() {
        let a = FeatureDefinition::new("a", Distribution::Dummy(DummyDistribution::new()))
            .expect("definition");
        let gaussian = GaussianDistribution::new(
            Parameter::variable(a.clone(), Conversion::Identity),
            Parameter::Fixed(1.0),
        )
        .expect("gaussian");
        let b = FeatureDefinition::new("b", Distribution::Gaussian(gaussian)).expect("definition");

        let dependencies = b.dependent_parameters();
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].name(), "mean");
        assert_eq!(dependencies[0].source().id(), a.id());
        assert!(a.dependent_parameters().is_empty());
    }
}
