//! Distribution parameters that are either constant or read from another
//! feature's value within the same instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SamplingError, SequencingError};
use crate::feature::{FeatureId, FeatureRef};
use crate::value::FeatureValue;

static NEXT_PARAMETER_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity of a variable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterId(u64);

impl ParameterId {
    fn next() -> Self {
        Self(NEXT_PARAMETER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Value types a parameter can resolve to.
pub trait ParameterType: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    const KIND: &'static str;

    /// Identity conversion from a sampled feature value, if one exists.
    fn from_feature_value(value: &FeatureValue) -> Option<Self>;
}

impl ParameterType for f64 {
    const KIND: &'static str = "double";

    fn from_feature_value(value: &FeatureValue) -> Option<Self> {
        Some(value.as_f64())
    }
}

impl ParameterType for Vec<f64> {
    const KIND: &'static str = "probability vector";

    fn from_feature_value(_value: &FeatureValue) -> Option<Self> {
        None
    }
}

/// Rule turning the source feature's value into the parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion<T> {
    Identity,
    /// Picks the entry at the source's discrete index.
    Lookup(Vec<T>),
}

impl<T: ParameterType> Conversion<T> {
    fn apply(&self, value: &FeatureValue) -> Option<T> {
        match self {
            Conversion::Identity => T::from_feature_value(value),
            Conversion::Lookup(table) => value
                .as_index()
                .and_then(|index| usize::try_from(index).ok())
                .and_then(|index| table.get(index).cloned()),
        }
    }
}

/// Parameter derived from another feature's per-instance value.
#[derive(Clone)]
pub struct VariableParameter<T> {
    id: ParameterId,
    source: FeatureRef,
    conversion: Conversion<T>,
}

impl<T: ParameterType> VariableParameter<T> {
    pub fn new(source: FeatureRef, conversion: Conversion<T>) -> Self {
        Self {
            id: ParameterId::next(),
            source,
            conversion,
        }
    }

    pub fn id(&self) -> ParameterId {
        self.id
    }

    pub fn source(&self) -> &FeatureRef {
        &self.source
    }

    pub fn conversion(&self) -> &Conversion<T> {
        &self.conversion
    }

    pub fn resolve(&self, name: &'static str, values: &InstanceValues) -> Result<T> {
        let value = values
            .get(self.source.id())
            .ok_or_else(|| SequencingError::UnresolvedSource {
                feature: self.source.name().to_string(),
            })?;
        let converted = self
            .conversion
            .apply(value)
            .ok_or_else(|| SamplingError::Conversion {
                feature: self.source.name().to_string(),
                parameter: name,
                found: value.kind(),
            })?;
        Ok(converted)
    }

    /// Handle registered on the dependency edge `source -> owner`.
    pub fn dependency(&self, name: &'static str) -> ParameterDependency {
        ParameterDependency {
            parameter: self.id,
            name,
            source: self.source.clone(),
        }
    }
}

impl<T> PartialEq for VariableParameter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: fmt::Debug> fmt::Debug for VariableParameter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableParameter")
            .field("id", &self.id)
            .field("source", &self.source.name())
            .field("conversion", &self.conversion)
            .finish()
    }
}

/// A distribution parameter: a constant or a reference to another feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter<T> {
    Fixed(T),
    Variable(VariableParameter<T>),
}

impl<T: ParameterType> Parameter<T> {
    pub fn variable(source: FeatureRef, conversion: Conversion<T>) -> Self {
        Parameter::Variable(VariableParameter::new(source, conversion))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Parameter::Variable(_))
    }

    /// Fixed values resolve to themselves; variable ones read the current instance.
    pub fn resolve(&self, name: &'static str, values: &InstanceValues) -> Result<T> {
        match self {
            Parameter::Fixed(value) => Ok(value.clone()),
            Parameter::Variable(parameter) => parameter.resolve(name, values),
        }
    }

    pub fn dependency(&self, name: &'static str) -> Option<ParameterDependency> {
        match self {
            Parameter::Fixed(_) => None,
            Parameter::Variable(parameter) => Some(parameter.dependency(name)),
        }
    }
}

impl<T> From<T> for Parameter<T> {
    fn from(value: T) -> Self {
        Parameter::Fixed(value)
    }
}

/// Type-erased view of a variable parameter, as stored on graph edges.
#[derive(Clone)]
pub struct ParameterDependency {
    parameter: ParameterId,
    name: &'static str,
    source: FeatureRef,
}

impl ParameterDependency {
    pub fn id(&self) -> ParameterId {
        self.parameter
    }

    /// Role of the parameter within its distribution (`mean`, `sigma`, ...).
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn source(&self) -> &FeatureRef {
        &self.source
    }
}

impl PartialEq for ParameterDependency {
    fn eq(&self, other: &Self) -> bool {
        self.parameter == other.parameter && self.source.id() == other.source.id()
    }
}

impl Eq for ParameterDependency {}

impl fmt::Debug for ParameterDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDependency")
            .field("parameter", &self.parameter)
            .field("name", &self.name)
            .field("source", &self.source.name())
            .finish()
    }
}

/// Values sampled so far for the instance currently being generated.
#[derive(Debug, Default, Clone)]
pub struct InstanceValues {
    values: HashMap<FeatureId, FeatureValue>,
}

impl InstanceValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, feature: FeatureId) -> Option<&FeatureValue> {
        self.values.get(&feature)
    }

    pub fn record(&mut self, feature: FeatureId, value: FeatureValue) {
        self.values.insert(feature, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Distribution, DummyDistribution};
    use crate::error::CoreError;
    use crate::feature::FeatureDefinition;

    fn source() -> FeatureRef {
        FeatureDefinition::new("source", Distribution::Dummy(DummyDistribution::new()))
            .expect("definition")
    }

    #[test]
    fn fixed_resolves_to_constant() {
        let parameter = Parameter::Fixed(2.5);
        let resolved = parameter.resolve("mean", &InstanceValues::new());
        assert_eq!(resolved, Ok(2.5));
        assert!(parameter.dependency("mean").is_none());
    }

    #[test]
    fn variable_reads_current_instance() {
        let source = source();
        let parameter = Parameter::<f64>::variable(source.clone(), Conversion::Identity);
        let mut values = InstanceValues::new();
        values.record(source.id(), FeatureValue::Discrete(3));

        assert_eq!(parameter.resolve("mean", &values), Ok(3.0));
        assert!(parameter.is_variable());
    }

    #[test]
    fn variable_before_source_is_a_sequencing_error() {
        let parameter = Parameter::<f64>::variable(source(), Conversion::Identity);
        let result = parameter.resolve("mean", &InstanceValues::new());
        assert!(matches!(
            result,
            Err(CoreError::Sequencing(SequencingError::UnresolvedSource { .. }))
        ));
    }

    #[test]
    fn lookup_maps_discrete_index() {
        let source = source();
        let parameter = Parameter::variable(
            source.clone(),
            Conversion::Lookup(vec![vec![1.0, 0.0], vec![0.5, 0.5]]),
        );
        let mut values = InstanceValues::new();
        values.record(source.id(), FeatureValue::Discrete(1));
        assert_eq!(parameter.resolve("probabilities", &values), Ok(vec![0.5, 0.5]));

        values.record(source.id(), FeatureValue::Discrete(7));
        assert!(matches!(
            parameter.resolve("probabilities", &values),
            Err(CoreError::Sampling(SamplingError::Conversion { .. }))
        ));
    }

    #[test]
    fn identity_cannot_produce_probability_vector() {
        let source = source();
        let parameter = Parameter::<Vec<f64>>::variable(source.clone(), Conversion::Identity);
        let mut values = InstanceValues::new();
        values.record(source.id(), FeatureValue::Continuous(0.2));
        assert!(parameter.resolve("probabilities", &values).is_err());
    }

    #[test]
    fn dependency_carries_identity_and_source() {
        let source = source();
        let parameter = VariableParameter::<f64>::new(source.clone(), Conversion::Identity);
        let dependency = parameter.dependency("sigma");
        assert_eq!(dependency.id(), parameter.id());
        assert_eq!(dependency.name(), "sigma");
        assert_eq!(dependency.source(), &source);
    }
}
