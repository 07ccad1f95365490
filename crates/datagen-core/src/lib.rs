//! Core contracts for datagen.
//!
//! This crate defines feature definitions, the parameter and distribution
//! model, the feature dependency graph, and the error taxonomy shared by the
//! plan loader, the generation engine and the CLI.

pub mod distribution;
pub mod error;
pub mod feature;
pub mod graph;
pub mod instance;
pub mod parameter;
pub mod validation;
pub mod value;

pub use distribution::{
    BernoulliDistribution, CategorialDistribution, Distribution, DummyDistribution,
    GaussianDistribution, ResolvedParameters,
};
pub use error::{
    CoreError, GraphIntegrityError, Result, SamplingError, SequencingError, ValidationError,
};
pub use feature::{FeatureDefinition, FeatureId, FeatureRef};
pub use graph::{DependencyEdge, FeatureDefinitionGraph};
pub use instance::Instance;
pub use parameter::{
    Conversion, InstanceValues, Parameter, ParameterDependency, ParameterId, ParameterType,
    VariableParameter,
};
pub use validation::{validate_feature_count, validate_feature_name, validate_instance_count};
pub use value::FeatureValue;
