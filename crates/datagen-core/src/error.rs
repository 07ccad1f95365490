use thiserror::Error;

/// Malformed input handed to the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("feature name must not be empty")]
    EmptyFeatureName,
    #[error("number of instances must be positive")]
    NonPositiveInstanceCount,
    #[error("at least one feature definition is required")]
    NoFeatures,
    /// A parameter value lies outside the domain its distribution accepts.
    #[error("parameter '{parameter}' out of domain: {reason}")]
    ParameterOutOfDomain {
        parameter: &'static str,
        reason: String,
    },
}

/// Structural violations of the feature dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphIntegrityError {
    #[error("missing parent feature '{parent}' in graph")]
    MissingParent { parent: String },
    #[error("parameter '{parameter}' of '{child}' does not reference parent '{parent}'")]
    ParameterSourceMismatch {
        parent: String,
        child: String,
        parameter: &'static str,
    },
    /// Committing the edge `parent -> child` would close a cycle.
    #[error("circular dependency between '{parent}' and '{child}'")]
    CircularDependency { parent: String, child: String },
}

/// API misuse: calls made out of the required order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("feature '{feature}' has not been sampled for the current instance")]
    UnresolvedSource { feature: String },
    #[error("metadata must be exported before any instance")]
    MetadataAfterInstances,
    #[error("metadata export is not callable twice")]
    MethodNotCallableTwice,
}

/// Failures raised by distributions while sampling or querying probabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplingError {
    #[error("{distribution} distribution cannot evaluate a {found} value")]
    IncompatibleValue {
        distribution: &'static str,
        found: &'static str,
    },
    #[error("{distribution} distribution received parameters for {found}")]
    ParameterMismatch {
        distribution: &'static str,
        found: &'static str,
    },
    #[error("cannot convert {found} value of '{feature}' for parameter '{parameter}'")]
    Conversion {
        feature: String,
        parameter: &'static str,
        found: &'static str,
    },
}

/// Core error type shared across datagen crates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("graph integrity error: {0}")]
    GraphIntegrity(#[from] GraphIntegrityError),
    #[error("sequencing error: {0}")]
    Sequencing(#[from] SequencingError),
    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),
}

impl CoreError {
    pub fn is_circular_dependency(&self) -> bool {
        matches!(
            self,
            CoreError::GraphIntegrity(GraphIntegrityError::CircularDependency { .. })
        )
    }
}

/// Convenience alias for results returned by datagen crates.
pub type Result<T> = std::result::Result<T, CoreError>;
