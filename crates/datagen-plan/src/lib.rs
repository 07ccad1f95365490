//! Feature plan contracts, validation and compilation.
//!
//! A plan is a JSON document declaring features and their distributions.
//! Validation runs in two passes (JSON Schema, then semantic checks) and
//! compilation turns a valid plan into core feature definitions and a
//! dependency graph.

pub mod compile;
pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use compile::{CompiledPlan, compile_plan};
pub use errors::{IssueSeverity, PlanError, ValidationIssue, ValidationReport};
pub use model::{
    ConversionConfig, DistributionConfig, FeaturePlan, FeatureEntry, PLAN_VERSION, ParameterConfig,
    VariableConfig,
};
pub use schema::plan_json_schema;
pub use validate::{
    ValidatedPlan, load_plan, validate_plan, validate_plan_json, validate_plan_semantics,
};
