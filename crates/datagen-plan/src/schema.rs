use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::FeaturePlan;

/// Emit the JSON Schema for feature plan documents.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(FeaturePlan)
}
