use std::collections::{HashMap, HashSet};
use std::path::Path;

use datagen_core::validation::{
    validate_finite, validate_positive, validate_probabilities, validate_probability,
};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::compile::dependency_order;
use crate::errors::{PlanError, Result, ValidationIssue, ValidationReport};
use crate::model::{ConversionConfig, DistributionConfig, FeaturePlan, PLAN_VERSION, ParameterConfig};
use crate::schema::plan_json_schema;

/// Validated plan with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    pub plan: FeaturePlan,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a plan JSON document against the plan JSON Schema.
pub fn validate_plan_json(plan_json: &Value) -> Result<ValidationReport> {
    let schema = serde_json::to_value(plan_json_schema())?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| PlanError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(plan_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
            ));
        }
    }

    Ok(report)
}

/// Check names, references, dependency cycles and parameter domains.
pub fn validate_plan_semantics(plan: &FeaturePlan) -> ValidationReport {
    let mut report = ValidationReport::default();

    if plan.plan_version != PLAN_VERSION {
        report.push(
            ValidationIssue::error(
                "plan_version_mismatch",
                "/plan_version",
                format!(
                    "plan_version '{}' is not supported (expected '{PLAN_VERSION}')",
                    plan.plan_version
                ),
            )
            .with_hint(format!("set plan_version to \"{PLAN_VERSION}\"")),
        );
    }

    if plan.features.is_empty() {
        report.push(
            ValidationIssue::error("features_empty", "/features", "plan declares no features")
                .with_hint("add at least one feature"),
        );
        return report;
    }

    validate_names(plan, &mut report);
    validate_references(plan, &mut report);
    validate_domains(plan, &mut report);

    if let Err(cycle) = dependency_order(plan) {
        report.push(ValidationIssue::error(
            "circular_dependency",
            "/features",
            format!("features depend on each other in a cycle: {}", cycle.join(", ")),
        ));
    }

    report
}

/// Validate the plan end-to-end, returning structured issues on failure.
pub fn validate_plan(plan_json: &Value) -> std::result::Result<ValidatedPlan, ValidationReport> {
    let structural = match validate_plan_json(plan_json) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let plan: FeaturePlan = match serde_json::from_value(plan_json.clone()) {
        Ok(plan) => plan,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error("invalid_plan_json", "/", err.to_string()));
            return Err(report);
        }
    };

    let semantic = validate_plan_semantics(&plan);
    if !semantic.is_ok() {
        return Err(semantic);
    }

    Ok(ValidatedPlan {
        plan,
        warnings: semantic.warnings,
    })
}

/// Read and validate a plan file.
pub fn load_plan(path: &Path) -> Result<ValidatedPlan> {
    let contents = std::fs::read_to_string(path)?;
    let plan_json: Value = serde_json::from_str(&contents)?;
    validate_plan(&plan_json).map_err(PlanError::Invalid)
}

fn validate_names(plan: &FeaturePlan, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (idx, feature) in plan.features.iter().enumerate() {
        let path = format!("/features/{idx}/name");
        if feature.name.trim().is_empty() {
            report.push(ValidationIssue::error(
                "empty_feature_name",
                path,
                "feature name must not be empty",
            ));
            continue;
        }
        if !seen.insert(feature.name.as_str()) {
            report.push(
                ValidationIssue::error(
                    "duplicate_feature",
                    path,
                    format!("feature '{}' is declared more than once", feature.name),
                )
                .with_hint("feature names identify columns and must be unique"),
            );
        }
    }
}

fn validate_references(plan: &FeaturePlan, report: &mut ValidationReport) {
    let distributions: HashMap<&str, &DistributionConfig> = plan
        .features
        .iter()
        .map(|feature| (feature.name.as_str(), &feature.distribution))
        .collect();

    for (idx, feature) in plan.features.iter().enumerate() {
        for (parameter, source) in feature.distribution.variable_parameters() {
            let path = format!("/features/{idx}/distribution/{parameter}/feature");
            if source == feature.name {
                report.push(ValidationIssue::error(
                    "self_reference",
                    path,
                    format!("feature '{source}' cannot depend on itself"),
                ));
                continue;
            }
            let Some(source_distribution) = distributions.get(source) else {
                report.push(ValidationIssue::error(
                    "unknown_feature",
                    path,
                    format!("parameter '{parameter}' references undeclared feature '{source}'"),
                ));
                continue;
            };
            let Some(table_len) = lookup_len(&feature.distribution, parameter) else {
                continue;
            };
            match category_count(source_distribution) {
                None if matches!(source_distribution, DistributionConfig::Gaussian { .. }) => {
                    report.push(
                        ValidationIssue::error(
                            "lookup_on_continuous_source",
                            path,
                            format!("feature '{source}' is continuous and cannot index a lookup table"),
                        )
                        .with_hint("use the identity conversion for gaussian sources"),
                    );
                }
                Some(categories) if table_len < categories => {
                    report.push(ValidationIssue::warning(
                        "lookup_table_too_short",
                        format!("/features/{idx}/distribution/{parameter}/conversion/lookup"),
                        format!(
                            "feature '{source}' has {categories} categories but the table has {table_len} entries"
                        ),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// Length of the lookup table behind `parameter`, if it uses one.
fn lookup_len(distribution: &DistributionConfig, parameter: &str) -> Option<usize> {
    fn table_len<T>(config: &ParameterConfig<T>) -> Option<usize> {
        match config {
            ParameterConfig::Variable(variable) => match &variable.conversion {
                ConversionConfig::Lookup(table) => Some(table.len()),
                ConversionConfig::Identity => None,
            },
            ParameterConfig::Fixed(_) => None,
        }
    }
    match (distribution, parameter) {
        (DistributionConfig::Bernoulli { p }, "p") => table_len(p),
        (DistributionConfig::Categorial { probabilities }, "probabilities") => table_len(probabilities),
        (DistributionConfig::Gaussian { mean, .. }, "mean") => table_len(mean),
        (DistributionConfig::Gaussian { sigma, .. }, "sigma") => table_len(sigma),
        _ => None,
    }
}

/// Number of category indices a discrete source can produce, when known.
fn category_count(distribution: &DistributionConfig) -> Option<usize> {
    match distribution {
        DistributionConfig::Bernoulli { .. } => Some(2),
        DistributionConfig::Categorial {
            probabilities: ParameterConfig::Fixed(values),
        } => Some(values.len()),
        DistributionConfig::Dummy => Some(1),
        _ => None,
    }
}

fn validate_domains(plan: &FeaturePlan, report: &mut ValidationReport) {
    for (idx, feature) in plan.features.iter().enumerate() {
        let base_path = format!("/features/{idx}/distribution");
        match &feature.distribution {
            DistributionConfig::Bernoulli { p } => {
                check_parameter(p, &format!("{base_path}/p"), report, |value| {
                    validate_probability("p", *value)
                });
            }
            DistributionConfig::Categorial { probabilities } => {
                let path = format!("{base_path}/probabilities");
                if let ParameterConfig::Variable(variable) = probabilities
                    && matches!(variable.conversion, ConversionConfig::Identity)
                {
                    report.push(
                        ValidationIssue::error(
                            "unsupported_conversion",
                            format!("{path}/conversion"),
                            "a probability vector cannot be read directly from a feature value",
                        )
                        .with_hint("use a lookup table indexed by the source category"),
                    );
                }
                check_parameter(probabilities, &path, report, |values| {
                    validate_probabilities("probabilities", values)
                });
                if let ParameterConfig::Fixed(values) = probabilities {
                    let total: f64 = values.iter().sum();
                    if !values.is_empty() && (total - 1.0).abs() > 1e-6 {
                        report.push(ValidationIssue::warning(
                            "probabilities_not_normalized",
                            path,
                            format!("probabilities sum to {total}, not 1"),
                        ));
                    }
                }
            }
            DistributionConfig::Gaussian { mean, sigma } => {
                check_parameter(mean, &format!("{base_path}/mean"), report, |value| {
                    validate_finite("mean", *value)
                });
                check_parameter(sigma, &format!("{base_path}/sigma"), report, |value| {
                    validate_positive("sigma", *value)
                });
            }
            DistributionConfig::Dummy => {}
        }
    }
}

/// Fixed values and every lookup entry must satisfy the parameter's domain.
fn check_parameter<T>(
    parameter: &ParameterConfig<T>,
    path: &str,
    report: &mut ValidationReport,
    check: impl Fn(&T) -> datagen_core::Result<()>,
) {
    match parameter {
        ParameterConfig::Fixed(value) => {
            if let Err(err) = check(value) {
                report.push(ValidationIssue::error(
                    "parameter_out_of_domain",
                    path,
                    err.to_string(),
                ));
            }
        }
        ParameterConfig::Variable(variable) => {
            if let ConversionConfig::Lookup(table) = &variable.conversion {
                for (entry_idx, entry) in table.iter().enumerate() {
                    if let Err(err) = check(entry) {
                        report.push(ValidationIssue::error(
                            "parameter_out_of_domain",
                            format!("{path}/conversion/lookup/{entry_idx}"),
                            err.to_string(),
                        ));
                    }
                }
            }
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn plan(features: Value) -> FeaturePlan {
        serde_json::from_value(json!({ "plan_version": "0.1", "features": features }))
            .expect("plan parses")
    }

    #[test]
    fn accepts_dependent_gaussian() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "bernoulli", "p": 0.5 } },
            { "name": "B", "distribution": { "type": "gaussian", "mean": { "feature": "A" }, "sigma": 1.0 } }
        ])));
        assert!(report.is_ok(), "{report}");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn reports_duplicate_and_empty_names() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "dummy" } },
            { "name": "A", "distribution": { "type": "dummy" } },
            { "name": " ", "distribution": { "type": "dummy" } }
        ])));
        assert!(report.has_code("duplicate_feature"));
        assert!(report.has_code("empty_feature_name"));
    }

    #[test]
    fn reports_unknown_and_self_references() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "gaussian", "mean": { "feature": "A" }, "sigma": 1.0 } },
            { "name": "B", "distribution": { "type": "bernoulli", "p": { "feature": "missing" } } }
        ])));
        assert!(report.has_code("self_reference"));
        assert!(report.has_code("unknown_feature"));
    }

    #[test]
    fn reports_cycles_between_features() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "gaussian", "mean": { "feature": "B" }, "sigma": 1.0 } },
            { "name": "B", "distribution": { "type": "gaussian", "mean": { "feature": "A" }, "sigma": 1.0 } }
        ])));
        assert!(report.has_code("circular_dependency"));
    }

    #[test]
    fn reports_out_of_domain_parameters() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "bernoulli", "p": 1.5 } },
            { "name": "B", "distribution": { "type": "gaussian", "mean": 0.0, "sigma": -1.0 } },
            { "name": "C", "distribution": { "type": "categorial", "probabilities": {
                "feature": "A", "conversion": { "lookup": [[0.5, 0.5], [2.0]] } } } }
        ])));
        let paths: Vec<&str> = report
            .errors
            .iter()
            .filter(|issue| issue.code == "parameter_out_of_domain")
            .map(|issue| issue.path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/features/0/distribution/p",
                "/features/1/distribution/sigma",
                "/features/2/distribution/probabilities/conversion/lookup/1",
            ]
        );
    }

    #[test]
    fn categorial_needs_lookup_conversion() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "bernoulli", "p": 0.5 } },
            { "name": "C", "distribution": { "type": "categorial", "probabilities": { "feature": "A" } } }
        ])));
        assert!(report.has_code("unsupported_conversion"));
    }

    #[test]
    fn warns_on_unnormalized_probabilities() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "categorial", "probabilities": [0.5, 0.2] } }
        ])));
        assert!(report.is_ok());
        assert!(report.has_code("probabilities_not_normalized"));
    }

    #[test]
    fn lookup_needs_a_discrete_source() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "gaussian", "mean": 0.0, "sigma": 1.0 } },
            { "name": "B", "distribution": { "type": "bernoulli", "p": {
                "feature": "A", "conversion": { "lookup": [0.1, 0.9] } } } }
        ])));
        assert!(report.has_code("lookup_on_continuous_source"));
        assert!(!report.is_ok());
    }

    #[test]
    fn warns_when_lookup_table_misses_categories() {
        let report = validate_plan_semantics(&plan(json!([
            { "name": "A", "distribution": { "type": "categorial", "probabilities": [0.2, 0.3, 0.5] } },
            { "name": "B", "distribution": { "type": "bernoulli", "p": {
                "feature": "A", "conversion": { "lookup": [0.1, 0.9] } } } }
        ])));
        assert!(report.is_ok(), "{report}");
        assert!(report.has_code("lookup_table_too_short"));
    }

    #[test]
    fn structural_validation_rejects_unknown_distribution() {
        let report = validate_plan_json(&json!({
            "plan_version": "0.1",
            "features": [ { "name": "A", "distribution": { "type": "poisson", "lambda": 1.0 } } ]
        }))
        .expect("schema compiles");
        assert!(!report.is_ok());
        assert!(report.has_code("schema_violation"));
    }
}
