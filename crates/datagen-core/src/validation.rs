use crate::error::{Result, ValidationError};

/// Feature names identify columns; they must carry at least one visible character.
pub fn validate_feature_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyFeatureName.into());
    }
    Ok(())
}

pub fn validate_instance_count(count: u64) -> Result<()> {
    if count == 0 {
        return Err(ValidationError::NonPositiveInstanceCount.into());
    }
    Ok(())
}

pub fn validate_feature_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(ValidationError::NoFeatures.into());
    }
    Ok(())
}

/// Probabilities must be finite and lie in [0, 1].
pub fn validate_probability(parameter: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(out_of_domain(
            parameter,
            format!("probability {value} not in [0, 1]"),
        ));
    }
    Ok(())
}

/// Categorial probability vectors need at least one entry, each a probability.
///
/// The vector is not required to sum to one.
pub fn validate_probabilities(parameter: &'static str, values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(out_of_domain(parameter, "empty probability vector".to_string()));
    }
    for value in values {
        validate_probability(parameter, *value)?;
    }
    Ok(())
}

pub fn validate_finite(parameter: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(out_of_domain(parameter, format!("{value} is not finite")));
    }
    Ok(())
}

pub fn validate_positive(parameter: &'static str, value: f64) -> Result<()> {
    validate_finite(parameter, value)?;
    if value <= 0.0 {
        return Err(out_of_domain(parameter, format!("{value} must be > 0")));
    }
    Ok(())
}

fn out_of_domain(parameter: &'static str, reason: String) -> crate::error::CoreError {
    ValidationError::ParameterOutOfDomain { parameter, reason }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn rejects_blank_names() {
        assert!(validate_feature_name("height").is_ok());
        assert!(validate_feature_name("   ").is_err());
    }

    #[test]
    fn rejects_zero_instances() {
        assert_eq!(
            validate_instance_count(0),
            Err(CoreError::Validation(ValidationError::NonPositiveInstanceCount))
        );
        assert!(validate_instance_count(1).is_ok());
    }

    #[test]
    fn rejects_empty_feature_set() {
        assert_eq!(
            validate_feature_count(0),
            Err(CoreError::Validation(ValidationError::NoFeatures))
        );
        assert!(validate_feature_count(3).is_ok());
    }

    #[test]
    fn checks_probability_domain() {
        assert!(validate_probability("p", 0.0).is_ok());
        assert!(validate_probability("p", 1.0).is_ok());
        assert!(validate_probability("p", 1.01).is_err());
        assert!(validate_probability("p", f64::NAN).is_err());
        assert!(validate_probabilities("probabilities", &[]).is_err());
        assert!(validate_probabilities("probabilities", &[0.4, 0.6]).is_ok());
    }

    #[test]
    fn checks_positive_values() {
        assert!(validate_positive("sigma", 0.5).is_ok());
        assert!(validate_positive("sigma", 0.0).is_err());
        assert!(validate_positive("sigma", f64::INFINITY).is_err());
    }
}
