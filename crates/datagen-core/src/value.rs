use std::fmt;

use serde::{Deserialize, Serialize};

/// A sampled value for one feature of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FeatureValue {
    /// Category index produced by discrete distributions.
    Discrete(i64),
    Continuous(f64),
}

impl FeatureValue {
    pub fn kind(&self) -> &'static str {
        match self {
            FeatureValue::Discrete(_) => "discrete",
            FeatureValue::Continuous(_) => "continuous",
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            FeatureValue::Discrete(index) => Some(*index),
            FeatureValue::Continuous(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Discrete(index) => *index as f64,
            FeatureValue::Continuous(value) => *value,
        }
    }

    /// String rendering used by export sinks.
    pub fn render(&self) -> String {
        match self {
            FeatureValue::Discrete(index) => index.to_string(),
            FeatureValue::Continuous(value) => render_double(*value),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Shortest round-trip rendering of a double: plain notation with at
/// least one fractional digit inside [1e-3, 1e7), computerized scientific
/// notation (`1.5E-7`) outside of it.
fn render_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{value:?}");
    }

    let rendered = format!("{value:E}");
    match rendered.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{mantissa}.0E{exponent}")
        }
        _ => rendered,
    }
}
