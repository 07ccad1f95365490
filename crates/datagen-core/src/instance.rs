use serde::{Deserialize, Serialize};

use crate::value::FeatureValue;

/// One generated row: a value per feature in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    id: u64,
    values: Vec<FeatureValue>,
}

impl Instance {
    pub fn new(id: u64, values: Vec<FeatureValue>) -> Self {
        Self { id, values }
    }

    /// 0-based sequence number within the generation run.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self, index: usize) -> Option<&FeatureValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureValue> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a Instance {
    type Item = &'a FeatureValue;
    type IntoIter = std::slice::Iter<'a, FeatureValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
