use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::SizingError;
use crate::model::{SourceSeries, VOLUME};

/// One source's taxonomy: canonical category -> source-native labels.
///
/// A category absent from the table is not covered by the source. Label
/// lists are non-empty (checked by config validation) and summed in order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CategoryMapping(BTreeMap<Category, Vec<String>>);

impl CategoryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: Category, labels: &[&str]) -> Self {
        self.0
            .insert(category, labels.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn labels(&self, category: Category) -> Option<&[String]> {
        self.0.get(&category).map(Vec::as_slice)
    }

    pub fn covers(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0.iter().map(|(c, l)| (*c, l.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Volume attributed to `category` by `series`.
///
/// `Ok(None)` when the mapping does not cover the category. A mapped label
/// missing from the series is a [`SizingError::MappingMismatch`].
pub fn resolve(
    category: Category,
    series: &SourceSeries,
    mapping: &CategoryMapping,
) -> Result<Option<f64>, SizingError> {
    resolve_field(category, series, mapping, VOLUME)
}

/// [`resolve`] over a named numeric column (e.g. `Prop H1`).
pub fn resolve_field(
    category: Category,
    series: &SourceSeries,
    mapping: &CategoryMapping,
    field: &str,
) -> Result<Option<f64>, SizingError> {
    match mapping.labels(category) {
        None => Ok(None),
        Some(labels) => sum_labels(category.as_str(), series, labels, field).map(Some),
    }
}

/// Sum `field` over `labels`, failing on the first absent label. `owner`
/// names what the labels were mapped for, for error context.
pub(crate) fn sum_labels(
    owner: &str,
    series: &SourceSeries,
    labels: &[String],
    field: &str,
) -> Result<f64, SizingError> {
    let mut total = 0.0;
    for label in labels {
        let row = series
            .row(label)
            .ok_or_else(|| SizingError::MappingMismatch {
                dataset: series.dataset.clone(),
                year: series.year,
                category: owner.to_string(),
                label: label.clone(),
            })?;
        let value = row
            .get(field)
            .copied()
            .ok_or_else(|| SizingError::MissingField {
                dataset: series.dataset.clone(),
                year: series.year,
                label: label.clone(),
                field: field.to_string(),
            })?;
        total += value;
    }
    Ok(total)
}
