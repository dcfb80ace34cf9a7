use std::collections::BTreeMap;

use crate::model::{EstimateRow, RunSummary};

/// Compute summary statistics from averaged estimate rows.
pub fn compute_summary(rows: &[EstimateRow], estimate_columns: &[String]) -> RunSummary {
    let mut cells_per_column: BTreeMap<String, usize> =
        estimate_columns.iter().map(|c| (c.clone(), 0)).collect();
    let mut discarded_per_column: BTreeMap<String, usize> = BTreeMap::new();
    let mut without_estimate = Vec::new();

    for row in rows {
        for (name, value) in estimate_columns.iter().zip(&row.estimates) {
            if value.is_some() {
                *cells_per_column.entry(name.clone()).or_insert(0) += 1;
            }
        }
        if let Some(d) = &row.discarded {
            *discarded_per_column.entry(d.clone()).or_insert(0) += 1;
        }
        if row.avg_estimate.is_none() {
            without_estimate.push(row.category);
        }
    }

    RunSummary {
        categories: rows.len(),
        estimated: rows.len() - without_estimate.len(),
        without_estimate,
        cells_per_column,
        discarded_per_column,
    }
}
