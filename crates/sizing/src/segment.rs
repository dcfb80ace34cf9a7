use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::SegmentConfig;
use crate::error::SizingError;
use crate::model::{YearRow, YearTable};

/// Segment key for rows without an alcohol-strength index.
pub const BLANK: &str = "blank";

// ---------------------------------------------------------------------------
// Price bands
// ---------------------------------------------------------------------------

/// `(previous upper, upper]`; `upper = None` only on the last band.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceBand {
    pub name: String,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl PriceBand {
    fn new(name: &str, upper: Option<f64>) -> Self {
        Self {
            name: name.into(),
            upper,
        }
    }

    pub fn defaults() -> Vec<PriceBand> {
        vec![
            Self::new("Low Price", Some(100.0)),
            Self::new("Value", Some(150.0)),
            Self::new("Accessible Premium", Some(200.0)),
            Self::new("Premium", Some(300.0)),
            Self::new("Super Premium", Some(400.0)),
            Self::new("Ultra Premium", None),
        ]
    }
}

/// Band containing `price`. Non-positive and non-finite prices have none.
pub fn classify(bands: &[PriceBand], price: f64) -> Option<&str> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    bands
        .iter()
        .find(|b| b.upper.map_or(true, |u| price <= u))
        .map(|b| b.name.as_str())
}

// ---------------------------------------------------------------------------
// Panel rows -> raw segment volumes
// ---------------------------------------------------------------------------

/// One retail-panel line after filtering and group renames.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub group: String,
    pub index: Option<String>,
    pub price: f64,
    pub quantity: f64,
    pub volume: f64,
}

impl PanelRow {
    /// Price per unit, scaled to the banded pack size. `None` without sales.
    pub fn unit_price(&self, pack_size_factor: f64) -> Option<f64> {
        if self.quantity == 0.0 || !self.quantity.is_finite() {
            return None;
        }
        Some(self.price / self.quantity * pack_size_factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentBy {
    PriceBand,
    AlcoholIndex,
}

impl SegmentBy {
    /// Output column name for the segment key.
    pub fn column(&self) -> &'static str {
        match self {
            Self::PriceBand => "Price Band",
            Self::AlcoholIndex => "Alcohol Index",
        }
    }
}

/// Raw volume per group and segment, segments in presentation order.
pub type RawSegments = BTreeMap<String, Vec<(String, f64)>>;

pub fn segment_volumes(rows: &[PanelRow], by: SegmentBy, config: &SegmentConfig) -> RawSegments {
    let mut acc: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in rows {
        let key = match by {
            SegmentBy::AlcoholIndex => match row.index.as_deref().map(str::trim) {
                Some(idx) if !idx.is_empty() => idx.to_string(),
                _ => BLANK.to_string(),
            },
            SegmentBy::PriceBand => {
                let band = row
                    .unit_price(config.pack_size_factor)
                    .and_then(|p| classify(&config.price_bands, p));
                match band {
                    Some(b) => b.to_string(),
                    None => {
                        skipped += 1;
                        continue;
                    }
                }
            }
        };
        *acc.entry(row.group.clone())
            .or_default()
            .entry(key)
            .or_insert(0.0) += row.volume;
    }

    if skipped > 0 {
        log::debug!("{skipped} panel rows without a classifiable price skipped");
    }

    acc.into_iter()
        .map(|(group, segs)| {
            let mut ordered: Vec<(String, f64)> = segs.into_iter().collect();
            if by == SegmentBy::PriceBand {
                let position = |name: &str| {
                    config
                        .price_bands
                        .iter()
                        .position(|b| b.name == name)
                        .unwrap_or(usize::MAX)
                };
                ordered.sort_by_key(|(name, _)| position(name));
            }
            (group, ordered)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Normalize + Apportion
// ---------------------------------------------------------------------------

/// Shares of one category across a partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProportionRow(Vec<(String, f64)>);

impl ProportionRow {
    pub fn shares(&self) -> &[(String, f64)] {
        &self.0
    }

    pub fn get(&self, segment: &str) -> Option<f64> {
        self.0.iter().find(|(s, _)| s == segment).map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.0.iter().map(|(_, v)| v).sum()
    }
}

/// Divide each raw volume by the total of the non-excluded segments.
///
/// Excluded segments stay in the row with share 0. When the counted total
/// is 0 every share is 0.
pub fn normalize(raw: &[(String, f64)], exclude: &[String]) -> ProportionRow {
    let excluded = |key: &str| exclude.iter().any(|e| e == key);
    let total: f64 = raw
        .iter()
        .filter(|(k, _)| !excluded(k))
        .map(|(_, v)| v)
        .sum();
    ProportionRow(
        raw.iter()
            .map(|(k, v)| {
                let share = if excluded(k) || total == 0.0 { 0.0 } else { v / total };
                (k.clone(), share)
            })
            .collect(),
    )
}

/// Split `total` across the row's segments.
pub fn apportion(total: f64, row: &ProportionRow) -> Vec<(String, f64)> {
    row.0.iter().map(|(k, s)| (k.clone(), total * s)).collect()
}

/// Normalized shares for every group of `raw`.
pub fn segment_shares(raw: &RawSegments, exclude: &[String]) -> BTreeMap<String, ProportionRow> {
    raw.iter()
        .map(|(group, segs)| (group.clone(), normalize(segs, exclude)))
        .collect()
}

/// Expand each category row of `totals` into one row per segment.
///
/// The segment key is appended as a new key column named `segment_column`.
pub fn apportion_table(
    totals: &YearTable,
    shares: &BTreeMap<String, ProportionRow>,
    segment_column: &str,
) -> Result<YearTable, SizingError> {
    let mut key_columns = totals.key_columns.clone();
    key_columns.push(segment_column.to_string());

    let mut rows = Vec::new();
    for row in &totals.rows {
        let category = totals.category(row);
        let proportions = shares
            .get(category)
            .ok_or_else(|| SizingError::MissingProportion {
                category: category.to_string(),
                year: None,
            })?;

        let per_year: Vec<Vec<(String, f64)>> = row
            .values
            .iter()
            .map(|&total| apportion(total, proportions))
            .collect();

        for (i, (segment, _)) in proportions.shares().iter().enumerate() {
            let mut keys = row.keys.clone();
            keys.push(segment.clone());
            rows.push(YearRow {
                keys,
                values: per_year.iter().map(|split| split[i].1).collect(),
            });
        }
    }

    Ok(YearTable {
        key_columns,
        category_key: totals.category_key,
        years: totals.years.clone(),
        rows,
    })
}
