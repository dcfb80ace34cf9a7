use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SizingError;
use crate::model::{YearRow, YearTable};

/// Which half-year proportion table applies to a calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vintage {
    /// Averaged over several base years.
    Base,
    /// Taken from the single most recent year.
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HalfYearShares {
    pub h1: f64,
    pub h2: f64,
}

/// Half-year shares per category label.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HalfYearTable(pub(crate) BTreeMap<String, HalfYearShares>);

impl HalfYearTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, shares: HalfYearShares) {
        self.0.insert(category.into(), shares);
    }

    pub fn get(&self, category: &str) -> Option<HalfYearShares> {
        self.0.get(category).copied()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Supplies H1/H2 shares for a category in a given calendar year.
pub trait ProportionSource {
    fn shares(&self, category: &str, year: u16) -> Option<HalfYearShares>;
}

/// One table for every year.
impl ProportionSource for HalfYearTable {
    fn shares(&self, category: &str, _year: u16) -> Option<HalfYearShares> {
        self.get(category)
    }
}

/// Base and latest tables with a per-year choice between them.
#[derive(Debug, Clone)]
pub struct VintagePlan {
    pub base: HalfYearTable,
    pub latest: HalfYearTable,
    pub default: Vintage,
    pub overrides: BTreeMap<u16, Vintage>,
}

impl VintagePlan {
    pub fn vintage_for(&self, year: u16) -> Vintage {
        self.overrides.get(&year).copied().unwrap_or(self.default)
    }
}

impl ProportionSource for VintagePlan {
    fn shares(&self, category: &str, year: u16) -> Option<HalfYearShares> {
        match self.vintage_for(year) {
            Vintage::Base => self.base.get(category),
            Vintage::Latest => self.latest.get(category),
        }
    }
}

/// Calendar-year totals to fiscal years ending in H1 of the calendar year:
///
/// ```text
/// fiscal[Y] = cal[Y-1] * H2(Y-1) + cal[Y] * H1(Y)
/// ```
///
/// Only years whose predecessor is present produce a fiscal value.
pub fn to_fiscal_year<P: ProportionSource + ?Sized>(
    calendar: &BTreeMap<u16, f64>,
    category: &str,
    source: &P,
) -> Result<BTreeMap<u16, f64>, SizingError> {
    let lookup = |year: u16| {
        source
            .shares(category, year)
            .ok_or_else(|| SizingError::MissingProportion {
                category: category.to_string(),
                year: Some(year),
            })
    };

    let mut fiscal = BTreeMap::new();
    for (&year, &current) in calendar {
        let Some(prev_year) = year.checked_sub(1) else {
            continue;
        };
        let Some(&previous) = calendar.get(&prev_year) else {
            continue;
        };
        let value = previous * lookup(prev_year)?.h2 + current * lookup(year)?.h1;
        fiscal.insert(year, value);
    }
    Ok(fiscal)
}

/// [`to_fiscal_year`] for every row of a category x year table.
pub fn convert_table<P: ProportionSource + ?Sized>(
    table: &YearTable,
    source: &P,
) -> Result<YearTable, SizingError> {
    let fiscal_years: Vec<u16> = table
        .years
        .iter()
        .copied()
        .filter(|&y| y > 0 && table.years.contains(&(y - 1)))
        .collect();

    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let calendar: BTreeMap<u16, f64> = table
            .years
            .iter()
            .copied()
            .zip(row.values.iter().copied())
            .collect();
        let fiscal = to_fiscal_year(&calendar, table.category(row), source)?;
        rows.push(YearRow {
            keys: row.keys.clone(),
            values: fiscal_years
                .iter()
                .map(|y| fiscal.get(y).copied().unwrap_or_default())
                .collect(),
        });
    }

    log::info!(
        "converted {} rows to {} fiscal years",
        rows.len(),
        fiscal_years.len()
    );

    Ok(YearTable {
        key_columns: table.key_columns.clone(),
        category_key: table.category_key,
        years: fiscal_years,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, f64, f64)]) -> HalfYearTable {
        let mut t = HalfYearTable::new();
        for (c, h1, h2) in pairs {
            t.insert(*c, HalfYearShares { h1: *h1, h2: *h2 });
        }
        t
    }

    #[test]
    fn second_half_plus_first_half() {
        let cal = BTreeMap::from([(2019, 1000.0), (2020, 1200.0)]);
        let fy = to_fiscal_year(&cal, "X", &table(&[("X", 0.4, 0.6)])).unwrap();
        assert_eq!(fy.len(), 1);
        assert!((fy[&2020] - 1080.0).abs() < 1e-9);
    }

    #[test]
    fn first_year_has_no_fiscal_value() {
        let cal = BTreeMap::from([(2019, 1.0), (2021, 1.0)]);
        let fy = to_fiscal_year(&cal, "X", &table(&[("X", 0.5, 0.5)])).unwrap();
        assert!(fy.is_empty());
    }

    #[test]
    fn missing_category_names_year() {
        let cal = BTreeMap::from([(2019, 1.0), (2020, 1.0)]);
        let err = to_fiscal_year(&cal, "Rum", &table(&[("X", 0.5, 0.5)])).unwrap_err();
        assert_eq!(err.to_string(), "no proportions for category 'Rum' (2019)");
    }

    #[test]
    fn plan_switches_vintage_per_year() {
        let plan = VintagePlan {
            base: table(&[("Beer", 0.4, 0.6)]),
            latest: table(&[("Beer", 0.3, 0.7)]),
            default: Vintage::Base,
            overrides: BTreeMap::from([(2020, Vintage::Latest)]),
        };
        assert_eq!(plan.vintage_for(2019), Vintage::Base);
        assert_eq!(plan.vintage_for(2020), Vintage::Latest);

        let cal = BTreeMap::from([(2019, 1000.0), (2020, 1200.0), (2021, 1300.0)]);
        let fy = to_fiscal_year(&cal, "Beer", &plan).unwrap();
        // 1000*0.6 + 1200*0.3
        assert!((fy[&2020] - 960.0).abs() < 1e-9);
        // 1200*0.7 + 1300*0.4
        assert!((fy[&2021] - 1360.0).abs() < 1e-9);
    }

    #[test]
    fn table_conversion_drops_first_year() {
        let cal = YearTable {
            key_columns: vec!["Category".into(), "Price Band".into()],
            category_key: 0,
            years: vec![2019, 2020, 2021],
            rows: vec![YearRow {
                keys: vec!["Gin".into(), "Premium".into()],
                values: vec![500.0, 600.0, 700.0],
            }],
        };
        let out = convert_table(&cal, &table(&[("Gin", 0.5, 0.5)])).unwrap();
        assert_eq!(out.years, vec![2020, 2021]);
        assert_eq!(out.value(&["Gin", "Premium"], 2020), Some(550.0));
        assert_eq!(out.value(&["Gin", "Premium"], 2021), Some(650.0));
    }
}
