use std::collections::BTreeMap;

use crate::config::FiscalConfig;
use crate::error::SizingError;
use crate::fiscal::{HalfYearShares, HalfYearTable, VintagePlan};

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyVolume {
    pub category: String,
    pub year: u16,
    /// 1..=12
    pub month: u8,
    pub volume: f64,
}

/// Volume of one category in each half of one calendar year.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfYearVolumes {
    pub category: String,
    pub year: u16,
    pub h1: f64,
    pub h2: f64,
}

/// Sum monthly rows into halves: January-June is H1, July-December H2.
pub fn from_monthly(rows: &[MonthlyVolume]) -> Vec<HalfYearVolumes> {
    let mut acc: BTreeMap<(String, u16), (f64, f64)> = BTreeMap::new();
    for r in rows {
        let halves = acc.entry((r.category.clone(), r.year)).or_default();
        if r.month <= 6 {
            halves.0 += r.volume;
        } else {
            halves.1 += r.volume;
        }
    }
    acc.into_iter()
        .map(|((category, year), (h1, h2))| HalfYearVolumes {
            category,
            year,
            h1,
            h2,
        })
        .collect()
}

/// Shares of the annual total falling in each half; zero when nothing sold.
pub fn half_year_split(h1: f64, h2: f64) -> HalfYearShares {
    let total = h1 + h2;
    if total == 0.0 {
        return HalfYearShares { h1: 0.0, h2: 0.0 };
    }
    HalfYearShares {
        h1: h1 / total,
        h2: h2 / total,
    }
}

/// Split of a single year.
pub fn latest_shares(rows: &[HalfYearVolumes], year: u16) -> HalfYearTable {
    let mut table = HalfYearTable::new();
    for r in rows.iter().filter(|r| r.year == year) {
        table.insert(r.category.clone(), half_year_split(r.h1, r.h2));
    }
    table
}

/// Split of the per-year volumes averaged over `years`. Each category is
/// averaged over the base years it has data for.
pub fn base_shares(rows: &[HalfYearVolumes], years: &[u16]) -> HalfYearTable {
    let mut acc: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
    for r in rows.iter().filter(|r| years.contains(&r.year)) {
        let e = acc.entry(r.category.as_str()).or_default();
        e.0 += r.h1;
        e.1 += r.h2;
        e.2 += 1;
    }
    let mut table = HalfYearTable::new();
    for (category, (h1, h2, n)) in acc {
        let n = n as f64;
        table.insert(category, half_year_split(h1 / n, h2 / n));
    }
    table
}

impl HalfYearTable {
    /// Add the categories of `other` this table lacks.
    pub fn merge_missing(mut self, other: HalfYearTable) -> Self {
        for (category, shares) in other.0 {
            self.0.entry(category).or_insert(shares);
        }
        self
    }

    /// Re-key labels onto the forecast taxonomy. One label may stand for
    /// several categories; unlisted labels keep their name.
    pub fn rename(self, renames: &BTreeMap<String, Vec<String>>) -> Self {
        let mut out = HalfYearTable::new();
        for (label, shares) in self.0 {
            match renames.get(&label) {
                Some(targets) => {
                    for t in targets {
                        out.0.entry(t.clone()).or_insert(shares);
                    }
                }
                None => {
                    out.0.entry(label).or_insert(shares);
                }
            }
        }
        out
    }
}

/// Base and latest tables merged across the configured sources in priority
/// order, with the per-year vintage choice from `config`.
pub fn build_vintage_plan(
    config: &FiscalConfig,
    sources: &BTreeMap<String, Vec<HalfYearVolumes>>,
) -> Result<VintagePlan, SizingError> {
    let mut base = HalfYearTable::new();
    let mut latest = HalfYearTable::new();

    for source in &config.sources {
        let rows = sources
            .get(&source.name)
            .ok_or_else(|| SizingError::MissingSource(source.name.clone()))?;

        let years = source.base_years.as_deref().unwrap_or(&config.base_years);
        let source_base = base_shares(rows, years).rename(&source.renames);
        log::debug!(
            "half-year source '{}': {} base categories",
            source.name,
            source_base.len()
        );
        base = base.merge_missing(source_base);

        if let Some(year) = config.latest_year {
            latest = latest.merge_missing(latest_shares(rows, year).rename(&source.renames));
        }
    }

    log::info!(
        "half-year proportions: {} base, {} latest categories",
        base.len(),
        latest.len()
    );

    Ok(VintagePlan {
        base,
        latest,
        default: config.default_vintage,
        overrides: config.vintage_overrides()?,
    })
}
