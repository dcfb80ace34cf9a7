use std::collections::BTreeMap;

use serde::Serialize;

use crate::category::Category;
use crate::error::SizingError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Default numeric column of a series.
pub const VOLUME: &str = "Volume";

/// One dataset for one year: source-native label -> named numeric columns.
///
/// Every label carries a `Volume` value; loaders may keep extra numeric
/// columns (`Prop H1`, `Sales`, ...) for field-based lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSeries {
    pub dataset: String,
    pub year: u16,
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl SourceSeries {
    pub fn new(dataset: impl Into<String>, year: u16) -> Self {
        Self {
            dataset: dataset.into(),
            year,
            rows: BTreeMap::new(),
        }
    }

    /// Build a volume-only series.
    pub fn from_volumes<I, S>(dataset: impl Into<String>, year: u16, volumes: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut series = Self::new(dataset, year);
        for (label, volume) in volumes {
            series.insert(label, VOLUME, volume);
        }
        series
    }

    /// Set one value. Used while a loader assembles the series.
    pub fn insert(&mut self, label: impl Into<String>, field: impl Into<String>, value: f64) {
        self.rows
            .entry(label.into())
            .or_default()
            .insert(field.into(), value);
    }

    pub fn row(&self, label: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(label)
    }

    pub fn volume(&self, label: &str) -> Option<f64> {
        self.rows.get(label).and_then(|r| r.get(VOLUME)).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.rows.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Analysis years for one run. `prior` is the benchmark period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunYears {
    pub current: u16,
    pub prior: u16,
}

impl RunYears {
    pub fn new(current: u16, prior: u16) -> Result<Self, SizingError> {
        if prior >= current {
            return Err(SizingError::InvalidYear(format!(
                "last year {prior} must precede current year {current}"
            )));
        }
        Ok(Self { current, prior })
    }

    /// Parse two four-digit year strings.
    pub fn parse(current: &str, prior: &str) -> Result<Self, SizingError> {
        Self::new(parse_year(current)?, parse_year(prior)?)
    }
}

pub fn parse_year(s: &str) -> Result<u16, SizingError> {
    let s = s.trim();
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SizingError::InvalidYear(format!("expected a four-digit year, got '{s}'")));
    }
    s.parse()
        .map_err(|_| SizingError::InvalidYear(format!("expected a four-digit year, got '{s}'")))
}

/// All series loaded for a run, keyed by (dataset, year).
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: BTreeMap<(String, u16), SourceSeries>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: SourceSeries) {
        self.series
            .insert((series.dataset.clone(), series.year), series);
    }

    pub fn get(&self, dataset: &str, year: u16) -> Result<&SourceSeries, SizingError> {
        self.series
            .get(&(dataset.to_string(), year))
            .ok_or_else(|| SizingError::MissingDataset {
                dataset: dataset.into(),
                year,
            })
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl FromIterator<SourceSeries> for SeriesSet {
    fn from_iter<T: IntoIterator<Item = SourceSeries>>(iter: T) -> Self {
        let mut set = Self::new();
        for s in iter {
            set.insert(s);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Estimate table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Pass-through figure (e.g. "Income CY"); never averaged.
    Reference,
    /// One source's market estimate.
    Estimate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Option<f64>>,
}

/// Per-category, per-source estimates. `None` = source does not cover it.
///
/// Grown one column at a time; each step consumes the table and returns
/// the extended one.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateTable {
    categories: Vec<Category>,
    columns: Vec<EstimateColumn>,
}

impl EstimateTable {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            columns: Vec::new(),
        }
    }

    /// Append a column computed per category, in row order.
    pub fn with_column<F, E>(mut self, name: &str, kind: ColumnKind, mut cell: F) -> Result<Self, E>
    where
        F: FnMut(Category) -> Result<Option<f64>, E>,
    {
        let values = self
            .categories
            .iter()
            .map(|&c| cell(c))
            .collect::<Result<Vec<_>, E>>()?;
        self.columns.push(EstimateColumn {
            name: name.to_string(),
            kind,
            values,
        });
        Ok(self)
    }

    /// Replace one cell of an existing column.
    pub fn with_cell(mut self, column: &str, category: Category, value: Option<f64>) -> Self {
        let row = self.categories.iter().position(|&c| c == category);
        let col = self.columns.iter_mut().find(|c| c.name == column);
        if let (Some(row), Some(col)) = (row, col) {
            col.values[row] = value;
        }
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn columns(&self) -> &[EstimateColumn] {
        &self.columns
    }

    pub fn column_names(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn value(&self, column: &str, category: Category) -> Option<f64> {
        let row = self.categories.iter().position(|&c| c == category)?;
        self.columns
            .iter()
            .find(|c| c.name == column)
            .and_then(|c| c.values[row])
    }

    /// One row's cells for columns of `kind`, in column order.
    pub fn row(&self, index: usize, kind: ColumnKind) -> Vec<Option<f64>> {
        self.columns
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.values[index])
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Estimate result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EstimateRow {
    pub category: Category,
    pub references: Vec<Option<f64>>,
    pub estimates: Vec<Option<f64>>,
    pub avg_estimate: Option<f64>,
    /// Estimate column dropped as the furthest from the mean.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discarded: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub categories: usize,
    pub estimated: usize,
    pub without_estimate: Vec<Category>,
    pub cells_per_column: BTreeMap<String, usize>,
    pub discarded_per_column: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub current_year: u16,
    pub last_year: u16,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateResult {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub reference_columns: Vec<String>,
    pub estimate_columns: Vec<String>,
    pub rows: Vec<EstimateRow>,
}

impl EstimateResult {
    pub fn row(&self, category: Category) -> Option<&EstimateRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    /// Cell lookup by column name across references, estimates and the average.
    pub fn value(&self, category: Category, column: &str) -> Option<f64> {
        let row = self.row(category)?;
        if column == AVG_ESTIMATE {
            return row.avg_estimate;
        }
        if let Some(i) = self.estimate_columns.iter().position(|c| c == column) {
            return row.estimates[i];
        }
        let i = self.reference_columns.iter().position(|c| c == column)?;
        row.references[i]
    }
}

/// Name of the robust-average column in outputs.
pub const AVG_ESTIMATE: &str = "Avg Estimate";

// ---------------------------------------------------------------------------
// Year tables (forecasts, segment splits, fiscal years)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRow {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

/// Rows of key columns followed by one numeric column per year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTable {
    pub key_columns: Vec<String>,
    /// Index into `key_columns` of the category used for proportion lookups.
    pub category_key: usize,
    pub years: Vec<u16>,
    pub rows: Vec<YearRow>,
}

impl YearTable {
    pub fn category<'a>(&self, row: &'a YearRow) -> &'a str {
        &row.keys[self.category_key]
    }

    /// Value for the first row whose keys equal `keys`.
    pub fn value(&self, keys: &[&str], year: u16) -> Option<f64> {
        let col = self.years.iter().position(|&y| y == year)?;
        self.rows
            .iter()
            .find(|r| r.keys.iter().map(String::as_str).eq(keys.iter().copied()))
            .map(|r| r.values[col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_years_require_order() {
        assert!(RunYears::parse("2020", "2019").is_ok());
        assert!(RunYears::parse("2019", "2019").is_err());
        assert!(RunYears::parse("2019", "2020").is_err());
    }

    #[test]
    fn run_years_require_four_digits() {
        let err = RunYears::parse("20", "2019").unwrap_err();
        assert!(err.to_string().contains("four-digit"));
        assert!(RunYears::parse("2020", "19x9").is_err());
    }

    #[test]
    fn series_set_reports_missing_dataset() {
        let set: SeriesSet = [SourceSeries::from_volumes("iwsr", 2019, [("Beer", 1.0)])]
            .into_iter()
            .collect();
        assert!(set.get("iwsr", 2019).is_ok());
        let err = set.get("iwsr", 2020).unwrap_err();
        assert!(err.to_string().contains("'iwsr' (2020)"));
    }

    #[test]
    fn table_grows_column_by_column() {
        let table = EstimateTable::new(vec![Category::Gin, Category::Beer])
            .with_column("A", ColumnKind::Estimate, |c| {
                Ok::<_, SizingError>(if c == Category::Gin { Some(1.0) } else { None })
            })
            .unwrap()
            .with_column("Ref", ColumnKind::Reference, |_| Ok::<_, SizingError>(Some(9.0)))
            .unwrap();
        assert_eq!(table.value("A", Category::Gin), Some(1.0));
        assert_eq!(table.value("A", Category::Beer), None);
        assert_eq!(table.row(0, ColumnKind::Estimate), vec![Some(1.0)]);
        assert_eq!(table.column_names(ColumnKind::Reference), vec!["Ref".to_string()]);

        let table = table.with_cell("A", Category::Beer, Some(2.0));
        assert_eq!(table.value("A", Category::Beer), Some(2.0));
    }

    #[test]
    fn column_error_propagates() {
        let res = EstimateTable::new(vec![Category::Gin]).with_column("A", ColumnKind::Estimate, |c| {
            Err(SizingError::UnknownCategory(c.to_string()))
        });
        assert!(res.is_err());
    }
}
