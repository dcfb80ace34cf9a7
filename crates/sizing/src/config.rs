use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::category::Category;
use crate::error::SizingError;
use crate::fiscal::Vintage;
use crate::mapping::CategoryMapping;
use crate::model::{parse_year, RunYears};
use crate::ratio::ScaleFactor;
use crate::segment::PriceBand;

/// Built-in configuration with the curated mapping tables.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.sizing.toml");

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    pub name: String,
    /// Rows of the estimate table, in output order.
    pub output_categories: Vec<Category>,
    pub datasets: BTreeMap<String, DatasetConfig>,
    #[serde(default)]
    pub reference_columns: Vec<ReferenceColumn>,
    pub estimates: Vec<EstimateConfig>,
    #[serde(default)]
    pub segments: SegmentConfig,
    #[serde(default)]
    pub fiscal: FiscalConfig,
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default = "default_value_column")]
    pub value_column: String,
    pub mapping: CategoryMapping,
}

fn default_label_column() -> String {
    "Category".into()
}

fn default_value_column() -> String {
    "Volume".into()
}

// ---------------------------------------------------------------------------
// Estimates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateMethod {
    /// Read the dataset's current-year value.
    Direct,
    /// Project the benchmark's prior-year value with the dataset as bridge.
    RatioProjection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimateConfig {
    pub column: String,
    pub method: EstimateMethod,
    pub dataset: String,
    #[serde(default)]
    pub benchmark: Option<String>,
    /// Correction for the bridge dataset's prior-year series.
    #[serde(default)]
    pub baseline_scale: Option<ScaleFactor>,
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

/// Additive correction to one cell: the summed current-year volume of
/// `labels` in `dataset`.
#[derive(Debug, Clone, Deserialize)]
pub struct Adjustment {
    pub category: Category,
    pub dataset: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Current,
    Prior,
}

impl Period {
    pub fn year(&self, years: RunYears) -> u16 {
        match self {
            Self::Current => years.current,
            Self::Prior => years.prior,
        }
    }
}

/// Pass-through column shown next to the estimates, never averaged.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceColumn {
    pub column: String,
    pub dataset: String,
    #[serde(default)]
    pub period: Period,
    /// Numeric column to read instead of the dataset's volume.
    #[serde(default)]
    pub field: Option<String>,
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub values: Vec<String>,
}

/// Rows whose `column` equals `value` belong to `group`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupRule {
    pub column: String,
    pub value: String,
    pub group: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub category_column: String,
    pub index_column: String,
    pub price_column: String,
    pub quantity_column: String,
    pub volume_column: String,
    /// Multiplier turning per-pack price into the banded unit price.
    pub pack_size_factor: f64,
    pub filter: Option<RowFilter>,
    /// Panel label -> category group.
    pub renames: BTreeMap<String, String>,
    /// Checked in order before `category_column`; the first match wins.
    pub group_rules: Vec<GroupRule>,
    pub price_bands: Vec<PriceBand>,
    /// Segments kept out of the normalization denominator.
    pub exclude_keys: Vec<String>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            category_column: "PRODUCTSUBCATEGORY".into(),
            index_column: "ALCOHOLINDEX".into(),
            price_column: "PRICE".into(),
            quantity_column: "SALESQUANTITY".into(),
            volume_column: "SALESVOLUME".into(),
            pack_size_factor: 1.0,
            filter: None,
            renames: BTreeMap::new(),
            group_rules: Vec::new(),
            price_bands: PriceBand::defaults(),
            exclude_keys: vec!["blank".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// Fiscal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProportionSourceConfig {
    pub name: String,
    /// Source label -> forecast categories it stands for.
    #[serde(default)]
    pub renames: BTreeMap<String, Vec<String>>,
    /// Overrides [`FiscalConfig::base_years`] for this source.
    #[serde(default)]
    pub base_years: Option<Vec<u16>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FiscalConfig {
    pub category_column: String,
    pub default_vintage: Vintage,
    /// Calendar year (as a TOML key) -> vintage used for that year's halves.
    pub vintage_by_year: BTreeMap<String, Vintage>,
    pub latest_year: Option<u16>,
    pub base_years: Vec<u16>,
    /// Proportion sources in priority order.
    pub sources: Vec<ProportionSourceConfig>,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            category_column: "Category".into(),
            default_vintage: Vintage::Base,
            vintage_by_year: BTreeMap::new(),
            latest_year: None,
            base_years: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl FiscalConfig {
    pub fn vintage_overrides(&self) -> Result<BTreeMap<u16, Vintage>, SizingError> {
        self.vintage_by_year
            .iter()
            .map(|(k, v)| Ok((parse_year(k)?, *v)))
            .collect()
    }

    fn uses(&self, vintage: Vintage) -> bool {
        self.default_vintage == vintage || self.vintage_by_year.values().any(|v| *v == vintage)
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl SizingConfig {
    pub fn from_toml(input: &str) -> Result<Self, SizingError> {
        let config: SizingConfig =
            toml::from_str(input).map_err(|e| SizingError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Result<Self, SizingError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    pub fn dataset(&self, name: &str) -> Result<&DatasetConfig, SizingError> {
        self.datasets
            .get(name)
            .ok_or_else(|| SizingError::ConfigValidation(format!("unknown dataset '{name}'")))
    }

    pub fn validate(&self) -> Result<(), SizingError> {
        if self.output_categories.is_empty() {
            return Err(SizingError::ConfigValidation(
                "output_categories must not be empty".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for c in &self.output_categories {
            if !seen.insert(*c) {
                return Err(SizingError::ConfigValidation(format!(
                    "category '{c}' listed twice in output_categories"
                )));
            }
        }

        // Mapping lists must be non-empty
        for (name, ds) in &self.datasets {
            for (category, labels) in ds.mapping.iter() {
                if labels.is_empty() {
                    return Err(SizingError::ConfigValidation(format!(
                        "dataset '{name}': empty mapping for '{category}'"
                    )));
                }
            }
        }

        if self.estimates.is_empty() {
            return Err(SizingError::ConfigValidation(
                "at least one estimate is required".into(),
            ));
        }

        // Output column names are unique across references and estimates
        let mut columns = BTreeSet::new();
        let names = self
            .reference_columns
            .iter()
            .map(|r| &r.column)
            .chain(self.estimates.iter().map(|e| &e.column));
        for name in names {
            if !columns.insert(name.as_str()) {
                return Err(SizingError::ConfigValidation(format!(
                    "duplicate column '{name}'"
                )));
            }
        }

        for r in &self.reference_columns {
            self.check_dataset(&r.column, &r.dataset)?;
        }

        for e in &self.estimates {
            self.check_dataset(&e.column, &e.dataset)?;
            match (e.method, &e.benchmark) {
                (EstimateMethod::RatioProjection, None) => {
                    return Err(SizingError::ConfigValidation(format!(
                        "estimate '{}': ratio_projection requires a benchmark",
                        e.column
                    )));
                }
                (EstimateMethod::RatioProjection, Some(b)) => self.check_dataset(&e.column, b)?,
                (EstimateMethod::Direct, Some(_)) => {
                    return Err(SizingError::ConfigValidation(format!(
                        "estimate '{}': benchmark only applies to ratio_projection",
                        e.column
                    )));
                }
                (EstimateMethod::Direct, None) => {}
            }
            if let Some(scale) = &e.baseline_scale {
                if e.method != EstimateMethod::RatioProjection {
                    return Err(SizingError::ConfigValidation(format!(
                        "estimate '{}': baseline_scale only applies to ratio_projection",
                        e.column
                    )));
                }
                let ok = scale.numerator.is_finite()
                    && scale.denominator.is_finite()
                    && scale.numerator > 0.0
                    && scale.denominator > 0.0;
                if !ok {
                    return Err(SizingError::ConfigValidation(format!(
                        "estimate '{}': baseline_scale must be positive and finite",
                        e.column
                    )));
                }
            }
            for adj in &e.adjustments {
                self.check_dataset(&e.column, &adj.dataset)?;
                if adj.labels.is_empty() {
                    return Err(SizingError::ConfigValidation(format!(
                        "estimate '{}': adjustment for '{}' has no labels",
                        e.column, adj.category
                    )));
                }
            }
        }

        self.validate_segments()?;
        self.validate_fiscal()
    }

    fn check_dataset(&self, column: &str, dataset: &str) -> Result<(), SizingError> {
        if self.datasets.contains_key(dataset) {
            Ok(())
        } else {
            Err(SizingError::ConfigValidation(format!(
                "column '{column}': dataset '{dataset}' not found"
            )))
        }
    }

    fn validate_segments(&self) -> Result<(), SizingError> {
        let seg = &self.segments;
        if !(seg.pack_size_factor.is_finite() && seg.pack_size_factor > 0.0) {
            return Err(SizingError::ConfigValidation(
                "segments.pack_size_factor must be positive".into(),
            ));
        }
        let bands = &seg.price_bands;
        if bands.is_empty() {
            return Err(SizingError::ConfigValidation(
                "segments.price_bands must not be empty".into(),
            ));
        }
        let mut lower = 0.0;
        for (i, band) in bands.iter().enumerate() {
            match band.upper {
                Some(upper) if upper > lower => lower = upper,
                Some(upper) => {
                    return Err(SizingError::ConfigValidation(format!(
                        "price band '{}': upper bound {upper} must exceed {lower}",
                        band.name
                    )));
                }
                None if i + 1 == bands.len() => {}
                None => {
                    return Err(SizingError::ConfigValidation(format!(
                        "price band '{}': only the last band may be unbounded",
                        band.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_fiscal(&self) -> Result<(), SizingError> {
        let fiscal = &self.fiscal;
        fiscal
            .vintage_overrides()
            .map_err(|e| SizingError::ConfigValidation(format!("fiscal.vintage_by_year: {e}")))?;
        if fiscal.uses(Vintage::Latest) && fiscal.latest_year.is_none() {
            return Err(SizingError::ConfigValidation(
                "fiscal.latest_year is required when the latest vintage is used".into(),
            ));
        }
        if fiscal.uses(Vintage::Base)
            && !fiscal.sources.is_empty()
            && fiscal.base_years.is_empty()
        {
            return Err(SizingError::ConfigValidation(
                "fiscal.base_years is required when the base vintage is used".into(),
            ));
        }
        let mut names = BTreeSet::new();
        for s in &fiscal.sources {
            if !names.insert(s.name.as_str()) {
                return Err(SizingError::ConfigValidation(format!(
                    "fiscal source '{}' listed twice",
                    s.name
                )));
            }
            if matches!(&s.base_years, Some(y) if y.is_empty()) {
                return Err(SizingError::ConfigValidation(format!(
                    "fiscal source '{}': base_years must not be empty",
                    s.name
                )));
            }
        }
        Ok(())
    }

    /// Every (dataset, year) the estimate run reads, sorted.
    pub fn required_series(&self, years: RunYears) -> Vec<(String, u16)> {
        let mut needed = BTreeSet::new();
        for r in &self.reference_columns {
            needed.insert((r.dataset.clone(), r.period.year(years)));
        }
        for e in &self.estimates {
            needed.insert((e.dataset.clone(), years.current));
            if let Some(b) = &e.benchmark {
                needed.insert((e.dataset.clone(), years.prior));
                needed.insert((b.clone(), years.prior));
            }
            for adj in &e.adjustments {
                needed.insert((adj.dataset.clone(), years.current));
            }
        }
        needed.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "Minimal"
output_categories = ["Gin", "Beer"]

[datasets.internal.mapping]
Gin = ["Gin"]
Beer = ["Beer"]

[datasets.iwsr]
label_column = "Category"
value_column = "Volume"
[datasets.iwsr.mapping]
Gin = ["Gin and Genever"]
Beer = ["Beer"]

[[estimates]]
column = "IWSR Estimate"
method = "ratio_projection"
dataset = "internal"
benchmark = "iwsr"
"#;

    fn with(extra: &str) -> String {
        format!("{MINIMAL}\n{extra}")
    }

    #[test]
    fn parse_minimal() {
        let config = SizingConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.name, "Minimal");
        assert_eq!(config.output_categories, vec![Category::Gin, Category::Beer]);
        assert_eq!(config.datasets["internal"].label_column, "Category");
        assert_eq!(config.estimates[0].method, EstimateMethod::RatioProjection);
        assert!(config.estimates[0].baseline_scale.is_none());
        // Defaults
        assert_eq!(config.segments.price_bands.len(), 6);
        assert_eq!(config.segments.exclude_keys, vec!["blank"]);
        assert_eq!(config.fiscal.default_vintage, Vintage::Base);
    }

    #[test]
    fn parse_default_config() {
        let config = SizingConfig::default_config().unwrap();
        assert_eq!(config.output_categories.len(), 14);
        assert_eq!(config.output_categories[0], Category::Brandy);
        assert_eq!(config.output_categories[13], Category::Fabs);
        let columns: Vec<_> = config.estimates.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(
            columns,
            [
                "IWSR Estimate",
                "SALBA Estimate",
                "SAWIS Estimate",
                "GLOBAL Estimate",
                "Data Orbis Estimate"
            ]
        );
        let orbis = &config.estimates[4];
        let scale = orbis.baseline_scale.unwrap();
        assert_eq!((scale.numerator, scale.denominator), (12.0, 11.0));
        assert_eq!(config.fiscal.latest_year, Some(2020));
        assert_eq!(
            config.fiscal.vintage_overrides().unwrap().get(&2020),
            Some(&Vintage::Latest)
        );
    }

    #[test]
    fn required_series_for_projection() {
        let config = SizingConfig::from_toml(MINIMAL).unwrap();
        let years = RunYears::new(2020, 2019).unwrap();
        assert_eq!(
            config.required_series(years),
            vec![
                ("internal".to_string(), 2019),
                ("internal".to_string(), 2020),
                ("iwsr".to_string(), 2019),
            ]
        );
    }

    #[test]
    fn reject_projection_without_benchmark() {
        let input = MINIMAL.replace("benchmark = \"iwsr\"\n", "");
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("requires a benchmark"));
    }

    #[test]
    fn reject_unknown_dataset() {
        let input = with(
            r#"
[[estimates]]
column = "SALBA Estimate"
method = "direct"
dataset = "salba"
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'salba' not found"));
    }

    #[test]
    fn reject_duplicate_column() {
        let input = with(
            r#"
[[reference_columns]]
column = "IWSR Estimate"
dataset = "iwsr"
period = "prior"
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn reject_zero_scale_denominator() {
        let input = MINIMAL.replace(
            "benchmark = \"iwsr\"\n",
            "benchmark = \"iwsr\"\nbaseline_scale = { numerator = 12.0, denominator = 0.0 }\n",
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("baseline_scale"));
    }

    #[test]
    fn reject_empty_mapping_list() {
        let input = MINIMAL.replace("Beer = [\"Beer\"]\n\n[datasets.iwsr]", "Beer = []\n\n[datasets.iwsr]");
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("empty mapping for 'Beer'"));
    }

    #[test]
    fn reject_unknown_category() {
        let input = MINIMAL.replace("[\"Gin\", \"Beer\"]", "[\"Gin\", \"Beers\"]");
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("Beers"));
    }

    #[test]
    fn parse_group_rules() {
        let input = with(
            r#"
[segments]
category_column = "PRODUCTCATEGORY"

[segments.renames]
Rtds = "Cider and Fabs"

[[segments.group_rules]]
column = "PRODUCTSUBCATEGORY"
value = "Non-Alcoholic"
group = "Non-Alcoholic"
"#,
        );
        let config = SizingConfig::from_toml(&input).unwrap();
        let seg = &config.segments;
        assert_eq!(seg.category_column, "PRODUCTCATEGORY");
        assert_eq!(
            seg.group_rules,
            vec![GroupRule {
                column: "PRODUCTSUBCATEGORY".into(),
                value: "Non-Alcoholic".into(),
                group: "Non-Alcoholic".into(),
            }]
        );
        // Unset fields keep their defaults
        assert_eq!(seg.price_column, "PRICE");
    }

    #[test]
    fn reject_unsorted_price_bands() {
        let input = with(
            r#"
[[segments.price_bands]]
name = "Low"
upper = 100.0

[[segments.price_bands]]
name = "Lower"
upper = 50.0
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("must exceed"));
    }

    #[test]
    fn reject_unbounded_band_before_last() {
        let input = with(
            r#"
[[segments.price_bands]]
name = "Any"

[[segments.price_bands]]
name = "More"
upper = 50.0
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("only the last band"));
    }

    #[test]
    fn reject_latest_vintage_without_year() {
        let input = with(
            r#"
[fiscal]
default_vintage = "latest"
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("latest_year"));
    }

    #[test]
    fn reject_bad_vintage_year_key() {
        let input = with(
            r#"
[fiscal]
latest_year = 2020
[fiscal.vintage_by_year]
"20x0" = "latest"
"#,
        );
        let err = SizingConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("vintage_by_year"));
    }

    #[test]
    fn reject_typo_in_method() {
        let input = MINIMAL.replace("ratio_projection", "ratio-projection");
        assert!(SizingConfig::from_toml(&input).is_err());
    }
}
