use crate::average::adjusted_mean_detail;
use crate::category::Category;
use crate::config::{EstimateConfig, EstimateMethod, SizingConfig};
use crate::error::SizingError;
use crate::mapping::{resolve, resolve_field, sum_labels};
use crate::model::{
    ColumnKind, EstimateResult, EstimateRow, EstimateTable, RunMeta, RunYears, SeriesSet, VOLUME,
};
use crate::ratio::project_with_baseline;
use crate::summary::compute_summary;

/// Run a full estimate: per-source columns, then the robust average per row.
pub fn run(
    config: &SizingConfig,
    series: &SeriesSet,
    years: RunYears,
) -> Result<EstimateResult, SizingError> {
    let table = estimate_all(config, series, years)?;

    let reference_columns = table.column_names(ColumnKind::Reference);
    let estimate_columns = table.column_names(ColumnKind::Estimate);

    let mut rows = Vec::with_capacity(table.categories().len());
    for (i, &category) in table.categories().iter().enumerate() {
        let estimates = table.row(i, ColumnKind::Estimate);
        let detail = adjusted_mean_detail(&estimates);
        if detail.is_none() {
            log::warn!("no source covers '{category}'");
        }
        rows.push(EstimateRow {
            category,
            references: table.row(i, ColumnKind::Reference),
            estimates,
            avg_estimate: detail.map(|d| d.value),
            discarded: detail
                .and_then(|d| d.discarded)
                .map(|idx| estimate_columns[idx].clone()),
        });
    }

    let summary = compute_summary(&rows, &estimate_columns);
    log::info!(
        "estimated {} of {} categories for {}",
        summary.estimated,
        summary.categories,
        years.current
    );

    Ok(EstimateResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            current_year: years.current,
            last_year: years.prior,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        reference_columns,
        estimate_columns,
        rows,
    })
}

/// Build the estimate table: reference columns, then one column per
/// configured estimate, each over every output category.
pub fn estimate_all(
    config: &SizingConfig,
    series: &SeriesSet,
    years: RunYears,
) -> Result<EstimateTable, SizingError> {
    let mut table = EstimateTable::new(config.output_categories.clone());

    for r in &config.reference_columns {
        let mapping = &config.dataset(&r.dataset)?.mapping;
        let source = series.get(&r.dataset, r.period.year(years))?;
        let field = r.field.as_deref().unwrap_or(VOLUME);
        table = table.with_column(&r.column, ColumnKind::Reference, |c| {
            resolve_field(c, source, mapping, field)
        })?;
    }

    for estimate in &config.estimates {
        table = estimate_column(table, config, estimate, series, years)?;
        table = apply_adjustments(table, estimate, series, years)?;
        log::debug!("column '{}' resolved", estimate.column);
    }

    Ok(table)
}

fn estimate_column(
    table: EstimateTable,
    config: &SizingConfig,
    estimate: &EstimateConfig,
    series: &SeriesSet,
    years: RunYears,
) -> Result<EstimateTable, SizingError> {
    let mapping = &config.dataset(&estimate.dataset)?.mapping;
    let current = series.get(&estimate.dataset, years.current)?;

    match estimate.method {
        EstimateMethod::Direct => table.with_column(&estimate.column, ColumnKind::Estimate, |c| {
            resolve(c, current, mapping)
        }),
        EstimateMethod::RatioProjection => {
            let bench_name = estimate.benchmark.as_deref().ok_or_else(|| {
                SizingError::ConfigValidation(format!(
                    "estimate '{}': ratio_projection requires a benchmark",
                    estimate.column
                ))
            })?;
            let bench_mapping = &config.dataset(bench_name)?.mapping;
            let bench_prior = series.get(bench_name, years.prior)?;
            let bridge_prior = series.get(&estimate.dataset, years.prior)?;
            let scale = estimate.baseline_scale.unwrap_or_default();

            table.with_column(&estimate.column, ColumnKind::Estimate, |c| {
                let bridge_now = resolve(c, current, mapping)?;
                let bridge_then = resolve(c, bridge_prior, mapping)?;
                let benchmark = resolve(c, bench_prior, bench_mapping)?;
                let (Some(now), Some(then), Some(bench)) = (bridge_now, bridge_then, benchmark)
                else {
                    return Ok(None);
                };
                project_with_baseline(now, then, bench, scale)
                    .map(Some)
                    .map_err(|fault| SizingError::DegenerateRatio {
                        column: estimate.column.clone(),
                        category: c.to_string(),
                        year: years.prior,
                        fault,
                    })
            })
        }
    }
}

/// Add each configured correction to its cell. A correction never creates
/// an estimate on its own.
fn apply_adjustments(
    mut table: EstimateTable,
    estimate: &EstimateConfig,
    series: &SeriesSet,
    years: RunYears,
) -> Result<EstimateTable, SizingError> {
    for adj in &estimate.adjustments {
        let source = series.get(&adj.dataset, years.current)?;
        let amount = sum_labels(adj.category.as_str(), source, &adj.labels, VOLUME)?;
        match table.value(&estimate.column, adj.category) {
            Some(base) => {
                log::debug!(
                    "'{}' {}: +{amount} from '{}'",
                    estimate.column,
                    adj.category,
                    adj.dataset
                );
                table = table.with_cell(&estimate.column, adj.category, Some(base + amount));
            }
            None => log::warn!(
                "'{}' has no estimate for '{}'; adjustment from '{}' skipped",
                estimate.column,
                adj.category,
                adj.dataset
            ),
        }
    }
    Ok(table)
}

/// Categories at least one estimate column covers.
pub fn covered_categories(config: &SizingConfig) -> Vec<Category> {
    config
        .output_categories
        .iter()
        .copied()
        .filter(|&c| {
            config.estimates.iter().any(|e| {
                config
                    .datasets
                    .get(&e.dataset)
                    .is_some_and(|d| d.mapping.covers(c))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceSeries;

    const CONFIG: &str = r#"
name = "Unit"
output_categories = ["Gin", "Beer", "Rum"]

[datasets.internal.mapping]
Gin = ["Gin"]
Beer = ["Beer"]

[datasets.brands]
label_column = "Brand"
[datasets.brands.mapping]

[datasets.iwsr.mapping]
Gin = ["Gin and Genever"]
Beer = ["Beer"]

[datasets.salba.mapping]
Gin = ["Gin"]

[[reference_columns]]
column = "Income CY"
dataset = "internal"

[[estimates]]
column = "IWSR Estimate"
method = "ratio_projection"
dataset = "internal"
benchmark = "iwsr"

[[estimates]]
column = "SALBA Estimate"
method = "direct"
dataset = "salba"

[[estimates.adjustments]]
category = "Gin"
dataset = "brands"
labels = ["Gin Brand"]

[[estimates.adjustments]]
category = "Beer"
dataset = "brands"
labels = ["Gin Brand"]
"#;

    fn years() -> RunYears {
        RunYears::new(2020, 2019).unwrap()
    }

    fn series(iwsr_beer: f64) -> SeriesSet {
        [
            SourceSeries::from_volumes("internal", 2019, [("Gin", 500.0), ("Beer", 100.0)]),
            SourceSeries::from_volumes("internal", 2020, [("Gin", 600.0), ("Beer", 100.0)]),
            SourceSeries::from_volumes("iwsr", 2019, [("Gin and Genever", 2000.0), ("Beer", iwsr_beer)]),
            SourceSeries::from_volumes("salba", 2020, [("Gin", 2400.0)]),
            SourceSeries::from_volumes("brands", 2020, [("Gin Brand", 100.0)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn columns_in_config_order() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let table = estimate_all(&config, &series(900.0), years()).unwrap();
        let names: Vec<_> = table.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Income CY", "IWSR Estimate", "SALBA Estimate"]);
    }

    #[test]
    fn projection_and_adjustment() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let table = estimate_all(&config, &series(900.0), years()).unwrap();
        assert!((table.value("IWSR Estimate", Category::Gin).unwrap() - 2400.0).abs() < 1e-9);
        // Flat internal beer → benchmark carried forward
        assert!((table.value("IWSR Estimate", Category::Beer).unwrap() - 900.0).abs() < 1e-9);
        assert_eq!(table.value("SALBA Estimate", Category::Gin), Some(2500.0));
        // No SALBA beer: adjustment skipped, cell stays missing
        assert_eq!(table.value("SALBA Estimate", Category::Beer), None);
        assert_eq!(table.value("IWSR Estimate", Category::Rum), None);
    }

    #[test]
    fn run_averages_rows() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let result = run(&config, &series(900.0), years()).unwrap();
        let gin = result.row(Category::Gin).unwrap();
        // Two values: first maximal deviation (IWSR) dropped
        assert_eq!(gin.discarded.as_deref(), Some("IWSR Estimate"));
        assert_eq!(gin.avg_estimate, Some(2500.0));
        assert_eq!(result.value(Category::Gin, "Income CY"), Some(600.0));
        assert_eq!(result.row(Category::Rum).unwrap().avg_estimate, None);
        assert_eq!(result.summary.without_estimate, vec![Category::Rum]);
        assert_eq!(result.meta.last_year, 2019);
    }

    #[test]
    fn zero_benchmark_is_degenerate() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let err = estimate_all(&config, &series(0.0), years()).unwrap_err();
        match err {
            SizingError::DegenerateRatio {
                column,
                category,
                year,
                ..
            } => {
                assert_eq!(column, "IWSR Estimate");
                assert_eq!(category, "Beer");
                assert_eq!(year, 2019);
            }
            other => panic!("expected DegenerateRatio, got {other:?}"),
        }
    }

    #[test]
    fn missing_adjustment_label_is_mismatch() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let mut set = series(900.0);
        set.insert(SourceSeries::from_volumes("brands", 2020, [("Other Brand", 1.0)]));
        let err = estimate_all(&config, &set, years()).unwrap_err();
        match err {
            SizingError::MappingMismatch {
                dataset,
                year,
                category,
                label,
            } => {
                assert_eq!(dataset, "brands");
                assert_eq!(year, 2020);
                assert_eq!(category, "Gin");
                assert_eq!(label, "Gin Brand");
            }
            other => panic!("expected MappingMismatch, got {other:?}"),
        }
    }

    #[test]
    fn missing_series_is_reported() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        let partial: SeriesSet = [SourceSeries::from_volumes("internal", 2020, [("Gin", 1.0), ("Beer", 1.0)])]
            .into_iter()
            .collect();
        let err = estimate_all(&config, &partial, years()).unwrap_err();
        assert!(matches!(err, SizingError::MissingDataset { .. }));
    }

    #[test]
    fn covered_excludes_unmapped() {
        let config = SizingConfig::from_toml(CONFIG).unwrap();
        assert_eq!(covered_categories(&config), vec![Category::Gin, Category::Beer]);
    }
}
