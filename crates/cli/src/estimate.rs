//! `msize estimate` and `msize validate`.

use std::path::{Path, PathBuf};

use marketsize_sizing::estimator::covered_categories;
use marketsize_sizing::export::write_estimates;
use marketsize_sizing::load::load_series;
use marketsize_sizing::model::{RunYears, SeriesSet};
use marketsize_sizing::{run, SizingConfig};

use crate::{load_config, read_input, write_output, CliError};

pub fn cmd_estimate(
    data_dir: PathBuf,
    current_year: &str,
    last_year: &str,
    config_path: Option<PathBuf>,
    out: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let years = RunYears::parse(current_year, last_year)?;
    let config = load_config(config_path.as_deref())?;
    let series = load_data(&data_dir, &config, years)?;

    let result = run(&config, &series, years)?;

    // CSV table
    let out = out.unwrap_or_else(|| {
        PathBuf::from("out").join(format!("market_size_{}.csv", years.current))
    });
    let mut csv = Vec::new();
    write_estimates(&result, &mut csv)?;
    write_output(&out, &csv)?;

    // JSON result
    if json_output || output_file.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::output(format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = output_file {
            write_output(path, json_str.as_bytes())?;
        }

        if json_output {
            println!("{json_str}");
        }
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{} {}: {} of {} categories estimated across {} sources",
        result.meta.config_name,
        result.meta.current_year,
        s.estimated,
        s.categories,
        result.estimate_columns.len(),
    );
    if !s.without_estimate.is_empty() {
        let names: Vec<String> = s.without_estimate.iter().map(|c| c.to_string()).collect();
        eprintln!("no estimate: {}", names.join(", "));
    }

    Ok(())
}

/// Read `<data>/<dataset>/<year>.csv` for every series the run needs.
fn load_data(data_dir: &Path, config: &SizingConfig, years: RunYears) -> Result<SeriesSet, CliError> {
    let mut series = SeriesSet::new();
    for (dataset, year) in config.required_series(years) {
        let path = data_dir.join(&dataset).join(format!("{year}.csv"));
        let csv_data = read_input(&path)
            .map_err(|e| e.with_hint(format!("dataset '{dataset}' needs {year} data")))?;
        let dataset_config = config.dataset(&dataset)?;
        series.insert(load_series(&dataset, year, &csv_data, dataset_config)?);
        log::debug!("loaded {}", path.display());
    }
    Ok(series)
}

pub fn cmd_validate(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;

    let covered = covered_categories(&config);
    let uncovered: Vec<String> = config
        .output_categories
        .iter()
        .filter(|c| !covered.contains(c))
        .map(|c| c.to_string())
        .collect();

    let source = config_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in config".to_string());
    println!(
        "{source}: valid ({} datasets, {} estimates, {} of {} categories covered)",
        config.datasets.len(),
        config.estimates.len(),
        covered.len(),
        config.output_categories.len(),
    );
    if !uncovered.is_empty() {
        println!("uncovered: {}", uncovered.join(", "));
    }
    Ok(())
}
