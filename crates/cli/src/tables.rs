//! `msize segments` and `msize fiscal`: category x year table transforms.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use marketsize_sizing::config::FiscalConfig;
use marketsize_sizing::export::write_year_table;
use marketsize_sizing::fiscal::{convert_table, VintagePlan};
use marketsize_sizing::load::{load_half_year, load_panel, load_year_table};
use marketsize_sizing::model::YearTable;
use marketsize_sizing::proportions::{build_vintage_plan, HalfYearVolumes};
use marketsize_sizing::segment::{apportion_table, segment_shares, segment_volumes, SegmentBy};

use crate::{load_config, read_input, write_output, CliError};

pub fn cmd_segments(
    totals_path: PathBuf,
    panel_path: PathBuf,
    by: SegmentBy,
    halfyear_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;
    let segments = &config.segments;

    let totals = read_table(&totals_path, &config.fiscal.category_column)?;
    let panel = load_panel(&source_name(&panel_path), &read_input(&panel_path)?, segments)?;

    let raw = segment_volumes(&panel, by, segments);
    let shares = segment_shares(&raw, &segments.exclude_keys);
    let mut table = apportion_table(&totals, &shares, by.column())?;

    if let Some(dir) = halfyear_dir {
        let plan = load_plan(&dir, &config.fiscal)?;
        table = convert_table(&table, &plan)?;
    }

    let out = out.unwrap_or_else(|| PathBuf::from("out").join("segments.csv"));
    write_table(&table, &out)?;

    eprintln!(
        "{} categories split into {} {} rows over {} years",
        totals.rows.len(),
        table.rows.len(),
        by.column(),
        table.years.len(),
    );
    Ok(())
}

pub fn cmd_fiscal(
    table_path: PathBuf,
    halfyear_dir: PathBuf,
    config_path: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;

    let calendar = read_table(&table_path, &config.fiscal.category_column)?;
    let plan = load_plan(&halfyear_dir, &config.fiscal)?;
    let fiscal = convert_table(&calendar, &plan)?;

    let out = out.unwrap_or_else(|| PathBuf::from("out").join("fiscal.csv"));
    write_table(&fiscal, &out)?;

    eprintln!(
        "{} rows converted to fiscal years {}",
        fiscal.rows.len(),
        year_span(&fiscal.years),
    );
    Ok(())
}

/// Read `<dir>/<source>.csv` for every configured proportion source.
fn load_plan(dir: &Path, fiscal: &FiscalConfig) -> Result<VintagePlan, CliError> {
    let mut sources: BTreeMap<String, Vec<HalfYearVolumes>> = BTreeMap::new();
    for source in &fiscal.sources {
        let path = dir.join(format!("{}.csv", source.name));
        let rows = load_half_year(&source.name, &read_input(&path)?)?;
        sources.insert(source.name.clone(), rows);
    }
    Ok(build_vintage_plan(fiscal, &sources)?)
}

fn read_table(path: &Path, category_column: &str) -> Result<YearTable, CliError> {
    Ok(load_year_table(&source_name(path), &read_input(path)?, category_column)?)
}

fn write_table(table: &YearTable, out: &Path) -> Result<(), CliError> {
    let mut csv = Vec::new();
    write_year_table(table, &mut csv)?;
    write_output(out, &csv)
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn year_span(years: &[u16]) -> String {
    match (years.first(), years.last()) {
        (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
        (Some(first), _) => first.to_string(),
        _ => "(none)".to_string(),
    }
}
