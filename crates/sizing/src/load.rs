//! CSV loaders. Callers read the files; these only parse text.

use csv::StringRecord;

use crate::config::{DatasetConfig, SegmentConfig};
use crate::error::SizingError;
use crate::model::{parse_year, SourceSeries, YearRow, YearTable, VOLUME};
use crate::proportions::{from_monthly, HalfYearVolumes, MonthlyVolume};
use crate::segment::PanelRow;

struct Sheet {
    source_name: String,
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl Sheet {
    fn parse(source_name: &str, csv_data: &str) -> Result<Self, SizingError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| SizingError::Io(format!("{source_name}: {e}")))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SizingError::Io(format!("{source_name}: {e}")))?;

        Ok(Self {
            source_name: source_name.into(),
            headers,
            records,
        })
    }

    fn idx(&self, name: &str) -> Result<usize, SizingError> {
        self.find(name).ok_or_else(|| SizingError::MissingColumn {
            source_name: self.source_name.clone(),
            column: name.into(),
        })
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn number(&self, row: &str, raw: &str) -> Result<f64, SizingError> {
        raw.replace(',', "")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SizingError::ValueParse {
                source_name: self.source_name.clone(),
                row: row.into(),
                value: raw.into(),
            })
    }
}

/// One dataset/year series. The configured value column becomes `Volume`;
/// other numeric cells are kept under their column name. Rows with an empty
/// label are skipped.
pub fn load_series(
    dataset: &str,
    year: u16,
    csv_data: &str,
    config: &DatasetConfig,
) -> Result<SourceSeries, SizingError> {
    let sheet = Sheet::parse(&format!("{dataset}/{year}"), csv_data)?;
    let label_idx = sheet.idx(&config.label_column)?;
    let value_idx = sheet.idx(&config.value_column)?;

    let mut series = SourceSeries::new(dataset, year);
    for record in &sheet.records {
        let label = record.get(label_idx).unwrap_or("");
        if label.is_empty() {
            continue;
        }
        if series.contains(label) {
            return Err(SizingError::DuplicateLabel {
                source_name: sheet.source_name.clone(),
                label: label.into(),
            });
        }

        let raw = record.get(value_idx).unwrap_or("");
        let volume = sheet.number(label, raw)?;
        if volume < 0.0 {
            return Err(SizingError::ValueParse {
                source_name: sheet.source_name.clone(),
                row: label.into(),
                value: raw.into(),
            });
        }
        series.insert(label, VOLUME, volume);

        for (i, header) in sheet.headers.iter().enumerate() {
            if i == label_idx || i == value_idx || header == VOLUME {
                continue;
            }
            if let Some(v) = record.get(i).and_then(|s| sheet.number(label, s).ok()) {
                series.insert(label, header.as_str(), v);
            }
        }
    }

    log::debug!("{}: {} labels", sheet.source_name, series.len());
    Ok(series)
}

/// A category x year table: four-digit headers are year columns, every
/// other header a key column. `category_column` must be one of the keys.
pub fn load_year_table(
    source_name: &str,
    csv_data: &str,
    category_column: &str,
) -> Result<YearTable, SizingError> {
    let sheet = Sheet::parse(source_name, csv_data)?;

    let mut key_idx = Vec::new();
    let mut year_idx = Vec::new();
    for (i, h) in sheet.headers.iter().enumerate() {
        match parse_year(h) {
            Ok(y) => year_idx.push((i, y)),
            Err(_) => key_idx.push(i),
        }
    }
    if year_idx.is_empty() {
        return Err(SizingError::MissingColumn {
            source_name: source_name.into(),
            column: "<year>".into(),
        });
    }
    year_idx.sort_by_key(|(_, y)| *y);

    let category_idx = sheet.idx(category_column)?;
    let category_key = key_idx
        .iter()
        .position(|&i| i == category_idx)
        .ok_or_else(|| SizingError::MissingColumn {
            source_name: source_name.into(),
            column: category_column.into(),
        })?;

    let mut rows = Vec::with_capacity(sheet.records.len());
    for record in &sheet.records {
        let keys: Vec<String> = key_idx
            .iter()
            .map(|&i| record.get(i).unwrap_or("").to_string())
            .collect();
        let label = &keys[category_key];
        if label.is_empty() {
            continue;
        }
        let values = year_idx
            .iter()
            .map(|&(i, _)| sheet.number(label, record.get(i).unwrap_or("")))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(YearRow { keys, values });
    }

    Ok(YearTable {
        key_columns: key_idx.iter().map(|&i| sheet.headers[i].clone()).collect(),
        category_key,
        years: year_idx.iter().map(|&(_, y)| y).collect(),
        rows,
    })
}

/// Half-year volumes for one proportion source. Accepts monthly rows
/// (`category,year,month,volume`) or pre-split rows (`category,year,h1,h2`).
pub fn load_half_year(source_name: &str, csv_data: &str) -> Result<Vec<HalfYearVolumes>, SizingError> {
    let sheet = Sheet::parse(source_name, csv_data)?;
    let category_idx = sheet.idx("category")?;
    let year_idx = sheet.idx("year")?;

    let year_of = |record: &StringRecord, label: &str| -> Result<u16, SizingError> {
        let raw = record.get(year_idx).unwrap_or("");
        parse_year(raw).map_err(|_| SizingError::ValueParse {
            source_name: source_name.into(),
            row: label.into(),
            value: raw.into(),
        })
    };

    if let Some(month_idx) = sheet.find("month") {
        let volume_idx = sheet.idx("volume")?;
        let mut monthly = Vec::with_capacity(sheet.records.len());
        for record in &sheet.records {
            let category = record.get(category_idx).unwrap_or("");
            let raw_month = record.get(month_idx).unwrap_or("");
            let month = raw_month
                .parse::<u8>()
                .ok()
                .filter(|m| (1..=12).contains(m))
                .ok_or_else(|| SizingError::ValueParse {
                    source_name: source_name.into(),
                    row: category.into(),
                    value: raw_month.into(),
                })?;
            monthly.push(MonthlyVolume {
                category: category.into(),
                year: year_of(record, category)?,
                month,
                volume: sheet.number(category, record.get(volume_idx).unwrap_or(""))?,
            });
        }
        return Ok(from_monthly(&monthly));
    }

    let h1_idx = sheet.idx("h1")?;
    let h2_idx = sheet.idx("h2")?;
    sheet
        .records
        .iter()
        .map(|record| -> Result<HalfYearVolumes, SizingError> {
            let category = record.get(category_idx).unwrap_or("");
            Ok(HalfYearVolumes {
                category: category.into(),
                year: year_of(record, category)?,
                h1: sheet.number(category, record.get(h1_idx).unwrap_or(""))?,
                h2: sheet.number(category, record.get(h2_idx).unwrap_or(""))?,
            })
        })
        .collect()
}

/// Retail panel lines, filtered and mapped onto category groups.
/// Empty price or quantity cells read as 0 (unclassifiable).
pub fn load_panel(
    source_name: &str,
    csv_data: &str,
    config: &SegmentConfig,
) -> Result<Vec<PanelRow>, SizingError> {
    let sheet = Sheet::parse(source_name, csv_data)?;
    let group_idx = sheet.idx(&config.category_column)?;
    let price_idx = sheet.idx(&config.price_column)?;
    let quantity_idx = sheet.idx(&config.quantity_column)?;
    let volume_idx = sheet.idx(&config.volume_column)?;
    let index_idx = sheet.find(&config.index_column);

    let filter_idx = match &config.filter {
        Some(filter) => Some(sheet.idx(&filter.column)?),
        None => None,
    };
    let rules = config
        .group_rules
        .iter()
        .map(|rule| Ok((sheet.idx(&rule.column)?, rule)))
        .collect::<Result<Vec<_>, SizingError>>()?;

    let number_or_zero = |label: &str, raw: &str| {
        if raw.is_empty() {
            Ok(0.0)
        } else {
            sheet.number(label, raw)
        }
    };

    let mut rows = Vec::new();
    for record in &sheet.records {
        if let (Some(filter), Some(fi)) = (&config.filter, filter_idx) {
            let val = record.get(fi).unwrap_or("");
            if !filter.values.iter().any(|v| v == val) {
                continue;
            }
        }

        let label = record.get(group_idx).unwrap_or("");
        let ruled = rules
            .iter()
            .find(|(i, rule)| record.get(*i) == Some(rule.value.as_str()))
            .map(|(_, rule)| rule.group.clone());
        let group = ruled.unwrap_or_else(|| {
            config
                .renames
                .get(label)
                .cloned()
                .unwrap_or_else(|| label.to_string())
        });

        rows.push(PanelRow {
            index: index_idx.and_then(|i| record.get(i)).map(String::from),
            price: number_or_zero(label, record.get(price_idx).unwrap_or(""))?,
            quantity: number_or_zero(label, record.get(quantity_idx).unwrap_or(""))?,
            volume: number_or_zero(label, record.get(volume_idx).unwrap_or(""))?,
            group,
        });
    }

    log::debug!("{source_name}: {} panel rows kept", rows.len());
    Ok(rows)
}
