use std::io::Write;

use crate::error::SizingError;
use crate::model::{EstimateResult, YearTable, AVG_ESTIMATE};

fn format_value(v: Option<f64>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Estimate table as CSV: `Category`, reference columns, estimate columns,
/// `Avg Estimate`. Missing values are empty cells.
pub fn write_estimates(result: &EstimateResult, writer: impl Write) -> Result<(), SizingError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let mut header = vec!["Category".to_string()];
    header.extend(result.reference_columns.iter().cloned());
    header.extend(result.estimate_columns.iter().cloned());
    header.push(AVG_ESTIMATE.to_string());
    csv.write_record(&header)?;

    for row in &result.rows {
        let mut record = vec![row.category.to_string()];
        record.extend(row.references.iter().copied().map(format_value));
        record.extend(row.estimates.iter().copied().map(format_value));
        record.push(format_value(row.avg_estimate));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Key columns followed by one column per year.
pub fn write_year_table(table: &YearTable, writer: impl Write) -> Result<(), SizingError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let mut header = table.key_columns.clone();
    header.extend(table.years.iter().map(u16::to_string));
    csv.write_record(&header)?;

    for row in &table.rows {
        let mut record = row.keys.clone();
        record.extend(row.values.iter().map(f64::to_string));
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::model::{EstimateRow, RunMeta, RunSummary, YearRow};
    use std::collections::BTreeMap;

    fn result() -> EstimateResult {
        EstimateResult {
            meta: RunMeta {
                config_name: "t".into(),
                current_year: 2020,
                last_year: 2019,
                engine_version: "0".into(),
                run_at: "now".into(),
            },
            summary: RunSummary {
                categories: 1,
                estimated: 1,
                without_estimate: vec![],
                cells_per_column: BTreeMap::new(),
                discarded_per_column: BTreeMap::new(),
            },
            reference_columns: vec!["Income CY".into()],
            estimate_columns: vec!["A".into(), "B".into()],
            rows: vec![EstimateRow {
                category: Category::CiderAndRtds,
                references: vec![Some(10.0)],
                estimates: vec![None, Some(2.5)],
                avg_estimate: Some(2.5),
                discarded: None,
            }],
        }
    }

    #[test]
    fn estimates_csv_layout() {
        let mut out = Vec::new();
        write_estimates(&result(), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Category,Income CY,A,B,Avg Estimate\nCIDER & RTDs,10,,2.5,2.5\n"
        );
    }

    #[test]
    fn year_table_csv_layout() {
        let table = YearTable {
            key_columns: vec!["Category".into(), "Price Band".into()],
            category_key: 0,
            years: vec![2020, 2021],
            rows: vec![YearRow {
                keys: vec!["Gin".into(), "Low Price".into()],
                values: vec![200.0, 220.5],
            }],
        };
        let mut out = Vec::new();
        write_year_table(&table, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Category,Price Band,2020,2021\nGin,Low Price,200,220.5\n"
        );
    }
}
