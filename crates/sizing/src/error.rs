use thiserror::Error;

use crate::ratio::RatioFault;

#[derive(Debug, Error)]
pub enum SizingError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (unknown dataset, bad price bands, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A category name outside the canonical taxonomy.
    #[error("unknown category: \"{0}\"")]
    UnknownCategory(String),

    /// A mapped source label is absent from the source data.
    #[error("dataset '{dataset}' ({year}): label '{label}' mapped for '{category}' not found")]
    MappingMismatch {
        dataset: String,
        year: u16,
        category: String,
        label: String,
    },

    /// A label exists but lacks the requested numeric column.
    #[error("dataset '{dataset}' ({year}): label '{label}' has no '{field}' value")]
    MissingField {
        dataset: String,
        year: u16,
        label: String,
        field: String,
    },

    /// Ratio projection hit a zero denominator.
    #[error("column '{column}', category '{category}' ({year}): {fault}")]
    DegenerateRatio {
        column: String,
        category: String,
        year: u16,
        fault: RatioFault,
    },

    /// No series was loaded for a dataset/year the run needs.
    #[error("no data loaded for dataset '{dataset}' ({year})")]
    MissingDataset { dataset: String, year: u16 },

    /// Missing required column in input data.
    #[error("{source_name}: missing column '{column}'")]
    MissingColumn { source_name: String, column: String },

    /// Numeric parse error (or negative value) in input data.
    #[error("{source_name}, row '{row}': cannot use value '{value}'")]
    ValueParse {
        source_name: String,
        row: String,
        value: String,
    },

    /// The same label appears twice in one series.
    #[error("{source_name}: duplicate label '{label}'")]
    DuplicateLabel { source_name: String, label: String },

    /// Year arguments are malformed or out of order.
    #[error("invalid year: {0}")]
    InvalidYear(String),

    /// No half-year or segment proportions for a category.
    #[error("no proportions for category '{category}'{}", .year.map(|y| format!(" ({y})")).unwrap_or_default())]
    MissingProportion { category: String, year: Option<u16> },

    /// A configured half-year proportion source has no data.
    #[error("no half-year data for source '{0}'")]
    MissingSource(String),

    /// IO / CSV error (file read, write, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl From<csv::Error> for SizingError {
    fn from(e: csv::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<std::io::Error> for SizingError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
