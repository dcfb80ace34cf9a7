//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `msize` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args, bad years)    |
//! | 60-69   | sizing           | Estimation engine codes                  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into [`sizing_exit_code`] or the relevant command

use marketsize_sizing::SizingError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, malformed or out-of-order years.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Sizing (60-69)
// =============================================================================

/// Config file unreadable, unparsable, or rejected by validation.
pub const EXIT_SIZING_CONFIG: u8 = 60;

/// Input data error: missing file, stale mapping, bad cell, missing
/// proportions.
pub const EXIT_SIZING_DATA: u8 = 61;

/// Ratio projection hit a zero benchmark or zero bridge value.
pub const EXIT_SIZING_DEGENERATE: u8 = 62;

/// Output file or directory could not be written.
pub const EXIT_SIZING_OUTPUT: u8 = 63;

// =============================================================================
// Engine Error Types
// =============================================================================

/// Map a SizingError to its exit code.
pub fn sizing_exit_code(err: &SizingError) -> u8 {
    match err {
        SizingError::ConfigParse(_)
        | SizingError::ConfigValidation(_)
        | SizingError::UnknownCategory(_) => EXIT_SIZING_CONFIG,
        SizingError::InvalidYear(_) => EXIT_USAGE,
        SizingError::DegenerateRatio { .. } => EXIT_SIZING_DEGENERATE,
        SizingError::MappingMismatch { .. }
        | SizingError::MissingField { .. }
        | SizingError::MissingDataset { .. }
        | SizingError::MissingColumn { .. }
        | SizingError::ValueParse { .. }
        | SizingError::DuplicateLabel { .. }
        | SizingError::MissingProportion { .. }
        | SizingError::MissingSource(_)
        | SizingError::Io(_) => EXIT_SIZING_DATA,
    }
}
