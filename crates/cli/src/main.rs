// msize - alcoholic beverage market size estimation (headless)

mod estimate;
mod exit_codes;
mod tables;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use marketsize_sizing::segment::SegmentBy;
use marketsize_sizing::{SizingConfig, SizingError};

use exit_codes::{sizing_exit_code, EXIT_SIZING_CONFIG, EXIT_SIZING_DATA, EXIT_SIZING_OUTPUT, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "msize")]
#[command(about = "Cross-source market size estimation for alcoholic beverage categories")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate market size per category from every configured source
    #[command(after_help = "\
Examples:
  msize estimate --data data --current-year 2020 --last-year 2019
  msize estimate --data data --current-year 2020 --last-year 2019 --json
  msize estimate --data data --current-year 2020 --last-year 2019 --config za.sizing.toml --out sizes.csv
  msize estimate --data data --current-year 2020 --last-year 2019 --output result.json")]
    Estimate {
        /// Directory holding <dataset>/<year>.csv files
        #[arg(long)]
        data: PathBuf,

        /// Year being estimated (four digits)
        #[arg(long)]
        current_year: String,

        /// Benchmark year (four digits, before --current-year)
        #[arg(long)]
        last_year: String,

        /// Run configuration (defaults to the built-in mapping tables)
        #[arg(long, env = "MSIZE_CONFIG")]
        config: Option<PathBuf>,

        /// Estimate table CSV [default: out/market_size_<current-year>.csv]
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Split category totals into price band or alcohol index segments
    #[command(after_help = "\
Examples:
  msize segments --totals forecast.csv --panel epos.csv
  msize segments --totals forecast.csv --panel epos.csv --by alcohol-index
  msize segments --totals forecast.csv --panel epos.csv --halfyear halfyear --out fy_segments.csv")]
    Segments {
        /// Category x year totals CSV
        #[arg(long)]
        totals: PathBuf,

        /// Retail panel CSV
        #[arg(long)]
        panel: PathBuf,

        /// Segmentation axis
        #[arg(long, value_enum, default_value = "price-band")]
        by: SegmentArg,

        /// Half-year proportion directory; converts the result to fiscal years
        #[arg(long)]
        halfyear: Option<PathBuf>,

        /// Run configuration (defaults to the built-in mapping tables)
        #[arg(long, env = "MSIZE_CONFIG")]
        config: Option<PathBuf>,

        /// Output CSV [default: out/segments.csv]
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Convert a category x year table from calendar to fiscal years
    #[command(after_help = "\
Examples:
  msize fiscal --table forecast.csv --halfyear halfyear
  msize fiscal --table value_forecast.csv --halfyear halfyear --out fy_value.csv")]
    Fiscal {
        /// Category x year CSV (volume or value)
        #[arg(long)]
        table: PathBuf,

        /// Directory holding <source>.csv half-year files
        #[arg(long)]
        halfyear: PathBuf,

        /// Run configuration (defaults to the built-in mapping tables)
        #[arg(long, env = "MSIZE_CONFIG")]
        config: Option<PathBuf>,

        /// Output CSV [default: out/fiscal.csv]
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate a run configuration without running
    #[command(after_help = "\
Examples:
  msize validate
  msize validate --config za.sizing.toml")]
    Validate {
        /// Run configuration (defaults to the built-in mapping tables)
        #[arg(long, env = "MSIZE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SegmentArg {
    PriceBand,
    AlcoholIndex,
}

impl From<SegmentArg> for SegmentBy {
    fn from(arg: SegmentArg) -> Self {
        match arg {
            SegmentArg::PriceBand => SegmentBy::PriceBand,
            SegmentArg::AlcoholIndex => SegmentBy::AlcoholIndex,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Estimate {
            data,
            current_year,
            last_year,
            config,
            out,
            json,
            output,
        } => estimate::cmd_estimate(data, &current_year, &last_year, config, out, json, output),
        Commands::Segments {
            totals,
            panel,
            by,
            halfyear,
            config,
            out,
        } => tables::cmd_segments(totals, panel, by.into(), halfyear, config, out),
        Commands::Fiscal {
            table,
            halfyear,
            config,
            out,
        } => tables::cmd_fiscal(table, halfyear, config, out),
        Commands::Validate { config } => estimate::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr. `MSIZE_LOG` wins over `RUST_LOG`; `-v` raises the
/// default level when neither is set.
fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("MSIZE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn data(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SIZING_DATA, message: msg.into(), hint: None }
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SIZING_OUTPUT, message: msg.into(), hint: None }
    }

    /// Create error from an engine error with proper exit code.
    pub fn sizing(err: SizingError) -> Self {
        let code = sizing_exit_code(&err);
        let hint = match &err {
            SizingError::MappingMismatch { dataset, .. } => Some(format!(
                "the '{dataset}' file no longer carries a mapped label; update [datasets.{dataset}.mapping]"
            )),
            SizingError::MissingDataset { .. } => {
                Some("expected <data>/<dataset>/<year>.csv for every configured estimate".to_string())
            }
            SizingError::DegenerateRatio { .. } => {
                Some("check the benchmark and bridge files for zero volumes".to_string())
            }
            SizingError::MissingProportion { .. } => {
                Some("add the category to a half-year source or a rename table in [fiscal]".to_string())
            }
            SizingError::InvalidYear(_) => {
                Some("years are four digits and --last-year must precede --current-year".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<SizingError> for CliError {
    fn from(err: SizingError) -> Self {
        Self::sizing(err)
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Parse and validate `--config`, or the built-in configuration.
pub(crate) fn load_config(path: Option<&Path>) -> Result<SizingConfig, CliError> {
    let Some(path) = path else {
        return SizingConfig::default_config().map_err(CliError::sizing);
    };
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_SIZING_CONFIG,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    SizingConfig::from_toml(&text).map_err(CliError::sizing)
}

pub(crate) fn read_input(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::data(format!("cannot read {}: {e}", path.display())))
}

/// Write `bytes` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::output(format!("cannot create {}: {e}", parent.display())))?;
    }
    std::fs::write(path, bytes)
        .map_err(|e| CliError::output(format!("cannot write {}: {e}", path.display())))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}
