use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the covid-curves crates.
#[derive(Error, Debug)]
pub enum CurvesError {
    /// A requested region is not a column of the time series table.
    #[error("Region not found in table: {0}")]
    MissingRegion(String),

    /// Per-capita work was requested for a region with no population entry.
    #[error("No population entry for region: {0}")]
    MissingPopulation(String),

    /// A population entry exists but cannot be used as a divisor.
    #[error("Invalid population for {region}: {population}")]
    InvalidPopulation { region: String, population: u64 },

    /// A milestone threshold is never exceeded by the cumulative series.
    #[error("Threshold {threshold} never exceeded (last value {last_value})")]
    ThresholdUnreached { threshold: f64, last_value: f64 },

    /// A daily change was negative while the `reject` policy was active.
    #[error("Negative daily change for {region} at index {index}: {delta}")]
    NegativeDelta {
        region: String,
        index: usize,
        delta: f64,
    },

    /// Milestone thresholds were empty, unsorted or contained duplicates.
    #[error("Invalid milestone thresholds: {0}")]
    InvalidThresholds(String),

    /// An operation needed at least one observation.
    #[error("Empty series: {0}")]
    EmptySeries(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document did not have the expected shape.
    #[error("Failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    /// A remote file could not be fetched.
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// A date string did not match any recognised format.
    #[error("Invalid date format: {0}")]
    TimestampParse(String),

    /// A region-set name is not one of the recognised sets.
    #[error("Unknown region set: {0}")]
    UnknownRegionSet(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the covid-curves crates.
pub type Result<T> = std::result::Result<T, CurvesError>;
