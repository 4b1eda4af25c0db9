//! CSV readers for the JHU time series and the census population tables.
//!
//! Every reader takes any [`Read`] source plus the path used in error
//! messages, so tests can feed in-memory documents. The `*_file` variants
//! open the file first.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use curves_core::error::{CurvesError, Result};
use curves_core::models::{PopulationTable, Source};
use curves_core::time_utils::{is_daily_cadence, parse_date_header};
use tracing::{debug, warn};

// ── Types ─────────────────────────────────────────────────────────────────────

/// One row of a JHU time series file.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    /// `Country/Region` (global) or `Province_State` (US).
    pub region: String,
    /// `Admin2` (US files only).
    pub county: Option<String>,
    /// Five-digit county FIPS code (US files only).
    pub fips: Option<String>,
    /// Cumulative values, one per date.
    pub values: Vec<f64>,
}

/// A JHU file before grouping.
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<SeriesRow>,
}

// ── Time series ───────────────────────────────────────────────────────────────

pub fn read_time_series_file(path: &Path, source: Source) -> Result<RawSeries> {
    read_time_series(open(path)?, source, path)
}

/// Parse a JHU time series document.
///
/// Date columns are recognised by their header; every other column
/// (`Lat`, `Long`, `UID`, `Population`, ...) is ignored unless it is one of
/// the key columns for `source`.
pub fn read_time_series<R: Read>(reader: R, source: Source, path: &Path) -> Result<RawSeries> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();

    let region_col = match source {
        Source::Global => find_column(&headers, &["Country/Region", "Country_Region"]),
        Source::Us | Source::UsCounties => find_column(&headers, &["Province_State"]),
    }
    .ok_or_else(|| CurvesError::CsvParse {
        path: path.to_path_buf(),
        message: "no region column".to_string(),
    })?;
    let county_col = find_column(&headers, &["Admin2"]);
    let fips_col = find_column(&headers, &["FIPS"]);

    let mut date_cols = Vec::new();
    let mut dates = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        if let Ok(date) = parse_date_header(h) {
            date_cols.push(i);
            dates.push(date);
        }
    }
    if dates.is_empty() {
        return Err(CurvesError::CsvParse {
            path: path.to_path_buf(),
            message: "no date columns".to_string(),
        });
    }
    if !is_daily_cadence(&dates) {
        warn!(path = %path.display(), "dates are not one daily run");
    }

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let region = record.get(region_col).unwrap_or("").trim().to_string();
        if region.is_empty() {
            continue;
        }
        let mut values = Vec::with_capacity(date_cols.len());
        for &col in &date_cols {
            let cell = record.get(col).unwrap_or("");
            values.push(parse_number(cell).ok_or_else(|| CurvesError::CsvParse {
                path: path.to_path_buf(),
                message: format!("row {}: bad number \"{}\"", line + 2, cell),
            })?);
        }
        rows.push(SeriesRow {
            region,
            county: county_col
                .and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            fips: fips_col.and_then(|c| record.get(c)).and_then(parse_fips),
            values,
        });
    }

    debug!(
        path = %path.display(),
        rows = rows.len(),
        dates = dates.len(),
        "read time series"
    );
    Ok(RawSeries { dates, rows })
}

// ── Population tables ─────────────────────────────────────────────────────────

pub fn read_state_populations_file(path: &Path) -> Result<PopulationTable> {
    read_state_populations(open(path)?, path)
}

/// State populations: the `State` column and the first numeric column after it.
///
/// Census sheets prefix state names with a dot (`.Alabama`); it is stripped.
pub fn read_state_populations<R: Read>(reader: R, path: &Path) -> Result<PopulationTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();
    let state_col = find_column(&headers, &["State"]).ok_or_else(|| CurvesError::CsvParse {
        path: path.to_path_buf(),
        message: "no State column".to_string(),
    })?;

    let mut pops = PopulationTable::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let name = record
            .get(state_col)
            .unwrap_or("")
            .trim()
            .trim_start_matches('.');
        if name.is_empty() {
            continue;
        }
        let value = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != state_col)
            .find_map(|(_, cell)| parse_count(cell));
        match value {
            Some(p) => pops.insert(name, p),
            None => debug!(state = name, "no population value"),
        }
    }
    Ok(pops)
}

pub fn read_world_populations_file(path: &Path) -> Result<PopulationTable> {
    read_world_populations(open(path)?, path)
}

/// Country populations from the census international database export.
///
/// The export starts with one title line before the header. A country may
/// appear on several rows (one per year); the first row wins. Names are
/// returned as the census spells them.
pub fn read_world_populations<R: Read>(reader: R, path: &Path) -> Result<PopulationTable> {
    let body = skip_preamble(reader, path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();
    let country_col = require_column(&headers, "Country", path)?;
    let pop_col = require_column(&headers, "Population", path)?;

    let mut pops = PopulationTable::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let country = record.get(country_col).unwrap_or("").trim();
        if country.is_empty() || pops.get(country).is_some() {
            continue;
        }
        if let Some(p) = record.get(pop_col).and_then(parse_count) {
            pops.insert(country, p);
        }
    }
    Ok(pops)
}

pub fn read_county_populations_file(path: &Path) -> Result<HashMap<String, u64>> {
    read_county_populations(open(path)?, path)
}

/// County populations keyed by five-digit FIPS (`STATE` + `COUNTY`).
///
/// Rows with county code 0 are state totals and are skipped.
pub fn read_county_populations<R: Read>(reader: R, path: &Path) -> Result<HashMap<String, u64>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();
    let state_col = require_column(&headers, "STATE", path)?;
    let county_col = require_column(&headers, "COUNTY", path)?;
    let pop_col = require_column(&headers, "POPESTIMATE2019", path)?;

    let mut out = HashMap::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let state = record.get(state_col).and_then(parse_count);
        let county = record.get(county_col).and_then(parse_count);
        let pop = record.get(pop_col).and_then(parse_count);
        if let (Some(s), Some(c), Some(p)) = (state, county, pop) {
            if c != 0 {
                out.insert(format!("{:02}{:03}", s, c), p);
            }
        }
    }
    Ok(out)
}

pub fn read_world_regions_file(path: &Path) -> Result<Vec<(String, String)>> {
    read_world_regions(open(path)?, path)
}

/// `(region, country)` pairs from the census world regions export.
///
/// Same layout as the population export: one title line, then a header with
/// `Region` and `Country` columns.
pub fn read_world_regions<R: Read>(reader: R, path: &Path) -> Result<Vec<(String, String)>> {
    let body = skip_preamble(reader, path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .clone();
    let region_col = require_column(&headers, "Region", path)?;
    let country_col = require_column(&headers, "Country", path)?;

    let mut out = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let region = record.get(region_col).unwrap_or("").trim();
        let country = record.get(country_col).unwrap_or("").trim();
        if !region.is_empty() && !country.is_empty() {
            out.push((region.to_string(), country.to_string()));
        }
    }
    Ok(out)
}

// ── Cell parsing ──────────────────────────────────────────────────────────────

/// Parse a numeric cell. Thousands separators are accepted; an empty cell is 0.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a non-negative whole count (`"39,512,223"`, `"1001.0"`). Empty cells
/// and text yield `None`.
pub fn parse_count(cell: &str) -> Option<u64> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

/// Normalise a FIPS cell (`"1001.0"`, `"01001"`) to five digits.
pub fn parse_fips(cell: &str) -> Option<String> {
    parse_count(cell).map(|code| format!("{:05}", code))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| CurvesError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().trim_start_matches('\u{feff}') == *n))
}

fn require_column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    find_column(headers, &[name]).ok_or_else(|| CurvesError::CsvParse {
        path: path.to_path_buf(),
        message: format!("missing column {}", name),
    })
}

fn skip_preamble<R: Read>(mut reader: R, path: &Path) -> Result<String> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|source| CurvesError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(text
        .split_once('\n')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default())
}

fn csv_error(path: &Path, e: csv::Error) -> CurvesError {
    CurvesError::CsvParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
