//! Dataset pipeline: fetch → read → group → fix names → attach populations.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use curves_core::analytics::{apply_negative_policy, daily_change, resample_weekly};
use curves_core::error::{CurvesError, Result};
use curves_core::models::{
    Dataset, Metric, NegativeDeltaPolicy, PopulationTable, Source, TimeSeriesTable,
};
use curves_core::regions::{census_name, CONTINENT_EXTRAS};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregator::{
    by_county, by_region, county_populations, fix_census_populations, fix_jhu_names,
};
use crate::fetch::{
    time_series_filename, Downloader, COUNTY_POPULATION_FILE, STATE_POPULATION_FILE,
    WORLD_POPULATION_FILE, WORLD_REGIONS_FILE,
};
use crate::reader::{
    read_county_populations_file, read_state_populations_file, read_time_series_file,
    read_world_populations_file, read_world_regions_file,
};

// ── Datasets ──────────────────────────────────────────────────────────────────

/// Load the table for `source` / `metric` together with its populations.
///
/// A missing population file is not an error here: the dataset comes back
/// with an empty population table and per-capita work fails later with
/// [`CurvesError::MissingPopulation`].
pub fn load_dataset(downloader: &Downloader, source: Source, metric: Metric) -> Result<Dataset> {
    let started = Instant::now();
    let path = downloader.ensure(time_series_filename(source, metric))?;
    let raw = read_time_series_file(&path, source)?;

    let (table, populations) = match source {
        Source::Global => {
            let mut table = by_region(&raw)?;
            fix_jhu_names(&mut table)?;
            let census = optional_populations(downloader, WORLD_POPULATION_FILE, |p| {
                read_world_populations_file(p)
            })?;
            let pops = fix_census_populations(&census, table.regions());
            (table, pops)
        }
        Source::Us => {
            let table = by_region(&raw)?;
            let pops = optional_populations(downloader, STATE_POPULATION_FILE, |p| {
                read_state_populations_file(p)
            })?;
            (table, pops)
        }
        Source::UsCounties => {
            let (table, fips) = by_county(&raw)?;
            let pops = match downloader.local(COUNTY_POPULATION_FILE) {
                Ok(p) => county_populations(&fips, &read_county_populations_file(&p)?),
                Err(e) => {
                    warn!(error = %e, "county populations unavailable");
                    PopulationTable::new()
                }
            };
            (table, pops)
        }
    };

    info!(
        source = %source,
        metric = %metric,
        regions = table.num_regions(),
        dates = table.len(),
        populations = populations.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataset loaded"
    );
    Ok(Dataset {
        source,
        metric,
        table,
        populations,
    })
}

fn optional_populations<F>(downloader: &Downloader, filename: &str, read: F) -> Result<PopulationTable>
where
    F: FnOnce(&std::path::Path) -> Result<PopulationTable>,
{
    match downloader.local(filename) {
        Ok(path) => read(&path),
        Err(e) => {
            warn!(file = filename, error = %e, "population file unavailable");
            Ok(PopulationTable::new())
        }
    }
}

/// Copy of `table` restricted to regions with a population entry.
/// Returns the names that were dropped.
pub fn populated_only(
    table: &TimeSeriesTable,
    pops: &PopulationTable,
) -> (TimeSeriesTable, Vec<String>) {
    let mut kept = table.clone();
    let mut dropped = Vec::new();
    kept.retain(|name| {
        let keep = pops.get(name).is_some_and(|p| p > 0);
        if !keep {
            dropped.push(name.to_string());
        }
        keep
    });
    if !dropped.is_empty() {
        debug!(count = dropped.len(), "regions without population dropped");
    }
    (kept, dropped)
}

// ── Continents ────────────────────────────────────────────────────────────────

/// Name of the group holding every country.
pub const ALL_GROUP: &str = "All";

/// Countries of `known` grouped by continent, continents in name order,
/// followed by the [`ALL_GROUP`] group with every known country.
pub fn continent_groups<S: AsRef<str>>(
    assignments: &[(String, String)],
    known: &[S],
) -> Vec<(String, Vec<String>)> {
    let is_known = |c: &str| known.iter().any(|k| k.as_ref() == c);

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let extras = CONTINENT_EXTRAS
        .iter()
        .map(|(c, r)| (r.to_string(), c.to_string()));
    for (region, country) in assignments.iter().cloned().chain(extras) {
        let country = census_name(&country).to_string();
        if !is_known(&country) {
            continue;
        }
        let members = groups.entry(region).or_default();
        if !members.contains(&country) {
            members.push(country);
        }
    }

    let mut out: Vec<(String, Vec<String>)> = groups.into_iter().collect();
    out.push((
        ALL_GROUP.to_string(),
        known.iter().map(|k| k.as_ref().to_string()).collect(),
    ));
    out
}

/// Read the world regions file from the data directory and group `known`.
///
/// Without the file only the [`ALL_GROUP`] group is returned.
pub fn load_continent_groups<S: AsRef<str>>(
    downloader: &Downloader,
    known: &[S],
) -> Result<Vec<(String, Vec<String>)>> {
    let assignments = match downloader.local(WORLD_REGIONS_FILE) {
        Ok(path) => read_world_regions_file(&path)?,
        Err(e) => {
            warn!(error = %e, "world regions unavailable; using a single group");
            Vec::new()
        }
    };
    Ok(continent_groups(&assignments, known))
}

// ── Weekly per-capita ─────────────────────────────────────────────────────────

/// Weekly new counts per `unit` people, one row per region.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WeeklyTable {
    /// Sundays closing each week.
    pub weeks: Vec<NaiveDate>,
    pub rows: Vec<(String, Vec<f64>)>,
}

impl WeeklyTable {
    /// The `k` regions with the highest value in the last week, highest first.
    pub fn worst_last_week(&self, k: usize) -> Vec<(String, f64)> {
        let mut last: Vec<(String, f64)> = self
            .rows
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.clone(), *v)))
            .collect();
        last.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        last.truncate(k);
        last
    }
}

/// Weekly sums of daily changes under `policy`, divided by population,
/// times `unit`. Regions without a population are skipped.
pub fn weekly_per_capita(
    table: &TimeSeriesTable,
    pops: &PopulationTable,
    unit: f64,
    policy: NegativeDeltaPolicy,
) -> Result<WeeklyTable> {
    let mut out = WeeklyTable::default();
    for (name, series) in table.iter() {
        let Some(pop) = pops.get(name).filter(|p| *p > 0) else {
            continue;
        };
        let deltas = apply_negative_policy(daily_change(series), policy, name)?;
        let weekly = resample_weekly(table.dates(), &deltas);
        if out.weeks.is_empty() {
            out.weeks = weekly.iter().map(|(w, _)| *w).collect();
        }
        out.rows.push((
            name.to_string(),
            weekly.iter().map(|(_, v)| v * unit / pop as f64).collect(),
        ));
    }
    if out.rows.is_empty() {
        return Err(CurvesError::MissingPopulation(
            "no region of the table has a population".to_string(),
        ));
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
