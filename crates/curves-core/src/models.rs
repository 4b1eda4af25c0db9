use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;

use crate::error::{CurvesError, Result};

/// Which cumulative count a table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cases,
    Deaths,
}

impl Metric {
    /// Lower-case noun used in titles and file names.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Deaths => "deaths",
        }
    }

    pub fn from_deaths_flag(deaths: bool) -> Self {
        if deaths {
            Metric::Deaths
        } else {
            Metric::Cases
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Granularity and origin of a published time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// One column per country.
    Global,
    /// One column per US state or territory.
    Us,
    /// One column per US county, named `"County, State"`.
    UsCounties,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Global => write!(f, "global"),
            Source::Us => write!(f, "us"),
            Source::UsCounties => write!(f, "us_counties"),
        }
    }
}

/// Ranking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Highest smoothed value first.
    Worst,
    /// Lowest smoothed value first.
    Best,
}

impl Direction {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "worst" => Ok(Direction::Worst),
            "best" => Ok(Direction::Best),
            other => Err(CurvesError::Config(format!(
                "unknown ranking direction \"{}\" (expected worst or best)",
                other
            ))),
        }
    }
}

/// What to do with negative daily changes (upstream data revisions).
///
/// The same policy is applied to every region of a run, before smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeDeltaPolicy {
    /// Leave negative changes in the series.
    Keep,
    /// Replace negative changes with zero.
    #[default]
    #[serde(rename = "clamp")]
    ClampToZero,
    /// Fail with [`CurvesError::NegativeDelta`].
    Reject,
}

impl NegativeDeltaPolicy {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "keep" => Ok(Self::Keep),
            "clamp" => Ok(Self::ClampToZero),
            "reject" => Ok(Self::Reject),
            other => Err(CurvesError::Config(format!(
                "unknown negative-delta policy \"{}\"",
                other
            ))),
        }
    }
}

/// Parameters of the difference-then-smooth pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Number of observations in the moving window.
    pub window: usize,
    /// Minimum number of defined observations for a window to yield a value.
    pub min_periods: usize,
    /// Centered window when `true`, trailing window otherwise.
    pub centered: bool,
    pub negative_policy: NegativeDeltaPolicy,
}

impl SmoothingConfig {
    /// Trailing window with a two-observation floor.
    pub fn trailing(window: usize) -> Self {
        Self {
            window,
            min_periods: window.min(2),
            centered: false,
            negative_policy: NegativeDeltaPolicy::default(),
        }
    }

    /// Centered window with a two-observation floor, as used by the grid charts.
    pub fn centered(window: usize) -> Self {
        Self {
            centered: true,
            ..Self::trailing(window)
        }
    }

    pub fn with_policy(mut self, policy: NegativeDeltaPolicy) -> Self {
        self.negative_policy = policy;
        self
    }

    /// Reject zero-sized windows and floors larger than the window.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(CurvesError::Config("window must be at least 1".to_string()));
        }
        if self.min_periods == 0 || self.min_periods > self.window {
            return Err(CurvesError::Config(format!(
                "min_periods must be in 1..={} (got {})",
                self.window, self.min_periods
            )));
        }
        Ok(())
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self::trailing(7)
    }
}

/// Parameters of a top/bottom-K ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankConfig {
    pub smoothing: SmoothingConfig,
    /// Number of regions to return.
    pub k: usize,
    pub direction: Direction,
}

impl RankConfig {
    pub fn new(window: usize, k: usize, direction: Direction) -> Self {
        Self {
            smoothing: SmoothingConfig::trailing(window),
            k,
            direction,
        }
    }
}

// ── TimeSeriesTable ───────────────────────────────────────────────────────────

/// Cumulative counts, one column per region, one row per date.
///
/// Columns keep their insertion order; that order is the tie-break for
/// ranking. Dates are strictly increasing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    regions: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
}

impl TimeSeriesTable {
    /// Create an empty table over `dates`.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self> {
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CurvesError::Config(
                "table dates must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            dates,
            ..Default::default()
        })
    }

    /// Build a table from `(region, values)` pairs.
    pub fn from_columns<S: Into<String>>(
        dates: Vec<NaiveDate>,
        columns: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> Result<Self> {
        let mut table = Self::new(dates)?;
        for (name, values) in columns {
            table.push_region(name, values)?;
        }
        Ok(table)
    }

    /// Append a region column. Names must be unique and the column must have
    /// one value per date.
    pub fn push_region(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.dates.len() {
            return Err(CurvesError::Config(format!(
                "region {} has {} values for {} dates",
                name,
                values.len(),
                self.dates.len()
            )));
        }
        if self.index.contains_key(&name) {
            return Err(CurvesError::Config(format!("duplicate region {}", name)));
        }
        self.index.insert(name.clone(), self.regions.len());
        self.regions.push(name);
        self.columns.push(values);
        Ok(())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Region names in column order.
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Number of dates (rows).
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn contains(&self, region: &str) -> bool {
        self.index.contains_key(region)
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Cumulative series for `region`.
    pub fn region(&self, region: &str) -> Result<&[f64]> {
        self.index
            .get(region)
            .map(|&i| self.columns[i].as_slice())
            .ok_or_else(|| CurvesError::MissingRegion(region.to_string()))
    }

    /// Iterate `(region, series)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.regions
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }

    /// A new table holding only `names`, in the order given.
    ///
    /// Fails with [`CurvesError::MissingRegion`] on the first absent name.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut out = Self {
            dates: self.dates.clone(),
            ..Default::default()
        };
        for name in names {
            let name = name.as_ref();
            let values = self.region(name)?.to_vec();
            out.push_region(name, values)?;
        }
        Ok(out)
    }

    /// Keep only regions for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let mut regions = Vec::with_capacity(self.regions.len());
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, column) in self.regions.drain(..).zip(self.columns.drain(..)) {
            if keep(&name) {
                regions.push(name);
                columns.push(column);
            }
        }
        self.regions = regions;
        self.columns = columns;
        self.rebuild_index();
    }

    /// Rename a region in place. Renaming an absent region is a no-op.
    pub fn rename_region(&mut self, from: &str, to: &str) -> Result<()> {
        let Some(i) = self.index.get(from).copied() else {
            return Ok(());
        };
        if self.index.contains_key(to) {
            return Err(CurvesError::Config(format!("duplicate region {}", to)));
        }
        self.regions[i] = to.to_string();
        self.rebuild_index();
        Ok(())
    }

    /// Append a region holding the element-wise sum of `members`
    /// (e.g. the EU aggregate).
    pub fn with_composite<S: AsRef<str>>(mut self, name: &str, members: &[S]) -> Result<Self> {
        let mut sum = vec![0.0; self.dates.len()];
        for member in members {
            let series = self.region(member.as_ref())?;
            for (acc, v) in sum.iter_mut().zip(series) {
                *acc += v;
            }
        }
        self.push_region(name, sum)?;
        Ok(self)
    }

    /// Drop every row before `start`.
    pub fn since(&self, start: NaiveDate) -> Self {
        let offset = self.dates.partition_point(|d| *d < start);
        let mut out = Self {
            dates: self.dates[offset..].to_vec(),
            regions: self.regions.clone(),
            columns: self.columns.iter().map(|c| c[offset..].to_vec()).collect(),
            index: HashMap::new(),
        };
        out.rebuild_index();
        out
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .regions
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }
}

// ── PopulationTable ───────────────────────────────────────────────────────────

/// Region name → population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationTable {
    entries: HashMap<String, u64>,
}

impl PopulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: impl Into<String>, population: u64) {
        self.entries.insert(region.into(), population);
    }

    pub fn get(&self, region: &str) -> Option<u64> {
        self.entries.get(region).copied()
    }

    /// Population of `region`, usable as a divisor.
    ///
    /// Fails with [`CurvesError::MissingPopulation`] when there is no entry and
    /// [`CurvesError::InvalidPopulation`] when the entry is zero.
    pub fn require(&self, region: &str) -> Result<NonZeroU64> {
        let population = self
            .get(region)
            .ok_or_else(|| CurvesError::MissingPopulation(region.to_string()))?;
        NonZeroU64::new(population).ok_or_else(|| CurvesError::InvalidPopulation {
            region: region.to_string(),
            population,
        })
    }

    pub fn remove(&mut self, region: &str) -> Option<u64> {
        self.entries.remove(region)
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(p) = self.entries.remove(from) {
            self.entries.insert(to.to_string(), p);
        }
    }

    /// Sum of the populations of `members`; every member must be present.
    pub fn total<S: AsRef<str>>(&self, members: &[S]) -> Result<u64> {
        members
            .iter()
            .map(|m| self.require(m.as_ref()).map(NonZeroU64::get))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for PopulationTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// A loaded time series table together with the populations of its regions.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: Source,
    pub metric: Metric,
    pub table: TimeSeriesTable,
    pub populations: PopulationTable,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
