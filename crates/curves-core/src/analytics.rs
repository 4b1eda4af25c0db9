//! Daily change, smoothing, ranking, milestones and per-capita scaling.
//!
//! Every function here is pure: inputs are borrowed tables and slices, and
//! structural problems come back as [`CurvesError`] values.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::num::NonZeroU64;
use tracing::debug;

use crate::error::{CurvesError, Result};
use crate::formatting::{milestone_label, LabelPolicy};
use crate::models::{
    Direction, Metric, NegativeDeltaPolicy, PopulationTable, RankConfig, SmoothingConfig,
    TimeSeriesTable,
};
use crate::time_utils::week_ending_sunday;

// ── Daily change ──────────────────────────────────────────────────────────────

/// First difference of a cumulative series. Index 0 is undefined.
pub fn daily_change(series: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(series.len());
    if series.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(series.windows(2).map(|w| Some(w[1] - w[0])));
    out
}

/// Apply `policy` to the negative entries of `deltas`.
///
/// `region` only feeds the error raised under [`NegativeDeltaPolicy::Reject`].
pub fn apply_negative_policy(
    mut deltas: Vec<Option<f64>>,
    policy: NegativeDeltaPolicy,
    region: &str,
) -> Result<Vec<Option<f64>>> {
    match policy {
        NegativeDeltaPolicy::Keep => {}
        NegativeDeltaPolicy::ClampToZero => {
            for d in deltas.iter_mut().flatten() {
                if *d < 0.0 {
                    *d = 0.0;
                }
            }
        }
        NegativeDeltaPolicy::Reject => {
            if let Some((index, delta)) = deltas
                .iter()
                .enumerate()
                .find_map(|(i, d)| d.filter(|v| *v < 0.0).map(|v| (i, v)))
            {
                return Err(CurvesError::NegativeDelta {
                    region: region.to_string(),
                    index,
                    delta,
                });
            }
        }
    }
    Ok(deltas)
}

// ── Rolling average ───────────────────────────────────────────────────────────

/// Moving average with a minimum-period floor.
///
/// Each position averages the defined values of its window and yields `None`
/// when fewer than `min_periods` are defined. A trailing window ends at the
/// position. A centered window puts `(window - 1) / 2` points after the
/// position and the rest before it.
pub fn rolling_average(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
    centered: bool,
) -> Vec<Option<f64>> {
    let n = values.len();
    if window == 0 {
        return vec![None; n];
    }
    let after = if centered { (window - 1) / 2 } else { 0 };
    let before = window - 1 - after;
    let floor = min_periods.max(1);

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            let (sum, count) = values[lo..=hi]
                .iter()
                .flatten()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count >= floor).then(|| sum / count as f64)
        })
        .collect()
}

/// Difference, apply the negative-delta policy, then smooth.
pub fn smoothed_daily(
    series: &[f64],
    config: &SmoothingConfig,
    region: &str,
) -> Result<Vec<Option<f64>>> {
    config.validate()?;
    let deltas = apply_negative_policy(daily_change(series), config.negative_policy, region)?;
    Ok(rolling_average(
        &deltas,
        config.window,
        config.min_periods,
        config.centered,
    ))
}

/// Smoothed daily change at the most recent date.
pub fn latest_smoothed(
    series: &[f64],
    config: &SmoothingConfig,
    region: &str,
) -> Result<Option<f64>> {
    Ok(smoothed_daily(series, config, region)?
        .last()
        .copied()
        .flatten())
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRegion {
    pub name: String,
    /// Smoothed daily change at the most recent date.
    pub latest: Option<f64>,
}

/// Top/bottom-K region names by most-recent smoothed daily change.
pub fn rank_regions(table: &TimeSeriesTable, config: &RankConfig) -> Result<Vec<String>> {
    Ok(rank_regions_scored(table, config, |_| true)?
        .into_iter()
        .map(|r| r.name)
        .collect())
}

/// [`rank_regions`] restricted to the regions accepted by `predicate`.
pub fn rank_regions_where<P>(
    table: &TimeSeriesTable,
    config: &RankConfig,
    predicate: P,
) -> Result<Vec<String>>
where
    P: Fn(&str) -> bool,
{
    Ok(rank_regions_scored(table, config, predicate)?
        .into_iter()
        .map(|r| r.name)
        .collect())
}

/// Ranking with the score of each returned region.
///
/// The sort is stable, so equal scores keep column order. Undefined scores
/// come after every defined score in both directions.
pub fn rank_regions_scored<P>(
    table: &TimeSeriesTable,
    config: &RankConfig,
    predicate: P,
) -> Result<Vec<RankedRegion>>
where
    P: Fn(&str) -> bool,
{
    let mut scored = Vec::with_capacity(table.num_regions());
    for (name, series) in table.iter().filter(|(name, _)| predicate(*name)) {
        let latest = latest_smoothed(series, &config.smoothing, name)?.filter(|v| v.is_finite());
        scored.push(RankedRegion {
            name: name.to_string(),
            latest,
        });
    }

    scored.sort_by(|a, b| compare_scores(a.latest, b.latest, config.direction));
    scored.truncate(config.k);

    debug!(
        candidates = table.num_regions(),
        returned = scored.len(),
        direction = ?config.direction,
        "ranked regions"
    );
    Ok(scored)
}

fn compare_scores(a: Option<f64>, b: Option<f64>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match direction {
                Direction::Worst => ord.reverse(),
                Direction::Best => ord,
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Predicate accepting regions whose population is strictly above `floor`.
/// Regions without a population entry are rejected.
pub fn population_floor(pops: &PopulationTable, floor: u64) -> impl Fn(&str) -> bool + '_ {
    move |region| pops.get(region).is_some_and(|p| p > floor)
}

// ── Milestones ────────────────────────────────────────────────────────────────

/// First index at which `series` exceeds each threshold, followed by the
/// last index of the series as a terminal marker.
///
/// `thresholds` must be non-empty and strictly increasing.
pub fn milestones(series: &[f64], thresholds: &[f64]) -> Result<Vec<usize>> {
    validate_thresholds(thresholds)?;
    let Some(&last_value) = series.last() else {
        return Err(CurvesError::EmptySeries(
            "milestones need at least one observation".to_string(),
        ));
    };

    let mut indices = Vec::with_capacity(thresholds.len() + 1);
    for &threshold in thresholds {
        let index = series
            .iter()
            .position(|v| *v > threshold)
            .ok_or(CurvesError::ThresholdUnreached {
                threshold,
                last_value,
            })?;
        indices.push(index);
    }
    indices.push(series.len() - 1);
    Ok(indices)
}

fn validate_thresholds(thresholds: &[f64]) -> Result<()> {
    if thresholds.is_empty() {
        return Err(CurvesError::InvalidThresholds("no thresholds".to_string()));
    }
    if thresholds.iter().any(|t| !t.is_finite()) {
        return Err(CurvesError::InvalidThresholds(
            "thresholds must be finite".to_string(),
        ));
    }
    if let Some(w) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
        return Err(CurvesError::InvalidThresholds(format!(
            "{} is not below {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// `first`, then every multiple of `step` above it and strictly below
/// `last_value`. Empty when `last_value` does not exceed `first`.
pub fn milestone_thresholds(first: f64, step: f64, last_value: f64) -> Vec<f64> {
    if !(last_value > first) {
        return Vec::new();
    }
    let mut out = vec![first];
    if step > 0.0 {
        let mut k = 1.0;
        loop {
            let t = k * step;
            if t >= last_value {
                break;
            }
            if t > first {
                out.push(t);
            }
            k += 1.0;
        }
    }
    out
}

/// Differences of consecutive indices.
pub fn interval_lengths(indices: &[usize]) -> Vec<usize> {
    indices
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect()
}

/// Threshold schedule and label units for one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneSpec {
    pub first: f64,
    pub step: f64,
    /// Divisor used in labels.
    pub unit: f64,
    /// Appended to the divided value, e.g. `" mil"` or `"k"`.
    pub suffix: String,
}

impl MilestoneSpec {
    /// 100 cases, then every million.
    pub fn cases() -> Self {
        Self {
            first: 100.0,
            step: 1_000_000.0,
            unit: 1_000_000.0,
            suffix: " mil".to_string(),
        }
    }

    /// 100 deaths, then every 20,000.
    pub fn deaths() -> Self {
        Self {
            first: 100.0,
            step: 20_000.0,
            unit: 1_000.0,
            suffix: "k".to_string(),
        }
    }

    pub fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Cases => Self::cases(),
            Metric::Deaths => Self::deaths(),
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }
}

/// A crossed threshold: drawn as a vertical line with a label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneMark {
    pub index: usize,
    pub date: NaiveDate,
    pub threshold: f64,
    pub label: String,
}

/// The stretch between two consecutive markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneSegment {
    pub start: usize,
    pub end: usize,
    pub days: usize,
    /// Index at which the segment label is centred.
    pub midpoint: usize,
    pub label: Option<String>,
}

/// Everything needed to annotate one panel with milestones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneTrack {
    pub marks: Vec<MilestoneMark>,
    pub segments: Vec<MilestoneSegment>,
    /// Last index of the series. Closes the final segment, never marked.
    pub terminal: Option<usize>,
}

impl MilestoneTrack {
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Milestones of `series` under `spec`, with segment labels from `policy`.
///
/// A series that never passes `spec.first` gets an empty track.
pub fn build_milestone_track(
    dates: &[NaiveDate],
    series: &[f64],
    spec: &MilestoneSpec,
    policy: &LabelPolicy,
) -> Result<MilestoneTrack> {
    if dates.len() != series.len() {
        return Err(CurvesError::Config(format!(
            "{} dates for {} values",
            dates.len(),
            series.len()
        )));
    }
    let Some(&last_value) = series.last() else {
        return Ok(MilestoneTrack::default());
    };
    let thresholds = milestone_thresholds(spec.first, spec.step, last_value);
    if thresholds.is_empty() {
        return Ok(MilestoneTrack::default());
    }

    let indices = milestones(series, &thresholds)?;
    let marks = thresholds
        .iter()
        .zip(&indices)
        .map(|(&threshold, &index)| MilestoneMark {
            index,
            date: dates[index],
            threshold,
            label: milestone_label(threshold, spec.unit, &spec.suffix),
        })
        .collect();

    let segments = indices
        .windows(2)
        .zip(interval_lengths(&indices))
        .map(|(w, days)| MilestoneSegment {
            start: w[0],
            end: w[1],
            days,
            midpoint: w[1] - days / 2,
            label: policy.label(days),
        })
        .collect();

    Ok(MilestoneTrack {
        marks,
        segments,
        terminal: indices.last().copied(),
    })
}

// ── Per-capita normalisation ──────────────────────────────────────────────────

/// `series[i] / population * capita_unit`.
///
/// A zero population is unrepresentable; [`PopulationTable::require`] turns
/// it into [`CurvesError::InvalidPopulation`].
pub fn normalize(series: &[f64], population: NonZeroU64, capita_unit: f64) -> Vec<f64> {
    let pop = population.get() as f64;
    series.iter().map(|v| v * capita_unit / pop).collect()
}

/// Per-capita series of one region of `table`.
pub fn normalize_region(
    table: &TimeSeriesTable,
    pops: &PopulationTable,
    region: &str,
    capita_unit: f64,
) -> Result<Vec<f64>> {
    let series = table.region(region)?;
    let population = pops.require(region)?;
    Ok(normalize(series, population, capita_unit))
}

/// Per-capita copy of the whole table. Every region needs a population.
pub fn normalize_table(
    table: &TimeSeriesTable,
    pops: &PopulationTable,
    capita_unit: f64,
) -> Result<TimeSeriesTable> {
    let mut out = TimeSeriesTable::new(table.dates().to_vec())?;
    for name in table.regions() {
        out.push_region(
            name.as_str(),
            normalize_region(table, pops, name, capita_unit)?,
        )?;
    }
    Ok(out)
}

// ── Alignment and resampling ──────────────────────────────────────────────────

/// The tail of `series` starting at its first value above `n_min`.
///
/// Used to overlay curves on a "days since N cases" axis.
pub fn days_since(series: &[f64], n_min: f64) -> Vec<f64> {
    series
        .iter()
        .position(|v| *v > n_min)
        .map_or_else(Vec::new, |start| series[start..].to_vec())
}

/// Weekly sums of daily changes. Weeks end on Sunday and are labelled by
/// that Sunday; undefined values count as zero.
pub fn resample_weekly(dates: &[NaiveDate], deltas: &[Option<f64>]) -> Vec<(NaiveDate, f64)> {
    let mut out: Vec<(NaiveDate, f64)> = Vec::new();
    for (date, delta) in dates.iter().zip(deltas) {
        let week = week_ending_sunday(*date);
        let v = delta.unwrap_or(0.0);
        match out.last_mut() {
            Some((w, sum)) if *w == week => *sum += v,
            _ => out.push((week, v)),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::LabelFormat;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn table(columns: Vec<(&str, Vec<f64>)>) -> TimeSeriesTable {
        let n = columns.first().map_or(0, |c| c.1.len());
        TimeSeriesTable::from_columns(dates(n), columns).unwrap()
    }

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|v| (v - b).abs() < 1e-9)
    }

    // ── daily_change / negative policy ───────────────────────────────────────

    #[test]
    fn test_daily_change_first_undefined() {
        assert_eq!(
            daily_change(&[10.0, 20.0, 40.0, 40.0]),
            vec![None, Some(10.0), Some(20.0), Some(0.0)]
        );
        assert!(daily_change(&[]).is_empty());
        assert_eq!(daily_change(&[5.0]), vec![None]);
    }

    #[test]
    fn test_negative_policy_keep_and_clamp() {
        let deltas = daily_change(&[10.0, 8.0, 12.0]);
        let kept = apply_negative_policy(deltas.clone(), NegativeDeltaPolicy::Keep, "X").unwrap();
        assert_eq!(kept, vec![None, Some(-2.0), Some(4.0)]);
        let clamped =
            apply_negative_policy(deltas, NegativeDeltaPolicy::ClampToZero, "X").unwrap();
        assert_eq!(clamped, vec![None, Some(0.0), Some(4.0)]);
    }

    #[test]
    fn test_negative_policy_reject() {
        let deltas = daily_change(&[10.0, 12.0, 8.0, 9.0]);
        match apply_negative_policy(deltas, NegativeDeltaPolicy::Reject, "Texas") {
            Err(CurvesError::NegativeDelta {
                region,
                index,
                delta,
            }) => {
                assert_eq!(region, "Texas");
                assert_eq!(index, 2);
                assert_eq!(delta, -4.0);
            }
            other => panic!("expected NegativeDelta, got {:?}", other),
        }
    }

    // ── rolling_average ──────────────────────────────────────────────────────

    #[test]
    fn test_rolling_trailing_min_periods() {
        let values = vec![None, Some(10.0), Some(20.0), Some(0.0)];
        let out = rolling_average(&values, 2, 1, false);
        assert_eq!(out[0], None);
        assert!(approx(out[1], 10.0));
        assert!(approx(out[2], 15.0));
        assert!(approx(out[3], 10.0));
    }

    #[test]
    fn test_rolling_floor_not_met() {
        let values = vec![None, Some(10.0), Some(20.0)];
        let out = rolling_average(&values, 3, 3, false);
        assert_eq!(out, vec![None, None, None]);
    }

    #[test]
    fn test_rolling_centered_odd_window() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0].iter().map(|v| Some(*v)).collect();
        let out = rolling_average(&values, 3, 2, true);
        assert!(approx(out[0], 1.5));
        assert!(approx(out[1], 2.0));
        assert!(approx(out[2], 3.0));
        assert!(approx(out[4], 4.5));
    }

    #[test]
    fn test_rolling_centered_even_window_leans_back() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 5.0].iter().map(|v| Some(*v)).collect();
        // window 4 centered: two before, one after
        let out = rolling_average(&values, 4, 4, true);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!(approx(out[2], 2.5));
        assert!(approx(out[3], 3.5));
        assert_eq!(out[4], None);
    }

    #[test]
    fn test_rolling_constant_input() {
        let values = vec![Some(7.0); 10];
        // Trailing: the first window holds a single value, below the floor of 2.
        let out = rolling_average(&values, 7, 2, false);
        assert_eq!(out.len(), values.len());
        assert_eq!(out[0], None);
        assert!(out[1..].iter().all(|v| approx(*v, 7.0)));

        // Centered: every window holds at least four values.
        let out = rolling_average(&values, 7, 2, true);
        assert_eq!(out.len(), values.len());
        assert!(out.iter().all(|v| approx(*v, 7.0)));
    }

    #[test]
    fn test_rolling_zero_window() {
        assert_eq!(rolling_average(&[Some(1.0)], 0, 1, false), vec![None]);
    }

    // ── ranking ──────────────────────────────────────────────────────────────

    #[test]
    fn test_rank_worst_example() {
        let t = table(vec![
            ("A", vec![10.0, 20.0, 40.0, 40.0]),
            ("B", vec![5.0, 15.0, 15.0, 100.0]),
        ]);
        let cfg = RankConfig::new(2, 1, Direction::Worst);
        assert_eq!(rank_regions(&t, &cfg).unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn test_rank_ties_keep_column_order() {
        let t = table(vec![
            ("C", vec![0.0, 5.0, 10.0]),
            ("A", vec![0.0, 5.0, 10.0]),
            ("B", vec![0.0, 5.0, 10.0]),
        ]);
        for direction in [Direction::Worst, Direction::Best] {
            let cfg = RankConfig::new(2, 3, direction);
            assert_eq!(rank_regions(&t, &cfg).unwrap(), vec!["C", "A", "B"]);
        }
    }

    #[test]
    fn test_rank_k_larger_than_regions() {
        let t = table(vec![("A", vec![0.0, 1.0, 2.0]), ("B", vec![0.0, 3.0, 6.0])]);
        let cfg = RankConfig::new(2, 10, Direction::Best);
        assert_eq!(rank_regions(&t, &cfg).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn test_rank_undefined_scores_last() {
        // A single row has no defined daily change.
        let t = table(vec![("A", vec![1.0]), ("B", vec![2.0])]);
        let cfg = RankConfig::new(2, 2, Direction::Best);
        let scored = rank_regions_scored(&t, &cfg, |_| true).unwrap();
        assert!(scored.iter().all(|r| r.latest.is_none()));
        assert_eq!(scored[0].name, "A");

        let t = table(vec![
            ("gap", vec![0.0, f64::NAN, f64::NAN]),
            ("low", vec![0.0, 1.0, 2.0]),
            ("high", vec![0.0, 5.0, 10.0]),
        ]);
        let worst = RankConfig::new(2, 3, Direction::Worst);
        assert_eq!(rank_regions(&t, &worst).unwrap(), vec!["high", "low", "gap"]);
        let best = RankConfig::new(2, 3, Direction::Best);
        assert_eq!(rank_regions(&t, &best).unwrap(), vec!["low", "high", "gap"]);
    }

    #[test]
    fn test_rank_where_population_floor() {
        let t = table(vec![
            ("Big", vec![0.0, 10.0, 20.0]),
            ("Small", vec![0.0, 100.0, 200.0]),
            ("Unknown", vec![0.0, 1000.0, 2000.0]),
        ]);
        let pops: PopulationTable = vec![("Big", 10_000_000u64), ("Small", 1_000)]
            .into_iter()
            .collect();
        let cfg = RankConfig::new(2, 3, Direction::Worst);
        let ranked = rank_regions_where(&t, &cfg, population_floor(&pops, 5_000_000)).unwrap();
        assert_eq!(ranked, vec!["Big"]);
    }

    #[test]
    fn test_rank_reject_policy_propagates() {
        let t = table(vec![("A", vec![0.0, 10.0, 5.0])]);
        let mut cfg = RankConfig::new(2, 1, Direction::Worst);
        cfg.smoothing.negative_policy = NegativeDeltaPolicy::Reject;
        assert!(matches!(
            rank_regions(&t, &cfg),
            Err(CurvesError::NegativeDelta { .. })
        ));
    }

    // ── milestones ───────────────────────────────────────────────────────────

    #[test]
    fn test_milestones_basic() {
        let m = milestones(&[0.0, 50.0, 150.0, 150.0, 300.0], &[100.0]).unwrap();
        assert_eq!(m, vec![2, 4]);
    }

    #[test]
    fn test_milestones_unreached() {
        match milestones(&[0.0, 10.0, 20.0], &[1000.0]) {
            Err(CurvesError::ThresholdUnreached {
                threshold,
                last_value,
            }) => {
                assert_eq!(threshold, 1000.0);
                assert_eq!(last_value, 20.0);
            }
            other => panic!("expected ThresholdUnreached, got {:?}", other),
        }
    }

    #[test]
    fn test_milestones_requires_strict_exceed() {
        // Equal to the threshold does not count.
        let m = milestones(&[0.0, 100.0, 101.0], &[100.0]).unwrap();
        assert_eq!(m, vec![2, 2]);
    }

    #[test]
    fn test_milestones_invalid_thresholds() {
        assert!(matches!(
            milestones(&[1.0], &[]),
            Err(CurvesError::InvalidThresholds(_))
        ));
        assert!(matches!(
            milestones(&[1.0], &[10.0, 10.0]),
            Err(CurvesError::InvalidThresholds(_))
        ));
        assert!(matches!(
            milestones(&[], &[10.0]),
            Err(CurvesError::EmptySeries(_))
        ));
    }

    #[test]
    fn test_milestone_thresholds() {
        assert_eq!(
            milestone_thresholds(100.0, 1_000_000.0, 3_500_000.0),
            vec![100.0, 1_000_000.0, 2_000_000.0, 3_000_000.0]
        );
        // A multiple equal to the last value is never exceeded, so it is left out.
        assert_eq!(
            milestone_thresholds(100.0, 1_000_000.0, 2_000_000.0),
            vec![100.0, 1_000_000.0]
        );
        assert!(milestone_thresholds(100.0, 1_000_000.0, 100.0).is_empty());
        assert_eq!(milestone_thresholds(100.0, 50.0, 260.0), vec![100.0, 150.0, 200.0, 250.0]);
    }

    #[test]
    fn test_interval_lengths() {
        assert_eq!(interval_lengths(&[2, 9, 30]), vec![7, 21]);
        assert!(interval_lengths(&[4]).is_empty());
    }

    #[test]
    fn test_build_milestone_track() {
        let series = vec![0.0, 50.0, 150.0, 600.0, 900.0, 1200.0, 1300.0];
        let spec = MilestoneSpec {
            first: 100.0,
            step: 500.0,
            unit: 1000.0,
            suffix: "k".to_string(),
        };
        let d = dates(series.len());
        let track = build_milestone_track(&d, &series, &spec, &LabelPolicy::default()).unwrap();

        let labels: Vec<&str> = track.marks.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["100", "500", "1k"]);
        let idx: Vec<usize> = track.marks.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![2, 3, 5]);
        assert_eq!(track.marks[0].date, d[2]);
        assert_eq!(track.terminal, Some(6));

        let days: Vec<usize> = track.segments.iter().map(|s| s.days).collect();
        assert_eq!(days, vec![1, 2, 1]);
        assert_eq!(track.segments[1].midpoint, 4);
        assert_eq!(track.segments[1].label.as_deref(), Some("2d"));
    }

    #[test]
    fn test_build_milestone_track_below_first() {
        let series = vec![0.0, 10.0, 20.0];
        let track = build_milestone_track(
            &dates(3),
            &series,
            &MilestoneSpec::cases(),
            &LabelPolicy::default(),
        )
        .unwrap();
        assert!(track.is_empty());
        assert_eq!(track.terminal, None);
    }

    #[test]
    fn test_build_milestone_track_hidden_labels() {
        let series: Vec<f64> = (0..40).map(|i| (i * 10) as f64).collect();
        let spec = MilestoneSpec::cases().with_step(200.0);
        let policy = LabelPolicy::new(vec![(30, LabelFormat::Long)]);
        let track = build_milestone_track(&dates(40), &series, &spec, &policy).unwrap();
        assert!(track.segments.iter().all(|s| s.label.is_none()));
    }

    // ── normalisation / alignment ────────────────────────────────────────────

    #[test]
    fn test_normalize_identity_unit() {
        let pop = |p| NonZeroU64::new(p).unwrap();
        assert_eq!(normalize(&[100.0, 200.0], pop(100_000), 100_000.0), vec![100.0, 200.0]);
        assert_eq!(normalize(&[50.0], pop(1_000_000), 100_000.0), vec![5.0]);
    }

    #[test]
    fn test_normalize_region_zero_population() {
        let t = table(vec![("A", vec![1.0, 2.0])]);
        let pops: PopulationTable = vec![("A", 0u64)].into_iter().collect();
        match normalize_region(&t, &pops, "A", 1e5) {
            Err(CurvesError::InvalidPopulation { region, population }) => {
                assert_eq!(region, "A");
                assert_eq!(population, 0);
            }
            other => panic!("expected InvalidPopulation, got {:?}", other),
        }
        assert!(matches!(
            normalize_table(&t, &pops, 1e5),
            Err(CurvesError::InvalidPopulation { .. })
        ));
    }

    #[test]
    fn test_normalize_region_missing_population() {
        let t = table(vec![("A", vec![1.0, 2.0])]);
        let pops = PopulationTable::new();
        assert!(matches!(
            normalize_region(&t, &pops, "A", 1e5),
            Err(CurvesError::MissingPopulation(_))
        ));
        assert!(matches!(
            normalize_region(&t, &pops, "Z", 1e5),
            Err(CurvesError::MissingRegion(_))
        ));
    }

    #[test]
    fn test_normalize_table() {
        let t = table(vec![("A", vec![10.0, 20.0]), ("B", vec![1.0, 3.0])]);
        let pops: PopulationTable = vec![("A", 1_000u64), ("B", 100)].into_iter().collect();
        let n = normalize_table(&t, &pops, 1_000.0).unwrap();
        assert_eq!(n.region("A").unwrap(), &[10.0, 20.0]);
        assert_eq!(n.region("B").unwrap(), &[10.0, 30.0]);
        assert_eq!(n.regions(), t.regions());
    }

    #[test]
    fn test_days_since() {
        assert_eq!(days_since(&[10.0, 99.0, 150.0, 400.0], 100.0), vec![150.0, 400.0]);
        assert!(days_since(&[1.0, 2.0], 100.0).is_empty());
    }

    #[test]
    fn test_resample_weekly_sunday_closed() {
        // 2020-03-01 is a Sunday.
        let d = dates(9);
        let deltas = vec![
            None,
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(1.0),
            Some(5.0),
        ];
        let weeks = resample_weekly(&d, &deltas);
        assert_eq!(weeks.len(), 3);
        assert_eq!(weeks[0], (d[0], 0.0));
        assert_eq!(weeks[1], (d[7], 7.0));
        assert_eq!(weeks[2].1, 5.0);
    }
}
