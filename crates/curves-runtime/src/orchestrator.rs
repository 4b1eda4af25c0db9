//! Batch chart orchestrator.
//!
//! Runs a list of [`PlotJob`]s one after another. Each job fetches its
//! dataset through the shared [`DataManager`] and hands it to a
//! [`PlotRenderer`] supplied by the presentation layer. A failing job is
//! logged and recorded in the [`BatchReport`]; the remaining jobs still run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use curves_core::error::Result;
use curves_core::models::{Dataset, Metric, Source};
use curves_core::regions::{overlay_configs, GridConfig, OverlayConfig, RegionSet};
use serde::Serialize;

use crate::data_manager::DataManager;

// ── Jobs ──────────────────────────────────────────────────────────────────────

/// One chart to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotJob {
    Grid(GridConfig),
    Overlay(OverlayConfig),
}

impl PlotJob {
    pub fn source(&self) -> Source {
        match self {
            PlotJob::Grid(cfg) => cfg.source,
            PlotJob::Overlay(cfg) => cfg.source,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            PlotJob::Grid(cfg) => cfg.metric,
            PlotJob::Overlay(cfg) => cfg.metric,
        }
    }

    /// Output file name without extension; also the job's name in reports.
    pub fn file_stem(&self) -> &str {
        match self {
            PlotJob::Grid(cfg) => &cfg.file_stem,
            PlotJob::Overlay(cfg) => &cfg.file_stem,
        }
    }
}

/// Draws charts and writes them under an output directory.
pub trait PlotRenderer {
    /// Write a grid chart and return the path of the file written.
    fn render_grid(&self, config: &GridConfig, dataset: &Dataset, out_dir: &Path)
        -> Result<PathBuf>;

    /// Write an overlay chart and return the path of the file written.
    fn render_overlay(
        &self,
        config: &OverlayConfig,
        dataset: &Dataset,
        out_dir: &Path,
    ) -> Result<PathBuf>;
}

/// The "make all plots" batch: grids for world, usa, latin and eu_vs_usa,
/// then the usa overlay charts at `usa_capita` people per unit.
pub fn standard_jobs(metric: Metric, usa_capita: f64) -> Result<Vec<PlotJob>> {
    let mut jobs: Vec<PlotJob> = [
        RegionSet::World,
        RegionSet::Usa,
        RegionSet::Latin,
        RegionSet::EuVsUsa,
    ]
    .iter()
    .map(|set| PlotJob::Grid(set.grid_config(metric)))
    .collect();
    jobs.extend(
        overlay_configs(RegionSet::Usa, metric, usa_capita)?
            .into_iter()
            .map(PlotJob::Overlay),
    );
    Ok(jobs)
}

// ── BatchReport ───────────────────────────────────────────────────────────────

/// A job that did not produce a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub job: String,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<JobFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

// ── PlotOrchestrator ──────────────────────────────────────────────────────────

pub struct PlotOrchestrator {
    out_dir: PathBuf,
}

impl PlotOrchestrator {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run `jobs` in order.
    ///
    /// Only a missing output directory that cannot be created fails the
    /// whole batch; job errors end up in the report.
    pub fn run<R: PlotRenderer>(
        &self,
        jobs: &[PlotJob],
        data: &mut DataManager,
        renderer: &R,
    ) -> Result<BatchReport> {
        fs::create_dir_all(&self.out_dir)?;
        let started = Instant::now();
        let mut report = BatchReport::default();

        for job in jobs {
            match self.run_one(job, data, renderer) {
                Ok(path) => {
                    tracing::info!(job = job.file_stem(), path = %path.display(), "chart written");
                    report.written.push(path);
                }
                Err(e) => {
                    tracing::warn!(job = job.file_stem(), error = %e, "chart failed");
                    report.failures.push(JobFailure {
                        job: job.file_stem().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            written = report.written.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        Ok(report)
    }

    fn run_one<R: PlotRenderer>(
        &self,
        job: &PlotJob,
        data: &mut DataManager,
        renderer: &R,
    ) -> Result<PathBuf> {
        let dataset = data.get(job.source(), job.metric())?;
        match job {
            PlotJob::Grid(cfg) => renderer.render_grid(cfg, dataset, &self.out_dir),
            PlotJob::Overlay(cfg) => renderer.render_overlay(cfg, dataset, &self.out_dir),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
