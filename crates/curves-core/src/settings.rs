use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CurvesError, Result};
use crate::models::{Direction, Metric, NegativeDeltaPolicy, RankConfig, SmoothingConfig, Source};
use crate::regions::RegionSet;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// COVID-19 case and death curves: grids, overlays, rankings and a dashboard
#[derive(Parser, Debug, Clone)]
#[command(
    name = "covid-curves",
    about = "COVID-19 case and death curves: grids, overlays, rankings and a dashboard",
    version
)]
pub struct Settings {
    /// What to produce
    #[arg(long, default_value = "grid", value_parser = ["grid", "overlay", "rank", "dashboard", "all"])]
    pub view: String,

    /// Region sets (comma separated)
    #[arg(
        long,
        default_value = "world",
        value_delimiter = ',',
        value_parser = ["world", "global", "usa", "latin", "eu_vs_usa", "worst_usa", "worst_world", "worst_global", "worst_counties"]
    )]
    pub regions: Vec<String>,

    /// Plot deaths instead of confirmed cases
    #[arg(long)]
    pub deaths: bool,

    /// Rolling-average window in days
    #[arg(long, default_value = "7", value_parser = clap::value_parser!(u16).range(1..=60))]
    pub window: u16,

    /// Minimum observations per window
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u16).range(1..=60))]
    pub min_periods: u16,

    /// Use a centered window instead of a trailing one
    #[arg(long)]
    pub centered: bool,

    /// Number of regions to rank
    #[arg(long, default_value = "9")]
    pub top: usize,

    /// Ranking direction
    #[arg(long, default_value = "worst", value_parser = ["worst", "best"])]
    pub direction: String,

    /// Per-capita unit (default: 100,000 for US data, 1,000,000 for global)
    #[arg(long)]
    pub capita: Option<u64>,

    /// Rank and plot per-capita values
    #[arg(long)]
    pub per_capita: bool,

    /// Only rank regions with a population above this floor
    #[arg(long)]
    pub min_population: Option<u64>,

    /// Handling of negative daily changes
    #[arg(long, default_value = "clamp", value_parser = ["keep", "clamp", "reject"])]
    pub negative: String,

    /// Annotate every grid panel with milestones
    #[arg(long)]
    pub milestones: bool,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Directory for downloaded data files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Directory for chart files
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Reuse local data files younger than this many hours
    #[arg(long, default_value = "12")]
    pub max_age_hours: u64,

    /// Never download; use local files only
    #[arg(long)]
    pub offline: bool,

    /// Base URL of the JHU time series directory
    #[arg(long, env = "COVID_CURVES_BASE_URL")]
    pub base_url: Option<String>,

    /// Print rankings as JSON
    #[arg(long)]
    pub json: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.covid-curves/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capita: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
}

impl LastUsedParams {
    /// `~/.covid-curves/last_used.json`
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".covid-curves").join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Write params via a temp file and rename, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit args and config path.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "could not clear saved configuration");
            }
            return settings.apply_debug();
        }

        let last = LastUsedParams::load_from(config_path);

        // clap keys args by field name (underscores).
        if !is_arg_explicitly_set(&matches, "view") {
            if let Some(v) = last.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = last.theme {
                settings.theme = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "regions") {
            if let Some(v) = last.regions.filter(|r| !r.is_empty()) {
                settings.regions = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "window") {
            if let Some(v) = last.window {
                settings.window = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top") {
            if let Some(v) = last.top {
                settings.top = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "direction") {
            if let Some(v) = last.direction {
                settings.direction = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "negative") {
            if let Some(v) = last.negative {
                settings.negative = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "capita") && settings.capita.is_none() {
            settings.capita = last.capita;
        }

        settings = settings.apply_debug();

        if let Err(e) = LastUsedParams::from(&settings).save_to(config_path) {
            tracing::warn!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    // ── Typed accessors ────────────────────────────────────────────────────────

    pub fn metric(&self) -> Metric {
        Metric::from_deaths_flag(self.deaths)
    }

    pub fn direction(&self) -> Result<Direction> {
        Direction::from_name(&self.direction)
    }

    pub fn negative_policy(&self) -> Result<NegativeDeltaPolicy> {
        NegativeDeltaPolicy::from_name(&self.negative)
    }

    pub fn smoothing(&self) -> Result<SmoothingConfig> {
        let cfg = SmoothingConfig {
            window: usize::from(self.window),
            min_periods: usize::from(self.min_periods.min(self.window)),
            centered: self.centered,
            negative_policy: self.negative_policy()?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn rank_config(&self) -> Result<RankConfig> {
        Ok(RankConfig {
            smoothing: self.smoothing()?,
            k: self.top,
            direction: self.direction()?,
        })
    }

    pub fn region_sets(&self) -> Result<Vec<RegionSet>> {
        let mut sets = Vec::with_capacity(self.regions.len());
        for name in &self.regions {
            let set = RegionSet::from_name(name)?;
            if !sets.contains(&set) {
                sets.push(set);
            }
        }
        if sets.is_empty() {
            return Err(CurvesError::Config("no region sets requested".to_string()));
        }
        Ok(sets)
    }

    /// Per-capita unit for `source`, honouring `--capita`.
    pub fn capita_for(&self, source: Source) -> f64 {
        if let Some(c) = self.capita {
            return c as f64;
        }
        match source {
            Source::Global => 1_000_000.0,
            Source::Us => 100_000.0,
            Source::UsCounties => 1_000.0,
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            theme: Some(s.theme.clone()),
            view: Some(s.view.clone()),
            regions: Some(s.regions.clone()),
            window: Some(s.window),
            top: Some(s.top),
            direction: Some(s.direction.clone()),
            capita: s.capita,
            negative: Some(s.negative.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
