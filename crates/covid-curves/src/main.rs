mod bootstrap;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use curves_core::analytics::MilestoneSpec;
use curves_core::formatting::format_count;
use curves_core::models::{Direction, Source};
use curves_core::regions::{overlay_configs, RegionSet};
use curves_core::settings::Settings;
use curves_data::analysis::weekly_per_capita;
use curves_data::fetch::{FetchOptions, JHU_URL};
use curves_runtime::data_manager::DataManager;
use curves_runtime::orchestrator::{standard_jobs, BatchReport, PlotJob, PlotOrchestrator};
use curves_ui::app::Dashboard;
use curves_ui::export::{render_to_text, TextExporter};
use curves_ui::rank_view::{
    build_per_capita_rank_rows, build_rank_rows, render_no_data, render_rank_view,
    weekly_rank_rows, RankRow,
};
use curves_ui::themes::Theme;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    let app_dir = bootstrap::ensure_directories()?;
    // The dashboard owns the terminal; its log lines go to a file.
    let log_file = settings.log_file.clone().or_else(|| {
        (settings.view == "dashboard").then(|| app_dir.join("logs").join("covid-curves.log"))
    });
    bootstrap::setup_logging(&settings.log_level, log_file.as_ref())?;

    tracing::info!("covid-curves v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        view = %settings.view,
        regions = %settings.regions.join(","),
        metric = %settings.metric(),
        theme = %settings.theme,
        "settings"
    );

    let mut data = DataManager::from_options(fetch_options(&settings, &app_dir))?;
    let theme = Theme::from_name(&settings.theme);
    let out_dir = settings
        .out_dir
        .clone()
        .unwrap_or_else(|| app_dir.join("plots"));

    match settings.view.as_str() {
        "grid" => {
            let jobs = grid_jobs(&settings)?;
            run_batch(&settings, &jobs, &mut data, theme, &out_dir)
        }
        "overlay" => {
            let jobs = overlay_jobs(&settings)?;
            run_batch(&settings, &jobs, &mut data, theme, &out_dir)
        }
        "all" => {
            let jobs = standard_jobs(settings.metric(), settings.capita_for(Source::Us))?;
            run_batch(&settings, &jobs, &mut data, theme, &out_dir)
        }
        "rank" => print_rankings(&settings, &mut data, &theme),
        "dashboard" => {
            tracing::info!("starting dashboard");
            let dashboard = Dashboard::new(&mut data, theme, settings.metric(), settings.smoothing()?)?;
            dashboard.run()?;
            Ok(())
        }
        unknown => bail!("unknown view: {}", unknown),
    }
}

fn fetch_options(settings: &Settings, app_dir: &Path) -> FetchOptions {
    FetchOptions {
        base_url: settings
            .base_url
            .clone()
            .unwrap_or_else(|| JHU_URL.to_string()),
        data_dir: settings
            .data_dir
            .clone()
            .unwrap_or_else(|| app_dir.join("data")),
        max_age: Duration::from_secs(settings.max_age_hours.saturating_mul(3600)),
        offline: settings.offline,
        ..FetchOptions::default()
    }
}

// ── Chart views ────────────────────────────────────────────────────────────────

fn grid_jobs(settings: &Settings) -> Result<Vec<PlotJob>> {
    let metric = settings.metric();
    Ok(settings
        .region_sets()?
        .into_iter()
        .map(|set| {
            let config = set.grid_config(metric);
            if settings.milestones {
                PlotJob::Grid(config.with_milestones(MilestoneSpec::for_metric(metric)))
            } else {
                PlotJob::Grid(config)
            }
        })
        .collect())
}

/// Overlay charts exist for `usa` and `world` only; other sets are skipped.
fn overlay_jobs(settings: &Settings) -> Result<Vec<PlotJob>> {
    let mut jobs = Vec::new();
    for set in settings.region_sets()? {
        if !matches!(set, RegionSet::Usa | RegionSet::World) {
            tracing::warn!(set = %set, "no overlay charts for this region set");
            continue;
        }
        let capita = settings.capita_for(set.source());
        jobs.extend(
            overlay_configs(set, settings.metric(), capita)?
                .into_iter()
                .map(PlotJob::Overlay),
        );
    }
    if jobs.is_empty() {
        bail!("no overlay charts for the requested region sets");
    }
    Ok(jobs)
}

fn run_batch(
    settings: &Settings,
    jobs: &[PlotJob],
    data: &mut DataManager,
    theme: Theme,
    out_dir: &Path,
) -> Result<()> {
    let renderer = TextExporter::new(theme, settings.smoothing()?);
    let report = PlotOrchestrator::new(out_dir).run(jobs, data, &renderer)?;
    print_report(&report);
    if !report.is_success() {
        bail!(
            "{} of {} charts failed",
            report.failures.len(),
            report.total()
        );
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    for path in &report.written {
        println!("wrote {}", path.display());
    }
    for failure in &report.failures {
        eprintln!("failed {}: {}", failure.job, failure.error);
    }
}

// ── Rankings ───────────────────────────────────────────────────────────────────

fn print_rankings(settings: &Settings, data: &mut DataManager, theme: &Theme) -> Result<()> {
    let rank = settings.rank_config()?;
    let metric = settings.metric();

    for set in settings.region_sets()? {
        let source = set.source();
        let capita = settings.capita_for(source);
        let dataset = data.get(source, metric)?;

        let (title, rows) = if source == Source::UsCounties {
            // County tables rank on weekly new counts per capita.
            let weekly = weekly_per_capita(
                &dataset.table,
                &dataset.populations,
                capita,
                rank.smoothing.negative_policy,
            )?;
            let title = format!(
                "Weekly new {} per {}, worst {} counties",
                metric,
                format_count(capita),
                rank.k
            );
            (title, weekly_rank_rows(&weekly, rank.k))
        } else {
            let rows = if settings.per_capita {
                build_per_capita_rank_rows(dataset, &rank, capita, settings.min_population)?
            } else {
                build_rank_rows(dataset, &rank, capita, settings.min_population)?
            };
            let direction = match rank.direction {
                Direction::Worst => "Worst",
                Direction::Best => "Best",
            };
            let title = format!(
                "{} {} of {} by {}-day average of new {}",
                direction, rank.k, set, rank.smoothing.window, metric
            );
            (title, rows)
        };

        if settings.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            println!("{}", rank_table(&title, capita, &rows, theme)?);
        }
    }
    Ok(())
}

fn rank_table(title: &str, capita: f64, rows: &[RankRow], theme: &Theme) -> Result<String> {
    let capita_label = format!("Per {}", format_count(capita));
    let height = (rows.len() as u16).saturating_add(3).max(7);
    let text = render_to_text(110, height, |frame| {
        let area = frame.area();
        if rows.is_empty() {
            render_no_data(frame, area, theme);
        } else {
            render_rank_view(frame, area, title, &capita_label, rows, rows.len().min(3), theme);
        }
    })?;
    Ok(text)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use curves_core::error::CurvesError;
    use curves_core::models::Metric;
    use curves_data::fetch::{time_series_filename, COUNTY_POPULATION_FILE};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_options_from_settings() {
        let settings = Settings::parse_from([
            "covid-curves",
            "--offline",
            "--max-age-hours",
            "2",
            "--base-url",
            "http://localhost:8000/series",
        ]);
        let opts = fetch_options(&settings, Path::new("/tmp/app"));
        assert!(opts.offline);
        assert_eq!(opts.max_age, Duration::from_secs(7200));
        assert_eq!(opts.base_url, "http://localhost:8000/series");
        assert_eq!(opts.data_dir, PathBuf::from("/tmp/app/data"));
    }

    #[test]
    fn test_grid_jobs_with_milestones() {
        let settings = Settings::parse_from([
            "covid-curves",
            "--regions",
            "world,worst_usa",
            "--deaths",
            "--milestones",
        ]);
        let jobs = grid_jobs(&settings).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].file_stem(), "global_new_deaths");
        assert_eq!(jobs[1].metric(), Metric::Deaths);
        match &jobs[1] {
            PlotJob::Grid(cfg) => assert!(cfg.milestones.is_some()),
            other => panic!("expected a grid job, got {:?}", other),
        }
    }

    #[test]
    fn test_overlay_jobs_skip_sets_without_overlays() {
        let settings = Settings::parse_from(["covid-curves", "--regions", "usa,latin"]);
        let jobs = overlay_jobs(&settings).unwrap();
        assert_eq!(jobs.len(), 8);
        assert!(jobs.iter().all(|j| j.source() == Source::Us));

        let settings = Settings::parse_from(["covid-curves", "--regions", "latin"]);
        assert!(overlay_jobs(&settings).is_err());
    }

    // Autauga's total drops from 10 to 4 on March 3.
    const COUNTY_CASES: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,3/1/20,3/2/20,3/3/20,3/4/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",0,10,4,14
";

    const COUNTY_POPS: &str = "\
SUMLEV,STATE,COUNTY,STNAME,CTYNAME,POPESTIMATE2019
50,1,1,Alabama,Autauga County,55869
";

    fn county_settings(dir: &TempDir, negative: &str) -> Settings {
        fs::write(
            dir.path().join(time_series_filename(Source::UsCounties, Metric::Cases)),
            COUNTY_CASES,
        )
        .expect("write cases");
        fs::write(dir.path().join(COUNTY_POPULATION_FILE), COUNTY_POPS).expect("write pops");
        let data_dir = dir.path().to_string_lossy().to_string();
        Settings::parse_from([
            "covid-curves",
            "--view",
            "rank",
            "--regions",
            "worst_counties",
            "--negative",
            negative,
            "--offline",
            "--json",
            "--data-dir",
            data_dir.as_str(),
        ])
    }

    #[test]
    fn test_county_rankings_follow_negative_policy() {
        let dir = TempDir::new().expect("tempdir");

        let settings = county_settings(&dir, "reject");
        let mut data = DataManager::from_options(fetch_options(&settings, dir.path())).unwrap();
        let err = print_rankings(&settings, &mut data, &Theme::classic()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CurvesError>(),
            Some(CurvesError::NegativeDelta { index: 2, .. })
        ));

        let settings = county_settings(&dir, "clamp");
        let mut data = DataManager::from_options(fetch_options(&settings, dir.path())).unwrap();
        assert!(print_rankings(&settings, &mut data, &Theme::classic()).is_ok());
    }

    #[test]
    fn test_rank_table_text() {
        let rows = vec![RankRow {
            rank: 1,
            region: "Italy".to_string(),
            latest: Some(250.0),
            per_capita: Some(4.2),
            population: Some(60_000_000),
        }];
        let text = rank_table("Worst 1 of world", 1e6, &rows, &Theme::classic()).unwrap();
        assert!(text.contains("Worst 1 of world"));
        assert!(text.contains("Per 1,000,000"));
        assert!(text.contains("Italy"));

        let empty = rank_table("Worst 0", 1e6, &[], &Theme::classic()).unwrap();
        assert!(empty.contains("No regions to rank"));
    }
}
