//! Overlaid cumulative curves: one line per region on a shared axis.

use chrono::NaiveDate;
use curves_core::analytics::{days_since, normalize};
use curves_core::error::Result;
use curves_core::formatting::{format_count, format_number};
use curves_core::models::{Dataset, Metric};
use curves_core::regions::{Alignment, OverlayConfig};
use ratatui::{
    layout::{Constraint, Rect},
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Borders, Chart, Dataset as ChartDataset, GraphType},
    Frame,
};

use crate::grid_view::date_labels;
use crate::themes::Theme;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySeries {
    pub name: String,
    /// `(x, y)` in plot units: y is already `log10` on log charts.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlot {
    pub title: String,
    pub x_title: String,
    pub y_title: String,
    pub series: Vec<OverlaySeries>,
    pub log_scale: bool,
    /// Dates under the x axis of date-aligned charts.
    pub dates: Option<Vec<NaiveDate>>,
    pub x_max: f64,
    pub y_bounds: [f64; 2],
}

impl OverlayPlot {
    pub fn build(config: &OverlayConfig, dataset: &Dataset) -> Result<Self> {
        let table = dataset.table.select(&config.members)?;
        let noun = match config.metric {
            Metric::Cases => "Cases",
            Metric::Deaths => "Deaths",
        };

        let offset = match (config.alignment, config.start) {
            (Alignment::Date, Some(start)) => table.dates().partition_point(|d| *d < start),
            _ => 0,
        };

        let mut series = Vec::with_capacity(config.members.len());
        for name in &config.members {
            let raw = table.region(name)?;
            // Alignment uses absolute counts, before any per-capita scaling.
            let aligned: Vec<f64> = match config.alignment {
                Alignment::Date => raw[offset..].to_vec(),
                Alignment::DaysSince => days_since(raw, config.n_min),
            };
            let values = match config.capita {
                Some(capita) => normalize(&aligned, dataset.populations.require(name)?, capita),
                None => aligned,
            };

            let points = values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as f64, *v))
                .filter_map(|(x, y)| {
                    if !config.log_scale {
                        Some((x, y))
                    } else if y > 0.0 {
                        Some((x, y.log10()))
                    } else {
                        None
                    }
                })
                .collect();
            series.push(OverlaySeries {
                name: name.clone(),
                points,
            });
        }

        let all = || series.iter().flat_map(|s| s.points.iter());
        let x_max = all().map(|(x, _)| *x).fold(1.0_f64, f64::max);
        let y_max = all().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max);
        let y_min = all().map(|(_, y)| *y).fold(f64::INFINITY, f64::min);
        let y_bounds = if config.log_scale {
            if y_max.is_finite() {
                [y_min.floor().min(y_max.ceil() - 1.0), y_max.ceil().max(y_min.floor() + 1.0)]
            } else {
                [0.0, 1.0]
            }
        } else {
            [0.0, if y_max.is_finite() && y_max > 0.0 { y_max } else { 1.0 }]
        };

        let x_title = match config.alignment {
            Alignment::Date => "Date".to_string(),
            Alignment::DaysSince => format!("Days Since {} {}", config.n_min, noun),
        };
        let y_title = match config.capita {
            Some(capita) => format!("Number of {} Per {}", noun, format_count(capita)),
            None => format!("Number of {}", noun),
        };
        let dates = (config.alignment == Alignment::Date).then(|| table.dates()[offset..].to_vec());

        tracing::debug!(
            chart = %config.file_stem,
            series = series.len(),
            "overlay built"
        );
        Ok(Self {
            title: config.title.clone(),
            x_title,
            y_title,
            series,
            log_scale: config.log_scale,
            dates,
            x_max,
            y_bounds,
        })
    }

    pub fn x_labels(&self) -> Vec<String> {
        match &self.dates {
            Some(dates) => date_labels(dates),
            None => vec![
                "0".to_string(),
                format_count(self.x_max / 2.0),
                format_count(self.x_max),
            ],
        }
    }

    /// One label per power of ten on log charts, three ticks otherwise.
    pub fn y_labels(&self) -> Vec<String> {
        let [lo, hi] = self.y_bounds;
        if self.log_scale {
            (lo as i32..=hi as i32)
                .map(|p| format_tick(10_f64.powi(p)))
                .collect()
        } else {
            vec![format_tick(lo), format_tick(hi / 2.0), format_tick(hi)]
        }
    }
}

fn format_tick(v: f64) -> String {
    if v != 0.0 && v.abs() < 10.0 && v.fract() != 0.0 {
        format_number(v, if v.abs() < 1.0 { 2 } else { 1 })
    } else {
        format_count(v)
    }
}

pub fn render_overlay(frame: &mut Frame, area: Rect, plot: &OverlayPlot, theme: &Theme) {
    let datasets: Vec<ChartDataset> = plot
        .series
        .iter()
        .enumerate()
        .map(|(i, s)| {
            ChartDataset::default()
                .name(s.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(theme.series_style(i))
                .data(&s.points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.axis)
                .title(Line::styled(format!(" {} ", plot.title), theme.panel_title)),
        )
        .x_axis(
            Axis::default()
                .title(Line::styled(plot.x_title.clone(), theme.label))
                .style(theme.axis)
                .bounds([0.0, plot.x_max])
                .labels(plot.x_labels()),
        )
        .y_axis(
            Axis::default()
                .title(Line::styled(plot.y_title.clone(), theme.label))
                .style(theme.axis)
                .bounds(plot.y_bounds)
                .labels(plot.y_labels()),
        )
        .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));
    frame.render_widget(chart, area);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::render_to_text;
    use curves_core::error::CurvesError;
    use curves_core::models::{PopulationTable, Source, TimeSeriesTable};
    use curves_core::regions::RegionSet;

    fn dataset() -> Dataset {
        let start = NaiveDate::from_ymd_opt(2020, 2, 28).unwrap();
        let dates = (0..5).map(|i| start + chrono::Days::new(i)).collect();
        let table = TimeSeriesTable::from_columns(
            dates,
            vec![
                ("Ohio", vec![10.0, 50.0, 150.0, 1_000.0, 10_000.0]),
                ("Texas", vec![0.0, 0.0, 0.0, 200.0, 2_000.0]),
            ],
        )
        .unwrap();
        let populations: PopulationTable = vec![("Ohio", 1_000_000u64), ("Texas", 2_000_000)]
            .into_iter()
            .collect();
        Dataset {
            source: Source::Us,
            metric: Metric::Cases,
            table,
            populations,
        }
    }

    fn config(alignment: Alignment, capita: Option<f64>, log_scale: bool) -> OverlayConfig {
        OverlayConfig {
            set: RegionSet::Usa,
            source: Source::Us,
            metric: Metric::Cases,
            members: vec!["Ohio".to_string(), "Texas".to_string()],
            alignment,
            capita,
            log_scale,
            n_min: 100.0,
            start: NaiveDate::from_ymd_opt(2020, 3, 1),
            title: "Number of Cases by Date".to_string(),
            file_stem: "usa_date".to_string(),
        }
    }

    #[test]
    fn test_date_alignment_starts_at_start_date() {
        let plot = OverlayPlot::build(&config(Alignment::Date, None, false), &dataset()).unwrap();
        let ohio = &plot.series[0];
        assert_eq!(ohio.points, vec![(0.0, 150.0), (1.0, 1_000.0), (2.0, 10_000.0)]);
        assert_eq!(plot.dates.as_ref().map(Vec::len), Some(3));
        assert_eq!(plot.x_title, "Date");
        assert_eq!(plot.y_title, "Number of Cases");
        assert_eq!(plot.y_bounds, [0.0, 10_000.0]);
    }

    #[test]
    fn test_days_since_alignment_then_per_capita() {
        let cfg = config(Alignment::DaysSince, Some(100_000.0), false);
        let plot = OverlayPlot::build(&cfg, &dataset()).unwrap();

        // Aligned on absolute counts above 100, scaled afterwards.
        assert_eq!(
            plot.series[0].points,
            vec![(0.0, 15.0), (1.0, 100.0), (2.0, 1_000.0)]
        );
        assert_eq!(plot.series[1].points, vec![(0.0, 10.0), (1.0, 100.0)]);
        assert!(plot.dates.is_none());
        assert_eq!(plot.x_title, "Days Since 100 Cases");
        assert_eq!(plot.y_title, "Number of Cases Per 100,000");
        assert_eq!(plot.x_labels(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_log_scale_drops_zeros() {
        let mut cfg = config(Alignment::Date, None, true);
        cfg.start = None;
        let plot = OverlayPlot::build(&cfg, &dataset()).unwrap();
        let texas = &plot.series[1];
        assert_eq!(texas.points.len(), 2);
        assert!((texas.points[0].1 - 200_f64.log10()).abs() < 1e-12);
        assert_eq!(plot.y_bounds, [1.0, 4.0]);
        assert_eq!(plot.y_labels(), vec!["10", "100", "1,000", "10,000"]);
    }

    #[test]
    fn test_missing_population_fails_per_capita_only() {
        let mut ds = dataset();
        ds.populations = PopulationTable::new();
        let err = OverlayPlot::build(&config(Alignment::Date, Some(1e5), false), &ds).unwrap_err();
        assert!(matches!(err, CurvesError::MissingPopulation(r) if r == "Ohio"));
        assert!(OverlayPlot::build(&config(Alignment::Date, None, false), &ds).is_ok());
    }

    #[test]
    fn test_missing_member_fails() {
        let mut cfg = config(Alignment::Date, None, false);
        cfg.members.push("Atlantis".to_string());
        let err = OverlayPlot::build(&cfg, &dataset()).unwrap_err();
        assert!(matches!(err, CurvesError::MissingRegion(_)));
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(0.0), "0");
        assert_eq!(format_tick(0.25), "0.25");
        assert_eq!(format_tick(2.5), "2.5");
        assert_eq!(format_tick(12_500.0), "12,500");
    }

    #[test]
    fn test_render_overlay() {
        let plot = OverlayPlot::build(&config(Alignment::Date, None, false), &dataset()).unwrap();
        let theme = Theme::dark();
        let text = render_to_text(100, 30, |frame| {
            let area = frame.area();
            render_overlay(frame, area, &plot, &theme);
        })
        .unwrap();
        assert!(text.contains("Number of Cases by Date"));
        assert!(text.contains("Ohio"));
        assert!(text.contains("Texas"));
        assert!(text.contains("Mar 1"));
    }
}
