//! Grid of daily-change panels.
//!
//! Each panel shows the daily change of one region as bars, a rolling
//! average over them, the running total and the latest value. The
//! two-panel comparison grid also gets a milestone track, population in the
//! title and a y axis shared by both panels.

use chrono::NaiveDate;
use curves_core::analytics::{
    apply_negative_policy, build_milestone_track, daily_change, rank_regions, rolling_average,
    MilestoneTrack,
};
use curves_core::error::Result;
use curves_core::formatting::format_count;
use curves_core::models::{Dataset, Direction, RankConfig, SmoothingConfig};
use curves_core::regions::{GridConfig, Selection};
use curves_core::time_utils::short_label;
use curves_data::aggregator::add_composite_population;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Borders, Chart, Dataset as ChartDataset, GraphType, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::components::milestone_track::MilestoneTrackView;
use crate::themes::Theme;

// ── Model ─────────────────────────────────────────────────────────────────────

/// One region's panel, already cut to the visible date range.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub region: String,
    pub title: String,
    /// Bottom-left annotation (`"Total: 1,234"` on comparison grids).
    pub annotation: Option<String>,
    pub dates: Vec<NaiveDate>,
    pub bars: Vec<Option<f64>>,
    pub trend: Vec<Option<f64>>,
    /// Sum of every daily change, including the hidden leading days.
    pub total: f64,
    /// Daily change on the last date.
    pub last: f64,
    /// Largest bar or trend value on screen, at least 1.
    pub peak: f64,
    pub milestones: Option<MilestoneTrack>,
}

impl Panel {
    pub fn last_label(&self) -> String {
        format!("Last: {}", format_count(self.last))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPlot {
    /// `"New daily cases"`.
    pub title: String,
    pub as_of: Option<NaiveDate>,
    pub rows: usize,
    pub cols: usize,
    pub panels: Vec<Panel>,
    /// Shared upper y bound, when panels share an axis.
    pub shared_peak: Option<f64>,
}

impl GridPlot {
    /// Compute every panel of `config` from `dataset`.
    ///
    /// `smoothing` drives the trend line. `Worst(k)` selections rank with a
    /// trailing window of the same width.
    pub fn build(config: &GridConfig, dataset: &Dataset, smoothing: &SmoothingConfig) -> Result<Self> {
        smoothing.validate()?;
        let mut table = dataset.table.clone();
        let mut pops = dataset.populations.clone();
        if let Some(composite) = &config.composite {
            table = table.with_composite(&composite.name, &composite.members)?;
            add_composite_population(&mut pops, &composite.name, &composite.members);
        }

        let mut names = match &config.selection {
            Selection::Members(names) => names.clone(),
            Selection::Worst(k) => {
                let rank = RankConfig {
                    smoothing: SmoothingConfig::trailing(smoothing.window)
                        .with_policy(smoothing.negative_policy),
                    k: *k,
                    direction: Direction::Worst,
                };
                rank_regions(&table, &rank)?
            }
        };
        names.truncate(config.panel_count());

        let dates = table.dates();
        let offset = config
            .start
            .map_or(0, |start| dates.partition_point(|d| *d < start));

        let mut panels = Vec::with_capacity(names.len());
        for name in names {
            let series = table.region(&name)?;
            let deltas = apply_negative_policy(daily_change(series), smoothing.negative_policy, &name)?;
            let trend = rolling_average(
                &deltas,
                smoothing.window,
                smoothing.min_periods,
                smoothing.centered,
            );
            let total: f64 = deltas.iter().flatten().sum();
            let last = deltas.last().copied().flatten().unwrap_or(0.0);

            let bars = deltas[offset..].to_vec();
            let trend = trend[offset..].to_vec();
            let peak = bars
                .iter()
                .chain(&trend)
                .flatten()
                .fold(1.0_f64, |m, v| m.max(*v));

            let milestones = match &config.milestones {
                Some(spec) => Some(build_milestone_track(
                    &dates[offset..],
                    &series[offset..],
                    spec,
                    &config.label_policy,
                )?),
                None => None,
            };

            let (title, annotation) = if config.show_population {
                let title = match pops.get(&name) {
                    Some(p) => format!(
                        "{}, population: {} million",
                        name,
                        (p as f64 / 1e6).round() as u64
                    ),
                    None => name.clone(),
                };
                (title, Some(format!("Total: {}", format_count(total))))
            } else {
                (format!("{}, total: {}", name, format_count(total)), None)
            };

            panels.push(Panel {
                region: name,
                title,
                annotation,
                dates: dates[offset..].to_vec(),
                bars,
                trend,
                total,
                last,
                peak,
                milestones,
            });
        }

        let shared_peak = config
            .shared_ylim
            .then(|| panels.iter().map(|p| p.peak).fold(1.0_f64, f64::max));

        tracing::debug!(
            set = %config.set,
            panels = panels.len(),
            offset,
            "grid built"
        );
        Ok(Self {
            title: format!("New daily {}", config.metric.label()),
            as_of: table.latest_date(),
            rows: config.rows,
            cols: config.cols,
            panels,
            shared_peak,
        })
    }

    /// Two-line heading: title, then the latest date.
    pub fn heading(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.as_of
                .map_or_else(String::new, |d| d.format("%B %d, %Y").to_string()),
        ]
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Draw the heading and the panel grid into `area`.
pub fn render_grid(frame: &mut Frame, area: Rect, plot: &GridPlot, theme: &Theme) {
    let [heading_area, body] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(area);

    let heading: Vec<Line> = plot
        .heading()
        .into_iter()
        .map(|s| Line::styled(s, theme.header).alignment(Alignment::Center))
        .collect();
    frame.render_widget(Paragraph::new(heading), heading_area);

    if plot.rows == 0 || plot.cols == 0 {
        return;
    }
    let row_areas = Layout::vertical(
        (0..plot.rows).map(|_| Constraint::Ratio(1, plot.rows as u32)),
    )
    .split(body);

    for (r, row_area) in row_areas.iter().enumerate() {
        let cells = Layout::horizontal(
            (0..plot.cols).map(|_| Constraint::Ratio(1, plot.cols as u32)),
        )
        .split(*row_area);
        for (c, cell) in cells.iter().enumerate() {
            if let Some(panel) = plot.panels.get(r * plot.cols + c) {
                let peak = plot.shared_peak.unwrap_or(panel.peak);
                render_panel(frame, *cell, panel, peak, theme);
            }
        }
    }
}

/// Draw one panel. `peak` is the upper y bound.
pub fn render_panel(frame: &mut Frame, area: Rect, panel: &Panel, peak: f64, theme: &Theme) {
    let y_labels = vec![
        "0".to_string(),
        format_count(peak / 2.0),
        format_count(peak),
    ];
    let y_label_width = y_labels.iter().map(|l| l.width()).max().unwrap_or(1) as u16;

    let chart_area = match &panel.milestones {
        Some(track) if !track.is_empty() && area.height > 6 => {
            let [track_area, chart_area] =
                Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(area);
            // Line the track up with the plotting area inside the border
            // and the y labels.
            let inset = y_label_width + 2;
            let track_area = Rect {
                x: track_area.x + inset,
                width: track_area.width.saturating_sub(inset + 1),
                ..track_area
            };
            let view =
                MilestoneTrackView::new(track, panel.dates.len(), track_area.width, theme);
            frame.render_widget(Paragraph::new(view.to_lines()), track_area);
            chart_area
        }
        _ => area,
    };

    let bars: Vec<(f64, f64)> = points(&panel.bars);
    let trend: Vec<(f64, f64)> = points(&panel.trend);
    let vlines: Vec<Vec<(f64, f64)>> = panel
        .milestones
        .iter()
        .flat_map(|t| &t.marks)
        .map(|m| vec![(m.index as f64, 0.0), (m.index as f64, peak)])
        .collect();

    let mut datasets = vec![
        ChartDataset::default()
            .marker(Marker::HalfBlock)
            .graph_type(GraphType::Bar)
            .style(theme.bar)
            .data(&bars),
        ChartDataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(theme.trend)
            .data(&trend),
    ];
    datasets.extend(vlines.iter().map(|line| {
        ChartDataset::default()
            .marker(Marker::Dot)
            .graph_type(GraphType::Line)
            .style(theme.milestone)
            .data(line)
    }));

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.axis)
        .title(Line::styled(format!(" {} ", panel.title), theme.panel_title))
        .title_bottom(
            Line::styled(format!(" {} ", panel.last_label()), theme.trend)
                .alignment(Alignment::Right),
        );
    if let Some(annotation) = &panel.annotation {
        block = block.title_bottom(Line::styled(format!(" {} ", annotation), theme.annotation));
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(theme.axis)
                .bounds([0.0, (panel.dates.len().max(2) - 1) as f64])
                .labels(date_labels(&panel.dates)),
        )
        .y_axis(
            Axis::default()
                .style(theme.axis)
                .bounds([0.0, peak])
                .labels(y_labels),
        );
    frame.render_widget(chart, chart_area);
}

/// Defined values as `(index, value)` chart points.
pub(crate) fn points(values: &[Option<f64>]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect()
}

/// First, middle and last date as `"Mar 4"` labels.
pub(crate) fn date_labels(dates: &[NaiveDate]) -> Vec<String> {
    match dates {
        [] => Vec::new(),
        [only] => vec![short_label(*only)],
        _ => vec![
            short_label(dates[0]),
            short_label(dates[dates.len() / 2]),
            short_label(dates[dates.len() - 1]),
        ],
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
