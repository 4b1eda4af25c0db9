//! Ranking table: worst or best regions by smoothed daily change.
//!
//! Renders a bordered [`ratatui::widgets::Table`] with one row per ranked
//! region. The same rows back the `--json` output of the rank view.

use curves_core::analytics::{
    latest_smoothed, normalize_table, population_floor, rank_regions_scored,
};
use curves_core::error::Result;
use curves_core::formatting::{format_count, format_optional};
use curves_core::models::{Dataset, RankConfig};
use curves_data::analysis::{populated_only, WeeklyTable};
use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use serde::Serialize;

use crate::themes::Theme;

/// One ranked region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRow {
    pub rank: usize,
    pub region: String,
    /// Smoothed daily change on the last date.
    pub latest: Option<f64>,
    /// `latest` per capita unit, or the weekly per-capita value of county
    /// tables.
    pub per_capita: Option<f64>,
    pub population: Option<u64>,
}

/// Rank the regions of `dataset` and attach per-capita values.
///
/// With `min_population`, regions at or below the floor (or without a
/// population) are left out before ranking.
pub fn build_rank_rows(
    dataset: &Dataset,
    config: &RankConfig,
    capita: f64,
    min_population: Option<u64>,
) -> Result<Vec<RankRow>> {
    let pops = &dataset.populations;
    let ranked = match min_population {
        Some(floor) => rank_regions_scored(&dataset.table, config, population_floor(pops, floor))?,
        None => rank_regions_scored(&dataset.table, config, |_| true)?,
    };

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let population = pops.get(&r.name).filter(|p| *p > 0);
            RankRow {
                rank: i + 1,
                per_capita: r
                    .latest
                    .zip(population)
                    .map(|(v, p)| v * capita / p as f64),
                latest: r.latest,
                region: r.name,
                population,
            }
        })
        .collect())
}

/// Rank by smoothed daily change per `capita` people.
///
/// Regions without a population cannot be scaled and are left out.
pub fn build_per_capita_rank_rows(
    dataset: &Dataset,
    config: &RankConfig,
    capita: f64,
    min_population: Option<u64>,
) -> Result<Vec<RankRow>> {
    let pops = &dataset.populations;
    let (populated, dropped) = populated_only(&dataset.table, pops);
    if !dropped.is_empty() {
        tracing::warn!(count = dropped.len(), "regions without population left out of the ranking");
    }
    let scaled = normalize_table(&populated, pops, capita)?;
    let ranked = rank_regions_scored(&scaled, config, population_floor(pops, min_population.unwrap_or(0)))?;

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            let raw = dataset.table.region(&r.name)?;
            Ok(RankRow {
                rank: i + 1,
                latest: latest_smoothed(raw, &config.smoothing, &r.name)?,
                per_capita: r.latest,
                population: pops.get(&r.name),
                region: r.name,
            })
        })
        .collect()
}

/// Rows for the `k` regions of `weekly` with the highest last-week value.
pub fn weekly_rank_rows(weekly: &WeeklyTable, k: usize) -> Vec<RankRow> {
    weekly
        .worst_last_week(k)
        .into_iter()
        .enumerate()
        .map(|(i, (region, value))| RankRow {
            rank: i + 1,
            region,
            latest: None,
            per_capita: Some(value),
            population: None,
        })
        .collect()
}

/// Render the ranking table into `area`. `capita_label` heads the per-capita
/// column (`"Per 1,000,000"`); the first `highlight` rows stand out.
pub fn render_rank_view(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    capita_label: &str,
    rows: &[RankRow],
    highlight: usize,
    theme: &Theme,
) {
    let header_cells = ["#", "Region", "Daily (avg)", capita_label, "Population"]
        .into_iter()
        .map(|h| Cell::from(h.to_string()).style(theme.table_header));
    let header = Row::new(header_cells).height(1);

    let data_rows: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            Row::new(vec![
                Cell::from(row.rank.to_string()),
                Cell::from(row.region.clone()),
                Cell::from(format_optional(row.latest, 1)),
                Cell::from(format_optional(row.per_capita, 2)),
                Cell::from(row.population.map_or_else(|| "-".to_string(), |p| format_count(p as f64))),
            ])
            .style(theme.rank_row_style(i, highlight))
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Length(32),
        Constraint::Length(14),
        Constraint::Length(16),
        Constraint::Length(16),
    ];

    let table = Table::new(data_rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(" {} ", title)),
        )
        .style(theme.text);

    frame.render_widget(table, area);
}

/// Placeholder shown when a ranking came back empty.
pub fn render_no_data(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No regions to rank", theme.warning)),
        Line::from(""),
        Line::from(Span::styled(
            "Check the region set and the population floor.",
            theme.dim,
        )),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" covid-curves "),
        ),
        area,
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
