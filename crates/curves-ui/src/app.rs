//! Interactive continent dashboard.
//!
//! One tab per continent plus `"All"`. Each tab keeps its own set of checked
//! countries; the chart on the right shows the smoothed daily change of the
//! checked countries of the active tab, raw or per capita.
//!
//! Key handling lives in [`DashboardState`] and only returns an [`Action`];
//! [`Dashboard`] owns the data and carries the actions out.

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use curves_core::analytics::{normalize_table, rank_regions, smoothed_daily};
use curves_core::error::Result;
use curves_core::formatting::format_count;
use curves_core::models::{Dataset, Direction, Metric, RankConfig, SmoothingConfig, Source};
use curves_data::analysis::populated_only;
use curves_runtime::data_manager::{ContinentGroups, DataManager};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame, Terminal,
};

use crate::components::header::Header;
use crate::grid_view::points;
use crate::overlay_view::{render_overlay, OverlayPlot, OverlaySeries};
use crate::themes::Theme;

/// Countries checked by the "worst" key and on start-up.
pub const WORST_X: usize = 5;

/// People per unit of the per-capita view.
pub const DASHBOARD_CAPITA: f64 = 1_000_000.0;

/// Left edge of the chart.
pub fn chart_start() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2020, 3, 1)
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Absolute,
    PerCapita,
}

/// What the dashboard must do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Selection, tab, metric or scale changed: rebuild the chart.
    Refresh,
    /// Check the worst countries of the active tab.
    SelectWorst,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tab {
    pub name: String,
    pub members: Vec<String>,
    pub checked: Vec<bool>,
    pub cursor: usize,
}

impl Tab {
    pub fn new(name: String, members: Vec<String>) -> Self {
        let checked = vec![false; members.len()];
        Self {
            name,
            members,
            checked,
            cursor: 0,
        }
    }

    pub fn selected(&self) -> Vec<String> {
        self.members
            .iter()
            .zip(&self.checked)
            .filter(|(_, on)| **on)
            .map(|(m, _)| m.clone())
            .collect()
    }

    /// Check exactly the members named in `names`.
    pub fn select_only(&mut self, names: &[String]) {
        for (member, on) in self.members.iter().zip(self.checked.iter_mut()) {
            *on = names.contains(member);
        }
    }

    pub fn set_all(&mut self, on: bool) {
        self.checked.iter_mut().for_each(|c| *c = on);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub tabs: Vec<Tab>,
    pub active: usize,
    pub metric: Metric,
    pub scale: Scale,
}

impl DashboardState {
    pub fn new(groups: ContinentGroups, metric: Metric) -> Self {
        Self {
            tabs: groups
                .into_iter()
                .map(|(name, members)| Tab::new(name, members))
                .collect(),
            active: 0,
            metric,
            scale: Scale::Absolute,
        }
    }

    pub fn tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active)
    }

    fn tab_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active)
    }

    pub fn selected_regions(&self) -> Vec<String> {
        self.tab().map(Tab::selected).unwrap_or_default()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
            KeyCode::Tab | KeyCode::Right => {
                if !self.tabs.is_empty() {
                    self.active = (self.active + 1) % self.tabs.len();
                }
                Action::Refresh
            }
            KeyCode::BackTab | KeyCode::Left => {
                if !self.tabs.is_empty() {
                    self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
                }
                Action::Refresh
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if let Some(tab) = self.tab_mut() {
                    if tab.cursor + 1 < tab.members.len() {
                        tab.cursor += 1;
                    }
                }
                Action::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if let Some(tab) = self.tab_mut() {
                    tab.cursor = tab.cursor.saturating_sub(1);
                }
                Action::None
            }
            KeyCode::Char(' ') | KeyCode::Enter => match self.tab_mut() {
                Some(tab) if !tab.members.is_empty() => {
                    let i = tab.cursor;
                    tab.checked[i] = !tab.checked[i];
                    Action::Refresh
                }
                _ => Action::None,
            },
            KeyCode::Char('a') => {
                if let Some(tab) = self.tab_mut() {
                    tab.set_all(true);
                }
                Action::Refresh
            }
            KeyCode::Char('u') => {
                if let Some(tab) = self.tab_mut() {
                    tab.set_all(false);
                }
                Action::Refresh
            }
            KeyCode::Char('w') => Action::SelectWorst,
            KeyCode::Char('d') => {
                self.metric = match self.metric {
                    Metric::Cases => Metric::Deaths,
                    Metric::Deaths => Metric::Cases,
                };
                Action::Refresh
            }
            KeyCode::Char('p') => {
                self.scale = match self.scale {
                    Scale::Absolute => Scale::PerCapita,
                    Scale::PerCapita => Scale::Absolute,
                };
                Action::Refresh
            }
            _ => Action::None,
        }
    }
}

// ── Chart data ────────────────────────────────────────────────────────────────

/// The `k` members with the highest smoothed daily change, per capita when
/// `scale` says so. Members without a population drop out of per-capita
/// rankings.
pub fn worst_members(
    dataset: &Dataset,
    members: &[String],
    scale: Scale,
    smoothing: &SmoothingConfig,
    capita: f64,
    k: usize,
) -> Result<Vec<String>> {
    let rank = RankConfig {
        smoothing: smoothing.clone(),
        k,
        direction: Direction::Worst,
    };
    let table = dataset.table.select(members)?;
    match scale {
        Scale::Absolute => rank_regions(&table, &rank),
        Scale::PerCapita => {
            let (populated, _) = populated_only(&table, &dataset.populations);
            rank_regions(&normalize_table(&populated, &dataset.populations, capita)?, &rank)
        }
    }
}

/// Chart of the smoothed daily change of `names`. Returns the plot and the
/// names left out for lack of a population.
pub fn build_chart(
    dataset: &Dataset,
    names: &[String],
    scale: Scale,
    smoothing: &SmoothingConfig,
    capita: f64,
) -> Result<(OverlayPlot, Vec<String>)> {
    let dates = dataset.table.dates();
    let offset = chart_start().map_or(0, |s| dates.partition_point(|d| *d < s));

    let mut series = Vec::with_capacity(names.len());
    let mut skipped = Vec::new();
    for name in names {
        let raw = dataset.table.region(name)?;
        let mut smoothed = smoothed_daily(raw, smoothing, name)?;
        if scale == Scale::PerCapita {
            match dataset.populations.get(name).filter(|p| *p > 0) {
                Some(pop) => smoothed
                    .iter_mut()
                    .flatten()
                    .for_each(|v| *v = *v * capita / pop as f64),
                None => {
                    skipped.push(name.clone());
                    continue;
                }
            }
        }
        series.push(OverlaySeries {
            name: name.clone(),
            points: points(&smoothed[offset.min(smoothed.len())..]),
        });
    }

    let noun = match dataset.metric {
        Metric::Cases => "Cases",
        Metric::Deaths => "Deaths",
    };
    let per = match scale {
        Scale::Absolute => String::new(),
        Scale::PerCapita => format!(" Per {}", format_count(capita)),
    };
    let visible = dates.len().saturating_sub(offset);
    let y_max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, y)| *y))
        .fold(1.0_f64, f64::max);

    Ok((
        OverlayPlot {
            title: format!("New Daily Covid-19 {}{}, 7-day Average", noun, per),
            x_title: "Date".to_string(),
            y_title: format!("{}{}", noun, per),
            series,
            log_scale: false,
            dates: Some(dates[offset.min(dates.len())..].to_vec()),
            x_max: visible.saturating_sub(1).max(1) as f64,
            y_bounds: [0.0, y_max],
        },
        skipped,
    ))
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

pub struct Dashboard<'a> {
    pub state: DashboardState,
    data: &'a mut DataManager,
    theme: Theme,
    smoothing: SmoothingConfig,
    capita: f64,
    plot: Option<OverlayPlot>,
    as_of: Option<NaiveDate>,
    /// Last warning shown in the footer.
    status: Option<String>,
}

impl<'a> Dashboard<'a> {
    /// Build the tabs from the continent groups, check the worst countries
    /// of every tab and draw the first chart.
    pub fn new(
        data: &'a mut DataManager,
        theme: Theme,
        metric: Metric,
        smoothing: SmoothingConfig,
    ) -> Result<Self> {
        let groups = data.continent_groups()?.clone();
        let mut dash = Self {
            state: DashboardState::new(groups, metric),
            data,
            theme,
            smoothing,
            capita: DASHBOARD_CAPITA,
            plot: None,
            as_of: None,
            status: None,
        };
        for i in 0..dash.state.tabs.len() {
            dash.state.active = i;
            dash.select_worst()?;
        }
        dash.state.active = 0;
        dash.refresh()?;
        Ok(dash)
    }

    pub fn plot(&self) -> Option<&OverlayPlot> {
        self.plot.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Check the [`WORST_X`] worst countries of the active tab.
    pub fn select_worst(&mut self) -> Result<()> {
        let dataset = self.data.get(Source::Global, self.state.metric)?;
        let Some(tab) = self.state.tabs.get_mut(self.state.active) else {
            return Ok(());
        };
        let worst = worst_members(
            dataset,
            &tab.members,
            self.state.scale,
            &self.smoothing,
            self.capita,
            WORST_X,
        )?;
        tab.select_only(&worst);
        Ok(())
    }

    /// Rebuild the chart from the current selection.
    pub fn refresh(&mut self) -> Result<()> {
        let dataset = self.data.get(Source::Global, self.state.metric)?;
        let names = self.state.selected_regions();
        let (plot, skipped) =
            build_chart(dataset, &names, self.state.scale, &self.smoothing, self.capita)?;
        self.as_of = dataset.table.latest_date();
        self.plot = Some(plot);
        self.status = (!skipped.is_empty())
            .then(|| format!("no population for {}", skipped.join(", ")));
        Ok(())
    }

    /// Apply a key press. Returns `false` once the dashboard should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let result = match self.state.handle_key(key) {
            Action::Quit => return false,
            Action::None => Ok(()),
            Action::Refresh => self.refresh(),
            Action::SelectWorst => self.select_worst().and_then(|_| self.refresh()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "dashboard update failed");
            self.status = Some(e.to_string());
        }
        true
    }

    /// Run the dashboard until `q`, `Esc` or `Ctrl+C`.
    pub fn run(mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(250);

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }
            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if !self.handle_key(key) {
                            break Ok(());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }
        };

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, tabs_area, body, footer] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        let metric = self.state.metric.label();
        let header = Header::new("covid curves", "global", metric, self.as_of, &self.theme);
        frame.render_widget(Paragraph::new(header.to_lines()), header_area);

        let titles: Vec<String> = self.state.tabs.iter().map(|t| t.name.clone()).collect();
        let tabs = Tabs::new(titles)
            .select(self.state.active)
            .style(self.theme.tab_inactive)
            .highlight_style(self.theme.tab_active)
            .block(Block::default().borders(Borders::ALL).border_style(self.theme.separator));
        frame.render_widget(tabs, tabs_area);

        let [list_area, chart_area] =
            Layout::horizontal([Constraint::Length(30), Constraint::Min(0)]).areas(body);
        self.render_members(frame, list_area);
        if let Some(plot) = &self.plot {
            render_overlay(frame, chart_area, plot, &self.theme);
        }

        let mut help = vec![Span::styled(
            "←/→ continent  ↑/↓ move  space check  a all  u none  w worst  d cases/deaths  p per capita  q quit",
            self.theme.dim,
        )];
        if let Some(status) = &self.status {
            help.push(Span::styled(format!("  {}", status), self.theme.warning));
        }
        frame.render_widget(Paragraph::new(Line::from(help)), footer);
    }

    fn render_members(&self, frame: &mut Frame, area: Rect) {
        let Some(tab) = self.state.tab() else {
            return;
        };
        let visible = area.height.saturating_sub(2) as usize;
        let first = (tab.cursor + 1).saturating_sub(visible);
        let lines: Vec<Line> = tab
            .members
            .iter()
            .zip(&tab.checked)
            .enumerate()
            .skip(first)
            .take(visible)
            .map(|(i, (name, on))| {
                let (mark, mark_style) = if *on {
                    ("[x] ", self.theme.checked)
                } else {
                    ("[ ] ", self.theme.unchecked)
                };
                let name_style = if i == tab.cursor {
                    self.theme.cursor
                } else {
                    self.theme.text
                };
                Line::from(vec![
                    Span::styled(mark, mark_style),
                    Span::styled(name.clone(), name_style),
                ])
            })
            .collect();

        let checked = tab.checked.iter().filter(|c| **c).count();
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(self.theme.separator)
                    .title(format!(" {} ({}/{}) ", tab.name, checked, tab.members.len())),
            ),
            area,
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
