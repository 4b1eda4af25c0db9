use ratatui::style::{Color, Modifier, Style};

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
    Unknown,
}

/// Detect terminal background type from the `COLORFGBG` environment variable.
///
/// The variable has the format `"foreground;background"`. Background values
/// 0–6 are considered dark; 7–15 are considered light. If the variable is
/// absent or unparseable, `BackgroundType::Dark` is returned.
pub fn detect_background() -> BackgroundType {
    if let Ok(val) = std::env::var("COLORFGBG") {
        if let Some(bg) = val.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                return if bg_num <= 6 {
                    BackgroundType::Dark
                } else {
                    BackgroundType::Light
                };
            }
        }
    }
    BackgroundType::Dark
}

/// Base colours a theme is derived from.
struct Base {
    fg: Color,
    muted: Color,
    faint: Color,
    accent: Color,
    bars: Color,
    trend: Color,
    tab: Color,
    /// Headers, titles and highlighted rows are bold.
    bold: bool,
}

/// Every style used by the charts, tables and dashboard.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Header ───────────────────────────────────────────────────────────────
    pub header: Style,
    pub header_accent: Style,
    pub separator: Style,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: Style,
    pub dim: Style,
    pub label: Style,
    pub value: Style,
    pub warning: Style,

    // ── Charts ───────────────────────────────────────────────────────────────
    /// Daily-change bars.
    pub bar: Style,
    /// Rolling average drawn over the bars.
    pub trend: Style,
    /// Vertical milestone lines.
    pub milestone: Style,
    /// Milestone labels and the interval track.
    pub milestone_label: Style,
    pub axis: Style,
    pub panel_title: Style,
    pub annotation: Style,
    /// Line colours of overlay charts, cycled in member order.
    pub palette: Vec<Color>,

    // ── Ranking table ────────────────────────────────────────────────────────
    pub table_header: Style,
    pub table_border: Style,
    pub table_row: Style,
    pub table_row_alt: Style,
    /// The worst rows of a ranking.
    pub table_highlight: Style,

    // ── Dashboard ────────────────────────────────────────────────────────────
    pub tab_active: Style,
    pub tab_inactive: Style,
    pub cursor: Style,
    pub checked: Style,
    pub unchecked: Style,
}

impl Theme {
    fn from_base(base: Base, palette: Vec<Color>) -> Self {
        let strong = |c: Color| {
            let style = Style::default().fg(c);
            if base.bold {
                style.add_modifier(Modifier::BOLD)
            } else {
                style
            }
        };
        let plain = |c: Color| Style::default().fg(c);

        Self {
            header: strong(base.accent),
            header_accent: plain(base.trend),
            separator: plain(base.faint),

            text: plain(base.fg),
            dim: plain(base.faint),
            label: plain(base.muted),
            value: strong(base.fg),
            warning: plain(Color::Yellow),

            bar: plain(base.bars),
            trend: plain(base.trend),
            milestone: plain(base.faint),
            milestone_label: plain(base.muted),
            axis: plain(base.faint),
            panel_title: strong(base.fg),
            annotation: plain(base.muted),
            palette,

            table_header: strong(base.accent),
            table_border: plain(base.faint),
            table_row: plain(base.fg),
            table_row_alt: plain(base.muted),
            table_highlight: strong(base.trend),

            tab_active: strong(base.tab),
            tab_inactive: plain(base.muted),
            cursor: Style::default().add_modifier(Modifier::REVERSED),
            checked: plain(Color::Green),
            unchecked: plain(base.faint),
        }
    }

    // ── Constructors ─────────────────────────────────────────────────────────

    /// Dark terminal background (default).
    pub fn dark() -> Self {
        Self::from_base(
            Base {
                fg: Color::White,
                muted: Color::Gray,
                faint: Color::DarkGray,
                accent: Color::Cyan,
                bars: Color::Blue,
                trend: Color::LightRed,
                tab: Color::Yellow,
                bold: true,
            },
            vec![
                Color::Cyan,
                Color::Yellow,
                Color::Green,
                Color::Magenta,
                Color::LightRed,
                Color::LightBlue,
                Color::White,
                Color::LightGreen,
                Color::LightMagenta,
            ],
        )
    }

    /// Light terminal background.
    pub fn light() -> Self {
        Self::from_base(
            Base {
                fg: Color::Black,
                muted: Color::DarkGray,
                faint: Color::Gray,
                accent: Color::Blue,
                bars: Color::Blue,
                trend: Color::Red,
                tab: Color::Magenta,
                bold: true,
            },
            vec![
                Color::Blue,
                Color::Red,
                Color::Green,
                Color::Magenta,
                Color::Cyan,
                Color::Black,
                Color::DarkGray,
                Color::LightBlue,
                Color::LightRed,
            ],
        )
    }

    /// Eight ANSI colours, no bold.
    pub fn classic() -> Self {
        Self::from_base(
            Base {
                fg: Color::White,
                muted: Color::White,
                faint: Color::DarkGray,
                accent: Color::Cyan,
                bars: Color::Blue,
                trend: Color::Red,
                tab: Color::Yellow,
                bold: false,
            },
            vec![
                Color::Cyan,
                Color::Yellow,
                Color::Green,
                Color::Magenta,
                Color::Red,
                Color::Blue,
                Color::White,
            ],
        )
    }

    /// Choose a theme automatically based on the detected terminal background.
    pub fn auto_detect() -> Self {
        match detect_background() {
            BackgroundType::Light => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Construct a theme by name. Falls back to `auto_detect` for unknown
    /// names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "dark" => Self::dark(),
            "classic" => Self::classic(),
            _ => Self::auto_detect(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    /// Line style of the `index`-th overlay series.
    pub fn series_style(&self, index: usize) -> Style {
        match self.palette.len() {
            0 => self.text,
            n => Style::default().fg(self.palette[index % n]),
        }
    }

    /// Row style of a ranking table: the first `highlighted` rows stand out,
    /// the rest alternate.
    pub fn rank_row_style(&self, row: usize, highlighted: usize) -> Style {
        if row < highlighted {
            self.table_highlight
        } else if row % 2 == 0 {
            self.table_row
        } else {
            self.table_row_alt
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
