use chrono::NaiveDate;
use ratatui::text::{Line, Span};

use crate::themes::Theme;

/// Small rising-bars glyph placed either side of the title.
pub const ACCENT: &str = "▁▃▅▇";

/// Four-line banner shown above the dashboard and the ranking table:
///
/// 1. Title between accents.
/// 2. A 60-column `=` separator.
/// 3. `[ source | metric | as-of date ]`.
/// 4. An empty line.
pub struct Header<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub metric: &'a str,
    /// Latest date of the data on screen, if any.
    pub as_of: Option<NaiveDate>,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(
        title: &'a str,
        source: &'a str,
        metric: &'a str,
        as_of: Option<NaiveDate>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            title,
            source,
            metric,
            as_of,
            theme,
        }
    }

    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let as_of = self
            .as_of
            .map_or_else(|| "no data".to_string(), |d| d.format("%B %d, %Y").to_string());

        vec![
            Line::from(vec![
                Span::styled(ACCENT, self.theme.header_accent),
                Span::styled(format!(" {} ", self.title.to_uppercase()), self.theme.header),
                Span::styled(ACCENT, self.theme.header_accent),
            ]),
            Line::from(Span::styled("=".repeat(60), self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(self.source.to_lowercase(), self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(self.metric.to_lowercase(), self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(as_of, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            Line::from(""),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
