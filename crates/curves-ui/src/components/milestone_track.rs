//! Text rendering of a [`MilestoneTrack`] above a chart.
//!
//! Two lines, aligned with the chart's x axis:
//!
//! ```text
//! 100      1 mil          2 mil
//! |──58 days──|───41 days───|──9d──|
//! ```
//!
//! The first line carries the threshold labels, the second the interval
//! track with its `|` markers and per-interval day counts. Labels that do
//! not fit are dropped rather than overlapped.

use curves_core::analytics::MilestoneTrack;
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use crate::themes::Theme;

/// Column of point `index` when `points` points are spread over `width`
/// columns.
pub fn column_for(index: usize, points: usize, width: usize) -> usize {
    if points <= 1 || width <= 1 {
        return 0;
    }
    let frac = index.min(points - 1) as f64 / (points - 1) as f64;
    (frac * (width - 1) as f64).round() as usize
}

pub struct MilestoneTrackView<'a> {
    pub track: &'a MilestoneTrack,
    /// Number of points on the chart's x axis.
    pub points: usize,
    pub width: u16,
    pub theme: &'a Theme,
}

impl<'a> MilestoneTrackView<'a> {
    pub fn new(track: &'a MilestoneTrack, points: usize, width: u16, theme: &'a Theme) -> Self {
        Self {
            track,
            points,
            width,
            theme,
        }
    }

    /// Threshold labels, each starting at its marker column.
    pub fn label_row(&self) -> String {
        let width = self.width as usize;
        let mut row = vec![' '; width];
        let mut free_from = 0;
        for mark in &self.track.marks {
            let col = column_for(mark.index, self.points, width);
            let w = mark.label.width();
            if col < free_from || col + w > width {
                continue;
            }
            write_at(&mut row, col, &mark.label);
            free_from = col + w + 1;
        }
        row.into_iter().collect::<String>().trim_end().to_string()
    }

    /// The interval track from the first marker to the last observation.
    pub fn track_row(&self) -> String {
        let width = self.width as usize;
        let mut row = vec![' '; width];
        let (Some(first), Some(terminal)) = (self.track.marks.first(), self.track.terminal) else {
            return String::new();
        };
        if width == 0 {
            return String::new();
        }

        let start = column_for(first.index, self.points, width);
        let end = column_for(terminal, self.points, width);
        for cell in row.iter_mut().take(end + 1).skip(start) {
            *cell = '─';
        }
        for mark in &self.track.marks {
            row[column_for(mark.index, self.points, width)] = '|';
        }
        row[end] = '|';

        for seg in &self.track.segments {
            let Some(label) = &seg.label else {
                continue;
            };
            let left = column_for(seg.start, self.points, width);
            let right = column_for(seg.end, self.points, width);
            let w = label.width();
            let mid = column_for(seg.midpoint, self.points, width);
            let col = mid.saturating_sub(w / 2).max(left + 1);
            if col + w > right {
                continue;
            }
            write_at(&mut row, col, label);
        }
        row.into_iter().collect::<String>().trim_end().to_string()
    }

    pub fn to_lines(&self) -> Vec<Line<'static>> {
        vec![
            Line::from(Span::styled(self.label_row(), self.theme.milestone_label)),
            Line::from(Span::styled(self.track_row(), self.theme.milestone_label)),
        ]
    }
}

fn write_at(row: &mut [char], col: usize, text: &str) {
    for (cell, ch) in row.iter_mut().skip(col).zip(text.chars()) {
        *cell = ch;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use curves_core::analytics::{MilestoneMark, MilestoneSegment};

    fn mark(index: usize, label: &str) -> MilestoneMark {
        MilestoneMark {
            index,
            date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap() + chrono::Days::new(index as u64),
            threshold: 0.0,
            label: label.to_string(),
        }
    }

    fn segment(start: usize, end: usize, label: &str) -> MilestoneSegment {
        let days = end - start;
        MilestoneSegment {
            start,
            end,
            days,
            midpoint: end - days / 2,
            label: Some(label.to_string()),
        }
    }

    fn sample() -> MilestoneTrack {
        MilestoneTrack {
            marks: vec![mark(0, "100"), mark(50, "1 mil")],
            segments: vec![segment(0, 50, "50 days"), segment(50, 100, "50 days")],
            terminal: Some(100),
        }
    }

    #[test]
    fn test_column_for() {
        assert_eq!(column_for(0, 101, 51), 0);
        assert_eq!(column_for(50, 101, 51), 25);
        assert_eq!(column_for(100, 101, 51), 50);
        assert_eq!(column_for(500, 101, 51), 50);
        assert_eq!(column_for(3, 1, 51), 0);
    }

    #[test]
    fn test_label_row_places_thresholds() {
        let theme = Theme::dark();
        let track = sample();
        let view = MilestoneTrackView::new(&track, 101, 51, &theme);
        let row = view.label_row();
        assert!(row.starts_with("100"));
        assert_eq!(row.find("1 mil"), Some(25));
    }

    #[test]
    fn test_track_row_markers_and_labels() {
        let theme = Theme::dark();
        let track = sample();
        let view = MilestoneTrackView::new(&track, 101, 51, &theme);
        let row: Vec<char> = view.track_row().chars().collect();

        assert_eq!(row.len(), 51);
        assert_eq!(row[0], '|');
        assert_eq!(row[25], '|');
        assert_eq!(row[50], '|');
        let text: String = row.iter().collect();
        assert_eq!(text.matches("50 days").count(), 2);
    }

    #[test]
    fn test_labels_that_do_not_fit_are_dropped() {
        let theme = Theme::dark();
        let track = MilestoneTrack {
            marks: vec![mark(0, "100"), mark(2, "1 mil")],
            segments: vec![segment(0, 2, "2d"), segment(2, 100, "98 days")],
            terminal: Some(100),
        };
        let view = MilestoneTrackView::new(&track, 101, 51, &theme);
        // "1 mil" would overlap "100".
        assert_eq!(view.label_row(), "100");
        let row = view.track_row();
        assert!(!row.contains("2d"));
        assert!(row.contains("98 days"));
    }

    #[test]
    fn test_empty_track_renders_blank() {
        let theme = Theme::dark();
        let track = MilestoneTrack::default();
        let lines = MilestoneTrackView::new(&track, 10, 20, &theme).to_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.spans[0].content.is_empty()));
    }
}
