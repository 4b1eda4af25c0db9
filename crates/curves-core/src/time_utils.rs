use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::warn;

use crate::error::{CurvesError, Result};

// ── Date header parsing ───────────────────────────────────────────────────────

/// Parse a date column header of a published time series.
///
/// Accepts the `M/D/YY` form used by the JHU files (`"1/22/20"`), its
/// four-digit-year variant, and ISO `YYYY-MM-DD`.
pub fn parse_date_header(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return Err(CurvesError::TimestampParse(String::new()));
    }

    const FMTS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];
    for fmt in FMTS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            // `%y` happily accepts four digits; reject the wrapped year.
            if *fmt == "%m/%d/%y" && s.rsplit('/').next().map_or(0, str::len) != 2 {
                continue;
            }
            return Ok(date);
        }
    }

    Err(CurvesError::TimestampParse(s.to_string()))
}

/// `true` when `s` looks like a date header rather than a metadata column.
pub fn is_date_header(s: &str) -> bool {
    parse_date_header(s).is_ok()
}

/// Validate that `dates` form one consecutive daily run.
///
/// Gaps are not modelled; a gap is logged and reported as `false` so the
/// caller can decide whether to continue.
pub fn is_daily_cadence(dates: &[NaiveDate]) -> bool {
    for pair in dates.windows(2) {
        if pair[1] - pair[0] != Duration::days(1) {
            warn!(from = %pair[0], to = %pair[1], "time series has a gap or reorder");
            return false;
        }
    }
    true
}

// ── Weeks ─────────────────────────────────────────────────────────────────────

/// The Sunday that closes the week containing `date` (`date` itself on Sundays).
pub fn week_ending_sunday(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = (7 - date.weekday().num_days_from_sunday()) % 7;
    date + Duration::days(i64::from(days_to_sunday))
}

/// Short axis label, e.g. `"Mar 14"`.
pub fn short_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Sun
}
