use serde::{Deserialize, Serialize};

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use curves_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge exact binary midpoints so that 1.005 rounds up at two decimals.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let grouped = group_thousands(&(rounded.trunc() as u64).to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!(
            "{:.prec$}",
            rounded - rounded.trunc(),
            prec = decimals as usize
        );
        // "0.50" → ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Whole-number count with separators, as printed in chart annotations
/// (`"total: 1,234,567"`). Fractions are truncated toward zero.
pub fn format_count(value: f64) -> String {
    format_number(value.trunc(), 0)
}

/// Optional value, `"-"` when undefined.
pub fn format_optional(value: Option<f64>, decimals: u32) -> String {
    value.map_or_else(|| "-".to_string(), |v| format_number(v, decimals))
}

// ── Milestone labels ──────────────────────────────────────────────────────────

/// Label of a milestone threshold.
///
/// Thresholds below `unit` print as plain numbers, others as a multiple of
/// `unit` followed by `suffix`.
///
/// ```
/// use curves_core::formatting::milestone_label;
///
/// assert_eq!(milestone_label(100.0, 1_000_000.0, " mil"), "100");
/// assert_eq!(milestone_label(1_000_000.0, 1_000_000.0, " mil"), "1 mil");
/// assert_eq!(milestone_label(20_000.0, 1_000.0, "k"), "20k");
/// ```
pub fn milestone_label(threshold: f64, unit: f64, suffix: &str) -> String {
    if unit <= 0.0 || threshold < unit {
        return format_count(threshold);
    }
    format!("{:.0}{}", threshold / unit, suffix)
}

// ── Interval labels ───────────────────────────────────────────────────────────

/// How an interval between two milestones is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelFormat {
    /// `"23 days"`
    Long,
    /// `"9d"`
    Short,
    /// No label.
    Hidden,
}

impl LabelFormat {
    pub fn render(&self, days: usize) -> Option<String> {
        match self {
            LabelFormat::Long => Some(format!("{} days", days)),
            LabelFormat::Short => Some(format!("{}d", days)),
            LabelFormat::Hidden => None,
        }
    }
}

/// Lookup table from interval length to label format.
///
/// Each rule applies to lengths `>= min_length`; the rule with the largest
/// matching `min_length` wins. Lengths below every rule get no label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPolicy {
    rules: Vec<(usize, LabelFormat)>,
}

impl LabelPolicy {
    pub fn new(mut rules: Vec<(usize, LabelFormat)>) -> Self {
        rules.sort_by(|a, b| b.0.cmp(&a.0));
        rules.dedup_by_key(|r| r.0);
        Self { rules }
    }

    /// Format applied to an interval of `days`.
    pub fn format_for(&self, days: usize) -> LabelFormat {
        self.rules
            .iter()
            .find(|(min, _)| days >= *min)
            .map_or(LabelFormat::Hidden, |(_, fmt)| *fmt)
    }

    pub fn label(&self, days: usize) -> Option<String> {
        self.format_for(days).render(days)
    }

    /// Never label intervals (compact panels).
    pub fn hidden() -> Self {
        Self::new(vec![(0, LabelFormat::Hidden)])
    }
}

impl Default for LabelPolicy {
    /// More than ten days: `"N days"`, otherwise `"Nd"`.
    fn default() -> Self {
        Self::new(vec![(11, LabelFormat::Long), (0, LabelFormat::Short)])
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
