//! Named region lists and the grid chart configurations built from them.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::analytics::MilestoneSpec;
use crate::error::{CurvesError, Result};
use crate::formatting::{format_count, LabelPolicy};
use crate::models::{Metric, Source};

/// The 50 US states.
pub const STATES: &[&str] = &[
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
];

/// The 27 EU member states, named as in the JHU global file.
pub const EU: &[&str] = &[
    "Austria",
    "Belgium",
    "Bulgaria",
    "Croatia",
    "Cyprus",
    "Czechia",
    "Denmark",
    "Estonia",
    "Finland",
    "France",
    "Germany",
    "Greece",
    "Hungary",
    "Ireland",
    "Italy",
    "Latvia",
    "Lithuania",
    "Luxembourg",
    "Malta",
    "Netherlands",
    "Poland",
    "Portugal",
    "Romania",
    "Slovakia",
    "Slovenia",
    "Spain",
    "Sweden",
];

pub const LATIN: &[&str] = &[
    "Argentina",
    "Belize",
    "Bolivia",
    "Brazil",
    "Chile",
    "Colombia",
    "Costa Rica",
    "Cuba",
    "Dominican Republic",
    "Ecuador",
    "El Salvador",
    "Guatemala",
    "Honduras",
    "Mexico",
    "Nicaragua",
    "Panama",
    "Paraguay",
    "Peru",
    "Uruguay",
    "Venezuela",
];

/// Countries of the world grid.
pub const SHOWCASE: &[&str] = &[
    "Brazil",
    "Costa Rica",
    "El Salvador",
    "Germany",
    "Iran",
    "Italy",
    "Korea, South",
    "Mexico",
    "Russia",
    "Spain",
    "Sweden",
    "US",
];

// ── Name fixes ────────────────────────────────────────────────────────────────

/// JHU columns that are not countries.
pub const JHU_DROPPED: &[&str] = &["Diamond Princess", "MS Zaandam", "Holy See"];

/// JHU name → canonical name.
pub const JHU_RENAMES: &[(&str, &str)] = &[("Taiwan*", "Taiwan")];

/// Census country name → JHU name.
pub const CENSUS_RENAMES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("Bahamas, The", "Bahamas"),
    ("Gambia, The", "Gambia"),
];

/// Census splits this JHU region in two.
pub const CENSUS_COMPOSITES: &[(&str, &[&str])] =
    &[("West Bank and Gaza", &["Gaza Strip", "West Bank"])];

/// Census continent assignments missing from the regions file.
pub const CONTINENT_EXTRAS: &[(&str, &str)] = &[("West Bank and Gaza", "Asia")];

pub fn census_name(name: &str) -> &str {
    CENSUS_RENAMES
        .iter()
        .find(|(from, _)| *from == name)
        .map_or(name, |(_, to)| to)
}

// ── RegionSet ─────────────────────────────────────────────────────────────────

/// A named group of grid charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionSet {
    World,
    Usa,
    Latin,
    EuVsUsa,
    WorstUsa,
    WorstWorld,
    WorstCounties,
}

impl RegionSet {
    pub const ALL: &'static [RegionSet] = &[
        RegionSet::World,
        RegionSet::Usa,
        RegionSet::Latin,
        RegionSet::EuVsUsa,
        RegionSet::WorstUsa,
        RegionSet::WorstWorld,
        RegionSet::WorstCounties,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RegionSet::World => "world",
            RegionSet::Usa => "usa",
            RegionSet::Latin => "latin",
            RegionSet::EuVsUsa => "eu_vs_usa",
            RegionSet::WorstUsa => "worst_usa",
            RegionSet::WorstWorld => "worst_world",
            RegionSet::WorstCounties => "worst_counties",
        }
    }

    /// Parse a set name. `global` and `worst_global` are accepted aliases.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "world" | "global" => Ok(RegionSet::World),
            "usa" => Ok(RegionSet::Usa),
            "latin" => Ok(RegionSet::Latin),
            "eu_vs_usa" => Ok(RegionSet::EuVsUsa),
            "worst_usa" => Ok(RegionSet::WorstUsa),
            "worst_world" | "worst_global" => Ok(RegionSet::WorstWorld),
            "worst_counties" => Ok(RegionSet::WorstCounties),
            _ => Err(CurvesError::UnknownRegionSet(name.to_string())),
        }
    }

    pub fn source(&self) -> Source {
        match self {
            RegionSet::Usa | RegionSet::WorstUsa => Source::Us,
            RegionSet::WorstCounties => Source::UsCounties,
            RegionSet::World | RegionSet::Latin | RegionSet::EuVsUsa | RegionSet::WorstWorld => {
                Source::Global
            }
        }
    }

    /// Grid layout and content for this set.
    pub fn grid_config(&self, metric: Metric) -> GridConfig {
        let label = metric.label();
        let (selection, rows, cols, stem) = match self {
            RegionSet::World => (
                Selection::members(SHOWCASE),
                3,
                4,
                format!("global_new_{}", label),
            ),
            RegionSet::Latin => (
                Selection::members(LATIN),
                4,
                5,
                format!("latin_new_{}", label),
            ),
            RegionSet::Usa => (
                Selection::members(STATES),
                5,
                10,
                format!("states_new_{}", label),
            ),
            RegionSet::EuVsUsa => (
                Selection::members(&["US", "EU"]),
                2,
                1,
                format!("EU_vs_USA_{}", label),
            ),
            RegionSet::WorstUsa => (Selection::Worst(9), 3, 3, format!("worst_usa_{}", label)),
            RegionSet::WorstWorld => {
                (Selection::Worst(9), 3, 3, format!("worst_global_{}", label))
            }
            RegionSet::WorstCounties => (
                Selection::Worst(9),
                3,
                3,
                format!("worst_counties_{}", label),
            ),
        };

        let comparison = *self == RegionSet::EuVsUsa;
        GridConfig {
            set: *self,
            source: self.source(),
            metric,
            selection,
            composite: comparison.then(|| Composite {
                name: "EU".to_string(),
                members: EU.iter().map(|s| s.to_string()).collect(),
            }),
            rows,
            cols,
            milestones: comparison.then(|| MilestoneSpec::for_metric(metric)),
            label_policy: LabelPolicy::default(),
            shared_ylim: comparison,
            show_population: comparison,
            start: if comparison {
                NaiveDate::from_ymd_opt(2020, 2, 21)
            } else {
                NaiveDate::from_ymd_opt(2020, 2, 27)
            },
            file_stem: stem,
        }
    }
}

impl fmt::Display for RegionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── GridConfig ────────────────────────────────────────────────────────────────

/// Which regions fill the panels of a grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Selection {
    /// Fixed list, in panel order.
    Members(Vec<String>),
    /// The `k` regions with the highest latest daily change.
    Worst(usize),
}

impl Selection {
    pub fn members(names: &[&str]) -> Self {
        Selection::Members(names.iter().map(|s| s.to_string()).collect())
    }
}

/// A region added as the sum of others before plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composite {
    pub name: String,
    pub members: Vec<String>,
}

/// Everything a grid chart needs apart from the data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridConfig {
    pub set: RegionSet,
    pub source: Source,
    pub metric: Metric,
    pub selection: Selection,
    pub composite: Option<Composite>,
    pub rows: usize,
    pub cols: usize,
    /// Milestone track and vertical lines; `None` disables them.
    pub milestones: Option<MilestoneSpec>,
    pub label_policy: LabelPolicy,
    /// All panels share the largest y-limit.
    pub shared_ylim: bool,
    /// Put the population in the panel titles.
    pub show_population: bool,
    /// Left edge of the date axis.
    pub start: Option<NaiveDate>,
    /// Output file name without extension.
    pub file_stem: String,
}

impl GridConfig {
    pub fn panel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Turn milestone annotation on for every panel.
    pub fn with_milestones(mut self, spec: MilestoneSpec) -> Self {
        self.milestones = Some(spec);
        self
    }
}

// ── Overlays ──────────────────────────────────────────────────────────────────

/// States drawn on the usa overlay charts.
pub const OVERLAY_STATES: &[&str] = &[
    "Arkansas",
    "California",
    "Indiana",
    "Maryland",
    "New Jersey",
    "New York",
    "Ohio",
    "Texas",
    "Washington",
];

/// Countries drawn on the world overlay charts.
pub const OVERLAY_COUNTRIES: &[&str] = &[
    "China",
    "El Salvador",
    "Iran",
    "Italy",
    "Japan",
    "Korea, South",
    "Spain",
    "Taiwan",
    "US",
];

/// Count a curve must exceed before it starts on a days-since chart.
pub const OVERLAY_N_MIN: f64 = 100.0;

/// X axis of an overlay chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Calendar dates.
    Date,
    /// Days since the curve first exceeded `n_min`.
    DaysSince,
}

/// One chart of overlaid cumulative curves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayConfig {
    pub set: RegionSet,
    pub source: Source,
    pub metric: Metric,
    pub members: Vec<String>,
    pub alignment: Alignment,
    /// People per unit for per-capita curves; `None` plots raw counts.
    pub capita: Option<f64>,
    pub log_scale: bool,
    pub n_min: f64,
    /// Left edge of a date axis.
    pub start: Option<NaiveDate>,
    pub title: String,
    pub file_stem: String,
}

/// The eight overlay charts of `usa` or `world`: raw and per-capita curves,
/// by date and by days since [`OVERLAY_N_MIN`], each on a linear and a log
/// axis.
///
/// Case charts keep the plain stems (`usa_days`, `usa_capita_date_log`);
/// death charts append `_deaths`.
pub fn overlay_configs(set: RegionSet, metric: Metric, capita: f64) -> Result<Vec<OverlayConfig>> {
    let members = match set {
        RegionSet::Usa => OVERLAY_STATES,
        RegionSet::World => OVERLAY_COUNTRIES,
        other => {
            return Err(CurvesError::Config(format!(
                "no overlay charts for region set {}",
                other
            )))
        }
    };
    let noun = match metric {
        Metric::Cases => "Cases",
        Metric::Deaths => "Deaths",
    };
    let per = format!(" Per {}", format_count(capita));

    let mut out = Vec::with_capacity(8);
    for log_scale in [false, true] {
        for alignment in [Alignment::Date, Alignment::DaysSince] {
            for per_capita in [true, false] {
                let mut stem = set.name().to_string();
                if per_capita {
                    stem.push_str("_capita");
                }
                stem.push_str(match alignment {
                    Alignment::Date => "_date",
                    Alignment::DaysSince => "_days",
                });
                if log_scale {
                    stem.push_str("_log");
                }
                if metric == Metric::Deaths {
                    stem.push_str("_deaths");
                }

                let title = format!(
                    "{}Number of {}{} {}",
                    if log_scale { "Log " } else { "" },
                    noun,
                    if per_capita { per.as_str() } else { "" },
                    match alignment {
                        Alignment::Date => "by Date".to_string(),
                        Alignment::DaysSince => format!("Since {} {}", OVERLAY_N_MIN, noun),
                    }
                );

                out.push(OverlayConfig {
                    set,
                    source: set.source(),
                    metric,
                    members: members.iter().map(|s| s.to_string()).collect(),
                    alignment,
                    capita: per_capita.then_some(capita),
                    log_scale,
                    n_min: OVERLAY_N_MIN,
                    start: match alignment {
                        Alignment::Date => NaiveDate::from_ymd_opt(2020, 3, 1),
                        Alignment::DaysSince => None,
                    },
                    title,
                    file_stem: stem,
                });
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_list_sizes() {
        assert_eq!(STATES.len(), 50);
        assert_eq!(EU.len(), 27);
        assert_eq!(LATIN.len(), 20);
        assert_eq!(SHOWCASE.len(), 12);
    }

    #[test]
    fn test_region_set_names_roundtrip() {
        for set in RegionSet::ALL {
            assert_eq!(RegionSet::from_name(set.name()).unwrap(), *set);
        }
        assert_eq!(RegionSet::from_name("global").unwrap(), RegionSet::World);
        assert_eq!(
            RegionSet::from_name("worst_global").unwrap(),
            RegionSet::WorstWorld
        );
        assert!(matches!(
            RegionSet::from_name("mars"),
            Err(CurvesError::UnknownRegionSet(_))
        ));
    }

    #[test]
    fn test_layouts_fit_members() {
        for set in RegionSet::ALL {
            let cfg = set.grid_config(Metric::Cases);
            if let Selection::Members(m) = &cfg.selection {
                assert_eq!(m.len(), cfg.panel_count(), "{}", set);
            }
        }
    }

    #[test]
    fn test_eu_vs_usa_config() {
        let cfg = RegionSet::EuVsUsa.grid_config(Metric::Deaths);
        assert_eq!(cfg.file_stem, "EU_vs_USA_deaths");
        assert!(cfg.shared_ylim);
        assert_eq!(cfg.composite.as_ref().map(|c| c.members.len()), Some(27));
        assert_eq!(cfg.milestones, Some(MilestoneSpec::deaths()));
        assert_eq!((cfg.rows, cfg.cols), (2, 1));
    }

    #[test]
    fn test_worst_sets() {
        let cfg = RegionSet::WorstUsa.grid_config(Metric::Cases);
        assert_eq!(cfg.selection, Selection::Worst(9));
        assert_eq!(cfg.source, Source::Us);
        assert_eq!(cfg.milestones, None);
        assert_eq!(
            RegionSet::WorstCounties.grid_config(Metric::Cases).source,
            Source::UsCounties
        );
    }

    #[test]
    fn test_census_name() {
        assert_eq!(census_name("United States"), "US");
        assert_eq!(census_name("Gambia, The"), "Gambia");
        assert_eq!(census_name("France"), "France");
    }

    #[test]
    fn test_overlay_configs() {
        let cfgs = overlay_configs(RegionSet::Usa, Metric::Cases, 100_000.0).unwrap();
        assert_eq!(cfgs.len(), 8);
        let stems: Vec<&str> = cfgs.iter().map(|c| c.file_stem.as_str()).collect();
        assert!(stems.contains(&"usa_days"));
        assert!(stems.contains(&"usa_capita_days_log"));
        assert!(stems.contains(&"usa_date"));

        let capita_days = cfgs
            .iter()
            .find(|c| c.file_stem == "usa_capita_days")
            .unwrap();
        assert_eq!(capita_days.capita, Some(100_000.0));
        assert_eq!(capita_days.alignment, Alignment::DaysSince);
        assert_eq!(
            capita_days.title,
            "Number of Cases Per 100,000 Since 100 Cases"
        );
        assert_eq!(capita_days.members.len(), 9);
    }

    #[test]
    fn test_overlay_configs_deaths_and_world() {
        let cfgs = overlay_configs(RegionSet::World, Metric::Deaths, 1e6).unwrap();
        assert!(cfgs.iter().all(|c| c.file_stem.ends_with("_deaths")));
        assert!(cfgs.iter().all(|c| c.source == Source::Global));
        assert!(overlay_configs(RegionSet::Latin, Metric::Cases, 1e6).is_err());
    }
}
