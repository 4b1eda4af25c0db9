//! Grouping raw rows into per-region columns, plus the name fixes that make
//! JHU and census spellings agree.

use std::collections::{BTreeMap, HashMap};

use curves_core::error::Result;
use curves_core::models::{PopulationTable, TimeSeriesTable};
use curves_core::regions::{census_name, CENSUS_COMPOSITES, JHU_DROPPED, JHU_RENAMES};
use tracing::debug;

use crate::reader::{RawSeries, SeriesRow};

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Sum the rows of `raw` that share a key. Rows for which `key` returns
/// `None` are skipped. Columns come out sorted by key.
pub fn group_rows<F>(raw: &RawSeries, key: F) -> Result<TimeSeriesTable>
where
    F: Fn(&SeriesRow) -> Option<String>,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in &raw.rows {
        let Some(k) = key(row) else {
            continue;
        };
        let acc = groups
            .entry(k)
            .or_insert_with(|| vec![0.0; raw.dates.len()]);
        for (a, v) in acc.iter_mut().zip(&row.values) {
            *a += v;
        }
    }
    debug!(rows = raw.rows.len(), groups = groups.len(), "grouped rows");
    TimeSeriesTable::from_columns(raw.dates.clone(), groups)
}

/// One column per country (global files) or per state (US files).
pub fn by_region(raw: &RawSeries) -> Result<TimeSeriesTable> {
    group_rows(raw, |row| Some(row.region.clone()))
}

/// One column per county, named `"County, State"`, plus the FIPS code of
/// every county that has one.
pub fn by_county(raw: &RawSeries) -> Result<(TimeSeriesTable, HashMap<String, String>)> {
    let table = group_rows(raw, |row| row.county.as_ref().map(|c| county_name(c, &row.region)))?;
    let fips = raw
        .rows
        .iter()
        .filter_map(|row| {
            let county = row.county.as_ref()?;
            Some((county_name(county, &row.region), row.fips.clone()?))
        })
        .collect();
    Ok((table, fips))
}

pub fn county_name(county: &str, state: &str) -> String {
    format!("{}, {}", county, state)
}

// ── Name fixes ────────────────────────────────────────────────────────────────

/// Drop cruise ships and the Holy See; fix JHU spellings.
pub fn fix_jhu_names(table: &mut TimeSeriesTable) -> Result<()> {
    table.retain(|name| !JHU_DROPPED.contains(&name));
    for (from, to) in JHU_RENAMES {
        table.rename_region(from, to)?;
    }
    Ok(())
}

/// Bring census population names in line with JHU names and keep only
/// regions that appear in `known`.
pub fn fix_census_populations<S: AsRef<str>>(
    census: &PopulationTable,
    known: &[S],
) -> PopulationTable {
    let mut renamed = PopulationTable::new();
    for region in census.regions() {
        if let Some(p) = census.get(region) {
            renamed.insert(census_name(region), p);
        }
    }
    for (name, parts) in CENSUS_COMPOSITES {
        match renamed.total(*parts) {
            Ok(total) => renamed.insert(*name, total),
            Err(e) => debug!(region = *name, error = %e, "composite population unavailable"),
        }
    }

    let mut out = PopulationTable::new();
    for name in known {
        let name = name.as_ref();
        if let Some(p) = renamed.get(name) {
            out.insert(name, p);
        }
    }
    out
}

/// Populations of counties keyed by name, joined through FIPS.
pub fn county_populations(
    fips_by_name: &HashMap<String, String>,
    pop_by_fips: &HashMap<String, u64>,
) -> PopulationTable {
    fips_by_name
        .iter()
        .filter_map(|(name, fips)| pop_by_fips.get(fips).map(|p| (name.clone(), *p)))
        .collect()
}

/// Add the population of a composite region if every member has one.
pub fn add_composite_population<S: AsRef<str>>(
    pops: &mut PopulationTable,
    name: &str,
    members: &[S],
) {
    match pops.total(members) {
        Ok(total) => pops.insert(name, total),
        Err(e) => debug!(region = name, error = %e, "composite population unavailable"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw() -> RawSeries {
        let d = |day| NaiveDate::from_ymd_opt(2020, 3, day).unwrap();
        RawSeries {
            dates: vec![d(1), d(2)],
            rows: vec![
                SeriesRow {
                    region: "New York".to_string(),
                    county: Some("Kings".to_string()),
                    fips: Some("36047".to_string()),
                    values: vec![1.0, 5.0],
                },
                SeriesRow {
                    region: "Alabama".to_string(),
                    county: Some("Autauga".to_string()),
                    fips: Some("01001".to_string()),
                    values: vec![0.0, 2.0],
                },
                SeriesRow {
                    region: "New York".to_string(),
                    county: Some("Queens".to_string()),
                    fips: None,
                    values: vec![3.0, 4.0],
                },
            ],
        }
    }

    #[test]
    fn test_by_region_sums_and_sorts() {
        let t = by_region(&raw()).unwrap();
        assert_eq!(t.regions(), &["Alabama", "New York"]);
        assert_eq!(t.region("New York").unwrap(), &[4.0, 9.0]);
    }

    #[test]
    fn test_by_county_keys_and_fips() {
        let (t, fips) = by_county(&raw()).unwrap();
        assert_eq!(t.num_regions(), 3);
        assert_eq!(t.region("Kings, New York").unwrap(), &[1.0, 5.0]);
        assert_eq!(fips.get("Autauga, Alabama").map(String::as_str), Some("01001"));
        assert!(!fips.contains_key("Queens, New York"));
    }

    #[test]
    fn test_fix_jhu_names() {
        let d = vec![NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()];
        let mut t = TimeSeriesTable::from_columns(
            d,
            vec![
                ("Diamond Princess", vec![700.0]),
                ("Italy", vec![1.0]),
                ("Taiwan*", vec![2.0]),
                ("Holy See", vec![0.0]),
            ],
        )
        .unwrap();
        fix_jhu_names(&mut t).unwrap();
        assert_eq!(t.regions(), &["Italy", "Taiwan"]);
    }

    #[test]
    fn test_fix_census_populations() {
        let census: PopulationTable = vec![
            ("United States", 330u64),
            ("Gaza Strip", 2),
            ("West Bank", 3),
            ("Bahamas, The", 1),
            ("Atlantis", 9),
        ]
        .into_iter()
        .collect();
        let known = ["US", "West Bank and Gaza", "Bahamas", "Italy"];
        let fixed = fix_census_populations(&census, &known);
        assert_eq!(fixed.get("US"), Some(330));
        assert_eq!(fixed.get("West Bank and Gaza"), Some(5));
        assert_eq!(fixed.get("Bahamas"), Some(1));
        assert_eq!(fixed.get("Atlantis"), None);
        assert_eq!(fixed.len(), 3);
    }

    #[test]
    fn test_county_populations_join() {
        let (_, fips) = by_county(&raw()).unwrap();
        let pop_by_fips: HashMap<String, u64> =
            vec![("01001".to_string(), 55_869u64)].into_iter().collect();
        let pops = county_populations(&fips, &pop_by_fips);
        assert_eq!(pops.get("Autauga, Alabama"), Some(55_869));
        assert_eq!(pops.get("Kings, New York"), None);
    }

    #[test]
    fn test_add_composite_population() {
        let mut pops: PopulationTable = vec![("A", 1u64), ("B", 2)].into_iter().collect();
        add_composite_population(&mut pops, "AB", &["A", "B"]);
        assert_eq!(pops.get("AB"), Some(3));
        add_composite_population(&mut pops, "AC", &["A", "C"]);
        assert_eq!(pops.get("AC"), None);
    }
}
