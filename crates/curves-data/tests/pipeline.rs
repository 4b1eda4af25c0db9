//! End-to-end dataset loading from CSV fixtures in a temporary data dir.

use std::fs;
use std::path::Path;
use std::time::Duration;

use curves_core::analytics::{
    build_milestone_track, normalize_table, rank_regions, rank_regions_where, population_floor,
    MilestoneSpec,
};
use curves_core::error::CurvesError;
use curves_core::formatting::LabelPolicy;
use curves_core::models::{Direction, Metric, NegativeDeltaPolicy, RankConfig, Source};
use curves_data::analysis::{load_continent_groups, load_dataset, weekly_per_capita, ALL_GROUP};
use curves_data::fetch::{
    time_series_filename, Downloader, FetchOptions, COUNTY_POPULATION_FILE,
    STATE_POPULATION_FILE, WORLD_POPULATION_FILE, WORLD_REGIONS_FILE,
};
use tempfile::TempDir;

const GLOBAL_CASES: &str = "\
Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20,3/4/20
,Italy,41.9,12.6,100,300,600,1000
,Germany,51.2,10.5,50,60,80,90
,Diamond Princess,0,0,700,700,700,700
,Taiwan*,23.7,121.0,40,41,42,44
Hubei,China,30.9,112.2,400,420,440,450
Beijing,China,40.1,116.4,10,12,15,20
";

const WORLD_POPS: &str = "\
International Data Base
Region,Country,Year,Population,Area (sq. km.),Density (persons per sq. km.)
Europe,Italy,2020,\"62,402,659\",294140,212
Europe,Germany,2020,\"80,159,662\",348672,230
East Asia,China,2020,\"1,394,015,977\",9326410,149
East Asia,Taiwan,2020,\"23,603,049\",32260,732
";

const WORLD_REGIONS: &str = "\
International Data Base
Region,Country,Year,Population
Europe,Italy,2020,1
Europe,Germany,2020,1
East Asia,China,2020,1
East Asia,Taiwan,2020,1
";

const US_CASES: &str = "\
UID,iso2,iso3,code3,FIPS,Admin2,Province_State,Country_Region,Lat,Long_,Combined_Key,3/1/20,3/2/20,3/3/20
84001001,US,USA,840,1001.0,Autauga,Alabama,US,32.5,-86.6,\"Autauga, Alabama, US\",0,10,30
84001003,US,USA,840,1003.0,Baldwin,Alabama,US,30.7,-87.7,\"Baldwin, Alabama, US\",5,10,12
84036061,US,USA,840,36061.0,New York,New York,US,40.7,-74.0,\"New York, New York, US\",100,200,400
84090036,US,USA,840,,Unassigned,New York,US,0,0,\"Unassigned, New York, US\",0,0,3
";

const STATE_POPS: &str = "State,2019\n.Alabama,\"4,903,185\"\n.New York,\"19,453,561\"\n";

const COUNTY_POPS: &str = "\
SUMLEV,STATE,COUNTY,STNAME,CTYNAME,POPESTIMATE2019
50,1,1,Alabama,Autauga County,55869
50,1,3,Alabama,Baldwin County,223234
50,36,61,New York,New York County,1628706
";

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("write fixture");
}

fn offline(dir: &TempDir) -> Downloader {
    Downloader::new(FetchOptions {
        base_url: "http://127.0.0.1:1".to_string(),
        data_dir: dir.path().to_path_buf(),
        max_age: Duration::from_secs(43_200),
        offline: true,
        retry_backoff: Duration::ZERO,
    })
    .expect("downloader")
}

#[test]
fn global_dataset_groups_and_fixes_names() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), time_series_filename(Source::Global, Metric::Cases), GLOBAL_CASES);
    write(dir.path(), WORLD_POPULATION_FILE, WORLD_POPS);
    let dl = offline(&dir);

    let ds = load_dataset(&dl, Source::Global, Metric::Cases).expect("dataset");
    assert_eq!(ds.table.regions(), &["China", "Germany", "Italy", "Taiwan"]);
    assert_eq!(ds.table.region("China").unwrap(), &[410.0, 432.0, 455.0, 470.0]);
    assert_eq!(ds.populations.get("Taiwan"), Some(23_603_049));
    assert_eq!(ds.populations.get("Italy"), Some(62_402_659));

    let worst = rank_regions(&ds.table, &RankConfig::new(2, 1, Direction::Worst)).unwrap();
    assert_eq!(worst, vec!["Italy".to_string()]);

    let per_capita = normalize_table(&ds.table, &ds.populations, 1_000_000.0).unwrap();
    assert_eq!(per_capita.num_regions(), 4);

    let big = rank_regions_where(
        &ds.table,
        &RankConfig::new(2, 4, Direction::Best),
        population_floor(&ds.populations, 70_000_000),
    )
    .unwrap();
    assert_eq!(big, vec!["Germany".to_string(), "China".to_string()]);
}

#[test]
fn global_milestone_track() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), time_series_filename(Source::Global, Metric::Cases), GLOBAL_CASES);
    let ds = load_dataset(&offline(&dir), Source::Global, Metric::Cases).expect("dataset");

    let italy = ds.table.region("Italy").unwrap();
    let spec = MilestoneSpec::cases().with_step(250.0);
    let track =
        build_milestone_track(ds.table.dates(), italy, &spec, &LabelPolicy::default()).unwrap();
    let labels: Vec<&str> = track.marks.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["100", "250", "500", "750"]);
    assert_eq!(track.terminal, Some(3));
}

#[test]
fn missing_population_file_fails_per_capita_only() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), time_series_filename(Source::Global, Metric::Cases), GLOBAL_CASES);
    let ds = load_dataset(&offline(&dir), Source::Global, Metric::Cases).expect("dataset");
    assert!(ds.populations.is_empty());
    assert!(matches!(
        normalize_table(&ds.table, &ds.populations, 1e6),
        Err(CurvesError::MissingPopulation(_))
    ));
}

#[test]
fn us_dataset_by_state() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), time_series_filename(Source::Us, Metric::Cases), US_CASES);
    write(dir.path(), STATE_POPULATION_FILE, STATE_POPS);

    let ds = load_dataset(&offline(&dir), Source::Us, Metric::Cases).expect("dataset");
    assert_eq!(ds.table.regions(), &["Alabama", "New York"]);
    assert_eq!(ds.table.region("Alabama").unwrap(), &[5.0, 20.0, 42.0]);
    assert_eq!(ds.table.region("New York").unwrap(), &[100.0, 200.0, 403.0]);
    assert_eq!(ds.populations.get("New York"), Some(19_453_561));
}

#[test]
fn county_dataset_and_weekly_table() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), time_series_filename(Source::UsCounties, Metric::Cases), US_CASES);
    write(dir.path(), COUNTY_POPULATION_FILE, COUNTY_POPS);

    let ds = load_dataset(&offline(&dir), Source::UsCounties, Metric::Cases).expect("dataset");
    assert_eq!(ds.table.num_regions(), 4);
    assert_eq!(ds.populations.get("Autauga, Alabama"), Some(55_869));
    assert_eq!(ds.populations.get("Unassigned, New York"), None);

    let weekly = weekly_per_capita(&ds.table, &ds.populations, 1_000.0, NegativeDeltaPolicy::ClampToZero)
        .unwrap();
    assert_eq!(weekly.rows.len(), 3);
    let worst = weekly.worst_last_week(1);
    assert_eq!(worst[0].0, "Autauga, Alabama");
}

#[test]
fn continent_groups_from_data_dir() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), WORLD_REGIONS_FILE, WORLD_REGIONS);
    let dl = offline(&dir);
    let known = ["China", "Germany", "Italy", "Taiwan"];

    let groups = load_continent_groups(&dl, &known).unwrap();
    let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["East Asia", "Europe", ALL_GROUP]);

    fs::remove_file(dir.path().join(WORLD_REGIONS_FILE)).expect("remove");
    let groups = load_continent_groups(&dl, &known).unwrap();
    assert_eq!(groups.len(), 1);
}

#[test]
fn offline_without_time_series_fails() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_dataset(&offline(&dir), Source::Us, Metric::Deaths).unwrap_err();
    assert!(matches!(err, CurvesError::FileRead { .. }));
}
