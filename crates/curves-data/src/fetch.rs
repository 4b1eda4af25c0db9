//! Download collaborator: keeps local copies of the published CSV files.
//!
//! A local file younger than `max_age` is reused. An older one is deleted and
//! fetched again. Downloads land in a `.part` file that is renamed into place
//! once complete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use curves_core::error::{CurvesError, Result};
use curves_core::models::{Metric, Source};
use tracing::{debug, info, warn};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// JHU CSSE time series directory.
pub const JHU_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

/// Local copies younger than this are reused (12 hours).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(43_200);

const MAX_ATTEMPTS: u32 = 3;

/// US state populations (census estimates).
pub const STATE_POPULATION_FILE: &str = "nst-est2019-01.csv";
/// World populations by country (census international database).
pub const WORLD_POPULATION_FILE: &str = "Census_data_20200726.csv";
/// US county populations.
pub const COUNTY_POPULATION_FILE: &str = "county_pop.csv";
/// Country → world region (continent) assignments.
pub const WORLD_REGIONS_FILE: &str = "Census_data_2020_world_regions.csv";

/// Name of the published time series file for `source` and `metric`.
pub fn time_series_filename(source: Source, metric: Metric) -> &'static str {
    match (source, metric) {
        (Source::Global, Metric::Cases) => "time_series_covid19_confirmed_global.csv",
        (Source::Global, Metric::Deaths) => "time_series_covid19_deaths_global.csv",
        (Source::Us | Source::UsCounties, Metric::Cases) => "time_series_covid19_confirmed_US.csv",
        (Source::Us | Source::UsCounties, Metric::Deaths) => "time_series_covid19_deaths_US.csv",
    }
}

/// `~/.covid-curves/data`
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".covid-curves")
        .join("data")
}

/// `true` when a file modified at `modified` is still usable at `now`.
///
/// Modification times in the future count as fresh.
pub fn is_fresh(modified: SystemTime, now: SystemTime, max_age: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age <= max_age,
        Err(_) => true,
    }
}

// ── FetchOptions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Directory URL the file names are appended to.
    pub base_url: String,
    /// Where local copies live.
    pub data_dir: PathBuf,
    pub max_age: Duration,
    /// Never touch the network; stale local copies are still used.
    pub offline: bool,
    /// Sleep before retry `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            base_url: JHU_URL.to_string(),
            data_dir: default_data_dir(),
            max_age: DEFAULT_MAX_AGE,
            offline: false,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

// ── Downloader ────────────────────────────────────────────────────────────────

pub struct Downloader {
    opts: FetchOptions,
    client: Option<reqwest::blocking::Client>,
}

impl Downloader {
    /// Build a downloader. No HTTP client is created in offline mode.
    pub fn new(opts: FetchOptions) -> Result<Self> {
        let client = if opts.offline {
            None
        } else {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent(concat!("covid-curves/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| CurvesError::Download {
                    url: opts.base_url.clone(),
                    message: e.to_string(),
                })?;
            Some(client)
        };
        Ok(Self { opts, client })
    }

    pub fn data_dir(&self) -> &Path {
        &self.opts.data_dir
    }

    pub fn options(&self) -> &FetchOptions {
        &self.opts
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.opts.base_url.trim_end_matches('/'), filename)
    }

    /// Path of an up-to-date local copy of `filename`, fetching it if needed.
    pub fn ensure(&self, filename: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.opts.data_dir)?;
        let path = self.opts.data_dir.join(filename);

        if path.exists() {
            let modified = fs::metadata(&path)?.modified()?;
            if self.opts.offline || is_fresh(modified, SystemTime::now(), self.opts.max_age) {
                info!(path = %path.display(), "local copy already up to date");
                return Ok(path);
            }
            debug!(path = %path.display(), "local copy is stale; removing");
            fs::remove_file(&path)?;
        }

        let Some(client) = self.client.as_ref() else {
            return Err(CurvesError::FileRead {
                path,
                source: io::Error::new(io::ErrorKind::NotFound, "offline and no local copy"),
            });
        };

        let url = self.url_for(filename);
        self.fetch_with_retry(client, &url, &path)?;
        info!(url = %url, path = %path.display(), "downloaded");
        Ok(path)
    }

    /// Path of a file that is only ever provided locally (population tables).
    pub fn local(&self, filename: &str) -> Result<PathBuf> {
        let path = self.opts.data_dir.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(CurvesError::FileRead {
                path,
                source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
            })
        }
    }

    fn fetch_with_retry(
        &self,
        client: &reqwest::blocking::Client,
        url: &str,
        dest: &Path,
    ) -> Result<()> {
        let mut last_err = String::new();
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let sleep = self.opts.retry_backoff * attempt;
                debug!(attempt, sleep_ms = sleep.as_millis() as u64, "retrying download");
                thread::sleep(sleep);
            }
            match fetch_once(client, url, dest) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, url, error = %e, "download attempt failed");
                    last_err = e;
                }
            }
        }
        Err(CurvesError::Download {
            url: url.to_string(),
            message: last_err,
        })
    }
}

fn fetch_once(
    client: &reqwest::blocking::Client,
    url: &str,
    dest: &Path,
) -> std::result::Result<(), String> {
    let resp = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    let bytes = resp.bytes().map_err(|e| e.to_string())?;

    let part = dest.with_extension("csv.part");
    fs::write(&part, &bytes).map_err(|e| e.to_string())?;
    fs::rename(&part, dest).map_err(|e| e.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
