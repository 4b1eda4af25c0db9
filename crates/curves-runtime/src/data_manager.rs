//! Per-run dataset cache.
//!
//! Every view of a run asks [`DataManager::get`] for the `(source, metric)`
//! pair it needs. The first request downloads (or reuses the local copy of)
//! the CSV files and builds the [`Dataset`]; later requests return the same
//! value without touching the disk again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use curves_core::error::Result;
use curves_core::models::{Dataset, Metric, Source};
use curves_data::analysis::{load_continent_groups, load_dataset};
use curves_data::fetch::{Downloader, FetchOptions};

/// Continent name → member countries, `"All"` last.
pub type ContinentGroups = Vec<(String, Vec<String>)>;

// ── DataManager ───────────────────────────────────────────────────────────────

/// In-memory cache of datasets keyed by source and metric.
///
/// # Example
/// ```no_run
/// use curves_runtime::data_manager::DataManager;
/// use curves_runtime::data::fetch::FetchOptions;
/// use curves_runtime::core::models::{Metric, Source};
///
/// let mut mgr = DataManager::from_options(FetchOptions::default())?;
/// let ds = mgr.get(Source::Us, Metric::Cases)?;
/// println!("{} states", ds.table.num_regions());
/// # Ok::<(), curves_runtime::core::error::CurvesError>(())
/// ```
pub struct DataManager {
    downloader: Downloader,
    cache: HashMap<(Source, Metric), Dataset>,
    continents: Option<ContinentGroups>,
    /// Number of datasets built from disk so far.
    loads: usize,
}

impl DataManager {
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            cache: HashMap::new(),
            continents: None,
            loads: 0,
        }
    }

    pub fn from_options(opts: FetchOptions) -> Result<Self> {
        Ok(Self::new(Downloader::new(opts)?))
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// The dataset for `source` / `metric`, loading it on first use.
    ///
    /// A failed load is not cached; the next call tries again.
    pub fn get(&mut self, source: Source, metric: Metric) -> Result<&Dataset> {
        match self.cache.entry((source, metric)) {
            Entry::Occupied(e) => {
                tracing::debug!(%source, %metric, "returning cached dataset");
                Ok(&*e.into_mut())
            }
            Entry::Vacant(e) => {
                let started = Instant::now();
                match load_dataset(&self.downloader, source, metric) {
                    Ok(ds) => {
                        self.loads += 1;
                        tracing::debug!(
                            %source,
                            %metric,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "dataset cached"
                        );
                        Ok(&*e.insert(ds))
                    }
                    Err(err) => {
                        tracing::warn!(%source, %metric, error = %err, "dataset load failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Countries of the global table grouped by continent.
    ///
    /// Loads the global case table if it is not cached yet.
    pub fn continent_groups(&mut self) -> Result<&ContinentGroups> {
        if self.continents.is_none() {
            let known: Vec<String> = self
                .get(Source::Global, Metric::Cases)?
                .table
                .regions()
                .to_vec();
            let groups = load_continent_groups(&self.downloader, &known)?;
            tracing::debug!(groups = groups.len(), "continent groups built");
            self.continents = Some(groups);
        }
        Ok(&*self.continents.get_or_insert_with(Vec::new))
    }

    pub fn is_cached(&self, source: Source, metric: Metric) -> bool {
        self.cache.contains_key(&(source, metric))
    }

    pub fn loads(&self) -> usize {
        self.loads
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
