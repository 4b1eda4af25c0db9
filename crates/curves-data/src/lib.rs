//! Data ingestion layer for covid-curves.
//!
//! Fetches the JHU time series files (reusing fresh local copies), parses
//! them and the census population tables, groups rows into per-region
//! columns and assembles [`Dataset`](curves_core::models::Dataset) values
//! for the runtime and UI layers.

pub mod aggregator;
pub mod analysis;
pub mod fetch;
pub mod reader;

pub use curves_core as core;
