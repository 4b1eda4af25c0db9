//! Domain layer for covid-curves.
//!
//! Holds the time series model, the ranking / smoothing / milestone
//! analytics, per-capita normalisation, named region sets, number and label
//! formatting, CLI settings and the shared error type. Nothing in this crate
//! performs network I/O.

pub mod analytics;
pub mod error;
pub mod formatting;
pub mod models;
pub mod regions;
pub mod settings;
pub mod time_utils;
