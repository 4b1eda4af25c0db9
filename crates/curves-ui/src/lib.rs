//! Terminal presentation layer for covid-curves.
//!
//! Grid and overlay charts, the ranking table, the interactive continent
//! dashboard and a text exporter that writes rendered charts to disk, all
//! drawn with [`ratatui`].

pub mod app;
pub mod components;
pub mod export;
pub mod grid_view;
pub mod overlay_view;
pub mod rank_view;
pub mod themes;

pub use curves_core as core;
