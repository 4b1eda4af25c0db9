//! Runtime layer for covid-curves.
//!
//! Keeps loaded datasets for the length of a run and drives batches of
//! chart jobs through a renderer supplied by the presentation layer.

pub mod data_manager;
pub mod orchestrator;

pub use curves_core as core;
pub use curves_data as data;
