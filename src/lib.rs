//! Zealty Scout: collects active, sold and expired listings for a metro area
//! from a map backend that caps every query at 500 rows.
//!
//! The area is split into a grid of cells, each cell is queried with a signed
//! request over an authenticated session, and the per-cell rows are merged
//! into one deduplicated set per category.

pub mod config;
pub mod error;
pub mod grid;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod reconcile;
pub mod scrapers;
