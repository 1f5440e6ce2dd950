//! Dataset analysis.
//!
//! Typed row parsing and summary statistics for validated tables.

pub mod aggregator;

pub use aggregator::*;
