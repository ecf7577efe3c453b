//! Analytic accounts of purchase lines, inherited from the warehouse.
//!
//! Pure functions only: callers load the chart roots and the warehouse, this
//! crate decides the entries.

pub mod rule;

pub use rule::{AnalyticTiming, line_analytic_entries, reconcile_line, warehouse_analytics};
