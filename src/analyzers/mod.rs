//! Snapshot comparison and price-movement aggregation.
//!
//! Two snapshots are joined on flight identity, each matched pair gets a
//! price delta and a change bucket, and the deltas are rolled up per agent
//! and per route into a single report.

pub mod aggregate;
pub mod analyzer;
pub mod classify;
pub mod compare;
pub mod report;
pub mod types;
pub mod utility;
