//! # lapse table
//!
//! In-process key/value tables with per-entry lifespans.
//!
//! Expiration is driven by a self-rescheduling sweep: each pass removes the
//! entries whose lifespan has elapsed, then sleeps until the soonest remaining
//! deadline. Tables without expiring entries keep no timer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use lapse_table::CacheTable;
//!
//! let table: CacheTable<&str, u64> = CacheTable::new("counters")?;
//! table.add("visits", Duration::from_millis(100), 42)?;
//! assert!(table.is_armed());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod schedule;
mod table;

pub use schedule::{plan_sweep, SweepPlan, SweepSchedule};
pub use table::{CacheTable, SweepReport, TableStats};
