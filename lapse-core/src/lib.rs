//! # lapse core
//!
//! Shared building blocks for the lapse cache:
//!
//! - [`Entry`]: a cached value with lifespan and access bookkeeping
//! - [`CacheError`]: the caller-visible error taxonomy
//! - [`TraceSink`]: pluggable diagnostic sink attached to a table
//! - [`TableConfig`]: per-table settings, including the [`ReadPolicy`]
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use lapse_core::Entry;
//!
//! let entry = Entry::new("session", Duration::from_secs(30), "token");
//! assert_eq!(entry.access_count(), 0);
//! entry.touch();
//! assert_eq!(entry.access_count(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod config;
pub mod entry;
pub mod error;
pub mod sink;

pub use config::{ParseReadPolicyError, ReadPolicy, TableConfig};
pub use entry::Entry;
pub use error::{CacheError, Result};
pub use sink::{BufferSink, NoopSink, TraceSink, TracingSink};
