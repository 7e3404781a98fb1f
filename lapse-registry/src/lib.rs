//! # lapse registry
//!
//! Lookup-or-create access to named cache tables.
//!
//! A [`CacheRegistry`] is an explicit context object: create one per process
//! (or per subsystem) and hand clones to whoever needs tables. Tables are
//! created on first reference and live as long as the registry.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lapse_registry::CacheRegistry;
//!
//! let registry: CacheRegistry<String, String> = CacheRegistry::new()?;
//! let sessions = registry.table("sessions");
//! assert_eq!(sessions.name(), "sessions");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod registry;

pub use registry::CacheRegistry;
