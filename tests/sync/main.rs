//! Sync engine tests
//!
//! Drive the named jobs end to end against the in-memory source, sink and
//! watermark store.

mod coercion;
mod fixtures;
mod incremental;
mod jobs;
mod retention;
