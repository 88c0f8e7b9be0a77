//! # tagsift
//!
//! Tag facet performance analytics over a large, append-only, columnar
//! event store.
//!
//! tagsift answers: which tag values correlate with a shift in a
//! performance metric, and how is that metric distributed per tag value?
//! Callers supply a filter predicate, a numeric metric column, and
//! optionally one tag key; the pipeline returns ranked facets whose
//! average metric deviates meaningfully from the filtered baseline,
//! ranked top values for a single key, or per-value metric histograms.
//!
//! ## Architecture
//!
//! - **Baseline resolver**: count/avg/min/max of the metric for the
//!   filtered population; an unresolved baseline ends the request with
//!   an empty page
//! - **Sampling planner**: bounds facet-query cost on large populations
//!   with a log-growth scan target
//! - **Facet aggregator**: (tag key, tag value) groups with derived
//!   frequency/comparison/delta statistics, discovery and single-key
//!   modes
//! - **Top-value ranker** and **histogram builder**: per-value ranking
//!   and independently-ranged metric distributions for one key
//! - **Pagination**: client-held offset cursors with `limit+1` sizing
//!
//! The event store itself is opaque: production implements
//! [`store::EventStoreClient`] against the real engine, while
//! [`store::MemoryEventStore`] backs development and tests.

pub mod analytics;
pub mod store;
pub mod telemetry;
pub mod vocab;

mod error;

pub use error::{Error, Result};
