//! Event store abstraction
//!
//! The analytics pipeline treats the columnar event corpus as an opaque
//! service reached through [`EventStoreClient`]. Production deployments
//! implement the trait against the real engine; [`MemoryEventStore`]
//! backs development and tests.

mod client;
mod memory;

pub use client::{
    AggregateQuery, AggregateRow, EventStoreClient, Grouping, HistogramQuery, HistogramRow,
    LimitBy, OrderField, OrderTerm, TimeRange,
};
pub use memory::{Event, MemoryEventStore};
