//! Event store client trait and query specification values
//!
//! Each pipeline stage hands the store a fully-populated, immutable query
//! specification; no stage mutates a shared builder across calls. The
//! trait abstracts the backing engine so production can point at a real
//! columnar service while tests run against [`super::MemoryEventStore`].

use crate::vocab::MetricColumn;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Inclusive nanosecond time range a query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Midpoint of the range, used by the count-delta window split.
    pub fn midpoint(&self) -> i64 {
        self.start + (self.end - self.start) / 2
    }
}

/// How an aggregate query groups its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// No grouping: one row aggregating the whole filtered population.
    None,
    /// Group by (tag key, tag value); array-valued tags contribute one
    /// group per contained value.
    TagKeyValue,
    /// Group by tag value only, for a single tag key.
    TagValue,
}

/// Fields the caller may order aggregate rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Count,
    Aggregate,
    /// Same underlying ranking dimension as `Count`; the pipeline
    /// rewrites it before the query is issued.
    Frequency,
    TagKey,
    TagValue,
}

/// A single order term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: OrderField,
    pub descending: bool,
}

impl OrderTerm {
    pub fn asc(field: OrderField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: OrderField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// Cap on rows contributed per distinct group-by key, applied before the
/// outer limit/offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitBy {
    pub key_column: &'static str,
    pub count: usize,
}

/// Immutable specification for a grouped aggregate query.
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    /// Opaque filter predicate, passed through unmodified.
    pub filter: Option<String>,
    pub time_range: TimeRange,
    pub metric: MetricColumn,
    pub grouping: Grouping,
    /// Restrict to rows carrying this tag key (single-key modes).
    pub tag_key: Option<String>,
    /// Tag keys excluded from the result entirely.
    pub excluded_tag_keys: Vec<String>,
    /// HAVING: only keep groups whose avg(metric) exceeds this.
    pub min_aggregate_exclusive: Option<f64>,
    pub order_by: Vec<OrderTerm>,
    pub limit: usize,
    pub offset: usize,
    /// Reduced-cost execution: fraction of rows scanned, in (0, 1].
    pub sample_rate: Option<f64>,
    pub limit_by: Option<LimitBy>,
    /// When set, rows also report the count of events at or before this
    /// timestamp (`count_before_split`).
    pub split_at: Option<i64>,
}

/// One grouped aggregate row.
///
/// `tag_key`/`tag_value` are populated according to the query's
/// [`Grouping`]; `count_before_split` only when `split_at` was set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRow {
    pub tag_key: Option<String>,
    pub tag_value: Option<String>,
    pub count: u64,
    /// Sum of the metric over the group; `None` for empty groups.
    pub sum: Option<f64>,
    /// Average of the metric over the group.
    pub aggregate: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count_before_split: Option<u64>,
}

/// Immutable specification for a grouped histogram query.
#[derive(Debug, Clone)]
pub struct HistogramQuery {
    pub metric: MetricColumn,
    pub filter: Option<String>,
    pub time_range: TimeRange,
    pub tag_key: String,
    /// Only these tag values contribute buckets.
    pub tag_values: Vec<String>,
    pub num_buckets: usize,
    /// Decimal places of bucket boundaries; 0 means integer-width buckets.
    pub precision: u32,
    /// Number of distinct tag values buckets are computed for.
    pub histogram_rows: usize,
    /// Whether values share one normalized axis. The pipeline always
    /// requests `false`: each value is ranged over its own min/max.
    pub normalize: bool,
}

/// One histogram bucket row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramRow {
    pub tag_key: String,
    pub tag_value: String,
    pub bucket_start: f64,
    pub count: u64,
}

/// Read-only query interface to the event corpus.
///
/// Implementations must be safe for concurrent read-only use and must
/// report execution failures as [`crate::Error::QueryExecution`] rather
/// than returning partial rows. The pipeline never retries; timeouts and
/// cancellation belong to the implementation's transport layer.
#[async_trait]
pub trait EventStoreClient: Send + Sync {
    /// Execute a grouped/aggregate query.
    async fn aggregate_query(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>>;

    /// Execute a grouped histogram-bucket query.
    async fn histogram_query(&self, query: &HistogramQuery) -> Result<Vec<HistogramRow>>;
}
