//! In-memory event store for development and testing
//!
//! Stores events in memory and executes the full aggregate/histogram
//! query contract over them: filtering, grouping with array-valued tag
//! explode semantics, HAVING, per-key caps, deterministic ordering, and
//! per-value integer-width histogram bucketing. Suitable for tests and
//! single-process development; never for production data volumes.

use super::{
    AggregateQuery, AggregateRow, EventStoreClient, Grouping, HistogramQuery, HistogramRow,
    OrderField, OrderTerm,
};
use crate::vocab::MetricColumn;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One stored event: a timestamp, repeated tags, and per-column metrics.
///
/// A key may appear multiple times in `tags`; such array-valued keys
/// contribute one group per contained value under tag grouping.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: i64,
    pub tags: Vec<(String, String)>,
    pub metrics: HashMap<MetricColumn, f64>,
}

impl Event {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            tags: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_metric(mut self, column: MetricColumn, value: f64) -> Self {
        self.metrics.insert(column, value);
        self
    }
}

/// Local in-memory event store.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

/// Intermediate per-group accumulator.
#[derive(Debug, Default)]
struct GroupAccumulator {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    count_before_split: u64,
}

impl GroupAccumulator {
    fn observe(&mut self, value: f64, before_split: bool) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
        if before_split {
            self.count_before_split += 1;
        }
    }
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: Event) {
        self.events.write().push(event);
    }

    pub fn insert_many(&self, events: impl IntoIterator<Item = Event>) {
        self.events.write().extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Parse the opaque filter into `key:value` conjunction terms.
    ///
    /// The production engine interprets the full search syntax; this dev
    /// store supports a whitespace-separated conjunction of exact tag
    /// matches, which is enough to exercise the pipeline.
    fn parse_filter(filter: Option<&str>) -> Result<Vec<(String, String)>> {
        let Some(raw) = filter else {
            return Ok(Vec::new());
        };
        let mut terms = Vec::new();
        for token in raw.split_whitespace() {
            let Some((key, value)) = token.split_once(':') else {
                return Err(Error::QueryExecution(format!(
                    "unsupported filter term '{}', expected key:value",
                    token
                )));
            };
            terms.push((key.to_string(), value.to_string()));
        }
        Ok(terms)
    }

    fn matches_filter(event: &Event, terms: &[(String, String)]) -> bool {
        terms
            .iter()
            .all(|(k, v)| event.tags.iter().any(|(tk, tv)| tk == k && tv == v))
    }

    /// Deterministic stride-based sampling simulation.
    ///
    /// Keeps every `round(1/rate)`-th event, which matches the contract's
    /// "fraction of rows scanned" semantics closely enough for tests.
    fn sample_stride(sample_rate: Option<f64>) -> usize {
        match sample_rate {
            Some(rate) if rate > 0.0 && rate < 1.0 => ((1.0 / rate).round() as usize).max(1),
            _ => 1,
        }
    }

    fn compare_rows(a: &AggregateRow, b: &AggregateRow, order_by: &[OrderTerm]) -> Ordering {
        for term in order_by {
            let ord = match term.field {
                OrderField::Count | OrderField::Frequency => a.count.cmp(&b.count),
                OrderField::Aggregate => a
                    .aggregate
                    .partial_cmp(&b.aggregate)
                    .unwrap_or(Ordering::Equal),
                OrderField::TagKey => a.tag_key.cmp(&b.tag_key),
                OrderField::TagValue => a.tag_value.cmp(&b.tag_value),
            };
            let ord = if term.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[async_trait]
impl EventStoreClient for MemoryEventStore {
    async fn aggregate_query(&self, query: &AggregateQuery) -> Result<Vec<AggregateRow>> {
        let terms = Self::parse_filter(query.filter.as_deref())?;
        let stride = Self::sample_stride(query.sample_rate);

        let events = self.events.read();
        let mut groups: HashMap<(Option<String>, Option<String>), GroupAccumulator> =
            HashMap::new();

        let mut scanned = 0usize;
        for event in events.iter() {
            if event.timestamp < query.time_range.start || event.timestamp > query.time_range.end {
                continue;
            }
            if !Self::matches_filter(event, &terms) {
                continue;
            }
            // Metric must be non-null for every query the pipeline issues.
            let Some(&value) = event.metrics.get(&query.metric) else {
                continue;
            };

            scanned += 1;
            if (scanned - 1) % stride != 0 {
                continue;
            }

            let before_split = query
                .split_at
                .map(|split| event.timestamp <= split)
                .unwrap_or(false);

            match query.grouping {
                Grouping::None => {
                    groups
                        .entry((None, None))
                        .or_default()
                        .observe(value, before_split);
                }
                Grouping::TagKeyValue => {
                    for (key, tag_value) in &event.tags {
                        if query.excluded_tag_keys.iter().any(|e| e == key) {
                            continue;
                        }
                        if let Some(required) = &query.tag_key {
                            if key != required {
                                continue;
                            }
                        }
                        groups
                            .entry((Some(key.clone()), Some(tag_value.clone())))
                            .or_default()
                            .observe(value, before_split);
                    }
                }
                Grouping::TagValue => {
                    let Some(required) = &query.tag_key else {
                        return Err(Error::QueryExecution(
                            "tag-value grouping requires a tag key".to_string(),
                        ));
                    };
                    for (key, tag_value) in &event.tags {
                        if key == required {
                            groups
                                .entry((None, Some(tag_value.clone())))
                                .or_default()
                                .observe(value, before_split);
                        }
                    }
                }
            }
        }
        drop(events);

        let mut rows: Vec<AggregateRow> = groups
            .into_iter()
            .map(|((tag_key, tag_value), acc)| {
                let aggregate = (acc.count > 0).then(|| acc.sum / acc.count as f64);
                AggregateRow {
                    tag_key,
                    tag_value,
                    count: acc.count,
                    sum: (acc.count > 0).then_some(acc.sum),
                    aggregate,
                    min: (acc.count > 0).then_some(acc.min),
                    max: (acc.count > 0).then_some(acc.max),
                    count_before_split: query.split_at.map(|_| acc.count_before_split),
                }
            })
            .collect();

        if let Some(threshold) = query.min_aggregate_exclusive {
            rows.retain(|row| row.aggregate.map(|a| a > threshold).unwrap_or(false));
        }

        rows.sort_by(|a, b| Self::compare_rows(a, b, &query.order_by));

        if let Some(limit_by) = &query.limit_by {
            let mut per_key: HashMap<Option<String>, usize> = HashMap::new();
            rows.retain(|row| {
                let seen = per_key.entry(row.tag_key.clone()).or_insert(0);
                *seen += 1;
                *seen <= limit_by.count
            });
        }

        Ok(rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn histogram_query(&self, query: &HistogramQuery) -> Result<Vec<HistogramRow>> {
        if query.precision != 0 {
            return Err(Error::QueryExecution(
                "only integer-precision histograms are supported".to_string(),
            ));
        }
        if query.num_buckets == 0 {
            return Err(Error::QueryExecution(
                "histogram queries need at least one bucket".to_string(),
            ));
        }
        let terms = Self::parse_filter(query.filter.as_deref())?;
        let events = self.events.read();

        let mut rows = Vec::new();
        for tag_value in query.tag_values.iter().take(query.histogram_rows) {
            let mut values: Vec<f64> = Vec::new();
            for event in events.iter() {
                if event.timestamp < query.time_range.start
                    || event.timestamp > query.time_range.end
                {
                    continue;
                }
                if !Self::matches_filter(event, &terms) {
                    continue;
                }
                let Some(&value) = event.metrics.get(&query.metric) else {
                    continue;
                };
                let has_pair = event
                    .tags
                    .iter()
                    .any(|(k, v)| k == &query.tag_key && v == tag_value);
                if has_pair {
                    values.push(value);
                }
            }

            if values.is_empty() {
                continue;
            }

            // Each value is ranged independently over its own min/max;
            // buckets across values do not share an axis.
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let start = min.floor();
            let width = (((max - start) / query.num_buckets as f64).ceil()).max(1.0);

            let mut counts: HashMap<u64, u64> = HashMap::new();
            for value in values {
                let mut bucket = ((value - start) / width).floor() as u64;
                if bucket >= query.num_buckets as u64 {
                    bucket = query.num_buckets as u64 - 1;
                }
                *counts.entry(bucket).or_insert(0) += 1;
            }

            let mut buckets: Vec<(u64, u64)> = counts.into_iter().collect();
            buckets.sort_by_key(|(bucket, _)| *bucket);
            for (bucket, count) in buckets {
                rows.push(HistogramRow {
                    tag_key: query.tag_key.clone(),
                    tag_value: tag_value.clone(),
                    bucket_start: start + bucket as f64 * width,
                    count,
                });
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LimitBy, TimeRange};

    fn seeded_store() -> MemoryEventStore {
        let store = MemoryEventStore::new();
        for i in 0..10i64 {
            store.insert(
                Event::new(i)
                    .with_tag("device", if i % 2 == 0 { "ios" } else { "android" })
                    .with_metric(MetricColumn::TransactionDuration, 100.0 + i as f64),
            );
        }
        store
    }

    fn base_query(grouping: Grouping) -> AggregateQuery {
        AggregateQuery {
            filter: None,
            time_range: TimeRange::new(0, 100),
            metric: MetricColumn::TransactionDuration,
            grouping,
            tag_key: None,
            excluded_tag_keys: Vec::new(),
            min_aggregate_exclusive: None,
            order_by: vec![
                OrderTerm::asc(OrderField::TagKey),
                OrderTerm::asc(OrderField::TagValue),
            ],
            limit: 100,
            offset: 0,
            sample_rate: None,
            limit_by: None,
            split_at: None,
        }
    }

    #[tokio::test]
    async fn ungrouped_query_returns_one_population_row() {
        let store = seeded_store();
        let rows = store
            .aggregate_query(&base_query(Grouping::None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 10);
        assert_eq!(rows[0].min, Some(100.0));
        assert_eq!(rows[0].max, Some(109.0));
        assert!((rows[0].aggregate.unwrap() - 104.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn tag_grouping_explodes_array_valued_keys() {
        let store = MemoryEventStore::new();
        store.insert(
            Event::new(0)
                .with_tag("flag", "a")
                .with_tag("flag", "b")
                .with_metric(MetricColumn::TransactionDuration, 50.0),
        );
        let mut query = base_query(Grouping::TagValue);
        query.tag_key = Some("flag".to_string());
        let rows = store.aggregate_query(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tag_value.as_deref(), Some("a"));
        assert_eq!(rows[1].tag_value.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn filter_terms_restrict_the_population() {
        let store = seeded_store();
        let mut query = base_query(Grouping::None);
        query.filter = Some("device:ios".to_string());
        let rows = store.aggregate_query(&query).await.unwrap();
        assert_eq!(rows[0].count, 5);
    }

    #[tokio::test]
    async fn malformed_filter_is_a_hard_failure() {
        let store = seeded_store();
        let mut query = base_query(Grouping::None);
        query.filter = Some("nonsense".to_string());
        let err = store.aggregate_query(&query).await.unwrap_err();
        assert!(matches!(err, Error::QueryExecution(_)));
    }

    #[tokio::test]
    async fn limit_by_caps_rows_per_tag_key() {
        let store = MemoryEventStore::new();
        for i in 0..4i64 {
            store.insert(
                Event::new(i)
                    .with_tag("device", &format!("model-{i}"))
                    .with_tag("os", &format!("v{i}"))
                    .with_metric(MetricColumn::TransactionDuration, 10.0),
            );
        }
        let mut query = base_query(Grouping::TagKeyValue);
        query.limit_by = Some(LimitBy {
            key_column: "tags_key",
            count: 1,
        });
        let rows = store.aggregate_query(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<_> = rows.iter().map(|r| r.tag_key.clone().unwrap()).collect();
        assert_eq!(keys, vec!["device".to_string(), "os".to_string()]);
    }

    #[tokio::test]
    async fn split_counts_events_at_or_before_midpoint() {
        let store = seeded_store();
        let mut query = base_query(Grouping::None);
        query.split_at = Some(4);
        let rows = store.aggregate_query(&query).await.unwrap();
        assert_eq!(rows[0].count_before_split, Some(5));
    }

    #[tokio::test]
    async fn histogram_buckets_are_ranged_per_value() {
        let store = MemoryEventStore::new();
        // "fast" spans 0..10, "slow" spans 1000..1010: independent axes.
        for i in 0..10i64 {
            store.insert(
                Event::new(i)
                    .with_tag("release", "fast")
                    .with_metric(MetricColumn::TransactionDuration, i as f64),
            );
            store.insert(
                Event::new(i)
                    .with_tag("release", "slow")
                    .with_metric(MetricColumn::TransactionDuration, 1000.0 + i as f64),
            );
        }
        let rows = store
            .histogram_query(&HistogramQuery {
                metric: MetricColumn::TransactionDuration,
                filter: None,
                time_range: TimeRange::new(0, 100),
                tag_key: "release".to_string(),
                tag_values: vec!["fast".to_string(), "slow".to_string()],
                num_buckets: 5,
                precision: 0,
                histogram_rows: 2,
                normalize: false,
            })
            .await
            .unwrap();

        let fast_start = rows
            .iter()
            .filter(|r| r.tag_value == "fast")
            .map(|r| r.bucket_start)
            .fold(f64::INFINITY, f64::min);
        let slow_start = rows
            .iter()
            .filter(|r| r.tag_value == "slow")
            .map(|r| r.bucket_start)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(fast_start, 0.0);
        assert_eq!(slow_start, 1000.0);

        let fast_total: u64 = rows
            .iter()
            .filter(|r| r.tag_value == "fast")
            .map(|r| r.count)
            .sum();
        assert_eq!(fast_total, 10);
    }
}
