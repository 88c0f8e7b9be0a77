//! Baseline resolver
//!
//! Computes count/avg/min/max of the metric for the filtered population.
//! Every later stage consumes these numbers, so an absent or empty
//! baseline terminates the pipeline with an empty response before any
//! further query is issued.

use crate::store::{AggregateQuery, EventStoreClient, Grouping, TimeRange};
use crate::vocab::MetricColumn;
use crate::Result;
use serde::Serialize;
use tracing::debug;

/// Aggregate statistics for the filtered population.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineStats {
    pub count: u64,
    /// Average of the metric over the population.
    pub aggregate: f64,
    pub min: f64,
    pub max: f64,
}

/// Discriminated baseline result.
///
/// `NoData` is a soft outcome, not an error: the query ran but the
/// population is empty or the metric column carries no values. Hard
/// failures surface through the outer `Result`.
#[derive(Debug, Clone)]
pub enum BaselineOutcome {
    Found(BaselineStats),
    NoData,
}

/// Resolve the baseline for a filter/metric pair.
///
/// Issues one ungrouped aggregate query restricted to rows where the
/// metric is non-null. Returns `Found` only when the query yields exactly
/// one row with a non-zero count and a non-null aggregate.
pub async fn resolve_baseline(
    store: &dyn EventStoreClient,
    filter: Option<&str>,
    metric: MetricColumn,
    time_range: TimeRange,
) -> Result<BaselineOutcome> {
    let query = AggregateQuery {
        filter: filter.map(String::from),
        time_range,
        metric,
        grouping: Grouping::None,
        tag_key: None,
        excluded_tag_keys: Vec::new(),
        min_aggregate_exclusive: None,
        order_by: Vec::new(),
        limit: 2,
        offset: 0,
        sample_rate: None,
        limit_by: None,
        split_at: None,
    };

    let rows = store.aggregate_query(&query).await?;

    if rows.len() != 1 {
        debug!(rows = rows.len(), "baseline query did not yield one row");
        return Ok(BaselineOutcome::NoData);
    }

    let row = &rows[0];
    let (Some(aggregate), Some(min), Some(max)) = (row.aggregate, row.min, row.max) else {
        return Ok(BaselineOutcome::NoData);
    };
    if row.count == 0 {
        return Ok(BaselineOutcome::NoData);
    }

    Ok(BaselineOutcome::Found(BaselineStats {
        count: row.count,
        aggregate,
        min,
        max,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Event, MemoryEventStore};

    #[tokio::test]
    async fn baseline_found_for_populated_metric() {
        let store = MemoryEventStore::new();
        for i in 0..4i64 {
            store.insert(
                Event::new(i).with_metric(MetricColumn::TransactionDuration, 200.0 + i as f64),
            );
        }

        let outcome = resolve_baseline(
            &store,
            None,
            MetricColumn::TransactionDuration,
            TimeRange::new(0, 10),
        )
        .await
        .unwrap();

        let BaselineOutcome::Found(stats) = outcome else {
            panic!("expected a resolved baseline");
        };
        assert_eq!(stats.count, 4);
        assert!((stats.aggregate - 201.5).abs() < 1e-9);
        assert_eq!(stats.min, 200.0);
        assert_eq!(stats.max, 203.0);
    }

    #[tokio::test]
    async fn baseline_no_data_for_empty_population() {
        let store = MemoryEventStore::new();
        let outcome = resolve_baseline(
            &store,
            None,
            MetricColumn::TransactionDuration,
            TimeRange::new(0, 10),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, BaselineOutcome::NoData));
    }

    #[tokio::test]
    async fn baseline_no_data_when_metric_column_absent() {
        let store = MemoryEventStore::new();
        store.insert(Event::new(0).with_tag("device", "ios"));

        let outcome = resolve_baseline(
            &store,
            None,
            MetricColumn::MeasurementLcp,
            TimeRange::new(0, 10),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, BaselineOutcome::NoData));
    }
}
