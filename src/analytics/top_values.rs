//! Top-value ranking for a single tag key
//!
//! Ranks the values of one tag key by occurrence count over the filtered
//! population. Array-valued tag fields contribute one row per contained
//! value. The ranked list also feeds the per-value histogram stage.

use super::facets::resolve_order_by;
use crate::store::{
    AggregateQuery, EventStoreClient, Grouping, OrderField, OrderTerm, TimeRange,
};
use crate::vocab::MetricColumn;
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

/// One ranked value of the requested tag key.
#[derive(Debug, Clone, Serialize)]
pub struct TopValue {
    pub tag_value: String,
    pub count: u64,
    /// Average of the metric over the value's rows.
    pub aggregate: f64,
}

/// Discriminated top-value result; `NoData` short-circuits the histogram
/// stage with an empty response.
#[derive(Debug, Clone)]
pub enum TopValuesOutcome {
    Found(Vec<TopValue>),
    NoData,
}

/// Caller intent for one top-value ranking.
#[derive(Debug, Clone)]
pub struct TopValuesParams<'a> {
    pub filter: Option<&'a str>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    /// Alias-resolved tag key.
    pub tag_key: &'a str,
    pub order_by: Vec<OrderTerm>,
    pub limit: usize,
    pub offset: usize,
}

/// Rank the values of one tag key by occurrence count.
///
/// Default order is count descending; `frequency` order terms rewrite to
/// `count`; tag value ascending is the final tie-break. A present but
/// empty aggregate (first row with count 0) is treated as no data rather
/// than surfaced.
pub async fn rank_top_values(
    store: &dyn EventStoreClient,
    params: &TopValuesParams<'_>,
) -> Result<TopValuesOutcome> {
    let caller_order = if params.order_by.is_empty() {
        vec![OrderTerm::desc(OrderField::Count)]
    } else {
        params.order_by.clone()
    };

    let query = AggregateQuery {
        filter: params.filter.map(String::from),
        time_range: params.time_range,
        metric: params.metric,
        grouping: Grouping::TagValue,
        tag_key: Some(params.tag_key.to_string()),
        excluded_tag_keys: Vec::new(),
        min_aggregate_exclusive: None,
        order_by: resolve_order_by(&caller_order),
        limit: params.limit,
        offset: params.offset,
        sample_rate: None,
        limit_by: None,
        split_at: None,
    };

    let rows = store.aggregate_query(&query).await?;

    if rows.is_empty() {
        debug!(tag_key = params.tag_key, "no values matched the tag key");
        return Ok(TopValuesOutcome::NoData);
    }
    if rows[0].count == 0 {
        debug!(tag_key = params.tag_key, "first ranked value has count 0");
        return Ok(TopValuesOutcome::NoData);
    }

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(tag_value) = row.tag_value else {
            return Err(Error::MalformedResponse(
                "top-value row is missing its tag value".to_string(),
            ));
        };
        let Some(aggregate) = row.aggregate else {
            return Err(Error::MalformedResponse(format!(
                "top-value row '{}' has no aggregate",
                tag_value
            )));
        };
        values.push(TopValue {
            tag_value,
            count: row.count,
            aggregate,
        });
    }

    Ok(TopValuesOutcome::Found(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Event, MemoryEventStore};

    fn seeded_store() -> MemoryEventStore {
        let store = MemoryEventStore::new();
        // release 2.0 twice as common as 1.0; 0.5 ties 1.0 on count.
        for i in 0..4i64 {
            store.insert(
                Event::new(i)
                    .with_tag("sentry:release", "2.0")
                    .with_metric(MetricColumn::TransactionDuration, 100.0),
            );
        }
        for i in 4..6i64 {
            store.insert(
                Event::new(i)
                    .with_tag("sentry:release", "1.0")
                    .with_metric(MetricColumn::TransactionDuration, 300.0),
            );
            store.insert(
                Event::new(i)
                    .with_tag("sentry:release", "0.5")
                    .with_metric(MetricColumn::TransactionDuration, 200.0),
            );
        }
        store
    }

    fn params<'a>(order_by: Vec<OrderTerm>) -> TopValuesParams<'a> {
        TopValuesParams {
            filter: None,
            metric: MetricColumn::TransactionDuration,
            time_range: TimeRange::new(0, 100),
            tag_key: "sentry:release",
            order_by,
            limit: 10,
            offset: 0,
        }
    }

    async fn ranked(store: &MemoryEventStore, order_by: Vec<OrderTerm>) -> Vec<String> {
        let outcome = rank_top_values(store, &params(order_by))
            .await
            .expect("ranking should succeed");
        let TopValuesOutcome::Found(values) = outcome else {
            panic!("expected ranked values");
        };
        values.into_iter().map(|v| v.tag_value).collect()
    }

    #[tokio::test]
    async fn default_order_is_count_desc_then_value_asc() {
        let store = seeded_store();
        let values = ranked(&store, Vec::new()).await;
        assert_eq!(values, vec!["2.0", "0.5", "1.0"]);
    }

    #[tokio::test]
    async fn frequency_order_behaves_like_count_order() {
        let store = seeded_store();
        let by_count = ranked(&store, vec![OrderTerm::desc(OrderField::Count)]).await;
        let by_frequency = ranked(&store, vec![OrderTerm::desc(OrderField::Frequency)]).await;
        assert_eq!(by_count, by_frequency);
    }

    #[tokio::test]
    async fn no_matching_rows_is_no_data() {
        let store = MemoryEventStore::new();
        let outcome = rank_top_values(&store, &params(Vec::new())).await.unwrap();
        assert!(matches!(outcome, TopValuesOutcome::NoData));
    }
}
