//! Per-value metric histograms
//!
//! Given a bounded list of top tag values, computes one metric
//! distribution per value in a single grouped histogram query. Buckets
//! have integer width and each value is ranged independently over its own
//! observed min/max; consumers wanting one shared axis must reconcile
//! bucket boundaries themselves.

use super::top_values::TopValue;
use crate::store::{EventStoreClient, HistogramQuery, TimeRange};
use crate::vocab::{MetricColumn, MAX_HISTOGRAM_ROWS};
use crate::{Error, Result};
use serde::Serialize;

/// One metric sub-range and its occurrence count for a tag value.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub tag_key: String,
    pub tag_value: String,
    pub bucket_start: f64,
    pub count: u64,
}

/// Caller intent for one histogram build.
#[derive(Debug, Clone)]
pub struct HistogramParams<'a> {
    pub filter: Option<&'a str>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    /// Alias-resolved tag key.
    pub tag_key: &'a str,
    pub num_buckets_per_key: usize,
    /// Number of tag values buckets are computed for; this is the page's
    /// item count, never the `limit+1` list-sizing count.
    pub item_count: usize,
}

/// Enforce the total-row bound `per_page * num_buckets_per_key <= 500`.
///
/// Validation belongs to the HTTP layer; this helper is what it calls.
/// The pipeline behaves correctly up to the bound and makes no promises
/// beyond it.
pub fn check_bucket_budget(per_page: usize, num_buckets_per_key: usize) -> Result<()> {
    if per_page * num_buckets_per_key > MAX_HISTOGRAM_ROWS {
        return Err(Error::Config(format!(
            "per_page * numBucketsPerKey cannot exceed {} (got {})",
            MAX_HISTOGRAM_ROWS,
            per_page * num_buckets_per_key
        )));
    }
    Ok(())
}

/// Build per-value histograms for the supplied top values.
pub async fn build_histogram(
    store: &dyn EventStoreClient,
    top_values: &[TopValue],
    params: &HistogramParams<'_>,
) -> Result<Vec<HistogramBucket>> {
    let tag_values: Vec<String> = top_values
        .iter()
        .take(params.item_count)
        .map(|v| v.tag_value.clone())
        .collect();

    let query = HistogramQuery {
        metric: params.metric,
        filter: params.filter.map(String::from),
        time_range: params.time_range,
        tag_key: params.tag_key.to_string(),
        tag_values,
        num_buckets: params.num_buckets_per_key,
        precision: 0,
        histogram_rows: params.item_count,
        normalize: false,
    };

    let rows = store.histogram_query(&query).await?;

    Ok(rows
        .into_iter()
        .map(|row| HistogramBucket {
            tag_key: row.tag_key,
            tag_value: row.tag_value,
            bucket_start: row.bucket_start,
            count: row.count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_budget_accepts_up_to_500_rows() {
        assert!(check_bucket_budget(5, 100).is_ok());
        assert!(check_bucket_budget(1, 500).is_ok());
    }

    #[test]
    fn bucket_budget_rejects_beyond_500_rows() {
        let err = check_bucket_budget(6, 100).unwrap_err();
        assert!(format!("{err}").contains("500"));
    }
}
