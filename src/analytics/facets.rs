//! Facet aggregation with derived statistics
//!
//! Groups the sampled, filtered population by (tag key, tag value) and
//! derives per-facet statistics against the baseline. Two modes:
//!
//! - discovery (no tag key): each distinct key contributes at most one
//!   value, high-cardinality noise keys are excluded, and only facets
//!   whose average exceeds the baseline average by the significance
//!   margin survive (unless `all_tag_keys` lifts both restrictions);
//! - single-key breakdown: every sampled value of one key, no cap, no
//!   significance filter.

use super::baseline::BaselineStats;
use super::sampling::SamplingPlan;
use crate::store::{
    AggregateQuery, EventStoreClient, Grouping, LimitBy, OrderField, OrderTerm, TimeRange,
};
use crate::vocab::{MetricColumn, Vocabulary, SIGNIFICANCE_MARGIN};
use crate::{Error, Result};
use serde::Serialize;
use tracing::debug;

/// A (tag key, tag value) pair with statistics over the sampled
/// population, relative to the baseline.
#[derive(Debug, Clone, Serialize)]
pub struct Facet {
    pub tag_key: String,
    pub tag_value: String,
    pub count: u64,
    /// Average of the metric over this facet's rows.
    pub aggregate: f64,
    /// Estimated share of the unsampled baseline population.
    pub frequency: f64,
    /// Ratio of this facet's average to the baseline average.
    pub comparison: f64,
    /// Sampling-corrected sum of per-row deviation from the baseline
    /// average.
    pub sum_delta: f64,
    /// Relative count change between the two halves of the time window;
    /// absent unless requested, or when the first half is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_delta: Option<f64>,
}

/// Caller intent for one facet aggregation.
#[derive(Debug, Clone)]
pub struct FacetParams<'a> {
    pub filter: Option<&'a str>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    /// Single-key mode when set; must already be alias-resolved.
    pub tag_key: Option<&'a str>,
    /// Lift the per-key cap and significance filter in discovery mode.
    pub all_tag_keys: bool,
    pub include_count_delta: bool,
    pub order_by: Vec<OrderTerm>,
    pub limit: usize,
    pub offset: usize,
}

/// Rewrite `frequency` order terms to `count` and append the
/// deterministic `tags_key, tags_value` tie-breakers pagination relies on.
pub(crate) fn resolve_order_by(caller_terms: &[OrderTerm]) -> Vec<OrderTerm> {
    let mut terms: Vec<OrderTerm> = caller_terms
        .iter()
        .map(|term| match term.field {
            // Same underlying ranking dimension as count.
            OrderField::Frequency => OrderTerm {
                field: OrderField::Count,
                descending: term.descending,
            },
            _ => *term,
        })
        .collect();
    terms.push(OrderTerm::asc(OrderField::TagKey));
    terms.push(OrderTerm::asc(OrderField::TagValue));
    terms
}

/// Run the facet aggregation stage.
///
/// Both the baseline and the sampling plan must come from earlier stages
/// of the same request; their numbers are baked into the derived
/// statistics. Returns an empty list when the derived statistics cannot
/// be computed (zero baseline count or zero frequency sample rate).
pub async fn aggregate_facets(
    store: &dyn EventStoreClient,
    vocab: &Vocabulary,
    baseline: &BaselineStats,
    plan: &SamplingPlan,
    params: &FacetParams<'_>,
) -> Result<Vec<Facet>> {
    if baseline.count == 0 || plan.frequency_sample_rate == 0.0 {
        debug!("facet statistics undefined for this baseline, returning no data");
        return Ok(Vec::new());
    }

    let discovery = params.tag_key.is_none();

    let min_aggregate_exclusive = (discovery && !params.all_tag_keys).then(|| {
        if baseline.aggregate == 0.0 {
            0.0
        } else {
            baseline.aggregate * SIGNIFICANCE_MARGIN
        }
    });

    // Discovery pages show each key's most prominent value only; the cap
    // applies before the outer limit/offset.
    let limit_by = (discovery && !params.all_tag_keys).then(|| LimitBy {
        key_column: "tags_key",
        count: 1,
    });

    let query = AggregateQuery {
        filter: params.filter.map(String::from),
        time_range: params.time_range,
        metric: params.metric,
        grouping: Grouping::TagKeyValue,
        tag_key: params.tag_key.map(String::from),
        excluded_tag_keys: vocab.excluded_tag_keys().to_vec(),
        min_aggregate_exclusive,
        order_by: resolve_order_by(&params.order_by),
        limit: params.limit,
        offset: params.offset,
        sample_rate: plan.sample_rate,
        limit_by,
        split_at: params
            .include_count_delta
            .then(|| params.time_range.midpoint()),
    };

    let rows = store.aggregate_query(&query).await?;

    let mut facets = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(tag_key), Some(tag_value)) = (row.tag_key, row.tag_value) else {
            return Err(Error::MalformedResponse(
                "facet row is missing its tag pair".to_string(),
            ));
        };
        let (Some(sum), Some(aggregate)) = (row.sum, row.aggregate) else {
            return Err(Error::MalformedResponse(format!(
                "facet row {}={} has no aggregate",
                tag_key, tag_value
            )));
        };

        let sum_delta =
            (sum - row.count as f64 * baseline.aggregate) / plan.frequency_sample_rate;
        let frequency = (row.count as f64 / plan.frequency_sample_rate) / baseline.count as f64;
        let comparison = aggregate / baseline.aggregate;

        let count_delta = row.count_before_split.and_then(|first_half| {
            if first_half == 0 {
                return None;
            }
            let second_half = row.count as f64 - first_half as f64;
            Some((second_half - first_half as f64) / first_half as f64)
        });

        facets.push(Facet {
            tag_key,
            tag_value,
            count: row.count,
            aggregate,
            frequency,
            comparison,
            sum_delta,
            count_delta,
        });
    }

    Ok(facets)
}
