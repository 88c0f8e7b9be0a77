//! Facet performance analytics pipeline
//!
//! Answers which tag values correlate with a shift in a performance
//! metric, and how that metric is distributed per tag value. The stages
//! run strictly in sequence per request because each stage's query
//! parameters are computed from the numeric results of the prior stage:
//! baseline feeds sampling, both feed facet statistics, and ranked top
//! values feed the histogram value filter. All state is request-scoped;
//! any number of requests may run concurrently against the store.

mod baseline;
mod facets;
mod histogram;
mod pagination;
mod sampling;
mod telemetry;
mod top_values;

pub use baseline::{resolve_baseline, BaselineOutcome, BaselineStats};
pub use facets::{aggregate_facets, Facet, FacetParams};
pub use histogram::{build_histogram, check_bucket_budget, HistogramBucket, HistogramParams};
pub use pagination::{paginate, Cursor, CursorPage};
pub use sampling::SamplingPlan;
pub use top_values::{rank_top_values, TopValue, TopValuesOutcome, TopValuesParams};

use crate::store::{EventStoreClient, OrderTerm, TimeRange};
use crate::vocab::{MetricColumn, Vocabulary, DEFAULT_TAG_KEY_LIMIT};
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// A ranked-facets request.
///
/// The metric column must already be validated against the vocabulary;
/// the tag key may still carry a caller-facing alias.
#[derive(Debug, Clone)]
pub struct FacetRequest {
    pub filter: Option<String>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    /// Single-key breakdown when set; discovery mode otherwise.
    pub tag_key: Option<String>,
    /// Surface every pair in discovery mode: no per-key cap, no
    /// significance filter.
    pub all_tag_keys: bool,
    pub include_count_delta: bool,
    pub order_by: Vec<OrderTerm>,
    /// Page size; 0 means the default of 5.
    pub per_page: usize,
    pub cursor: Option<Cursor>,
}

/// A top-values request for one tag key.
#[derive(Debug, Clone)]
pub struct TopValuesRequest {
    pub filter: Option<String>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    pub tag_key: String,
    pub order_by: Vec<OrderTerm>,
    pub per_page: usize,
    pub cursor: Option<Cursor>,
}

/// A per-value histogram request.
#[derive(Debug, Clone)]
pub struct HistogramRequest {
    pub filter: Option<String>,
    pub metric: MetricColumn,
    pub time_range: TimeRange,
    pub tag_key: String,
    pub num_buckets_per_key: usize,
    pub order_by: Vec<OrderTerm>,
    pub per_page: usize,
    pub cursor: Option<Cursor>,
}

/// Histogram response: a tag-list page paired with its bucket rows, each
/// axis paginated independently of the bucket count.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPage {
    pub tags: Vec<TopValue>,
    pub histogram: Vec<HistogramBucket>,
    pub next: Cursor,
    pub prev: Cursor,
}

/// The analytics pipeline entry point.
///
/// Holds the event store client and the injected vocabulary tables;
/// everything else is request-scoped.
pub struct FacetAnalyzer {
    store: Arc<dyn EventStoreClient>,
    vocab: Vocabulary,
}

impl FacetAnalyzer {
    pub fn new(store: Arc<dyn EventStoreClient>, vocab: Vocabulary) -> Self {
        Self { store, vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Ranked facets: baseline, sampling plan, then facet aggregation.
    ///
    /// An unresolved baseline is "no data", not an error: the page comes
    /// back empty and neither the sampling planner nor the aggregator
    /// runs.
    pub async fn facets(&self, request: &FacetRequest) -> Result<CursorPage<Facet>> {
        let started = Instant::now();
        let per_page = effective_per_page(request.per_page);
        let offset = request.cursor.map(|c| c.offset).unwrap_or(0);
        let span = info_span!(
            "analytics.facets",
            metric = request.metric.as_str(),
            tag_key = request.tag_key.as_deref().unwrap_or("*"),
            all_tag_keys = request.all_tag_keys,
        );

        let result = async {
            let stage_started = Instant::now();
            let outcome = resolve_baseline(
                self.store.as_ref(),
                request.filter.as_deref(),
                request.metric,
                request.time_range,
            )
            .await?;
            telemetry::record_stage("baseline", stage_started.elapsed().as_secs_f64());

            let BaselineOutcome::Found(stats) = outcome else {
                debug!("baseline unresolved, returning empty page");
                return Ok(None);
            };

            let plan = SamplingPlan::for_population(stats.count);
            if let Some(rate) = plan.sample_rate {
                telemetry::record_sample_rate(rate);
            }

            let tag_key = request
                .tag_key
                .as_deref()
                .map(|key| self.vocab.resolve_tag_key(key).to_string());

            let stage_started = Instant::now();
            let rows = aggregate_facets(
                self.store.as_ref(),
                &self.vocab,
                &stats,
                &plan,
                &FacetParams {
                    filter: request.filter.as_deref(),
                    metric: request.metric,
                    time_range: request.time_range,
                    tag_key: tag_key.as_deref(),
                    all_tag_keys: request.all_tag_keys,
                    include_count_delta: request.include_count_delta,
                    order_by: request.order_by.clone(),
                    limit: per_page + 1,
                    offset,
                },
            )
            .await?;
            telemetry::record_stage("facets", stage_started.elapsed().as_secs_f64());

            Ok(Some(paginate(rows, per_page, offset)))
        }
        .instrument(span)
        .await;

        finish_request("facets", started, result, |page: &CursorPage<Facet>| {
            page.results.len() as u64
        })
        .map(|page| page.unwrap_or_else(|| CursorPage::empty(per_page, offset)))
    }

    /// Ranked values of one tag key, cursor-paginated.
    pub async fn top_values(&self, request: &TopValuesRequest) -> Result<CursorPage<TopValue>> {
        let started = Instant::now();
        let per_page = effective_per_page(request.per_page);
        let offset = request.cursor.map(|c| c.offset).unwrap_or(0);
        let tag_key = self.vocab.resolve_tag_key(&request.tag_key).to_string();
        let span = info_span!(
            "analytics.top_values",
            metric = request.metric.as_str(),
            tag_key = %tag_key,
        );

        let result = async {
            let stage_started = Instant::now();
            let outcome = rank_top_values(
                self.store.as_ref(),
                &TopValuesParams {
                    filter: request.filter.as_deref(),
                    metric: request.metric,
                    time_range: request.time_range,
                    tag_key: &tag_key,
                    order_by: request.order_by.clone(),
                    limit: per_page + 1,
                    offset,
                },
            )
            .await?;
            telemetry::record_stage("top_values", stage_started.elapsed().as_secs_f64());

            let TopValuesOutcome::Found(values) = outcome else {
                return Ok(None);
            };
            Ok(Some(paginate(values, per_page, offset)))
        }
        .instrument(span)
        .await;

        finish_request("top_values", started, result, |page: &CursorPage<TopValue>| {
            page.results.len() as u64
        })
        .map(|page| page.unwrap_or_else(|| CursorPage::empty(per_page, offset)))
    }

    /// Tag-list page plus per-value histograms, two-axis paginated.
    ///
    /// The tag list is sized with `per_page + 1` rows to detect a further
    /// page, but the histogram is computed over exactly `per_page` values;
    /// letting the sentinel value into the bucket computation would put a
    /// value on the histogram that does not belong to the page.
    pub async fn histogram(&self, request: &HistogramRequest) -> Result<HistogramPage> {
        let started = Instant::now();
        // Two named counts threaded separately through this mode.
        let item_count = effective_per_page(request.per_page);
        let page_size = item_count + 1;
        let offset = request.cursor.map(|c| c.offset).unwrap_or(0);
        let tag_key = self.vocab.resolve_tag_key(&request.tag_key).to_string();
        let span = info_span!(
            "analytics.histogram",
            metric = request.metric.as_str(),
            tag_key = %tag_key,
            num_buckets_per_key = request.num_buckets_per_key,
        );

        let result = async {
            let stage_started = Instant::now();
            let outcome = rank_top_values(
                self.store.as_ref(),
                &TopValuesParams {
                    filter: request.filter.as_deref(),
                    metric: request.metric,
                    time_range: request.time_range,
                    tag_key: &tag_key,
                    order_by: request.order_by.clone(),
                    limit: page_size,
                    offset,
                },
            )
            .await?;
            telemetry::record_stage("top_values", stage_started.elapsed().as_secs_f64());

            let TopValuesOutcome::Found(values) = outcome else {
                return Ok(None);
            };

            let stage_started = Instant::now();
            let buckets = build_histogram(
                self.store.as_ref(),
                &values,
                &HistogramParams {
                    filter: request.filter.as_deref(),
                    metric: request.metric,
                    time_range: request.time_range,
                    tag_key: &tag_key,
                    num_buckets_per_key: request.num_buckets_per_key,
                    item_count,
                },
            )
            .await?;
            telemetry::record_stage("histogram", stage_started.elapsed().as_secs_f64());

            let tags = paginate(values, item_count, offset);
            Ok(Some(HistogramPage {
                histogram: buckets,
                next: tags.next,
                prev: tags.prev,
                tags: tags.results,
            }))
        }
        .instrument(span)
        .await;

        finish_request("histogram", started, result, |page: &HistogramPage| {
            (page.tags.len() + page.histogram.len()) as u64
        })
        .map(|page| {
            page.unwrap_or_else(|| {
                let empty = CursorPage::<TopValue>::empty(item_count, offset);
                HistogramPage {
                    tags: Vec::new(),
                    histogram: Vec::new(),
                    next: empty.next,
                    prev: empty.prev,
                }
            })
        })
    }
}

fn effective_per_page(per_page: usize) -> usize {
    if per_page == 0 {
        DEFAULT_TAG_KEY_LIMIT
    } else {
        per_page
    }
}

/// Record request telemetry and pass the result through.
fn finish_request<T>(
    operation: &'static str,
    started: Instant,
    result: Result<Option<T>>,
    rows: impl Fn(&T) -> u64,
) -> Result<Option<T>> {
    let duration_seconds = started.elapsed().as_secs_f64();
    match &result {
        Ok(Some(value)) => telemetry::record_request(telemetry::RequestMetrics {
            operation,
            outcome: "success",
            duration_seconds,
            rows_returned: rows(value),
        }),
        Ok(None) => telemetry::record_request(telemetry::RequestMetrics {
            operation,
            outcome: "no_data",
            duration_seconds,
            rows_returned: 0,
        }),
        Err(error) => {
            debug!(%error, operation, "pipeline request failed");
            telemetry::record_request(telemetry::RequestMetrics {
                operation,
                outcome: "error",
                duration_seconds,
                rows_returned: 0,
            });
        }
    }
    result
}
