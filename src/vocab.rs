//! Fixed vocabularies for the analytics pipeline
//!
//! The metric-column allowlist, tag-key alias table, and the tag keys
//! excluded from discovery mode are process-wide read-only configuration.
//! They are carried on an explicit [`Vocabulary`] value injected into the
//! pipeline rather than referenced as ambient globals, so tests can
//! substitute their own tables.

use crate::{Error, Result};
use std::collections::HashMap;

/// Population size above which dynamic sampling kicks in.
pub const SAMPLE_START_COUNT: u64 = 50_000;

/// Discovery-mode significance margin: a facet's average must exceed the
/// baseline average by 0.5% to be surfaced.
pub const SIGNIFICANCE_MARGIN: f64 = 1.005;

/// Default number of tag rows per page.
pub const DEFAULT_TAG_KEY_LIMIT: usize = 5;

/// Upper bound on `per_page * num_buckets_per_key` for histogram requests.
pub const MAX_HISTOGRAM_ROWS: usize = 500;

/// Numeric performance columns the pipeline accepts.
///
/// Anything outside this enumeration never reaches a query; callers
/// resolve raw strings through [`Vocabulary::resolve_metric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricColumn {
    TransactionDuration,
    MeasurementLcp,
    MeasurementCls,
    MeasurementFcp,
    MeasurementFid,
    MeasurementInp,
    SpansBrowser,
    SpansHttp,
    SpansDb,
    SpansResource,
}

impl MetricColumn {
    /// All allowed columns, in declaration order.
    pub const ALL: [MetricColumn; 10] = [
        MetricColumn::TransactionDuration,
        MetricColumn::MeasurementLcp,
        MetricColumn::MeasurementCls,
        MetricColumn::MeasurementFcp,
        MetricColumn::MeasurementFid,
        MetricColumn::MeasurementInp,
        MetricColumn::SpansBrowser,
        MetricColumn::SpansHttp,
        MetricColumn::SpansDb,
        MetricColumn::SpansResource,
    ];

    /// Column identifier as it appears in the event store schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricColumn::TransactionDuration => "transaction.duration",
            MetricColumn::MeasurementLcp => "measurements.lcp",
            MetricColumn::MeasurementCls => "measurements.cls",
            MetricColumn::MeasurementFcp => "measurements.fcp",
            MetricColumn::MeasurementFid => "measurements.fid",
            MetricColumn::MeasurementInp => "measurements.inp",
            MetricColumn::SpansBrowser => "spans.browser",
            MetricColumn::SpansHttp => "spans.http",
            MetricColumn::SpansDb => "spans.db",
            MetricColumn::SpansResource => "spans.resource",
        }
    }
}

/// Read-only vocabulary tables injected into the pipeline.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Allowed metric column identifiers.
    allowed_metrics: Vec<MetricColumn>,
    /// Caller-facing tag key -> stored tag key.
    tag_aliases: HashMap<String, String>,
    /// High-cardinality/noise tag keys excluded from discovery mode.
    excluded_tag_keys: Vec<String>,
}

impl Vocabulary {
    pub fn new(
        allowed_metrics: Vec<MetricColumn>,
        tag_aliases: HashMap<String, String>,
        excluded_tag_keys: Vec<String>,
    ) -> Self {
        Self {
            allowed_metrics,
            tag_aliases,
            excluded_tag_keys,
        }
    }

    /// Resolve a raw column identifier against the allowlist.
    ///
    /// Validation is primarily the HTTP layer's job; this is the
    /// defensive check the pipeline applies regardless.
    pub fn resolve_metric(&self, column: &str) -> Result<MetricColumn> {
        MetricColumn::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == column && self.allowed_metrics.contains(m))
            .ok_or_else(|| Error::UnknownMetric(column.to_string()))
    }

    /// Apply the alias table to a caller-supplied tag key.
    pub fn resolve_tag_key<'a>(&'a self, tag_key: &'a str) -> &'a str {
        self.tag_aliases
            .get(tag_key)
            .map(String::as_str)
            .unwrap_or(tag_key)
    }

    /// Tag keys never surfaced by discovery mode.
    pub fn excluded_tag_keys(&self) -> &[String] {
        &self.excluded_tag_keys
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        let tag_aliases = [
            ("release", "sentry:release"),
            ("dist", "sentry:dist"),
            ("user", "sentry:user"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let excluded_tag_keys = [
            "trace",
            "trace.ctx",
            "trace.span",
            "project",
            "browser",
            "celery_task_id",
            "url",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            allowed_metrics: MetricColumn::ALL.to_vec(),
            tag_aliases,
            excluded_tag_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_metric_accepts_allowed_columns() {
        let vocab = Vocabulary::default();
        assert_eq!(
            vocab.resolve_metric("transaction.duration").unwrap(),
            MetricColumn::TransactionDuration
        );
        assert_eq!(
            vocab.resolve_metric("measurements.lcp").unwrap(),
            MetricColumn::MeasurementLcp
        );
    }

    #[test]
    fn resolve_metric_rejects_unknown_columns() {
        let vocab = Vocabulary::default();
        let err = vocab.resolve_metric("user_misery").unwrap_err();
        assert!(format!("{err}").contains("user_misery"));
    }

    #[test]
    fn resolve_metric_honors_restricted_allowlist() {
        let vocab = Vocabulary::new(
            vec![MetricColumn::TransactionDuration],
            HashMap::new(),
            Vec::new(),
        );
        assert!(vocab.resolve_metric("measurements.lcp").is_err());
    }

    #[test]
    fn tag_aliases_rewrite_known_keys_only() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.resolve_tag_key("release"), "sentry:release");
        assert_eq!(vocab.resolve_tag_key("device"), "device");
    }
}
