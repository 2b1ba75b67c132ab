//! URL pattern rules and per-endpoint metrics.
//!
//! Requests are grouped under a *tag* by matching their URL against an
//! ordered rule table; the first matching rule wins and may also carry the
//! retry policy for that endpoint group. URLs matching no rule are recorded
//! under the reserved [`UNKNOWN_TAG`].
//!
//! Metric buckets are mutated from every batch worker sharing a session, so
//! the whole map sits behind one registry-wide mutex. The lock is held only
//! for map updates and is never held across an await point.

use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Reserved tag for requests matching no registered rule.
pub const UNKNOWN_TAG: &str = "Unknown";

/// One entry of the rule table: a URL pattern, the tag it assigns, and an
/// optional retry policy for matching requests.
///
/// Rules are created at session setup and immutable thereafter.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: Regex,
    tag: String,
    policy: Option<RetryPolicy>,
}

impl RouteRule {
    /// Compiles a rule from a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex or the tag is
    /// the reserved [`UNKNOWN_TAG`].
    pub fn new(pattern: &str, tag: impl Into<String>, policy: Option<RetryPolicy>) -> Result<Self> {
        let tag = tag.into();
        if tag == UNKNOWN_TAG {
            return Err(Error::invalid_request(format!(
                "Tag {UNKNOWN_TAG:?} is reserved for unmatched requests"
            )));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::invalid_request(format!("Invalid route pattern: {e}")))?;
        Ok(Self {
            pattern,
            tag,
            policy,
        })
    }

    /// The tag assigned to matching requests.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The retry policy for matching requests, if any.
    pub fn policy(&self) -> Option<&RetryPolicy> {
        self.policy.as_ref()
    }

    /// Returns `true` if the URL matches this rule's pattern.
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

/// Per-tag metrics bucket.
///
/// This is also the snapshot shape handed out by
/// [`MetricsRegistry::snapshot`]: counts are monotonically increasing, and
/// latencies are recorded in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteMetrics {
    /// Number of logical requests routed to this tag.
    pub count: u64,
    /// Observed request latencies in seconds.
    pub latencies: Vec<f64>,
    /// Number of requests that ended in an error.
    pub errors: u64,
    /// Histogram of observed final status codes.
    pub status_codes: HashMap<u16, u64>,
}

/// Per-tag summary returned by [`MetricsRegistry::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    /// Number of logical requests.
    pub count: u64,
    /// Number of error outcomes.
    pub errors: u64,
    /// Mean latency in seconds, `0.0` when no samples exist.
    pub avg_latency: f64,
    /// Histogram of observed final status codes.
    pub status_codes: HashMap<u16, u64>,
}

/// Per-tag delta returned by [`MetricsRegistry::compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsDelta {
    /// Requests since the snapshot.
    pub count: u64,
    /// Errors since the snapshot.
    pub errors: u64,
}

/// Ordered rule table plus mutex-guarded per-tag buckets.
#[derive(Debug)]
pub struct MetricsRegistry {
    rules: Vec<RouteRule>,
    buckets: Mutex<HashMap<String, RouteMetrics>>,
}

impl MetricsRegistry {
    /// Creates a registry over an ordered rule table.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self {
            rules,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a URL to its tag and retry policy: rules are evaluated in
    /// registration order and the first match wins. Unmatched URLs resolve
    /// to [`UNKNOWN_TAG`] with no policy.
    pub fn resolve(&self, url: &str) -> (&str, Option<&RetryPolicy>) {
        for rule in &self.rules {
            if rule.matches(url) {
                return (rule.tag(), rule.policy());
            }
        }
        (UNKNOWN_TAG, None)
    }

    /// Increments the request count for a tag.
    pub fn record_request(&self, tag: &str) {
        let mut buckets = self.lock();
        buckets.entry(tag.to_string()).or_default().count += 1;
    }

    /// Records the outcome of a completed attempt sequence: its latency,
    /// the final status code when one was observed, and whether the
    /// sequence ended in an error.
    pub fn record_outcome(&self, tag: &str, latency_secs: f64, status: Option<u16>, error: bool) {
        let mut buckets = self.lock();
        let bucket = buckets.entry(tag.to_string()).or_default();
        bucket.latencies.push(latency_secs);
        if let Some(code) = status {
            *bucket.status_codes.entry(code).or_insert(0) += 1;
        }
        if error {
            bucket.errors += 1;
        }
    }

    /// Returns a deep copy of every bucket.
    pub fn snapshot(&self) -> HashMap<String, RouteMetrics> {
        self.lock().clone()
    }

    /// Returns per-tag summaries with mean latency.
    pub fn summary(&self) -> HashMap<String, MetricsSummary> {
        let buckets = self.lock();
        buckets
            .iter()
            .map(|(tag, m)| {
                let avg_latency = if m.latencies.is_empty() {
                    0.0
                } else {
                    m.latencies.iter().sum::<f64>() / m.latencies.len() as f64
                };
                (
                    tag.clone(),
                    MetricsSummary {
                        count: m.count,
                        errors: m.errors,
                        avg_latency,
                        status_codes: m.status_codes.clone(),
                    },
                )
            })
            .collect()
    }

    /// Compares current buckets against an earlier snapshot, returning only
    /// tags whose request or error count changed.
    pub fn compare(&self, snapshot: &HashMap<String, RouteMetrics>) -> HashMap<String, MetricsDelta> {
        let buckets = self.lock();
        let mut deltas = HashMap::new();
        for (tag, current) in buckets.iter() {
            let (base_count, base_errors) = snapshot
                .get(tag)
                .map_or((0, 0), |m| (m.count, m.errors));
            let count = current.count.saturating_sub(base_count);
            let errors = current.errors.saturating_sub(base_errors);
            if count != 0 || errors != 0 {
                deltas.insert(tag.clone(), MetricsDelta { count, errors });
            }
        }
        deltas
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RouteMetrics>> {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
