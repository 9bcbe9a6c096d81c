use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::metrics::{Counter, DurationSeries, Gauge, MetricHandle, MetricKind, Rate};
use crate::snapshot::{MetricSnapshot, MetricValue};

/// Name-keyed set of metric series for one run.
///
/// Every operation on a single series is safe for concurrent use; there are no
/// cross-series transactions.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: DashMap<Arc<str>, MetricHandle, ahash::RandomState>,
}

impl Registry {
    /// Returns the series called `name`, creating it on first use.
    ///
    /// Asking for an existing name with a different kind is an error: two call sites disagree
    /// about what the metric is.
    pub fn register(&self, name: &str, kind: MetricKind) -> Result<MetricHandle> {
        if let Some(existing) = self.metrics.get(name) {
            return check_kind(name, existing.value(), kind);
        }

        let entry = self
            .metrics
            .entry(Arc::from(name))
            .or_insert_with(|| MetricHandle::new(kind));
        check_kind(name, entry.value(), kind)
    }

    pub fn counter(&self, name: &str) -> Result<Arc<Counter>> {
        match self.register(name, MetricKind::Counter)? {
            MetricHandle::Counter(c) => Ok(c),
            other => Err(mismatch(name, other.kind(), MetricKind::Counter)),
        }
    }

    pub fn gauge(&self, name: &str) -> Result<Arc<Gauge>> {
        match self.register(name, MetricKind::Gauge)? {
            MetricHandle::Gauge(g) => Ok(g),
            other => Err(mismatch(name, other.kind(), MetricKind::Gauge)),
        }
    }

    pub fn rate(&self, name: &str) -> Result<Arc<Rate>> {
        match self.register(name, MetricKind::Rate)? {
            MetricHandle::Rate(r) => Ok(r),
            other => Err(mismatch(name, other.kind(), MetricKind::Rate)),
        }
    }

    pub fn duration(&self, name: &str) -> Result<Arc<DurationSeries>> {
        match self.register(name, MetricKind::Duration)? {
            MetricHandle::Duration(d) => Ok(d),
            other => Err(mismatch(name, other.kind(), MetricKind::Duration)),
        }
    }

    pub fn get(&self, name: &str) -> Option<MetricHandle> {
        self.metrics.get(name).map(|h| h.value().clone())
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Freezes every series. `elapsed` is the run time used for counter per-second rates.
    pub fn snapshot(&self, elapsed: Duration) -> Vec<MetricSnapshot> {
        let secs = elapsed.as_secs_f64().max(1e-9);

        let mut out: Vec<MetricSnapshot> = self
            .metrics
            .iter()
            .map(|entry| {
                let value = match entry.value() {
                    MetricHandle::Counter(c) => {
                        let count = c.value();
                        MetricValue::Counter {
                            count,
                            per_sec: count as f64 / secs,
                        }
                    }
                    MetricHandle::Gauge(g) => MetricValue::Gauge {
                        value: g.value(),
                        peak: g.peak(),
                    },
                    MetricHandle::Rate(r) => {
                        let (total, hits) = r.counts();
                        MetricValue::Rate {
                            total,
                            hits,
                            rate: (total > 0).then(|| hits as f64 / total as f64),
                        }
                    }
                    MetricHandle::Duration(d) => MetricValue::Duration(d.snapshot()),
                };

                MetricSnapshot {
                    name: entry.key().to_string(),
                    kind: entry.value().kind(),
                    value,
                }
            })
            .collect();

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

fn check_kind(name: &str, handle: &MetricHandle, want: MetricKind) -> Result<MetricHandle> {
    if handle.kind() == want {
        Ok(handle.clone())
    } else {
        Err(mismatch(name, handle.kind(), want))
    }
}

fn mismatch(name: &str, existing: MetricKind, requested: MetricKind) -> Error {
    Error::KindMismatch {
        name: name.to_string(),
        existing,
        requested,
    }
}
