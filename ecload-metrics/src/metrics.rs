use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::snapshot::DurationSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Duration,
}

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    #[inline]
    pub fn increment(&self) {
        self.add(1);
    }

    #[inline]
    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Current level plus the highest level ever observed.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
    peak: AtomicI64,
}

impl Gauge {
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
        self.peak.fetch_max(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment(&self) -> i64 {
        let now = self.value.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.peak.fetch_max(now, Ordering::Relaxed);
        now
    }

    #[inline]
    pub fn decrement(&self) -> i64 {
        self.value.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn peak(&self) -> i64 {
        self.peak.load(Ordering::Relaxed)
    }
}

/// Fraction of boolean observations that were `true`.
#[derive(Debug, Default)]
pub struct Rate {
    total: AtomicU64,
    hits: AtomicU64,
}

impl Rate {
    #[inline]
    pub fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// `(total, hits)`.
    ///
    /// Hits are loaded before the total so a concurrent observer never sees more hits than
    /// observations.
    pub fn counts(&self) -> (u64, u64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        (total.max(hits), hits)
    }

    /// Hits over observations, 0 when nothing was observed.
    pub fn value(&self) -> f64 {
        let (total, hits) = self.counts();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Unbounded multiset of millisecond samples.
///
/// Samples are kept verbatim so percentile queries are exact. The lock is only held for a
/// push or a copy, never across an await point.
#[derive(Debug, Default)]
pub struct DurationSeries {
    samples: Mutex<Vec<f64>>,
}

impl DurationSeries {
    #[inline]
    pub fn record(&self, millis: f64) {
        if !millis.is_finite() {
            return;
        }
        self.samples.lock().push(millis.max(0.0));
    }

    #[inline]
    pub fn record_duration(&self, duration: std::time::Duration) {
        self.record(duration.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> u64 {
        self.samples.lock().len() as u64
    }

    pub fn snapshot(&self) -> DurationSnapshot {
        let samples = self.samples.lock().clone();
        DurationSnapshot::from_unsorted(samples)
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.snapshot().percentile(p)
    }

    pub fn mean(&self) -> Option<f64> {
        self.snapshot().mean()
    }

    pub fn max(&self) -> Option<f64> {
        self.snapshot().max()
    }
}

#[derive(Debug, Clone)]
pub enum MetricHandle {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Rate(Arc<Rate>),
    Duration(Arc<DurationSeries>),
}

impl MetricHandle {
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Self::Counter(Arc::default()),
            MetricKind::Gauge => Self::Gauge(Arc::default()),
            MetricKind::Rate => Self::Rate(Arc::default()),
            MetricKind::Duration => Self::Duration(Arc::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Rate(_) => MetricKind::Rate,
            Self::Duration(_) => MetricKind::Duration,
        }
    }
}
