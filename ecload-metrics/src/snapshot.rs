use std::sync::Arc;

use crate::metrics::MetricKind;

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub name: String,
    pub kind: MetricKind,
    pub value: MetricValue,
}

#[derive(Debug, Clone)]
pub enum MetricValue {
    Counter {
        count: u64,
        /// Count per second of run time.
        per_sec: f64,
    },
    Gauge {
        value: i64,
        peak: i64,
    },
    Rate {
        total: u64,
        hits: u64,
        /// `None` when nothing was observed.
        rate: Option<f64>,
    },
    Duration(DurationSnapshot),
}

impl MetricValue {
    /// Whether the series saw at least one observation.
    pub fn is_observed(&self) -> bool {
        match self {
            Self::Counter { count, .. } => *count > 0,
            Self::Gauge { peak, .. } => *peak != 0,
            Self::Rate { total, .. } => *total > 0,
            Self::Duration(d) => !d.is_empty(),
        }
    }
}

/// Frozen, sorted copy of a duration series.
#[derive(Debug, Clone, Default)]
pub struct DurationSnapshot {
    sorted: Arc<[f64]>,
}

impl DurationSnapshot {
    pub fn from_unsorted(mut samples: Vec<f64>) -> Self {
        samples.sort_unstable_by(f64::total_cmp);
        Self {
            sorted: samples.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn count(&self) -> u64 {
        self.sorted.len() as u64
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.sorted.iter().sum::<f64>() / self.sorted.len() as f64)
    }

    /// p-th percentile (`p` in `0..=100`) using linear interpolation between closest ranks:
    /// `rank = p/100 * (n-1)`, result `x[lo] + (x[hi]-x[lo]) * (rank-lo)`.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 || !p.is_finite() {
            return None;
        }

        let p = p.clamp(0.0, 100.0);
        let rank = p / 100.0 * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let lo_v = self.sorted[lo.min(n - 1)];
        let hi_v = self.sorted[hi.min(n - 1)];

        Some(lo_v + (hi_v - lo_v) * (rank - lo as f64))
    }

    pub fn summary(&self) -> DurationSummary {
        DurationSummary {
            count: self.count(),
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
            p50: self.percentile(50.0),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationSummary {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}
