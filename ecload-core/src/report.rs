use std::time::Duration;

use ecload_metrics::{MetricSnapshot, MetricValue};

use crate::config::ConcurrencyKind;
use crate::outcome::OutcomeCategory;
use crate::runner::recorder::outcome_metric;
use crate::thresholds::ThresholdReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Verdict {
    Passed,
    ThresholdsFailed,
    /// The harness broke its own guarantees; target-system metrics are not trustworthy.
    HarnessError,
}

impl Verdict {
    pub(crate) fn decide(thresholds: &ThresholdReport, harness_errors: &[String]) -> Self {
        if !harness_errors.is_empty() {
            Self::HarnessError
        } else if thresholds.passed() {
            Self::Passed
        } else {
            Self::ThresholdsFailed
        }
    }
}

/// Final, read-only result of one run, handed to renderers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: String,
    pub executor: ConcurrencyKind,
    pub seed: u64,
    pub elapsed: Duration,
    pub metrics: Vec<MetricSnapshot>,
    pub thresholds: ThresholdReport,
    pub verdict: Verdict,
    pub harness_errors: Vec<String>,
    pub aborted: bool,
}

impl RunReport {
    pub fn metric(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Counter value, 0 when the metric is absent or not a counter.
    pub fn counter(&self, name: &str) -> u64 {
        match self.metric(name).map(|m| &m.value) {
            Some(MetricValue::Counter { count, .. }) => *count,
            _ => 0,
        }
    }

    pub fn iterations(&self) -> u64 {
        self.counter("iterations")
    }

    pub fn discarded(&self) -> u64 {
        self.counter("iterations_discarded")
    }

    pub fn outcome_count(&self, category: OutcomeCategory) -> u64 {
        self.counter(&outcome_metric(category))
    }

    pub fn outcome_counts(&self) -> Vec<(OutcomeCategory, u64)> {
        OutcomeCategory::ALL
            .iter()
            .map(|c| (*c, self.outcome_count(*c)))
            .collect()
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }
}
