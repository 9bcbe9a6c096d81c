use std::collections::BTreeMap;
use std::io::Write as _;

use ecload_core::metrics::MetricValue;
use ecload_core::{RunReport, ScenarioConfig};
use serde::Serialize;

use super::{OutputFormatter, ProgressFn};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _base_url: &str, _config: &ScenarioConfig) {}

    fn progress(&self, _config: &ScenarioConfig) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        emit_json_line(&build_report(report))
    }
}

/// The machine-readable run result. Printed as one NDJSON line and written as the result file.
#[derive(Debug, Serialize)]
pub(crate) struct JsonReport {
    pub kind: &'static str,
    pub scenario: String,
    pub executor: String,
    pub seed: u64,
    pub elapsed_secs: f64,
    pub aborted: bool,
    pub verdict: String,
    pub iterations: u64,
    pub discarded: u64,
    pub outcomes: BTreeMap<&'static str, u64>,
    pub metrics: BTreeMap<String, JsonMetric>,
    pub thresholds: Vec<JsonThreshold>,
    pub harness_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum JsonMetric {
    Counter {
        count: u64,
        per_sec: f64,
    },
    Gauge {
        value: i64,
        peak: i64,
    },
    Rate {
        rate: Option<f64>,
        hits: u64,
        total: u64,
    },
    /// Milliseconds.
    Duration {
        count: u64,
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
        p50: Option<f64>,
        p90: Option<f64>,
        p95: Option<f64>,
        p99: Option<f64>,
    },
}

impl From<&MetricValue> for JsonMetric {
    fn from(value: &MetricValue) -> Self {
        match value {
            MetricValue::Counter { count, per_sec } => Self::Counter {
                count: *count,
                per_sec: *per_sec,
            },
            MetricValue::Gauge { value, peak } => Self::Gauge {
                value: *value,
                peak: *peak,
            },
            MetricValue::Rate { total, hits, rate } => Self::Rate {
                rate: *rate,
                hits: *hits,
                total: *total,
            },
            MetricValue::Duration(d) => {
                let s = d.summary();
                Self::Duration {
                    count: s.count,
                    min: s.min,
                    max: s.max,
                    mean: s.mean,
                    p50: s.p50,
                    p90: s.p90,
                    p95: s.p95,
                    p99: s.p99,
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonThreshold {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

pub(crate) fn build_report(report: &RunReport) -> JsonReport {
    JsonReport {
        kind: "summary",
        scenario: report.scenario.clone(),
        executor: report.executor.to_string(),
        seed: report.seed,
        elapsed_secs: report.elapsed.as_secs_f64(),
        aborted: report.aborted,
        verdict: report.verdict.to_string(),
        iterations: report.iterations(),
        discarded: report.discarded(),
        outcomes: report
            .outcome_counts()
            .into_iter()
            .map(|(category, n)| (category.as_str(), n))
            .collect(),
        metrics: report
            .metrics
            .iter()
            .map(|m| (m.name.clone(), JsonMetric::from(&m.value)))
            .collect(),
        thresholds: report
            .thresholds
            .results
            .iter()
            .map(|r| JsonThreshold {
                metric: r.metric.clone(),
                expression: r.expression.clone(),
                observed: r.observed,
                passed: r.passed,
            })
            .collect(),
        harness_errors: report.harness_errors.clone(),
    }
}

fn emit_json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ecload_core::metrics::{DurationSnapshot, MetricKind, MetricSnapshot};
    use ecload_core::{ConcurrencyKind, ThresholdReport, ThresholdResult, Verdict};

    use super::*;

    fn report() -> RunReport {
        let counter = |name: &str, count: u64| MetricSnapshot {
            name: name.to_string(),
            kind: MetricKind::Counter,
            value: MetricValue::Counter {
                count,
                per_sec: count as f64 / 2.0,
            },
        };
        RunReport {
            scenario: "coupon-rush".to_string(),
            executor: ConcurrencyKind::FixedIterations,
            seed: 9,
            elapsed: Duration::from_secs(2),
            metrics: vec![
                counter("iterations", 4),
                counter("outcome_success", 3),
                counter("outcome_rejected_capacity", 1),
                MetricSnapshot {
                    name: "coupon_issue_duration".to_string(),
                    kind: MetricKind::Duration,
                    value: MetricValue::Duration(DurationSnapshot::from_unsorted(vec![
                        4.0, 1.0, 3.0, 2.0,
                    ])),
                },
            ],
            thresholds: ThresholdReport {
                results: vec![ThresholdResult {
                    metric: "coupon_issue_duration".to_string(),
                    expression: "p(95)<1000".to_string(),
                    observed: Some(3.85),
                    passed: true,
                }],
            },
            verdict: Verdict::Passed,
            harness_errors: Vec::new(),
            aborted: false,
        }
    }

    #[test]
    fn summary_document_shape() {
        let value = serde_json::to_value(build_report(&report())).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(value["kind"], "summary");
        assert_eq!(value["executor"], "fixed-iterations");
        assert_eq!(value["verdict"], "passed");
        assert_eq!(value["iterations"], 4);
        assert_eq!(value["outcomes"]["success"], 3);
        assert_eq!(value["outcomes"]["rejected_capacity"], 1);
        assert_eq!(value["outcomes"]["transport_error"], 0);
        assert_eq!(value["metrics"]["coupon_issue_duration"]["type"], "duration");
        assert_eq!(value["metrics"]["coupon_issue_duration"]["max"], 4.0);
        assert_eq!(value["metrics"]["iterations"]["type"], "counter");
        assert_eq!(value["thresholds"][0]["passed"], true);
    }
}
