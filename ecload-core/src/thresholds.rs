use ecload_metrics::{MetricSnapshot, MetricValue};

use crate::error::{Error, Result};

/// Raw threshold expressions declared for one metric, e.g. `http_req_duration: [p(95)<500]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdSet {
    pub metric: String,
    pub expressions: Vec<String>,
}

impl ThresholdSet {
    pub fn new<I, S>(metric: impl Into<String>, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            metric: metric.into(),
            expressions: expressions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl ThresholdOp {
    /// Upper-bound rules hold trivially when nothing was observed.
    fn is_upper_bound(self) -> bool {
        matches!(self, Self::Lt | Self::Lte)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdAgg {
    Avg,
    Min,
    Max,
    Count,
    Rate,
    P(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub agg: ThresholdAgg,
    pub op: ThresholdOp,
    pub value: f64,
}

/// One parsed predicate over one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub metric: String,
    pub expression: String,
    pub expr: ThresholdExpr,
}

impl ThresholdRule {
    pub fn parse(metric: &str, expression: &str) -> Result<Self> {
        let expr = parse_threshold_expr(expression).map_err(|error| Error::InvalidThreshold {
            metric: metric.to_string(),
            error,
        })?;
        Ok(Self {
            metric: metric.to_string(),
            expression: expression.trim().to_string(),
            expr,
        })
    }

    pub fn parse_set(set: &ThresholdSet) -> Result<Vec<Self>> {
        set.expressions
            .iter()
            .map(|e| Self::parse(&set.metric, e))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    /// `None` when the metric was never observed (or the aggregation does not apply to it).
    pub observed: Option<f64>,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdReport {
    pub results: Vec<ThresholdResult>,
}

impl ThresholdReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn violations(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

pub fn parse_threshold_expr(raw: &str) -> std::result::Result<ThresholdExpr, String> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return Err("empty threshold".to_string());
    }

    let ops = [
        ("<=", ThresholdOp::Lte),
        (">=", ThresholdOp::Gte),
        ("==", ThresholdOp::Eq),
        ("<", ThresholdOp::Lt),
        (">", ThresholdOp::Gt),
    ];
    let (op_pos, op_len, op) = ops
        .iter()
        .find_map(|(tok, op)| s.find(tok).map(|pos| (pos, tok.len(), *op)))
        .ok_or_else(|| format!("invalid threshold (missing operator): {raw}"))?;

    let (left, right_with_op) = s.split_at(op_pos);
    let right = &right_with_op[op_len..];
    if left.is_empty() || right.is_empty() {
        return Err(format!("invalid threshold: {raw}"));
    }

    let agg = if left.eq_ignore_ascii_case("avg") {
        ThresholdAgg::Avg
    } else if left.eq_ignore_ascii_case("min") {
        ThresholdAgg::Min
    } else if left.eq_ignore_ascii_case("max") {
        ThresholdAgg::Max
    } else if left.eq_ignore_ascii_case("count") {
        ThresholdAgg::Count
    } else if left.eq_ignore_ascii_case("rate") {
        ThresholdAgg::Rate
    } else if let Some(inner) = left.strip_prefix("p(").and_then(|v| v.strip_suffix(')')) {
        let p: f64 = inner
            .parse()
            .map_err(|_| format!("invalid percentile in threshold: {raw}"))?;
        if !(p > 0.0 && p <= 100.0) {
            return Err(format!("percentile out of range in threshold: {raw}"));
        }
        ThresholdAgg::P(p)
    } else {
        return Err(format!("unknown aggregation `{left}` in threshold: {raw}"));
    };

    let value: f64 = right
        .parse()
        .map_err(|_| format!("invalid numeric value in threshold: {raw}"))?;
    if !value.is_finite() {
        return Err(format!("invalid numeric value in threshold: {raw}"));
    }

    Ok(ThresholdExpr { agg, op, value })
}

/// Evaluates every rule against the final snapshots.
///
/// A metric that is missing or has no observations is handled asymmetrically:
/// * `count` rules observe 0 and compare normally, so `count<=K` passes and `count>0` fails.
/// * other rules pass vacuously when they bound a maximum (`<`, `<=`) and fail when they
///   require a minimum or an exact value (`>`, `>=`, `==`).
pub fn evaluate_thresholds(rules: &[ThresholdRule], metrics: &[MetricSnapshot]) -> ThresholdReport {
    let results = rules
        .iter()
        .map(|rule| {
            let series = metrics
                .iter()
                .find(|m| m.name == rule.metric)
                .filter(|m| m.value.is_observed());

            let (observed, passed) = match series {
                Some(series) => {
                    let observed = observed_value(&series.value, rule.expr.agg);
                    let passed = observed
                        .map(|v| compare(v, rule.expr.op, rule.expr.value))
                        .unwrap_or(false);
                    (observed, passed)
                }
                None if rule.expr.agg == ThresholdAgg::Count => {
                    (Some(0.0), compare(0.0, rule.expr.op, rule.expr.value))
                }
                None => (None, rule.expr.op.is_upper_bound()),
            };

            if !passed {
                tracing::debug!(
                    metric = %rule.metric,
                    expression = %rule.expression,
                    ?observed,
                    "threshold failed"
                );
            }

            ThresholdResult {
                metric: rule.metric.clone(),
                expression: rule.expression.clone(),
                observed,
                passed,
            }
        })
        .collect();

    ThresholdReport { results }
}

fn compare(left: f64, op: ThresholdOp, right: f64) -> bool {
    match op {
        ThresholdOp::Lt => left < right,
        ThresholdOp::Lte => left <= right,
        ThresholdOp::Gt => left > right,
        ThresholdOp::Gte => left >= right,
        ThresholdOp::Eq => (left - right).abs() < f64::EPSILON,
    }
}

fn observed_value(value: &MetricValue, agg: ThresholdAgg) -> Option<f64> {
    match (value, agg) {
        (MetricValue::Duration(d), ThresholdAgg::Avg) => d.mean(),
        (MetricValue::Duration(d), ThresholdAgg::Min) => d.min(),
        (MetricValue::Duration(d), ThresholdAgg::Max) => d.max(),
        (MetricValue::Duration(d), ThresholdAgg::Count) => Some(d.count() as f64),
        (MetricValue::Duration(d), ThresholdAgg::P(p)) => d.percentile(p),

        (MetricValue::Counter { count, .. }, ThresholdAgg::Count) => Some(*count as f64),
        // Counter rate is events per second of run time.
        (MetricValue::Counter { per_sec, .. }, ThresholdAgg::Rate) => Some(*per_sec),

        (MetricValue::Gauge { value, .. }, ThresholdAgg::Avg | ThresholdAgg::Min) => {
            Some(*value as f64)
        }
        (MetricValue::Gauge { peak, .. }, ThresholdAgg::Max) => Some(*peak as f64),

        (MetricValue::Rate { rate, .. }, ThresholdAgg::Rate) => *rate,
        (MetricValue::Rate { total, .. }, ThresholdAgg::Count) => Some(*total as f64),

        (_, _) => None,
    }
}
