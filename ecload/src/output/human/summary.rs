use std::fmt::Write as _;

use ecload_core::RunReport;
use ecload_core::metrics::MetricValue;

use super::format::*;

pub(crate) fn render(report: &RunReport) -> String {
    let mut out = String::new();

    out.push_str("summary\n");
    writeln!(
        out,
        "scenario: {} ({}, seed {})",
        report.scenario, report.executor, report.seed
    )
    .ok();
    writeln!(out, "  elapsed: {}", format_duration(report.elapsed)).ok();
    if report.aborted {
        out.push_str("  aborted: yes\n");
    }

    let iterations = report.iterations();
    writeln!(
        out,
        "  iterations: {iterations} (discarded {})",
        report.discarded()
    )
    .ok();

    out.push_str("  outcomes:\n");
    for (category, count) in report.outcome_counts() {
        writeln!(
            out,
            "    {:<20} {count:>8} {:>8}",
            category.as_str(),
            format_percent(count, iterations)
        )
        .ok();
    }

    let observed: Vec<_> = report
        .metrics
        .iter()
        .filter(|m| m.value.is_observed() && !m.name.starts_with("outcome_"))
        .collect();
    if !observed.is_empty() {
        let width = observed.iter().map(|m| m.name.len()).max().unwrap_or(0);
        out.push_str("  metrics:\n");
        for m in observed {
            writeln!(out, "    {:<width$}  {}", m.name, render_value(&m.value)).ok();
        }
    }

    if !report.thresholds.results.is_empty() {
        out.push_str("thresholds\n");
        for r in &report.thresholds.results {
            let observed = r
                .observed
                .map_or_else(|| "no data".to_string(), |v| format!("observed {v:.4}"));
            writeln!(
                out,
                "  {:<4} {} {} ({observed})",
                if r.passed { "ok" } else { "FAIL" },
                r.metric,
                r.expression
            )
            .ok();
        }
    }

    writeln!(out, "verdict: {}", report.verdict).ok();
    out
}

fn render_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Counter { count, per_sec } => {
            format!("{count} ({}/s)", format_rate(*per_sec))
        }
        MetricValue::Gauge { value, peak } => format!("{value} (peak {peak})"),
        MetricValue::Rate { total, hits, rate } => {
            let pct = rate.map_or_else(|| "n/a".to_string(), |r| format!("{:.2}%", r * 100.0));
            format!("{pct} ({hits}/{total})")
        }
        MetricValue::Duration(d) => {
            let s = d.summary();
            format!(
                "p50={} p90={} p95={} p99={} mean={} max={} (n={})",
                format_millis_opt(s.p50),
                format_millis_opt(s.p90),
                format_millis_opt(s.p95),
                format_millis_opt(s.p99),
                format_millis_opt(s.mean),
                format_millis_opt(s.max),
                s.count
            )
        }
    }
}
