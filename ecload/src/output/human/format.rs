use std::time::Duration;

/// Single rounded component in us, ms or s.
pub(crate) fn format_duration(d: Duration) -> String {
    format_millis(d.as_secs_f64() * 1000.0)
}

pub(crate) fn format_millis(ms: f64) -> String {
    if !ms.is_finite() {
        return "n/a".to_string();
    }
    if ms >= 1000.0 {
        return format!("{:.2}s", ms / 1000.0);
    }
    if ms >= 1.0 {
        return format!("{ms:.2}ms");
    }
    format!("{:.0}us", ms * 1000.0)
}

pub(crate) fn format_millis_opt(ms: Option<f64>) -> String {
    ms.map_or_else(|| "n/a".to_string(), format_millis)
}

pub(crate) fn format_rate(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.0}")
    } else {
        "0".to_string()
    }
}

pub(crate) fn format_percent(part: u64, total: u64) -> String {
    if total == 0 {
        return "-".to_string();
    }
    format!("{:.2}%", part as f64 * 100.0 / total as f64)
}
