use std::sync::Arc;

use ecload_metrics::{Counter, DurationSeries, Gauge, Rate, Registry};

use crate::error::Result;
use crate::outcome::{Outcome, OutcomeCategory};
use crate::workload::{ActionClass, Workload};

struct ActionMetrics {
    duration: Arc<DurationSeries>,
    success_rate: Arc<Rate>,
    by_category: [Arc<Counter>; 5],
}

/// Pre-registered handles for every metric the scheduler writes.
///
/// Registering up front makes name clashes surface before any unit starts, and keeps the
/// hot path free of registry lookups.
pub(crate) struct Recorder {
    pub(crate) iterations: Arc<Counter>,
    pub(crate) discarded: Arc<Counter>,
    pub(crate) vus: Arc<Gauge>,
    pub(crate) vus_max: Arc<Gauge>,
    action_duration: Arc<DurationSeries>,
    action_success: Arc<Rate>,
    error_rate: Arc<Rate>,
    read_success: Arc<Rate>,
    write_success: Arc<Rate>,
    outcomes: [Arc<Counter>; 5],
    per_action: Vec<ActionMetrics>,
}

pub(crate) fn outcome_metric(category: OutcomeCategory) -> String {
    format!("outcome_{category}")
}

fn category_counters(
    registry: &Registry,
    name: impl Fn(OutcomeCategory) -> String,
) -> Result<[Arc<Counter>; 5]> {
    let [a, b, c, d, e] = OutcomeCategory::ALL;
    Ok([
        registry.counter(&name(a))?,
        registry.counter(&name(b))?,
        registry.counter(&name(c))?,
        registry.counter(&name(d))?,
        registry.counter(&name(e))?,
    ])
}

impl Recorder {
    pub(crate) fn new(registry: &Registry, workload: &Workload) -> Result<Self> {
        let per_action = workload
            .actions()
            .iter()
            .map(|a| {
                let p = &a.metric_prefix;
                Ok(ActionMetrics {
                    duration: registry.duration(&format!("{p}_duration"))?,
                    success_rate: registry.rate(&format!("{p}_success_rate"))?,
                    by_category: category_counters(registry, |c| format!("{p}_{c}_count"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            iterations: registry.counter("iterations")?,
            discarded: registry.counter("iterations_discarded")?,
            vus: registry.gauge("vus")?,
            vus_max: registry.gauge("vus_max")?,
            action_duration: registry.duration("action_duration")?,
            action_success: registry.rate("action_success_rate")?,
            error_rate: registry.rate("error_rate")?,
            read_success: registry.rate("read_success_rate")?,
            write_success: registry.rate("write_success_rate")?,
            outcomes: category_counters(registry, outcome_metric)?,
            per_action,
        })
    }

    pub(crate) fn record(&self, action: usize, class: ActionClass, outcome: &Outcome) {
        let ok = outcome.is_success();
        let idx = outcome.category.index();
        let ms = outcome.latency_ms();

        self.outcomes[idx].increment();
        self.action_duration.record(ms);
        self.action_success.record(ok);
        self.error_rate
            .record(outcome.status == 0 || outcome.status >= 400);
        match class {
            ActionClass::Read => self.read_success.record(ok),
            ActionClass::Write => self.write_success.record(ok),
        }

        if let Some(m) = self.per_action.get(action) {
            m.duration.record(ms);
            m.success_rate.record(ok);
            m.by_category[idx].increment();
        }
    }

    /// Sum of all `outcome_*` counters.
    pub(crate) fn outcomes_total(&self) -> u64 {
        self.outcomes.iter().map(|c| c.value()).sum()
    }
}
