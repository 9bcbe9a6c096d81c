use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;

use crate::config::{CancelPolicy, ConcurrencyModel, Pacing, ScenarioConfig};
use crate::outcome::{Classifier, Outcome, failure_excerpt};
use crate::target::Target;
use crate::workload::Workload;

use super::control::RunControl;
use super::gate::IterationGate;
use super::recorder::Recorder;
use super::schedule::RampSchedule;
use super::vu::VuContext;

/// Leading iterations per unit whose rejected bodies are logged at debug level.
const SAMPLED_FAILURE_ITERATIONS: u64 = 5;

#[derive(Debug, Clone)]
enum VuWork {
    Gate(Arc<IterationGate>),
    Ramp(Arc<RampSchedule>),
}

struct Shared {
    work: VuWork,
    workload: Arc<Workload>,
    target: Arc<dyn Target>,
    classifier: Arc<dyn Classifier>,
    recorder: Arc<Recorder>,
    control: Arc<RunControl>,
    pacing: Pacing,
    cancel_policy: CancelPolicy,
    sequence: AtomicU64,
    started: Instant,
}

pub(crate) struct UnitsFinished {
    pub(crate) elapsed: Duration,
    pub(crate) failures: Vec<String>,
}

pub(crate) struct RunParts {
    pub(crate) workload: Arc<Workload>,
    pub(crate) target: Arc<dyn Target>,
    pub(crate) classifier: Arc<dyn Classifier>,
    pub(crate) recorder: Arc<Recorder>,
    pub(crate) control: Arc<RunControl>,
}

/// Spawns one task per unit and waits for all of them.
///
/// A unit task that panics stops the rest of the run; its failure is returned rather than
/// propagated so the caller can still build a report.
pub(crate) async fn run_units(config: &ScenarioConfig, parts: RunParts) -> UnitsFinished {
    let max_vus = config.max_vus();
    parts
        .recorder
        .vus_max
        .set(i64::try_from(max_vus).unwrap_or(i64::MAX));

    let started = Instant::now();
    let work = match &config.model {
        ConcurrencyModel::FixedIterations { iterations, .. } => {
            let gate = IterationGate::new(Some(*iterations), config.duration);
            gate.start_at(started);
            VuWork::Gate(Arc::new(gate))
        }
        ConcurrencyModel::ConstantConcurrency { .. } => {
            let gate = IterationGate::new(None, config.duration);
            gate.start_at(started);
            VuWork::Gate(Arc::new(gate))
        }
        ConcurrencyModel::StagedRamp { start_vus, stages } => {
            VuWork::Ramp(Arc::new(RampSchedule::new(*start_vus, stages.clone())))
        }
    };

    let shared = Arc::new(Shared {
        work,
        workload: parts.workload,
        target: parts.target,
        classifier: parts.classifier,
        recorder: parts.recorder,
        control: parts.control,
        pacing: config.pacing,
        cancel_policy: config.cancel_policy,
        sequence: AtomicU64::new(0),
        started,
    });

    let ticker = match &shared.work {
        VuWork::Ramp(schedule) => Some(tokio::spawn(log_stages(
            schedule.clone(),
            started,
            shared.control.clone(),
        ))),
        VuWork::Gate(_) => None,
    };

    let mut units = JoinSet::new();
    for id in 1..=max_vus {
        units.spawn(run_unit(VuContext::new(id, config.seed), shared.clone()));
    }

    let mut failures = Vec::new();
    while let Some(res) = units.join_next().await {
        if let Err(err) = res {
            tracing::error!(error = %err, "virtual user task failed");
            failures.push(format!("virtual user task failed: {err}"));
            shared.control.halt();
        }
    }

    if let Some(ticker) = ticker {
        ticker.abort();
        let _ = ticker.await;
    }

    UnitsFinished {
        elapsed: started.elapsed(),
        failures,
    }
}

async fn run_unit(mut ctx: VuContext, shared: Arc<Shared>) {
    let mut active = false;

    loop {
        if shared.control.is_stopping() {
            break;
        }

        let admitted = match &shared.work {
            VuWork::Gate(gate) => gate.next(),
            VuWork::Ramp(schedule) => {
                let elapsed = shared.started.elapsed();
                if schedule.is_done(elapsed) {
                    false
                } else if ctx.id > schedule.target_at(elapsed) {
                    set_active(&shared, &mut active, false);
                    let wait = schedule.next_recheck_in(elapsed, ctx.id);
                    shared.control.sleep(wait.max(Duration::from_millis(1))).await;
                    continue;
                } else {
                    true
                }
            }
        };
        if !admitted {
            break;
        }

        set_active(&shared, &mut active, true);
        run_iteration(&mut ctx, &shared).await;
        ctx.iteration += 1;

        let mut delay = shared.pacing.sample(&mut ctx.rng);
        if let VuWork::Gate(gate) = &shared.work
            && let Some(deadline) = gate.deadline()
        {
            delay = delay.min(deadline.saturating_duration_since(Instant::now()));
        }
        if !delay.is_zero() {
            shared.control.sleep(delay).await;
        }
    }

    set_active(&shared, &mut active, false);
}

async fn run_iteration(ctx: &mut VuContext, shared: &Shared) {
    ctx.sequence = shared.sequence.fetch_add(1, Ordering::Relaxed);
    shared.recorder.iterations.increment();

    let idx = shared.workload.select_index(&mut ctx.rng);
    let def = &shared.workload.actions()[idx];
    let vu = ctx.id;

    let exchange = {
        let fut = def.action.execute(ctx, shared.target.as_ref());
        match shared.cancel_policy {
            CancelPolicy::Drain => Some(fut.await),
            CancelPolicy::Discard => tokio::select! {
                biased;
                () = shared.control.stopped() => None,
                ex = fut => Some(ex),
            },
        }
    };

    let Some(exchange) = exchange else {
        shared.recorder.discarded.increment();
        tracing::debug!(vu, action = %def.name, "in-flight action discarded");
        return;
    };

    let body = exchange.body_text();
    let category = shared.classifier.classify(exchange.status, &body);
    tracing::trace!(
        vu,
        action = %def.name,
        status = exchange.status,
        category = %category,
        latency_ms = exchange.latency.as_secs_f64() * 1000.0,
        "action completed"
    );

    if ctx.iteration < SAMPLED_FAILURE_ITERATIONS
        && let Some(excerpt) = failure_excerpt(category, &body)
    {
        tracing::debug!(
            vu,
            action = %def.name,
            status = exchange.status,
            category = %category,
            body = excerpt,
            "rejected response"
        );
    }

    let outcome = Outcome {
        category,
        latency: exchange.latency,
        status: exchange.status,
    };
    shared.recorder.record(idx, def.class, &outcome);
}

fn set_active(shared: &Shared, active: &mut bool, now: bool) {
    if *active == now {
        return;
    }
    *active = now;
    if now {
        shared.recorder.vus.increment();
    } else {
        shared.recorder.vus.decrement();
    }
}

async fn log_stages(schedule: Arc<RampSchedule>, started: Instant, control: Arc<RunControl>) {
    let mut last = None;
    loop {
        let elapsed = started.elapsed();
        if schedule.is_done(elapsed) {
            break;
        }

        if let Some(snap) = schedule.stage_snapshot_at(elapsed)
            && last != Some(snap.index)
        {
            last = Some(snap.index);
            tracing::info!(
                stage = snap.index + 1,
                stages = snap.count,
                from = snap.start_target,
                to = snap.end_target,
                remaining = ?snap.stage_remaining,
                "ramp stage"
            );
        }

        if !control.sleep(Duration::from_millis(250)).await {
            break;
        }
    }
}
