use std::sync::Arc;

use ecload_metrics::Registry;

use crate::config::ScenarioConfig;
use crate::error::Result;
use crate::outcome::{Classifier, StatusClassifier};
use crate::report::{RunReport, Verdict};
use crate::runner::RunControl;
use crate::runner::recorder::Recorder;
use crate::runner::run::{RunParts, run_units};
use crate::target::{MeteredTarget, Target};
use crate::thresholds::evaluate_thresholds;
use crate::workload::Workload;

/// Wires a validated scenario, a workload and a target into one run.
///
/// Every run gets its own metric registry; nothing is shared between runs.
pub struct Harness {
    config: ScenarioConfig,
    workload: Arc<Workload>,
    target: Arc<dyn Target>,
    classifier: Arc<dyn Classifier>,
    control: Arc<RunControl>,
}

impl Harness {
    pub fn new(config: ScenarioConfig, workload: Workload, target: impl Target + 'static) -> Self {
        Self {
            config,
            workload: Arc::new(workload),
            target: Arc::new(target),
            classifier: Arc::new(StatusClassifier::default()),
            control: Arc::new(RunControl::new()),
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Handle for stopping the run from outside (e.g. a Ctrl-C handler).
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    /// Runs the scenario to completion.
    ///
    /// `Err` is only returned when the run cannot start (metric name clashes). Problems found
    /// after units have started are reported through [`Verdict::HarnessError`].
    pub async fn run(self) -> Result<RunReport> {
        let registry = Registry::default();
        let recorder = Arc::new(Recorder::new(&registry, &self.workload)?);
        let target: Arc<dyn Target> = Arc::new(MeteredTarget::new(self.target, &registry)?);

        tracing::info!(
            scenario = %self.config.name,
            executor = %self.config.model.kind(),
            vus = self.config.max_vus(),
            iterations = ?self.config.iterations,
            duration = ?self.config.duration,
            seed = self.config.seed,
            cancel_policy = %self.config.cancel_policy,
            "run starting"
        );

        let finished = run_units(
            &self.config,
            RunParts {
                workload: self.workload.clone(),
                target,
                classifier: self.classifier.clone(),
                recorder: recorder.clone(),
                control: self.control.clone(),
            },
        )
        .await;

        let mut harness_errors = finished.failures;

        let iterations = recorder.iterations.value();
        let discarded = recorder.discarded.value();
        let outcomes = recorder.outcomes_total();
        if outcomes + discarded != iterations {
            tracing::error!(
                outcomes,
                discarded,
                iterations,
                "outcome partition does not cover every iteration"
            );
            harness_errors.push(format!(
                "outcome partition mismatch: {outcomes} outcomes + {discarded} discarded != {iterations} iterations"
            ));
        }
        if let Some(budget) = self.config.iterations
            && iterations > budget
        {
            harness_errors.push(format!(
                "admitted {iterations} iterations with a budget of {budget}"
            ));
        }

        let metrics = registry.snapshot(finished.elapsed);
        let thresholds = evaluate_thresholds(&self.config.thresholds, &metrics);
        let verdict = Verdict::decide(&thresholds, &harness_errors);

        tracing::info!(
            scenario = %self.config.name,
            %verdict,
            iterations,
            discarded,
            elapsed = ?finished.elapsed,
            "run finished"
        );

        Ok(RunReport {
            scenario: self.config.name,
            executor: self.config.model.kind(),
            seed: self.config.seed,
            elapsed: finished.elapsed,
            metrics,
            thresholds,
            verdict,
            harness_errors,
            aborted: self.control.is_aborted(),
        })
    }
}
