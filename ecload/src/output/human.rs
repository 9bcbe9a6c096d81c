use std::sync::Arc;

use ecload_core::{ConcurrencyKind, ConcurrencyModel, RunReport, ScenarioConfig};

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;
use summary::render;

use super::{OutputFormatter, ProgressFn};

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, base_url: &str, config: &ScenarioConfig) {
        println!("target: {base_url}");
        let shape = match &config.model {
            ConcurrencyModel::FixedIterations { vus, iterations } => {
                format!("vus={vus} iterations={iterations}")
            }
            ConcurrencyModel::ConstantConcurrency { vus } => format!("vus={vus}"),
            ConcurrencyModel::StagedRamp { start_vus, stages } => {
                format!(
                    "start_vus={start_vus} stages={} max_vus={}",
                    stages.len(),
                    config.max_vus()
                )
            }
        };
        let bound = config
            .duration
            .map(|d| format!(" duration={}", format_duration(d)))
            .unwrap_or_default();
        println!(
            "scenario: {} executor={} {shape}{bound} seed={}",
            config.name,
            config.model.kind(),
            config.seed
        );
        println!();
    }

    fn progress(&self, config: &ScenarioConfig) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        let label = config.name.clone();
        // Iteration-bounded runs usually finish well before their duration cap.
        let total = match config.model.kind() {
            ConcurrencyKind::FixedIterations => None,
            _ => config.duration,
        };

        Some(Arc::new(move |elapsed| {
            let message = format!("elapsed={}", format_duration(elapsed));
            progress.update(&label, total, elapsed, message);
        }))
    }

    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(report));

        let violations: Vec<_> = report.thresholds.violations().collect();
        if !violations.is_empty() {
            eprintln!("thresholds failed:");
            for v in violations {
                match v.observed {
                    Some(obs) => eprintln!("  {}: {} (observed {obs})", v.metric, v.expression),
                    None => eprintln!("  {}: {} (no data)", v.metric, v.expression),
                }
            }
        }

        if !report.harness_errors.is_empty() {
            eprintln!("harness errors:");
            for err in &report.harness_errors {
                eprintln!("  {err}");
            }
        }

        Ok(())
    }
}
