use std::sync::Arc;
use std::time::Duration;

use ecload_core::{RunReport, ScenarioConfig};

use crate::cli::OutputFormat;

mod human;
pub(crate) mod json;

/// Called periodically with the time since the run started.
pub(crate) type ProgressFn = Arc<dyn Fn(Duration) + Send + Sync>;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, base_url: &str, config: &ScenarioConfig);
    fn progress(&self, config: &ScenarioConfig) -> Option<ProgressFn>;
    fn print_summary(&self, report: &RunReport) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
