mod config;
mod error;
mod harness;
mod outcome;
mod report;
mod target;
mod thresholds;
mod workload;

pub mod runner;

pub use config::{
    CancelPolicy, ConcurrencyKind, ConcurrencyModel, Pacing, RunOverrides, ScenarioConfig,
    ScenarioOptions, Stage, scenario_from_options,
};
pub use error::{Error, Result};
pub use harness::Harness;
pub use outcome::{Classifier, Outcome, OutcomeCategory, RejectionPrecedence, StatusClassifier};
pub use report::{RunReport, Verdict};
pub use runner::{RunControl, VuContext};
pub use target::{Exchange, HttpTarget, MeteredTarget, RequestSpec, Target};
pub use thresholds::{
    ThresholdAgg, ThresholdExpr, ThresholdOp, ThresholdReport, ThresholdResult, ThresholdRule,
    ThresholdSet, evaluate_thresholds, parse_threshold_expr,
};
pub use workload::{Action, ActionClass, ActionDefinition, Workload};

pub use ecload_http::{HttpClientOptions, HttpTransportErrorKind};
pub use ecload_metrics as metrics;
