use crate::config::ConcurrencyKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`iterations` must be a positive integer")]
    InvalidIterations,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("the {0} executor requires `{1}`")]
    MissingField(ConcurrencyKind, &'static str),

    #[error("`{1}` is not valid with the {0} executor")]
    UnexpectedField(ConcurrencyKind, &'static str),

    #[error(
        "invalid `executor` `{0}` (expected `fixed-iterations`, `constant-concurrency`, or `staged-ramp`)"
    )]
    InvalidExecutor(String),

    #[error(
        "`stages` must be a non-empty array of {{ duration, target }} with a positive total duration and a positive peak"
    )]
    InvalidStages,

    #[error("`pacing.min` must not exceed `pacing.max`")]
    InvalidPacing,

    #[error("invalid threshold for `{metric}`: {error}")]
    InvalidThreshold { metric: String, error: String },

    #[error("workload has no actions")]
    EmptyWorkload,

    #[error("action `{name}` has weight {weight}; weights must be positive and finite")]
    InvalidWeight { name: String, weight: f64 },

    #[error("invalid base url `{0}`")]
    InvalidBaseUrl(String),

    #[error("virtual user task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("metrics registry error: {0}")]
    Metrics(#[from] ecload_metrics::Error),
}

impl Error {
    /// Configuration errors are raised before any virtual user starts. Everything else is a
    /// defect in the harness itself.
    #[must_use]
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::Join(_) | Self::Metrics(_))
    }
}
