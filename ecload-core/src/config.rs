use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};
use crate::thresholds::{ThresholdRule, ThresholdSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    #[must_use]
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// Executor kind in its string form (YAML `executor:` and presets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ConcurrencyKind {
    #[strum(to_string = "fixed-iterations", serialize = "shared-iterations")]
    FixedIterations,

    #[strum(to_string = "constant-concurrency", serialize = "constant-vus")]
    ConstantConcurrency,

    #[strum(to_string = "staged-ramp", serialize = "ramping-vus")]
    StagedRamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcurrencyModel {
    /// `iterations` are pulled from one shared budget by `vus` units.
    FixedIterations { vus: u64, iterations: u64 },

    /// `vus` units loop until the duration bound elapses.
    ConstantConcurrency { vus: u64 },

    /// The live unit count follows the stage list, interpolating linearly inside each stage.
    StagedRamp { start_vus: u64, stages: Vec<Stage> },
}

impl ConcurrencyModel {
    #[must_use]
    pub fn kind(&self) -> ConcurrencyKind {
        match self {
            Self::FixedIterations { .. } => ConcurrencyKind::FixedIterations,
            Self::ConstantConcurrency { .. } => ConcurrencyKind::ConstantConcurrency,
            Self::StagedRamp { .. } => ConcurrencyKind::StagedRamp,
        }
    }

    /// Number of units that must be spawned to honour the model.
    #[must_use]
    pub fn max_vus(&self) -> u64 {
        match self {
            Self::FixedIterations { vus, .. } | Self::ConstantConcurrency { vus } => *vus,
            Self::StagedRamp { start_vus, stages } => stages
                .iter()
                .map(|s| s.target)
                .max()
                .unwrap_or(0)
                .max(*start_vus),
        }
    }
}

/// Random think time inserted after every iteration, uniform in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    #[must_use]
    pub fn between(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let span = self.max.saturating_sub(self.min);
        self.min + span.mul_f64(rng.random::<f64>())
    }
}

/// What happens to in-flight actions when an operator aborts the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::EnumString, strum::Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum CancelPolicy {
    /// In-flight actions complete and their outcomes are recorded.
    #[default]
    Drain,
    /// In-flight actions are dropped and counted as discarded iterations.
    Discard,
}

/// Run-shape overrides supplied by the operator (flags or environment). They win over
/// anything a preset or config file says.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    pub duration: Option<Duration>,
}

impl RunOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vus.is_none() && self.iterations.is_none() && self.duration.is_none()
    }
}

/// Unvalidated scenario options. Layers (preset, config file, overrides) are merged field by
/// field and validated once by [`scenario_from_options`].
#[derive(Debug, Clone, Default)]
pub struct ScenarioOptions {
    pub executor: Option<String>,
    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    pub duration: Option<Duration>,
    pub start_vus: Option<u64>,
    pub stages: Option<Vec<Stage>>,
    pub pacing: Option<Pacing>,
    pub thresholds: Vec<ThresholdSet>,
    pub seed: Option<u64>,
    pub cancel_policy: Option<CancelPolicy>,
}

impl ScenarioOptions {
    /// Layers `over` on top of `self`: every field `over` sets wins. Threshold sets are merged
    /// per metric, with `over`'s expressions replacing the base ones.
    #[must_use]
    pub fn merge(mut self, over: ScenarioOptions) -> Self {
        self.executor = over.executor.or(self.executor);
        self.vus = over.vus.or(self.vus);
        self.iterations = over.iterations.or(self.iterations);
        self.duration = over.duration.or(self.duration);
        self.start_vus = over.start_vus.or(self.start_vus);
        self.stages = over.stages.or(self.stages);
        self.pacing = over.pacing.or(self.pacing);
        self.seed = over.seed.or(self.seed);
        self.cancel_policy = over.cancel_policy.or(self.cancel_policy);

        for set in over.thresholds {
            match self.thresholds.iter_mut().find(|s| s.metric == set.metric) {
                Some(existing) => existing.expressions = set.expressions,
                None => self.thresholds.push(set),
            }
        }
        self
    }

    /// Applies operator overrides.
    ///
    /// An explicit iteration count turns any scenario into a fixed-iterations one. Overriding
    /// `vus` or `duration` on a staged ramp flattens it into constant concurrency, since the
    /// stage list no longer describes the requested run shape.
    #[must_use]
    pub fn with_overrides(mut self, overrides: RunOverrides) -> Self {
        if overrides.is_empty() {
            return self;
        }

        let base_kind = self.executor.as_deref().and_then(|e| e.parse().ok());
        if overrides.iterations.is_some() {
            self.executor = Some(ConcurrencyKind::FixedIterations.to_string());
            self.stages = None;
            self.start_vus = None;
        } else if base_kind == Some(ConcurrencyKind::StagedRamp) || self.stages.is_some() {
            let ramp_length: Duration = self
                .stages
                .take()
                .unwrap_or_default()
                .iter()
                .map(|s| s.duration)
                .sum();
            if self.duration.is_none() && !ramp_length.is_zero() {
                self.duration = Some(ramp_length);
            }
            self.executor = Some(ConcurrencyKind::ConstantConcurrency.to_string());
            self.start_vus = None;
            self.iterations = None;
        }

        self.vus = overrides.vus.or(self.vus);
        self.iterations = overrides.iterations.or(self.iterations);
        self.duration = overrides.duration.or(self.duration);
        self
    }

    fn kind(&self) -> Result<ConcurrencyKind> {
        match self.executor.as_deref() {
            Some(name) => name
                .parse()
                .map_err(|_| Error::InvalidExecutor(name.to_string())),
            None if self.stages.is_some() => Ok(ConcurrencyKind::StagedRamp),
            None if self.iterations.is_some() => Ok(ConcurrencyKind::FixedIterations),
            None => Ok(ConcurrencyKind::ConstantConcurrency),
        }
    }
}

/// Validated, immutable description of one run.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub model: ConcurrencyModel,
    /// Wall-clock bound. For fixed-iterations runs this is the optional maximum duration; for
    /// staged ramps it is the total stage duration.
    pub duration: Option<Duration>,
    pub iterations: Option<u64>,
    pub pacing: Pacing,
    pub thresholds: Vec<ThresholdRule>,
    pub seed: u64,
    pub cancel_policy: CancelPolicy,
}

impl ScenarioConfig {
    #[must_use]
    pub fn max_vus(&self) -> u64 {
        self.model.max_vus()
    }
}

pub fn scenario_from_options(name: &str, opts: ScenarioOptions) -> Result<ScenarioConfig> {
    let kind = opts.kind()?;

    if let Some(d) = opts.duration
        && d.is_zero()
    {
        return Err(Error::InvalidDuration);
    }

    let positive_vus = |vus: Option<u64>| match vus.unwrap_or(1) {
        0 => Err(Error::InvalidVus),
        v => Ok(v),
    };

    let (model, duration, iterations) = match kind {
        ConcurrencyKind::FixedIterations => {
            let vus = positive_vus(opts.vus)?;
            let iterations = match opts.iterations {
                None => return Err(Error::MissingField(kind, "iterations")),
                Some(0) => return Err(Error::InvalidIterations),
                Some(n) => n,
            };
            (
                ConcurrencyModel::FixedIterations { vus, iterations },
                opts.duration,
                Some(iterations),
            )
        }
        ConcurrencyKind::ConstantConcurrency => {
            let vus = positive_vus(opts.vus)?;
            if opts.iterations.is_some() {
                return Err(Error::UnexpectedField(kind, "iterations"));
            }
            let Some(duration) = opts.duration else {
                return Err(Error::MissingField(kind, "duration"));
            };
            (
                ConcurrencyModel::ConstantConcurrency { vus },
                Some(duration),
                None,
            )
        }
        ConcurrencyKind::StagedRamp => {
            if opts.iterations.is_some() {
                return Err(Error::UnexpectedField(kind, "iterations"));
            }
            if opts.duration.is_some() {
                return Err(Error::UnexpectedField(kind, "duration"));
            }
            let stages = opts.stages.unwrap_or_default();
            let total: Duration = stages.iter().map(|s| s.duration).sum();
            let start_vus = opts.start_vus.unwrap_or(0);
            let model = ConcurrencyModel::StagedRamp { start_vus, stages };
            if total.is_zero() || model.max_vus() == 0 {
                return Err(Error::InvalidStages);
            }
            (model, Some(total), None)
        }
    };

    let pacing = opts.pacing.unwrap_or_default();
    if pacing.min > pacing.max {
        return Err(Error::InvalidPacing);
    }

    let mut thresholds = Vec::new();
    for set in &opts.thresholds {
        thresholds.extend(ThresholdRule::parse_set(set)?);
    }

    Ok(ScenarioConfig {
        name: name.to_string(),
        model,
        duration,
        iterations,
        pacing,
        thresholds,
        seed: opts.seed.unwrap_or_else(rand::random),
        cancel_policy: opts.cancel_policy.unwrap_or_default(),
    })
}
