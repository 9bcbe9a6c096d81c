//! `--config` files: YAML overrides layered on top of a scenario's defaults.
//!
//! ```yaml
//! executor: staged-ramp
//! startVUs: 0
//! stages:
//!   - { duration: 30s, target: 20 }
//!   - { duration: 1m, target: 20 }
//! pacing: { min: 100ms, max: 600ms }
//! thresholds:
//!   http_req_duration: p(95)<500
//!   http_req_failed: [rate<0.01]
//! onAbort: discard
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use ecload_core::{CancelPolicy, Pacing, ScenarioOptions, Stage, ThresholdSet};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioYaml {
    /// fixed-iterations | constant-concurrency | staged-ramp
    pub executor: Option<String>,
    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,

    #[serde(rename = "startVUs")]
    pub start_vus: Option<u64>,
    pub stages: Option<Vec<StageYaml>>,

    pub pacing: Option<PacingYaml>,

    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprYaml>,

    pub seed: Option<u64>,
    pub on_abort: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StageYaml {
    pub target: u64,
    pub duration: YamlDuration,
}

/// `max` defaults to `min`, i.e. a fixed delay.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PacingYaml {
    pub min: YamlDuration,
    pub max: Option<YamlDuration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThresholdExprYaml {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprYaml {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// Duration as a humantime string (`250ms`, `1m 30s`) or a number of seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct YamlDuration(Duration);

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a finite, non-negative number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                humantime::parse_duration(v.trim())
                    .map(YamlDuration)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(V)
    }
}

impl ScenarioYaml {
    pub(crate) fn into_options(self) -> anyhow::Result<ScenarioOptions> {
        let cancel_policy = self
            .on_abort
            .as_deref()
            .map(|s| {
                s.parse::<CancelPolicy>()
                    .map_err(|_| anyhow::anyhow!("invalid `onAbort` `{s}` (expected drain or discard)"))
            })
            .transpose()?;

        Ok(ScenarioOptions {
            executor: self.executor,
            vus: self.vus,
            iterations: self.iterations,
            duration: self.duration.map(|d| d.0),
            start_vus: self.start_vus,
            stages: self.stages.map(|stages| {
                stages
                    .into_iter()
                    .map(|s| Stage::new(s.duration.0, s.target))
                    .collect()
            }),
            pacing: self.pacing.map(|p| {
                let min = p.min.0;
                Pacing::between(min, p.max.map_or(min, |m| m.0))
            }),
            thresholds: self
                .thresholds
                .into_iter()
                .map(|(metric, exprs)| ThresholdSet::new(metric, exprs.into_vec()))
                .collect(),
            seed: self.seed,
            cancel_policy,
        })
    }
}

pub(crate) fn parse_options(source: &str) -> anyhow::Result<ScenarioOptions> {
    // An empty document means "no overrides".
    if source.trim().is_empty() {
        return Ok(ScenarioOptions::default());
    }
    let yaml: ScenarioYaml = serde_yaml::from_str(source).context("invalid scenario YAML")?;
    yaml.into_options()
}

pub(crate) async fn load_options(path: &Path) -> anyhow::Result<ScenarioOptions> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_options(&source).with_context(|| format!("in config file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecload_core::{ConcurrencyKind, scenario_from_options};

    fn options(source: &str) -> ScenarioOptions {
        parse_options(source).unwrap_or_else(|e| panic!("{e:#}"))
    }

    #[test]
    fn parses_a_staged_ramp() {
        let opts = options(
            r#"
executor: staged-ramp
startVUs: 2
stages:
  - { duration: 30s, target: 20 }
  - { duration: 1m, target: 0 }
pacing: { min: 100ms, max: 600ms }
thresholds:
  http_req_duration: p(95)<500
  http_req_failed: [rate<0.01, count<10]
onAbort: discard
seed: 42
"#,
        );

        assert_eq!(
            opts.stages,
            Some(vec![
                Stage::new(Duration::from_secs(30), 20),
                Stage::new(Duration::from_secs(60), 0),
            ])
        );
        assert_eq!(opts.start_vus, Some(2));
        assert_eq!(
            opts.pacing,
            Some(Pacing::between(
                Duration::from_millis(100),
                Duration::from_millis(600)
            ))
        );
        assert_eq!(opts.cancel_policy, Some(CancelPolicy::Discard));
        assert_eq!(opts.seed, Some(42));
        assert_eq!(opts.thresholds.len(), 2);
        assert_eq!(opts.thresholds[1].metric, "http_req_failed");
        assert_eq!(opts.thresholds[1].expressions, ["rate<0.01", "count<10"]);

        let cfg = scenario_from_options("ramp", opts).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cfg.model.kind(), ConcurrencyKind::StagedRamp);
        assert_eq!(cfg.max_vus(), 20);
    }

    #[test]
    fn numeric_durations_are_seconds_and_pacing_max_defaults_to_min() {
        let opts = options("duration: 90\npacing: { min: 0.5 }\n");
        assert_eq!(opts.duration, Some(Duration::from_secs(90)));
        assert_eq!(opts.pacing, Some(Pacing::fixed(Duration::from_millis(500))));
    }

    #[test]
    fn empty_document_overrides_nothing() {
        let opts = options("  \n");
        assert!(opts.executor.is_none());
        assert!(opts.thresholds.is_empty());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(parse_options("vuz: 3\n").is_err());
        assert!(parse_options("duration: soon\n").is_err());
        assert!(parse_options("onAbort: later\n").is_err());
    }
}
