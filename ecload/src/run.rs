use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use ecload_core::{
    Harness, HttpClientOptions, HttpTarget, RunOverrides, RunReport, ScenarioConfig,
    ScenarioOptions, StatusClassifier, scenario_from_options,
};
use ecload_shop::{ShopSettings, TestData};

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;
use crate::scenario_yaml;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);
    let settings = shop_settings(&args);

    let config = scenario_config(&args, &settings)
        .await
        .map_err(RunError::InvalidInput)?;
    let workload = args.scenario.workload(&settings)?;
    let target = HttpTarget::new(
        &args.base_url,
        HttpClientOptions {
            request_timeout: Some(args.request_timeout),
            ..HttpClientOptions::default()
        },
    )?;

    let harness = Harness::new(config, workload, target)
        .with_classifier(StatusClassifier::default().with_precedence(args.precedence));
    out.print_header(&args.base_url, harness.config());
    tracing::info!(
        scenario = %args.scenario,
        base_url = %args.base_url,
        seed = harness.config().seed,
        "run starting"
    );

    let control = harness.control();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping the run");
            control.abort();
        }
    });
    let ticker = out.progress(harness.config()).map(|progress| {
        tokio::spawn(async move {
            let started = Instant::now();
            loop {
                progress(started.elapsed());
                tokio::time::sleep(PROGRESS_INTERVAL).await;
            }
        })
    });

    let result = harness.run().await;
    ctrl_c.abort();
    if let Some(ticker) = ticker {
        ticker.abort();
    }
    let report = result?;

    tracing::info!(
        verdict = %report.verdict,
        iterations = report.iterations(),
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "run finished"
    );

    out.print_summary(&report).map_err(RunError::RuntimeError)?;

    if !args.no_result_file {
        let path = write_result_file(&args.results_dir, &report)
            .await
            .map_err(RunError::RuntimeError)?;
        tracing::info!(path = %path.display(), "result written");
    }

    Ok(ExitCode::from_verdict(report.verdict))
}

fn shop_settings(args: &RunArgs) -> ShopSettings {
    ShopSettings {
        data: TestData {
            user_count: args.user_count,
            coupon_id: args.coupon_id,
            ..TestData::default()
        },
        coupon_quantity: args.coupon_quantity,
    }
}

/// Scenario defaults, then the config file, then CLI flags.
async fn scenario_config(
    args: &RunArgs,
    settings: &ShopSettings,
) -> anyhow::Result<ScenarioConfig> {
    let mut opts = args.scenario.options(settings);
    if let Some(path) = &args.config {
        opts = opts.merge(scenario_yaml::load_options(path).await?);
    }

    let opts = opts
        .merge(ScenarioOptions {
            seed: args.seed,
            cancel_policy: args.on_abort,
            ..ScenarioOptions::default()
        })
        .with_overrides(RunOverrides {
            vus: args.vus,
            iterations: args.iterations,
            duration: args.duration,
        });

    scenario_from_options(args.scenario.name(), opts)
        .with_context(|| format!("invalid options for scenario {}", args.scenario))
}

async fn write_result_file(dir: &Path, report: &RunReport) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create results dir: {}", dir.display()))?;

    let path = dir.join(format!("{}-result.json", report.scenario));
    let doc = serde_json::to_vec_pretty(&output::json::build_report(report))?;
    tokio::fs::write(&path, doc)
        .await
        .with_context(|| format!("failed to write result file: {}", path.display()))?;
    Ok(path)
}
