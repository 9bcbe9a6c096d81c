use std::time::Duration;

use ecload_core::{
    Harness, HttpClientOptions, HttpTarget, OutcomeCategory, Pacing, RunOverrides, Verdict,
    scenario_from_options,
};
use ecload_shop::{Preset, ShopSettings, TestData};
use ecload_testserver::{ShopConfig, TestServer};

async fn run_preset(
    server: &TestServer,
    preset: Preset,
    settings: &ShopSettings,
    overrides: RunOverrides,
) -> anyhow::Result<ecload_core::RunReport> {
    let mut opts = preset.options(settings).with_overrides(overrides);
    opts.pacing = Some(Pacing::none());
    opts.seed = Some(11);

    let config = scenario_from_options(preset.name(), opts)?;
    let target = HttpTarget::new(server.base_url(), HttpClientOptions::default())?;
    Ok(Harness::new(config, preset.workload(settings)?, target)
        .run()
        .await?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coupon_rush_issues_exactly_the_coupon_quantity() -> anyhow::Result<()> {
    let server = TestServer::start_with(ShopConfig::default().with_coupon_quantity(50)).await?;
    let settings = ShopSettings {
        coupon_quantity: Some(50),
        ..ShopSettings::default()
    };

    let report = run_preset(
        &server,
        Preset::CouponRush,
        &settings,
        RunOverrides {
            vus: Some(40),
            iterations: Some(200),
            duration: None,
        },
    )
    .await?;

    assert_eq!(report.iterations(), 200);
    assert_eq!(report.outcome_count(OutcomeCategory::Success), 50);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedCapacity), 150);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedDuplicate), 0);
    assert_eq!(report.counter("coupon_issue_success_count"), 50);
    assert_eq!(server.shop().coupons_issued(1), 50);

    for check in &report.thresholds.results {
        if check.metric.starts_with("coupon_issue_success_count")
            || check.metric.starts_with("coupon_issue_rejected_duplicate_count")
        {
            assert!(check.passed, "{check:?}");
        }
    }
    // 150 of 200 requests are sold-out rejections, above the 50% failure budget.
    assert_eq!(report.verdict, Verdict::ThresholdsFailed);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() -> anyhow::Result<()> {
    let server = TestServer::start_with(ShopConfig::default().with_option_stock(3)).await?;

    let report = run_preset(
        &server,
        Preset::ConcurrentOrder,
        &ShopSettings::default(),
        RunOverrides {
            vus: Some(40),
            iterations: Some(40),
            duration: None,
        },
    )
    .await?;

    assert_eq!(report.iterations(), 40);
    assert_eq!(report.outcome_count(OutcomeCategory::Success), 30);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedCapacity), 10);
    assert_eq!(server.shop().orders_placed(), 30);
    for option in 1..=10 {
        assert_eq!(server.shop().stock_left(option), 0, "option {option}");
    }
    // Three requests per order: charge, cart, order.
    assert_eq!(report.counter("http_reqs"), 120);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_workload_partitions_every_iteration() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let settings = ShopSettings {
        data: TestData {
            user_count: 50,
            ..TestData::default()
        },
        coupon_quantity: None,
    };

    let report = run_preset(
        &server,
        Preset::MixedWorkload,
        &settings,
        RunOverrides {
            vus: Some(8),
            iterations: None,
            duration: Some(Duration::from_millis(800)),
        },
    )
    .await?;

    assert!(report.iterations() > 0);
    let total: u64 = report.outcome_counts().iter().map(|(_, n)| n).sum();
    assert_eq!(total, report.iterations());
    assert_eq!(report.discarded(), 0);
    assert_ne!(report.verdict, Verdict::HarnessError);
    assert_eq!(report.outcome_count(OutcomeCategory::TransportError), 0);
    assert!(report.metric("product_list_duration").is_some());

    server.shutdown().await;
    Ok(())
}
