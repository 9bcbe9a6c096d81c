use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ecload_core::metrics::MetricValue;
use ecload_core::{
    Action, ActionClass, ActionDefinition, CancelPolicy, Exchange, Harness, OutcomeCategory,
    Pacing, RequestSpec, ScenarioConfig, ScenarioOptions, Stage, Target, ThresholdSet, Verdict,
    VuContext, Workload, scenario_from_options,
};
use parking_lot::Mutex;

/// In-process coupon counter: 409 on a repeated user, 400 once the stock is gone.
struct CouponDesk {
    capacity: u64,
    issued: Mutex<HashSet<u64>>,
    delay: Duration,
}

impl CouponDesk {
    fn new(capacity: u64) -> Self {
        Self {
            capacity,
            issued: Mutex::new(HashSet::new()),
            delay: Duration::from_millis(1),
        }
    }
}

#[async_trait]
impl Target for CouponDesk {
    async fn execute(&self, req: RequestSpec) -> Exchange {
        let started = Instant::now();
        tokio::time::sleep(self.delay).await;

        let user: u64 = req
            .path
            .rsplit('=')
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let (status, body) = {
            let mut issued = self.issued.lock();
            if issued.contains(&user) {
                (409, "coupon already issued")
            } else if issued.len() as u64 >= self.capacity {
                (400, "coupon sold out")
            } else {
                issued.insert(user);
                (200, "{\"ok\":true}")
            }
        };
        Exchange::response(status, body, started.elapsed())
    }
}

enum UserId {
    PerAdmission,
    Fixed(u64),
}

struct IssueCoupon(UserId);

#[async_trait]
impl Action for IssueCoupon {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let user = match self.0 {
            UserId::PerAdmission => vu.sequence + 1,
            UserId::Fixed(id) => id,
        };
        target
            .execute(RequestSpec::post(format!("/api/coupons/1/issue?userId={user}")))
            .await
    }
}

/// Sleeps, then succeeds. Used to keep actions in flight.
struct Slow(Duration);

#[async_trait]
impl Action for Slow {
    async fn execute(&self, _vu: &mut VuContext, target: &dyn Target) -> Exchange {
        tokio::time::sleep(self.0).await;
        target.execute(RequestSpec::get("/slow")).await
    }
}

/// Cycles through one response per outcome category.
struct Cycling {
    next: AtomicU64,
}

#[async_trait]
impl Target for Cycling {
    async fn execute(&self, _req: RequestSpec) -> Exchange {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        match n % 5 {
            0 => Exchange::response(200, "{}", Duration::from_millis(1)),
            1 => Exchange::response(409, "duplicate", Duration::from_millis(1)),
            2 => Exchange::response(400, "exhausted", Duration::from_millis(1)),
            3 => Exchange::response(503, "unavailable", Duration::from_millis(1)),
            _ => Exchange::transport_failure(
                ecload_core::HttpTransportErrorKind::Connect,
                Duration::from_millis(1),
            ),
        }
    }
}

struct Hit;

#[async_trait]
impl Action for Hit {
    async fn execute(&self, _vu: &mut VuContext, target: &dyn Target) -> Exchange {
        target.execute(RequestSpec::get("/")).await
    }
}

struct PanicOnThird;

#[async_trait]
impl Action for PanicOnThird {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        if vu.sequence == 2 {
            panic!("action blew up");
        }
        target.execute(RequestSpec::get("/")).await
    }
}

fn fixed(vus: u64, iterations: u64) -> ScenarioOptions {
    ScenarioOptions {
        executor: Some("fixed-iterations".to_string()),
        vus: Some(vus),
        iterations: Some(iterations),
        seed: Some(7),
        ..ScenarioOptions::default()
    }
}

fn config(opts: ScenarioOptions) -> ScenarioConfig {
    scenario_from_options("test", opts).unwrap_or_else(|e| panic!("invalid config: {e}"))
}

fn single(name: &str, class: ActionClass, action: impl Action + 'static) -> Workload {
    Workload::single(ActionDefinition::new(name, 1.0, class, action))
        .unwrap_or_else(|e| panic!("{e}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fixed_iterations_executes_exactly_the_budget() {
    let harness = Harness::new(
        config(fixed(50, 500)),
        single("coupon_issue", ActionClass::Write, IssueCoupon(UserId::PerAdmission)),
        CouponDesk::new(10_000),
    );

    let report = harness.run().await.unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(report.iterations(), 500);
    assert_eq!(report.outcome_count(OutcomeCategory::Success), 500);
    assert_eq!(report.counter("http_reqs"), 500);
    assert_eq!(report.counter("coupon_issue_success_count"), 500);
    assert_eq!(report.verdict, Verdict::Passed);
    assert!(!report.aborted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_bounded_issuance_grants_exactly_k() {
    let (k, m) = (50, 200);
    let mut opts = fixed(40, m);
    opts.thresholds = vec![
        ThresholdSet::new("coupon_issue_success_count", [format!("count<={k}")]),
        ThresholdSet::new("coupon_issue_rejected_duplicate_count", ["count==0"]),
    ];

    let report = Harness::new(
        config(opts),
        single("coupon_issue", ActionClass::Write, IssueCoupon(UserId::PerAdmission)),
        CouponDesk::new(k),
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(report.outcome_count(OutcomeCategory::Success), k);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedCapacity), m - k);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedDuplicate), 0);
    assert!(report.thresholds.passed());
    assert_eq!(report.verdict, Verdict::Passed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_identity_twice_yields_one_success_and_one_duplicate() {
    let report = Harness::new(
        config(fixed(2, 2)),
        single("coupon_issue", ActionClass::Write, IssueCoupon(UserId::Fixed(7))),
        CouponDesk::new(10),
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(report.outcome_count(OutcomeCategory::Success), 1);
    assert_eq!(report.outcome_count(OutcomeCategory::RejectedDuplicate), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_invocation_lands_in_exactly_one_category() {
    let report = Harness::new(
        config(fixed(8, 100)),
        single("mixed", ActionClass::Read, Hit),
        Cycling {
            next: AtomicU64::new(0),
        },
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    let counts = report.outcome_counts();
    assert!(counts.iter().all(|(_, n)| *n == 20), "{counts:?}");
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    assert_eq!(total, report.iterations());
    assert_eq!(report.counter("http_transport_errors"), 20);

    match report.metric("http_req_failed").map(|m| &m.value) {
        Some(MetricValue::Rate { total, hits, .. }) => {
            assert_eq!(*total, 100);
            assert_eq!(*hits, 80);
        }
        other => panic!("expected http_req_failed rate, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_threshold_fails_the_verdict() {
    let mut opts = fixed(2, 10);
    opts.thresholds = vec![ThresholdSet::new("action_success_rate", ["rate>0.99"])];

    let report = Harness::new(
        config(opts),
        single("mixed", ActionClass::Read, Hit),
        Cycling {
            next: AtomicU64::new(0),
        },
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(report.verdict, Verdict::ThresholdsFailed);
    assert_eq!(report.thresholds.violations().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn discard_policy_drops_in_flight_actions_on_abort() {
    let opts = ScenarioOptions {
        executor: Some("constant-concurrency".to_string()),
        vus: Some(4),
        duration: Some(Duration::from_secs(60)),
        cancel_policy: Some(CancelPolicy::Discard),
        ..ScenarioOptions::default()
    };
    let harness = Harness::new(
        config(opts),
        single("slow", ActionClass::Read, Slow(Duration::from_secs(30))),
        CouponDesk::new(10),
    );

    let control = harness.control();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        control.abort();
    });

    let started = Instant::now();
    let report = harness.run().await.unwrap_or_else(|e| panic!("{e}"));

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(report.aborted);
    assert_eq!(report.iterations(), 4);
    assert_eq!(report.discarded(), 4);
    assert_eq!(report.outcome_counts().iter().map(|(_, n)| n).sum::<u64>(), 0);
    assert!(report.harness_errors.is_empty(), "{:?}", report.harness_errors);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drain_policy_records_in_flight_actions_on_abort() {
    let opts = ScenarioOptions {
        executor: Some("constant-concurrency".to_string()),
        vus: Some(4),
        duration: Some(Duration::from_secs(60)),
        cancel_policy: Some(CancelPolicy::Drain),
        ..ScenarioOptions::default()
    };
    let harness = Harness::new(
        config(opts),
        single("slow", ActionClass::Read, Slow(Duration::from_millis(300))),
        CouponDesk::new(10),
    );

    let control = harness.control();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        control.abort();
    });

    let report = harness.run().await.unwrap_or_else(|e| panic!("{e}"));

    assert!(report.aborted);
    assert_eq!(report.discarded(), 0);
    assert_eq!(report.iterations(), 4);
    assert_eq!(report.outcome_count(OutcomeCategory::Success), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn staged_ramp_follows_the_stage_targets() {
    let opts = ScenarioOptions {
        executor: Some("staged-ramp".to_string()),
        start_vus: Some(0),
        stages: Some(vec![
            Stage::new(Duration::from_millis(300), 4),
            Stage::new(Duration::from_millis(300), 4),
            Stage::new(Duration::from_millis(200), 0),
        ]),
        pacing: Some(Pacing::fixed(Duration::from_millis(5))),
        ..ScenarioOptions::default()
    };

    let started = Instant::now();
    let report = Harness::new(
        config(opts),
        single("product_list", ActionClass::Read, Slow(Duration::from_millis(5))),
        CouponDesk::new(10),
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    assert!(started.elapsed() >= Duration::from_millis(800));
    assert!(report.iterations() > 0);
    assert_eq!(report.verdict, Verdict::Passed);

    match report.metric("vus_max").map(|m| &m.value) {
        Some(MetricValue::Gauge { value, .. }) => assert_eq!(*value, 4),
        other => panic!("expected vus_max gauge, got {other:?}"),
    }
    match report.metric("vus").map(|m| &m.value) {
        Some(MetricValue::Gauge { value, peak }) => {
            assert_eq!(*value, 0);
            assert_eq!(*peak, 4);
        }
        other => panic!("expected vus gauge, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_unit_is_a_harness_error() {
    let report = Harness::new(
        config(fixed(2, 20)),
        single("boom", ActionClass::Read, PanicOnThird),
        CouponDesk::new(10),
    )
    .run()
    .await
    .unwrap_or_else(|e| panic!("{e}"));

    assert_eq!(report.verdict, Verdict::HarnessError);
    assert!(!report.harness_errors.is_empty());
    assert!(!report.aborted);
}

#[tokio::test]
async fn seeded_runs_pick_the_same_actions() {
    let run = || async {
        let workload = Workload::new(vec![
            ActionDefinition::new("a", 70.0, ActionClass::Read, Hit),
            ActionDefinition::new("b", 30.0, ActionClass::Write, Hit),
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        let report = Harness::new(config(fixed(1, 200)), workload, CouponDesk::new(1))
            .run()
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        (
            report.counter("a_success_count") + report.counter("a_rejected_duplicate_count"),
            report.iterations(),
        )
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first, second);
    assert_eq!(first.1, 200);
}
