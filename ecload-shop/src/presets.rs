use std::sync::Arc;
use std::time::Duration;

use ecload_core::{
    ActionClass, ActionDefinition, Pacing, ScenarioOptions, Stage, ThresholdSet, Workload,
};

use crate::actions::{
    CartAdd, CouponChoice, CouponIssue, OptionChoice, OrderCreate, PopularProducts, ProductDetail,
    ProductList, Quantity,
};
use crate::data::{TestData, UserIds};

/// Externally supplied knobs the presets read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShopSettings {
    pub data: TestData,
    /// Known stock of the rushed coupon. Enables the exact-issuance checks.
    pub coupon_quantity: Option<u64>,
}

/// The built-in scenarios.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Preset {
    /// Many users ordering the same small set of options at once.
    ConcurrentOrder,
    /// First-come coupon issuance against a limited quantity.
    CouponRush,
    /// Read-heavy traffic mix at constant concurrency.
    MixedWorkload,
    /// Stepwise ramp to find the breaking point.
    StressRamp,
}

const MINUTE: Duration = Duration::from_secs(60);

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::ConcurrentOrder,
        Preset::CouponRush,
        Preset::MixedWorkload,
        Preset::StressRamp,
    ];

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ConcurrentOrder => "concurrent orders on shared stock; checks for overselling",
            Self::CouponRush => "first-come coupon issuance; checks exact-N issuance and duplicates",
            Self::MixedWorkload => "70% reads, 25% writes, 5% coupon events at constant concurrency",
            Self::StressRamp => "staged ramp up to 500 users to find the saturation point",
        }
    }

    /// Default scenario options, thresholds included. Lower layers of configuration.
    pub fn options(self, settings: &ShopSettings) -> ScenarioOptions {
        match self {
            Self::ConcurrentOrder => ScenarioOptions {
                executor: Some("fixed-iterations".to_string()),
                vus: Some(100),
                iterations: Some(100),
                duration: Some(5 * MINUTE),
                pacing: Some(Pacing::fixed(Duration::from_millis(500))),
                thresholds: vec![
                    ThresholdSet::new("order_create_duration", ["p(95)<2000"]),
                    ThresholdSet::new("order_create_success_rate", ["rate>0.8"]),
                    ThresholdSet::new("http_req_failed", ["rate<0.2"]),
                ],
                ..ScenarioOptions::default()
            },
            Self::CouponRush => {
                let mut thresholds = vec![
                    ThresholdSet::new("coupon_issue_duration", ["p(95)<1000", "p(99)<2000"]),
                    ThresholdSet::new("http_req_failed", ["rate<0.5"]),
                ];
                if let Some(k) = settings.coupon_quantity {
                    thresholds.push(ThresholdSet::new(
                        "coupon_issue_success_count",
                        [format!("count<={k}")],
                    ));
                    thresholds.push(ThresholdSet::new(
                        "coupon_issue_rejected_duplicate_count",
                        ["count==0"],
                    ));
                }
                ScenarioOptions {
                    executor: Some("fixed-iterations".to_string()),
                    vus: Some(500),
                    iterations: Some(1000),
                    duration: Some(3 * MINUTE),
                    pacing: Some(Pacing::fixed(Duration::from_millis(10))),
                    thresholds,
                    ..ScenarioOptions::default()
                }
            }
            Self::MixedWorkload => ScenarioOptions {
                executor: Some("constant-concurrency".to_string()),
                vus: Some(100),
                duration: Some(10 * MINUTE),
                pacing: Some(Pacing::between(
                    Duration::from_millis(500),
                    Duration::from_millis(2500),
                )),
                thresholds: vec![
                    ThresholdSet::new("product_list_duration", ["p(95)<300"]),
                    ThresholdSet::new("product_detail_duration", ["p(95)<200"]),
                    ThresholdSet::new("popular_product_duration", ["p(95)<150"]),
                    ThresholdSet::new("cart_add_duration", ["p(95)<500"]),
                    ThresholdSet::new("order_create_duration", ["p(95)<2000"]),
                    ThresholdSet::new("action_success_rate", ["rate>0.95"]),
                    ThresholdSet::new("read_success_rate", ["rate>0.99"]),
                    ThresholdSet::new("http_req_failed", ["rate<0.05"]),
                ],
                ..ScenarioOptions::default()
            },
            Self::StressRamp => ScenarioOptions {
                executor: Some("staged-ramp".to_string()),
                start_vus: Some(0),
                stages: Some(vec![
                    Stage::new(2 * MINUTE, 50),
                    Stage::new(2 * MINUTE, 100),
                    Stage::new(2 * MINUTE, 200),
                    Stage::new(2 * MINUTE, 300),
                    Stage::new(2 * MINUTE, 400),
                    Stage::new(2 * MINUTE, 500),
                    Stage::new(3 * MINUTE, 500),
                    Stage::new(2 * MINUTE, 0),
                ]),
                pacing: Some(Pacing::between(
                    Duration::from_millis(100),
                    Duration::from_millis(600),
                )),
                thresholds: vec![
                    ThresholdSet::new("action_duration", ["p(95)<3000", "p(99)<5000"]),
                    ThresholdSet::new("error_rate", ["rate<0.3"]),
                    ThresholdSet::new("http_req_duration", ["p(95)<3000"]),
                ],
                ..ScenarioOptions::default()
            },
        }
    }

    pub fn workload(self, settings: &ShopSettings) -> ecload_core::Result<Workload> {
        let data = Arc::new(settings.data.clone());
        match self {
            Self::ConcurrentOrder => Workload::single(order_create(
                1.0,
                OrderCreate::new(data, UserIds::Pooled { pool: 200 }, 1_000_000)
                    .with_option(OptionChoice::PerVu)
                    .with_think_time(Duration::from_millis(100)),
            )),
            Self::CouponRush => {
                let coupon = CouponChoice::Fixed(settings.data.coupon_id);
                Workload::single(coupon_issue(
                    1.0,
                    CouponIssue::new(data, UserIds::PerAdmission, coupon),
                ))
            }
            Self::MixedWorkload => Workload::new(vec![
                product_list(40.0, ProductList::random_page()),
                product_detail(20.0, ProductDetail::new(data.clone())),
                ActionDefinition::new("popular_products", 10.0, ActionClass::Read, PopularProducts)
                    .with_metric_prefix("popular_product"),
                cart_add(
                    15.0,
                    CartAdd::new(data.clone(), UserIds::Random, Quantity::UpToThree),
                ),
                order_create(10.0, OrderCreate::new(data.clone(), UserIds::Random, 500_000)),
                coupon_issue(
                    5.0,
                    CouponIssue::new(data, UserIds::Random, CouponChoice::Random(5)),
                ),
            ]),
            Self::StressRamp => Workload::new(vec![
                product_list(50.0, ProductList::first_page()),
                product_detail(30.0, ProductDetail::new(data.clone())),
                cart_add(
                    15.0,
                    CartAdd::new(data.clone(), UserIds::PerIteration, Quantity::One),
                ),
                order_create(5.0, OrderCreate::new(data, UserIds::PerIteration, 500_000)),
            ]),
        }
    }
}

fn product_list(weight: f64, action: ProductList) -> ActionDefinition {
    ActionDefinition::new("product_list", weight, ActionClass::Read, action)
}

fn product_detail(weight: f64, action: ProductDetail) -> ActionDefinition {
    ActionDefinition::new("product_detail", weight, ActionClass::Read, action)
}

fn cart_add(weight: f64, action: CartAdd) -> ActionDefinition {
    ActionDefinition::new("cart_add", weight, ActionClass::Write, action)
}

fn order_create(weight: f64, action: OrderCreate) -> ActionDefinition {
    ActionDefinition::new("order_create", weight, ActionClass::Write, action)
}

fn coupon_issue(weight: f64, action: CouponIssue) -> ActionDefinition {
    ActionDefinition::new("coupon_issue", weight, ActionClass::Write, action)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use ecload_core::{ConcurrencyKind, RunOverrides, scenario_from_options};

    use super::*;

    #[test]
    fn names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(Preset::from_str(preset.name()).ok(), Some(preset));
        }
        assert_eq!(Preset::CouponRush.to_string(), "coupon-rush");
    }

    #[test]
    fn every_preset_validates() {
        let settings = ShopSettings::default();
        for preset in Preset::ALL {
            let cfg = scenario_from_options(preset.name(), preset.options(&settings))
                .unwrap_or_else(|e| panic!("{preset}: {e}"));
            assert!(!cfg.thresholds.is_empty());
            assert!(preset.workload(&settings).is_ok(), "{preset}");
        }
    }

    #[test]
    fn stress_ramp_peaks_at_500_over_seventeen_minutes() {
        let cfg = scenario_from_options(
            "stress-ramp",
            Preset::StressRamp.options(&ShopSettings::default()),
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cfg.model.kind(), ConcurrencyKind::StagedRamp);
        assert_eq!(cfg.max_vus(), 500);
        assert_eq!(cfg.duration, Some(17 * MINUTE));
    }

    #[test]
    fn stress_ramp_with_a_vus_override_runs_flat_for_the_ramp_length() {
        let opts = Preset::StressRamp
            .options(&ShopSettings::default())
            .with_overrides(RunOverrides {
                vus: Some(100),
                ..RunOverrides::default()
            });
        let cfg = scenario_from_options("stress-ramp", opts).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cfg.model.kind(), ConcurrencyKind::ConstantConcurrency);
        assert_eq!(cfg.max_vus(), 100);
        assert_eq!(cfg.duration, Some(17 * MINUTE));
    }

    #[test]
    fn coupon_quantity_adds_exact_issuance_checks() {
        let without = Preset::CouponRush.options(&ShopSettings::default());
        let with = Preset::CouponRush.options(&ShopSettings {
            coupon_quantity: Some(100),
            ..ShopSettings::default()
        });
        assert_eq!(with.thresholds.len(), without.thresholds.len() + 2);
        assert!(
            with.thresholds
                .iter()
                .any(|t| t.metric == "coupon_issue_success_count"
                    && t.expressions == ["count<=100"])
        );
    }

    #[test]
    fn mixed_workload_weights() {
        let workload = Preset::MixedWorkload
            .workload(&ShopSettings::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(workload.total_weight(), 100.0);
        let prefixes: Vec<_> = workload
            .actions()
            .iter()
            .map(|a| a.metric_prefix.as_str())
            .collect();
        assert_eq!(
            prefixes,
            [
                "product_list",
                "product_detail",
                "popular_product",
                "cart_add",
                "order_create",
                "coupon_issue",
            ]
        );
    }
}
