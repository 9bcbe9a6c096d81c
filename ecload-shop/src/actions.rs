use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ecload_core::{Action, Exchange, Target, VuContext};
use rand::Rng as _;

use crate::data::{TestData, UserIds};
use crate::endpoints;

/// Number of product pages the list action spreads over when paging is random.
const PRODUCT_PAGES: u64 = 5;

#[derive(Debug, Clone)]
pub struct ProductList {
    random_page: bool,
}

impl ProductList {
    /// Always the first page.
    pub fn first_page() -> Self {
        Self { random_page: false }
    }

    pub fn random_page() -> Self {
        Self { random_page: true }
    }
}

#[async_trait]
impl Action for ProductList {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let page = if self.random_page {
            vu.rng.random_range(0..PRODUCT_PAGES)
        } else {
            0
        };
        target.execute(endpoints::product_list(page)).await
    }
}

#[derive(Debug, Clone)]
pub struct ProductDetail {
    data: Arc<TestData>,
}

impl ProductDetail {
    pub fn new(data: Arc<TestData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Action for ProductDetail {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let id = self.data.random_product(&mut vu.rng);
        target.execute(endpoints::product_detail(id)).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PopularProducts;

#[async_trait]
impl Action for PopularProducts {
    async fn execute(&self, _vu: &mut VuContext, target: &dyn Target) -> Exchange {
        target.execute(endpoints::popular_products()).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    One,
    /// Uniform in `1..=3`.
    UpToThree,
}

#[derive(Debug, Clone)]
pub struct CartAdd {
    data: Arc<TestData>,
    users: UserIds,
    quantity: Quantity,
}

impl CartAdd {
    pub fn new(data: Arc<TestData>, users: UserIds, quantity: Quantity) -> Self {
        Self {
            data,
            users,
            quantity,
        }
    }
}

#[async_trait]
impl Action for CartAdd {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let user = self.users.next(vu, &self.data);
        let option = self.data.random_option(&mut vu.rng);
        let quantity = match self.quantity {
            Quantity::One => 1,
            Quantity::UpToThree => vu.rng.random_range(1..=3),
        };
        target
            .execute(endpoints::cart_add(user, option, quantity))
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChoice {
    Random,
    /// Each unit orders "its" option, so contention spreads evenly over the options.
    PerVu,
}

/// Charge points, put one item in the cart, optionally wait, then place the order.
///
/// Only the order exchange decides the outcome; the setup calls are still metered.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    data: Arc<TestData>,
    users: UserIds,
    charge: u64,
    option: OptionChoice,
    think_time: Duration,
}

impl OrderCreate {
    pub fn new(data: Arc<TestData>, users: UserIds, charge: u64) -> Self {
        Self {
            data,
            users,
            charge,
            option: OptionChoice::Random,
            think_time: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_option(mut self, option: OptionChoice) -> Self {
        self.option = option;
        self
    }

    #[must_use]
    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = think_time;
        self
    }
}

#[async_trait]
impl Action for OrderCreate {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let user = self.users.next(vu, &self.data);
        let option = match self.option {
            OptionChoice::Random => self.data.random_option(&mut vu.rng),
            OptionChoice::PerVu => self.data.option_for_vu(vu.id),
        };

        let charged = target.execute(endpoints::point_charge(user, self.charge)).await;
        let carted = target.execute(endpoints::cart_add(user, option, 1)).await;
        if charged.is_failed() || carted.is_failed() {
            tracing::debug!(
                vu = vu.id,
                user,
                charge_status = charged.status,
                cart_status = carted.status,
                "order setup failed"
            );
        }

        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }

        target.execute(endpoints::order_create(user)).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponChoice {
    Fixed(u64),
    /// Uniform in `1..=n`.
    Random(u64),
}

#[derive(Debug, Clone)]
pub struct CouponIssue {
    data: Arc<TestData>,
    users: UserIds,
    coupon: CouponChoice,
}

impl CouponIssue {
    pub fn new(data: Arc<TestData>, users: UserIds, coupon: CouponChoice) -> Self {
        Self {
            data,
            users,
            coupon,
        }
    }
}

#[async_trait]
impl Action for CouponIssue {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange {
        let user = self.users.next(vu, &self.data);
        let coupon = match self.coupon {
            CouponChoice::Fixed(id) => id,
            CouponChoice::Random(n) => vu.rng.random_range(1..=n.max(1)),
        };
        target.execute(endpoints::coupon_issue(coupon, user)).await
    }
}
