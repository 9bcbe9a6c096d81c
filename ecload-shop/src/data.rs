use ecload_core::VuContext;
use rand::Rng;

/// Key of the current iteration's synthetic user id in [`VuContext::state`].
pub const USER_ID_KEY: &str = "user_id";

/// Synthetic catalogue and identity space the actions draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestData {
    pub product_ids: Vec<u64>,
    pub option_ids: Vec<u64>,
    /// Upper bound of randomly drawn user ids.
    pub user_count: u64,
    pub coupon_id: u64,
}

impl Default for TestData {
    fn default() -> Self {
        Self {
            product_ids: (1..=5).collect(),
            option_ids: (1..=10).collect(),
            user_count: 1000,
            coupon_id: 1,
        }
    }
}

impl TestData {
    pub fn random_product<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        pick(&self.product_ids, rng)
    }

    pub fn random_option<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        pick(&self.option_ids, rng)
    }

    /// Option assigned to a unit when every unit orders its own option, cycling through the list.
    pub fn option_for_vu(&self, vu: u64) -> u64 {
        if self.option_ids.is_empty() {
            return 1;
        }
        let len = self.option_ids.len() as u64;
        let idx = usize::try_from(vu.saturating_sub(1) % len).unwrap_or(0);
        self.option_ids[idx]
    }
}

fn pick<R: Rng + ?Sized>(ids: &[u64], rng: &mut R) -> u64 {
    if ids.is_empty() {
        return 1;
    }
    ids[rng.random_range(0..ids.len())]
}

/// How an iteration derives the user it acts for.
///
/// Every strategy except `Random` keeps ids of different units and iterations apart, so
/// identity collisions only happen when a scenario wants them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIds {
    /// `rand(1..=user_count) + vu * 1000 + iteration * 10`.
    Random,
    /// `vu * 10000 + iteration`.
    PerIteration,
    /// `sequence + 1`, unique across the whole run.
    PerAdmission,
    /// One of `pool` users per unit, shifted by `pool` every iteration.
    Pooled { pool: u64 },
}

impl UserIds {
    pub fn next(self, vu: &mut VuContext, data: &TestData) -> u64 {
        let id = match self {
            Self::Random => {
                let base = vu.rng.random_range(1..=data.user_count.max(1));
                base + vu.id * 1000 + vu.iteration * 10
            }
            Self::PerIteration => vu.id * 10_000 + vu.iteration,
            Self::PerAdmission => vu.sequence + 1,
            Self::Pooled { pool } => {
                let pool = pool.max(1);
                ((vu.id - 1) % pool) + 1 + vu.iteration * pool
            }
        };
        vu.state.insert(USER_ID_KEY, id);
        id
    }
}
