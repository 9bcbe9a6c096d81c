use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{Error, Result};
use crate::runner::VuContext;
use crate::target::{Exchange, Target};

/// A composite operation: one or more exchanges against the target. The returned exchange is
/// the terminal one and is what gets classified.
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, vu: &mut VuContext, target: &dyn Target) -> Exchange;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ActionClass {
    Read,
    Write,
}

#[derive(Clone)]
pub struct ActionDefinition {
    pub name: String,
    /// Prefix of the per-action metrics (`<prefix>_duration`, `<prefix>_success_rate`, ...).
    pub metric_prefix: String,
    pub weight: f64,
    pub class: ActionClass,
    pub action: Arc<dyn Action>,
}

impl ActionDefinition {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        class: ActionClass,
        action: impl Action + 'static,
    ) -> Self {
        let name = name.into();
        Self {
            metric_prefix: name.clone(),
            name,
            weight,
            class,
            action: Arc::new(action),
        }
    }

    #[must_use]
    pub fn with_metric_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = prefix.into();
        self
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("metric_prefix", &self.metric_prefix)
            .field("weight", &self.weight)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Ordered, weighted set of actions. Weights are relative; they need not sum to 100.
#[derive(Debug, Clone)]
pub struct Workload {
    actions: Vec<ActionDefinition>,
    total_weight: f64,
}

impl Workload {
    pub fn new(actions: Vec<ActionDefinition>) -> Result<Self> {
        if actions.is_empty() {
            return Err(Error::EmptyWorkload);
        }
        if let Some(bad) = actions
            .iter()
            .find(|a| !a.weight.is_finite() || a.weight <= 0.0)
        {
            return Err(Error::InvalidWeight {
                name: bad.name.clone(),
                weight: bad.weight,
            });
        }

        let total_weight = actions.iter().map(|a| a.weight).sum();
        Ok(Self {
            actions,
            total_weight,
        })
    }

    /// Single-action workload with weight 1.
    pub fn single(action: ActionDefinition) -> Result<Self> {
        Self::new(vec![ActionDefinition {
            weight: 1.0,
            ..action
        }])
    }

    pub fn actions(&self) -> &[ActionDefinition] {
        &self.actions
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Index of the first action whose cumulative weight exceeds `r`, for `r` in
    /// `[0, total_weight)`. Values at or past the total fall back to the last action.
    #[must_use]
    pub fn pick_index(&self, r: f64) -> usize {
        let mut cumulative = 0.0;
        for (idx, action) in self.actions.iter().enumerate() {
            cumulative += action.weight;
            if r < cumulative {
                return idx;
            }
        }
        self.actions.len() - 1
    }

    pub fn select_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.actions.len() == 1 {
            return 0;
        }
        self.pick_index(rng.random::<f64>() * self.total_weight)
    }

    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &ActionDefinition {
        &self.actions[self.select_index(rng)]
    }
}
