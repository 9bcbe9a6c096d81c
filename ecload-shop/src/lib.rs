//! The e-commerce side of ecload: how shop operations map onto HTTP requests, the synthetic
//! users and catalogue they act on, and the four built-in scenarios.

pub mod actions;
mod data;
pub mod endpoints;
mod presets;

pub use data::{TestData, USER_ID_KEY, UserIds};
pub use presets::{Preset, ShopSettings};
