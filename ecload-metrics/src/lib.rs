mod error;
pub mod metrics;
pub mod registry;
pub mod snapshot;

pub use error::{Error, Result};
pub use metrics::{Counter, DurationSeries, Gauge, MetricHandle, MetricKind, Rate};
pub use registry::Registry;
pub use snapshot::{DurationSnapshot, DurationSummary, MetricSnapshot, MetricValue};
