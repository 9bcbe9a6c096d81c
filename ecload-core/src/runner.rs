mod control;
mod gate;
pub(crate) mod recorder;
pub(crate) mod run;
mod schedule;
mod vu;

pub use control::RunControl;
pub use gate::IterationGate;
pub use schedule::{RampSchedule, StageSnapshot};
pub use vu::VuContext;
