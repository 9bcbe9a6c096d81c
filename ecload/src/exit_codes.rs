use ecload_core::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Invalid CLI/config/options (bad flags, invalid durations, invalid thresholds syntax, etc.).
    InvalidInput = 30,

    /// The harness broke its own guarantees (unit panic, outcome partition mismatch).
    HarnessError = 40,

    /// Runtime error outside the harness (IO errors writing results).
    RuntimeError = 41,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => Self::Success,
            Verdict::ThresholdsFailed => Self::ThresholdsFailed,
            Verdict::HarnessError => Self::HarnessError,
        }
    }
}
