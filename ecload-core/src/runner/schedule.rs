use std::time::Duration;

use crate::config::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Piecewise-linear concurrency target over a stage list.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    start: u64,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

struct Segment {
    index: usize,
    start: Duration,
    end: Duration,
    from: u64,
    to: u64,
}

impl RampSchedule {
    pub fn new(start: u64, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            start,
            stages,
            cumulative_ends,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    /// Segment containing `elapsed`. A boundary instant belongs to the stage it ends.
    fn segment(&self, elapsed: Duration) -> Option<Segment> {
        if self.stages.is_empty() {
            return None;
        }
        let clamped = elapsed.min(self.total_duration());
        let index = match self.cumulative_ends.binary_search(&clamped) {
            Ok(i) | Err(i) => i.min(self.stages.len() - 1),
        };
        let start = match index {
            0 => Duration::ZERO,
            i => self.cumulative_ends[i - 1],
        };
        let from = match index {
            0 => self.start,
            i => self.stages[i - 1].target,
        };
        Some(Segment {
            index,
            start,
            end: self.cumulative_ends[index],
            from,
            to: self.stages[index].target,
        })
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            return self.start;
        }
        let Some(seg) = self.segment(elapsed) else {
            return self.start;
        };
        if elapsed >= self.total_duration() {
            return seg.to;
        }

        let span = seg.end.saturating_sub(seg.start);
        if span.is_zero() {
            return seg.to;
        }

        let from = i128::from(seg.from);
        let delta = i128::from(seg.to) - from;
        let num = elapsed.saturating_sub(seg.start).as_nanos() as i128;
        let den = (span.as_nanos() as i128).max(1);

        let cur = from + delta.saturating_mul(num) / den;
        cur.clamp(0, i128::from(u64::MAX)) as u64
    }

    pub fn stage_snapshot_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        let seg = self.segment(elapsed)?;
        let clamped = elapsed.min(self.total_duration());
        let span = seg.end.saturating_sub(seg.start);
        let stage_elapsed = clamped.saturating_sub(seg.start);

        Some(StageSnapshot {
            index: seg.index,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: span.saturating_sub(stage_elapsed),
            start_target: seg.from,
            end_target: seg.to,
            current_target: self.target_at(clamped),
        })
    }

    /// How long unit `vu_index` (1-based) should idle before checking the target again.
    pub fn next_recheck_in(&self, elapsed: Duration, vu_index: u64) -> Duration {
        let default_sleep = Duration::from_millis(50);

        let Some(seg) = self.segment(elapsed) else {
            return default_sleep;
        };
        if self.is_done(elapsed) {
            return Duration::ZERO;
        }
        if vu_index <= self.target_at(elapsed) {
            return Duration::from_millis(1);
        }

        let until_stage_end = seg.end.saturating_sub(elapsed).min(default_sleep);

        // Falling or flat stages cannot reach this unit before the stage ends.
        if seg.to <= seg.from || vu_index > seg.to {
            return until_stage_end;
        }

        // Solve from + (to-from)*t/span >= vu_index for t.
        let from = i128::from(seg.from);
        let delta = i128::from(seg.to) - from;
        let want = i128::from(vu_index);
        if want <= from {
            return Duration::ZERO;
        }

        let span_ns = seg.end.saturating_sub(seg.start).as_nanos() as i128;
        let elapsed_ns = elapsed.saturating_sub(seg.start).as_nanos() as i128;
        let needed_ns = ((want - from).saturating_mul(span_ns) / delta).max(0);
        let wait_ns = needed_ns.saturating_sub(elapsed_ns).max(0);

        Duration::from_nanos(wait_ns.min(i128::from(u64::MAX)) as u64).min(default_sleep)
    }
}
