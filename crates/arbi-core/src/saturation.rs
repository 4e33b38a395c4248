//! Time-weighted live-enemy histogram.
//!
//! Consecutive live-count samples form segments: "for `dur` seconds the live
//! count was `val`". Segments are clipped to the mission window, dropped when
//! they are implausibly long or fall in a pause, then credited to buckets.

use serde::{Deserialize, Serialize};

use crate::config::SaturationConfig;
use crate::session::{LiveSample, PauseInterval};

/// For `dur` seconds, the live enemy count was `val`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaturationSegment {
    pub val: u32,
    pub dur: f64,
}

/// Bucketed saturation plus the raw segments behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saturation {
    pub step: u32,
    pub max: u32,
    /// Seconds credited to each bucket; the last bucket is open-ended.
    pub buckets: Vec<f64>,
    pub segments: Vec<SaturationSegment>,
}

impl Saturation {
    fn empty(config: &SaturationConfig) -> Self {
        Self {
            step: config.step(),
            max: config.max,
            buckets: vec![0.0; config.top_bucket() + 1],
            segments: Vec::new(),
        }
    }

    /// Seconds accounted for across all buckets.
    pub fn total_secs(&self) -> f64 {
        self.buckets.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Share of accounted time spent in each bucket, 0-100.
    ///
    /// Empty when no segment was credited.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total_secs();
        if total <= 0.0 {
            return Vec::new();
        }
        self.buckets.iter().map(|secs| secs / total * 100.0).collect()
    }

    /// Label for a bucket index, e.g. `"5-9"` or `"50+"`.
    pub fn label(&self, index: usize) -> String {
        let low = u32::try_from(index).unwrap_or(u32::MAX).saturating_mul(self.step);
        if index + 1 >= self.buckets.len() {
            format!("{low}+")
        } else {
            format!("{low}-{}", low + self.step - 1)
        }
    }

    /// Percentage of accounted time with at least `threshold` live enemies.
    pub fn percent_at_least(&self, threshold: u32) -> f64 {
        let total: f64 = self.segments.iter().map(|s| s.dur).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let above: f64 = self
            .segments
            .iter()
            .filter(|s| s.val >= threshold)
            .map(|s| s.dur)
            .sum();
        above / total * 100.0
    }
}

/// Builds the saturation histogram for the window `[start, end]`.
pub fn bucketize(
    samples: &[LiveSample],
    pauses: &[PauseInterval],
    start: f64,
    end: f64,
    config: &SaturationConfig,
) -> Saturation {
    let mut saturation = Saturation::empty(config);

    for pair in samples.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        let seg_start = current.t.max(start);
        let seg_end = next.t.min(end);
        let dur = seg_end - seg_start;

        if dur <= 0.0 || dur > config.max_gap_secs {
            continue;
        }
        if pauses.iter().any(|p| p.overlaps(seg_start, seg_end)) {
            continue;
        }

        saturation.buckets[config.bucket_for(current.val)] += dur;
        saturation.segments.push(SaturationSegment {
            val: current.val,
            dur,
        });
    }

    saturation
}
