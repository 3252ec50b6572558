//! Timeline aggregator: fixed-interval cognitive-level sampling
//!
//! Samples the utterance stream with windows of width W centered at
//! 0, W, 2W, ... up to at least the last utterance's end. Each window blends
//! the average and maximum level of the utterances overlapping it. Windows
//! are never dropped: an empty window emits a neutral level-1 placeholder so
//! the timeline stays gap-free and evenly spaced.

use crate::core::round2;
use crate::types::{LevelSource, TimelinePoint, Utterance};
use crate::{BLEND_WEIGHT_AVG, BLEND_WEIGHT_MAX, DEFAULT_WINDOW_SECS, LEVEL_MAX, LEVEL_MIN, MIN_DENOMINATOR};

/// Windowed cognitive-level timeline builder
#[derive(Debug, Clone, Copy)]
pub struct TimelineAggregator {
    window_secs: f64,
}

impl Default for TimelineAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

impl TimelineAggregator {
    /// Create an aggregator with the given window width (seconds).
    /// Widths at or below zero are floored to a tiny positive value.
    pub fn new(window_secs: f64) -> Self {
        Self {
            window_secs: window_secs.max(MIN_DENOMINATOR),
        }
    }

    /// Configured window width in seconds
    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Build the level timeline for an utterance list.
    /// Returns an empty timeline for an empty list.
    pub fn level_timeline(&self, utterances: &[Utterance]) -> Vec<TimelinePoint> {
        if utterances.is_empty() {
            return Vec::new();
        }

        let mut sorted: Vec<&Utterance> = utterances.iter().collect();
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

        let half = self.window_secs / 2.0;
        let last_end = sorted[sorted.len() - 1].end;
        // Centers run while center <= max(last_end, W), so trailing
        // low-engagement time is never silently truncated.
        let limit = last_end.max(self.window_secs);

        let mut out = Vec::new();
        let mut i: usize = 0;
        loop {
            let center = i as f64 * self.window_secs;
            if center > limit {
                break;
            }
            out.push(self.sample_window(center, half, &sorted));
            i += 1;
        }
        out
    }

    /// Sample one window centered at `center`
    fn sample_window(&self, center: f64, half: f64, sorted: &[&Utterance]) -> TimelinePoint {
        let window_start = (center - half).max(0.0);
        let window_end = center + half;

        let mut count = 0;
        let mut level_sum = 0.0;
        let mut max_level: u8 = 0;
        let mut llm_count = 0;
        let mut fallback_count = 0;

        for utt in sorted {
            // Inclusive-boundary overlap, not strict containment.
            if utt.end < window_start || utt.start > window_end {
                continue;
            }
            count += 1;
            level_sum += utt.iam_level as f64;
            max_level = max_level.max(utt.iam_level);
            match utt.iam_level_source {
                LevelSource::Llm => llm_count += 1,
                LevelSource::Fallback => fallback_count += 1,
            }
        }

        if count == 0 {
            return TimelinePoint::empty(center);
        }

        let avg = level_sum / count as f64;
        let blended = BLEND_WEIGHT_AVG * avg + BLEND_WEIGHT_MAX * max_level as f64;
        let level = (blended.round() as i64).clamp(LEVEL_MIN as i64, LEVEL_MAX as i64) as u8;

        TimelinePoint {
            time: center,
            level,
            avg_level: round2(avg),
            max_level,
            count,
            llm_count,
            fallback_count,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
