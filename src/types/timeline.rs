//! Timeline model

use serde::{Deserialize, Serialize};

/// One fixed-width window sample of the cognitive-level timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Window center (seconds)
    pub time: f64,
    /// Blended level, 1-5
    pub level: u8,
    pub avg_level: f64,
    pub max_level: u8,
    /// Utterances overlapping the window
    pub count: usize,
    pub llm_count: usize,
    pub fallback_count: usize,
}

impl TimelinePoint {
    /// Neutral placeholder for a window no utterance overlaps
    pub fn empty(time: f64) -> Self {
        Self {
            time,
            level: 1,
            avg_level: 1.0,
            max_level: 1,
            count: 0,
            llm_count: 0,
            fallback_count: 0,
        }
    }
}
