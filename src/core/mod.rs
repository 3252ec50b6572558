//! Core engine for ClassPulse

pub mod cache;
pub mod composer;
pub mod segmenter;
pub mod timeline;

pub use cache::{CacheError, ComputeCache};
pub use composer::MetricsComposer;
pub use segmenter::EpisodeSegmenter;
pub use timeline::TimelineAggregator;

/// Round to 3 decimals, the precision reported metrics are stored at
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Round to 2 decimals, used for per-window averages
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
