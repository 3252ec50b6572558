//! ClassPulse: classroom discourse analytics engine
//!
//! Takes a labeled utterance stream (OHCR discourse moves + cognitive levels)
//! and produces episode segmentation, a cognitive-level timeline,
//! participation statistics and aggregate quality scores.

pub mod core;
pub mod types;

// =============================================================================
// STAGE MODEL
// =============================================================================

/// Number of OHCR stages (Observe, Hypothesize, Challenge, Resolve)
pub const STAGE_COUNT: usize = 4;

// =============================================================================
// EPISODE QUALITY WEIGHTS - blend must stay within [0, 1]
// =============================================================================

/// Weight of stage coverage in the episode quality score
pub const QUALITY_WEIGHT_COVERAGE: f64 = 0.45;

/// Weight of mean label confidence in the episode quality score
pub const QUALITY_WEIGHT_CONFIDENCE: f64 = 0.40;

/// Weight of flow (order/skip violations) in the episode quality score
pub const QUALITY_WEIGHT_FLOW: f64 = 0.15;

// =============================================================================
// TIMELINE
// =============================================================================

/// Default timeline window width (seconds)
pub const DEFAULT_WINDOW_SECS: f64 = 20.0;

/// Weight of the window's average level in the blended level
pub const BLEND_WEIGHT_AVG: f64 = 0.6;

/// Weight of the window's maximum level in the blended level
pub const BLEND_WEIGHT_MAX: f64 = 0.4;

/// Lowest cognitive level
pub const LEVEL_MIN: u8 = 1;

/// Highest cognitive level
pub const LEVEL_MAX: u8 = 5;

/// Level assigned when the labeler supplied none
pub const FALLBACK_LEVEL: u8 = 1;

/// Windows at or above this level count as beneficial class time
pub const BENEFICIAL_LEVEL: u8 = 3;

// =============================================================================
// COMPOSER
// =============================================================================

/// How many utterances after a Challenge may contain its Resolve
pub const CHALLENGE_LOOKAHEAD: usize = 3;

/// Floor for ratio denominators
pub const MIN_DENOMINATOR: f64 = 1e-9;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
