//! Core types for ClassPulse

mod episode;
mod report;
mod timeline;
mod utterance;

pub use episode::{DiscourseAnalysis, DiscourseSummary, Episode, EpisodeStatus, GeneralSegment, StageCounts};
pub use report::{format_duration, CoachReport, MetricsReport, OhcrCounts};
pub(crate) use report::{
    stage_context, CHALLENGE_PROMPT, HYPOTHESIS_PROMPT, OBSERVE_PROMPT, RESOLVE_PROMPT,
};
pub use timeline::TimelinePoint;
pub use utterance::{LevelSource, OhcrLabel, RawUtterance, Role, Utterance};
