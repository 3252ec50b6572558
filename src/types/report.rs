//! Report structures
//!
//! `MetricsReport` is the engine's single output: everything the frontend
//! needs to render a session, assembled by the composer.

use serde::{Deserialize, Serialize};

use crate::types::{DiscourseAnalysis, OhcrLabel, TimelinePoint};

/// Per-label utterance tally, including unlabeled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OhcrCounts {
    #[serde(rename = "O")]
    pub o: usize,
    #[serde(rename = "H")]
    pub h: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "R")]
    pub r: usize,
    #[serde(rename = "None")]
    pub none: usize,
}

impl OhcrCounts {
    /// Bump the tally for a label
    pub fn increment(&mut self, label: OhcrLabel) {
        match label {
            OhcrLabel::O => self.o += 1,
            OhcrLabel::H => self.h += 1,
            OhcrLabel::C => self.c += 1,
            OhcrLabel::R => self.r += 1,
            OhcrLabel::None => self.none += 1,
        }
    }
}

/// External coach-report structure; only `topics` is read here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachReport {
    #[serde(default)]
    pub topics: Vec<serde_json::Value>,
}

impl CoachReport {
    /// Topics filtered to string entries, passed through verbatim
    pub fn string_topics(&self) -> Vec<String> {
        self.topics
            .iter()
            .filter_map(|t| t.as_str().map(str::to_owned))
            .collect()
    }
}

/// The full metrics report for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub ohcr_counts: OhcrCounts,
    pub challenge_resolve_rate: f64,
    pub resolution_density_per_min: f64,
    pub teacher_talk_pct: f64,
    pub student_talk_pct: f64,
    pub avg_teacher_turn: f64,
    pub avg_student_turn: f64,
    pub beneficial_duration_pct: f64,
    pub kcs_score: f64,
    pub timeline: Vec<TimelinePoint>,
    pub discourse_analysis: DiscourseAnalysis,
    pub class_duration_sec: f64,
    pub class_duration_formatted: String,
    pub interaction_count: usize,
    pub subtopic_count: usize,
    pub teacher_question_count: usize,
    pub student_question_count: usize,
    pub topics: Vec<String>,
    pub observe_count: usize,
    pub hypothesis_count: usize,
    pub challenge_count: usize,
    pub resolution_count: usize,
    pub observe_context: String,
    pub hypothesis_context: String,
    pub challenge_context: String,
    pub resolution_context: String,
}

impl MetricsReport {
    /// The fixed zero-valued report for an empty utterance list.
    /// `kcs_score` floors at 1.0, the neutral level, not 0.
    pub fn empty() -> Self {
        Self {
            ohcr_counts: OhcrCounts::default(),
            challenge_resolve_rate: 0.0,
            resolution_density_per_min: 0.0,
            teacher_talk_pct: 0.0,
            student_talk_pct: 0.0,
            avg_teacher_turn: 0.0,
            avg_student_turn: 0.0,
            beneficial_duration_pct: 0.0,
            kcs_score: 1.0,
            timeline: Vec::new(),
            discourse_analysis: DiscourseAnalysis::default(),
            class_duration_sec: 0.0,
            class_duration_formatted: "0s".to_string(),
            interaction_count: 0,
            subtopic_count: 0,
            teacher_question_count: 0,
            student_question_count: 0,
            topics: Vec::new(),
            observe_count: 0,
            hypothesis_count: 0,
            challenge_count: 0,
            resolution_count: 0,
            observe_context: stage_context(0, OBSERVE_PROMPT),
            hypothesis_context: stage_context(0, HYPOTHESIS_PROMPT),
            challenge_context: stage_context(0, CHALLENGE_PROMPT),
            resolution_context: stage_context(0, RESOLVE_PROMPT),
        }
    }
}

// =============================================================================
// STAGE CONTEXT PROMPTS
// =============================================================================

pub(crate) const OBSERVE_PROMPT: &str =
    "\u{201c}What do we notice?\u{201d} Highlight concrete evidence before moving forward.";
pub(crate) const HYPOTHESIS_PROMPT: &str =
    "\u{201c}What could explain the observation?\u{201d} Encourage learners to voice emerging theories.";
pub(crate) const CHALLENGE_PROMPT: &str =
    "\u{201c}Does this hypothesis hold up?\u{201d} Invite critique and stress-testing of ideas.";
pub(crate) const RESOLVE_PROMPT: &str =
    "\u{201c}What have we learned?\u{201d} Synthesize takeaways and close the loop together.";

/// Combine a move count with a stage's pedagogical prompt
pub(crate) fn stage_context(count: usize, prompt: &str) -> String {
    if count == 0 {
        return format!("0 moves \u{2022} {}", prompt);
    }
    let label = if count == 1 { "move" } else { "moves" };
    format!("{} {} \u{2022} {}", count, label, prompt)
}

/// Render a duration as "1h 2m 3s", omitting zero leading units.
/// Zero or negative spans render as "0s".
pub fn format_duration(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0s".to_string();
    }
    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_units() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(-5.0), "0s");
        assert_eq!(format_duration(3.0), "3s");
        assert_eq!(format_duration(60.0), "1m");
        assert_eq!(format_duration(61.0), "1m 1s");
        assert_eq!(format_duration(3600.0), "1h");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
        assert_eq!(format_duration(3600.0 + 5.0), "1h 5s");
    }

    #[test]
    fn test_format_duration_rounds_to_whole_seconds() {
        assert_eq!(format_duration(59.6), "1m");
        assert_eq!(format_duration(0.4), "0s");
    }

    #[test]
    fn test_stage_context_pluralization() {
        let one = stage_context(1, OBSERVE_PROMPT);
        assert!(one.starts_with("1 move \u{2022}"));
        let many = stage_context(3, OBSERVE_PROMPT);
        assert!(many.starts_with("3 moves \u{2022}"));
        let zero = stage_context(0, OBSERVE_PROMPT);
        assert!(zero.starts_with("0 moves \u{2022}"));
    }

    #[test]
    fn test_string_topics_filters_non_strings() {
        let report: CoachReport = serde_json::from_str(
            r#"{"topics": ["fractions", 7, {"x": 1}, "ratios"], "strengths": []}"#,
        )
        .unwrap();
        assert_eq!(report.string_topics(), vec!["fractions", "ratios"]);
    }

    #[test]
    fn test_empty_report_neutral_floor() {
        let report = MetricsReport::empty();
        assert_eq!(report.kcs_score, 1.0);
        assert!(report.timeline.is_empty());
        assert_eq!(report.class_duration_formatted, "0s");
        assert!(report.observe_context.starts_with("0 moves"));
    }
}
