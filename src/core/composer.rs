//! Metrics composer: top-level orchestrator
//!
//! Normalizes the raw utterance records once at the boundary, runs the
//! episode segmenter and the timeline aggregator, accumulates the
//! cross-cutting participation/engagement statistics in a single pass and
//! assembles the final report. Computation is total: malformed input
//! degrades to documented defaults and an empty list yields the fixed
//! zero-valued report.

use crate::core::{round3, EpisodeSegmenter, TimelineAggregator};
use crate::types::{
    format_duration, stage_context, CoachReport, MetricsReport, OhcrCounts, OhcrLabel,
    RawUtterance, Role, TimelinePoint, Utterance, CHALLENGE_PROMPT, HYPOTHESIS_PROMPT,
    OBSERVE_PROMPT, RESOLVE_PROMPT,
};
use crate::{BENEFICIAL_LEVEL, CHALLENGE_LOOKAHEAD, MIN_DENOMINATOR};

/// Assembles the full metrics report from a labeled utterance stream
#[derive(Debug, Default)]
pub struct MetricsComposer {
    timeline: TimelineAggregator,
}

impl MetricsComposer {
    /// Composer with the default timeline window
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer with a custom timeline window width (seconds)
    pub fn with_window(window_secs: f64) -> Self {
        Self {
            timeline: TimelineAggregator::new(window_secs),
        }
    }

    /// Timeline window width in effect (seconds)
    pub fn window_secs(&self) -> f64 {
        self.timeline.window_secs()
    }

    /// Compute every metric for one session
    pub fn compute_all(
        &self,
        raw: &[RawUtterance],
        coach_report: Option<&CoachReport>,
    ) -> MetricsReport {
        let utterances: Vec<Utterance> = raw
            .iter()
            .enumerate()
            .map(|(idx, r)| Utterance::from_raw(r, idx))
            .collect();

        if utterances.is_empty() {
            return MetricsReport::empty();
        }

        // Single accumulation pass.
        let mut counts = OhcrCounts::default();
        let mut teacher_duration = 0.0;
        let mut student_duration = 0.0;
        let mut teacher_turns = 0usize;
        let mut student_turns = 0usize;
        let mut challenge_indices = Vec::new();
        let mut teacher_question_count = 0;
        let mut student_question_count = 0;
        let mut interaction_count = 0;
        let mut prev_role: Option<Role> = None;
        let mut class_start = utterances[0].start;
        let mut class_end = utterances[0].end;

        for utt in &utterances {
            counts.increment(utt.ohcr);
            if utt.ohcr == OhcrLabel::C {
                challenge_indices.push(utt.index);
            }

            match utt.role {
                Role::Teacher => {
                    teacher_duration += utt.duration;
                    teacher_turns += 1;
                }
                Role::Student => {
                    student_duration += utt.duration;
                    student_turns += 1;
                }
                Role::Unknown => {}
            }

            if utt.is_question() {
                match utt.role {
                    Role::Teacher => teacher_question_count += 1,
                    Role::Student => student_question_count += 1,
                    Role::Unknown => {}
                }
            }

            // Role switches between teacher and student only; other roles
            // neither break nor extend a run.
            if matches!(utt.role, Role::Teacher | Role::Student) {
                if let Some(prev) = prev_role {
                    if prev != utt.role {
                        interaction_count += 1;
                    }
                }
                prev_role = Some(utt.role);
            }

            class_start = class_start.min(utt.start);
            class_end = class_end.max(utt.end);
        }

        let timeline = self.timeline.level_timeline(&utterances);
        let discourse_analysis = EpisodeSegmenter::analyze(&utterances);

        let challenge_resolve_rate = challenge_resolve_rate(&utterances, &challenge_indices);
        let duration_min = utterances[utterances.len() - 1].end / 60.0;
        let resolution_density_per_min =
            round3(counts.r as f64 / duration_min.max(MIN_DENOMINATOR));

        let talk_total = (teacher_duration + student_duration).max(MIN_DENOMINATOR);
        let avg_teacher_turn = if teacher_turns > 0 {
            teacher_duration / teacher_turns as f64
        } else {
            0.0
        };
        let avg_student_turn = if student_turns > 0 {
            student_duration / student_turns as f64
        } else {
            0.0
        };

        let class_duration_sec = (class_end - class_start).max(0.0);

        let topics = coach_report.map(CoachReport::string_topics).unwrap_or_default();

        MetricsReport {
            ohcr_counts: counts,
            challenge_resolve_rate,
            resolution_density_per_min,
            teacher_talk_pct: round3(teacher_duration / talk_total),
            student_talk_pct: round3(student_duration / talk_total),
            avg_teacher_turn: round3(avg_teacher_turn),
            avg_student_turn: round3(avg_student_turn),
            beneficial_duration_pct: beneficial_duration_pct(&timeline),
            kcs_score: kcs_score(&timeline),
            timeline,
            discourse_analysis,
            class_duration_sec: round3(class_duration_sec),
            class_duration_formatted: format_duration(class_duration_sec),
            interaction_count,
            subtopic_count: topics.len(),
            teacher_question_count,
            student_question_count,
            topics,
            observe_count: counts.o,
            hypothesis_count: counts.h,
            challenge_count: counts.c,
            resolution_count: counts.r,
            observe_context: stage_context(counts.o, OBSERVE_PROMPT),
            hypothesis_context: stage_context(counts.h, HYPOTHESIS_PROMPT),
            challenge_context: stage_context(counts.c, CHALLENGE_PROMPT),
            resolution_context: stage_context(counts.r, RESOLVE_PROMPT),
        }
    }
}

/// Fraction of challenges answered by an R within the next few utterances.
/// 0 when there are no challenges.
fn challenge_resolve_rate(utterances: &[Utterance], challenge_indices: &[usize]) -> f64 {
    if challenge_indices.is_empty() {
        return 0.0;
    }
    let resolved = challenge_indices
        .iter()
        .filter(|&&idx| {
            let from = idx + 1;
            let to = (from + CHALLENGE_LOOKAHEAD).min(utterances.len());
            utterances[from..to].iter().any(|u| u.ohcr == OhcrLabel::R)
        })
        .count();
    round3(resolved as f64 / challenge_indices.len() as f64)
}

/// Fraction of timeline windows at or above the beneficial level.
/// 0 on an empty timeline.
fn beneficial_duration_pct(timeline: &[TimelinePoint]) -> f64 {
    if timeline.is_empty() {
        return 0.0;
    }
    let good = timeline.iter().filter(|p| p.level >= BENEFICIAL_LEVEL).count();
    round3(good as f64 / timeline.len() as f64)
}

/// Mean timeline level. 1.0 on an empty timeline, the neutral floor.
fn kcs_score(timeline: &[TimelinePoint]) -> f64 {
    if timeline.is_empty() {
        return 1.0;
    }
    let sum: f64 = timeline.iter().map(|p| p.level as f64).sum();
    round3(sum / timeline.len() as f64)
}

// =============================================================================
// TESTS
// =============================================================================
