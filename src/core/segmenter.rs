//! Episode segmenter: state machine over the labeled utterance stream
//!
//! Single pass, no lookahead. Two states:
//! - NO_EPISODE: utterances buffer into the current general segment
//! - OPEN: an episode is accumulating moves
//!
//! Transitions:
//! - `None` label closes any open episode and joins the general buffer
//! - `O` always opens a fresh episode, closing the previous one
//! - `H`/`C`/`R` with no open episode are not valid openers and fall into
//!   the general buffer
//! - `H`/`C`/`R` inside an episode append as moves, with regressions counted
//!   as order violations and forward jumps as skipped stages

use std::mem;

use crate::core::round3;
use crate::types::{
    DiscourseAnalysis, DiscourseSummary, Episode, EpisodeStatus, GeneralSegment, OhcrLabel, Role,
    StageCounts, Utterance,
};
use crate::{
    QUALITY_WEIGHT_CONFIDENCE, QUALITY_WEIGHT_COVERAGE, QUALITY_WEIGHT_FLOW, STAGE_COUNT,
};

/// An episode still accumulating moves
#[derive(Debug)]
struct OpenEpisode {
    start: f64,
    moves: Vec<Utterance>,
    highest_stage: usize,
    order_violations: usize,
    skipped_stages: usize,
}

impl OpenEpisode {
    /// Open with `opener` as the first move
    fn new(opener: Utterance, stage_idx: usize) -> Self {
        Self {
            start: opener.start,
            moves: vec![opener],
            highest_stage: stage_idx,
            order_violations: 0,
            skipped_stages: 0,
        }
    }

    /// Append a move, accounting for regressions and skipped stages
    fn add_move(&mut self, mv: Utterance, stage_idx: usize) {
        if stage_idx < self.highest_stage {
            self.order_violations += 1;
        } else if stage_idx > self.highest_stage + 1 {
            self.skipped_stages += stage_idx - self.highest_stage - 1;
        }
        self.moves.push(mv);
        self.highest_stage = self.highest_stage.max(stage_idx);
    }
}

/// Discourse-episode state machine
#[derive(Debug, Default)]
pub struct EpisodeSegmenter {
    episodes: Vec<Episode>,
    general_segments: Vec<GeneralSegment>,
    general_buffer: Vec<Utterance>,
    current: Option<OpenEpisode>,
}

impl EpisodeSegmenter {
    /// Create an empty segmenter
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment a complete utterance list in one call
    pub fn analyze(utterances: &[Utterance]) -> DiscourseAnalysis {
        let mut segmenter = Self::new();
        for utt in utterances {
            segmenter.push(utt.clone());
        }
        segmenter.finish()
    }

    /// Feed the next utterance
    pub fn push(&mut self, utt: Utterance) {
        let Some(stage_idx) = utt.ohcr.stage_index() else {
            // Unlabeled: close any open episode, buffer the utterance.
            if let Some(open) = self.current.take() {
                self.finalize(open);
            }
            self.general_buffer.push(utt);
            return;
        };

        // A discourse move always terminates the pending general segment.
        self.flush_general();

        match self.current.take() {
            None => {
                if utt.ohcr == OhcrLabel::O {
                    self.current = Some(OpenEpisode::new(utt, stage_idx));
                } else {
                    // Not a valid opener.
                    self.general_buffer.push(utt);
                }
            }
            Some(mut open) => {
                // An O never appends to an existing arc. The moves guard
                // protects against a no-op double-finalize: an open episode
                // always holds at least its opener.
                if utt.ohcr == OhcrLabel::O && !open.moves.is_empty() {
                    self.finalize(open);
                    self.current = Some(OpenEpisode::new(utt, stage_idx));
                } else {
                    open.add_move(utt, stage_idx);
                    self.current = Some(open);
                }
            }
        }
    }

    /// Close the stream: finalize any open episode, flush the general buffer
    /// and return the full analysis
    pub fn finish(&mut self) -> DiscourseAnalysis {
        if let Some(open) = self.current.take() {
            self.finalize(open);
        }
        self.flush_general();

        let episodes = mem::take(&mut self.episodes);
        let general_segments = mem::take(&mut self.general_segments);
        let summary = summarize(&episodes);

        DiscourseAnalysis {
            episodes,
            general_segments,
            summary,
        }
    }

    /// Materialize the buffered utterances as a general segment.
    /// No-op on an empty buffer.
    fn flush_general(&mut self) {
        if self.general_buffer.is_empty() {
            return;
        }
        let utterances = mem::take(&mut self.general_buffer);
        self.general_segments.push(GeneralSegment {
            start: utterances[0].start,
            end: utterances[utterances.len() - 1].end,
            utterance_count: utterances.len(),
            utterances,
        });
    }

    /// Freeze an open episode and append it to the result list.
    /// An episode with no moves is discarded, never finalized.
    fn finalize(&mut self, open: OpenEpisode) {
        if open.moves.is_empty() {
            return;
        }
        let moves = open.moves;

        let mut counts = StageCounts::default();
        let mut confidence_sum = 0.0;
        let mut teacher_moves = 0;
        let mut student_moves = 0;
        for mv in &moves {
            counts.increment(mv.ohcr);
            confidence_sum += mv.confidence;
            match mv.role {
                Role::Teacher => teacher_moves += 1,
                Role::Student => student_moves += 1,
                Role::Unknown => {}
            }
        }

        let coverage = counts.distinct_stages() as f64 / STAGE_COUNT as f64;
        let avg_confidence = confidence_sum / moves.len() as f64;
        let penalty = (open.order_violations + open.skipped_stages) as f64;
        let denom = moves.len().saturating_sub(1).max(1) as f64;
        let flow_score = (1.0 - penalty / denom).max(0.0);
        let status = if counts.all_present() {
            EpisodeStatus::Complete
        } else {
            EpisodeStatus::Partial
        };
        let quality_score = (QUALITY_WEIGHT_COVERAGE * coverage
            + QUALITY_WEIGHT_CONFIDENCE * avg_confidence
            + QUALITY_WEIGHT_FLOW * flow_score)
            .clamp(0.0, 1.0);

        let end = moves[moves.len() - 1].end;
        let sequence = moves.iter().map(|mv| mv.ohcr).collect();

        self.episodes.push(Episode {
            id: self.episodes.len() + 1,
            start: open.start,
            end,
            duration: round3((end - moves[0].start).max(0.0)),
            counts,
            coverage: round3(coverage),
            avg_confidence: round3(avg_confidence),
            flow_score: round3(flow_score),
            quality_score: round3(quality_score),
            status,
            teacher_moves,
            student_moves,
            sequence,
            highest_stage: open.highest_stage,
            order_violations: open.order_violations,
            skipped_stages: open.skipped_stages,
            moves,
        });
    }
}

/// Summary statistics over the finalized episodes
fn summarize(episodes: &[Episode]) -> DiscourseSummary {
    let total_acts = episodes.len();
    let complete_acts = episodes
        .iter()
        .filter(|ep| ep.status == EpisodeStatus::Complete)
        .count();
    let (avg_quality_score, avg_coverage) = if episodes.is_empty() {
        (0.0, 0.0)
    } else {
        let n = episodes.len() as f64;
        (
            round3(episodes.iter().map(|ep| ep.quality_score).sum::<f64>() / n),
            round3(episodes.iter().map(|ep| ep.coverage).sum::<f64>() / n),
        )
    };

    DiscourseSummary {
        total_acts,
        complete_acts,
        partial_acts: total_acts - complete_acts,
        avg_quality_score,
        avg_coverage,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawUtterance;

    fn utt(start: f64, end: f64, label: &str, role: &str, confidence: f64) -> Utterance {
        Utterance::from_raw(
            &RawUtterance {
                start,
                end,
                speaker: "S".to_string(),
                role: Some(role.to_string()),
                ohcr: Some(label.to_string()),
                confidence,
                ..Default::default()
            },
            0,
        )
    }

    #[test]
    fn test_full_arc_is_complete() {
        let stream = vec![
            utt(0.0, 10.0, "O", "teacher", 0.9),
            utt(10.0, 20.0, "H", "student", 0.8),
            utt(20.0, 25.0, "C", "teacher", 0.7),
            utt(25.0, 30.0, "R", "student", 0.9),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.episodes.len(), 1);
        let ep = &analysis.episodes[0];
        assert_eq!(ep.status, EpisodeStatus::Complete);
        assert_eq!(ep.coverage, 1.0);
        assert_eq!(ep.order_violations, 0);
        assert_eq!(ep.skipped_stages, 0);
        assert_eq!(ep.flow_score, 1.0);
        assert_eq!(ep.start, 0.0);
        assert_eq!(ep.end, 30.0);
        assert_eq!(ep.duration, 30.0);
        assert_eq!(ep.teacher_moves, 2);
        assert_eq!(ep.student_moves, 2);
        assert_eq!(
            ep.sequence,
            vec![OhcrLabel::O, OhcrLabel::H, OhcrLabel::C, OhcrLabel::R]
        );
        assert!(analysis.general_segments.is_empty());
    }

    #[test]
    fn test_skipped_stages_counted() {
        let stream = vec![utt(0.0, 5.0, "O", "teacher", 1.0), utt(5.0, 10.0, "R", "student", 1.0)];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.episodes.len(), 1);
        let ep = &analysis.episodes[0];
        assert_eq!(ep.skipped_stages, 2);
        assert_eq!(ep.status, EpisodeStatus::Partial);
        assert_eq!(ep.coverage, 0.5);
        // One transition, two skipped stages: flow bottoms out at 0.
        assert_eq!(ep.flow_score, 0.0);
    }

    #[test]
    fn test_unlabeled_stream_is_one_general_segment() {
        let stream = vec![
            utt(0.0, 5.0, "None", "teacher", 0.0),
            utt(5.0, 10.0, "None", "student", 0.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert!(analysis.episodes.is_empty());
        assert_eq!(analysis.general_segments.len(), 1);
        let seg = &analysis.general_segments[0];
        assert_eq!(seg.start, 0.0);
        assert_eq!(seg.end, 10.0);
        assert_eq!(seg.utterance_count, 2);
        assert_eq!(analysis.summary.total_acts, 0);
        assert_eq!(analysis.summary.avg_quality_score, 0.0);
    }

    #[test]
    fn test_o_always_resets() {
        let stream = vec![
            utt(0.0, 5.0, "O", "teacher", 1.0),
            utt(5.0, 10.0, "H", "student", 1.0),
            utt(10.0, 15.0, "O", "teacher", 1.0),
            utt(15.0, 20.0, "H", "student", 1.0),
            utt(20.0, 25.0, "C", "teacher", 1.0),
            utt(25.0, 30.0, "R", "student", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.episodes.len(), 2);
        let first = &analysis.episodes[0];
        let second = &analysis.episodes[1];
        assert_eq!(first.status, EpisodeStatus::Partial);
        assert_eq!(second.status, EpisodeStatus::Complete);
        assert!(first.end <= second.start);
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn test_order_violation_on_regression() {
        let stream = vec![
            utt(0.0, 5.0, "O", "teacher", 1.0),
            utt(5.0, 10.0, "H", "student", 1.0),
            utt(10.0, 15.0, "C", "teacher", 1.0),
            utt(15.0, 20.0, "H", "student", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        let ep = &analysis.episodes[0];
        assert_eq!(ep.order_violations, 1);
        assert_eq!(ep.skipped_stages, 0);
        assert_eq!(ep.highest_stage, 2);
        assert_eq!(ep.flow_score, round3(1.0 - 1.0 / 3.0));
    }

    #[test]
    fn test_stray_moves_are_not_openers() {
        let stream = vec![
            utt(0.0, 5.0, "H", "student", 1.0),
            utt(5.0, 10.0, "C", "teacher", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert!(analysis.episodes.is_empty());
        assert_eq!(analysis.general_segments.len(), 1);
        assert_eq!(analysis.general_segments[0].utterance_count, 2);
    }

    #[test]
    fn test_none_closes_episode_and_buffers() {
        let stream = vec![
            utt(0.0, 5.0, "O", "teacher", 1.0),
            utt(5.0, 10.0, "None", "student", 0.0),
            utt(10.0, 15.0, "None", "teacher", 0.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.episodes.len(), 1);
        assert_eq!(analysis.episodes[0].end, 5.0);
        assert_eq!(analysis.general_segments.len(), 1);
        assert_eq!(analysis.general_segments[0].start, 5.0);
        assert_eq!(analysis.general_segments[0].end, 15.0);
    }

    #[test]
    fn test_move_terminates_pending_general_segment() {
        let stream = vec![
            utt(0.0, 5.0, "None", "teacher", 0.0),
            utt(5.0, 10.0, "O", "teacher", 1.0),
            utt(10.0, 15.0, "R", "student", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.general_segments.len(), 1);
        assert_eq!(analysis.general_segments[0].end, 5.0);
        assert_eq!(analysis.episodes.len(), 1);
        assert_eq!(analysis.episodes[0].start, 5.0);
    }

    #[test]
    fn test_stream_end_finalizes_open_episode() {
        let mut segmenter = EpisodeSegmenter::new();
        segmenter.push(utt(0.0, 5.0, "O", "teacher", 0.5));
        segmenter.push(utt(5.0, 10.0, "H", "student", 0.5));
        let analysis = segmenter.finish();

        assert_eq!(analysis.episodes.len(), 1);
        assert_eq!(analysis.episodes[0].status, EpisodeStatus::Partial);
    }

    #[test]
    fn test_empty_stream() {
        let analysis = EpisodeSegmenter::analyze(&[]);
        assert!(analysis.episodes.is_empty());
        assert!(analysis.general_segments.is_empty());
        assert_eq!(analysis.summary.total_acts, 0);
    }

    #[test]
    fn test_quality_score_bounds() {
        let stream = vec![
            utt(0.0, 5.0, "O", "teacher", 1.0),
            utt(5.0, 10.0, "H", "student", 1.0),
            utt(10.0, 15.0, "C", "teacher", 1.0),
            utt(15.0, 20.0, "R", "student", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);
        let ep = &analysis.episodes[0];
        // Full coverage, full confidence, clean flow: the blend hits 1.0.
        assert_eq!(ep.quality_score, 1.0);

        let low = EpisodeSegmenter::analyze(&[utt(0.0, 5.0, "O", "teacher", 0.0)]);
        let ep = &low.episodes[0];
        assert!(ep.quality_score >= 0.0 && ep.quality_score <= 1.0);
    }

    #[test]
    fn test_summary_means() {
        let stream = vec![
            utt(0.0, 5.0, "O", "teacher", 1.0),
            utt(5.0, 10.0, "H", "student", 1.0),
            utt(10.0, 15.0, "C", "teacher", 1.0),
            utt(15.0, 20.0, "R", "student", 1.0),
            utt(20.0, 25.0, "O", "teacher", 1.0),
        ];
        let analysis = EpisodeSegmenter::analyze(&stream);

        assert_eq!(analysis.summary.total_acts, 2);
        assert_eq!(analysis.summary.complete_acts, 1);
        assert_eq!(analysis.summary.partial_acts, 1);
        let expected_cov = round3((1.0 + 0.25) / 2.0);
        assert_eq!(analysis.summary.avg_coverage, expected_cov);
    }
}
