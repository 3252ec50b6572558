//! Episode model
//!
//! An episode is one reasoning arc: an ordered run of discourse moves opened
//! by an `O` and closed by the next `O` or end of stream. Utterances that
//! carry no discourse label collect into general segments instead.

use serde::{Deserialize, Serialize};

use crate::types::{OhcrLabel, Utterance};
use crate::STAGE_COUNT;

/// Lifecycle of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeStatus {
    /// Still accumulating moves
    Active,
    /// Finalized without reaching all four stages
    Partial,
    /// Finalized with every stage present
    Complete,
}

impl std::fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EpisodeStatus::Active => "active",
            EpisodeStatus::Partial => "partial",
            EpisodeStatus::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// Per-stage move tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    #[serde(rename = "O")]
    pub o: usize,
    #[serde(rename = "H")]
    pub h: usize,
    #[serde(rename = "C")]
    pub c: usize,
    #[serde(rename = "R")]
    pub r: usize,
}

impl StageCounts {
    /// Bump the tally for a stage label; `None` is ignored
    pub fn increment(&mut self, label: OhcrLabel) {
        match label {
            OhcrLabel::O => self.o += 1,
            OhcrLabel::H => self.h += 1,
            OhcrLabel::C => self.c += 1,
            OhcrLabel::R => self.r += 1,
            OhcrLabel::None => {}
        }
    }

    /// How many of the four stages have at least one move
    pub fn distinct_stages(&self) -> usize {
        [self.o, self.h, self.c, self.r]
            .iter()
            .filter(|&&n| n > 0)
            .count()
    }

    /// All four stages present?
    pub fn all_present(&self) -> bool {
        self.distinct_stages() == STAGE_COUNT
    }
}

/// One finalized reasoning arc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    /// 1-based position in the finalized list
    pub id: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub moves: Vec<Utterance>,
    pub counts: StageCounts,
    /// Fraction of the four stages present, 0-1
    pub coverage: f64,
    pub avg_confidence: f64,
    /// 1 minus normalized order/skip violations
    pub flow_score: f64,
    pub quality_score: f64,
    pub status: EpisodeStatus,
    pub teacher_moves: usize,
    pub student_moves: usize,
    /// Ordered stage labels of the moves
    pub sequence: Vec<OhcrLabel>,
    pub highest_stage: usize,
    pub order_violations: usize,
    pub skipped_stages: usize,
}

/// Contiguous run of unlabeled utterances outside any episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSegment {
    pub start: f64,
    pub end: f64,
    pub utterance_count: usize,
    pub utterances: Vec<Utterance>,
}

/// Summary statistics over all finalized episodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscourseSummary {
    pub total_acts: usize,
    pub complete_acts: usize,
    pub partial_acts: usize,
    pub avg_quality_score: f64,
    pub avg_coverage: f64,
}

/// Full segmentation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscourseAnalysis {
    pub episodes: Vec<Episode>,
    pub general_segments: Vec<GeneralSegment>,
    pub summary: DiscourseSummary,
}

// =============================================================================
// TESTS
// =============================================================================
