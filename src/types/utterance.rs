//! Utterance model
//!
//! Upstream collaborators (transcription, diarization, LLM labeling) deliver
//! loosely-shaped records. `RawUtterance` is that wire shape, every field
//! optional. `Utterance` is the normalized record the engine works on:
//! coercion to safe defaults happens exactly once, at this boundary.

use serde::{Deserialize, Serialize};

use crate::{FALLBACK_LEVEL, LEVEL_MAX, LEVEL_MIN};

/// The four discourse stages plus "no move"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OhcrLabel {
    O,
    H,
    C,
    R,
    None,
}

impl OhcrLabel {
    /// Parse a free-form label; anything unrecognized maps to `None`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "O" => OhcrLabel::O,
            "H" => OhcrLabel::H,
            "C" => OhcrLabel::C,
            "R" => OhcrLabel::R,
            _ => OhcrLabel::None,
        }
    }

    /// Stage index in the O < H < C < R order; `None` carries no stage
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            OhcrLabel::O => Some(0),
            OhcrLabel::H => Some(1),
            OhcrLabel::C => Some(2),
            OhcrLabel::R => Some(3),
            OhcrLabel::None => None,
        }
    }

    /// Is this a discourse move (non-`None` label)?
    pub fn is_move(&self) -> bool {
        !matches!(self, OhcrLabel::None)
    }
}

impl std::fmt::Display for OhcrLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OhcrLabel::O => "O",
            OhcrLabel::H => "H",
            OhcrLabel::C => "C",
            OhcrLabel::R => "R",
            OhcrLabel::None => "None",
        };
        write!(f, "{}", name)
    }
}

/// Speaker role as assigned by diarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
    Unknown,
}

impl Role {
    /// Parse a free-form role string; anything unrecognized maps to `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "teacher" => Role::Teacher,
            "student" => Role::Student,
            _ => Role::Unknown,
        }
    }
}

/// Where an utterance's cognitive level came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelSource {
    /// Assigned by the LLM labeler
    Llm,
    /// Backfilled default because the labeler supplied none
    Fallback,
}

/// Wire-shape utterance record as produced by upstream labeling
///
/// Every field is optional; missing or malformed values degrade to defaults
/// during normalization rather than failing the whole computation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawUtterance {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ohcr: Option<String>,
    #[serde(default)]
    pub discourse_act: String,
    #[serde(default)]
    pub confidence: f64,
    /// Accepted as any JSON number; non-integers are treated as absent
    #[serde(default)]
    pub iam_level: Option<f64>,
}

/// Normalized utterance record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub speaker: String,
    pub role: Role,
    pub ohcr: OhcrLabel,
    pub discourse_act: String,
    pub confidence: f64,
    pub text: String,
    pub duration: f64,
    pub iam_level: u8,
    pub iam_level_source: LevelSource,
}

impl Utterance {
    /// Normalize a raw record at the engine boundary
    pub fn from_raw(raw: &RawUtterance, index: usize) -> Self {
        let (iam_level, iam_level_source) = resolve_level(raw.iam_level);
        Self {
            index,
            start: raw.start,
            end: raw.end,
            speaker: raw.speaker.clone(),
            role: Role::parse(raw.role.as_deref().unwrap_or("unknown")),
            ohcr: OhcrLabel::parse(raw.ohcr.as_deref().unwrap_or("None")),
            discourse_act: raw.discourse_act.clone(),
            confidence: raw.confidence.clamp(0.0, 1.0),
            text: raw.text.clone(),
            duration: (raw.end - raw.start).max(0.0),
            iam_level,
            iam_level_source,
        }
    }

    /// Is this utterance a question, per the labeler's discourse act?
    pub fn is_question(&self) -> bool {
        self.discourse_act.eq_ignore_ascii_case("question")
    }
}

/// Resolve a raw cognitive level to a valid 1-5 value with provenance.
/// Absent or non-integer values fall back to level 1; out-of-range
/// integers are clamped but keep their LLM provenance.
fn resolve_level(raw: Option<f64>) -> (u8, LevelSource) {
    match raw {
        Some(v) if v.is_finite() && v.fract() == 0.0 => {
            let clamped = (v as i64).clamp(LEVEL_MIN as i64, LEVEL_MAX as i64) as u8;
            (clamped, LevelSource::Llm)
        }
        _ => (FALLBACK_LEVEL, LevelSource::Fallback),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_case_and_whitespace() {
        assert_eq!(OhcrLabel::parse("o"), OhcrLabel::O);
        assert_eq!(OhcrLabel::parse(" R "), OhcrLabel::R);
        assert_eq!(OhcrLabel::parse("none"), OhcrLabel::None);
        assert_eq!(OhcrLabel::parse("X"), OhcrLabel::None);
        assert_eq!(OhcrLabel::parse(""), OhcrLabel::None);
    }

    #[test]
    fn test_stage_index_order() {
        assert_eq!(OhcrLabel::O.stage_index(), Some(0));
        assert_eq!(OhcrLabel::H.stage_index(), Some(1));
        assert_eq!(OhcrLabel::C.stage_index(), Some(2));
        assert_eq!(OhcrLabel::R.stage_index(), Some(3));
        assert_eq!(OhcrLabel::None.stage_index(), None);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("Teacher"), Role::Teacher);
        assert_eq!(Role::parse("student"), Role::Student);
        assert_eq!(Role::parse("observer"), Role::Unknown);
        assert_eq!(Role::parse(""), Role::Unknown);
    }

    #[test]
    fn test_level_resolution() {
        assert_eq!(resolve_level(Some(3.0)), (3, LevelSource::Llm));
        assert_eq!(resolve_level(Some(9.0)), (5, LevelSource::Llm));
        assert_eq!(resolve_level(Some(0.0)), (1, LevelSource::Llm));
        assert_eq!(resolve_level(Some(2.5)), (1, LevelSource::Fallback));
        assert_eq!(resolve_level(Some(f64::NAN)), (1, LevelSource::Fallback));
        assert_eq!(resolve_level(None), (1, LevelSource::Fallback));
    }

    #[test]
    fn test_from_raw_defaults() {
        let raw = RawUtterance::default();
        let utt = Utterance::from_raw(&raw, 7);
        assert_eq!(utt.index, 7);
        assert_eq!(utt.role, Role::Unknown);
        assert_eq!(utt.ohcr, OhcrLabel::None);
        assert_eq!(utt.duration, 0.0);
        assert_eq!(utt.iam_level, 1);
        assert_eq!(utt.iam_level_source, LevelSource::Fallback);
    }

    #[test]
    fn test_from_raw_negative_span_clamps_duration() {
        let raw = RawUtterance {
            start: 10.0,
            end: 4.0,
            ..Default::default()
        };
        let utt = Utterance::from_raw(&raw, 0);
        assert_eq!(utt.duration, 0.0);
    }

    #[test]
    fn test_from_raw_confidence_clamped() {
        let raw = RawUtterance {
            confidence: 1.7,
            ..Default::default()
        };
        assert_eq!(Utterance::from_raw(&raw, 0).confidence, 1.0);
    }

    #[test]
    fn test_raw_deserialization_tolerates_missing_fields() {
        let utt: RawUtterance = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(utt.text, "hello");
        assert_eq!(utt.start, 0.0);
        assert!(utt.ohcr.is_none());
    }

    #[test]
    fn test_is_question_case_insensitive() {
        let raw = RawUtterance {
            discourse_act: "Question".to_string(),
            ..Default::default()
        };
        assert!(Utterance::from_raw(&raw, 0).is_question());
    }
}
