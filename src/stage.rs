use std::fmt;

/// One answer option of a single-choice stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StageOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// Canonical left/right pairing of a matching stage.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

/// A recording the agent can listen to before answering.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioSample {
    /// Short label shown on the play button ("A", "B", ...).
    pub label: String,
    pub url: String,
    /// Playback volume in `0.0..=1.0`.
    pub volume: f32,
}

/// Optional prompt material attached to a stage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Media {
    Image { url: String, alt: String },
    Audio { samples: Vec<AudioSample> },
}

/// How a stage is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Pick one option; feedback after every click.
    Choice,
    /// Pick one option after listening to the attached recordings.
    AudioChoice,
    /// Pair every left item with a right item, then submit once.
    Matching,
}

/// A single mission step.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    pub id: u32,
    pub title: String,
    /// Narrative shown above the question. May contain line breaks.
    pub description: String,
    #[serde(default)]
    pub media: Option<Media>,
    pub question: String,
    #[serde(default)]
    pub options: Vec<StageOption>,
    #[serde(default)]
    pub matching_pairs: Vec<MatchingPair>,
    pub correct_feedback: String,
    pub incorrect_feedback: String,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        if !self.matching_pairs.is_empty() {
            StageKind::Matching
        } else if matches!(self.media, Some(Media::Audio { .. })) {
            StageKind::AudioChoice
        } else {
            StageKind::Choice
        }
    }

    pub fn is_matching(&self) -> bool {
        self.kind() == StageKind::Matching
    }

    /// Index of the option marked correct, if there is one.
    pub fn correct_option(&self) -> Option<usize> {
        self.options.iter().position(|option| option.correct)
    }

    pub fn audio_samples(&self) -> &[AudioSample] {
        match &self.media {
            Some(Media::Audio { samples }) => samples,
            _ => &[],
        }
    }

    pub fn feedback(&self, correct: bool) -> &str {
        if correct {
            &self.correct_feedback
        } else {
            &self.incorrect_feedback
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.title)
    }
}
