//! What to show for a given controller state.
//!
//! Every view template (the Leptos components and the terminal renderer)
//! reads a [`Screen`] and never inspects the controller directly.

use crate::mission::{AnswerState, CompletionSummary, MissionController, Phase};
use crate::report::ResultDispatcher;
use crate::stage::{AudioSample, Media, Stage, StageKind};
use crate::store::KeyValueStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// The completion flag is set; the mission cannot be replayed.
    AlreadyCompleted,
    Welcome { stage_count: usize },
    NameForm(NameForm),
    Question(QuestionScreen),
    Matching(MatchingScreen),
    Completion(CompletionSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameForm {
    pub first_name: String,
    pub last_name: String,
    pub can_start: bool,
}

/// Header shared by every stage screen.
#[derive(Debug, Clone, PartialEq)]
pub struct StageHeader {
    pub stage_index: usize,
    /// 1-based.
    pub number: usize,
    pub total: usize,
    pub progress_percent: u8,
    pub agent_name: String,
    pub title: String,
    pub description: String,
    pub question: String,
    pub image: Option<(String, String)>,
    pub is_last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionState {
    Idle,
    SelectedCorrect,
    SelectedWrong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub index: usize,
    pub text: String,
    pub state: OptionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub correct: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionScreen {
    pub header: StageHeader,
    pub kind: StageKind,
    pub audio: Vec<AudioSample>,
    pub options: Vec<OptionView>,
    /// Options stop accepting clicks once the stage is solved.
    pub options_enabled: bool,
    pub feedback: Option<Feedback>,
    pub can_advance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftItem {
    pub text: String,
    pub matched_with: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RightItem {
    pub text: String,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingScreen {
    pub header: StageHeader,
    pub left: Vec<LeftItem>,
    pub right: Vec<RightItem>,
    pub has_left_selection: bool,
    pub paired: usize,
    pub pairs_total: usize,
    pub editable: bool,
    pub can_submit: bool,
    pub feedback: Option<Feedback>,
    pub can_advance: bool,
}

/// Which recording of an audio stage is playing. Starting one stops the
/// others so the samples can be compared one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioPlayback {
    playing: Option<String>,
}

impl AudioPlayback {
    pub fn playing(&self) -> Option<&str> {
        self.playing.as_deref()
    }

    /// Returns the sample that was playing before `label`, if it must be
    /// stopped and rewound.
    pub fn start(&mut self, label: &str) -> Option<String> {
        self.playing
            .replace(label.to_string())
            .filter(|previous| previous != label)
    }

    pub fn finish(&mut self, label: &str) {
        if self.playing.as_deref() == Some(label) {
            self.playing = None;
        }
    }

    pub fn should_stop(&self, label: &str) -> bool {
        self.playing.as_deref().is_some_and(|playing| playing != label)
    }
}

impl Screen {
    pub fn of<S: KeyValueStore, D: ResultDispatcher>(controller: &MissionController<S, D>) -> Self {
        if controller.is_locked() && controller.phase() != Phase::Completed {
            return Self::AlreadyCompleted;
        }

        match controller.phase() {
            Phase::Welcome => Self::Welcome {
                stage_count: controller.catalog().len(),
            },
            Phase::NamePrompt => {
                let session = controller.session();
                Self::NameForm(NameForm {
                    first_name: session.first_name.clone(),
                    last_name: session.last_name.clone(),
                    can_start: controller.can_start(),
                })
            }
            Phase::InStage(index) => match controller.catalog().stage(index) {
                Some(stage) if stage.is_matching() => {
                    Self::Matching(matching_screen(controller, index, stage))
                }
                Some(stage) => Self::Question(question_screen(controller, index, stage)),
                None => Self::Welcome {
                    stage_count: controller.catalog().len(),
                },
            },
            Phase::Completed => match controller.summary() {
                Some(summary) => Self::Completion(summary.clone()),
                None => Self::Welcome {
                    stage_count: controller.catalog().len(),
                },
            },
        }
    }
}

fn header<S: KeyValueStore, D: ResultDispatcher>(
    controller: &MissionController<S, D>,
    index: usize,
    stage: &Stage,
) -> StageHeader {
    let total = controller.catalog().len();
    let image = match &stage.media {
        Some(Media::Image { url, alt }) => Some((url.clone(), alt.clone())),
        _ => None,
    };

    StageHeader {
        stage_index: index,
        number: index + 1,
        total,
        progress_percent: controller.progress_percent(),
        agent_name: controller.session().first_name.clone(),
        title: stage.title.clone(),
        description: stage.description.clone(),
        question: stage.question.clone(),
        image,
        is_last: index + 1 == total,
    }
}

fn feedback<S: KeyValueStore, D: ResultDispatcher>(
    controller: &MissionController<S, D>,
    stage: &Stage,
) -> Option<Feedback> {
    match controller.session().answer {
        AnswerState::Unanswered => None,
        AnswerState::Answered { correct } => Some(Feedback {
            correct,
            message: stage.feedback(correct).to_string(),
        }),
    }
}

fn question_screen<S: KeyValueStore, D: ResultDispatcher>(
    controller: &MissionController<S, D>,
    index: usize,
    stage: &Stage,
) -> QuestionScreen {
    let session = controller.session();
    let solved = session.is_correct();

    let options = stage
        .options
        .iter()
        .enumerate()
        .map(|(option_index, option)| {
            let state = match session.selected_option {
                Some(selected) if selected == option_index && session.feedback_visible() => {
                    if option.correct {
                        OptionState::SelectedCorrect
                    } else {
                        OptionState::SelectedWrong
                    }
                }
                _ => OptionState::Idle,
            };

            OptionView {
                index: option_index,
                text: option.text.clone(),
                state,
            }
        })
        .collect();

    QuestionScreen {
        header: header(controller, index, stage),
        kind: stage.kind(),
        audio: stage.audio_samples().to_vec(),
        options,
        options_enabled: !solved,
        feedback: feedback(controller, stage),
        can_advance: solved,
    }
}

fn matching_screen<S: KeyValueStore, D: ResultDispatcher>(
    controller: &MissionController<S, D>,
    index: usize,
    stage: &Stage,
) -> MatchingScreen {
    let session = controller.session();
    let solved = session.is_correct();

    let (left, right, has_left_selection, paired, pairs_total) = match &session.matching {
        Some(board) => {
            let left = board
                .left_items()
                .map(|item| LeftItem {
                    text: item.to_string(),
                    matched_with: board.match_for(item).map(str::to_string),
                    selected: board.selected_left() == Some(item),
                })
                .collect();
            let right = board
                .right_items()
                .iter()
                .map(|item| RightItem {
                    text: item.clone(),
                    used: board.owner_of(item).is_some(),
                })
                .collect();
            (
                left,
                right,
                board.selected_left().is_some(),
                board.paired_count(),
                board.total(),
            )
        }
        None => (Vec::new(), Vec::new(), false, 0, 0),
    };

    MatchingScreen {
        header: header(controller, index, stage),
        left,
        right,
        has_left_selection,
        paired,
        pairs_total,
        editable: !solved,
        can_submit: controller.can_submit_matching(),
        feedback: feedback(controller, stage),
        can_advance: solved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::report::RecordingDispatcher;
    use crate::store::{CompletionGate, KeyValueStore, MemoryStore};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn controller() -> MissionController<MemoryStore, RecordingDispatcher> {
        MissionController::with_rng(
            Catalog::builtin().expect("builtin catalog should load"),
            CompletionGate::new(MemoryStore::new(), "completed"),
            RecordingDispatcher::new(),
            StdRng::seed_from_u64(3),
        )
    }

    fn started() -> MissionController<MemoryStore, RecordingDispatcher> {
        let mut controller = controller();
        controller.open_name_prompt().expect("welcome opens the prompt");
        controller.set_first_name("Ada").expect("names are editable");
        controller.set_last_name("Lovelace").expect("names are editable");
        controller.start(0).expect("names are present");
        controller
    }

    #[test]
    fn welcome_then_name_form() {
        let mut controller = controller();
        assert_eq!(Screen::of(&controller), Screen::Welcome { stage_count: 5 });

        controller.open_name_prompt().expect("welcome opens the prompt");
        assert_eq!(
            Screen::of(&controller),
            Screen::NameForm(NameForm {
                first_name: String::new(),
                last_name: String::new(),
                can_start: false,
            })
        );
    }

    #[test]
    fn first_stage_is_an_unanswered_question() {
        let controller = started();
        let Screen::Question(question) = Screen::of(&controller) else {
            panic!("first stage is a choice stage");
        };

        assert_eq!(question.header.number, 1);
        assert_eq!(question.header.total, 5);
        assert_eq!(question.header.progress_percent, 20);
        assert_eq!(question.header.agent_name, "Ada");
        assert!(question.header.image.is_some());
        assert!(question.feedback.is_none());
        assert!(question.options_enabled);
        assert!(!question.can_advance);
        assert!(
            question
                .options
                .iter()
                .all(|option| option.state == OptionState::Idle)
        );
    }

    #[test]
    fn wrong_choice_marks_only_the_selected_option() {
        let mut controller = started();
        controller.select_option(0, 0).expect("stage in play");

        let Screen::Question(question) = Screen::of(&controller) else {
            panic!("first stage is a choice stage");
        };

        assert_eq!(question.options[0].state, OptionState::SelectedWrong);
        assert_eq!(question.options[1].state, OptionState::Idle);
        assert_eq!(
            question.feedback.map(|feedback| feedback.correct),
            Some(false)
        );
        assert!(question.options_enabled);
    }

    #[test]
    fn audio_stage_carries_samples() {
        let mut controller = started();
        for stage in 0..2 {
            let correct = controller.catalog().stages()[stage]
                .correct_option()
                .expect("choice stage has a correct option");
            controller.select_option(stage, correct).expect("stage in play");
            controller.advance(0).expect("stage solved");
        }

        let Screen::Question(question) = Screen::of(&controller) else {
            panic!("third stage is an audio stage");
        };
        assert_eq!(question.kind, StageKind::AudioChoice);
        assert_eq!(question.audio.len(), 3);
    }

    #[test]
    fn matching_screen_tracks_pairs() {
        let mut controller = started();
        for stage in 0..3 {
            let correct = controller.catalog().stages()[stage]
                .correct_option()
                .expect("choice stage has a correct option");
            controller.select_option(stage, correct).expect("stage in play");
            controller.advance(0).expect("stage solved");
        }

        controller.pick_left("Voltmeter").expect("board editable");
        let Screen::Matching(board) = Screen::of(&controller) else {
            panic!("fourth stage is a matching stage");
        };
        assert!(board.has_left_selection);
        assert!(board.left.iter().any(|item| item.selected && item.text == "Voltmeter"));

        controller.pick_right("Voltage").expect("right item free");
        let Screen::Matching(board) = Screen::of(&controller) else {
            panic!("fourth stage is a matching stage");
        };
        assert!(!board.has_left_selection);
        assert!(!board.can_submit);
        assert_eq!((board.paired, board.pairs_total), (1, 5));
        assert!(board.right.iter().any(|item| item.used && item.text == "Voltage"));
        assert_eq!(board.left.len(), 5);
        assert_eq!(board.right.len(), 5);
    }

    #[test]
    fn locked_controller_shows_notice() {
        let mut store = MemoryStore::new();
        store.set("completed", "true").expect("memory writes succeed");
        let controller = MissionController::with_rng(
            Catalog::builtin().expect("builtin catalog should load"),
            CompletionGate::new(store, "completed"),
            RecordingDispatcher::new(),
            StdRng::seed_from_u64(3),
        );

        assert_eq!(Screen::of(&controller), Screen::AlreadyCompleted);
    }

    #[test]
    fn starting_a_recording_stops_the_previous_one() {
        let mut playback = AudioPlayback::default();
        assert_eq!(playback.start("A"), None);
        assert!(playback.should_stop("B"));
        assert!(!playback.should_stop("A"));

        assert_eq!(playback.start("B"), Some("A".to_string()));
        assert_eq!(playback.playing(), Some("B"));
        assert!(playback.should_stop("A"));

        assert_eq!(playback.start("B"), None);
        playback.finish("A");
        assert_eq!(playback.playing(), Some("B"));
        playback.finish("B");
        assert_eq!(playback.playing(), None);
        assert!(!playback.should_stop("C"));
    }
}
