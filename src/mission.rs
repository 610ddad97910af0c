use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::catalog::Catalog;
use crate::matching::{MatchingBoard, MatchingError};
use crate::report::{ResultDispatcher, ResultReport, Verdict, round_percent, score_percent};
use crate::stage::Stage;
use crate::store::{CompletionGate, KeyValueStore, StoreError};

/// Where the agent is in the mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Welcome,
    NamePrompt,
    InStage(usize),
    Completed,
}

/// Answer state of the stage currently in play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnswerState {
    #[default]
    Unanswered,
    Answered {
        correct: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub first_name: String,
    pub last_name: String,
    /// Milliseconds timestamp taken when the first stage opened.
    pub start_time: Option<u64>,
    pub current_stage_index: usize,
    pub selected_option: Option<usize>,
    pub answer: AnswerState,
    /// One entry per answered stage: the correctness of its first answer.
    pub first_attempt_results: Vec<bool>,
    /// Pairing board of the current stage when it is a matching stage.
    pub matching: Option<MatchingBoard>,
    pub completed: bool,
}

impl Session {
    pub fn is_correct(&self) -> bool {
        self.answer == AnswerState::Answered { correct: true }
    }

    pub fn feedback_visible(&self) -> bool {
        self.answer != AnswerState::Unanswered
    }

    pub fn correct_first_attempts(&self) -> usize {
        self.first_attempt_results
            .iter()
            .filter(|correct| **correct)
            .count()
    }
}

/// Everything the completion screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSummary {
    pub first_name: String,
    pub last_name: String,
    pub score: u8,
    pub correct_first_attempts: usize,
    pub total_questions: usize,
    /// Whole seconds.
    pub completion_time: u64,
    pub verdict: Verdict,
}

impl CompletionSummary {
    pub fn report(&self) -> ResultReport {
        ResultReport {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            completion_time: self.completion_time,
            score: self.score,
            total_questions: self.total_questions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    /// Whether this answer was the one recorded for scoring.
    pub first_attempt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Stage(usize),
    Completed(CompletionSummary),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("the mission was already completed on this device")]
    Locked,
    #[error("first and last name are required")]
    NamesRequired,
    #[error("action is not available in the {phase:?} phase")]
    WrongPhase { phase: Phase },
    #[error("stage {requested} is not in play (current stage is {current})")]
    StageMismatch { requested: usize, current: usize },
    #[error("the current stage is already solved")]
    AlreadySolved,
    #[error("the current stage has not been solved yet")]
    NotSolved,
    #[error("option {index} does not exist; the stage has {count} options")]
    OptionOutOfRange { index: usize, count: usize },
    #[error("the current stage is answered by matching pairs")]
    NotChoiceStage,
    #[error("the current stage is not a matching stage")]
    NotMatchingStage,
    #[error(transparent)]
    Matching(#[from] MatchingError),
}

/// Drives the agent through the catalog.
///
/// The completion flag is read once when the controller is built and again on
/// [`restart`](Self::restart). While it is set the controller is locked and
/// the mission cannot be started.
pub struct MissionController<S, D> {
    catalog: Catalog,
    gate: CompletionGate<S>,
    dispatcher: D,
    rng: StdRng,
    phase: Phase,
    session: Session,
    summary: Option<CompletionSummary>,
    locked: bool,
}

impl<S: KeyValueStore, D: ResultDispatcher> MissionController<S, D> {
    pub fn new(catalog: Catalog, gate: CompletionGate<S>, dispatcher: D) -> Self {
        Self::with_rng(catalog, gate, dispatcher, StdRng::from_entropy())
    }

    /// Uses `rng` to shuffle matching boards; tests pass a seeded generator.
    pub fn with_rng(catalog: Catalog, gate: CompletionGate<S>, dispatcher: D, rng: StdRng) -> Self {
        let locked = gate.is_completed();
        if locked {
            tracing::info!(key = gate.key(), "mission already completed on this device");
        }

        Self {
            catalog,
            gate,
            dispatcher,
            rng,
            phase: Phase::Welcome,
            session: Session::default(),
            summary: None,
            locked,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn summary(&self) -> Option<&CompletionSummary> {
        self.summary.as_ref()
    }

    pub fn gate(&self) -> &CompletionGate<S> {
        &self.gate
    }

    pub fn current_stage(&self) -> Option<&Stage> {
        match self.phase {
            Phase::InStage(index) => self.catalog.stage(index),
            _ => None,
        }
    }

    /// Share of the mission reached, counting the current stage.
    pub fn progress_percent(&self) -> u8 {
        match self.phase {
            Phase::InStage(index) => round_percent(index + 1, self.catalog.len()),
            Phase::Completed => 100,
            Phase::Welcome | Phase::NamePrompt => 0,
        }
    }

    pub fn open_name_prompt(&mut self) -> Result<(), ProgressError> {
        if self.locked {
            return Err(ProgressError::Locked);
        }
        if self.phase != Phase::Welcome {
            return Err(ProgressError::WrongPhase { phase: self.phase });
        }

        self.phase = Phase::NamePrompt;
        Ok(())
    }

    pub fn set_first_name(&mut self, value: &str) -> Result<(), ProgressError> {
        self.ensure_before_start()?;
        self.session.first_name = value.to_string();
        Ok(())
    }

    pub fn set_last_name(&mut self, value: &str) -> Result<(), ProgressError> {
        self.ensure_before_start()?;
        self.session.last_name = value.to_string();
        Ok(())
    }

    pub fn can_start(&self) -> bool {
        !self.locked
            && !self.session.first_name.trim().is_empty()
            && !self.session.last_name.trim().is_empty()
    }

    /// Opens the first stage. Nothing changes when a name is blank.
    pub fn start(&mut self, now_ms: u64) -> Result<(), ProgressError> {
        if self.locked {
            return Err(ProgressError::Locked);
        }
        self.ensure_before_start()?;
        if !self.can_start() {
            return Err(ProgressError::NamesRequired);
        }

        self.session.first_name = self.session.first_name.trim().to_string();
        self.session.last_name = self.session.last_name.trim().to_string();
        self.session.start_time = Some(now_ms);
        self.session.first_attempt_results.clear();
        self.enter_stage(0);

        tracing::info!(
            agent = %format!("{} {}", self.session.first_name, self.session.last_name),
            stages = self.catalog.len(),
            "mission started"
        );
        Ok(())
    }

    /// Answers a single-choice stage. Retries are accepted until the stage is
    /// solved; only the first answer counts towards the score.
    pub fn select_option(
        &mut self,
        stage_index: usize,
        option_index: usize,
    ) -> Result<AnswerOutcome, ProgressError> {
        let index = self.stage_in_play(stage_index)?;
        let stage = &self.catalog.stages()[index];

        if stage.is_matching() {
            return Err(ProgressError::NotChoiceStage);
        }
        if self.session.is_correct() {
            return Err(ProgressError::AlreadySolved);
        }

        let correct = stage
            .options
            .get(option_index)
            .map(|option| option.correct)
            .ok_or(ProgressError::OptionOutOfRange {
                index: option_index,
                count: stage.options.len(),
            })?;

        self.session.selected_option = Some(option_index);
        Ok(self.record_answer(index, correct))
    }

    pub fn pick_left(&mut self, item: &str) -> Result<(), ProgressError> {
        Ok(self.editable_board()?.pick_left(item)?)
    }

    pub fn pick_right(&mut self, item: &str) -> Result<(), ProgressError> {
        Ok(self.editable_board()?.pick_right(item)?)
    }

    pub fn unmatch(&mut self, left: &str) -> Result<(), ProgressError> {
        Ok(self.editable_board()?.unmatch(left)?)
    }

    pub fn can_submit_matching(&self) -> bool {
        !self.session.is_correct()
            && self
                .session
                .matching
                .as_ref()
                .is_some_and(MatchingBoard::is_complete)
    }

    /// Evaluates the whole board at once.
    pub fn submit_matching(&mut self, stage_index: usize) -> Result<AnswerOutcome, ProgressError> {
        let index = self.stage_in_play(stage_index)?;
        if self.session.is_correct() {
            return Err(ProgressError::AlreadySolved);
        }

        let correct = self
            .session
            .matching
            .as_ref()
            .ok_or(ProgressError::NotMatchingStage)?
            .evaluate()?;

        Ok(self.record_answer(index, correct))
    }

    /// Moves past a solved stage. After the last stage the mission completes,
    /// the completion flag is stored and the result is handed to the
    /// dispatcher without waiting for delivery.
    pub fn advance(&mut self, now_ms: u64) -> Result<Advance, ProgressError> {
        let Phase::InStage(index) = self.phase else {
            return Err(ProgressError::WrongPhase { phase: self.phase });
        };
        if !self.session.is_correct() {
            return Err(ProgressError::NotSolved);
        }

        let next = index + 1;
        if next < self.catalog.len() {
            self.enter_stage(next);
            return Ok(Advance::Stage(next));
        }

        Ok(Advance::Completed(self.complete(now_ms)))
    }

    /// Back to the welcome screen with a fresh session. The completion flag is
    /// kept and read again, so after a finished run the controller is locked.
    pub fn restart(&mut self) {
        self.phase = Phase::Welcome;
        self.session = Session::default();
        self.summary = None;
        self.locked = self.gate.is_completed();
        tracing::debug!(locked = self.locked, "mission restarted");
    }

    /// Developer control: forget that the mission was completed here.
    pub fn reset_restriction(&mut self) -> Result<(), StoreError> {
        self.gate.clear()?;
        self.locked = false;
        tracing::info!(key = self.gate.key(), "completion restriction cleared");
        Ok(())
    }

    fn ensure_before_start(&self) -> Result<(), ProgressError> {
        match self.phase {
            Phase::Welcome | Phase::NamePrompt => Ok(()),
            phase => Err(ProgressError::WrongPhase { phase }),
        }
    }

    fn stage_in_play(&self, requested: usize) -> Result<usize, ProgressError> {
        match self.phase {
            Phase::InStage(current) if current == requested => Ok(current),
            Phase::InStage(current) => Err(ProgressError::StageMismatch { requested, current }),
            phase => Err(ProgressError::WrongPhase { phase }),
        }
    }

    fn editable_board(&mut self) -> Result<&mut MatchingBoard, ProgressError> {
        if !matches!(self.phase, Phase::InStage(_)) {
            return Err(ProgressError::WrongPhase { phase: self.phase });
        }
        if self.session.is_correct() {
            return Err(ProgressError::AlreadySolved);
        }

        self.session
            .matching
            .as_mut()
            .ok_or(ProgressError::NotMatchingStage)
    }

    fn enter_stage(&mut self, index: usize) {
        self.phase = Phase::InStage(index);
        self.session.current_stage_index = index;
        self.session.selected_option = None;
        self.session.answer = AnswerState::Unanswered;
        self.session.matching = self
            .catalog
            .stage(index)
            .filter(|stage| stage.is_matching())
            .map(|stage| MatchingBoard::new(&mut self.rng, &stage.matching_pairs));
    }

    fn record_answer(&mut self, index: usize, correct: bool) -> AnswerOutcome {
        let first_attempt = self.session.answer == AnswerState::Unanswered;
        if first_attempt {
            debug_assert_eq!(self.session.first_attempt_results.len(), index);
            self.session.first_attempt_results.push(correct);
        }
        self.session.answer = AnswerState::Answered { correct };

        tracing::debug!(stage = index, correct, first_attempt, "stage answered");
        AnswerOutcome {
            correct,
            first_attempt,
        }
    }

    fn complete(&mut self, now_ms: u64) -> CompletionSummary {
        let total_questions = self.catalog.len();
        let correct_first_attempts = self.session.correct_first_attempts();
        let score = score_percent(correct_first_attempts, total_questions);
        let started = self.session.start_time.unwrap_or(now_ms);

        let summary = CompletionSummary {
            first_name: self.session.first_name.clone(),
            last_name: self.session.last_name.clone(),
            score,
            correct_first_attempts,
            total_questions,
            completion_time: now_ms.saturating_sub(started) / 1000,
            verdict: Verdict::from_score(score),
        };

        self.phase = Phase::Completed;
        self.session.completed = true;
        self.summary = Some(summary.clone());

        if let Err(error) = self.gate.mark_completed() {
            tracing::warn!(%error, "completion flag could not be stored");
        }

        tracing::info!(
            score,
            correct_first_attempts,
            total_questions,
            completion_time = summary.completion_time,
            "mission completed"
        );
        self.dispatcher.dispatch(summary.report());

        summary
    }
}
