//! Line-oriented view of the mission for terminals.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::mission::MissionController;
use crate::report::ResultDispatcher;
use crate::screen::{Feedback, MatchingScreen, OptionState, QuestionScreen, Screen, StageHeader};
use crate::stage::StageKind;
use crate::store::KeyValueStore;

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    Choose(usize),
    Left(usize),
    Right(usize),
    Unmatch(usize),
    Submit,
    Next,
    Restart,
    Reset,
    Quit,
    Text(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let mut words = trimmed.split_whitespace();
        let head = words.next().unwrap_or_default().to_ascii_lowercase();
        let number = words.next().and_then(|word| word.parse::<usize>().ok());

        match (head.as_str(), number) {
            ("", _) => Self::Continue,
            ("l", Some(n)) => Self::Left(n),
            ("r", Some(n)) => Self::Right(n),
            ("u", Some(n)) => Self::Unmatch(n),
            ("submit", None) => Self::Submit,
            ("next" | "n", None) => Self::Next,
            ("restart", None) => Self::Restart,
            ("reset", None) => Self::Reset,
            ("quit" | "q", None) => Self::Quit,
            _ => match trimmed.parse::<usize>() {
                Ok(n) => Self::Choose(n),
                Err(_) => Self::Text(trimmed.to_string()),
            },
        }
    }
}

fn render_header(out: &mut String, header: &StageHeader) {
    let _ = writeln!(
        out,
        "Agent {} | Stage {} of {} | {}% complete",
        header.agent_name, header.number, header.total, header.progress_percent
    );
    let _ = writeln!(out, "\n== {} ==", header.title);
    let _ = writeln!(out, "{}", header.description);
    if let Some((_, alt)) = &header.image {
        let _ = writeln!(out, "[image: {alt}]");
    }
    let _ = writeln!(out, "\n> {}", header.question);
}

fn render_feedback(out: &mut String, feedback: &Option<Feedback>) {
    if let Some(feedback) = feedback {
        let mark = if feedback.correct { "Correct!" } else { "Incorrect!" };
        let _ = writeln!(out, "\n{mark} {}", feedback.message);
    }
}

fn next_hint(out: &mut String, can_advance: bool, is_last: bool) {
    if can_advance {
        let label = if is_last { "finish the mission" } else { "next stage" };
        let _ = writeln!(out, "Type `next` to {label}.");
    }
}

fn render_question(out: &mut String, question: &QuestionScreen) {
    render_header(out, &question.header);

    if question.kind == StageKind::AudioChoice {
        let _ = writeln!(out, "\nRecordings:");
        for sample in &question.audio {
            let _ = writeln!(
                out,
                "  Recording {} ({}, volume {:.0}%)",
                sample.label,
                sample.url,
                sample.volume * 100.0
            );
        }
    }

    let _ = writeln!(out);
    for option in &question.options {
        let marker = match option.state {
            OptionState::Idle => " ",
            OptionState::SelectedCorrect => "+",
            OptionState::SelectedWrong => "x",
        };
        let _ = writeln!(out, " {marker} {}. {}", option.index + 1, option.text);
    }

    render_feedback(out, &question.feedback);
    next_hint(out, question.can_advance, question.header.is_last);
}

fn render_matching(out: &mut String, board: &MatchingScreen) {
    render_header(out, &board.header);

    let _ = writeln!(out, "\nPairs made: {} of {}", board.paired, board.pairs_total);
    let _ = writeln!(out, "\nInstrument:");
    for (index, item) in board.left.iter().enumerate() {
        let cursor = if item.selected { ">" } else { " " };
        match &item.matched_with {
            Some(right) => {
                let _ = writeln!(out, " {cursor} {}. {} -> {right}", index + 1, item.text);
            }
            None => {
                let _ = writeln!(out, " {cursor} {}. {}", index + 1, item.text);
            }
        }
    }

    let _ = writeln!(out, "\nMeasures:");
    for (index, item) in board.right.iter().enumerate() {
        let used = if item.used { " (used)" } else { "" };
        let _ = writeln!(out, "   {}. {}{used}", index + 1, item.text);
    }

    render_feedback(out, &board.feedback);
    if board.editable {
        let _ = writeln!(
            out,
            "\n`l N` picks an instrument, `r N` its match, `u N` removes a pair."
        );
        if board.can_submit {
            let _ = writeln!(out, "Type `submit` to check your pairs.");
        }
    }
    next_hint(out, board.can_advance, board.header.is_last);
}

/// Renders a screen as plain text.
pub fn render(screen: &Screen) -> String {
    let mut out = String::new();

    match screen {
        Screen::AlreadyCompleted => {
            let _ = writeln!(out, "You have already completed this mission on this device.");
            let _ = writeln!(out, "A second run would not be recorded.");
            let _ = writeln!(out, "(developer: type `reset` to clear the restriction)");
        }
        Screen::Welcome { stage_count } => {
            let _ = writeln!(out, "Operation \"Agent 7-B\"");
            let _ = writeln!(
                out,
                "Communication between agents is down. Pass {stage_count} trials on signal level measurement to restore it."
            );
            let _ = writeln!(out, "Press Enter to begin.");
        }
        Screen::NameForm(form) => {
            let _ = writeln!(out, "Identify yourself, agent.");
            if form.first_name.trim().is_empty() {
                let _ = writeln!(out, "First name:");
            } else {
                let _ = writeln!(out, "Last name:");
            }
        }
        Screen::Question(question) => render_question(&mut out, question),
        Screen::Matching(board) => render_matching(&mut out, board),
        Screen::Completion(summary) => {
            let _ = writeln!(out, "Mission accomplished!");
            let _ = writeln!(
                out,
                "Outstanding, {} {}! The link is restored.",
                summary.first_name, summary.last_name
            );
            let _ = writeln!(out, "Score: {}%", summary.score);
            let _ = writeln!(
                out,
                "Correct on the first attempt: {} of {}",
                summary.correct_first_attempts, summary.total_questions
            );
            let _ = writeln!(out, "{}", summary.verdict.headline());
            let _ = writeln!(out, "Type `restart` to return to the start, `quit` to leave.");
        }
    }

    out
}

/// Applies one command to the controller. Rejected actions are logged and
/// otherwise ignored, the same way disabled buttons do nothing.
pub fn apply<S: KeyValueStore, D: ResultDispatcher>(
    controller: &mut MissionController<S, D>,
    command: Command,
    now_ms: u64,
) {
    let screen = Screen::of(controller);

    let result = match (&screen, command) {
        (Screen::AlreadyCompleted, Command::Reset) => {
            if let Err(error) = controller.reset_restriction() {
                tracing::warn!(%error, "restriction could not be cleared");
            }
            Ok(())
        }
        (Screen::Welcome { .. }, Command::Continue) => controller.open_name_prompt(),
        (Screen::NameForm(form), Command::Text(value)) => {
            if form.first_name.trim().is_empty() {
                controller.set_first_name(&value)
            } else {
                controller
                    .set_last_name(&value)
                    .and_then(|()| controller.start(now_ms))
            }
        }
        (Screen::Question(question), Command::Choose(n)) if n > 0 => controller
            .select_option(question.header.stage_index, n - 1)
            .map(|_| ()),
        (Screen::Matching(board), Command::Left(n)) if n > 0 => match board.left.get(n - 1) {
            Some(item) => controller.pick_left(&item.text),
            None => Ok(()),
        },
        (Screen::Matching(board), Command::Right(n)) if n > 0 => match board.right.get(n - 1) {
            Some(item) => controller.pick_right(&item.text),
            None => Ok(()),
        },
        (Screen::Matching(board), Command::Unmatch(n)) if n > 0 => match board.left.get(n - 1) {
            Some(item) => controller.unmatch(&item.text),
            None => Ok(()),
        },
        (Screen::Matching(board), Command::Submit) => controller
            .submit_matching(board.header.stage_index)
            .map(|_| ()),
        (Screen::Question(_) | Screen::Matching(_), Command::Next) => {
            controller.advance(now_ms).map(|_| ())
        }
        (Screen::Completion(_), Command::Restart) => {
            controller.restart();
            Ok(())
        }
        _ => Ok(()),
    };

    if let Err(error) = result {
        tracing::debug!(%error, "action rejected");
    }
}

/// Plays the mission until the input ends or the agent quits.
pub fn run<S, D, R, W, C>(
    controller: &mut MissionController<S, D>,
    input: R,
    mut output: W,
    clock: C,
) -> io::Result<()>
where
    S: KeyValueStore,
    D: ResultDispatcher,
    R: BufRead,
    W: Write,
    C: Fn() -> u64,
{
    write!(output, "{}", render(&Screen::of(controller)))?;

    for line in input.lines() {
        let line = line?;
        let command = match Screen::of(controller) {
            Screen::NameForm(_) if line.trim() != "quit" => Command::Text(line.trim().to_string()),
            _ => Command::parse(&line),
        };
        if command == Command::Quit {
            break;
        }

        apply(controller, command, clock());
        writeln!(output)?;
        write!(output, "{}", render(&Screen::of(controller)))?;
    }

    output.flush()
}
