use std::cell::RefCell;
use std::rc::Rc;

/// Final result sent to the collector.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultReport {
    pub first_name: String,
    pub last_name: String,
    /// Whole seconds between start and completion.
    pub completion_time: u64,
    /// Percentage of stages answered correctly on the first attempt.
    pub score: u8,
    pub total_questions: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("failed to encode result payload: {0}")]
    Encode(String),
    #[error("result submission failed: {0}")]
    Network(String),
    #[error("collector responded with status {0}")]
    Status(u16),
}

/// Hands a finished report to whatever delivers it.
///
/// Implementations must return without waiting for delivery; the mission is
/// already complete by the time `dispatch` is called.
pub trait ResultDispatcher {
    fn dispatch(&self, report: ResultReport);
}

impl<D: ResultDispatcher + ?Sized> ResultDispatcher for Rc<D> {
    fn dispatch(&self, report: ResultReport) {
        (**self).dispatch(report)
    }
}

/// Logs the outcome of a delivery attempt. Failures never go further.
pub fn log_outcome(report: &ResultReport, outcome: &Result<(), ReportError>) {
    match outcome {
        Ok(()) => tracing::info!(
            score = report.score,
            completion_time = report.completion_time,
            "result submitted"
        ),
        Err(error) => tracing::warn!(%error, score = report.score, "result submission failed"),
    }
}

/// Writes the payload to the log instead of the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl ResultDispatcher for LogDispatcher {
    fn dispatch(&self, report: ResultReport) {
        match serde_json::to_string(&report) {
            Ok(payload) => tracing::info!(%payload, "result payload (not submitted)"),
            Err(error) => log_outcome(&report, &Err(ReportError::Encode(error.to_string()))),
        }
    }
}

/// Keeps every dispatched report. Useful to observe the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    reports: Rc<RefCell<Vec<ResultReport>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ResultReport> {
        self.reports.borrow().clone()
    }
}

impl ResultDispatcher for RecordingDispatcher {
    fn dispatch(&self, report: ResultReport) {
        self.reports.borrow_mut().push(report);
    }
}

/// `round(100 * part / whole)` with halves rounded up; an empty whole is 0%.
pub fn round_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }

    let part = part.min(whole);
    ((200 * part + whole) / (2 * whole)) as u8
}

/// Percentage of stages answered correctly on the first attempt.
pub fn score_percent(correct_first_attempts: usize, total: usize) -> u8 {
    round_percent(correct_first_attempts, total)
}

/// Headline shown next to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Perfect,
    Excellent,
    Good,
    KeepLearning,
}

impl Verdict {
    pub fn from_score(score: u8) -> Self {
        match score {
            100..=u8::MAX => Self::Perfect,
            80..=99 => Self::Excellent,
            60..=79 => Self::Good,
            _ => Self::KeepLearning,
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            Self::Perfect => "Perfect result!",
            Self::Excellent => "Excellent work!",
            Self::Good => "Good job!",
            Self::KeepLearning => "Keep learning!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CaptureSink, LineLayer};
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn captured<F: FnOnce()>(f: F) -> Vec<String> {
        let sink = CaptureSink::new();
        let subscriber =
            tracing_subscriber::registry().with(LineLayer::new(sink.clone(), Level::TRACE));
        tracing::subscriber::with_default(subscriber, f);
        sink.lines()
    }

    fn report() -> ResultReport {
        ResultReport {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            completion_time: 93,
            score: 80,
            total_questions: 5,
        }
    }

    #[test]
    fn payload_uses_camel_case_keys() {
        let value = serde_json::to_value(report()).expect("report should serialize");

        assert_eq!(
            value,
            serde_json::json!({
                "firstName": "Ada",
                "lastName": "Lovelace",
                "completionTime": 93,
                "score": 80,
                "totalQuestions": 5,
            })
        );
    }

    #[test]
    fn score_rounds_to_nearest_percent() {
        assert_eq!(score_percent(4, 5), 80);
        assert_eq!(score_percent(5, 5), 100);
        assert_eq!(score_percent(0, 5), 0);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
    }

    #[test]
    fn score_of_empty_mission_is_zero() {
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn verdict_thresholds() {
        assert_eq!(Verdict::from_score(100), Verdict::Perfect);
        assert_eq!(Verdict::from_score(80), Verdict::Excellent);
        assert_eq!(Verdict::from_score(79), Verdict::Good);
        assert_eq!(Verdict::from_score(60), Verdict::Good);
        assert_eq!(Verdict::from_score(59), Verdict::KeepLearning);
    }

    #[test]
    fn recording_dispatcher_shares_reports_between_clones() {
        let dispatcher = RecordingDispatcher::new();
        let handle = dispatcher.clone();
        dispatcher.dispatch(report());

        assert_eq!(handle.reports(), vec![report()]);
    }

    #[test]
    fn failed_delivery_is_logged_as_warning() {
        let lines = captured(|| log_outcome(&report(), &Err(ReportError::Status(500))));

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("WARN "));
        assert!(lines[0].contains("result submission failed"));
        assert!(lines[0].contains("error=collector responded with status 500"));
    }

    #[test]
    fn delivered_report_is_logged_as_info() {
        let lines = captured(|| log_outcome(&report(), &Ok(())));

        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("INFO "));
        assert!(lines[0].contains("result submitted score=80 completion_time=93"));
    }
}
