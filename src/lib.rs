pub mod catalog;
pub mod config;
pub mod logging;
pub mod matching;
pub mod mission;
pub mod report;
pub mod screen;
pub mod stage;
pub mod store;
#[cfg(not(target_arch = "wasm32"))]
pub mod terminal;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use catalog::{Catalog, CatalogError, CatalogLoadError};
pub use config::{ConfigError, MissionConfig};
pub use matching::{MatchingBoard, MatchingError};
pub use mission::{
    Advance, AnswerOutcome, AnswerState, CompletionSummary, MissionController, Phase,
    ProgressError, Session,
};
pub use report::{
    LogDispatcher, RecordingDispatcher, ReportError, ResultDispatcher, ResultReport, Verdict,
    score_percent,
};
pub use screen::Screen;
pub use stage::{AudioSample, MatchingPair, Media, Stage, StageKind, StageOption};
pub use store::{CompletionGate, FileStore, KeyValueStore, MemoryStore, StoreError};
