use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::stage::{Stage, StageKind};

const BUILTIN_STAGES: &str = include_str!("../catalog/stages.json");

/// Ordered, validated list of mission stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    stages: Vec<Stage>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("failed to read catalog file at {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {source}")]
    ParseError { source: serde_json::Error },
    #[error(transparent)]
    Invalid(#[from] CatalogError),
}

impl PartialEq for CatalogLoadError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ReadError { path: left, .. }, Self::ReadError { path: right, .. }) => {
                left == right
            }
            (Self::ParseError { .. }, Self::ParseError { .. }) => true,
            (Self::Invalid(left), Self::Invalid(right)) => left == right,
            _ => false,
        }
    }
}

impl Eq for CatalogLoadError {}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog must contain at least one stage")]
    Empty,
    #[error("stage id {id} appears more than once")]
    DuplicateId { id: u32 },
    #[error("stage {id} must have exactly one correct option but has {correct}")]
    CorrectOptionCount { id: u32, correct: usize },
    #[error("stage {id} has {count} options; a choice needs at least two")]
    TooFewOptions { id: u32, count: usize },
    #[error("matching stage {id} repeats the item {item:?}")]
    DuplicatePairItem { id: u32, item: String },
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
struct StageList {
    stages: Vec<Stage>,
}

impl Catalog {
    pub fn new(stages: Vec<Stage>) -> Result<Self, CatalogError> {
        validate(&stages)?;
        Ok(Self { stages })
    }

    /// The compiled-in mission.
    pub fn builtin() -> Result<Self, CatalogLoadError> {
        Self::from_json_str(BUILTIN_STAGES)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogLoadError> {
        let parsed: StageList = serde_json::from_str(json)
            .map_err(|source| CatalogLoadError::ParseError { source })?;

        Ok(Self::new(parsed.stages)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| CatalogLoadError::ReadError {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json_str(&data)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

fn validate(stages: &[Stage]) -> Result<(), CatalogError> {
    if stages.is_empty() {
        return Err(CatalogError::Empty);
    }

    let mut ids = HashSet::new();

    for stage in stages {
        if !ids.insert(stage.id) {
            return Err(CatalogError::DuplicateId { id: stage.id });
        }

        match stage.kind() {
            StageKind::Matching => validate_pairs(stage)?,
            StageKind::Choice | StageKind::AudioChoice => {
                if stage.options.len() < 2 {
                    return Err(CatalogError::TooFewOptions {
                        id: stage.id,
                        count: stage.options.len(),
                    });
                }

                let correct = stage.options.iter().filter(|option| option.correct).count();
                if correct != 1 {
                    return Err(CatalogError::CorrectOptionCount {
                        id: stage.id,
                        correct,
                    });
                }
            }
        }
    }

    Ok(())
}

fn validate_pairs(stage: &Stage) -> Result<(), CatalogError> {
    let mut lefts = HashSet::new();
    let mut rights = HashSet::new();

    for pair in &stage.matching_pairs {
        if !lefts.insert(pair.left.as_str()) {
            return Err(CatalogError::DuplicatePairItem {
                id: stage.id,
                item: pair.left.clone(),
            });
        }
        if !rights.insert(pair.right.as_str()) {
            return Err(CatalogError::DuplicatePairItem {
                id: stage.id,
                item: pair.right.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{MatchingPair, StageOption};
    use std::fs;

    fn option(text: &str, correct: bool) -> StageOption {
        StageOption {
            text: text.to_string(),
            correct,
        }
    }

    fn choice(id: u32, options: Vec<StageOption>) -> Stage {
        Stage {
            id,
            title: format!("Stage {id}"),
            description: String::new(),
            media: None,
            question: "?".to_string(),
            options,
            matching_pairs: Vec::new(),
            correct_feedback: "yes".to_string(),
            incorrect_feedback: "no".to_string(),
        }
    }

    #[test]
    fn builtin_catalog_has_five_valid_stages() {
        let catalog = Catalog::builtin().expect("builtin catalog should load");

        assert_eq!(catalog.len(), 5);
        assert_eq!(
            catalog
                .stages()
                .iter()
                .map(|stage| stage.id)
                .collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn builtin_catalog_mixes_stage_kinds() {
        let catalog = Catalog::builtin().expect("builtin catalog should load");
        let kinds: Vec<StageKind> = catalog.stages().iter().map(Stage::kind).collect();

        assert!(kinds.contains(&StageKind::Choice));
        assert!(kinds.contains(&StageKind::AudioChoice));
        assert!(kinds.contains(&StageKind::Matching));

        let matching = catalog
            .stages()
            .iter()
            .find(|stage| stage.is_matching())
            .expect("a matching stage exists");
        assert_eq!(matching.matching_pairs.len(), 5);
    }

    #[test]
    fn rejects_empty_catalog() {
        assert_eq!(Catalog::new(Vec::new()), Err(CatalogError::Empty));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let stages = vec![
            choice(1, vec![option("a", true), option("b", false)]),
            choice(1, vec![option("a", true), option("b", false)]),
        ];

        assert_eq!(
            Catalog::new(stages),
            Err(CatalogError::DuplicateId { id: 1 })
        );
    }

    #[test]
    fn rejects_two_correct_options() {
        let stages = vec![choice(3, vec![option("a", true), option("b", true)])];

        assert_eq!(
            Catalog::new(stages),
            Err(CatalogError::CorrectOptionCount { id: 3, correct: 2 })
        );
    }

    #[test]
    fn rejects_single_option() {
        let stages = vec![choice(4, vec![option("a", true)])];

        assert_eq!(
            Catalog::new(stages),
            Err(CatalogError::TooFewOptions { id: 4, count: 1 })
        );
    }

    #[test]
    fn rejects_stage_without_options() {
        let stages = vec![choice(6, Vec::new())];
        let error = Catalog::new(stages).expect_err("a stage needs options");

        assert_eq!(error, CatalogError::TooFewOptions { id: 6, count: 0 });
        assert_eq!(
            error.to_string(),
            "stage 6 has 0 options; a choice needs at least two"
        );
    }

    #[test]
    fn rejects_repeated_right_items() {
        let mut stage = choice(5, Vec::new());
        stage.matching_pairs = vec![
            MatchingPair {
                left: "Voltmeter".to_string(),
                right: "Voltage".to_string(),
            },
            MatchingPair {
                left: "Multimeter".to_string(),
                right: "Voltage".to_string(),
            },
        ];

        assert_eq!(
            Catalog::new(vec![stage]),
            Err(CatalogError::DuplicatePairItem {
                id: 5,
                item: "Voltage".to_string(),
            })
        );
    }

    #[test]
    fn parse_errors_surface() {
        let error = Catalog::from_json_str("{ \"stages\": 3 }").expect_err("invalid json");
        assert!(matches!(error, CatalogLoadError::ParseError { .. }));
    }

    #[test]
    fn loads_catalog_from_file() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let path = root.path().join("stages.json");
        let payload = StageList {
            stages: vec![choice(7, vec![option("a", false), option("b", true)])],
        };
        fs::write(
            &path,
            serde_json::to_string(&payload).expect("stage list should serialize"),
        )
        .expect("stage list should be written");

        let catalog = Catalog::from_file(&path).expect("catalog should load");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.stage(0).map(|stage| stage.id), Some(7));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let root = tempfile::tempdir().expect("temporary directory should be created");
        let path = root.path().join("absent.json");

        let error = Catalog::from_file(&path).expect_err("missing file should error");
        assert_eq!(
            error,
            CatalogLoadError::ReadError {
                path: path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
        );
    }
}
