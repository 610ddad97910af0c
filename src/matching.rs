use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::stage::MatchingPair;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatchingError {
    #[error("unknown left item: {item}")]
    UnknownLeft { item: String },
    #[error("unknown right item: {item}")]
    UnknownRight { item: String },
    #[error("select a left item before choosing its match")]
    NoLeftSelected,
    #[error("{item} is already paired with {left}")]
    RightInUse { item: String, left: String },
    #[error("{left} has no match to remove")]
    NotMatched { left: String },
    #[error("{paired} of {total} items are paired")]
    Incomplete { paired: usize, total: usize },
}

/// Tentative pairing state for one matching stage.
///
/// Left items keep catalog order. Right items are shuffled once when the board
/// is built so the canonical pairing is not given away by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingBoard {
    pairs: Vec<MatchingPair>,
    right_items: Vec<String>,
    selected_left: Option<String>,
    matches: BTreeMap<String, String>,
}

impl MatchingBoard {
    pub fn new<R: Rng + ?Sized>(rng: &mut R, pairs: &[MatchingPair]) -> Self {
        let mut right_items: Vec<String> = pairs.iter().map(|pair| pair.right.clone()).collect();
        right_items.shuffle(rng);

        Self {
            pairs: pairs.to_vec(),
            right_items,
            selected_left: None,
            matches: BTreeMap::new(),
        }
    }

    pub fn left_items(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|pair| pair.left.as_str())
    }

    pub fn right_items(&self) -> &[String] {
        &self.right_items
    }

    pub fn selected_left(&self) -> Option<&str> {
        self.selected_left.as_deref()
    }

    pub fn match_for(&self, left: &str) -> Option<&str> {
        self.matches.get(left).map(String::as_str)
    }

    /// Left item currently paired with `right`, if any.
    pub fn owner_of(&self, right: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|(_, value)| value.as_str() == right)
            .map(|(left, _)| left.as_str())
    }

    pub fn paired_count(&self) -> usize {
        self.matches.len()
    }

    pub fn total(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_complete(&self) -> bool {
        self.paired_count() == self.total()
    }

    pub fn pick_left(&mut self, item: &str) -> Result<(), MatchingError> {
        if !self.pairs.iter().any(|pair| pair.left == item) {
            return Err(MatchingError::UnknownLeft {
                item: item.to_string(),
            });
        }

        self.selected_left = Some(item.to_string());
        Ok(())
    }

    /// Pairs the selected left item with `item`, replacing any earlier match of
    /// that left item.
    pub fn pick_right(&mut self, item: &str) -> Result<(), MatchingError> {
        if !self.right_items.iter().any(|right| right == item) {
            return Err(MatchingError::UnknownRight {
                item: item.to_string(),
            });
        }

        let left = self
            .selected_left
            .clone()
            .ok_or(MatchingError::NoLeftSelected)?;

        if let Some(owner) = self.owner_of(item) {
            if owner != left {
                return Err(MatchingError::RightInUse {
                    item: item.to_string(),
                    left: owner.to_string(),
                });
            }
        }

        self.matches.insert(left, item.to_string());
        self.selected_left = None;
        Ok(())
    }

    pub fn unmatch(&mut self, left: &str) -> Result<(), MatchingError> {
        self.matches
            .remove(left)
            .map(|_| ())
            .ok_or_else(|| MatchingError::NotMatched {
                left: left.to_string(),
            })
    }

    /// All-or-nothing check against the canonical pairing.
    pub fn evaluate(&self) -> Result<bool, MatchingError> {
        if !self.is_complete() {
            return Err(MatchingError::Incomplete {
                paired: self.matches.len(),
                total: self.pairs.len(),
            });
        }

        Ok(self
            .pairs
            .iter()
            .all(|pair| self.match_for(&pair.left) == Some(pair.right.as_str())))
    }
}
