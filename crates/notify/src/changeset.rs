use keys::ColKey;
use std::collections::{BTreeSet, HashMap};

/// A structured diff between two committed versions of a live view,
/// expressed as index sets over the view's *current* row ordinals (spec
/// §4.8). Indices refer to positions in the new (post-change) ordering;
/// `moves` pairs are `(from, to)` against the old and new orderings
/// respectively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub insertions: BTreeSet<usize>,
    pub deletions: BTreeSet<usize>,
    pub modifications: BTreeSet<usize>,
    pub moves: Vec<(usize, usize)>,
    pub columns: HashMap<ColKey, BTreeSet<usize>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty() && self.moves.is_empty()
    }

    /// The `{deletions: {0}}` shape delivered once to an accessor whose
    /// backing object was removed (spec §4.8).
    pub fn single_deletion() -> ChangeSet {
        let mut changes = ChangeSet::default();
        changes.deletions.insert(0);
        changes
    }
}

/// What a [`crate::Notifier`] hands its registered callback: either the
/// computed diff, or the error from re-evaluating the view (spec §4.8:
/// `(ChangeSet, error?) → ()`).
#[derive(Debug)]
pub enum Delivery {
    Changed(ChangeSet),
    Error(store::Error),
}
