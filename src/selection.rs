//! Operator selection of snapshot records
use std::collections::BTreeSet;

use crate::connection::RecordId;

/// Ids the operator currently has marked.
///
/// Each selection event replaces the previous set. Ids are not checked against
/// the snapshot here; stale ones are caught when the selection is exported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<RecordId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = RecordId>,
    {
        self.ids = ids.into_iter().collect();
    }

    pub fn current(&self) -> &BTreeSet<RecordId> {
        &self.ids
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
