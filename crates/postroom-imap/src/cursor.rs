//! Search result cursors.
//!
//! A [`SearchCursor`] is the identifier list a search returned, captured
//! at creation time and bound to the folder the search ran against.
//! Iteration needs no live connection, restarts from the beginning any
//! number of times, and always yields UIDs rather than sequence
//! numbers, so the cursor stays resolvable across intervening expunges.

use crate::types::Uid;

/// Orderings for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently arrived message first.
    #[default]
    NewestFirst,
    /// Ascending arrival order.
    OldestFirst,
}

impl SortOrder {
    /// Applies the ordering to a server-returned identifier list.
    ///
    /// Search results arrive in ascending arrival order, so
    /// `NewestFirst` reverses in place. This only reorders, leaving
    /// membership untouched.
    pub fn apply<T>(self, ids: &mut [T]) {
        if matches!(self, Self::NewestFirst) {
            ids.reverse();
        }
    }
}

/// An ordered, restartable sequence of message UIDs from one search.
///
/// Bound to the folder that was selected when the search ran; an
/// expunge in that folder removes messages but does not renumber UIDs,
/// so the cursor's surviving entries keep resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCursor {
    folder: String,
    uids: Vec<Uid>,
}

impl SearchCursor {
    /// Builds a cursor over a server-returned UID list, applying the
    /// requested ordering.
    #[must_use]
    pub(crate) fn new(folder: String, mut uids: Vec<Uid>, order: SortOrder) -> Self {
        order.apply(&mut uids);
        Self { folder, uids }
    }

    /// The folder the search ran against.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Returns `true` if the search matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// The captured identifier list, in cursor order.
    #[must_use]
    pub fn uids(&self) -> &[Uid] {
        &self.uids
    }

    /// Iterates over the matches from the start.
    ///
    /// May be called any number of times; each call restarts.
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.uids.iter().copied()
    }
}

impl IntoIterator for SearchCursor {
    type Item = Uid;
    type IntoIter = std::vec::IntoIter<Uid>;

    fn into_iter(self) -> Self::IntoIter {
        self.uids.into_iter()
    }
}

impl<'a> IntoIterator for &'a SearchCursor {
    type Item = &'a Uid;
    type IntoIter = std::slice::Iter<'a, Uid>;

    fn into_iter(self) -> Self::IntoIter {
        self.uids.iter()
    }
}
