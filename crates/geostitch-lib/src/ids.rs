//! Run-wide registry of output ids

use crate::{Diagnostic, DiagnosticReason, FragmentId};
use std::collections::HashSet;

/// Set of ids already emitted during a run
///
/// Each merged chain takes the first of its constituent ids that nobody has used yet, so
/// output ids stay traceable to a source fragment and never collide.
#[derive(Debug, Default, Clone)]
pub struct UsedIds {
    used: HashSet<FragmentId>,
}

impl UsedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an id as taken. Returns `false` if it already was.
    pub fn reserve(&mut self, id: FragmentId) -> bool {
        self.used.insert(id)
    }

    pub fn contains(&self, id: FragmentId) -> bool {
        self.used.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Pick the output id for a merged chain from its constituent ids
    ///
    /// When every constituent is already taken, the first one is reused and an
    /// [`DiagnosticReason::IdExhausted`] diagnostic is returned alongside it.
    pub fn assign(&mut self, constituents: &[FragmentId]) -> (FragmentId, Option<Diagnostic>) {
        if let Some(&id) = constituents.iter().find(|id| !self.used.contains(id)) {
            self.used.insert(id);
            return (id, None);
        }

        let id = constituents.first().copied().unwrap_or_default();
        tracing::warn!(
            "All {} constituent ids of merged chain {} are already used",
            constituents.len(),
            id
        );
        let diagnostic = Diagnostic::new(
            id,
            DiagnosticReason::IdExhausted,
            format!(
                "every constituent id {:?} was already assigned",
                constituents
            ),
        );
        (id, Some(diagnostic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_first_unused() {
        let mut ids = UsedIds::new();
        assert_eq!(ids.assign(&[5, 6, 7]), (5, None));
        assert_eq!(ids.assign(&[5, 6, 7]), (6, None));
        assert!(ids.contains(5));
        assert!(ids.contains(6));
        assert!(!ids.contains(7));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_reserved_ids_are_skipped() {
        let mut ids = UsedIds::new();
        assert!(ids.reserve(1));
        assert!(!ids.reserve(1));
        assert_eq!(ids.assign(&[1, 2]).0, 2);
    }

    #[test]
    fn test_exhausted_ids() {
        let mut ids = UsedIds::new();
        ids.reserve(3);
        ids.reserve(4);
        let (id, diagnostic) = ids.assign(&[3, 4]);
        assert_eq!(id, 3);
        let diagnostic = diagnostic.unwrap();
        assert_eq!(diagnostic.reason, DiagnosticReason::IdExhausted);
        assert_eq!(diagnostic.id, 3);
    }
}
