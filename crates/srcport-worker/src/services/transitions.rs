use srcport_core::{ServiceError, ServiceResult};
use srcport_entities::types::EntryState;
use std::collections::HashSet;

/// Which entry state changes are accepted.
///
/// The default is permissive: any state may follow any other. A restricted
/// table only accepts the listed `(from, to)` edges.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: Option<HashSet<(EntryState, EntryState)>>,
}

impl TransitionTable {
    pub fn permissive() -> Self {
        Self { edges: None }
    }

    pub fn restricted(edges: impl IntoIterator<Item = (EntryState, EntryState)>) -> Self {
        Self {
            edges: Some(edges.into_iter().collect()),
        }
    }

    pub fn allows(&self, from: EntryState, to: EntryState) -> bool {
        match &self.edges {
            None => true,
            Some(edges) => edges.contains(&(from, to)),
        }
    }

    pub fn check(&self, from: EntryState, to: EntryState) -> ServiceResult<()> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(ServiceError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_allows_everything() {
        let table = TransitionTable::default();
        assert!(table.allows(EntryState::Archived, EntryState::Archiving));
        assert!(table.allows(EntryState::Retracted, EntryState::Retracted));
    }

    #[test]
    fn test_restricted_rejects_unlisted_edges() {
        let table = TransitionTable::restricted([
            (EntryState::Archiving, EntryState::Archived),
            (EntryState::Archived, EntryState::Retracting),
        ]);
        assert!(table.check(EntryState::Archiving, EntryState::Archived).is_ok());

        let err = table
            .check(EntryState::Archived, EntryState::Archiving)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "illegal state transition from archived to archiving"
        );
        assert!(!err.is_retryable());
    }
}
