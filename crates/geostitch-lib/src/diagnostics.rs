//! Reason-coded records of every dropped or flagged id
//!
//! Per-feature failures never abort a run. They are turned into [`Diagnostic`]s and
//! returned next to the features so a batch can be investigated afterwards.

use crate::{FragmentId, StitchError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an id shows up in the diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DiagnosticReason {
    /// Fragment chain with fewer than two points
    InvalidGeometry,
    /// A relation references a fragment absent from the pool
    UnresolvedRelationMember,
    /// A merged ring chain could not be closed
    PolygonizationFailure,
    /// Every constituent id of a merged chain was already used by another feature
    IdExhausted,
    /// The feed contained the same fragment id more than once
    DuplicateFragment,
    /// A relation member carries a role that is neither inner nor outer
    UnknownRole,
}

/// One dropped or flagged id
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    pub id: FragmentId,
    pub reason: DiagnosticReason,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(id: FragmentId, reason: DiagnosticReason, detail: impl Into<String>) -> Self {
        Self {
            id,
            reason,
            detail: detail.into(),
        }
    }

    /// Record a recoverable error against an id
    ///
    /// Returns `None` for errors that are not reported per id (`EmptyPartition` is a
    /// no-op, unknown categories are rejected before the core).
    pub fn from_error(id: FragmentId, error: &StitchError) -> Option<Self> {
        let reason = match error {
            StitchError::InvalidGeometry(_) => DiagnosticReason::InvalidGeometry,
            StitchError::UnresolvedRelationMember { .. } => {
                DiagnosticReason::UnresolvedRelationMember
            }
            StitchError::PolygonizationFailure(_) => DiagnosticReason::PolygonizationFailure,
            StitchError::UnknownRole(_) => DiagnosticReason::UnknownRole,
            StitchError::EmptyPartition | StitchError::UnknownCategory(_) => return None,
        };
        Some(Self::new(id, reason, error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_maps_reason() {
        let d = Diagnostic::from_error(3, &StitchError::InvalidGeometry("1 point".into())).unwrap();
        assert_eq!(d.id, 3);
        assert_eq!(d.reason, DiagnosticReason::InvalidGeometry);
        assert!(d.detail.contains("1 point"));

        let d = Diagnostic::from_error(
            9,
            &StitchError::UnresolvedRelationMember {
                relation_id: 1,
                member_id: 9,
            },
        )
        .unwrap();
        assert_eq!(d.reason, DiagnosticReason::UnresolvedRelationMember);
    }

    #[test]
    fn test_empty_partition_is_not_reported() {
        assert!(Diagnostic::from_error(1, &StitchError::EmptyPartition).is_none());
    }
}
