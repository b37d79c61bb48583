//! Relation membership: grouping outer and inner member fragments per relation

use crate::{Diagnostic, DiagnosticReason, Fragment, FragmentId, Result, StitchError};
use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Role of a way inside a multi-ring relation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Outer,
    Inner,
}

impl Role {
    /// Parse a member role tag. An empty role counts as outer.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim() {
            "" | "outer" => Ok(Role::Outer),
            "inner" => Ok(Role::Inner),
            other => Err(StitchError::UnknownRole(other.to_string())),
        }
    }
}

/// One `(relation, member, role)` row of the relation feed
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelationMember {
    pub relation_id: u64,
    pub member_fragment_id: FragmentId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub role: String,
}

/// All resolved members of one relation, split by role
///
/// Member order follows the feed order.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationGroup {
    pub relation_id: u64,
    pub outer: Vec<Fragment>,
    pub inner: Vec<Fragment>,
}

impl RelationGroup {
    fn new(relation_id: u64) -> Self {
        Self {
            relation_id,
            outer: Vec::new(),
            inner: Vec::new(),
        }
    }

    /// Ids of every member, outer first
    pub fn member_ids(&self) -> impl Iterator<Item = FragmentId> + '_ {
        self.outer.iter().chain(self.inner.iter()).map(|f| f.id)
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty() && self.inner.is_empty()
    }
}

/// Resolve the relation feed against the fragment pool
///
/// Members referencing missing fragments and members with unknown roles are skipped and
/// reported; the rest of their relation is still assembled. Groups are returned in
/// ascending relation id order, and relations with no resolved member are omitted.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn build_relation_groups(
    members: &[RelationMember],
    fragments: &HashMap<FragmentId, &Fragment>,
) -> (Vec<RelationGroup>, Vec<Diagnostic>) {
    let mut groups: BTreeMap<u64, RelationGroup> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for member in members {
        let role = match Role::from_tag(&member.role) {
            Ok(role) => role,
            Err(err) => {
                tracing::warn!(
                    "Relation {} member {}: {}",
                    member.relation_id,
                    member.member_fragment_id,
                    err
                );
                diagnostics.push(Diagnostic::new(
                    member.member_fragment_id,
                    DiagnosticReason::UnknownRole,
                    err.to_string(),
                ));
                continue;
            }
        };

        let Some(fragment) = fragments.get(&member.member_fragment_id) else {
            let err = StitchError::UnresolvedRelationMember {
                relation_id: member.relation_id,
                member_id: member.member_fragment_id,
            };
            tracing::debug!("{}", err);
            diagnostics.extend(Diagnostic::from_error(member.member_fragment_id, &err));
            continue;
        };

        let group = groups
            .entry(member.relation_id)
            .or_insert_with(|| RelationGroup::new(member.relation_id));
        match role {
            Role::Outer => group.outer.push((*fragment).clone()),
            Role::Inner => group.inner.push((*fragment).clone()),
        }
    }

    let groups = groups.into_values().filter(|g| !g.is_empty()).collect();
    (groups, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chain, FeatureCategory};

    fn fragment(id: FragmentId) -> Fragment {
        let chain = Chain::from_lon_lat(&[(id as f64, 0.0), (id as f64 + 1.0, 0.0)]).unwrap();
        Fragment::new(id, None, FeatureCategory::Water, 0, chain)
    }

    fn member(relation_id: u64, id: FragmentId, role: &str) -> RelationMember {
        RelationMember {
            relation_id,
            member_fragment_id: id,
            role: role.to_string(),
        }
    }

    #[test]
    fn test_role_from_tag() {
        assert_eq!(Role::from_tag("outer").unwrap(), Role::Outer);
        assert_eq!(Role::from_tag("").unwrap(), Role::Outer);
        assert_eq!(Role::from_tag("inner").unwrap(), Role::Inner);
        assert!(matches!(
            Role::from_tag("subarea"),
            Err(StitchError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_build_relation_groups() {
        let pool: Vec<Fragment> = (1..=4).map(fragment).collect();
        let index: HashMap<FragmentId, &Fragment> = pool.iter().map(|f| (f.id, f)).collect();
        let members = vec![
            member(20, 3, "inner"),
            member(10, 1, "outer"),
            member(10, 2, ""),
            member(20, 4, "outer"),
        ];

        let (groups, diagnostics) = build_relation_groups(&members, &index);
        assert!(diagnostics.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].relation_id, 10);
        assert_eq!(groups[0].outer.len(), 2);
        assert!(groups[0].inner.is_empty());
        assert_eq!(groups[1].relation_id, 20);
        assert_eq!(groups[1].inner[0].id, 3);
        assert_eq!(groups[1].member_ids().collect::<Vec<_>>(), vec![4, 3]);
    }

    #[test]
    fn test_unresolved_and_unknown_members_are_reported() {
        let pool = [fragment(1)];
        let index: HashMap<FragmentId, &Fragment> = pool.iter().map(|f| (f.id, f)).collect();
        let members = vec![
            member(10, 1, "outer"),
            member(10, 99, "outer"),
            member(11, 1, "label"),
        ];

        let (groups, diagnostics) = build_relation_groups(&members, &index);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].outer.len(), 1);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].id, 99);
        assert_eq!(
            diagnostics[0].reason,
            DiagnosticReason::UnresolvedRelationMember
        );
        assert_eq!(diagnostics[1].reason, DiagnosticReason::UnknownRole);
    }
}
