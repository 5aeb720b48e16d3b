//! Role hierarchy
//!
//! Core role types used by the authorization engine. Privilege is a total
//! order: a lower rank means more privilege, and `External` is the
//! always-satisfiable unauthenticated baseline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role level for request authorization
///
/// Declaration order is the privilege order (most privileged first), so the
/// derived `Ord` gives `Admin < GroupCreator < ... < External`. Comparisons
/// go through this type rather than bare integers; [`RoleLevel::rank`] exists
/// only for display and wire purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleLevel {
    /// Operator with the configured admin secret
    Admin,
    /// Creator of the group being acted on
    GroupCreator,
    /// Creator of the edit being acted on
    EditCreator,
    /// Plain member of the group being acted on
    GroupMember,
    /// Unauthenticated baseline, always satisfied
    External,
}

impl RoleLevel {
    /// Numeric rank; lower means more privileged.
    pub const fn rank(&self) -> u8 {
        match self {
            RoleLevel::Admin => 0,
            RoleLevel::GroupCreator => 1,
            RoleLevel::EditCreator => 2,
            RoleLevel::GroupMember => 3,
            RoleLevel::External => 4,
        }
    }

    /// Get the role name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoleLevel::Admin => "admin",
            RoleLevel::GroupCreator => "group_creator",
            RoleLevel::EditCreator => "edit_creator",
            RoleLevel::GroupMember => "group_member",
            RoleLevel::External => "external",
        }
    }

    /// Try to parse a role from a string
    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(RoleLevel::Admin),
            "group_creator" => Some(RoleLevel::GroupCreator),
            "edit_creator" => Some(RoleLevel::EditCreator),
            "group_member" => Some(RoleLevel::GroupMember),
            "external" => Some(RoleLevel::External),
            _ => None,
        }
    }

    /// All roles, most privileged first
    pub fn all() -> &'static [RoleLevel] {
        &[
            RoleLevel::Admin,
            RoleLevel::GroupCreator,
            RoleLevel::EditCreator,
            RoleLevel::GroupMember,
            RoleLevel::External,
        ]
    }

    /// Whether this role is at least as privileged as `required`.
    pub fn satisfies(&self, required: RoleLevel) -> bool {
        *self <= required
    }
}

impl fmt::Display for RoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The identity a single request has proven
///
/// Built once by the role resolver and read-only afterwards. The satisfied
/// set always contains `External`, so [`ResolvedIdentity::effective_role`]
/// is total.
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    /// Subject id derived from a verified bearer token, if any
    pub subject_id: Option<i64>,
    satisfied: BTreeSet<RoleLevel>,
    /// Decode error text from the bearer token, kept for the decision log
    pub token_error: Option<String>,
}

impl ResolvedIdentity {
    /// Create an identity with only the `External` baseline.
    pub fn external() -> Self {
        let mut satisfied = BTreeSet::new();
        satisfied.insert(RoleLevel::External);
        Self {
            subject_id: None,
            satisfied,
            token_error: None,
        }
    }

    /// Record an additional proven role.
    pub(crate) fn grant(&mut self, role: RoleLevel) {
        self.satisfied.insert(role);
    }

    /// Whether a specific role was proven (not via subsumption).
    pub fn has_role(&self, role: RoleLevel) -> bool {
        self.satisfied.contains(&role)
    }

    /// The single most privileged role this identity has proven.
    pub fn effective_role(&self) -> RoleLevel {
        // The set is never empty; External is inserted at construction.
        *self
            .satisfied
            .iter()
            .next()
            .unwrap_or(&RoleLevel::External)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in RoleLevel::all() {
            let parsed = RoleLevel::try_parse(role.as_str()).unwrap();
            assert_eq!(*role, parsed);
        }
    }

    #[test]
    fn test_privilege_order() {
        assert!(RoleLevel::Admin < RoleLevel::GroupCreator);
        assert!(RoleLevel::GroupCreator < RoleLevel::EditCreator);
        assert!(RoleLevel::EditCreator < RoleLevel::GroupMember);
        assert!(RoleLevel::GroupMember < RoleLevel::External);
    }

    #[test]
    fn test_rank_matches_order() {
        let mut ranks: Vec<u8> = RoleLevel::all().iter().map(|r| r.rank()).collect();
        let sorted = ranks.clone();
        ranks.sort_unstable();
        assert_eq!(ranks, sorted);
        assert_eq!(ranks, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_satisfies() {
        assert!(RoleLevel::Admin.satisfies(RoleLevel::GroupMember));
        assert!(RoleLevel::GroupMember.satisfies(RoleLevel::GroupMember));
        assert!(!RoleLevel::External.satisfies(RoleLevel::GroupMember));
        // Everything satisfies the baseline
        for role in RoleLevel::all() {
            assert!(role.satisfies(RoleLevel::External));
        }
    }

    #[test]
    fn test_external_identity() {
        let identity = ResolvedIdentity::external();
        assert_eq!(identity.effective_role(), RoleLevel::External);
        assert!(identity.has_role(RoleLevel::External));
        assert!(identity.subject_id.is_none());
    }

    #[test]
    fn test_effective_role_is_min() {
        let mut identity = ResolvedIdentity::external();
        identity.grant(RoleLevel::GroupMember);
        assert_eq!(identity.effective_role(), RoleLevel::GroupMember);

        identity.grant(RoleLevel::GroupCreator);
        assert_eq!(identity.effective_role(), RoleLevel::GroupCreator);

        // A less privileged grant never lowers the effective role
        identity.grant(RoleLevel::EditCreator);
        assert_eq!(identity.effective_role(), RoleLevel::GroupCreator);
    }
}
