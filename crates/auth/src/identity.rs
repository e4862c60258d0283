//! Aggregate identity resolution.
//!
//! Every request is evaluated as the virtual role `current-visitor`, whose
//! parents are the roles assigned to whoever is making the request. The
//! visitor is a private per-request overlay on the shared graph: it is never
//! inserted into it, so concurrent requests cannot observe each other.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use portcullis_core::{RoleId, UserId};

use crate::graph::RoleGraph;
use crate::roles::{RoleName, VISITOR_ROLE};

/// The persisted user as far as access control is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Identifying label shown in navigation (username, email, ...).
    pub display_label: String,
}

impl UserRecord {
    pub fn new(id: UserId, display_label: impl Into<String>) -> Self {
        Self {
            id,
            display_label: display_label.into(),
        }
    }
}

/// Persistence-layer lookups needed to resolve a visitor.
pub trait UserDirectory {
    fn find_user(&self, id: UserId) -> Option<UserRecord>;

    /// Direct role assignments of the user (ids only, unresolved).
    fn role_assignments(&self, id: UserId) -> Vec<RoleId>;
}

/// The current request's visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visitor {
    user: Option<UserRecord>,
    parents: BTreeSet<RoleName>,
}

impl Visitor {
    /// An unauthenticated visitor; its only parent is `guest`.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            parents: BTreeSet::from([RoleName::GUEST]),
        }
    }

    /// A visitor with explicit parent roles. An empty set falls back to `guest`.
    pub fn with_roles<I>(user: Option<UserRecord>, roles: I) -> Self
    where
        I: IntoIterator<Item = RoleName>,
    {
        let mut parents: BTreeSet<RoleName> = roles.into_iter().collect();
        if parents.is_empty() {
            parents.insert(RoleName::GUEST);
        }
        Self { user, parents }
    }

    /// Name of the aggregate role, identical for every visitor.
    pub fn role_name(&self) -> &'static str {
        VISITOR_ROLE
    }

    pub fn parents(&self) -> &BTreeSet<RoleName> {
        &self.parents
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// The user's label, or `None` for anonymous visitors.
    pub fn display_label(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.display_label.as_str())
    }
}

/// Outcome of resolving a request's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub visitor: Visitor,
    /// The session named a user that no longer exists. The caller must
    /// clear the session identity.
    pub stale_session: bool,
}

/// Resolve the visitor for `authenticated_user_id`.
///
/// - no id: anonymous;
/// - id without a user record: anonymous, flagged as a stale session;
/// - otherwise: the names of the user's active assigned roles, or `guest`
///   when none remain.
///
/// Pure with respect to `graph`; calling it twice with the same inputs
/// yields equal visitors.
pub fn resolve_identity<D>(graph: &RoleGraph, authenticated_user_id: Option<UserId>, directory: &D) -> Resolution
where
    D: UserDirectory + ?Sized,
{
    let Some(user_id) = authenticated_user_id else {
        return Resolution {
            visitor: Visitor::anonymous(),
            stale_session: false,
        };
    };

    let Some(user) = directory.find_user(user_id) else {
        tracing::warn!(%user_id, "session refers to unknown user; demoting to guest");
        return Resolution {
            visitor: Visitor::anonymous(),
            stale_session: true,
        };
    };

    let roles: Vec<RoleName> = directory
        .role_assignments(user_id)
        .into_iter()
        .filter_map(|role_id| match graph.name_of(role_id) {
            Some(name) if graph.is_active(role_id) => Some(name.clone()),
            Some(name) => {
                tracing::debug!(%user_id, role = %name, "skipping inactive role assignment");
                None
            }
            None => {
                tracing::warn!(%user_id, %role_id, "skipping assignment to unknown role");
                None
            }
        })
        .collect();

    Resolution {
        visitor: Visitor::with_roles(Some(user), roles),
        stale_session: false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::roles::RoleRecord;
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// In-memory directory used across the crate's tests.
    #[derive(Debug, Default)]
    pub(crate) struct StaticDirectory {
        pub users: HashMap<UserId, (UserRecord, Vec<RoleId>)>,
    }

    impl StaticDirectory {
        pub fn with_user(mut self, id: u64, label: &str, roles: &[u64]) -> Self {
            let user_id = UserId::new(id);
            self.users.insert(
                user_id,
                (
                    UserRecord::new(user_id, label),
                    roles.iter().copied().map(RoleId::new).collect(),
                ),
            );
            self
        }
    }

    impl UserDirectory for StaticDirectory {
        fn find_user(&self, id: UserId) -> Option<UserRecord> {
            self.users.get(&id).map(|(user, _)| user.clone())
        }

        fn role_assignments(&self, id: UserId) -> Vec<RoleId> {
            self.users.get(&id).map(|(_, roles)| roles.clone()).unwrap_or_default()
        }
    }

    fn graph() -> RoleGraph {
        RoleGraph::load(vec![
            RoleRecord::new(1, "basic"),
            RoleRecord::new(2, "editor").with_parent(1),
            RoleRecord::new(3, "retired").inactive(),
        ])
        .unwrap()
    }

    fn parent_names(visitor: &Visitor) -> Vec<&str> {
        visitor.parents().iter().map(|r| r.as_str()).collect()
    }

    #[test]
    fn anonymous_visitor_inherits_guest() {
        let resolution = resolve_identity(&graph(), None, &StaticDirectory::default());
        assert!(!resolution.stale_session);
        assert!(!resolution.visitor.is_authenticated());
        assert_eq!(parent_names(&resolution.visitor), vec!["guest"]);
        assert_eq!(resolution.visitor.role_name(), VISITOR_ROLE);
    }

    #[test]
    fn unknown_user_is_a_stale_session() {
        let resolution = resolve_identity(&graph(), Some(UserId::new(9)), &StaticDirectory::default());
        assert!(resolution.stale_session);
        assert_eq!(resolution.visitor, Visitor::anonymous());
    }

    #[test]
    fn assignments_are_deduplicated_and_resolved() {
        let directory = StaticDirectory::default().with_user(7, "alice", &[2, 1, 2]);
        let resolution = resolve_identity(&graph(), Some(UserId::new(7)), &directory);

        assert!(resolution.visitor.is_authenticated());
        assert_eq!(resolution.visitor.display_label(), Some("alice"));
        assert_eq!(parent_names(&resolution.visitor), vec!["basic", "editor"]);
    }

    #[test]
    fn inactive_and_unknown_roles_are_skipped() {
        let directory = StaticDirectory::default().with_user(7, "alice", &[3, 42]);
        let resolution = resolve_identity(&graph(), Some(UserId::new(7)), &directory);

        assert!(resolution.visitor.is_authenticated());
        assert_eq!(parent_names(&resolution.visitor), vec!["guest"]);
    }

    #[test]
    fn resolution_is_idempotent() {
        let graph = graph();
        let directory = StaticDirectory::default().with_user(7, "alice", &[1]);
        let first = resolve_identity(&graph, Some(UserId::new(7)), &directory);
        let second = resolve_identity(&graph, Some(UserId::new(7)), &directory);
        assert_eq!(first, second);
        assert!(!graph.contains(VISITOR_ROLE));
    }

    proptest! {
        /// Property: the parent set ignores assignment order and repetition.
        #[test]
        fn parent_set_is_order_independent(mut roles in prop::collection::vec(1u64..=3, 0..8)) {
            let graph = graph();
            let forward = StaticDirectory::default().with_user(1, "u", &roles);
            roles.reverse();
            let backward = StaticDirectory::default().with_user(1, "u", &roles);

            let a = resolve_identity(&graph, Some(UserId::new(1)), &forward);
            let b = resolve_identity(&graph, Some(UserId::new(1)), &backward);
            prop_assert_eq!(a.visitor.parents(), b.visitor.parents());
            prop_assert!(!a.visitor.parents().is_empty());
        }
    }
}
