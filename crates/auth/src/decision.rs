//! Access decision engine.
//!
//! - No IO
//! - No panics
//! - Allow-only: a privilege is granted iff some role in the visitor's
//!   transitive closure has a matching grant.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};

use portcullis_core::ConfigResult;

use crate::graph::RoleGraph;
use crate::identity::Visitor;
use crate::permissions::PermissionTable;
use crate::policy::PolicyDocument;
use crate::roles::{GUEST_ROLE, RoleName};

/// Immutable snapshot of the role graph and the permission table.
///
/// `Send + Sync` and never mutated after construction, so one instance is
/// shared by every concurrently handled request.
#[derive(Debug, Clone)]
pub struct AccessControl {
    graph: RoleGraph,
    table: PermissionTable,
    loaded_at: DateTime<Utc>,
}

impl AccessControl {
    pub fn new(graph: RoleGraph, table: PermissionTable) -> Self {
        Self {
            graph,
            table,
            loaded_at: Utc::now(),
        }
    }

    /// Build the table from `policy` against `graph`.
    pub fn from_policy(graph: RoleGraph, policy: &PolicyDocument) -> ConfigResult<Self> {
        let table = policy.build_table(&graph)?;
        Ok(Self::new(graph, table))
    }

    pub fn graph(&self) -> &RoleGraph {
        &self.graph
    }

    pub fn table(&self) -> &PermissionTable {
        &self.table
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Every role the visitor inherits from, breadth-first, each once.
    pub fn effective_roles<'a>(&'a self, visitor: &'a Visitor) -> Vec<&'a RoleName> {
        self.closure(visitor.parents().iter())
    }

    fn closure<'a, I>(&'a self, start: I) -> Vec<&'a RoleName>
    where
        I: IntoIterator<Item = &'a RoleName>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&'a RoleName> = start.into_iter().collect();
        let mut roles = Vec::new();

        while let Some(role) = queue.pop_front() {
            if !seen.insert(role.as_str()) {
                continue;
            }
            roles.push(role);
            if let Some(parent) = self.graph.parent_of(role.as_str()) {
                queue.push_back(parent);
            }
        }
        roles
    }

    /// Whether the visitor may exercise `privilege` on `resource`.
    pub fn is_allowed(&self, visitor: &Visitor, resource: &str, privilege: &str) -> bool {
        self.granting_role(visitor, resource, privilege).is_some()
    }

    /// The first role in the visitor's closure that grants the privilege.
    pub fn granting_role<'a>(&'a self, visitor: &'a Visitor, resource: &str, privilege: &str) -> Option<&'a RoleName> {
        self.effective_roles(visitor)
            .into_iter()
            .find(|role| self.table.allows(role.as_str(), resource, privilege))
    }

    /// Same check rooted at a persisted role instead of a visitor.
    pub fn is_role_allowed(&self, role: &str, resource: &str, privilege: &str) -> bool {
        self.graph
            .ancestors(role)
            .into_iter()
            .any(|r| self.table.allows(r.as_str(), resource, privilege))
    }

    /// Whether any of `roles` is directly granted the privilege.
    ///
    /// Used over the full role universe to tell a route nobody can reach
    /// from one this visitor merely lacks.
    pub fn resource_has_any_rule_for_any_of<'r, I>(&self, roles: I, resource: &str, privilege: &str) -> bool
    where
        I: IntoIterator<Item = &'r str>,
    {
        roles
            .into_iter()
            .any(|role| self.table.allows(role, resource, privilege))
    }

    /// Whether any registered role at all can reach (resource, privilege).
    pub fn route_exists(&self, resource: &str, privilege: &str) -> bool {
        self.resource_has_any_rule_for_any_of(self.graph.role_names().map(RoleName::as_str), resource, privilege)
    }

    /// Whether the guest root may exercise the privilege.
    pub fn guest_allowed(&self, resource: &str, privilege: &str) -> bool {
        self.is_role_allowed(GUEST_ROLE, resource, privilege)
    }
}
