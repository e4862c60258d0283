//! Permission table: which roles may exercise which privileges on which
//! resources.
//!
//! Allow-only. Anything not granted here is denied. Rules accumulate: a
//! second rule for the same (role, resource) pair widens the grant and
//! never narrows it.

use std::collections::{BTreeSet, HashMap};

use portcullis_core::{ConfigError, ConfigResult};

use crate::graph::RoleGraph;
use crate::resources::{Privilege, Resource};
use crate::roles::RoleName;

/// The privileges a grant covers on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privileges {
    /// Every privilege on the resource, including ones added later.
    All,
    Only(BTreeSet<Privilege>),
}

impl Privileges {
    pub fn only<I>(privileges: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Privilege>,
    {
        Self::Only(privileges.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn covers(&self, privilege: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(privilege),
        }
    }

    fn merge(&mut self, other: &Privileges) {
        match other {
            Self::All => *self = Self::All,
            Self::Only(theirs) => {
                if let Self::Only(mine) = self {
                    mine.extend(theirs.iter().cloned());
                }
            }
        }
    }
}

impl From<Option<Vec<Privilege>>> for Privileges {
    /// `None` means every privilege.
    fn from(value: Option<Vec<Privilege>>) -> Self {
        match value {
            None => Self::All,
            Some(list) => Self::Only(list.into_iter().collect()),
        }
    }
}

/// Immutable role × resource → privileges mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionTable {
    resources: BTreeSet<Resource>,
    grants: HashMap<RoleName, HashMap<Resource, Privileges>>,
}

impl PermissionTable {
    /// Start a table whose rules are validated against `graph`.
    pub fn builder(graph: &RoleGraph) -> PermissionTableBuilder<'_> {
        PermissionTableBuilder {
            graph,
            table: PermissionTable::default(),
        }
    }

    pub fn is_declared(&self, resource: &str) -> bool {
        self.resources.contains(resource)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Direct grant of `role` on `resource`, ignoring inheritance.
    pub fn grant(&self, role: &str, resource: &str) -> Option<&Privileges> {
        self.grants.get(role).and_then(|by_resource| by_resource.get(resource))
    }

    /// Whether `role` is directly granted `privilege` on `resource`.
    pub fn allows(&self, role: &str, resource: &str, privilege: &str) -> bool {
        self.grant(role, resource).is_some_and(|p| p.covers(privilege))
    }

    /// Roles directly granted `privilege` on `resource`, sorted by name.
    pub fn roles_granting(&self, resource: &str, privilege: &str) -> Vec<&RoleName> {
        let mut roles: Vec<&RoleName> = self
            .grants
            .iter()
            .filter(|(_, by_resource)| by_resource.get(resource).is_some_and(|p| p.covers(privilege)))
            .map(|(role, _)| role)
            .collect();
        roles.sort();
        roles
    }

    /// Number of distinct (role, resource) grants.
    pub fn grant_count(&self) -> usize {
        self.grants.values().map(HashMap::len).sum()
    }
}

/// Builder enforcing that every referenced role and resource exists.
#[derive(Debug)]
pub struct PermissionTableBuilder<'g> {
    graph: &'g RoleGraph,
    table: PermissionTable,
}

impl<'g> PermissionTableBuilder<'g> {
    /// Declare a resource. Rules may only reference declared resources.
    pub fn resource(mut self, name: impl Into<Resource>) -> Self {
        self.table.resources.insert(name.into());
        self
    }

    pub fn resources<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Resource>,
    {
        self.table.resources.extend(names.into_iter().map(Into::into));
        self
    }

    /// Allow every role in `roles` the given privileges on every resource in
    /// `resources`.
    pub fn allow<R, S>(mut self, roles: R, resources: S, privileges: Privileges) -> ConfigResult<Self>
    where
        R: IntoIterator,
        R::Item: Into<RoleName>,
        S: IntoIterator,
        S::Item: Into<Resource>,
    {
        let roles: Vec<RoleName> = roles.into_iter().map(Into::into).collect();
        let resources: Vec<Resource> = resources.into_iter().map(Into::into).collect();

        for role in &roles {
            if role.is_reserved() {
                return Err(ConfigError::ReservedRoleName(role.to_string()));
            }
            if !self.graph.contains(role.as_str()) {
                return Err(ConfigError::unknown_role(role.as_str()));
            }
        }
        for resource in &resources {
            if !self.table.is_declared(resource.as_str()) {
                return Err(ConfigError::undeclared_resource(resource.as_str()));
            }
        }

        for role in roles {
            let by_resource = self.table.grants.entry(role).or_default();
            for resource in &resources {
                by_resource
                    .entry(resource.clone())
                    .and_modify(|existing| existing.merge(&privileges))
                    .or_insert_with(|| privileges.clone());
            }
        }
        Ok(self)
    }

    pub fn build(self) -> PermissionTable {
        tracing::info!(
            resources = self.table.resources.len(),
            grants = self.table.grant_count(),
            "permission table built"
        );
        self.table
    }
}
