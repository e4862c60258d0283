//! Role graph store.
//!
//! Holds every persisted role plus the synthetic `guest` root, each with at
//! most one parent. Built once from the persistence layer and read-only
//! afterwards, so a single instance is shared by all concurrent requests.

use std::collections::{HashMap, HashSet};

use portcullis_core::{ConfigError, ConfigResult, RoleId};

use crate::roles::{RoleName, RoleRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RoleNode {
    /// `None` only for the synthetic guest root that no record merged into.
    id: Option<RoleId>,
    parent: Option<RoleName>,
    description: String,
    active: bool,
}

/// Immutable role-inheritance forest with memoized id → name lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGraph {
    nodes: HashMap<RoleName, RoleNode>,
    by_id: HashMap<RoleId, RoleName>,
    /// Registration order: every role appears after its parent.
    order: Vec<RoleName>,
}

impl RoleGraph {
    /// A graph holding only the synthetic `guest` root.
    pub fn guest_only() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            RoleName::GUEST,
            RoleNode {
                id: None,
                parent: None,
                description: String::new(),
                active: true,
            },
        );
        Self {
            nodes,
            by_id: HashMap::new(),
            order: vec![RoleName::GUEST],
        }
    }

    /// Build the graph from every persisted role.
    ///
    /// Records may arrive in any order; each role's parent chain is
    /// registered before the role itself. Fails on a missing parent, a
    /// cyclic chain, a reserved name or a name/id collision.
    pub fn load<I>(roles: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = RoleRecord>,
    {
        let records: Vec<RoleRecord> = roles.into_iter().collect();

        let mut index: HashMap<RoleId, usize> = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if record.name.is_reserved() {
                return Err(ConfigError::ReservedRoleName(record.name.to_string()));
            }
            if let Some(&prev) = index.get(&record.id) {
                if records[prev].name != record.name {
                    return Err(ConfigError::DuplicateRoleId {
                        id: record.id.get(),
                        first: records[prev].name.to_string(),
                        second: record.name.to_string(),
                    });
                }
                continue;
            }
            index.insert(record.id, pos);
        }

        let mut graph = Self::guest_only();
        for record in &records {
            graph.ensure_registered(record, &records, &index)?;
        }

        tracing::info!(
            roles = graph.len(),
            supplied = records.len(),
            "role graph loaded"
        );
        Ok(graph)
    }

    /// Register `start` and any unregistered ancestors, root-most first.
    ///
    /// Walks parent links with an explicit stack; the on-path set turns a
    /// cycle into an error instead of an unbounded walk.
    fn ensure_registered(
        &mut self,
        start: &RoleRecord,
        records: &[RoleRecord],
        index: &HashMap<RoleId, usize>,
    ) -> ConfigResult<()> {
        let mut pending: Vec<&RoleRecord> = Vec::new();
        let mut on_path: HashSet<RoleId> = HashSet::new();
        let mut current = start;

        loop {
            if self.is_registered(current)? {
                break;
            }
            if !on_path.insert(current.id) {
                let mut chain: Vec<String> = pending.iter().map(|r| r.name.to_string()).collect();
                chain.push(current.name.to_string());
                return Err(ConfigError::CyclicParent { chain });
            }
            pending.push(current);

            let Some(parent_id) = current.parent else {
                break;
            };
            let pos = index.get(&parent_id).ok_or_else(|| ConfigError::MissingParent {
                role: current.name.to_string(),
                parent_id: parent_id.get(),
            })?;
            current = &records[*pos];
        }

        while let Some(record) = pending.pop() {
            self.insert(record)?;
        }
        Ok(())
    }

    /// Whether `record` is already present.
    ///
    /// A record named `guest` merges into the synthetic root.
    fn is_registered(&mut self, record: &RoleRecord) -> ConfigResult<bool> {
        let Some(node) = self.nodes.get_mut(record.name.as_str()) else {
            return Ok(false);
        };

        match node.id {
            Some(id) if id == record.id => Ok(true),
            Some(id) => Err(ConfigError::DuplicateRoleName {
                name: record.name.to_string(),
                first: id.get(),
                second: record.id.get(),
            }),
            None => {
                if record.parent.is_some() {
                    tracing::warn!(role = %record.name, "ignoring parent of persisted guest role");
                }
                node.id = Some(record.id);
                node.description = record.description.clone();
                node.active = record.active;
                self.by_id.insert(record.id, record.name.clone());
                Ok(true)
            }
        }
    }

    fn insert(&mut self, record: &RoleRecord) -> ConfigResult<()> {
        let parent = match record.parent {
            None => None,
            Some(parent_id) => Some(self.by_id.get(&parent_id).cloned().ok_or_else(|| {
                ConfigError::MissingParent {
                    role: record.name.to_string(),
                    parent_id: parent_id.get(),
                }
            })?),
        };

        self.nodes.insert(
            record.name.clone(),
            RoleNode {
                id: Some(record.id),
                parent,
                description: record.description.clone(),
                active: record.active,
            },
        );
        self.by_id.insert(record.id, record.name.clone());
        self.order.push(record.name.clone());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Memoized id → name lookup used when resolving role assignments.
    pub fn name_of(&self, id: RoleId) -> Option<&RoleName> {
        self.by_id.get(&id)
    }

    /// `false` for unknown ids.
    pub fn is_active(&self, id: RoleId) -> bool {
        self.by_id
            .get(&id)
            .and_then(|name| self.nodes.get(name.as_str()))
            .is_some_and(|node| node.active)
    }

    pub fn parent_of(&self, name: &str) -> Option<&RoleName> {
        self.nodes.get(name).and_then(|node| node.parent.as_ref())
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.nodes.get(name).map(|node| node.description.as_str())
    }

    /// `name` followed by its parent chain up to the root.
    ///
    /// Empty when `name` is not registered.
    pub fn ancestors(&self, name: &str) -> Vec<&RoleName> {
        let mut chain = Vec::new();
        let Some((first, _)) = self.nodes.get_key_value(name) else {
            return chain;
        };

        let mut current = Some(first);
        while let Some(role) = current {
            // Load guarantees acyclicity; the bound keeps a corrupted graph finite.
            if chain.len() > self.nodes.len() {
                break;
            }
            chain.push(role);
            current = self.parent_of(role.as_str());
        }
        chain
    }

    /// Every registered role, parents before children, `guest` first.
    pub fn role_names(&self) -> impl Iterator<Item = &RoleName> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the guest root is always present.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for RoleGraph {
    fn default() -> Self {
        Self::guest_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{GUEST_ROLE, VISITOR_ROLE};
    use proptest::prelude::*;

    fn names(chain: Vec<&RoleName>) -> Vec<&str> {
        chain.into_iter().map(|r| r.as_str()).collect()
    }

    #[test]
    fn guest_root_is_always_registered() {
        let graph = RoleGraph::load(Vec::new()).unwrap();
        assert!(graph.contains(GUEST_ROLE));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.parent_of(GUEST_ROLE), None);
    }

    #[test]
    fn children_may_precede_parents() {
        let graph = RoleGraph::load(vec![
            RoleRecord::new(3, "admin").with_parent(2),
            RoleRecord::new(2, "editor").with_parent(1),
            RoleRecord::new(1, "basic"),
        ])
        .unwrap();

        assert_eq!(names(graph.ancestors("admin")), vec!["admin", "editor", "basic"]);
        assert_eq!(graph.name_of(RoleId::new(2)).map(|r| r.as_str()), Some("editor"));

        let order: Vec<&str> = graph.role_names().map(|r| r.as_str()).collect();
        assert_eq!(order, vec!["guest", "basic", "editor", "admin"]);
    }

    #[test]
    fn persisted_guest_merges_into_root() {
        let graph = RoleGraph::load(vec![
            RoleRecord::new(1, "guest").with_description("Anonymous visitors"),
            RoleRecord::new(2, "basic").with_parent(1).with_description("Registered users"),
        ])
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.description("guest"), Some("Anonymous visitors"));
        assert_eq!(graph.description("basic"), Some("Registered users"));
        assert_eq!(graph.description("nobody"), None);
        assert_eq!(graph.name_of(RoleId::new(1)).map(|r| r.as_str()), Some("guest"));
        assert_eq!(names(graph.ancestors("basic")), vec!["basic", "guest"]);
    }

    #[test]
    fn repeated_record_is_idempotent() {
        let graph = RoleGraph::load(vec![RoleRecord::new(1, "basic"), RoleRecord::new(1, "basic")]).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn missing_parent_fails_fast() {
        let err = RoleGraph::load(vec![RoleRecord::new(2, "editor").with_parent(9)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingParent {
                role: "editor".into(),
                parent_id: 9
            }
        );
    }

    #[test]
    fn cyclic_chain_is_rejected() {
        let err = RoleGraph::load(vec![
            RoleRecord::new(1, "a").with_parent(2),
            RoleRecord::new(2, "b").with_parent(1),
        ])
        .unwrap_err();
        match err {
            ConfigError::CyclicParent { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_parent_is_rejected() {
        let err = RoleGraph::load(vec![RoleRecord::new(1, "a").with_parent(1)]).unwrap_err();
        assert!(matches!(err, ConfigError::CyclicParent { .. }));
    }

    #[test]
    fn reserved_visitor_name_is_rejected() {
        let err = RoleGraph::load(vec![RoleRecord::new(1, VISITOR_ROLE)]).unwrap_err();
        assert_eq!(err, ConfigError::ReservedRoleName(VISITOR_ROLE.to_string()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = RoleGraph::load(vec![RoleRecord::new(1, "basic"), RoleRecord::new(2, "basic")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoleName { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = RoleGraph::load(vec![RoleRecord::new(1, "basic"), RoleRecord::new(1, "other")]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoleId { id: 1, .. }));
    }

    #[test]
    fn inactive_roles_stay_in_the_chain() {
        let graph = RoleGraph::load(vec![
            RoleRecord::new(1, "basic").inactive(),
            RoleRecord::new(2, "editor").with_parent(1),
        ])
        .unwrap();
        assert!(!graph.is_active(RoleId::new(1)));
        assert!(graph.is_active(RoleId::new(2)));
        assert!(!graph.is_active(RoleId::new(99)));
        assert_eq!(names(graph.ancestors("editor")), vec!["editor", "basic"]);
    }

    /// A valid forest: role `i` may only point at a role with a smaller index.
    fn forest() -> impl Strategy<Value = Vec<RoleRecord>> {
        prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), 1..24)
            .prop_map(|parents| {
                parents
                    .into_iter()
                    .enumerate()
                    .map(|(i, parent)| {
                        let record = RoleRecord::new(i as u64 + 1, format!("role-{i}"));
                        match parent {
                            Some(idx) if i > 0 => record.with_parent(idx.index(i) as u64 + 1),
                            _ => record,
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: following parent links from any role terminates within
        /// |roles| steps regardless of the order records are supplied in.
        #[test]
        fn parent_chains_are_finite(records in forest()) {
            let total = records.len();
            let graph = RoleGraph::load(records.clone()).unwrap();
            prop_assert_eq!(graph.len(), total + 1);

            for record in &records {
                let chain = graph.ancestors(record.name.as_str());
                prop_assert!(!chain.is_empty());
                prop_assert!(chain.len() <= total);

                let mut step = record.name.as_str();
                let mut steps = 0;
                while let Some(parent) = graph.parent_of(step) {
                    step = parent.as_str();
                    steps += 1;
                    prop_assert!(steps <= total);
                }
            }
        }

        /// Property: registration order always lists a parent before its child.
        #[test]
        fn parents_register_first(records in forest()) {
            let graph = RoleGraph::load(records).unwrap();
            let position: HashMap<&str, usize> = graph
                .role_names()
                .enumerate()
                .map(|(i, r)| (r.as_str(), i))
                .collect();
            for role in graph.role_names() {
                if let Some(parent) = graph.parent_of(role.as_str()) {
                    prop_assert!(position[parent.as_str()] < position[role.as_str()]);
                }
            }
        }
    }
}
