//! Declarative policy document.
//!
//! The JSON form of the permission table an application author writes once:
//!
//! ```json
//! {
//!   "resources": ["user", "admin"],
//!   "rules": [
//!     { "roles": "guest", "resources": "user", "privileges": ["login", "register"] },
//!     { "roles": ["basic", "admin"], "resources": "user", "privileges": ["profile", "logout"] },
//!     { "roles": "admin", "resources": "admin", "privileges": null }
//!   ]
//! }
//! ```
//!
//! A `null` or missing `privileges` grants every privilege on the resource.

use serde::{Deserialize, Serialize};

use portcullis_core::ConfigResult;

use crate::graph::RoleGraph;
use crate::permissions::{PermissionTable, Privileges};
use crate::resources::{Privilege, Resource};
use crate::roles::RoleName;

/// A single name or a list of names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub roles: OneOrMany<RoleName>,
    pub resources: OneOrMany<Resource>,
    #[serde(default)]
    pub privileges: Option<Vec<Privilege>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
}

impl PolicyDocument {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate every rule against `graph` and assemble the table.
    ///
    /// All resources are declared before the first rule is applied.
    pub fn build_table(&self, graph: &RoleGraph) -> ConfigResult<PermissionTable> {
        let mut builder = PermissionTable::builder(graph).resources(self.resources.iter().cloned());
        for rule in &self.rules {
            builder = builder.allow(
                rule.roles.clone().into_vec(),
                rule.resources.clone().into_vec(),
                Privileges::from(rule.privileges.clone()),
            )?;
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::RoleRecord;
    use portcullis_core::ConfigError;

    const POLICY: &str = r#"{
        "resources": ["user", "admin"],
        "rules": [
            { "roles": "guest", "resources": "user", "privileges": ["login"] },
            { "roles": ["basic", "admin"], "resources": "user", "privileges": ["profile", "logout"] },
            { "roles": "admin", "resources": ["admin"], "privileges": null },
            { "roles": "basic", "resources": "admin" }
        ]
    }"#;

    fn graph() -> RoleGraph {
        RoleGraph::load(vec![RoleRecord::new(1, "basic"), RoleRecord::new(2, "admin").with_parent(1)]).unwrap()
    }

    #[test]
    fn single_names_and_lists_both_parse() {
        let doc = PolicyDocument::from_json_str(POLICY).unwrap();
        assert_eq!(doc.rules.len(), 4);
        assert_eq!(doc.rules[0].roles, OneOrMany::One(RoleName::from("guest")));
        assert!(matches!(doc.rules[1].roles, OneOrMany::Many(ref r) if r.len() == 2));
        assert_eq!(doc.rules[2].privileges, None);
        assert_eq!(doc.rules[3].privileges, None);
    }

    #[test]
    fn builds_table_from_document() {
        let table = PolicyDocument::from_json_str(POLICY).unwrap().build_table(&graph()).unwrap();

        assert!(table.allows("guest", "user", "login"));
        assert!(table.allows("admin", "user", "logout"));
        assert!(table.allows("admin", "admin", "dashboard"));
        assert!(table.allows("basic", "admin", "dashboard"));
        assert!(!table.allows("guest", "user", "profile"));
    }

    #[test]
    fn rule_referencing_undeclared_resource_fails() {
        let doc = PolicyDocument::from_json_str(
            r#"{ "resources": ["user"], "rules": [{ "roles": "basic", "resources": "photo" }] }"#,
        )
        .unwrap();
        assert_eq!(doc.build_table(&graph()).unwrap_err(), ConfigError::undeclared_resource("photo"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PolicyDocument::from_json_str("{ \"rules\": 3 }").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }
}
