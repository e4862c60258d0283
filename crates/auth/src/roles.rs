use std::borrow::{Borrow, Cow};

use serde::{Deserialize, Serialize};

use portcullis_core::RoleId;

/// Name of the synthetic root role every anonymous visitor resolves to.
pub const GUEST_ROLE: &str = "guest";

/// Reserved name of the per-request aggregate role.
///
/// Never registered in the shared graph and never persisted.
pub const VISITOR_ROLE: &str = "current-visitor";

/// Role name used for RBAC lookups.
///
/// Names are the join key between the role graph, the permission table and
/// the per-request visitor overlay.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub const GUEST: RoleName = RoleName(Cow::Borrowed(GUEST_ROLE));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_guest(&self) -> bool {
        self.as_str() == GUEST_ROLE
    }

    pub fn is_reserved(&self) -> bool {
        self.as_str() == VISITOR_ROLE
    }
}

impl Borrow<str> for RoleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for RoleName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted role as supplied by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: RoleName,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// At most one parent; roles form a forest.
    #[serde(default)]
    pub parent: Option<RoleId>,
}

fn default_active() -> bool {
    true
}

impl RoleRecord {
    pub fn new(id: u64, name: impl Into<RoleName>) -> Self {
        Self {
            id: RoleId::new(id),
            name: name.into(),
            description: String::new(),
            active: true,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(RoleId::new(parent));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn role_names_look_up_by_str() {
        let mut map = HashMap::new();
        map.insert(RoleName::from("basic"), 1);
        assert_eq!(map.get("basic"), Some(&1));
        assert!(RoleName::GUEST.is_guest());
        assert!(RoleName::from(VISITOR_ROLE).is_reserved());
    }

    #[test]
    fn role_record_defaults_from_json() {
        let record: RoleRecord = serde_json::from_str(r#"{"id": 3, "name": "editor", "parent": 1}"#).unwrap();
        assert_eq!(record, RoleRecord::new(3, "editor").with_parent(1));
        assert!(record.active);
    }
}
