//! Configuration error model.

use thiserror::Error;

/// Result type used while building the role graph and permission table.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-time failure.
///
/// Every variant is fatal for the snapshot being built: a process must not
/// start serving requests with a graph or table that failed to load.
/// Per-request denials are never represented here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A role's parent reference points at a role that was not supplied.
    #[error("role '{role}' references missing parent role id {parent_id}")]
    MissingParent { role: String, parent_id: u64 },

    /// Following parent references from a role revisits a role on the path.
    #[error("cyclic parent chain: {}", chain.join(" -> "))]
    CyclicParent { chain: Vec<String> },

    /// A persisted role uses a name reserved by the engine.
    #[error("role name '{0}' is reserved")]
    ReservedRoleName(String),

    /// Two distinct role ids share the same name.
    #[error("duplicate role name '{name}' (ids {first} and {second})")]
    DuplicateRoleName { name: String, first: u64, second: u64 },

    /// The same role id was supplied twice with different names.
    #[error("role id {id} supplied with names '{first}' and '{second}'")]
    DuplicateRoleId { id: u64, first: String, second: String },

    /// A rule references a role the graph does not know.
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// A rule references a resource that was never declared.
    #[error("undeclared resource '{0}'")]
    UndeclaredResource(String),

    /// A policy or role document could not be parsed.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// A configuration value (environment variable, identifier) is invalid.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// The role source collaborator failed to produce records.
    #[error("role source unavailable: {0}")]
    SourceUnavailable(String),
}

impl ConfigError {
    pub fn unknown_role(name: impl Into<String>) -> Self {
        Self::UnknownRole(name.into())
    }

    pub fn undeclared_resource(name: impl Into<String>) -> Self {
        Self::UndeclaredResource(name.into())
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value.to_string())
    }
}
