//! Dispatch guard configuration.
//!
//! Which routes count as "login", "logout" and "landing" is application
//! policy, so it is configured here rather than hard-coded in the guard.

use serde::{Deserialize, Serialize};

use portcullis_core::{ConfigError, ConfigResult};

use crate::resources::{Privilege, Resource};

/// A route the guard may redirect to, together with the (resource,
/// privilege) pair the router maps it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub resource: Resource,
    pub privilege: Privilege,
    pub path: String,
}

impl RouteTarget {
    pub fn new(resource: impl Into<Resource>, privilege: impl Into<Privilege>, path: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            privilege: privilege.into(),
            path: path.into(),
        }
    }

    pub fn matches(&self, resource: &str, privilege: &str) -> bool {
        self.resource.as_str() == resource && self.privilege.as_str() == privilege
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Default landing page for every denial that does not go to login.
    pub landing_path: String,
    pub login: RouteTarget,
    pub logout: RouteTarget,
    /// Query parameter carrying the return location on login redirects.
    pub redirect_param: String,
    /// Navigation label for visitors without a user record.
    pub anonymous_label: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            landing_path: "/".to_string(),
            login: RouteTarget::new("user", "login", "/user/login"),
            logout: RouteTarget::new("user", "logout", "/user/logout"),
            redirect_param: "redirectUrl".to_string(),
            anonymous_label: "Guest".to_string(),
        }
    }
}

impl GuardConfig {
    /// Defaults overridden by `PORTCULLIS_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("PORTCULLIS_LANDING_PATH") {
            config.landing_path = v;
        }
        if let Some(v) = lookup("PORTCULLIS_LOGIN_RESOURCE") {
            config.login.resource = Resource::from(v);
        }
        if let Some(v) = lookup("PORTCULLIS_LOGIN_PRIVILEGE") {
            config.login.privilege = Privilege::from(v);
        }
        if let Some(v) = lookup("PORTCULLIS_LOGIN_PATH") {
            config.login.path = v;
        }
        if let Some(v) = lookup("PORTCULLIS_LOGOUT_RESOURCE") {
            config.logout.resource = Resource::from(v);
        }
        if let Some(v) = lookup("PORTCULLIS_LOGOUT_PRIVILEGE") {
            config.logout.privilege = Privilege::from(v);
        }
        if let Some(v) = lookup("PORTCULLIS_LOGOUT_PATH") {
            config.logout.path = v;
        }
        if let Some(v) = lookup("PORTCULLIS_REDIRECT_PARAM") {
            config.redirect_param = v;
        }
        if let Some(v) = lookup("PORTCULLIS_ANONYMOUS_LABEL") {
            config.anonymous_label = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Redirect targets must be local absolute paths.
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, path) in [
            ("landing_path", &self.landing_path),
            ("login.path", &self.login.path),
            ("logout.path", &self.logout.path),
        ] {
            if !path.starts_with('/') || path.starts_with("//") {
                return Err(ConfigError::invalid_value(key, format!("{path:?} is not a local absolute path")));
            }
        }
        if self.redirect_param.trim().is_empty() {
            return Err(ConfigError::invalid_value("redirect_param", "must not be empty"));
        }
        Ok(())
    }
}
