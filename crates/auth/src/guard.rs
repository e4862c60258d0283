//! Dispatch guard.
//!
//! Runs once per request before the target handler. Allowed requests
//! proceed; every other request resolves to exactly one redirect, chosen by
//! the first matching entry of [`PRECEDENCE`].

use serde::Serialize;

use portcullis_core::RequestId;

use crate::config::GuardConfig;
use crate::decision::AccessControl;
use crate::identity::Visitor;
use crate::redirect::{same_origin_path, with_query_param};
use crate::resources::{Privilege, Resource};

/// What the router knows about the incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Requested location as received (may be an absolute URL).
    pub path: String,
    pub resource: Resource,
    pub privilege: Privilege,
}

impl RequestContext {
    pub fn new(path: impl Into<String>, resource: impl Into<Resource>, privilege: impl Into<Privilege>) -> Self {
        Self {
            request_id: RequestId::new(),
            path: path.into(),
            resource: resource.into(),
            privilege: privilege.into(),
        }
    }
}

/// Why a request was not allowed to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    RouteNotFound,
    AlreadyLoggedIn,
    PermissionDenied,
    LogoutWhileAnonymous,
    LoginRequired,
    ForcedLogout,
    Unexpected,
}

impl DenialKind {
    /// User-facing message shown after the redirect.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Self::RouteNotFound => Some("The requested page does not exist."),
            Self::AlreadyLoggedIn => Some("You tried to log in, but you are already logged in."),
            Self::PermissionDenied | Self::LoginRequired => {
                Some("You do not have permission to visit the requested page.")
            }
            Self::LogoutWhileAnonymous => Some("You tried to log out, but you are not logged in."),
            Self::ForcedLogout => None,
            Self::Unexpected => Some("Something went wrong."),
        }
    }

    pub fn target(self) -> RedirectTarget {
        match self {
            Self::LogoutWhileAnonymous | Self::LoginRequired => RedirectTarget::Login,
            Self::ForcedLogout => RedirectTarget::Logout,
            Self::RouteNotFound | Self::AlreadyLoggedIn | Self::PermissionDenied | Self::Unexpected => {
                RedirectTarget::Landing
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    Landing,
    Login,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub kind: DenialKind,
    pub target: RedirectTarget,
    /// Local path (with query) to send the visitor to.
    pub location: String,
    pub message: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Proceed,
    Redirect(Redirect),
}

impl DispatchOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Proceed => None,
            Self::Redirect(r) => Some(r),
        }
    }
}

/// Everything the precedence rules look at for a denied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchFacts {
    pub authenticated: bool,
    /// Some role, in the whole universe, is granted the target.
    pub route_exists: bool,
    pub targets_login: bool,
    pub targets_logout: bool,
    pub guest_may_login: bool,
    pub guest_may_logout: bool,
}

impl DispatchFacts {
    pub fn gather(access: &AccessControl, visitor: &Visitor, request: &RequestContext, config: &GuardConfig) -> Self {
        let resource = request.resource.as_str();
        let privilege = request.privilege.as_str();
        Self {
            authenticated: visitor.is_authenticated(),
            route_exists: access.route_exists(resource, privilege),
            targets_login: config.login.matches(resource, privilege),
            targets_logout: config.logout.matches(resource, privilege),
            guest_may_login: access.guest_allowed(config.login.resource.as_str(), config.login.privilege.as_str()),
            guest_may_logout: access.guest_allowed(config.logout.resource.as_str(), config.logout.privilege.as_str()),
        }
    }
}

type Predicate = fn(&DispatchFacts) -> bool;

fn route_missing(f: &DispatchFacts) -> bool {
    !f.route_exists
}

fn login_while_authenticated(f: &DispatchFacts) -> bool {
    f.authenticated && f.targets_login
}

fn authenticated(f: &DispatchFacts) -> bool {
    f.authenticated
}

fn logout_while_anonymous(f: &DispatchFacts) -> bool {
    !f.authenticated && f.targets_logout && f.guest_may_login
}

fn anonymous_may_login(f: &DispatchFacts) -> bool {
    !f.authenticated && f.guest_may_login
}

fn anonymous_may_only_logout(f: &DispatchFacts) -> bool {
    !f.authenticated && !f.guest_may_login && f.guest_may_logout
}

fn always(_: &DispatchFacts) -> bool {
    true
}

/// Denial cases in strict precedence order; the first match wins.
pub const PRECEDENCE: [(Predicate, DenialKind); 7] = [
    (route_missing, DenialKind::RouteNotFound),
    (login_while_authenticated, DenialKind::AlreadyLoggedIn),
    (authenticated, DenialKind::PermissionDenied),
    (logout_while_anonymous, DenialKind::LogoutWhileAnonymous),
    (anonymous_may_login, DenialKind::LoginRequired),
    (anonymous_may_only_logout, DenialKind::ForcedLogout),
    (always, DenialKind::Unexpected),
];

/// Pick the denial for a request that was not allowed.
pub fn select_denial(facts: &DispatchFacts) -> DenialKind {
    PRECEDENCE
        .iter()
        .find(|(applies, _)| applies(facts))
        .map_or(DenialKind::Unexpected, |(_, kind)| *kind)
}

#[derive(Debug, Clone, Default)]
pub struct DispatchGuard {
    config: GuardConfig,
}

impl DispatchGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Decide whether `request` proceeds for `visitor`.
    pub fn on_dispatch(&self, access: &AccessControl, visitor: &Visitor, request: &RequestContext) -> DispatchOutcome {
        if access.is_allowed(visitor, request.resource.as_str(), request.privilege.as_str()) {
            return DispatchOutcome::Proceed;
        }

        let facts = DispatchFacts::gather(access, visitor, request, &self.config);
        let kind = select_denial(&facts);
        let redirect = self.redirect_for(kind, request);

        tracing::debug!(
            request_id = %request.request_id,
            resource = %request.resource,
            privilege = %request.privilege,
            authenticated = facts.authenticated,
            denial = ?kind,
            location = %redirect.location,
            "request denied"
        );
        DispatchOutcome::Redirect(redirect)
    }

    fn redirect_for(&self, kind: DenialKind, request: &RequestContext) -> Redirect {
        let target = kind.target();
        let location = match target {
            RedirectTarget::Landing => self.config.landing_path.clone(),
            RedirectTarget::Logout => self.config.logout.path.clone(),
            RedirectTarget::Login if kind == DenialKind::LoginRequired => with_query_param(
                &self.config.login.path,
                &self.config.redirect_param,
                &same_origin_path(&request.path),
            ),
            RedirectTarget::Login => self.config.login.path.clone(),
        };
        Redirect {
            kind,
            target,
            location,
            message: kind.message(),
        }
    }
}
