//! `portcullis-auth`: role-based access-control decision engine.
//!
//! Builds a role-inheritance graph from persisted roles, resolves each
//! request's visitor into an aggregate role, and decides whether the request
//! proceeds or is redirected. Decoupled from HTTP and storage: collaborators
//! are reached through [`UserDirectory`], [`RoleSource`] and [`Session`].

pub mod config;
pub mod decision;
pub mod explain;
pub mod gatekeeper;
pub mod graph;
pub mod guard;
pub mod identity;
pub mod permissions;
pub mod policy;
pub mod redirect;
pub mod resources;
pub mod roles;

pub use config::{GuardConfig, RouteTarget};
pub use decision::AccessControl;
pub use explain::{AccessExplanation, DenialCause};
pub use gatekeeper::{Gatekeeper, RequestAccess, RoleSource, Session};
pub use graph::RoleGraph;
pub use guard::{DenialKind, DispatchGuard, DispatchOutcome, Redirect, RedirectTarget, RequestContext};
pub use identity::{Resolution, UserDirectory, UserRecord, Visitor, resolve_identity};
pub use permissions::{PermissionTable, Privileges};
pub use policy::{PermissionRule, PolicyDocument};
pub use resources::{Privilege, Resource};
pub use roles::{GUEST_ROLE, RoleName, RoleRecord, VISITOR_ROLE};
