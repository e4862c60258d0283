//! Request-pipeline facade.
//!
//! Owns the current [`AccessControl`] snapshot and hands each request a
//! [`RequestAccess`] bound to that snapshot and to the request's own
//! visitor. Reloading swaps the snapshot for new requests only; requests
//! already in flight keep the one they started with.

use std::sync::Arc;

use parking_lot::RwLock;

use portcullis_core::{ConfigResult, RoleId, UserId};

use crate::config::GuardConfig;
use crate::decision::AccessControl;
use crate::explain::AccessExplanation;
use crate::graph::RoleGraph;
use crate::guard::{DispatchGuard, DispatchOutcome, RequestContext};
use crate::identity::{UserDirectory, Visitor, resolve_identity};
use crate::policy::PolicyDocument;
use crate::roles::RoleRecord;

/// Persistence-layer source of every role record.
pub trait RoleSource {
    fn all_roles(&self) -> ConfigResult<Vec<RoleRecord>>;
}

impl RoleSource for Vec<RoleRecord> {
    fn all_roles(&self) -> ConfigResult<Vec<RoleRecord>> {
        Ok(self.clone())
    }
}

/// Session/auth collaborator.
pub trait Session {
    fn current_user_id(&self) -> Option<UserId>;
    fn clear_user_id(&mut self);
}

impl Session for Option<UserId> {
    fn current_user_id(&self) -> Option<UserId> {
        *self
    }

    fn clear_user_id(&mut self) {
        *self = None;
    }
}

pub struct Gatekeeper {
    snapshot: RwLock<Arc<AccessControl>>,
    guard: DispatchGuard,
}

impl core::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("loaded_at", &self.snapshot.read().loaded_at())
            .field("guard", &self.guard)
            .finish()
    }
}

/// Load roles from `source` and build a snapshot from `policy`.
fn build_snapshot<S>(source: &S, policy: &PolicyDocument) -> ConfigResult<AccessControl>
where
    S: RoleSource + ?Sized,
{
    let graph = RoleGraph::load(source.all_roles()?)?;
    AccessControl::from_policy(graph, policy)
}

impl Gatekeeper {
    /// Boot: any configuration error refuses to produce a gatekeeper.
    pub fn new<S>(source: &S, policy: &PolicyDocument, config: GuardConfig) -> ConfigResult<Self>
    where
        S: RoleSource + ?Sized,
    {
        config.validate()?;
        let access = build_snapshot(source, policy)?;
        Ok(Self::from_access(access, config))
    }

    pub fn from_access(access: AccessControl, config: GuardConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(access)),
            guard: DispatchGuard::new(config),
        }
    }

    /// Current snapshot; cheap to clone and safe to hold across a request.
    pub fn snapshot(&self) -> Arc<AccessControl> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn guard(&self) -> &DispatchGuard {
        &self.guard
    }

    /// Rebuild after roles or rules changed (e.g. an admin action).
    ///
    /// On error the previous snapshot stays in place.
    pub fn reload<S>(&self, source: &S, policy: &PolicyDocument) -> ConfigResult<()>
    where
        S: RoleSource + ?Sized,
    {
        match build_snapshot(source, policy) {
            Ok(access) => {
                let roles = access.graph().len();
                *self.snapshot.write() = Arc::new(access);
                tracing::info!(roles, "access control snapshot reloaded");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "access control reload failed; keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Resolve the visitor for this request.
    ///
    /// A session naming a user that no longer exists is cleared and the
    /// visitor is demoted to guest.
    pub fn begin_request<S, D>(&self, session: &mut S, directory: &D) -> RequestAccess<'_>
    where
        S: Session + ?Sized,
        D: UserDirectory + ?Sized,
    {
        let access = self.snapshot();
        let resolution = resolve_identity(access.graph(), session.current_user_id(), directory);
        if resolution.stale_session {
            session.clear_user_id();
        }
        RequestAccess {
            access,
            guard: &self.guard,
            visitor: resolution.visitor,
        }
    }

    /// Role id → name through the current snapshot's memo.
    pub fn role_name(&self, id: RoleId) -> Option<String> {
        self.snapshot.read().graph().name_of(id).map(|n| n.to_string())
    }
}

/// Access checks for one request.
#[derive(Debug)]
pub struct RequestAccess<'g> {
    access: Arc<AccessControl>,
    guard: &'g DispatchGuard,
    visitor: Visitor,
}

impl RequestAccess<'_> {
    pub fn visitor(&self) -> &Visitor {
        &self.visitor
    }

    /// Ad-hoc check, e.g. "show this link only if allowed".
    pub fn is_allowed(&self, resource: &str, privilege: &str) -> bool {
        self.access.is_allowed(&self.visitor, resource, privilege)
    }

    pub fn on_dispatch(&self, request: &RequestContext) -> DispatchOutcome {
        self.guard.on_dispatch(&self.access, &self.visitor, request)
    }

    /// The visitor's label, or the configured placeholder when anonymous.
    pub fn current_visitor_display_label(&self) -> &str {
        self.visitor
            .display_label()
            .unwrap_or(self.guard.config().anonymous_label.as_str())
    }

    pub fn explain(&self, resource: &str, privilege: &str) -> AccessExplanation {
        self.access.explain(&self.visitor, resource, privilege)
    }
}
