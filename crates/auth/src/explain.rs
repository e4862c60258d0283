// ─────────────────────────────────────────────────────────────────────────────
// Decision Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

use serde::Serialize;

use crate::decision::AccessControl;
use crate::identity::Visitor;
use crate::roles::RoleName;

/// Detailed explanation of an access decision.
///
/// Answers "why was this request allowed/denied?" for operators and audit
/// logs without re-running the decision by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessExplanation {
    pub resource: String,
    pub privilege: String,
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    pub visitor: VisitorState,

    /// Role whose grant allowed the request.
    pub granted_by: Option<String>,

    /// If denied, this explains what was missing.
    pub denial: Option<DenialDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitorState {
    pub role: String,
    pub authenticated: bool,
    pub assigned_roles: Vec<String>,
    /// The visitor's roles and everything they inherit, breadth-first.
    pub effective_roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DenialDetail {
    pub kind: DenialCause,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCause {
    /// No role at all is granted the privilege.
    UnknownRoute,
    /// Some role is granted the privilege, but none the visitor inherits.
    MissingPrivilege,
}

fn to_strings<'a>(roles: impl IntoIterator<Item = &'a RoleName>) -> Vec<String> {
    roles.into_iter().map(|r| r.as_str().to_string()).collect()
}

impl AccessControl {
    pub fn explain(&self, visitor: &Visitor, resource: &str, privilege: &str) -> AccessExplanation {
        let state = VisitorState {
            role: visitor.role_name().to_string(),
            authenticated: visitor.is_authenticated(),
            assigned_roles: to_strings(visitor.parents()),
            effective_roles: to_strings(self.effective_roles(visitor)),
        };

        if let Some(role) = self.granting_role(visitor, resource, privilege) {
            let reason = match self.table().grant(role.as_str(), resource) {
                Some(p) if p.is_all() => {
                    format!("Role '{role}' is granted every privilege on '{resource}'")
                }
                _ => format!("Role '{role}' is granted '{privilege}' on '{resource}'"),
            };
            return AccessExplanation {
                resource: resource.to_string(),
                privilege: privilege.to_string(),
                granted: true,
                reason,
                visitor: state,
                granted_by: Some(role.as_str().to_string()),
                denial: None,
            };
        }

        let granting = self.table().roles_granting(resource, privilege);
        let denial = if granting.is_empty() {
            let mut suggestions = vec![format!("Add a rule granting '{privilege}' on '{resource}' to a role")];
            if !self.table().is_declared(resource) {
                suggestions.insert(0, format!("Declare the resource '{resource}' in the policy"));
            }
            DenialDetail {
                kind: DenialCause::UnknownRoute,
                message: format!("No role is granted '{privilege}' on '{resource}'"),
                suggestions,
            }
        } else {
            DenialDetail {
                kind: DenialCause::MissingPrivilege,
                message: format!("Missing privilege '{privilege}' on '{resource}'"),
                suggestions: vec![format!(
                    "Assign one of the following roles (or a role inheriting from one): {:?}",
                    to_strings(granting)
                )],
            }
        };

        AccessExplanation {
            resource: resource.to_string(),
            privilege: privilege.to_string(),
            granted: false,
            reason: format!(
                "No role in {:?} is granted '{privilege}' on '{resource}'",
                state.effective_roles
            ),
            visitor: state,
            granted_by: None,
            denial: Some(denial),
        }
    }
}
