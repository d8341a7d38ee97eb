//! Authorization gates: role, permission and ownership decisions.
//!
//! Each gate is a pure function over the attached principal, static
//! configuration and route parameters. [`AccessPolicy`] runs an ordered
//! list of gates and stops at the first denial.

use std::collections::HashMap;
use std::sync::Arc;

use super::AuthError;
use super::permissions::PermissionTable;
use crate::models::auth::{Principal, Role};
use crate::security_log::{RequestMeta, SecurityEvent, SecurityEventSink};

/// Route parameter compared against the principal by default.
pub const DEFAULT_OWNER_PARAM: &str = "userId";

pub const AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub const INSUFFICIENT_PERMISSIONS: &str = "Insufficient permissions";
pub const OWNERSHIP_DENIED: &str = "Access denied - you can only access your own resources";

fn authenticated(principal: Option<&Principal>) -> Result<&Principal, AuthError> {
    principal.ok_or_else(|| AuthError::Authentication(AUTHENTICATION_REQUIRED.into()))
}

/// Allow only principals whose role is in `allowed`.
pub fn require_role<'a>(
    principal: Option<&'a Principal>,
    allowed: &[Role],
) -> Result<&'a Principal, AuthError> {
    let principal = authenticated(principal)?;
    if allowed.contains(&principal.role()) {
        Ok(principal)
    } else {
        Err(AuthError::Authorization(INSUFFICIENT_PERMISSIONS.into()))
    }
}

/// Allow only principals whose role grants `permission`.
pub fn require_permission<'a>(
    principal: Option<&'a Principal>,
    table: &PermissionTable,
    permission: &str,
) -> Result<&'a Principal, AuthError> {
    let principal = authenticated(principal)?;
    if table.allows(principal.role(), permission) {
        Ok(principal)
    } else {
        Err(AuthError::Authorization(format!(
            "Permission '{permission}' required"
        )))
    }
}

/// Allow admins, or principals whose subject id equals route param `param`.
///
/// A missing parameter denies.
pub fn require_ownership<'a>(
    principal: Option<&'a Principal>,
    params: &HashMap<String, String>,
    param: &str,
) -> Result<&'a Principal, AuthError> {
    let principal = authenticated(principal)?;
    if principal.role() == Role::Admin {
        return Ok(principal);
    }
    match params.get(param) {
        Some(owner) if owner == principal.subject_id() => Ok(principal),
        _ => Err(AuthError::Authorization(OWNERSHIP_DENIED.into())),
    }
}

/// One step of an [`AccessPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Role(Vec<Role>),
    Permission(String),
    Ownership { param: String },
}

impl Gate {
    fn check<'a>(
        &self,
        principal: Option<&'a Principal>,
        table: &PermissionTable,
        params: &HashMap<String, String>,
    ) -> Result<&'a Principal, AuthError> {
        match self {
            Gate::Role(allowed) => require_role(principal, allowed),
            Gate::Permission(permission) => require_permission(principal, table, permission),
            Gate::Ownership { param } => require_ownership(principal, params, param),
        }
    }
}

/// Ordered list of gates evaluated after authentication.
///
/// `evaluate` runs gates in order and short-circuits on the first denial,
/// which is also recorded as a security event.
#[derive(Clone)]
pub struct AccessPolicy {
    gates: Vec<Gate>,
    permissions: Arc<PermissionTable>,
    events: Arc<dyn SecurityEventSink>,
}

impl AccessPolicy {
    /// Create an empty policy (allows everything it sees).
    pub fn new(permissions: Arc<PermissionTable>, events: Arc<dyn SecurityEventSink>) -> Self {
        Self {
            gates: Vec::new(),
            permissions,
            events,
        }
    }

    pub fn require_role(mut self, allowed: impl IntoIterator<Item = Role>) -> Self {
        self.gates.push(Gate::Role(allowed.into_iter().collect()));
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.gates.push(Gate::Permission(permission.into()));
        self
    }

    /// Ownership against the default `userId` route parameter.
    pub fn require_ownership(self) -> Self {
        self.require_ownership_of(DEFAULT_OWNER_PARAM)
    }

    pub fn require_ownership_of(mut self, param: impl Into<String>) -> Self {
        self.gates.push(Gate::Ownership {
            param: param.into(),
        });
        self
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Run every gate in order.
    pub fn evaluate(
        &self,
        principal: Option<&Principal>,
        params: &HashMap<String, String>,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        for gate in &self.gates {
            if let Err(e) = gate.check(principal, &self.permissions, params) {
                self.events.record(
                    meta,
                    SecurityEvent::AccessDenied {
                        subject_id: principal.map(|p| p.subject_id().to_string()),
                        role: principal.map(Principal::role),
                        reason: e.to_string(),
                    },
                );
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicy")
            .field("gates", &self.gates)
            .finish_non_exhaustive()
    }
}
