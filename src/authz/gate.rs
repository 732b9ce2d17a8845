use std::sync::Arc;

use axum::extract::OriginalUri;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};

use super::model::{Identity, Permission, Role};
use super::store::{RoleStore, StoreError};
use super::AuthzMode;
use crate::errors::{AppError, FORBIDDEN_MESSAGE, UNAUTHENTICATED_MESSAGE};
use crate::events::{record_decision, AuditBus, DecisionEvent};

pub const DEFAULT_IDENTITY_HEADER: &str = "x-user-email";

/// Terminal state of one gate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Request continues to the next handler
    Admitted,
    /// No identity presented, or the identity has no role (401)
    Unauthenticated,
    /// Role resolved but lacks the required permission (403)
    Forbidden,
    /// The store lookup itself failed (500)
    StoreFailure,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Admitted => "admitted",
            Decision::Unauthenticated => "unauthenticated",
            Decision::Forbidden => "forbidden",
            Decision::StoreFailure => "store_failure",
        }
    }
}

/// What the gate resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub decision: Decision,
    pub enforced: bool,
}

/// Per-route admission check.
///
/// One gate is built for each protected route with the permission that route
/// requires. It holds no mutable state; every call re-reads the store.
#[derive(Clone)]
pub struct PermissionGate {
    required: Permission,
    store: Arc<dyn RoleStore>,
    audit: AuditBus,
    identity_header: HeaderName,
    mode: AuthzMode,
}

impl PermissionGate {
    pub fn new(required: impl Into<Permission>, store: Arc<dyn RoleStore>, audit: AuditBus) -> Self {
        Self {
            required: required.into(),
            store,
            audit,
            identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
            mode: AuthzMode::Strict,
        }
    }

    pub fn with_identity_header(mut self, header: HeaderName) -> Self {
        self.identity_header = header;
        self
    }

    pub fn with_mode(mut self, mode: AuthzMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn required(&self) -> &Permission {
        &self.required
    }

    pub fn extract_identity(&self, headers: &HeaderMap) -> Option<Identity> {
        headers
            .get(&self.identity_header)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
            .and_then(Identity::parse)
    }

    /// Decide whether the request described by `request` may proceed.
    ///
    /// Exactly one decision record is emitted per call, before returning.
    /// `Ok` means the caller should run the next handler; `Err` carries the
    /// rejection to send back. Only the head is needed, so the body stays
    /// with the caller untouched.
    pub async fn handle(&self, request: &Parts) -> Result<Verdict, AppError> {
        let identity = self.extract_identity(&request.headers);

        let mut role = None;
        let outcome = match &identity {
            None => Ok(Decision::Unauthenticated),
            Some(identity) => self.resolve(identity, &mut role).await,
        };

        let decision = match &outcome {
            Ok(decision) => *decision,
            Err(_) => Decision::StoreFailure,
        };
        let enforced = !(decision == Decision::Forbidden && self.mode == AuthzMode::Advisory);

        let verdict = Verdict {
            identity,
            role,
            decision,
            enforced,
        };

        // Nested routers see the URI with the mount prefix stripped.
        let path = request
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| request.uri.path(), |original| original.0.path());

        record_decision(
            &self.audit,
            DecisionEvent::new(
                verdict.identity.clone(),
                verdict.role.clone(),
                self.required.clone(),
                decision,
                enforced,
            )
            .with_request(request.method.as_str(), path),
        );

        match outcome {
            Err(err) => Err(AppError::Store(err)),
            Ok(Decision::Admitted) => Ok(verdict),
            Ok(Decision::Forbidden) if !enforced => Ok(verdict),
            Ok(Decision::Forbidden) => Err(AppError::forbidden(FORBIDDEN_MESSAGE)),
            Ok(_) => Err(AppError::unauthenticated(UNAUTHENTICATED_MESSAGE)),
        }
    }

    async fn resolve(&self, identity: &Identity, role: &mut Option<Role>) -> Result<Decision, StoreError> {
        let Some(resolved) = self.store.resolve_role(identity).await? else {
            return Ok(Decision::Unauthenticated);
        };
        let resolved = role.insert(resolved);

        let permissions = self.store.permissions_for(resolved).await?;
        if permissions.contains(self.required.as_str()) {
            Ok(Decision::Admitted)
        } else {
            Ok(Decision::Forbidden)
        }
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("required", &self.required)
            .field("identity_header", &self.identity_header)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
