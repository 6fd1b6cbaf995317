//! Login delegation across prioritized identity-source connectors.
//!
//! Connectors are tried from the highest priority id down. The first one
//! accepting the password ends the iteration: the user is then resolved in
//! the directory and the `oidc`/`login` policy decides. A policy denial at
//! that point is final and never falls through to the next connector.
//! `refresh` skips connectors entirely and revalidates from the directory.

mod connector;
mod local;

pub use connector::{Connector, ConnectorConfig, ConnectorFactory, ConnectorRegistry, OpenConnector};
pub use local::{hash_password, verify_password, StaticConnector, StaticConnectorConfig, StaticUser, STATIC_CONNECTOR_TYPE};

use std::sync::Arc;

use tracing::{debug, error};

use crate::access::{search_unique_user, UserLookup};
use crate::audit::{AuditEvent, AuditKind, AuditLog};
use crate::context::RequestContext;
use crate::directory::DirectoryClient;
use crate::error::{AuthzError, AuthzResult};
use crate::identity::{identity_from_user, subjects_for_user, Identity};
use crate::model::User;
use crate::policy::{self, PolicyClient, PolicyRequest, LOGIN_ACTION, LOGIN_RESOURCE};

pub struct LoginDelegator {
    connectors: Vec<OpenConnector>,
    directory: Arc<dyn DirectoryClient>,
    policy: Arc<dyn PolicyClient>,
    audit: AuditLog,
}

impl LoginDelegator {
    /// Open every configured connector through `registry`. Any unknown type
    /// or invalid connector configuration fails here, not at first login.
    pub fn from_config(
        configs: &[ConnectorConfig],
        registry: &ConnectorRegistry,
        directory: Arc<dyn DirectoryClient>,
        policy: Arc<dyn PolicyClient>,
        audit: AuditLog,
    ) -> AuthzResult<Self> {
        let mut connectors = Vec::with_capacity(configs.len());
        for cfg in configs {
            let connector = registry.open(cfg)?;
            connectors.push(OpenConnector { id: cfg.id, name: cfg.name.clone(), kind: cfg.kind.clone(), connector });
        }
        Ok(Self::new(connectors, directory, policy, audit))
    }

    pub fn new(mut connectors: Vec<OpenConnector>, directory: Arc<dyn DirectoryClient>, policy: Arc<dyn PolicyClient>, audit: AuditLog) -> Self {
        connectors.sort_by(|a, b| b.id.cmp(&a.id));
        Self { connectors, directory, policy, audit }
    }

    /// Connector names in the order `login` tries them.
    pub fn connector_names(&self) -> Vec<&str> { self.connectors.iter().map(|c| c.name.as_str()).collect() }

    pub async fn login(&self, ctx: &RequestContext, username: &str, password: &str) -> AuthzResult<Identity> {
        for c in self.connectors.iter() {
            match ctx.run("bind", c.connector.bind(ctx, username, password)).await {
                Ok(Some(_)) => {
                    debug!(target: "idm_access::login", "login request success on sub-connector user='{}' connector='{}' type='{}'", username, c.name, c.kind);
                    return self.finish_login(ctx, username, &c.name).await;
                }
                Ok(None) => {
                    debug!(target: "idm_access::login", "login request failed on sub-connector user='{}' connector='{}' type='{}'", username, c.name, c.kind);
                    self.audit.emit(
                        AuditEvent::new(AuditKind::BindFailed, username, format!("credentials rejected by {}", c.name))
                            .connector(&c.name)
                            .request_id(&ctx.request_id),
                    );
                }
                Err(e) if e.is_cancelled() => {
                    self.audit_aborted(ctx, username, &c.name, &e);
                    return Err(e);
                }
                Err(e) => {
                    debug!(target: "idm_access::login", "sub-connector error user='{}' connector='{}' type='{}': {}", username, c.name, c.kind, e);
                    self.audit.emit(
                        AuditEvent::new(AuditKind::BindFailed, username, format!("{} failed: {}", c.name, e))
                            .connector(&c.name)
                            .request_id(&ctx.request_id),
                    );
                }
            }
        }
        self.audit.emit(AuditEvent::new(AuditKind::LoginFailed, username, format!("login attempt failed for {}", username)).request_id(&ctx.request_id));
        error!(target: "idm_access::login", "login attempt failed user='{}' connectors={}", username, self.connectors.len());
        Err(AuthzError::authentication_failed())
    }

    // The password is vouched for: whatever happens now is the final answer.
    async fn finish_login(&self, ctx: &RequestContext, username: &str, connector: &str) -> AuthzResult<Identity> {
        match self.identity_from_username(ctx, username, connector).await {
            Ok(identity) => {
                self.audit.emit(
                    AuditEvent::new(AuditKind::LoginSucceeded, username, format!("user {} logged in via {} sub-connector", username, connector))
                        .connector(connector)
                        .user_uuid(&identity.user_id)
                        .request_id(&ctx.request_id),
                );
                Ok(identity)
            }
            Err(e) if e.is_cancelled() || e.is_unavailable() => {
                self.audit_aborted(ctx, username, connector, &e);
                Err(e)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.audit.emit(
                        AuditEvent::new(AuditKind::LoginFailed, username, format!("user {} bound on {} but unknown to the directory", username, connector))
                            .connector(connector)
                            .request_id(&ctx.request_id),
                    );
                }
                Err(AuthzError::authentication_failed())
            }
        }
    }

    // Outage or cancellation: no verdict on the credentials, but still recorded.
    fn audit_aborted(&self, ctx: &RequestContext, username: &str, connector: &str, cause: &AuthzError) {
        self.audit.emit(
            AuditEvent::new(AuditKind::LoginFailed, username, format!("login for {} aborted on {}: {}", username, connector, cause))
                .connector(connector)
                .request_id(&ctx.request_id),
        );
        error!(target: "idm_access::login", "login aborted user='{}' connector='{}': {}", username, connector, cause);
    }

    /// Revalidate a previously issued identity against current directory
    /// state and login policy. Connectors are not consulted.
    pub async fn refresh(&self, ctx: &RequestContext, identity: &Identity) -> AuthzResult<Identity> {
        self.identity_from_username(ctx, &identity.username, &identity.auth_source).await
    }

    /// Resolve `username` in the directory and run the login policy gate.
    pub async fn identity_from_username(&self, ctx: &RequestContext, username: &str, auth_source: &str) -> AuthzResult<Identity> {
        let user = search_unique_user(self.directory.as_ref(), ctx, &UserLookup::Login(username.to_string()))
            .await
            .map_err(|e| {
                error!(target: "idm_access::login", "could not find user '{}': {}", username, e);
                if e.is_not_found() { AuthzError::not_found("user_not_found", format!("user {} not found", username)) } else { e }
            })?;
        if !self.check_login_policy(ctx, &user).await? {
            return Err(AuthzError::unauthorized("login_policy_denied", format!("user {} is not authorized to log in", username)));
        }
        Ok(identity_from_user(&user, auth_source))
    }

    async fn check_login_policy(&self, ctx: &RequestContext, user: &User) -> AuthzResult<bool> {
        let request = PolicyRequest {
            subjects: subjects_for_user(user),
            resource: LOGIN_RESOURCE.to_string(),
            action: LOGIN_ACTION.to_string(),
            context: ctx.policy_context(),
        };
        let verdict = policy::check(self.policy.as_ref(), ctx, &request).await?;
        if verdict.is_allowed() {
            return Ok(true);
        }
        self.audit.emit(
            AuditEvent::new(AuditKind::PolicyDenied, &user.login, format!("policy denies login to {}", user.login))
                .user_uuid(&user.uuid)
                .request_id(&ctx.request_id),
        );
        error!(target: "idm_access::login", "policy denies login for request subjects={:?} verdict={:?}", request.subjects, verdict);
        Ok(false)
    }
}
