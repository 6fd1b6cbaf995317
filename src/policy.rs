//! Policy collaborator: a single dynamic allow/deny decision layered on top
//! of static ACLs. Any error from the engine counts as a denial.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::AuthzResult;

pub const SUBJECT_USER_PREFIX: &str = "user:";
pub const SUBJECT_ROLE_PREFIX: &str = "role:";
pub const SUBJECT_PROFILE_PREFIX: &str = "profile:";

/// Resource and action evaluated at login time.
pub const LOGIN_RESOURCE: &str = "oidc";
pub const LOGIN_ACTION: &str = "login";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyRequest {
    pub subjects: Vec<String>,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyResponse {
    pub allowed: bool,
}

#[async_trait]
pub trait PolicyClient: Send + Sync {
    async fn is_allowed(&self, ctx: &RequestContext, request: &PolicyRequest) -> AuthzResult<PolicyResponse>;
}

pub fn user_subject(login: &str) -> String { format!("{}{}", SUBJECT_USER_PREFIX, login) }
pub fn role_subject(uuid: &str) -> String { format!("{}{}", SUBJECT_ROLE_PREFIX, uuid) }
pub fn profile_subject(profile: &str) -> String { format!("{}{}", SUBJECT_PROFILE_PREFIX, profile) }

/// Outcome of a fail-closed policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied,
    /// The engine could not answer; treated as a denial.
    Failed(String),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool { matches!(self, Verdict::Allowed) }
}

/// Evaluate `request` under the request's cancellation. Transport errors
/// become `Verdict::Failed`; only cancellation escapes as an error so that
/// an aborted request is never mistaken for a policy decision.
pub async fn check(client: &dyn PolicyClient, ctx: &RequestContext, request: &PolicyRequest) -> AuthzResult<Verdict> {
    match ctx.run("policy", client.is_allowed(ctx, request)).await {
        Ok(resp) if resp.allowed => Ok(Verdict::Allowed),
        Ok(_) => Ok(Verdict::Denied),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            tracing::warn!(target: "idm_access::policy", "policy evaluation failed resource='{}' action='{}': {}", request.resource, request.action, e);
            Ok(Verdict::Failed(e.to_string()))
        }
    }
}

/// Grants everything. Used when counting every resource a role could reach
/// through policy entries, independently of the live policy decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PolicyClient for AllowAll {
    async fn is_allowed(&self, _ctx: &RequestContext, _request: &PolicyRequest) -> AuthzResult<PolicyResponse> {
        Ok(PolicyResponse { allowed: true })
    }
}

/// Denies any request naming one of the listed subjects, allows the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticPolicy {
    #[serde(default)]
    pub denied_subjects: Vec<String>,
}

#[async_trait]
impl PolicyClient for StaticPolicy {
    async fn is_allowed(&self, _ctx: &RequestContext, request: &PolicyRequest) -> AuthzResult<PolicyResponse> {
        let denied = request.subjects.iter().any(|s| self.denied_subjects.contains(s));
        Ok(PolicyResponse { allowed: !denied })
    }
}
