//! Per-request context: the caller's principal, a read-only metadata bag,
//! and the cancellation/deadline every collaborator call is raced against.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthzError, AuthzResult};

/// Policy context keys filled from the request.
pub const CTX_REMOTE_ADDRESS: &str = "RemoteAddress";
pub const CTX_AUTH_SOURCE: &str = "AuthSource";
pub const CTX_CLIENT_ID: &str = "ClientId";

/// Already-authenticated claims, populated once at the ingress boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestPrincipal {
    pub login: String,
    /// Role uuids carried by the caller's claims, in claim order.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub auth_source: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub remote_addr: Option<String>,
}

impl RequestPrincipal {
    pub fn new(login: impl Into<String>) -> Self {
        Self { login: login.into(), ..Default::default() }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a comma separated claim value, ignoring blanks.
    pub fn with_role_claim(self, claim: &str) -> Self {
        let roles: Vec<String> = claim.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).map(String::from).collect();
        self.with_roles(roles)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Option<RequestPrincipal>,
    pub request_id: String,
    metadata: BTreeMap<String, String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self { Self::new() }
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            principal: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            metadata: BTreeMap::new(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_principal(mut self, principal: RequestPrincipal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> { &self.metadata }

    pub fn cancellation(&self) -> &CancellationToken { &self.cancel }

    pub fn login(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.login.as_str()).filter(|l| !l.is_empty())
    }

    /// Context map handed to the policy engine: the metadata bag plus
    /// whatever the principal tells us about the caller.
    pub fn policy_context(&self) -> HashMap<String, String> {
        let mut out: HashMap<String, String> = self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        if let Some(p) = &self.principal {
            if let Some(addr) = &p.remote_addr { out.insert(CTX_REMOTE_ADDRESS.into(), addr.clone()); }
            if let Some(src) = &p.auth_source { out.insert(CTX_AUTH_SOURCE.into(), src.clone()); }
            if let Some(cid) = &p.client_id { out.insert(CTX_CLIENT_ID.into(), cid.clone()); }
        }
        out
    }

    /// Fail fast when the request is already cancelled or past its deadline.
    pub fn check(&self, op: &str) -> AuthzResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthzError::cancelled("request_cancelled", format!("{} cancelled", op)));
        }
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return Err(AuthzError::cancelled("deadline_exceeded", format!("{} exceeded request deadline", op)));
            }
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the request is cancelled or its
    /// deadline elapses first.
    pub async fn run<T, F>(&self, op: &str, fut: F) -> AuthzResult<T>
    where
        F: Future<Output = AuthzResult<T>>,
    {
        self.check(op)?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AuthzError::cancelled("request_cancelled", format!("{} cancelled", op))),
            _ = deadline => Err(AuthzError::cancelled("deadline_exceeded", format!("{} exceeded request deadline", op))),
            res = fut => res,
        }
    }
}
