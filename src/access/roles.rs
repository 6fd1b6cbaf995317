//! Role loading: one batched directory search per call, with optional
//! materialization of group/user roles that are referenced but missing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::context::RequestContext;
use crate::directory::{DirectoryClient, RoleSingleQuery, SearchQuery};
use crate::error::AuthzResult;
use crate::model::{Role, User};

pub struct RoleResolver {
    directory: Arc<dyn DirectoryClient>,
}

fn virtual_label(reference: &Role, login: Option<&str>) -> String {
    if reference.is_group_role {
        format!("Group {}", reference.uuid)
    } else {
        format!("User {}", login.unwrap_or(reference.uuid.as_str()))
    }
}

impl RoleResolver {
    pub fn new(directory: Arc<dyn DirectoryClient>) -> Self { Self { directory } }

    async fn search(&self, ctx: &RequestContext, uuids: Vec<String>) -> AuthzResult<Vec<Role>> {
        let query = SearchQuery::single(RoleSingleQuery { uuids });
        let cursor = ctx.run("search_roles", self.directory.search_roles(ctx, &query)).await.map_err(|e| {
            error!(target: "idm_access::roles", "failed to retrieve roles: {}", e);
            e
        })?;
        cursor.collect_all(ctx).await
    }

    /// Resolve role references in input order. Missing group/user roles are
    /// created when `create_missing` is set; any other miss is passed
    /// through as the bare reference.
    pub async fn load_roles(&self, ctx: &RequestContext, refs: &[Role], login: Option<&str>, create_missing: bool) -> AuthzResult<Vec<Role>> {
        if refs.is_empty() { return Ok(Vec::new()); }
        let uuids: Vec<String> = refs.iter().map(|r| r.uuid.clone()).collect();
        let found: HashMap<String, Role> = self.search(ctx, uuids).await?.into_iter().map(|r| (r.uuid.clone(), r)).collect();

        let mut out = Vec::with_capacity(refs.len());
        for reference in refs {
            if let Some(loaded) = found.get(&reference.uuid) {
                out.push(loaded.clone());
            } else if create_missing && reference.is_scoped() {
                out.push(self.materialize(ctx, reference, login).await?);
            } else {
                out.push(reference.clone());
            }
        }
        Ok(out)
    }

    pub async fn load_roles_for_user(&self, ctx: &RequestContext, user: &User, create_missing: bool) -> AuthzResult<Vec<Role>> {
        self.load_roles(ctx, &user.roles, Some(user.login.as_str()), create_missing).await
    }

    async fn materialize(&self, ctx: &RequestContext, reference: &Role, login: Option<&str>) -> AuthzResult<Role> {
        let role = Role {
            uuid: reference.uuid.clone(),
            label: virtual_label(reference, login),
            is_group_role: reference.is_group_role,
            is_user_role: reference.is_user_role,
        };
        match ctx.run("create_role", self.directory.create_role(ctx, role)).await {
            Ok(created) => {
                info!(target: "idm_access::roles", "created missing role uuid='{}' label='{}'", created.uuid, created.label);
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                // Another request created it first
                debug!(target: "idm_access::roles", "role uuid='{}' created concurrently, re-fetching", reference.uuid);
                let mut existing = self.search(ctx, vec![reference.uuid.clone()]).await?;
                Ok(existing.pop().unwrap_or_else(|| reference.clone()))
            }
            Err(e) => {
                error!(target: "idm_access::roles", "error creating special role uuid='{}': {}", reference.uuid, e);
                Err(e)
            }
        }
    }

    /// Load roles by uuid, keeping the caller's order and dropping unknown names.
    pub async fn load_roles_by_name(&self, ctx: &RequestContext, names: &[String]) -> AuthzResult<Vec<Role>> {
        if names.is_empty() { return Ok(Vec::new()); }
        let found = self.search(ctx, names.to_vec()).await?;
        let sorted: Vec<Role> = names
            .iter()
            .filter_map(|name| found.iter().find(|r| r.uuid == *name).cloned())
            .collect();
        debug!(target: "idm_access::roles", "load_roles_by_name requested={} resolved={}", names.len(), sorted.len());
        Ok(sorted)
    }
}
