//! Query composition against the directory: ACL entries for roles or
//! workspaces, and unique user lookups.

use tracing::{debug, error};

use crate::context::RequestContext;
use crate::directory::{AclSingleQuery, DirectoryClient, SearchQuery, UserSingleQuery};
use crate::error::{AuthzError, AuthzResult};
use crate::model::{AclAction, AclEntry, Role, User};

/// Every static action plus policy-deferred entries.
pub const ALL_ACTIONS: &[AclAction] = &[AclAction::Read, AclAction::Deny, AclAction::Write, AclAction::Policy];
pub const STATIC_ACTIONS: &[AclAction] = &[AclAction::Read, AclAction::Deny, AclAction::Write];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Login(String),
    Uuid(String),
    Attribute { name: String, value: String },
}

impl UserLookup {
    fn query(&self) -> AuthzResult<UserSingleQuery> {
        let q = match self {
            UserLookup::Login(l) => UserSingleQuery::login(l.clone()),
            UserLookup::Uuid(u) => UserSingleQuery::uuid(u.clone()),
            UserLookup::Attribute { name, value } => UserSingleQuery::attribute(name.clone(), value.clone()),
        };
        let blank = match self {
            UserLookup::Login(v) | UserLookup::Uuid(v) => v.is_empty(),
            UserLookup::Attribute { name, .. } => name.is_empty(),
        };
        if blank {
            return Err(AuthzError::bad_request("missing_predicate", "please provide one of login, uuid or attribute"));
        }
        Ok(q)
    }
}

/// ACL entries held by any of `roles` with one of `actions`.
pub async fn acls_for_roles(directory: &dyn DirectoryClient, ctx: &RequestContext, roles: &[Role], actions: &[AclAction]) -> AuthzResult<Vec<AclEntry>> {
    if roles.is_empty() { return Ok(Vec::new()); }
    let role_ids: Vec<String> = roles.iter().map(|r| r.uuid.clone()).collect();
    let query = SearchQuery::and(vec![AclSingleQuery::actions(actions), AclSingleQuery::roles(role_ids)]);
    let cursor = ctx.run("search_acl", directory.search_acl(ctx, &query)).await.map_err(|e| {
        error!(target: "idm_access::acl", "acls_for_roles failed: {}", e);
        e
    })?;
    let acls = cursor.collect_all(ctx).await?;
    debug!(target: "idm_access::acl", "acls_for_roles roles={} acls={}", roles.len(), acls.len());
    Ok(acls)
}

/// ACL entries attached to any of `workspace_ids` with one of `actions`.
pub async fn acls_for_workspaces(directory: &dyn DirectoryClient, ctx: &RequestContext, workspace_ids: &[String], actions: &[AclAction]) -> AuthzResult<Vec<AclEntry>> {
    if workspace_ids.is_empty() {
        return Err(AuthzError::bad_request("missing_predicate", "at least one workspace id is required"));
    }
    let query = SearchQuery::and(vec![AclSingleQuery::workspaces(workspace_ids.to_vec()), AclSingleQuery::actions(actions)]);
    let cursor = ctx.run("search_acl", directory.search_acl(ctx, &query)).await.map_err(|e| {
        error!(target: "idm_access::acl", "acls_for_workspaces failed: {}", e);
        e
    })?;
    cursor.collect_all(ctx).await
}

/// First user matching `lookup`.
pub async fn search_unique_user(directory: &dyn DirectoryClient, ctx: &RequestContext, lookup: &UserLookup) -> AuthzResult<User> {
    let query = SearchQuery::single(lookup.query()?);
    let cursor = ctx.run("search_users", directory.search_users(ctx, &query)).await?;
    match cursor.first(ctx).await? {
        Some(user) => Ok(user),
        None => Err(AuthzError::not_found("user_not_found", "cannot find user with this login or uuid")),
    }
}
