//! End-to-end resolution: principal → roles → ACL entries → flattened list
//! → visible workspaces.

use std::sync::Arc;

use tracing::debug;

use super::acl::{self, UserLookup, ALL_ACTIONS, STATIC_ACTIONS};
use super::list::{AccessList, DEFAULT_POLICY_ACTION};
use super::roles::RoleResolver;
use super::workspaces;
use crate::context::RequestContext;
use crate::directory::DirectoryClient;
use crate::error::AuthzResult;
use crate::model::{Role, User};
use crate::policy::{AllowAll, PolicyClient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Include policy entries, granted unconditionally, so that every
    /// resource a role could reach is counted.
    pub count_policies: bool,
    pub load_workspaces: bool,
}

pub struct AccessResolver {
    directory: Arc<dyn DirectoryClient>,
    policy: Arc<dyn PolicyClient>,
    roles: RoleResolver,
    policy_action: String,
}

impl AccessResolver {
    pub fn new(directory: Arc<dyn DirectoryClient>, policy: Arc<dyn PolicyClient>) -> Self {
        Self { roles: RoleResolver::new(directory.clone()), directory, policy, policy_action: DEFAULT_POLICY_ACTION.to_string() }
    }

    pub fn with_policy_action(mut self, action: impl Into<String>) -> Self {
        self.policy_action = action.into();
        self
    }

    pub fn roles(&self) -> &RoleResolver { &self.roles }

    pub fn directory(&self) -> &dyn DirectoryClient { self.directory.as_ref() }

    /// Access list for the request principal. Anonymous requests get an
    /// empty, flattened list.
    pub async fn access_list_from_context(&self, ctx: &RequestContext) -> AuthzResult<AccessList> {
        let Some(principal) = ctx.principal.as_ref() else {
            debug!(target: "idm_access::resolver", "no principal in request {}, workspaces will be empty", ctx.request_id);
            let mut list = AccessList::new(Vec::new());
            list.flatten(ctx, &AllowAll).await?;
            return Ok(list);
        };
        let roles = self.roles.load_roles_by_name(ctx, &principal.roles).await?;
        let mut list = AccessList::new(roles).with_principal(principal.login.clone()).with_policy_action(self.policy_action.clone());
        let entries = acl::acls_for_roles(self.directory.as_ref(), ctx, list.roles(), ALL_ACTIONS).await?;
        list.append(entries);
        list.flatten(ctx, self.policy.as_ref()).await?;
        workspaces::attach_workspaces(self.directory.as_ref(), ctx, &mut list).await?;
        Ok(list)
    }

    pub async fn access_list_from_roles(&self, ctx: &RequestContext, roles: Vec<Role>, opts: LoadOptions) -> AuthzResult<AccessList> {
        let mut list = AccessList::new(roles).with_policy_action(self.policy_action.clone());
        if let Some(login) = ctx.login() { list = list.with_principal(login); }
        let actions = if opts.count_policies { ALL_ACTIONS } else { STATIC_ACTIONS };
        let entries = acl::acls_for_roles(self.directory.as_ref(), ctx, list.roles(), actions).await?;
        list.append(entries);
        if opts.count_policies {
            list.flatten(ctx, &AllowAll).await?;
        } else {
            list.flatten(ctx, self.policy.as_ref()).await?;
        }
        if opts.load_workspaces {
            workspaces::attach_workspaces(self.directory.as_ref(), ctx, &mut list).await?;
        }
        Ok(list)
    }

    pub async fn access_list_from_user(&self, ctx: &RequestContext, login_or_uuid: &str, by_uuid: bool) -> AuthzResult<(AccessList, User)> {
        let lookup = if by_uuid { UserLookup::Uuid(login_or_uuid.to_string()) } else { UserLookup::Login(login_or_uuid.to_string()) };
        let user = acl::search_unique_user(self.directory.as_ref(), ctx, &lookup).await?;
        let list = self
            .access_list_from_roles(ctx, user.roles.clone(), LoadOptions { count_policies: false, load_workspaces: true })
            .await?;
        Ok((list, user))
    }

    pub async fn search_user(&self, ctx: &RequestContext, lookup: &UserLookup) -> AuthzResult<User> {
        acl::search_unique_user(self.directory.as_ref(), ctx, lookup).await
    }
}
