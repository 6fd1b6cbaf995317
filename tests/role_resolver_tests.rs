//! Role loading: batching, order, materialization of missing scoped roles
//! and the create race.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use idm_access::directory::{
    AclSingleQuery, Cursor, DirectoryClient, DirectoryOp, MemoryDirectory, RoleSingleQuery, SearchQuery, UserSingleQuery, WorkspaceSingleQuery,
};
use idm_access::model::{AclEntry, Role, User, Workspace};
use idm_access::{AuthzResult, RequestContext, RoleResolver};

#[tokio::test]
async fn roles_come_back_in_reference_order_with_one_search() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.insert_role(Role::new("a", "Alpha"));
    dir.insert_role(Role::new("b", "Beta"));
    dir.insert_role(Role::new("c", "Gamma"));
    let resolver = RoleResolver::new(dir.clone());
    let ctx = RequestContext::new();

    let refs = vec![Role::reference("c"), Role::reference("a"), Role::reference("b")];
    let roles = resolver.load_roles(&ctx, &refs, None, false).await?;
    let labels: Vec<&str> = roles.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["Gamma", "Alpha", "Beta"]);
    assert_eq!(dir.calls(DirectoryOp::SearchRoles), 1);
    assert_eq!(dir.open_cursors(), 0);
    Ok(())
}

#[tokio::test]
async fn load_by_name_keeps_caller_order_and_drops_unknown() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.insert_role(Role::new("a", "Alpha"));
    dir.insert_role(Role::new("b", "Beta"));
    let resolver = RoleResolver::new(dir.clone());
    let names = vec!["b".to_string(), "zz".to_string(), "a".to_string()];
    let roles = resolver.load_roles_by_name(&RequestContext::new(), &names).await?;
    let uuids: Vec<&str> = roles.iter().map(|r| r.uuid.as_str()).collect();
    assert_eq!(uuids, vec!["b", "a"]);

    assert!(resolver.load_roles_by_name(&RequestContext::new(), &[]).await?.is_empty());
    assert_eq!(dir.calls(DirectoryOp::SearchRoles), 1);
    Ok(())
}

#[tokio::test]
async fn missing_scoped_roles_are_materialized_once() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    let resolver = RoleResolver::new(dir.clone());
    let ctx = RequestContext::new();
    let user = User {
        uuid: "u-1".into(),
        login: "alice".into(),
        roles: vec![Role::group("g-42"), Role::user("u-1"), Role::reference("plain")],
        ..Default::default()
    };

    let roles = resolver.load_roles_for_user(&ctx, &user, true).await?;
    assert_eq!(roles[0].label, "Group g-42");
    assert!(roles[0].is_group_role);
    assert_eq!(roles[1].label, "User alice");
    // unscoped references are passed through, never created
    assert_eq!(roles[2], Role::reference("plain"));
    assert_eq!(dir.calls(DirectoryOp::CreateRole), 2);

    let again = resolver.load_roles_for_user(&ctx, &user, true).await?;
    assert_eq!(again[0].label, "Group g-42");
    assert_eq!(dir.calls(DirectoryOp::CreateRole), 2);
    Ok(())
}

#[tokio::test]
async fn missing_roles_are_left_alone_without_create_flag() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    let resolver = RoleResolver::new(dir.clone());
    let roles = resolver.load_roles(&RequestContext::new(), &[Role::group("g-1")], None, false).await?;
    assert_eq!(roles, vec![Role::group("g-1")]);
    assert_eq!(dir.calls(DirectoryOp::CreateRole), 0);
    Ok(())
}

/// Directory where another writer creates the role between our search and
/// our create call.
struct RacingDirectory {
    inner: MemoryDirectory,
}

#[async_trait]
impl DirectoryClient for RacingDirectory {
    async fn search_roles(&self, ctx: &RequestContext, query: &SearchQuery<RoleSingleQuery>) -> AuthzResult<Cursor<Role>> {
        self.inner.search_roles(ctx, query).await
    }

    async fn create_role(&self, ctx: &RequestContext, role: Role) -> AuthzResult<Role> {
        self.inner.insert_role(Role { label: "Created elsewhere".into(), ..role.clone() });
        self.inner.create_role(ctx, role).await
    }

    async fn search_users(&self, ctx: &RequestContext, query: &SearchQuery<UserSingleQuery>) -> AuthzResult<Cursor<User>> {
        self.inner.search_users(ctx, query).await
    }

    async fn search_acl(&self, ctx: &RequestContext, query: &SearchQuery<AclSingleQuery>) -> AuthzResult<Cursor<AclEntry>> {
        self.inner.search_acl(ctx, query).await
    }

    async fn search_workspaces(&self, ctx: &RequestContext, query: &SearchQuery<WorkspaceSingleQuery>) -> AuthzResult<Cursor<Workspace>> {
        self.inner.search_workspaces(ctx, query).await
    }
}

#[tokio::test]
async fn create_conflict_refetches_the_winner() -> Result<()> {
    let dir = Arc::new(RacingDirectory { inner: MemoryDirectory::new() });
    let resolver = RoleResolver::new(dir.clone());
    let roles = resolver.load_roles(&RequestContext::new(), &[Role::group("g-7")], None, true).await?;
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].label, "Created elsewhere");
    assert_eq!(dir.inner.calls(DirectoryOp::SearchRoles), 2);
    assert_eq!(dir.inner.open_cursors(), 0);
    Ok(())
}

#[tokio::test]
async fn lookup_failure_is_reported() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.set_unavailable(true);
    let resolver = RoleResolver::new(dir.clone());
    let err = resolver.load_roles(&RequestContext::new(), &[Role::reference("a")], None, true).await.unwrap_err();
    assert!(err.is_unavailable());
    Ok(())
}

#[tokio::test]
async fn concurrent_materialization_converges_on_one_role() -> Result<()> {
    let dir = Arc::new(MemoryDirectory::new());
    dir.set_latency(Some(std::time::Duration::from_millis(2)));
    let resolver = RoleResolver::new(dir.clone());
    let ctx = RequestContext::new();
    let refs = vec![Role::group("g-9")];

    let runs = (0..8).map(|_| resolver.load_roles(&ctx, &refs, None, true));
    let results = futures::future::join_all(runs).await;
    for r in results {
        let roles = r?;
        assert_eq!(roles[0].label, "Group g-9");
    }
    assert_eq!(dir.snapshot().roles.len(), 1);
    assert_eq!(dir.open_cursors(), 0);
    Ok(())
}
