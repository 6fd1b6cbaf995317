//! In-process directory backed by plain collections. Used by the CLI driver
//! and by tests; it counts calls per operation and tracks open cursors so
//! callers can verify query budgets and cursor release.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::query::{AclSingleQuery, RoleSingleQuery, SearchQuery, UserSingleQuery, WorkspaceSingleQuery};
use super::{Cursor, DirectoryClient};
use crate::context::RequestContext;
use crate::error::{AuthzError, AuthzResult};
use crate::model::{AclEntry, Role, User, Workspace};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectorySnapshot {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub acls: Vec<AclEntry>,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryOp {
    SearchRoles,
    CreateRole,
    SearchUsers,
    SearchAcl,
    SearchWorkspaces,
}

#[derive(Default)]
struct Counters {
    search_roles: AtomicUsize,
    create_role: AtomicUsize,
    search_users: AtomicUsize,
    search_acl: AtomicUsize,
    search_workspaces: AtomicUsize,
}

impl Counters {
    fn slot(&self, op: DirectoryOp) -> &AtomicUsize {
        match op {
            DirectoryOp::SearchRoles => &self.search_roles,
            DirectoryOp::CreateRole => &self.create_role,
            DirectoryOp::SearchUsers => &self.search_users,
            DirectoryOp::SearchAcl => &self.search_acl,
            DirectoryOp::SearchWorkspaces => &self.search_workspaces,
        }
    }
}

struct OpenCursor(Arc<AtomicUsize>);

impl Drop for OpenCursor {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectorySnapshot>,
    counters: Counters,
    open_cursors: Arc<AtomicUsize>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
    last_acl_query: Mutex<Option<SearchQuery<AclSingleQuery>>>,
    last_workspace_query: Mutex<Option<SearchQuery<WorkspaceSingleQuery>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        Self { state: RwLock::new(snapshot), ..Default::default() }
    }

    pub fn insert_role(&self, role: Role) {
        let mut s = self.state.write();
        s.roles.retain(|r| r.uuid != role.uuid);
        s.roles.push(role);
    }

    pub fn insert_user(&self, user: User) {
        let mut s = self.state.write();
        s.users.retain(|u| u.uuid != user.uuid);
        s.users.push(user);
    }

    pub fn insert_acl(&self, acl: AclEntry) { self.state.write().acls.push(acl); }

    pub fn insert_workspace(&self, ws: Workspace) {
        let mut s = self.state.write();
        s.workspaces.retain(|w| w.uuid != ws.uuid);
        s.workspaces.push(ws);
    }

    pub fn remove_user(&self, login: &str) { self.state.write().users.retain(|u| u.login != login); }

    /// Simulate a transport outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, down: bool) { self.unavailable.store(down, Ordering::SeqCst); }

    /// Delay every call, to exercise deadlines and cancellation.
    pub fn set_latency(&self, latency: Option<Duration>) { *self.latency.write() = latency; }

    pub fn calls(&self, op: DirectoryOp) -> usize { self.counters.slot(op).load(Ordering::SeqCst) }

    pub fn total_calls(&self) -> usize {
        [DirectoryOp::SearchRoles, DirectoryOp::CreateRole, DirectoryOp::SearchUsers, DirectoryOp::SearchAcl, DirectoryOp::SearchWorkspaces]
            .iter()
            .map(|op| self.calls(*op))
            .sum()
    }

    /// Cursors handed out and not yet dropped.
    pub fn open_cursors(&self) -> usize { self.open_cursors.load(Ordering::SeqCst) }

    pub fn last_acl_query(&self) -> Option<SearchQuery<AclSingleQuery>> { self.last_acl_query.lock().clone() }

    pub fn last_workspace_query(&self) -> Option<SearchQuery<WorkspaceSingleQuery>> { self.last_workspace_query.lock().clone() }

    pub fn snapshot(&self) -> DirectorySnapshot { self.state.read().clone() }

    async fn enter(&self, ctx: &RequestContext, op: DirectoryOp) -> AuthzResult<()> {
        self.counters.slot(op).fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        ctx.run("directory", async {
            if let Some(d) = latency { tokio::time::sleep(d).await; }
            Ok(())
        })
        .await?;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthzError::unavailable("directory_unavailable", format!("directory unreachable during {:?}", op)));
        }
        Ok(())
    }

    fn open<T: Send + 'static>(&self, name: &'static str, items: Vec<T>) -> Cursor<T> {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let guard = OpenCursor(self.open_cursors.clone());
        Cursor::new(
            name,
            stream::iter(items).map(move |item| {
                let _held = &guard;
                Ok(item)
            }),
        )
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn search_roles(&self, ctx: &RequestContext, query: &SearchQuery<RoleSingleQuery>) -> AuthzResult<Cursor<Role>> {
        self.enter(ctx, DirectoryOp::SearchRoles).await?;
        let found: Vec<Role> = self.state.read().roles.iter().filter(|r| query.matches(*r)).cloned().collect();
        Ok(self.open("roles", found))
    }

    async fn create_role(&self, ctx: &RequestContext, role: Role) -> AuthzResult<Role> {
        self.enter(ctx, DirectoryOp::CreateRole).await?;
        let mut s = self.state.write();
        if s.roles.iter().any(|r| r.uuid == role.uuid) {
            return Err(AuthzError::conflict("role_exists", format!("role {} already exists", role.uuid)));
        }
        s.roles.push(role.clone());
        Ok(role)
    }

    async fn search_users(&self, ctx: &RequestContext, query: &SearchQuery<UserSingleQuery>) -> AuthzResult<Cursor<User>> {
        self.enter(ctx, DirectoryOp::SearchUsers).await?;
        let found: Vec<User> = self.state.read().users.iter().filter(|u| query.matches(*u)).cloned().collect();
        Ok(self.open("users", found))
    }

    async fn search_acl(&self, ctx: &RequestContext, query: &SearchQuery<AclSingleQuery>) -> AuthzResult<Cursor<AclEntry>> {
        self.enter(ctx, DirectoryOp::SearchAcl).await?;
        *self.last_acl_query.lock() = Some(query.clone());
        let found: Vec<AclEntry> = self.state.read().acls.iter().filter(|a| query.matches(*a)).cloned().collect();
        Ok(self.open("acls", found))
    }

    async fn search_workspaces(&self, ctx: &RequestContext, query: &SearchQuery<WorkspaceSingleQuery>) -> AuthzResult<Cursor<Workspace>> {
        self.enter(ctx, DirectoryOp::SearchWorkspaces).await?;
        *self.last_workspace_query.lock() = Some(query.clone());
        let found: Vec<Workspace> = self.state.read().workspaces.iter().filter(|w| query.matches(*w)).cloned().collect();
        Ok(self.open("workspaces", found))
    }
}
