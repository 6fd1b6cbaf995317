//! Directory collaborator: search users, roles, ACL entries and workspaces.
//! Storage and wire format belong to the implementation; the engine only
//! relies on the query semantics in [`query`] and on [`Cursor`] release.

mod cursor;
mod memory;
pub mod query;

use async_trait::async_trait;

pub use cursor::Cursor;
pub use memory::{DirectoryOp, DirectorySnapshot, MemoryDirectory};
pub use query::{AclSingleQuery, Operation, RoleSingleQuery, SearchQuery, SingleQuery, UserSingleQuery, WorkspaceSingleQuery};

use crate::context::RequestContext;
use crate::error::AuthzResult;
use crate::model::{AclEntry, Role, User, Workspace};

#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn search_roles(&self, ctx: &RequestContext, query: &SearchQuery<RoleSingleQuery>) -> AuthzResult<Cursor<Role>>;

    /// Persist a new role. Returns `Conflict` when the uuid already exists.
    async fn create_role(&self, ctx: &RequestContext, role: Role) -> AuthzResult<Role>;

    async fn search_users(&self, ctx: &RequestContext, query: &SearchQuery<UserSingleQuery>) -> AuthzResult<Cursor<User>>;

    async fn search_acl(&self, ctx: &RequestContext, query: &SearchQuery<AclSingleQuery>) -> AuthzResult<Cursor<AclEntry>>;

    async fn search_workspaces(&self, ctx: &RequestContext, query: &SearchQuery<WorkspaceSingleQuery>) -> AuthzResult<Cursor<Workspace>>;
}
