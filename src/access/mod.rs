//! Access control resolution: role loading, ACL aggregation and flattening,
//! workspace visibility.

mod list;
mod flatten;
pub mod acl;
pub mod roles;
pub mod workspaces;
pub mod resolver;

pub use list::{AccessList, AccessReport, ActionSet, Decision, ResourceDecision, DEFAULT_POLICY_ACTION};
pub use flatten::CTX_POLICY_IDS;
pub use acl::{acls_for_roles, acls_for_workspaces, search_unique_user, UserLookup, ALL_ACTIONS, STATIC_ACTIONS};
pub use roles::RoleResolver;
pub use workspaces::{attach_workspaces, resolve_workspaces};
pub use resolver::{AccessResolver, LoadOptions};
