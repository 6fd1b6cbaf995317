pub mod error;
pub mod model;
pub mod context;
pub mod directory;
pub mod policy;
pub mod identity;
pub mod access;
pub mod audit;
pub mod login;
pub mod config;

pub use error::{AuthzError, AuthzResult};
pub use context::{RequestContext, RequestPrincipal};
pub use access::{AccessList, AccessResolver, RoleResolver};
pub use login::{ConnectorRegistry, LoginDelegator};
