//! Identities produced by login delegation and the conversions that feed
//! them into policy requests and request principals.

mod principal;
mod adapters;

pub use principal::{Identity, DEFAULT_PROFILE};
pub use adapters::{identity_from_user, subjects_for_user, to_request_principal, ATTR_DISPLAY_NAME, ATTR_EMAIL, ATTR_PROFILE};
