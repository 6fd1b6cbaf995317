use crate::context::RequestPrincipal;
use crate::model::User;
use crate::policy::{profile_subject, role_subject, user_subject};

use super::principal::{Identity, DEFAULT_PROFILE};

pub const ATTR_EMAIL: &str = "email";
pub const ATTR_DISPLAY_NAME: &str = "displayName";
pub const ATTR_PROFILE: &str = "profile";

// Directory user -> identity
pub fn identity_from_user(user: &User, auth_source: &str) -> Identity {
    Identity {
        user_id: user.uuid.clone(),
        username: user.login.clone(),
        email: user.attribute(ATTR_EMAIL).unwrap_or_default().to_string(),
        email_verified: true,
        display_name: user.attribute(ATTR_DISPLAY_NAME).unwrap_or_default().to_string(),
        group_path: user.group_path.clone(),
        profile: user.attribute(ATTR_PROFILE).unwrap_or(DEFAULT_PROFILE).to_string(),
        roles: user.roles.iter().map(|r| r.uuid.clone()).collect(),
        auth_source: auth_source.to_string(),
    }
}

/// Policy subjects describing a user: login, profile, then each role.
pub fn subjects_for_user(user: &User) -> Vec<String> {
    let mut out = vec![user_subject(&user.login)];
    out.push(profile_subject(user.attribute(ATTR_PROFILE).unwrap_or(DEFAULT_PROFILE)));
    out.extend(user.roles.iter().map(|r| role_subject(&r.uuid)));
    out
}

// Identity -> ingress principal, for requests made on behalf of a session
pub fn to_request_principal(identity: &Identity) -> RequestPrincipal {
    RequestPrincipal {
        login: identity.username.clone(),
        roles: identity.roles.clone(),
        auth_source: Some(identity.auth_source.clone()).filter(|s| !s.is_empty()),
        client_id: None,
        remote_addr: None,
    }
}
