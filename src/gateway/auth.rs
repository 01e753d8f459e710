//! Caller authorization
//!
//! Every inbound call is resolved against the live configuration snapshot
//! before anything is forwarded: bearer key → sha256 hash → credential
//! index → policy consult → subscription check. The store holds only
//! pre-hashed keys; raw keys exist transiently at this boundary.

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

use crate::config::AuthorizationPolicy;
use crate::error::rpc_codes;
use crate::protocol::methods;
use crate::store::ConfigStore;
use crate::{Error, Result};

/// Methods that require a resolved identity under
/// [`AuthorizationPolicy::RequireAuthForMarkedMethods`].
pub const MARKED_METHODS: &[&str] = &[
    methods::TASKS_SEND,
    methods::TASKS_SEND_SUBSCRIBE,
    methods::TASKS_CANCEL,
];

/// The caller identity resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No access key presented
    Anonymous,
    /// Resolved user id
    User(String),
}

impl Caller {
    /// The user id, if authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }
}

/// Hex-encoded sha256 of a raw access key.
#[must_use]
pub fn hash_access_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the bearer credential from the `Authorization` header.
#[must_use]
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Resolve the caller identity from request headers.
///
/// No header means [`Caller::Anonymous`]; an unknown key maps to an
/// authentication error (the store's `NotFound` is the "unauthenticated"
/// outcome at this boundary).
pub fn resolve_caller(store: &ConfigStore, headers: &HeaderMap) -> Result<Caller> {
    let Some(key) = bearer_from_headers(headers) else {
        return Ok(Caller::Anonymous);
    };

    let key_hash = hash_access_key(key);
    match store.resolve_user(&key_hash) {
        Ok(Some(user_id)) => Ok(Caller::User(user_id)),
        Ok(None) => Ok(Caller::Anonymous),
        Err(Error::NotFound(_)) => Err(Error::json_rpc(
            rpc_codes::UNAUTHORIZED,
            "unknown access key",
        )),
        Err(e) => Err(e),
    }
}

/// Check that `caller` may invoke `method` against backend `slug` under the
/// policy currently in force.
pub fn authorize(store: &ConfigStore, caller: &Caller, method: &str, slug: &str) -> Result<()> {
    let auth_required = match store.authorization_policy() {
        AuthorizationPolicy::RequireAuthEverywhere => true,
        AuthorizationPolicy::RequireAuthForMarkedMethods => MARKED_METHODS.contains(&method),
        AuthorizationPolicy::NoAuthRequired => false,
    };

    if !auth_required {
        return Ok(());
    }

    let Some(user_id) = caller.user_id() else {
        return Err(Error::json_rpc(
            rpc_codes::UNAUTHORIZED,
            format!("method '{method}' requires authentication"),
        ));
    };

    if store.user_subscriptions(user_id).iter().any(|s| s == slug) {
        Ok(())
    } else {
        Err(Error::json_rpc(
            rpc_codes::UNAUTHORIZED,
            format!("not subscribed to backend '{slug}'"),
        ))
    }
}
