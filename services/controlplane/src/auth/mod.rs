//! Authentication and principal identity.
//!
//! # Purpose
//! Resolves an inbound request to an authenticated [`Principal`]: a user
//! name plus the groups the identity provider vouches for. Authorization is
//! a separate concern, handled by combining the principal with the
//! relationship graph.

pub mod principal;
pub mod tokens;

pub use principal::{Principal, CONTROLLER_ADMIN_GROUP};
pub use tokens::StaticTokenAuthenticator;

use armada_catalog::{Error, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve the request's credentials to a principal, or `Unauthorized`.
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal>;
}

/// Pull the bearer token out of an Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::unauthorized("missing authorization header"))?;
    raw.strip_prefix("Bearer ")
        .ok_or_else(|| Error::unauthorized("authorization header is not a bearer token"))
}
