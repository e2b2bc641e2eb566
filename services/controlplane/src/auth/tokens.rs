//! Bearer-token authenticator backed by a static token file.
//!
//! # Purpose
//! Maps opaque bearer tokens onto principals from a YAML file:
//!
//! ```yaml
//! tokens:
//!   "token-abc":
//!     username: alice@external
//!     groups: [controller-admin]
//! ```
//!
//! Deployments fronted by a real identity service implement
//! [`Authenticator`](super::Authenticator) against that service instead;
//! this one covers single-node installs and every test.

use std::collections::HashMap;

use anyhow::Context;
use armada_catalog::{Error, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;

use super::{Authenticator, Principal, bearer_token};

#[derive(Debug, Deserialize)]
struct TokenFile {
    tokens: HashMap<String, Principal>,
}

#[derive(Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read auth tokens: {path}"))?;
        let file: TokenFile =
            serde_yaml::from_str(&contents).with_context(|| "parse auth tokens yaml")?;
        Ok(Self {
            tokens: file.tokens,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal> {
        let token = bearer_token(headers)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::unauthorized("unknown token"))
    }
}
