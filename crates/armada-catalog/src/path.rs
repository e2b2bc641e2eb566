//! Stable string identities for catalog records.
//!
//! # Purpose
//! Controllers and models are addressed by `<owner>/<name>` paths and
//! credentials by `<owner>/<cloud>/<name>`. Paths parse strictly; a malformed
//! path is a [`Error::BadRequest`](crate::Error::BadRequest), never a partial
//! record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

fn valid_component(s: &str) -> bool {
    !s.is_empty() && !s.contains('/') && !s.contains(char::is_whitespace)
}

/// Owner-qualified name of a controller or model: `<owner>/<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityPath {
    pub user: String,
    pub name: String,
}

impl EntityPath {
    pub fn new(user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.name)
    }
}

impl FromStr for EntityPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (user, name) = s
            .split_once('/')
            .ok_or_else(|| Error::bad_request(format!("invalid entity path {s:?}")))?;
        if !valid_component(user) || !valid_component(name) {
            return Err(Error::bad_request(format!("invalid entity path {s:?}")));
        }
        Ok(Self::new(user, name))
    }
}

impl TryFrom<String> for EntityPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        s.parse()
    }
}

impl From<EntityPath> for String {
    fn from(p: EntityPath) -> String {
        p.to_string()
    }
}

/// Identity of a cloud credential: `<owner>/<cloud>/<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialPath {
    pub user: String,
    pub cloud: String,
    pub name: String,
}

impl CredentialPath {
    pub fn new(
        user: impl Into<String>,
        cloud: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            cloud: cloud.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CredentialPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.user, self.cloud, self.name)
    }
}

impl FromStr for CredentialPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(cloud), Some(name), None)
                if valid_component(user) && valid_component(cloud) && valid_component(name) =>
            {
                Ok(Self::new(user, cloud, name))
            }
            _ => Err(Error::bad_request(format!("invalid credential path {s:?}"))),
        }
    }
}

impl TryFrom<String> for CredentialPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        s.parse()
    }
}

impl From<CredentialPath> for String {
    fn from(p: CredentialPath) -> String {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_path_round_trips() {
        let p: EntityPath = "bob/c1".parse().expect("parse");
        assert_eq!(p, EntityPath::new("bob", "c1"));
        assert_eq!(p.to_string(), "bob/c1");
    }

    #[test]
    fn entity_path_rejects_garbage() {
        for bad in ["", "bob", "/c1", "bob/", "a/b/c", "bo b/c1"] {
            assert!(bad.parse::<EntityPath>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn credential_path_round_trips() {
        let p: CredentialPath = "alice/aws/default".parse().expect("parse");
        assert_eq!(p.cloud, "aws");
        assert_eq!(p.to_string(), "alice/aws/default");
    }

    #[test]
    fn credential_path_rejects_garbage() {
        for bad in ["", "a/b", "a/b/c/d", "a//c"] {
            assert!(bad.parse::<CredentialPath>().is_err(), "accepted {bad:?}");
        }
    }
}
