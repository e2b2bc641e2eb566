//! Typed entity tags.
//!
//! A tag is `kind:id` or, for usersets, `kind:id#relation`. Kinds and
//! relations are fixed discriminators; anything outside the grammar is an
//! error, never a best-effort parse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    User,
    Group,
    Controller,
    Model,
    #[serde(rename = "applicationoffer")]
    ApplicationOffer,
    Cloud,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::User => "user",
            Kind::Group => "group",
            Kind::Controller => "controller",
            Kind::Model => "model",
            Kind::ApplicationOffer => "applicationoffer",
            Kind::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        match value {
            "user" => Ok(Kind::User),
            "group" => Ok(Kind::Group),
            "controller" => Ok(Kind::Controller),
            "model" => Ok(Kind::Model),
            "applicationoffer" => Ok(Kind::ApplicationOffer),
            "cloud" => Ok(Kind::Cloud),
            _ => Err(Error::InvalidTag(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Member,
    Administrator,
    /// Links a controller to a model or cloud it operates.
    Controller,
    /// Links a model to an offer it exported.
    Model,
    Consumer,
    Reader,
    Writer,
    CanAddModel,
    AuditLogViewer,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Member => "member",
            Relation::Administrator => "administrator",
            Relation::Controller => "controller",
            Relation::Model => "model",
            Relation::Consumer => "consumer",
            Relation::Reader => "reader",
            Relation::Writer => "writer",
            Relation::CanAddModel => "can_addmodel",
            Relation::AuditLogViewer => "audit_log_viewer",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        match value {
            "member" => Ok(Relation::Member),
            "administrator" => Ok(Relation::Administrator),
            "controller" => Ok(Relation::Controller),
            "model" => Ok(Relation::Model),
            "consumer" => Ok(Relation::Consumer),
            "reader" => Ok(Relation::Reader),
            "writer" => Ok(Relation::Writer),
            "can_addmodel" => Ok(Relation::CanAddModel),
            "audit_log_viewer" => Ok(Relation::AuditLogViewer),
            _ => Err(Error::InvalidRelation(value.to_string())),
        }
    }
}

/// A typed entity reference, optionally narrowed to a userset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    pub kind: Kind,
    pub id: String,
    pub relation: Option<Relation>,
}

impl Tag {
    pub fn new(kind: Kind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            relation: None,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(Kind::User, id)
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self::new(Kind::Group, id)
    }

    pub fn controller(id: impl Into<String>) -> Self {
        Self::new(Kind::Controller, id)
    }

    pub fn model(id: impl Into<String>) -> Self {
        Self::new(Kind::Model, id)
    }

    pub fn offer(id: impl Into<String>) -> Self {
        Self::new(Kind::ApplicationOffer, id)
    }

    pub fn cloud(id: impl Into<String>) -> Self {
        Self::new(Kind::Cloud, id)
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    /// The tag without its userset narrowing.
    pub fn base(&self) -> Tag {
        Tag::new(self.kind, self.id.clone())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Some(rel) => write!(f, "{}:{}#{}", self.kind, self.id, rel),
            None => write!(f, "{}:{}", self.kind, self.id),
        }
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Error> {
        let (kind, rest) = value
            .split_once(':')
            .ok_or_else(|| Error::InvalidTag(value.to_string()))?;
        let kind: Kind = kind.parse()?;
        let (id, relation) = match rest.split_once('#') {
            Some((id, relation)) => (id, Some(relation.parse()?)),
            None => (rest, None),
        };
        if id.is_empty() || id.contains('#') || id.contains(':') {
            return Err(Error::InvalidTag(value.to_string()));
        }
        Ok(Tag {
            kind,
            id: id.to_string(),
            relation,
        })
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Error> {
        value.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> String {
        tag.to_string()
    }
}
