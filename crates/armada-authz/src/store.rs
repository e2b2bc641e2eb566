//! Tuple storage.
//!
//! Tuples are held in an ordered in-memory set. Mutations are idempotent at
//! the tuple grain; a batch is applied tuple by tuple and fails fast on the
//! first invalid entry, leaving earlier tuples applied, so callers retry
//! with the full batch.

use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tag::{Kind, Relation, Tag};

/// One edge of the relationship graph: `subject` holds `relation` to
/// `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tuple {
    pub subject: Tag,
    pub relation: Relation,
    pub target: Tag,
}

impl Tuple {
    pub fn new(subject: Tag, relation: Relation, target: Tag) -> Self {
        Self {
            subject,
            relation,
            target,
        }
    }

    /// Structural validation against the fixed type graph.
    fn validate(&self) -> Result<()> {
        let fail = |why: &str| Err(Error::InvalidTuple(format!("{self:?}: {why}")));
        // The only userset subject the model carries is group membership.
        match self.subject.relation {
            None => {}
            Some(Relation::Member) if self.subject.kind == Kind::Group => {}
            Some(_) => return fail("subject userset must be group#member"),
        }
        if self.target.relation.is_some() {
            return fail("target must not carry a relation");
        }
        let ok = match self.relation {
            Relation::Member => {
                self.target.kind == Kind::Group
                    && matches!(self.subject.kind, Kind::User | Kind::Group)
            }
            Relation::Administrator => matches!(
                self.target.kind,
                Kind::Controller | Kind::Cloud | Kind::Model | Kind::ApplicationOffer
            ),
            Relation::Controller => {
                self.subject.kind == Kind::Controller
                    && self.subject.relation.is_none()
                    && matches!(self.target.kind, Kind::Model | Kind::Cloud)
            }
            Relation::Model => {
                self.subject.kind == Kind::Model
                    && self.subject.relation.is_none()
                    && self.target.kind == Kind::ApplicationOffer
            }
            Relation::Consumer => self.target.kind == Kind::ApplicationOffer,
            Relation::Reader => {
                matches!(self.target.kind, Kind::Model | Kind::ApplicationOffer)
            }
            Relation::Writer => self.target.kind == Kind::Model,
            Relation::CanAddModel => self.target.kind == Kind::Cloud,
            Relation::AuditLogViewer => self.target.kind == Kind::Controller,
        };
        if !ok {
            return fail("relation not carried by target kind");
        }
        Ok(())
    }
}

/// One page of a tuple listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    pub tuples: Vec<Tuple>,
    /// Opaque cursor for the next page; absent on the last page.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Default)]
pub struct RelationStore {
    tuples: RwLock<BTreeSet<Tuple>>,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_relations(&self, tuples: &[Tuple]) -> Result<()> {
        let mut set = self.tuples.write().expect("relation store poisoned");
        for tuple in tuples {
            tuple.validate()?;
            set.insert(tuple.clone());
        }
        Ok(())
    }

    pub fn remove_relations(&self, tuples: &[Tuple]) -> Result<()> {
        let mut set = self.tuples.write().expect("relation store poisoned");
        for tuple in tuples {
            tuple.validate()?;
            set.remove(tuple);
        }
        Ok(())
    }

    /// Remove every tuple that names the tag as subject or target, in any
    /// userset form. Used when the underlying resource is destroyed.
    pub fn remove_all_for(&self, tag: &Tag) {
        let base = tag.base();
        let mut set = self.tuples.write().expect("relation store poisoned");
        set.retain(|t| t.subject.base() != base && t.target.base() != base);
    }

    pub fn list_relations(
        &self,
        subject: Option<&Tag>,
        relation: Option<Relation>,
        target: Option<&Tag>,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ListPage> {
        let offset = match cursor {
            None => 0,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::InvalidCursor(raw.to_string()))?,
        };
        let page_size = page_size.clamp(1, 1000);
        let set = self.tuples.read().expect("relation store poisoned");
        let matching: Vec<Tuple> = set
            .iter()
            .filter(|t| subject.is_none_or(|s| t.subject == *s))
            .filter(|t| relation.is_none_or(|r| t.relation == r))
            .filter(|t| target.is_none_or(|o| t.target == *o))
            .skip(offset)
            .take(page_size + 1)
            .cloned()
            .collect();
        let next_cursor = (matching.len() > page_size).then(|| (offset + page_size).to_string());
        let tuples = matching.into_iter().take(page_size).collect();
        Ok(ListPage {
            tuples,
            next_cursor,
        })
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<Tuple> {
        self.tuples
            .read()
            .expect("relation store poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn for_each<F: FnMut(&Tuple)>(&self, mut f: F) {
        for tuple in self.tuples.read().expect("relation store poisoned").iter() {
            f(tuple);
        }
    }
}
