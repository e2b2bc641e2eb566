//! Relation checking with userset expansion and inheritance.
//!
//! # Purpose
//! Implements the transitive closure over the tuple set:
//!
//! 1. direct tuples `(subject, relation, object)`;
//! 2. userset tuples `(group:G#member, relation, object)` where the subject
//!    is a member of `G`, through any depth of group nesting;
//! 3. relation implication: administrator covers writer and reader on
//!    models, consumer and reader on offers, can_addmodel on clouds;
//! 4. controller inheritance: an administrator of a controller is an
//!    administrator of every model and cloud linked to it by a `controller`
//!    edge, and an administrator of a model is an administrator of every
//!    offer linked by a `model` edge.
//!
//! Group cycles are tolerated: membership closure carries a visited set, so
//! a cycle contributes nothing beyond its members.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use crate::store::{RelationStore, Tuple};
use crate::tag::{Kind, Relation, Tag};

/// Outcome of a check, with the derivation steps when tracing was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub allowed: bool,
    pub trace: Vec<String>,
}

#[derive(Clone)]
pub struct Checker {
    store: Arc<RelationStore>,
}

impl Checker {
    pub fn new(store: Arc<RelationStore>) -> Self {
        Self { store }
    }

    /// Does `subject` hold `relation` to `object`?
    pub fn check(
        &self,
        subject: &Tag,
        relation: Relation,
        object: &Tag,
        trace: bool,
    ) -> CheckResult {
        let mut steps = Vec::new();
        let subjects = self.subject_frontier(subject);
        let mut visited = HashSet::new();
        let allowed = self.holds(
            &subjects,
            relation,
            &object.base(),
            &mut visited,
            &mut steps,
            trace,
        );
        CheckResult {
            allowed,
            trace: steps,
        }
    }

    /// Objects of `kind` on which `subject` holds `relation`.
    pub fn list_objects(&self, subject: &Tag, relation: Relation, kind: Kind) -> Vec<Tag> {
        let mut candidates = BTreeSet::new();
        self.store.for_each(|t| {
            if t.target.kind == kind {
                candidates.insert(t.target.base());
            }
        });
        candidates
            .into_iter()
            .filter(|object| self.check(subject, relation, object, false).allowed)
            .collect()
    }

    /// Concrete users holding `relation` to `object`, with group
    /// memberships expanded down to the user frontier.
    pub fn list_users_with_access(&self, object: &Tag, relation: Relation) -> Vec<Tag> {
        let mut users = BTreeSet::new();
        self.store.for_each(|t| {
            if t.subject.kind == Kind::User {
                users.insert(t.subject.base());
            }
        });
        users
            .into_iter()
            .filter(|user| self.check(user, relation, object, false).allowed)
            .collect()
    }

    /// The subject itself plus a `group:G#member` userset for every group
    /// the subject transitively belongs to.
    fn subject_frontier(&self, subject: &Tag) -> Vec<Tag> {
        let mut frontier = vec![subject.base()];
        if subject.kind == Kind::Group {
            // A group subject stands for its membership: tuples granted to
            // the group's userset apply.
            frontier.push(subject.base().with_relation(Relation::Member));
        }
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Tag> = VecDeque::new();
        queue.push_back(subject.base());
        while let Some(current) = queue.pop_front() {
            self.store.for_each(|t| {
                if t.relation != Relation::Member || t.target.kind != Kind::Group {
                    return;
                }
                let matches = match t.subject.relation {
                    // Direct membership of the entity we are expanding.
                    None => t.subject == current,
                    // group:G#member member-of H: members of G are members
                    // of H, so H joins the frontier whenever G has.
                    Some(Relation::Member) => {
                        current.kind == Kind::Group && t.subject.base() == current
                    }
                    Some(_) => false,
                };
                if matches && seen.insert(t.target.id.clone()) {
                    queue.push_back(t.target.base());
                }
            });
        }
        for group in seen {
            frontier.push(Tag::group(group).with_relation(Relation::Member));
        }
        frontier
    }

    fn holds(
        &self,
        subjects: &[Tag],
        relation: Relation,
        object: &Tag,
        visited: &mut HashSet<(Relation, Tag)>,
        steps: &mut Vec<String>,
        tracing: bool,
    ) -> bool {
        // Cycle guard over (relation, object) goals.
        if !visited.insert((relation, object.clone())) {
            return false;
        }

        let implying = implying_relations(relation, object.kind);
        let mut matched: Option<Tuple> = None;
        self.store.for_each(|t| {
            if matched.is_none()
                && t.target == *object
                && implying.contains(&t.relation)
                && subjects.contains(&t.subject)
            {
                matched = Some(t.clone());
            }
        });
        if let Some(t) = matched {
            if tracing {
                steps.push(format!(
                    "{} {} {} (implies {relation})",
                    t.subject, t.relation, t.target
                ));
            }
            return true;
        }

        // Inheritance only produces administrator; follow the edges when
        // administrator would satisfy the requested relation.
        if !implying.contains(&Relation::Administrator) {
            return false;
        }
        let mut parents: Vec<Tuple> = Vec::new();
        self.store.for_each(|t| {
            let inherits = match t.relation {
                Relation::Controller => matches!(object.kind, Kind::Model | Kind::Cloud),
                Relation::Model => object.kind == Kind::ApplicationOffer,
                _ => false,
            };
            if inherits && t.target == *object {
                parents.push(t.clone());
            }
        });
        for parent in parents {
            if self.holds(
                subjects,
                Relation::Administrator,
                &parent.subject.base(),
                visited,
                steps,
                tracing,
            ) {
                if tracing {
                    steps.push(format!(
                        "{} {} {} (administrator inherited)",
                        parent.subject, parent.relation, parent.target
                    ));
                }
                return true;
            }
        }
        false
    }
}

/// Relations whose presence on an object of `kind` implies `relation`.
fn implying_relations(relation: Relation, kind: Kind) -> Vec<Relation> {
    match (kind, relation) {
        (Kind::Model, Relation::Reader) => vec![
            Relation::Reader,
            Relation::Writer,
            Relation::Administrator,
        ],
        (Kind::Model, Relation::Writer) => vec![Relation::Writer, Relation::Administrator],
        (Kind::ApplicationOffer, Relation::Reader) => vec![
            Relation::Reader,
            Relation::Consumer,
            Relation::Administrator,
        ],
        (Kind::ApplicationOffer, Relation::Consumer) => {
            vec![Relation::Consumer, Relation::Administrator]
        }
        (Kind::Cloud, Relation::CanAddModel) => {
            vec![Relation::CanAddModel, Relation::Administrator]
        }
        (Kind::Controller, Relation::AuditLogViewer) => {
            vec![Relation::AuditLogViewer, Relation::Administrator]
        }
        (_, relation) => vec![relation],
    }
}
