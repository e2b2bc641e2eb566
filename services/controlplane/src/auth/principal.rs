//! Principal identity model.

use armada_authz::{Checker, Relation, Tag};
use serde::{Deserialize, Serialize};

/// Members of this group may mutate the controller fleet itself.
pub const CONTROLLER_ADMIN_GROUP: &str = "controller-admin";

/// An authenticated caller: external user name plus the groups resolved at
/// authentication time. Principals are created implicitly on first
/// observation and never destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            groups,
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::user(&self.username)
    }

    /// Check a relation for this principal, folding in the groups the
    /// identity provider reported alongside the relationship graph.
    pub fn holds(&self, checker: &Checker, relation: Relation, object: &Tag) -> bool {
        if checker.check(&self.tag(), relation, object, false).allowed {
            return true;
        }
        self.groups
            .iter()
            .any(|g| checker.check(&Tag::group(g), relation, object, false).allowed)
    }

    /// Fleet-admin gate: membership of the controller-admin group, either
    /// asserted by the identity provider or recorded in the graph.
    pub fn is_controller_admin(&self, checker: &Checker) -> bool {
        if self.groups.iter().any(|g| g == CONTROLLER_ADMIN_GROUP) {
            return true;
        }
        checker
            .check(
                &self.tag(),
                Relation::Member,
                &Tag::group(CONTROLLER_ADMIN_GROUP),
                false,
            )
            .allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_authz::{RelationStore, Tuple};
    use std::sync::Arc;

    #[test]
    fn controller_admin_via_idp_group() {
        let checker = Checker::new(Arc::new(RelationStore::new()));
        let alice = Principal::new("alice", vec![CONTROLLER_ADMIN_GROUP.to_string()]);
        assert!(alice.is_controller_admin(&checker));
        let bob = Principal::new("bob", vec![]);
        assert!(!bob.is_controller_admin(&checker));
    }

    #[test]
    fn controller_admin_via_graph_membership() {
        let store = Arc::new(RelationStore::new());
        store
            .add_relations(&[Tuple::new(
                Tag::user("carol"),
                Relation::Member,
                Tag::group(CONTROLLER_ADMIN_GROUP),
            )])
            .unwrap();
        let checker = Checker::new(store);
        let carol = Principal::new("carol", vec![]);
        assert!(carol.is_controller_admin(&checker));
    }

    #[test]
    fn holds_considers_idp_groups() {
        let store = Arc::new(RelationStore::new());
        store
            .add_relations(&[Tuple::new(
                Tag::group("eng").with_relation(Relation::Member),
                Relation::Reader,
                Tag::model("m-1"),
            )])
            .unwrap();
        let checker = Checker::new(store);
        let alice = Principal::new("alice", vec!["eng".to_string()]);
        assert!(alice.holds(&checker, Relation::Reader, &Tag::model("m-1")));
        let bob = Principal::new("bob", vec![]);
        assert!(!bob.holds(&checker, Relation::Reader, &Tag::model("m-1")));
    }
}
