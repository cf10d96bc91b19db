//! Normalized entity store.
//!
//! The [`Store`] is the output of a projection pass: category-keyed tables
//! of entities, three ordered root-reference lists (sources, documents,
//! pickles), and two side records (meta, run). Entities may contain
//! [`EntityRef`]s into other tables; the denormalizer inlines them.
//!
//! Tables are `BTreeMap` for deterministic iteration. The store is mutated
//! only by the single sequential projection pass that builds it; once a
//! pass completes it is handed to callers read-only, so concurrent
//! denormalization over a finished store needs no synchronization.

use std::collections::BTreeMap;

use crate::value::{Category, EntityRef, Node};

// ============================================================================
// Run Record
// ============================================================================

/// Side record for the test run as a whole.
///
/// `testRunStarted` / `testRunFinished` are last-write-wins: they describe
/// the single run the whole log belongs to, not a keyed entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    pub started: Option<Node>,
    pub finished: Option<Node>,
}

// ============================================================================
// Store
// ============================================================================

/// Normalized, id-keyed collection of every entity seen in one event log.
#[derive(Debug, Clone, Default)]
pub struct Store {
    tables: BTreeMap<Category, BTreeMap<String, Node>>,
    /// Source roots, in arrival order.
    pub sources: Vec<EntityRef>,
    /// Document roots, in arrival order.
    pub documents: Vec<EntityRef>,
    /// Pickle roots, in arrival order.
    pub pickles: Vec<EntityRef>,
    /// Tooling metadata record, last-write-wins.
    pub meta: Option<Node>,
    /// Run start/finish side record.
    pub run: RunRecord,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Look up the entity a reference points at.
    pub fn lookup(&self, entity_ref: &EntityRef) -> Option<&Node> {
        self.get(entity_ref.category, &entity_ref.id)
    }

    /// Look up an entity by category and id.
    pub fn get(&self, category: Category, id: &str) -> Option<&Node> {
        self.tables.get(&category).and_then(|table| table.get(id))
    }

    pub fn contains(&self, category: Category, id: &str) -> bool {
        self.get(category, id).is_some()
    }

    /// Number of entities in one category's table.
    pub fn len(&self, category: Category) -> usize {
        self.tables.get(&category).map_or(0, BTreeMap::len)
    }

    /// Iterate one category's table in id order.
    pub fn iter(&self, category: Category) -> impl Iterator<Item = (&str, &Node)> {
        self.tables
            .get(&category)
            .into_iter()
            .flat_map(|table| table.iter().map(|(id, node)| (id.as_str(), node)))
    }

    /// Insert a new entity.
    ///
    /// Returns `false` when the (category, id) slot is already taken; ids
    /// are unique within a category across the whole stream, so the caller
    /// treats that as an integrity fault. Existing entities are never
    /// overwritten through this path.
    pub(crate) fn insert_new(&mut self, category: Category, id: impl Into<String>, entity: Node) -> bool {
        let table = self.tables.entry(category).or_default();
        match table.entry(id.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    /// Mutable access to an entity, for the projector's append rules only.
    pub(crate) fn entity_mut(&mut self, category: Category, id: &str) -> Option<&mut Node> {
        self.tables
            .get_mut(&category)
            .and_then(|table| table.get_mut(id))
    }

    /// Iterate a category's entities mutably, for the projector's append
    /// rules (pickle → scenario linking scans every scenario).
    pub(crate) fn iter_mut(
        &mut self,
        category: Category,
    ) -> impl Iterator<Item = (&str, &mut Node)> {
        self.tables
            .get_mut(&category)
            .into_iter()
            .flat_map(|table| table.iter_mut().map(|(id, node)| (id.as_str(), node)))
    }

    /// The conventional denormalization entry point: the ordered document
    /// roots as a single sequence node.
    pub fn documents_root(&self) -> Node {
        Node::Seq(self.documents.iter().cloned().map(Node::Ref).collect())
    }

    /// The ordered source roots as a single sequence node.
    pub fn sources_root(&self) -> Node {
        Node::Seq(self.sources.iter().cloned().map(Node::Ref).collect())
    }

    /// The ordered pickle roots as a single sequence node.
    pub fn pickles_root(&self) -> Node {
        Node::Seq(self.pickles.iter().cloned().map(Node::Ref).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
