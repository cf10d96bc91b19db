//! Denormalization: recursive inlining of references.
//!
//! [`resolve`] walks a value and replaces every [`EntityRef`] with the
//! referenced entity, itself recursively resolved, producing a
//! reference-free structural copy safe for direct consumption by a
//! renderer. Scalars pass through, sequences resolve element-wise in
//! order, mappings resolve value-wise.
//!
//! The projected data model is acyclic by construction (references point
//! from container to contained, never backward), but a malformed store
//! must fail loudly rather than loop: the resolver keeps a stack of
//! in-flight references and faults on re-entry.
//!
//! The store is read-only here; concurrent resolutions over different
//! entry points of a finished store are safe.

use thiserror::Error;

use crate::store::Store;
use crate::value::{EntityRef, Node};

// ============================================================================
// Errors
// ============================================================================

/// Faults raised while denormalizing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A reference points at an entity the store does not contain.
    #[error("dangling reference to {0}")]
    Dangling(EntityRef),

    /// A reference chain re-entered an entity still being resolved.
    #[error("reference cycle through {0}")]
    Cycle(EntityRef),
}

// ============================================================================
// Resolution
// ============================================================================

/// Produce a reference-free copy of `value`, inlining every reference
/// chain in full.
///
/// Idempotent on already-resolved input: a value containing no references
/// comes back structurally equal.
pub fn resolve(value: &Node, store: &Store) -> Result<Node, ResolveError> {
    let mut in_flight = Vec::new();
    resolve_inner(value, store, &mut in_flight)
}

fn resolve_inner(
    value: &Node,
    store: &Store,
    in_flight: &mut Vec<EntityRef>,
) -> Result<Node, ResolveError> {
    match value {
        Node::Ref(entity_ref) => {
            if in_flight.contains(entity_ref) {
                return Err(ResolveError::Cycle(entity_ref.clone()));
            }
            let target = store
                .lookup(entity_ref)
                .ok_or_else(|| ResolveError::Dangling(entity_ref.clone()))?;
            in_flight.push(entity_ref.clone());
            let resolved = resolve_inner(target, store, in_flight)?;
            in_flight.pop();
            Ok(resolved)
        }
        Node::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_inner(item, store, in_flight)?);
            }
            Ok(Node::Seq(out))
        }
        Node::Map(entries) => {
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in entries {
                out.insert(key.clone(), resolve_inner(item, store, in_flight)?);
            }
            Ok(Node::Map(out))
        }
        scalar => Ok(scalar.clone()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Category;
    use serde_json::json;

    fn store_with(entities: &[(Category, &str, Node)]) -> Store {
        let mut store = Store::new();
        for (category, id, entity) in entities {
            assert!(store.insert_new(*category, *id, entity.clone()));
        }
        store
    }

    #[test]
    fn scalars_pass_through() {
        let store = Store::new();
        let value = Node::from(json!({ "n": 3, "s": "x", "b": true, "z": null }));
        assert_eq!(resolve(&value, &store).unwrap(), value);
    }

    #[test]
    fn reference_chain_is_fully_inlined() {
        let store = store_with(&[
            (
                Category::Scenario,
                "s1",
                Node::Seq(vec![Node::reference(Category::Step, "st1")]),
            ),
            (Category::Step, "st1", Node::String("the step".to_string())),
        ]);
        let value = Node::reference(Category::Scenario, "s1");
        let resolved = resolve(&value, &store).unwrap();
        assert_eq!(
            resolved,
            Node::Seq(vec![Node::String("the step".to_string())])
        );
    }

    #[test]
    fn sequence_order_is_preserved() {
        let store = store_with(&[
            (Category::Step, "a", Node::String("first".to_string())),
            (Category::Step, "b", Node::String("second".to_string())),
        ]);
        let value = Node::Seq(vec![
            Node::reference(Category::Step, "b"),
            Node::reference(Category::Step, "a"),
        ]);
        let resolved = resolve(&value, &store).unwrap();
        assert_eq!(
            resolved.as_seq().unwrap()[0],
            Node::String("second".to_string())
        );
    }

    #[test]
    fn idempotent_on_resolved_input() {
        let store = store_with(&[(
            Category::Pickle,
            "p1",
            Node::from(json!({ "name": "p", "tags": [] })),
        )]);
        let once = resolve(&Node::reference(Category::Pickle, "p1"), &store).unwrap();
        let twice = resolve(&once, &store).unwrap();
        assert_eq!(once, twice);
        assert!(once.is_resolved());
    }

    #[test]
    fn dangling_reference_faults_with_target() {
        let store = Store::new();
        let err = resolve(&Node::reference(Category::Source, "missing.feature"), &store)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::Dangling(EntityRef::new(Category::Source, "missing.feature"))
        );
    }

    #[test]
    fn self_referencing_entity_faults_instead_of_looping() {
        let store = store_with(&[(
            Category::Scenario,
            "s1",
            Node::reference(Category::Scenario, "s1"),
        )]);
        let err = resolve(&Node::reference(Category::Scenario, "s1"), &store).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Cycle(EntityRef::new(Category::Scenario, "s1"))
        );
    }

    #[test]
    fn two_entity_cycle_faults() {
        let store = store_with(&[
            (
                Category::Scenario,
                "s1",
                Node::reference(Category::Pickle, "p1"),
            ),
            (
                Category::Pickle,
                "p1",
                Node::reference(Category::Scenario, "s1"),
            ),
        ]);
        let err = resolve(&Node::reference(Category::Scenario, "s1"), &store).unwrap_err();
        assert!(matches!(err, ResolveError::Cycle(_)));
    }

    #[test]
    fn shared_target_resolved_in_both_places() {
        // Two references to the same entity are not a cycle: the stack is
        // unwound between siblings.
        let store = store_with(&[(Category::Step, "st1", Node::String("shared".to_string()))]);
        let value = Node::Seq(vec![
            Node::reference(Category::Step, "st1"),
            Node::reference(Category::Step, "st1"),
        ]);
        let resolved = resolve(&value, &store).unwrap();
        assert_eq!(resolved.as_seq().unwrap().len(), 2);
        assert!(resolved.is_resolved());
    }
}
