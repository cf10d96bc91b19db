//! Value model for projected entities.
//!
//! Projected entities are trees of [`Node`]:
//! - Scalars (`Null`, `Bool`, `Number`, `String`) pass through projection
//!   and denormalization unchanged
//! - `Seq` is an ordered sequence; order is semantically load-bearing
//!   (scenario order, step order, attempt order)
//! - `Map` is a string-keyed mapping with deterministic iteration
//! - `Ref` is a typed pointer ([`EntityRef`]) into the [`Store`]: relation
//!   plus lookup, never ownership
//!
//! A `Node` converts losslessly from [`serde_json::Value`]; conversion back
//! fails if any `Ref` remains, so only fully denormalized trees serialize.
//!
//! [`Store`]: crate::store::Store

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

// ============================================================================
// Entity Categories
// ============================================================================

/// Entity category within the store.
///
/// Each record in the event log defines entities of one or more of these
/// categories; an ([`Category`], id) pair identifies exactly one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Raw source file content, keyed by uri.
    Source,
    /// Parsed gherkin document, keyed by uri.
    Document,
    /// Scenario declaration inside a document.
    Scenario,
    /// Document-level step inside a scenario.
    Step,
    /// Fully expanded scenario instance.
    Pickle,
    /// Step inside a pickle.
    PickleStep,
    /// Step definition (glue code pattern).
    StepDefinition,
    /// Executable test case bound to a pickle.
    TestCase,
    /// Execution unit binding a pickle step to step definitions.
    TestStep,
    /// One execution attempt of a test case.
    TestCaseRun,
}

impl Category {
    /// Stable name, used in fault messages and `inspect` output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Source => "source",
            Category::Document => "document",
            Category::Scenario => "scenario",
            Category::Step => "step",
            Category::Pickle => "pickle",
            Category::PickleStep => "pickleStep",
            Category::StepDefinition => "stepDefinition",
            Category::TestCase => "testCase",
            Category::TestStep => "testStep",
            Category::TestCaseRun => "testCaseRun",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// References
// ============================================================================

/// Typed pointer into the store: (category, id).
///
/// References are never inlined copies; resolution always goes through
/// [`Store::lookup`], so entity lifetime is entirely store-owned.
///
/// [`Store::lookup`]: crate::store::Store::lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub category: Category,
    pub id: String,
}

impl EntityRef {
    pub fn new(category: Category, id: impl Into<String>) -> Self {
        EntityRef {
            category,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.id)
    }
}

// ============================================================================
// Node
// ============================================================================

/// One node of a projected entity tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Ordered sequence; element order is preserved through projection and
    /// denormalization.
    Seq(Vec<Node>),
    /// String-keyed mapping; BTreeMap for deterministic iteration.
    Map(BTreeMap<String, Node>),
    /// Typed reference to another entity in the store.
    Ref(EntityRef),
}

impl Node {
    /// Reference node shorthand.
    pub fn reference(category: Category, id: impl Into<String>) -> Self {
        Node::Ref(EntityRef::new(category, id))
    }

    /// Empty map shorthand.
    pub fn empty_map() -> Self {
        Node::Map(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_seq_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Node::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Map field access; `None` for non-maps and missing keys.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_map().and_then(|entries| entries.get(key))
    }

    /// True if the tree contains no `Ref` node.
    pub fn is_resolved(&self) -> bool {
        match self {
            Node::Ref(_) => false,
            Node::Seq(items) => items.iter().all(Node::is_resolved),
            Node::Map(entries) => entries.values().all(Node::is_resolved),
            _ => true,
        }
    }

    /// Convert back to a JSON value.
    ///
    /// Fails with the first remaining reference: only fully denormalized
    /// trees have a JSON representation.
    pub fn to_value(&self) -> Result<Value, EntityRef> {
        match self {
            Node::Null => Ok(Value::Null),
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::Number(n) => Ok(Value::Number(n.clone())),
            Node::String(s) => Ok(Value::String(s.clone())),
            Node::Seq(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_value()?);
                }
                Ok(Value::Array(out))
            }
            Node::Map(entries) => {
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (key, value) in entries {
                    out.insert(key.clone(), value.to_value()?);
                }
                Ok(Value::Object(out))
            }
            Node::Ref(entity_ref) => Err(entity_ref.clone()),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => Node::Number(n),
            Value::String(s) => Node::String(s),
            Value::Array(items) => Node::Seq(items.into_iter().map(Node::from).collect()),
            Value::Object(entries) => Node::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Map<String, Value>> for Node {
    fn from(entries: serde_json::Map<String, Value>) -> Self {
        Node::from(Value::Object(entries))
    }
}

// ============================================================================
// Tests
// ============================================================================
