//! Projection: fold the event log into the normalized store.
//!
//! [`project`] consumes the decoded records of one event log strictly in
//! input order and builds a [`Store`]. Order is semantically load-bearing:
//! later records append relational references to entities created by
//! earlier ones (a pickle links back to its scenarios, a test case links
//! back to its pickle, step start/finish pairs complete attempts in place).
//!
//! Dispatch is by which recognized top-level field a record carries.
//! Records carrying none of them are skipped (forward compatibility: an
//! unknown record shape must never abort the fold). All other failure
//! modes are integrity faults that abort the pass; the store is only
//! returned on full success, so a mid-pass fault leaves no partially
//! mutated store visible to callers.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::record::{
    Extra, GherkinDocumentMsg, PickleMsg, SourceMsg, StepDefinitionMsg, TestCaseFinishedMsg,
    TestCaseMsg, TestCaseStartedMsg, TestStepFinishedMsg, TestStepStartedMsg,
};
use crate::store::Store;
use crate::value::{Category, EntityRef, Node};

// ============================================================================
// Errors
// ============================================================================

/// Integrity faults raised while folding the event log.
///
/// Every variant carries the zero-based index of the offending record so
/// the fault can be traced back to a line of the log.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// A recognized record whose payload does not have the required shape.
    #[error("record {index}: malformed {kind} record: {source}")]
    Malformed {
        index: usize,
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Two records defined the same (category, id) pair.
    #[error("record {index}: duplicate {category} id '{id}'")]
    DuplicateId {
        index: usize,
        category: Category,
        id: String,
    },

    /// A record referenced an id that no earlier record defined.
    #[error("record {index}: {kind} references unknown {category} id '{id}'")]
    UnknownReference {
        index: usize,
        kind: &'static str,
        category: Category,
        id: String,
    },

    /// A payload carried a field name the projection reserves for a
    /// relation it builds itself.
    #[error("record {index}: {kind} payload carries reserved field '{field}'")]
    ReservedField {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    /// testStepFinished with no open attempt for that step.
    #[error(
        "record {index}: testStepFinished for step '{step_id}' in run '{run_id}' \
         has no open attempt"
    )]
    FinishWithoutStart {
        index: usize,
        run_id: String,
        step_id: String,
    },
}

// ============================================================================
// Projection
// ============================================================================

/// Fold an ordered sequence of decoded records into a [`Store`].
///
/// The log is assumed causally ordered: a referencing record never
/// precedes the record defining its target, except for the two-phase
/// start/finish pairs handled explicitly. A failed lookup is a fatal
/// integrity fault, not a skip.
pub fn project<I>(records: I) -> Result<Store, ProjectError>
where
    I: IntoIterator<Item = Value>,
{
    let mut store = Store::new();
    for (index, record) in records.into_iter().enumerate() {
        apply(&mut store, index, record)?;
    }
    debug!(
        documents = store.documents.len(),
        pickles = store.pickles.len(),
        test_cases = store.len(Category::TestCase),
        "projection pass complete"
    );
    Ok(store)
}

/// Recognized top-level fields, in dispatch order.
const KNOWN_FIELDS: &[&str] = &[
    "meta",
    "source",
    "gherkinDocument",
    "pickle",
    "stepDefinition",
    "testRunStarted",
    "testCase",
    "testCaseStarted",
    "testStepStarted",
    "testStepFinished",
    "testCaseFinished",
    "testRunFinished",
];

fn apply(store: &mut Store, index: usize, record: Value) -> Result<(), ProjectError> {
    let Value::Object(mut envelope) = record else {
        debug!(index, "skipping non-object record");
        return Ok(());
    };
    let Some(field) = KNOWN_FIELDS
        .iter()
        .copied()
        .find(|f| envelope.contains_key(*f))
    else {
        debug!(index, "skipping record with no recognized field");
        return Ok(());
    };
    let payload = envelope
        .remove(field)
        .expect("field presence checked above");

    match field {
        "meta" => {
            // Last-write-wins side attribute, not category-keyed.
            store.meta = Some(Node::from(payload));
            Ok(())
        }
        "source" => apply_source(store, index, decode(index, "source", payload)?),
        "gherkinDocument" => {
            apply_document(store, index, decode(index, "gherkinDocument", payload)?)
        }
        "pickle" => apply_pickle(store, index, decode(index, "pickle", payload)?),
        "stepDefinition" => {
            apply_step_definition(store, index, decode(index, "stepDefinition", payload)?)
        }
        "testRunStarted" => {
            store.run.started = Some(Node::from(payload));
            Ok(())
        }
        "testRunFinished" => {
            store.run.finished = Some(Node::from(payload));
            Ok(())
        }
        "testCase" => apply_test_case(store, index, decode(index, "testCase", payload)?),
        "testCaseStarted" => {
            apply_test_case_started(store, index, decode(index, "testCaseStarted", payload)?)
        }
        "testStepStarted" => {
            apply_test_step_started(store, index, decode(index, "testStepStarted", payload)?)
        }
        "testStepFinished" => {
            apply_test_step_finished(store, index, decode(index, "testStepFinished", payload)?)
        }
        "testCaseFinished" => {
            apply_test_case_finished(store, index, decode(index, "testCaseFinished", payload)?)
        }
        _ => unreachable!("field drawn from KNOWN_FIELDS"),
    }
}

fn decode<T: DeserializeOwned>(
    index: usize,
    kind: &'static str,
    payload: Value,
) -> Result<T, ProjectError> {
    serde_json::from_value(payload).map_err(|source| ProjectError::Malformed {
        index,
        kind,
        source,
    })
}

/// Lift a catch-all payload map into node map entries.
fn entries_from(extra: Extra) -> BTreeMap<String, Node> {
    extra
        .into_iter()
        .map(|(key, value)| (key, Node::from(value)))
        .collect()
}

/// Reject payload fields that collide with relations the projection
/// appends later. The append rules rely on owning these keys: a scalar
/// smuggled in under `pickles` or `testCases` would otherwise corrupt the
/// entity the first time a reference is pushed onto it.
fn reject_reserved(
    index: usize,
    kind: &'static str,
    entries: &BTreeMap<String, Node>,
    reserved: &[&'static str],
) -> Result<(), ProjectError> {
    for &field in reserved {
        if entries.contains_key(field) {
            return Err(ProjectError::ReservedField { index, kind, field });
        }
    }
    Ok(())
}

fn insert_new(
    store: &mut Store,
    index: usize,
    category: Category,
    id: &str,
    entity: Node,
) -> Result<(), ProjectError> {
    if store.insert_new(category, id, entity) {
        Ok(())
    } else {
        Err(ProjectError::DuplicateId {
            index,
            category,
            id: id.to_string(),
        })
    }
}

// ============================================================================
// Per-Category Handlers
// ============================================================================

fn apply_source(store: &mut Store, index: usize, msg: SourceMsg) -> Result<(), ProjectError> {
    let entity = Node::Map(entries_from(msg.extra));
    insert_new(store, index, Category::Source, &msg.uri, entity)?;
    store
        .sources
        .push(EntityRef::new(Category::Source, msg.uri));
    Ok(())
}

fn apply_document(
    store: &mut Store,
    index: usize,
    msg: GherkinDocumentMsg,
) -> Result<(), ProjectError> {
    let mut scenario_refs = Vec::new();
    for child in msg.feature.children {
        // Background and rule children carry no scenario; skip them.
        let Some(scenario) = child.scenario else {
            continue;
        };
        let mut step_refs = Vec::with_capacity(scenario.steps.len());
        for step in scenario.steps {
            step_refs.push(Node::reference(Category::Step, step.id.clone()));
            let entity = Node::Map(entries_from(step.extra));
            insert_new(store, index, Category::Step, &step.id, entity)?;
        }
        scenario_refs.push(Node::reference(Category::Scenario, scenario.id.clone()));
        let mut entries = entries_from(scenario.extra);
        reject_reserved(index, "gherkinDocument", &entries, &["steps", "pickles"])?;
        entries.insert("steps".to_string(), Node::Seq(step_refs));
        insert_new(store, index, Category::Scenario, &scenario.id, Node::Map(entries))?;
    }

    let mut feature = entries_from(msg.feature.extra);
    reject_reserved(index, "gherkinDocument", &feature, &["scenarios"])?;
    feature.insert("scenarios".to_string(), Node::Seq(scenario_refs));
    let mut entries = entries_from(msg.extra);
    reject_reserved(index, "gherkinDocument", &entries, &["feature"])?;
    entries.insert("feature".to_string(), Node::Map(feature));
    insert_new(store, index, Category::Document, &msg.uri, Node::Map(entries))?;
    store
        .documents
        .push(EntityRef::new(Category::Document, msg.uri));
    Ok(())
}

fn apply_pickle(store: &mut Store, index: usize, msg: PickleMsg) -> Result<(), ProjectError> {
    // Link every scenario whose AST node id appears in this pickle's id
    // list (membership test, not first-match: one pickle may point at
    // several AST nodes, and outline expansion yields several pickles
    // per scenario).
    for (scenario_id, scenario) in store.iter_mut(Category::Scenario) {
        if !msg.ast_node_ids.iter().any(|id| id.as_str() == scenario_id) {
            continue;
        }
        let entries = scenario
            .as_map_mut()
            .expect("scenario entities are maps by construction");
        entries
            .entry("pickles".to_string())
            .or_insert_with(|| Node::Seq(Vec::new()))
            .as_seq_mut()
            .expect("scenario pickles field is a sequence by construction")
            .push(Node::reference(Category::Pickle, msg.id.clone()));
    }

    let mut step_refs = Vec::with_capacity(msg.steps.len());
    for step in msg.steps {
        step_refs.push(Node::reference(Category::PickleStep, step.id.clone()));
        let entity = Node::Map(entries_from(step.extra));
        insert_new(store, index, Category::PickleStep, &step.id, entity)?;
    }

    let mut entries = entries_from(msg.extra);
    reject_reserved(index, "pickle", &entries, &["source", "steps", "testCases"])?;
    entries.insert(
        "source".to_string(),
        Node::reference(Category::Source, msg.uri),
    );
    entries.insert("steps".to_string(), Node::Seq(step_refs));
    insert_new(store, index, Category::Pickle, &msg.id, Node::Map(entries))?;
    store
        .pickles
        .push(EntityRef::new(Category::Pickle, msg.id));
    Ok(())
}

fn apply_step_definition(
    store: &mut Store,
    index: usize,
    msg: StepDefinitionMsg,
) -> Result<(), ProjectError> {
    let entity = Node::Map(entries_from(msg.extra));
    insert_new(store, index, Category::StepDefinition, &msg.id, entity)
}

fn apply_test_case(store: &mut Store, index: usize, msg: TestCaseMsg) -> Result<(), ProjectError> {
    // The pickle must already exist; the log is causally ordered.
    let pickle = store
        .entity_mut(Category::Pickle, &msg.pickle_id)
        .ok_or_else(|| ProjectError::UnknownReference {
            index,
            kind: "testCase",
            category: Category::Pickle,
            id: msg.pickle_id.clone(),
        })?;
    pickle
        .as_map_mut()
        .expect("pickle entities are maps by construction")
        .entry("testCases".to_string())
        .or_insert_with(|| Node::Seq(Vec::new()))
        .as_seq_mut()
        .expect("pickle testCases field is a sequence by construction")
        .push(Node::reference(Category::TestCase, msg.id.clone()));

    let mut test_step_refs = Vec::with_capacity(msg.test_steps.len());
    for test_step in msg.test_steps {
        test_step_refs.push(Node::reference(Category::TestStep, test_step.id.clone()));
        let mut entries = entries_from(test_step.extra);
        reject_reserved(index, "testCase", &entries, &["pickleStep", "stepDefinitions"])?;
        if let Some(pickle_step_id) = test_step.pickle_step_id {
            entries.insert(
                "pickleStep".to_string(),
                Node::reference(Category::PickleStep, pickle_step_id),
            );
        }
        entries.insert(
            "stepDefinitions".to_string(),
            Node::Seq(
                test_step
                    .step_definition_ids
                    .into_iter()
                    .map(|id| Node::reference(Category::StepDefinition, id))
                    .collect(),
            ),
        );
        insert_new(store, index, Category::TestStep, &test_step.id, Node::Map(entries))?;
    }

    let mut entries = BTreeMap::new();
    entries.insert("testSteps".to_string(), Node::Seq(test_step_refs));
    insert_new(store, index, Category::TestCase, &msg.id, Node::Map(entries))
}

fn apply_test_case_started(
    store: &mut Store,
    index: usize,
    msg: TestCaseStartedMsg,
) -> Result<(), ProjectError> {
    let test_case = store
        .entity_mut(Category::TestCase, &msg.test_case_id)
        .ok_or_else(|| ProjectError::UnknownReference {
            index,
            kind: "testCaseStarted",
            category: Category::TestCase,
            id: msg.test_case_id.clone(),
        })?;
    // Single active run: a later start for the same test case replaces
    // the reference, it does not accumulate.
    test_case
        .as_map_mut()
        .expect("test case entities are maps by construction")
        .insert(
            "runs".to_string(),
            Node::Seq(vec![Node::reference(Category::TestCaseRun, msg.id.clone())]),
        );

    // Seed the run with the started payload and an empty per-step
    // execution map.
    let mut run = BTreeMap::new();
    run.insert("started".to_string(), Node::Map(entries_from(msg.extra)));
    run.insert("steps".to_string(), Node::empty_map());
    insert_new(store, index, Category::TestCaseRun, &msg.id, Node::Map(run))
}

fn apply_test_step_started(
    store: &mut Store,
    index: usize,
    msg: TestStepStartedMsg,
) -> Result<(), ProjectError> {
    let run = store
        .entity_mut(Category::TestCaseRun, &msg.test_case_started_id)
        .ok_or_else(|| ProjectError::UnknownReference {
            index,
            kind: "testStepStarted",
            category: Category::TestCaseRun,
            id: msg.test_case_started_id.clone(),
        })?;
    let mut attempt = BTreeMap::new();
    attempt.insert(
        "started".to_string(),
        Node::Map(entries_from(msg.extra)),
    );
    run_steps_mut(run)
        .entry(msg.test_step_id)
        .or_insert_with(|| Node::Seq(Vec::new()))
        .as_seq_mut()
        .expect("attempt lists are sequences by construction")
        .push(Node::Map(attempt));
    Ok(())
}

fn apply_test_step_finished(
    store: &mut Store,
    index: usize,
    msg: TestStepFinishedMsg,
) -> Result<(), ProjectError> {
    let run = store
        .entity_mut(Category::TestCaseRun, &msg.test_case_started_id)
        .ok_or_else(|| ProjectError::UnknownReference {
            index,
            kind: "testStepFinished",
            category: Category::TestCaseRun,
            id: msg.test_case_started_id.clone(),
        })?;
    let fault = |step_id: &str| ProjectError::FinishWithoutStart {
        index,
        run_id: msg.test_case_started_id.clone(),
        step_id: step_id.to_string(),
    };
    // The matching start must be the last, still-incomplete attempt for
    // this step id.
    let attempts = run_steps_mut(run)
        .get_mut(&msg.test_step_id)
        .and_then(Node::as_seq_mut)
        .ok_or_else(|| fault(&msg.test_step_id))?;
    let last = attempts.last_mut().ok_or_else(|| fault(&msg.test_step_id))?;
    let attempt = last
        .as_map_mut()
        .expect("attempts are maps by construction");
    if attempt.contains_key("finished") {
        return Err(fault(&msg.test_step_id));
    }
    attempt.insert(
        "finished".to_string(),
        Node::Map(entries_from(msg.extra)),
    );
    attempt.insert(
        "result".to_string(),
        msg.test_step_result.map_or(Node::Null, Node::from),
    );
    Ok(())
}

fn apply_test_case_finished(
    store: &mut Store,
    index: usize,
    msg: TestCaseFinishedMsg,
) -> Result<(), ProjectError> {
    let run = store
        .entity_mut(Category::TestCaseRun, &msg.test_case_started_id)
        .ok_or_else(|| ProjectError::UnknownReference {
            index,
            kind: "testCaseFinished",
            category: Category::TestCaseRun,
            id: msg.test_case_started_id.clone(),
        })?;
    run.as_map_mut()
        .expect("run entities are maps by construction")
        .insert("finished".to_string(), Node::Map(entries_from(msg.extra)));
    Ok(())
}

/// The per-step attempt map of a run entity.
fn run_steps_mut(run: &mut Node) -> &mut BTreeMap<String, Node> {
    run.as_map_mut()
        .expect("run entities are maps by construction")
        .get_mut("steps")
        .expect("run entities carry a steps map by construction")
        .as_map_mut()
        .expect("run steps field is a map by construction")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(uri: &str) -> Value {
        json!({ "source": { "uri": uri, "data": "Feature: X", "mediaType": "text/x.cucumber.gherkin+plain" } })
    }

    fn document(uri: &str, scenarios: Vec<Value>) -> Value {
        json!({
            "gherkinDocument": {
                "uri": uri,
                "feature": {
                    "keyword": "Feature",
                    "name": "Checkout",
                    "children": scenarios
                }
            }
        })
    }

    fn scenario_child(id: &str, step_ids: &[&str]) -> Value {
        let steps: Vec<Value> = step_ids
            .iter()
            .map(|sid| json!({ "id": sid, "keyword": "Given ", "text": format!("step {sid}") }))
            .collect();
        json!({ "scenario": { "id": id, "keyword": "Scenario", "name": format!("scenario {id}"), "steps": steps } })
    }

    fn pickle(id: &str, uri: &str, ast_node_ids: &[&str], step_ids: &[&str]) -> Value {
        let steps: Vec<Value> = step_ids
            .iter()
            .map(|sid| json!({ "id": sid, "text": format!("pickle step {sid}") }))
            .collect();
        json!({ "pickle": { "id": id, "uri": uri, "name": format!("pickle {id}"), "astNodeIds": ast_node_ids, "steps": steps } })
    }

    mod dispatch {
        use super::*;

        #[test]
        fn unknown_record_shape_is_skipped() {
            let store = project(vec![
                json!({ "attachment": { "body": "...", "mediaType": "text/plain" } }),
                json!({ "parseError": { "message": "bad" } }),
                json!("not even an object"),
            ])
            .unwrap();
            assert!(store.documents.is_empty());
            assert!(store.meta.is_none());
        }

        #[test]
        fn meta_is_last_write_wins() {
            let store = project(vec![
                json!({ "meta": { "protocolVersion": "22.0.0" } }),
                json!({ "meta": { "protocolVersion": "23.0.0" } }),
            ])
            .unwrap();
            let meta = store.meta.unwrap();
            assert_eq!(
                meta.get("protocolVersion").and_then(Node::as_str),
                Some("23.0.0")
            );
        }

        #[test]
        fn run_started_and_finished_land_on_side_record() {
            let store = project(vec![
                json!({ "testRunStarted": { "timestamp": { "seconds": 1 } } }),
                json!({ "testRunFinished": { "timestamp": { "seconds": 9 }, "success": true } }),
            ])
            .unwrap();
            assert!(store.run.started.is_some());
            assert_eq!(
                store.run.finished.unwrap().get("success"),
                Some(&Node::Bool(true))
            );
        }

        #[test]
        fn malformed_recognized_record_is_a_fault() {
            // pickle without an id
            let err = project(vec![json!({ "pickle": { "uri": "a.feature" } })]).unwrap_err();
            assert!(matches!(err, ProjectError::Malformed { index: 0, kind: "pickle", .. }));
        }
    }

    mod documents {
        use super::*;

        #[test]
        fn scenario_order_matches_source_order() {
            let store = project(vec![document(
                "a.feature",
                vec![
                    scenario_child("s1", &["st1"]),
                    scenario_child("s2", &["st2"]),
                    scenario_child("s3", &["st3"]),
                ],
            )])
            .unwrap();
            let doc = store.get(Category::Document, "a.feature").unwrap();
            let scenarios = doc
                .get("feature")
                .and_then(|f| f.get("scenarios"))
                .and_then(Node::as_seq)
                .unwrap();
            let ids: Vec<_> = scenarios
                .iter()
                .map(|node| match node {
                    Node::Ref(r) => r.id.as_str(),
                    _ => panic!("expected reference"),
                })
                .collect();
            assert_eq!(ids, vec!["s1", "s2", "s3"]);
        }

        #[test]
        fn steps_are_flattened_into_their_own_table() {
            let store = project(vec![document(
                "a.feature",
                vec![scenario_child("s1", &["st1", "st2"])],
            )])
            .unwrap();
            assert_eq!(store.len(Category::Step), 2);
            let step = store.get(Category::Step, "st1").unwrap();
            assert_eq!(step.get("text").and_then(Node::as_str), Some("step st1"));
            // identity stays in the table key, not in the entity
            assert!(step.get("id").is_none());
        }

        #[test]
        fn background_children_are_skipped() {
            let store = project(vec![document(
                "a.feature",
                vec![
                    json!({ "background": { "id": "b1", "keyword": "Background", "steps": [] } }),
                    scenario_child("s1", &["st1"]),
                ],
            )])
            .unwrap();
            assert_eq!(store.len(Category::Scenario), 1);
            assert!(store.get(Category::Scenario, "b1").is_none());
        }

        #[test]
        fn duplicate_document_uri_is_a_fault() {
            let err = project(vec![
                document("a.feature", vec![scenario_child("s1", &[])]),
                document("a.feature", vec![scenario_child("s2", &[])]),
            ])
            .unwrap_err();
            assert!(matches!(
                err,
                ProjectError::DuplicateId { category: Category::Document, .. }
            ));
        }
    }

    mod pickles {
        use super::*;

        #[test]
        fn scenario_accumulates_pickle_references_in_arrival_order() {
            let store = project(vec![
                document("a.feature", vec![scenario_child("s1", &["st1"])]),
                pickle("p1", "a.feature", &["s1"], &["ps1"]),
                pickle("p2", "a.feature", &["s1"], &["ps2"]),
            ])
            .unwrap();
            let scenario = store.get(Category::Scenario, "s1").unwrap();
            let pickles = scenario.get("pickles").and_then(Node::as_seq).unwrap();
            assert_eq!(pickles.len(), 2);
            assert_eq!(pickles[0], Node::reference(Category::Pickle, "p1"));
            assert_eq!(pickles[1], Node::reference(Category::Pickle, "p2"));
        }

        #[test]
        fn membership_matching_links_one_pickle_to_several_scenarios() {
            let store = project(vec![
                document(
                    "a.feature",
                    vec![scenario_child("s1", &[]), scenario_child("s2", &[])],
                ),
                pickle("p1", "a.feature", &["s1", "s2"], &[]),
            ])
            .unwrap();
            for scenario_id in ["s1", "s2"] {
                let scenario = store.get(Category::Scenario, scenario_id).unwrap();
                let pickles = scenario.get("pickles").and_then(Node::as_seq).unwrap();
                assert_eq!(pickles.len(), 1, "scenario {scenario_id}");
            }
        }

        #[test]
        fn pickle_carries_source_reference_and_ordered_steps() {
            let store = project(vec![
                source("a.feature"),
                pickle("p1", "a.feature", &[], &["ps1", "ps2"]),
            ])
            .unwrap();
            let entity = store.get(Category::Pickle, "p1").unwrap();
            assert_eq!(
                entity.get("source"),
                Some(&Node::reference(Category::Source, "a.feature"))
            );
            let steps = entity.get("steps").and_then(Node::as_seq).unwrap();
            assert_eq!(steps[0], Node::reference(Category::PickleStep, "ps1"));
            assert_eq!(steps[1], Node::reference(Category::PickleStep, "ps2"));
        }

        #[test]
        fn unlinked_scenario_has_no_pickles_field() {
            let store = project(vec![
                document("a.feature", vec![scenario_child("s1", &[])]),
                pickle("p1", "a.feature", &["somewhere-else"], &[]),
            ])
            .unwrap();
            let scenario = store.get(Category::Scenario, "s1").unwrap();
            assert!(scenario.get("pickles").is_none());
        }
    }

    mod executions {
        use super::*;

        fn execution_prefix() -> Vec<Value> {
            vec![
                source("a.feature"),
                document("a.feature", vec![scenario_child("s1", &["st1"])]),
                pickle("p1", "a.feature", &["s1"], &["ps1"]),
                json!({ "stepDefinition": { "id": "sd1", "pattern": { "source": "a thing" } } }),
                json!({ "testCase": { "id": "tc1", "pickleId": "p1", "testSteps": [
                    { "id": "ts1", "pickleStepId": "ps1", "stepDefinitionIds": ["sd1"] }
                ] } }),
                json!({ "testCaseStarted": { "id": "r1", "testCaseId": "tc1", "timestamp": { "seconds": 1 } } }),
            ]
        }

        fn step_started(run: &str, step: &str, seconds: u64) -> Value {
            json!({ "testStepStarted": {
                "testCaseStartedId": run, "testStepId": step,
                "timestamp": { "seconds": seconds }
            } })
        }

        fn step_finished(run: &str, step: &str, status: &str, seconds: u64) -> Value {
            json!({ "testStepFinished": {
                "testCaseStartedId": run, "testStepId": step,
                "testStepResult": { "status": status },
                "timestamp": { "seconds": seconds }
            } })
        }

        #[test]
        fn test_case_links_back_to_its_pickle() {
            let store = project(execution_prefix()).unwrap();
            let pickle = store.get(Category::Pickle, "p1").unwrap();
            let cases = pickle.get("testCases").and_then(Node::as_seq).unwrap();
            assert_eq!(cases, &[Node::reference(Category::TestCase, "tc1")]);
        }

        #[test]
        fn test_step_carries_pickle_step_and_definitions() {
            let store = project(execution_prefix()).unwrap();
            let test_step = store.get(Category::TestStep, "ts1").unwrap();
            assert_eq!(
                test_step.get("pickleStep"),
                Some(&Node::reference(Category::PickleStep, "ps1"))
            );
            let defs = test_step.get("stepDefinitions").and_then(Node::as_seq).unwrap();
            assert_eq!(defs, &[Node::reference(Category::StepDefinition, "sd1")]);
        }

        #[test]
        fn hook_test_step_projects_without_pickle_step_reference() {
            let mut records = execution_prefix();
            records[4] = json!({ "testCase": { "id": "tc1", "pickleId": "p1", "testSteps": [
                { "id": "ts-hook", "hookId": "h1" },
                { "id": "ts1", "pickleStepId": "ps1", "stepDefinitionIds": ["sd1"] }
            ] } });
            let store = project(records).unwrap();
            let hook = store.get(Category::TestStep, "ts-hook").unwrap();
            assert!(hook.get("pickleStep").is_none());
            assert_eq!(hook.get("stepDefinitions").and_then(Node::as_seq).unwrap().len(), 0);
        }

        #[test]
        fn retry_yields_two_completed_attempts_in_arrival_order() {
            let mut records = execution_prefix();
            records.extend([
                step_started("r1", "ts1", 1),
                step_finished("r1", "ts1", "FAILED", 2),
                step_started("r1", "ts1", 3),
                step_finished("r1", "ts1", "PASSED", 4),
            ]);
            let store = project(records).unwrap();
            let run = store.get(Category::TestCaseRun, "r1").unwrap();
            let attempts = run
                .get("steps")
                .and_then(|steps| steps.get("ts1"))
                .and_then(Node::as_seq)
                .unwrap();
            assert_eq!(attempts.len(), 2);
            for attempt in attempts {
                assert!(attempt.get("started").is_some());
                assert!(attempt.get("finished").is_some());
            }
            let statuses: Vec<_> = attempts
                .iter()
                .map(|a| a.get("result").and_then(|r| r.get("status")).and_then(Node::as_str))
                .collect();
            assert_eq!(statuses, vec![Some("FAILED"), Some("PASSED")]);
        }

        #[test]
        fn second_start_for_same_test_case_replaces_run_reference() {
            let mut records = execution_prefix();
            records.push(json!({ "testCaseStarted": {
                "id": "r2", "testCaseId": "tc1", "timestamp": { "seconds": 5 }
            } }));
            let store = project(records).unwrap();
            let test_case = store.get(Category::TestCase, "tc1").unwrap();
            let runs = test_case.get("runs").and_then(Node::as_seq).unwrap();
            assert_eq!(runs, &[Node::reference(Category::TestCaseRun, "r2")]);
            // both run entities remain in the table
            assert_eq!(store.len(Category::TestCaseRun), 2);
        }

        #[test]
        fn test_case_finished_attaches_to_the_run() {
            let mut records = execution_prefix();
            records.push(json!({ "testCaseFinished": {
                "testCaseStartedId": "r1", "timestamp": { "seconds": 9 }
            } }));
            let store = project(records).unwrap();
            let run = store.get(Category::TestCaseRun, "r1").unwrap();
            assert!(run.get("finished").is_some());
        }
    }

    mod faults {
        use super::*;

        #[test]
        fn test_case_with_unknown_pickle_is_an_integrity_fault() {
            let err = project(vec![json!({ "testCase": {
                "id": "tc1", "pickleId": "nope", "testSteps": []
            } })])
            .unwrap_err();
            match err {
                ProjectError::UnknownReference { index, kind, category, id } => {
                    assert_eq!(index, 0);
                    assert_eq!(kind, "testCase");
                    assert_eq!(category, Category::Pickle);
                    assert_eq!(id, "nope");
                }
                other => panic!("expected UnknownReference, got {other:?}"),
            }
        }

        #[test]
        fn step_finish_without_start_is_a_fault() {
            let err = project(vec![
                source("a.feature"),
                pickle("p1", "a.feature", &[], &["ps1"]),
                json!({ "testCase": { "id": "tc1", "pickleId": "p1", "testSteps": [
                    { "id": "ts1", "pickleStepId": "ps1", "stepDefinitionIds": [] }
                ] } }),
                json!({ "testCaseStarted": { "id": "r1", "testCaseId": "tc1" } }),
                json!({ "testStepFinished": {
                    "testCaseStartedId": "r1", "testStepId": "ts1",
                    "testStepResult": { "status": "PASSED" }
                } }),
            ])
            .unwrap_err();
            assert!(matches!(err, ProjectError::FinishWithoutStart { .. }));
        }

        #[test]
        fn double_finish_is_a_fault() {
            let err = project(vec![
                source("a.feature"),
                pickle("p1", "a.feature", &[], &["ps1"]),
                json!({ "testCase": { "id": "tc1", "pickleId": "p1", "testSteps": [
                    { "id": "ts1", "pickleStepId": "ps1", "stepDefinitionIds": [] }
                ] } }),
                json!({ "testCaseStarted": { "id": "r1", "testCaseId": "tc1" } }),
                json!({ "testStepStarted": { "testCaseStartedId": "r1", "testStepId": "ts1" } }),
                json!({ "testStepFinished": {
                    "testCaseStartedId": "r1", "testStepId": "ts1",
                    "testStepResult": { "status": "PASSED" }
                } }),
                json!({ "testStepFinished": {
                    "testCaseStartedId": "r1", "testStepId": "ts1",
                    "testStepResult": { "status": "PASSED" }
                } }),
            ])
            .unwrap_err();
            assert!(matches!(err, ProjectError::FinishWithoutStart { index: 6, .. }));
        }

        #[test]
        fn scenario_payload_reusing_pickles_field_is_a_fault() {
            // A scalar under the relation key would otherwise break the
            // append when a pickle later links back to this scenario.
            let err = project(vec![
                json!({ "gherkinDocument": { "uri": "a.feature", "feature": {
                    "keyword": "Feature", "name": "X", "children": [
                        { "scenario": { "id": "s1", "keyword": "Scenario", "name": "n",
                          "pickles": 5, "steps": [] } }
                    ]
                } } }),
                pickle("p1", "a.feature", &["s1"], &[]),
            ])
            .unwrap_err();
            match err {
                ProjectError::ReservedField { index, kind, field } => {
                    assert_eq!(index, 0);
                    assert_eq!(kind, "gherkinDocument");
                    assert_eq!(field, "pickles");
                }
                other => panic!("expected ReservedField, got {other:?}"),
            }
        }

        #[test]
        fn pickle_payload_reusing_test_cases_field_is_a_fault() {
            let err = project(vec![
                source("a.feature"),
                json!({ "pickle": { "id": "p1", "uri": "a.feature", "name": "n",
                    "astNodeIds": [], "steps": [], "testCases": "oops" } }),
            ])
            .unwrap_err();
            assert!(matches!(
                err,
                ProjectError::ReservedField { index: 1, kind: "pickle", field: "testCases" }
            ));
        }

        #[test]
        fn step_started_for_unknown_run_is_a_fault() {
            let err = project(vec![json!({ "testStepStarted": {
                "testCaseStartedId": "nope", "testStepId": "ts1"
            } })])
            .unwrap_err();
            assert!(matches!(
                err,
                ProjectError::UnknownReference { category: Category::TestCaseRun, .. }
            ));
        }
    }
}
