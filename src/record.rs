//! Typed payloads for the recognized record shapes.
//!
//! Each record in the event log carries exactly one of the recognized
//! top-level fields (`source`, `gherkinDocument`, `pickle`, ...). These
//! structs model only the fields the projector dispatches on; everything
//! else lands in a `#[serde(flatten)]` catch-all map and survives
//! projection verbatim (forward compatibility: new payload fields must not
//! break the fold).

use serde::Deserialize;
use serde_json::Value;

/// Catch-all for payload fields the projector does not dispatch on.
pub type Extra = serde_json::Map<String, Value>;

/// `source`: raw source file content.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMsg {
    pub uri: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `gherkinDocument`: one parsed document with its child scenarios.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GherkinDocumentMsg {
    pub uri: String,
    pub feature: FeatureMsg,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMsg {
    #[serde(default)]
    pub children: Vec<FeatureChildMsg>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// One child of a feature. Only scenario children are projected; other
/// child kinds (background, rule) carry no scenario and are skipped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureChildMsg {
    pub scenario: Option<ScenarioMsg>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMsg {
    pub id: String,
    #[serde(default)]
    pub steps: Vec<StepMsg>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMsg {
    pub id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `pickle`: fully expanded scenario instance.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleMsg {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub ast_node_ids: Vec<String>,
    #[serde(default)]
    pub steps: Vec<PickleStepMsg>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleStepMsg {
    pub id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `stepDefinition`: glue code pattern.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinitionMsg {
    pub id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `testCase`: executable test case bound to a pickle.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseMsg {
    pub id: String,
    pub pickle_id: String,
    #[serde(default)]
    pub test_steps: Vec<TestStepMsg>,
}

/// One test step. Hook steps carry no `pickleStepId` and no step
/// definition ids.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepMsg {
    pub id: String,
    pub pickle_step_id: Option<String>,
    #[serde(default)]
    pub step_definition_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `testCaseStarted`: opens one execution attempt of a test case.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseStartedMsg {
    pub id: String,
    pub test_case_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `testStepStarted`: opens one attempt of a test step within a run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepStartedMsg {
    pub test_case_started_id: String,
    pub test_step_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `testStepFinished`: completes the open attempt of a test step.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepFinishedMsg {
    pub test_case_started_id: String,
    pub test_step_id: String,
    pub test_step_result: Option<Value>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// `testCaseFinished`: closes an execution attempt of a test case.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseFinishedMsg {
    pub test_case_started_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}
