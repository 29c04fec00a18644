//! Typed UI contract emitted by the backend. The frontend renders dynamic
//! components from this schema; it never decides what to show on its own.

mod builder;
mod components;

pub use builder::build;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SCHEMA_VERSION: &str = "v1";

/// Top-level schema emitted for a workflow state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UISchema {
    #[serde(rename = "ui_schema_version")]
    pub version: String,
    pub workflow_id: String,
    pub phase: String,
    pub components: Vec<Component>,
    pub actions: Vec<Action>,
}

/// Identifies which frontend component to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    AnomalySummary,
    TriageCard,
    EvidencePanel,
    CostTimeseries,
    CommitmentDrift,
    CreditBreakdown,
    K8sNamespaceDeltas,
    DeployCorrelation,
    DataTransferSpike,
    WasteFindings,
    ActionPlan,
    ApprovalQueue,
    ExecutionResults,
    VerificationDashboard,
    ActionEditor,
}

/// Controls component rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
    Collapsed,
}

/// A single renderable UI element. Priority integers order components.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub title: String,
    pub priority: i32,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// Classifies a user-facing action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Approve,
    Deny,
    Rollback,
    Escalate,
    EditParam,
}

/// Confirmation requirement for high-risk actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmConfig {
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acknowledge_text: String,
}

/// A user-triggerable operation offered by the UI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<ConfirmConfig>,
}
