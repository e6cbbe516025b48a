//! JSON records printed by the `workcell` binary
//!
//! Every command can emit one JSON document on stdout so the output can be
//! consumed by scripts.

use serde::{Deserialize, Serialize};
use workcell::bt::BehaviorTree;
use workcell::skills::{ParamSpec, SkillClass};

/// Current time as RFC 3339.
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub type_hint: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDetail {
    #[serde(flatten)]
    pub summary: SkillSummary,
    pub parameters: Vec<ParameterRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub name: String,
    /// `asset` or `legacy`.
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub node_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeCheck {
    pub timestamp: String,
    pub name: String,
    pub node_count: usize,
    pub ids_unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSourceSummary {
    pub event_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_item_time: Option<String>,
}

impl SkillSummary {
    pub fn from_class(class: &SkillClass) -> Self {
        Self {
            id: class.id().to_string(),
            version: class.info().version().map(str::to_string),
            description: class.info().description().trim().to_string(),
        }
    }
}

impl From<ParamSpec> for ParameterRecord {
    fn from(spec: ParamSpec) -> Self {
        Self {
            name: spec.name,
            type_hint: spec.type_hint,
            required: spec.required,
            default: spec.default,
            comment: spec.comment,
        }
    }
}

impl SkillDetail {
    pub fn from_class(class: &SkillClass) -> Self {
        Self {
            summary: SkillSummary::from_class(class),
            parameters: class.signature().into_iter().map(Into::into).collect(),
            return_type: class.info().return_value_message_name().map(str::to_string),
        }
    }
}

impl ProcessSummary {
    pub fn from_tree(name: &str, tree: &BehaviorTree) -> Self {
        let version = tree
            .metadata
            .as_ref()
            .and_then(|m| m.version())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self {
            name: name.to_string(),
            storage: if tree.metadata.is_some() { "asset" } else { "legacy" }.to_string(),
            version,
            node_count: tree.node_count(),
        }
    }
}

impl TreeCheck {
    pub fn of(tree: &BehaviorTree) -> Self {
        let validation = tree.validate_id_uniqueness();
        Self {
            timestamp: current_timestamp(),
            name: tree.name.clone(),
            node_count: tree.node_count(),
            ids_unique: validation.is_ok(),
            error: validation.err().map(|e| e.to_string()),
        }
    }
}
