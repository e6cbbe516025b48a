//! Wire form of a single skill invocation inside a `Task` node

use std::collections::BTreeMap;

pub const BEHAVIOR_CALL_NAME: &str = "workcell_proto.executive.BehaviorCall";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BehaviorCall {
    #[prost(string, tag = "1")]
    pub skill_id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(message, optional, tag = "3")]
    pub parameters: Option<prost_types::Any>,
    #[prost(btree_map = "string, message", tag = "4")]
    pub resources: BTreeMap<String, ResourceSpecification>,
    #[prost(string, tag = "5")]
    pub return_value_name: String,
    #[prost(message, repeated, tag = "6")]
    pub assignments: Vec<ParameterAssignment>,
    #[prost(message, optional, tag = "7")]
    pub skill_execution_options: Option<SkillExecutionOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceSpecification {
    #[prost(string, tag = "1")]
    pub handle: String,
}

/// Deferred write of a CEL expression result into a parameter field.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ParameterAssignment {
    #[prost(string, tag = "1")]
    pub parameter_path: String,
    #[prost(string, tag = "2")]
    pub cel_expression: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SkillExecutionOptions {
    #[prost(message, optional, tag = "1")]
    pub project_timeout: Option<prost_types::Duration>,
    #[prost(message, optional, tag = "2")]
    pub execute_timeout: Option<prost_types::Duration>,
}

impl BehaviorCall {
    /// A bare call of `skill_id` without parameters or resources.
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            ..Default::default()
        }
    }
}
