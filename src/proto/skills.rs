//! Skill registry messages

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Skill {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub id_version: String,
    #[prost(string, tag = "3")]
    pub skill_name: String,
    #[prost(string, tag = "4")]
    pub package_name: String,
    #[prost(string, tag = "5")]
    pub description: String,
    #[prost(message, optional, tag = "6")]
    pub parameter_description: Option<ParameterDescription>,
    #[prost(message, optional, tag = "7")]
    pub return_value_description: Option<ReturnValueDescription>,
    #[prost(btree_map = "string, message", tag = "8")]
    pub resource_selectors: BTreeMap<String, ResourceSelector>,
    #[prost(string, tag = "9")]
    pub display_name: String,
    #[prost(message, optional, tag = "10")]
    pub execution_options: Option<ExecutionOptions>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParameterDescription {
    #[prost(string, tag = "1")]
    pub parameter_message_full_name: String,
    #[prost(message, optional, tag = "2")]
    pub default_value: Option<prost_types::Any>,
    #[prost(message, optional, tag = "3")]
    pub parameter_descriptor_fileset: Option<prost_types::FileDescriptorSet>,
    #[prost(btree_map = "string, string", tag = "4")]
    pub parameter_field_comments: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReturnValueDescription {
    #[prost(string, tag = "1")]
    pub return_value_message_full_name: String,
    #[prost(message, optional, tag = "2")]
    pub descriptor_fileset: Option<prost_types::FileDescriptorSet>,
    #[prost(btree_map = "string, string", tag = "3")]
    pub return_value_field_comments: BTreeMap<String, String>,
}

/// Capabilities a resource must provide to fill a skill's slot.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ResourceSelector {
    #[prost(string, repeated, tag = "1")]
    pub capability_names: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ExecutionOptions {
    #[prost(bool, tag = "1")]
    pub supports_cancellation: bool,
    #[prost(bool, tag = "2")]
    pub supports_preview: bool,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetSkillsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSkillsResponse {
    #[prost(message, repeated, tag = "1")]
    pub skills: Vec<Skill>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetSkillRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetSkillResponse {
    #[prost(message, optional, tag = "1")]
    pub skill: Option<Skill>,
}
