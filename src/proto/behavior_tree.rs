//! Behavior tree wire form (`workcell_proto.executive.BehaviorTree`)

use std::collections::BTreeMap;

use super::assets::Metadata;
use super::behavior_call::BehaviorCall;
use super::extended_status::{ExtendedStatus, StatusCode};
use super::skills::Skill;

pub const BEHAVIOR_TREE_NAME: &str = "workcell_proto.executive.BehaviorTree";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BehaviorTree {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, optional, boxed, tag = "2")]
    pub root: Option<Box<Node>>,
    #[prost(message, optional, tag = "3")]
    pub description: Option<Skill>,
    #[prost(string, tag = "4")]
    pub tree_id: String,
    #[prost(message, optional, tag = "5")]
    pub metadata: Option<Metadata>,
    #[prost(string, optional, tag = "6")]
    pub return_value_expression: Option<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub id: Option<u32>,
    #[prost(enumeration = "NodeState", tag = "3")]
    pub state: i32,
    #[prost(message, optional, tag = "4")]
    pub decorators: Option<Decorators>,
    #[prost(btree_map = "string, message", tag = "5")]
    pub user_data: BTreeMap<String, prost_types::Any>,
    #[prost(
        oneof = "node::NodeType",
        tags = "10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21"
    )]
    pub node_type: Option<node::NodeType>,
}

pub mod node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum NodeType {
        #[prost(message, tag = "10")]
        Task(super::TaskNode),
        #[prost(message, tag = "11")]
        SubTree(super::SubtreeNode),
        #[prost(message, tag = "12")]
        Fail(super::FailNode),
        #[prost(message, tag = "13")]
        Sequence(super::SequenceNode),
        #[prost(message, tag = "14")]
        Parallel(super::ParallelNode),
        #[prost(message, tag = "15")]
        Selector(super::SelectorNode),
        #[prost(message, tag = "16")]
        Retry(super::RetryNode),
        #[prost(message, tag = "17")]
        Fallback(super::FallbackNode),
        #[prost(message, tag = "18")]
        Loop(super::LoopNode),
        #[prost(message, tag = "19")]
        Branch(super::BranchNode),
        #[prost(message, tag = "20")]
        Data(super::DataNode),
        #[prost(message, tag = "21")]
        Debug(super::DebugNode),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TaskNode {
    #[prost(oneof = "task_node::TaskType", tags = "1, 2")]
    pub task_type: Option<task_node::TaskType>,
}

pub mod task_node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum TaskType {
        #[prost(message, tag = "1")]
        CallBehavior(super::BehaviorCall),
        #[prost(message, tag = "2")]
        ExecuteCode(super::CodeExecution),
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct CodeExecution {
    #[prost(string, tag = "1")]
    pub language: String,
    #[prost(string, tag = "2")]
    pub source: String,
    #[prost(string, tag = "3")]
    pub return_value_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubtreeNode {
    #[prost(message, optional, tag = "1")]
    pub tree: Option<BehaviorTree>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct FailNode {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SequenceNode {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParallelNode {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FallbackNode {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SelectorNode {
    #[prost(message, repeated, tag = "1")]
    pub children: Vec<Node>,
    #[prost(message, repeated, tag = "2")]
    pub branches: Vec<SelectorBranch>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SelectorBranch {
    #[prost(message, optional, tag = "1")]
    pub condition: Option<Condition>,
    #[prost(message, optional, tag = "2")]
    pub node: Option<Node>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RetryNode {
    #[prost(uint32, tag = "1")]
    pub max_tries: u32,
    #[prost(message, optional, boxed, tag = "2")]
    pub child: Option<Box<Node>>,
    #[prost(message, optional, boxed, tag = "3")]
    pub recovery: Option<Box<Node>>,
    #[prost(string, tag = "4")]
    pub retry_counter_blackboard_key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoopNode {
    #[prost(uint32, tag = "1")]
    pub max_times: u32,
    #[prost(message, optional, boxed, tag = "2")]
    pub do_child: Option<Box<Node>>,
    #[prost(string, tag = "3")]
    pub loop_counter_blackboard_key: String,
    #[prost(oneof = "loop_node::LoopType", tags = "4, 5")]
    pub loop_type: Option<loop_node::LoopType>,
}

pub mod loop_node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum LoopType {
        #[prost(message, tag = "4")]
        While(super::Condition),
        #[prost(message, tag = "5")]
        ForEach(super::ForEach),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ForEach {
    #[prost(string, tag = "1")]
    pub value_blackboard_key: String,
    #[prost(oneof = "for_each::Generator", tags = "2, 3")]
    pub generator: Option<for_each::Generator>,
}

pub mod for_each {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Generator {
        #[prost(message, tag = "2")]
        Protos(super::ProtoList),
        #[prost(string, tag = "3")]
        GeneratorCelExpression(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoList {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<prost_types::Any>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BranchNode {
    #[prost(message, optional, tag = "1")]
    pub if_condition: Option<Condition>,
    #[prost(message, optional, boxed, tag = "2")]
    pub then_child: Option<Box<Node>>,
    #[prost(message, optional, boxed, tag = "3")]
    pub else_child: Option<Box<Node>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataNode {
    #[prost(string, tag = "1")]
    pub blackboard_key: String,
    #[prost(oneof = "data_node::DataType", tags = "2, 3")]
    pub data_type: Option<data_node::DataType>,
}

pub mod data_node {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum DataType {
        #[prost(message, tag = "2")]
        CreateOrUpdate(super::CreateOrUpdate),
        #[prost(message, tag = "3")]
        Remove(super::RemoveData),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateOrUpdate {
    #[prost(oneof = "create_or_update::Value", tags = "1, 2, 3, 4")]
    pub value: Option<create_or_update::Value>,
}

pub mod create_or_update {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        CelExpression(String),
        #[prost(message, tag = "2")]
        WorldQuery(super::WorldQuery),
        #[prost(message, tag = "3")]
        Proto(prost_types::Any),
        #[prost(message, tag = "4")]
        Protos(super::ProtoList),
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct RemoveData {}

/// Selects objects from the world model by their position in the object tree.
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct WorldQuery {
    #[prost(string, tag = "1")]
    pub root_object_name: String,
    #[prost(bool, tag = "2")]
    pub recursive: bool,
    #[prost(string, tag = "3")]
    pub name_regex: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct DebugNode {
    #[prost(bool, tag = "1")]
    pub fail_on_resume: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Decorators {
    #[prost(message, optional, tag = "1")]
    pub condition: Option<Condition>,
    #[prost(enumeration = "BreakpointType", tag = "2")]
    pub breakpoint: i32,
    #[prost(message, optional, tag = "3")]
    pub execution_settings: Option<ExecutionSettings>,
    #[prost(message, optional, tag = "4")]
    pub failure_settings: Option<FailureSettings>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ExecutionSettings {
    #[prost(enumeration = "ExecutionMode", tag = "1")]
    pub mode: i32,
    #[prost(enumeration = "DisabledResultState", tag = "2")]
    pub disabled_result_state: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FailureSettings {
    #[prost(message, optional, tag = "1")]
    pub emit_extended_status: Option<ExtendedStatusEmit>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedStatusEmit {
    #[prost(message, optional, tag = "1")]
    pub extended_status: Option<ExtendedStatus>,
    #[prost(string, tag = "2")]
    pub to_blackboard_key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Condition {
    #[prost(oneof = "condition::ConditionType", tags = "1, 2, 3, 4, 5, 6")]
    pub condition_type: Option<condition::ConditionType>,
}

pub mod condition {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ConditionType {
        #[prost(message, tag = "1")]
        BehaviorTree(super::SubtreeCondition),
        #[prost(message, tag = "2")]
        Blackboard(super::BlackboardExpression),
        #[prost(message, tag = "3")]
        AllOf(super::LogicalCompound),
        #[prost(message, tag = "4")]
        AnyOf(super::LogicalCompound),
        #[prost(message, tag = "5")]
        Not(super::NegatedCondition),
        #[prost(message, tag = "6")]
        StatusMatch(super::ExtendedStatusMatch),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubtreeCondition {
    #[prost(message, optional, tag = "1")]
    pub tree: Option<BehaviorTree>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct BlackboardExpression {
    #[prost(string, optional, tag = "1")]
    pub cel_expression: Option<String>,
    /// Pre-checked expression AST; not interpreted client-side.
    #[prost(bytes = "vec", tag = "2")]
    pub checked_expression: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogicalCompound {
    #[prost(message, repeated, tag = "1")]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NegatedCondition {
    #[prost(message, optional, boxed, tag = "1")]
    pub condition: Option<Box<Condition>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedStatusMatch {
    #[prost(string, tag = "1")]
    pub blackboard_key: String,
    #[prost(oneof = "extended_status_match::MatchType", tags = "2")]
    pub match_type: Option<extended_status_match::MatchType>,
}

pub mod extended_status_match {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum MatchType {
        #[prost(message, tag = "2")]
        StatusCode(super::StatusCode),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NodeState {
    Unspecified = 0,
    Accepted = 1,
    Active = 2,
    Succeeded = 3,
    Failed = 4,
    Canceling = 5,
    Canceled = 6,
    Suspended = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BreakpointType {
    Unspecified = 0,
    BeforeExecution = 1,
    AfterExecution = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ExecutionMode {
    Unspecified = 0,
    Normal = 1,
    Disabled = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DisabledResultState {
    Unspecified = 0,
    Succeeded = 1,
    Failed = 2,
}
