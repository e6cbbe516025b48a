//! Solution service messages for legacy named behavior trees

use super::behavior_tree::BehaviorTree;

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetBehaviorTreeRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListBehaviorTreesRequest {
    #[prost(int32, tag = "1")]
    pub page_size: i32,
    #[prost(string, tag = "2")]
    pub page_token: String,
    #[prost(enumeration = "BehaviorTreeView", tag = "3")]
    pub view: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBehaviorTreesResponse {
    #[prost(message, repeated, tag = "1")]
    pub behavior_trees: Vec<BehaviorTree>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateBehaviorTreeRequest {
    #[prost(message, optional, tag = "1")]
    pub behavior_tree: Option<BehaviorTree>,
    #[prost(bool, tag = "2")]
    pub allow_missing: bool,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct DeleteBehaviorTreeRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BehaviorTreeView {
    Unspecified = 0,
    Basic = 1,
    Full = 2,
}
