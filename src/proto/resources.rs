//! Resource registry messages

use std::collections::BTreeMap;

use super::skills::ResourceSelector;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceHandle {
    #[prost(string, tag = "1")]
    pub name: String,
    /// Keyed by capability name.
    #[prost(btree_map = "string, message", tag = "2")]
    pub resource_data: BTreeMap<String, ResourceData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceData {
    #[prost(message, optional, tag = "1")]
    pub contents: Option<prost_types::Any>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListResourceHandlesRequest {
    #[prost(message, optional, tag = "1")]
    pub selector: Option<ResourceSelector>,
    #[prost(int32, tag = "2")]
    pub page_size: i32,
    #[prost(string, tag = "3")]
    pub page_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListResourceHandlesResponse {
    #[prost(message, repeated, tag = "1")]
    pub resource_handles: Vec<ResourceHandle>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct BatchListResourceHandlesRequest {
    #[prost(message, repeated, tag = "1")]
    pub selectors: Vec<ResourceSelector>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResourceHandleList {
    #[prost(message, repeated, tag = "1")]
    pub resource_handles: Vec<ResourceHandle>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchListResourceHandlesResponse {
    /// One list per selector, in request order.
    #[prost(message, repeated, tag = "1")]
    pub results: Vec<ResourceHandleList>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetResourceHandleRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}
