//! Blackboard service messages

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlackboardEntry {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<prost_types::Any>,
    #[prost(string, tag = "3")]
    pub scope: String,
    #[prost(string, tag = "4")]
    pub operation_name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetBlackboardValueRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub scope: String,
    #[prost(string, tag = "3")]
    pub operation_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateBlackboardValueRequest {
    #[prost(message, optional, tag = "1")]
    pub value: Option<BlackboardEntry>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct DeleteBlackboardValueRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub scope: String,
    #[prost(string, tag = "3")]
    pub operation_name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListBlackboardValuesRequest {
    #[prost(string, tag = "1")]
    pub scope: String,
    #[prost(string, tag = "2")]
    pub operation_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListBlackboardValuesResponse {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<BlackboardEntry>,
}
