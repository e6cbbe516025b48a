//! Structured data-logger messages

use std::collections::BTreeMap;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogItemMetadata {
    #[prost(string, tag = "1")]
    pub event_source: String,
    #[prost(message, optional, tag = "2")]
    pub acquisition_time: Option<prost_types::Timestamp>,
    #[prost(uint64, tag = "3")]
    pub sequence_number: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogItem {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<LogItemMetadata>,
    #[prost(message, optional, tag = "2")]
    pub payload: Option<prost_types::Any>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListLogSourcesRequest {}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListLogSourcesResponse {
    #[prost(string, repeated, tag = "1")]
    pub event_sources: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogQuery {
    #[prost(string, tag = "1")]
    pub event_source: String,
    #[prost(message, optional, tag = "2")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLogItemsRequest {
    #[prost(oneof = "get_log_items_request::Query", tags = "1, 2")]
    pub query: Option<get_log_items_request::Query>,
    #[prost(int32, tag = "3")]
    pub max_num_items: i32,
}

pub mod get_log_items_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Query {
        #[prost(message, tag = "1")]
        LogQuery(super::LogQuery),
        #[prost(bytes, tag = "2")]
        Cursor(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLogItemsResponse {
    #[prost(message, repeated, tag = "1")]
    pub log_items: Vec<LogItem>,
    #[prost(bytes = "vec", tag = "2")]
    pub next_page_cursor: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetMostRecentItemRequest {
    #[prost(string, tag = "1")]
    pub event_source: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMostRecentItemResponse {
    #[prost(message, optional, tag = "1")]
    pub item: Option<LogItem>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct LogOptions {
    #[prost(bool, tag = "1")]
    pub sync_active: bool,
    #[prost(int64, tag = "2")]
    pub max_buffer_byte_size: i64,
    #[prost(bool, tag = "3")]
    pub retain_on_disk: bool,
    #[prost(int64, tag = "4")]
    pub logging_budget_bytes_per_second: i64,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct SetLogOptionsRequest {
    /// Keyed by event source (regular expressions are accepted by the server).
    #[prost(btree_map = "string, message", tag = "1")]
    pub log_options: BTreeMap<String, LogOptions>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct SetLogOptionsResponse {}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetLogOptionsRequest {
    #[prost(string, tag = "1")]
    pub event_source: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetLogOptionsResponse {
    #[prost(message, optional, tag = "1")]
    pub log_options: Option<LogOptions>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct SyncAndRotateLogsRequest {
    #[prost(string, repeated, tag = "1")]
    pub event_sources: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct SyncAndRotateLogsResponse {
    #[prost(string, repeated, tag = "1")]
    pub event_sources: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordingMetadata {
    #[prost(string, tag = "1")]
    pub recording_id: String,
    #[prost(message, optional, tag = "2")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end_time: Option<prost_types::Timestamp>,
    #[prost(string, tag = "4")]
    pub description: String,
    #[prost(string, repeated, tag = "5")]
    pub event_sources: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLocalRecordingRequest {
    #[prost(message, optional, tag = "1")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub end_time: Option<prost_types::Timestamp>,
    #[prost(string, tag = "3")]
    pub description: String,
    #[prost(string, repeated, tag = "4")]
    pub event_sources_to_record: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateLocalRecordingResponse {
    #[prost(message, optional, tag = "1")]
    pub recording: Option<RecordingMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListLocalRecordingsRequest {
    #[prost(message, optional, tag = "1")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub end_time: Option<prost_types::Timestamp>,
    #[prost(bool, tag = "3")]
    pub only_summary_metadata: bool,
    #[prost(string, repeated, tag = "4")]
    pub recording_ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListLocalRecordingsResponse {
    #[prost(message, repeated, tag = "1")]
    pub recordings: Vec<RecordingMetadata>,
}
