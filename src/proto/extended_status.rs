//! Extended status messages used for failure reporting

pub const STATUS_CODE_NAME: &str = "workcell_proto.status.StatusCode";
pub const EXTENDED_STATUS_NAME: &str = "workcell_proto.status.ExtendedStatus";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatusCode {
    #[prost(string, tag = "1")]
    pub component: String,
    #[prost(uint32, tag = "2")]
    pub code: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserReport {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(string, tag = "2")]
    pub instructions: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DebugReport {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(string, repeated, tag = "2")]
    pub stack_trace: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtendedStatus {
    #[prost(message, optional, tag = "1")]
    pub status_code: Option<StatusCode>,
    #[prost(enumeration = "Severity", tag = "2")]
    pub severity: i32,
    #[prost(string, tag = "3")]
    pub title: String,
    #[prost(message, optional, tag = "4")]
    pub timestamp: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "5")]
    pub user_report: Option<UserReport>,
    #[prost(message, optional, tag = "6")]
    pub debug_report: Option<DebugReport>,
    #[prost(message, repeated, tag = "7")]
    pub context: Vec<ExtendedStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Severity {
    Unspecified = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
}
