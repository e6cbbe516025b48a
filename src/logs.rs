//! Structured data-logger access

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prost_types::Timestamp;

use crate::proto::data_logger::{
    get_log_items_request::Query, CreateLocalRecordingRequest, GetLogItemsRequest,
    GetLogOptionsRequest, GetMostRecentItemRequest, ListLocalRecordingsRequest, LogItem,
    LogOptions, LogQuery, RecordingMetadata, SetLogOptionsRequest, SyncAndRotateLogsRequest,
};
use crate::services::DataLoggerService;
use crate::{Result, WorkcellError};

/// Server-side cap on items returned by one `GetLogItems` call.
pub const MAX_ITEMS_PER_REQUEST: usize = 10_000;

pub fn to_timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

pub fn from_timestamp(timestamp: &Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.seconds, u32::try_from(timestamp.nanos).ok()?)
}

/// When the logger received `item`.
pub fn acquisition_time(item: &LogItem) -> Option<DateTime<Utc>> {
    item.metadata
        .as_ref()
        .and_then(|m| m.acquisition_time.as_ref())
        .and_then(from_timestamp)
}

#[derive(Clone)]
pub struct DataLoggerClient {
    service: Arc<dyn DataLoggerService>,
}

impl DataLoggerClient {
    pub fn new(service: Arc<dyn DataLoggerService>) -> Self {
        Self { service }
    }

    pub async fn list_sources(&self) -> Result<Vec<String>> {
        self.service.list_log_sources().await
    }

    /// Items of `event_source` logged in `[start, end]`, following page
    /// cursors until the range is exhausted or `limit` items were read.
    pub async fn get_log_items(
        &self,
        event_source: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<LogItem>> {
        if end < start {
            return Err(WorkcellError::InvalidArgument(format!(
                "log query for '{}' ends ({}) before it starts ({})",
                event_source, end, start
            )));
        }
        let mut items = Vec::new();
        if limit == Some(0) {
            return Ok(items);
        }
        let mut query = Query::LogQuery(LogQuery {
            event_source: event_source.to_string(),
            start_time: Some(to_timestamp(start)),
            end_time: Some(to_timestamp(end)),
        });
        loop {
            let remaining = limit.map_or(MAX_ITEMS_PER_REQUEST, |limit| limit - items.len());
            let response = self
                .service
                .get_log_items(GetLogItemsRequest {
                    query: Some(query),
                    max_num_items: remaining.min(MAX_ITEMS_PER_REQUEST) as i32,
                })
                .await?;
            tracing::debug!(
                event_source,
                items = response.log_items.len(),
                "Fetched log page"
            );
            items.extend(response.log_items);
            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    return Ok(items);
                }
            }
            if response.next_page_cursor.is_empty() {
                return Ok(items);
            }
            query = Query::Cursor(response.next_page_cursor);
        }
    }

    pub async fn get_most_recent_item(&self, event_source: &str) -> Result<LogItem> {
        self.service
            .get_most_recent_item(GetMostRecentItemRequest {
                event_source: event_source.to_string(),
            })
            .await
    }

    pub async fn get_log_options(&self, event_source: &str) -> Result<LogOptions> {
        self.service
            .get_log_options(GetLogOptionsRequest {
                event_source: event_source.to_string(),
            })
            .await
    }

    /// `options` is keyed by event source; keys may be regular expressions.
    pub async fn set_log_options(&self, options: BTreeMap<String, LogOptions>) -> Result<()> {
        self.service
            .set_log_options(SetLogOptionsRequest {
                log_options: options,
            })
            .await
    }

    /// Flushes buffered items to disk; returns the sources that were rotated.
    pub async fn sync_and_rotate(&self, event_sources: Vec<String>) -> Result<Vec<String>> {
        self.service
            .sync_and_rotate_logs(SyncAndRotateLogsRequest { event_sources })
            .await
    }

    pub async fn create_local_recording(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: impl Into<String>,
        event_sources: Vec<String>,
    ) -> Result<RecordingMetadata> {
        let response = self
            .service
            .create_local_recording(CreateLocalRecordingRequest {
                start_time: Some(to_timestamp(start)),
                end_time: Some(to_timestamp(end)),
                description: description.into(),
                event_sources_to_record: event_sources,
            })
            .await?;
        response.recording.ok_or_else(|| {
            WorkcellError::Transport("create recording response carries no recording".to_string())
        })
    }

    /// Recordings overlapping `[start, end]`; either bound may be open.
    pub async fn list_local_recordings(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        only_summary_metadata: bool,
        recording_ids: Vec<String>,
    ) -> Result<Vec<RecordingMetadata>> {
        Ok(self
            .service
            .list_local_recordings(ListLocalRecordingsRequest {
                start_time: start.map(to_timestamp),
                end_time: end.map(to_timestamp),
                only_summary_metadata,
                recording_ids,
            })
            .await?
            .recordings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::data_logger::{
        CreateLocalRecordingResponse, GetLogItemsResponse, ListLocalRecordingsResponse,
        LogItemMetadata,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Serves `total` items in pages of `page` items.
    struct PagedLogger {
        total: u64,
        page: u64,
        requests: Mutex<Vec<GetLogItemsRequest>>,
    }

    fn item(sequence_number: u64) -> LogItem {
        LogItem {
            metadata: Some(LogItemMetadata {
                event_source: "robot_status".to_string(),
                acquisition_time: Some(Timestamp {
                    seconds: 1_700_000_000 + sequence_number as i64,
                    nanos: 0,
                }),
                sequence_number,
            }),
            payload: None,
        }
    }

    #[async_trait]
    impl DataLoggerService for PagedLogger {
        async fn list_log_sources(&self) -> Result<Vec<String>> {
            Ok(vec!["robot_status".to_string()])
        }

        async fn get_log_items(&self, request: GetLogItemsRequest) -> Result<GetLogItemsResponse> {
            let start = match &request.query {
                Some(Query::Cursor(cursor)) => u64::from_le_bytes(
                    cursor.as_slice().try_into().expect("8-byte cursor"),
                ),
                _ => 0,
            };
            self.requests.lock().unwrap().push(request.clone());
            let end = (start + self.page.min(request.max_num_items as u64)).min(self.total);
            Ok(GetLogItemsResponse {
                log_items: (start..end).map(item).collect(),
                next_page_cursor: if end < self.total {
                    end.to_le_bytes().to_vec()
                } else {
                    Vec::new()
                },
            })
        }

        async fn get_most_recent_item(&self, _: GetMostRecentItemRequest) -> Result<LogItem> {
            Ok(item(self.total - 1))
        }

        async fn set_log_options(&self, _: SetLogOptionsRequest) -> Result<()> {
            Ok(())
        }

        async fn get_log_options(&self, _: GetLogOptionsRequest) -> Result<LogOptions> {
            Ok(LogOptions::default())
        }

        async fn sync_and_rotate_logs(&self, request: SyncAndRotateLogsRequest) -> Result<Vec<String>> {
            Ok(request.event_sources)
        }

        async fn create_local_recording(
            &self,
            request: CreateLocalRecordingRequest,
        ) -> Result<CreateLocalRecordingResponse> {
            Ok(CreateLocalRecordingResponse {
                recording: Some(RecordingMetadata {
                    recording_id: "rec-1".to_string(),
                    start_time: request.start_time,
                    end_time: request.end_time,
                    description: request.description,
                    event_sources: request.event_sources_to_record,
                }),
            })
        }

        async fn list_local_recordings(
            &self,
            _: ListLocalRecordingsRequest,
        ) -> Result<ListLocalRecordingsResponse> {
            Ok(ListLocalRecordingsResponse::default())
        }
    }

    fn client(total: u64, page: u64) -> (DataLoggerClient, Arc<PagedLogger>) {
        let logger = Arc::new(PagedLogger {
            total,
            page,
            requests: Mutex::new(Vec::new()),
        });
        (DataLoggerClient::new(logger.clone()), logger)
    }

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_001_000, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_follows_cursors_to_the_end() {
        let (client, logger) = client(25, 10);
        let (start, end) = range();
        let items = client
            .get_log_items("robot_status", start, end, None)
            .await
            .unwrap();
        assert_eq!(items.len(), 25);
        let requests = logger.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(matches!(requests[0].query, Some(Query::LogQuery(_))));
        assert!(matches!(requests[1].query, Some(Query::Cursor(_))));
        assert_eq!(requests[0].max_num_items, MAX_ITEMS_PER_REQUEST as i32);
    }

    #[tokio::test]
    async fn test_limit_stops_paging() {
        let (client, logger) = client(25, 10);
        let (start, end) = range();
        let items = client
            .get_log_items("robot_status", start, end, Some(12))
            .await
            .unwrap();
        assert_eq!(items.len(), 12);
        let requests = logger.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].max_num_items, 2);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let (client, _) = client(1, 1);
        let (start, end) = range();
        let err = client
            .get_log_items("robot_status", end, start, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkcellError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_recording_and_timestamps() {
        let (client, _) = client(3, 3);
        let (start, end) = range();
        let recording = client
            .create_local_recording(start, end, "calibration", vec!["robot_status".to_string()])
            .await
            .unwrap();
        assert_eq!(recording.recording_id, "rec-1");
        assert_eq!(from_timestamp(recording.start_time.as_ref().unwrap()), Some(start));

        let latest = client.get_most_recent_item("robot_status").await.unwrap();
        assert_eq!(
            acquisition_time(&latest),
            Some(Utc.timestamp_opt(1_700_000_002, 0).unwrap())
        );
    }
}
