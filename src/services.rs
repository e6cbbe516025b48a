//! Service seams
//!
//! Every remote service the SDK talks to is consumed through one of these
//! traits. `workcell-grpc` implements them over tonic channels; tests use
//! in-memory fakes.

use async_trait::async_trait;

use crate::proto::assets::{
    CreateInstalledAssetRequest, DeleteInstalledAssetRequest, GetInstalledAssetRequest,
    InstalledAsset, ListInstalledAssetsRequest, ListInstalledAssetsResponse,
};
use crate::proto::behavior_tree::BehaviorTree;
use crate::proto::blackboard::{
    BlackboardEntry, DeleteBlackboardValueRequest, GetBlackboardValueRequest,
    ListBlackboardValuesRequest, UpdateBlackboardValueRequest,
};
use crate::proto::data_logger::{
    CreateLocalRecordingRequest, CreateLocalRecordingResponse, GetLogItemsRequest,
    GetLogItemsResponse, GetLogOptionsRequest, GetMostRecentItemRequest, ListLocalRecordingsRequest,
    ListLocalRecordingsResponse, LogItem, LogOptions, SetLogOptionsRequest,
    SyncAndRotateLogsRequest,
};
use crate::proto::operations::{Operation, WaitOperationRequest};
use crate::proto::resources::ResourceHandle;
use crate::proto::skills::{ResourceSelector, Skill};
use crate::proto::solution::{
    DeleteBehaviorTreeRequest, GetBehaviorTreeRequest, ListBehaviorTreesRequest,
    ListBehaviorTreesResponse, UpdateBehaviorTreeRequest,
};
use crate::Result;

#[async_trait]
pub trait SkillRegistry: Send + Sync {
    async fn get_skills(&self) -> Result<Vec<Skill>>;

    async fn get_skill(&self, id: &str) -> Result<Skill>;
}

#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    /// One handle list per selector, in request order.
    async fn batch_list_resource_handles(
        &self,
        selectors: Vec<ResourceSelector>,
    ) -> Result<Vec<Vec<ResourceHandle>>>;

    async fn list_resource_handles(&self, selector: ResourceSelector) -> Result<Vec<ResourceHandle>>;
}

#[async_trait]
pub trait InstalledAssets: Send + Sync {
    async fn get_installed_asset(&self, request: GetInstalledAssetRequest) -> Result<InstalledAsset>;

    async fn list_installed_assets(
        &self,
        request: ListInstalledAssetsRequest,
    ) -> Result<ListInstalledAssetsResponse>;

    async fn create_installed_asset(&self, request: CreateInstalledAssetRequest) -> Result<Operation>;

    async fn delete_installed_asset(&self, request: DeleteInstalledAssetRequest) -> Result<Operation>;
}

#[async_trait]
pub trait Operations: Send + Sync {
    /// Wait up to `request.timeout` for the operation and return its latest state.
    async fn wait_operation(&self, request: WaitOperationRequest) -> Result<Operation>;
}

#[async_trait]
pub trait SolutionService: Send + Sync {
    async fn get_behavior_tree(&self, request: GetBehaviorTreeRequest) -> Result<BehaviorTree>;

    async fn list_behavior_trees(
        &self,
        request: ListBehaviorTreesRequest,
    ) -> Result<ListBehaviorTreesResponse>;

    async fn update_behavior_tree(&self, request: UpdateBehaviorTreeRequest) -> Result<BehaviorTree>;

    async fn delete_behavior_tree(&self, request: DeleteBehaviorTreeRequest) -> Result<()>;
}

#[async_trait]
pub trait BlackboardService: Send + Sync {
    async fn get_value(&self, request: GetBlackboardValueRequest) -> Result<BlackboardEntry>;

    async fn update_value(&self, request: UpdateBlackboardValueRequest) -> Result<BlackboardEntry>;

    async fn delete_value(&self, request: DeleteBlackboardValueRequest) -> Result<()>;

    async fn list_values(&self, request: ListBlackboardValuesRequest) -> Result<Vec<BlackboardEntry>>;
}

#[async_trait]
pub trait DataLoggerService: Send + Sync {
    async fn list_log_sources(&self) -> Result<Vec<String>>;

    async fn get_log_items(&self, request: GetLogItemsRequest) -> Result<GetLogItemsResponse>;

    async fn get_most_recent_item(&self, request: GetMostRecentItemRequest) -> Result<LogItem>;

    async fn set_log_options(&self, request: SetLogOptionsRequest) -> Result<()>;

    async fn get_log_options(&self, request: GetLogOptionsRequest) -> Result<LogOptions>;

    async fn sync_and_rotate_logs(&self, request: SyncAndRotateLogsRequest) -> Result<Vec<String>>;

    async fn create_local_recording(
        &self,
        request: CreateLocalRecordingRequest,
    ) -> Result<CreateLocalRecordingResponse>;

    async fn list_local_recordings(
        &self,
        request: ListLocalRecordingsRequest,
    ) -> Result<ListLocalRecordingsResponse>;
}
