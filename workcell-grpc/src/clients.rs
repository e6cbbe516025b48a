//! Service trait implementations over gRPC
//!
//! One client per solution service. Each wraps an [`RpcChannel`], so every
//! call shares the configured retry policy.

use async_trait::async_trait;
use workcell::proto::assets::{
    CreateInstalledAssetRequest, DeleteInstalledAssetRequest, GetInstalledAssetRequest,
    InstalledAsset, ListInstalledAssetsRequest, ListInstalledAssetsResponse,
};
use workcell::proto::behavior_tree::BehaviorTree;
use workcell::proto::blackboard::{
    BlackboardEntry, DeleteBlackboardValueRequest, GetBlackboardValueRequest,
    ListBlackboardValuesRequest, ListBlackboardValuesResponse, UpdateBlackboardValueRequest,
};
use workcell::proto::data_logger::{
    CreateLocalRecordingRequest, CreateLocalRecordingResponse, GetLogItemsRequest,
    GetLogItemsResponse, GetLogOptionsRequest, GetLogOptionsResponse, GetMostRecentItemRequest,
    GetMostRecentItemResponse, ListLocalRecordingsRequest, ListLocalRecordingsResponse,
    ListLogSourcesRequest, ListLogSourcesResponse, LogItem, LogOptions, SetLogOptionsRequest,
    SetLogOptionsResponse, SyncAndRotateLogsRequest, SyncAndRotateLogsResponse,
};
use workcell::proto::operations::{Operation, WaitOperationRequest};
use workcell::proto::resources::{
    BatchListResourceHandlesRequest, BatchListResourceHandlesResponse, ListResourceHandlesRequest,
    ListResourceHandlesResponse, ResourceHandle,
};
use workcell::proto::skills::{
    GetSkillRequest, GetSkillResponse, GetSkillsRequest, GetSkillsResponse, ResourceSelector, Skill,
};
use workcell::proto::solution::{
    DeleteBehaviorTreeRequest, GetBehaviorTreeRequest, ListBehaviorTreesRequest,
    ListBehaviorTreesResponse, UpdateBehaviorTreeRequest,
};
use workcell::services::{
    BlackboardService, DataLoggerService, InstalledAssets, Operations, ResourceRegistry,
    SkillRegistry, SolutionService,
};
use workcell::{Result, WorkcellError};

use crate::channel::RpcChannel;

macro_rules! rpc {
    ($service:literal, $method:literal) => {
        concat!("/", $service, "/", $method)
    };
}

const RESOURCE_PAGE_SIZE: i32 = 50;

#[derive(Clone)]
pub struct GrpcSkillRegistry {
    channel: RpcChannel,
}

impl GrpcSkillRegistry {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SkillRegistry for GrpcSkillRegistry {
    async fn get_skills(&self) -> Result<Vec<Skill>> {
        let response: GetSkillsResponse = self
            .channel
            .unary(rpc!("workcell_proto.skills.SkillRegistry", "GetSkills"), GetSkillsRequest {})
            .await?;
        Ok(response.skills)
    }

    async fn get_skill(&self, id: &str) -> Result<Skill> {
        let response: GetSkillResponse = self
            .channel
            .unary(
                rpc!("workcell_proto.skills.SkillRegistry", "GetSkill"),
                GetSkillRequest { id: id.to_string() },
            )
            .await?;
        response
            .skill
            .ok_or_else(|| WorkcellError::NotFound(format!("no skill with id '{}'", id)))
    }
}

#[derive(Clone)]
pub struct GrpcResourceRegistry {
    channel: RpcChannel,
}

impl GrpcResourceRegistry {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ResourceRegistry for GrpcResourceRegistry {
    async fn batch_list_resource_handles(
        &self,
        selectors: Vec<ResourceSelector>,
    ) -> Result<Vec<Vec<ResourceHandle>>> {
        let response: BatchListResourceHandlesResponse = self
            .channel
            .unary(
                rpc!("workcell_proto.resources.ResourceRegistry", "BatchListResourceHandles"),
                BatchListResourceHandlesRequest { selectors },
            )
            .await?;
        Ok(response
            .results
            .into_iter()
            .map(|list| list.resource_handles)
            .collect())
    }

    async fn list_resource_handles(&self, selector: ResourceSelector) -> Result<Vec<ResourceHandle>> {
        let mut handles = Vec::new();
        let mut page_token = String::new();
        loop {
            let response: ListResourceHandlesResponse = self
                .channel
                .unary(
                    rpc!("workcell_proto.resources.ResourceRegistry", "ListResourceHandles"),
                    ListResourceHandlesRequest {
                        selector: Some(selector.clone()),
                        page_size: RESOURCE_PAGE_SIZE,
                        page_token: page_token.clone(),
                    },
                )
                .await?;
            handles.extend(response.resource_handles);
            if response.next_page_token.is_empty() {
                return Ok(handles);
            }
            page_token = response.next_page_token;
        }
    }
}

#[derive(Clone)]
pub struct GrpcInstalledAssets {
    channel: RpcChannel,
}

impl GrpcInstalledAssets {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl InstalledAssets for GrpcInstalledAssets {
    async fn get_installed_asset(&self, request: GetInstalledAssetRequest) -> Result<InstalledAsset> {
        self.channel
            .unary(rpc!("workcell_proto.assets.InstalledAssets", "GetInstalledAsset"), request)
            .await
    }

    async fn list_installed_assets(
        &self,
        request: ListInstalledAssetsRequest,
    ) -> Result<ListInstalledAssetsResponse> {
        self.channel
            .unary(rpc!("workcell_proto.assets.InstalledAssets", "ListInstalledAssets"), request)
            .await
    }

    async fn create_installed_asset(&self, request: CreateInstalledAssetRequest) -> Result<Operation> {
        self.channel
            .unary(rpc!("workcell_proto.assets.InstalledAssets", "CreateInstalledAsset"), request)
            .await
    }

    async fn delete_installed_asset(&self, request: DeleteInstalledAssetRequest) -> Result<Operation> {
        self.channel
            .unary(rpc!("workcell_proto.assets.InstalledAssets", "DeleteInstalledAsset"), request)
            .await
    }
}

#[derive(Clone)]
pub struct GrpcOperations {
    channel: RpcChannel,
}

impl GrpcOperations {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Operations for GrpcOperations {
    async fn wait_operation(&self, request: WaitOperationRequest) -> Result<Operation> {
        self.channel
            .unary(rpc!("google.longrunning.Operations", "WaitOperation"), request)
            .await
    }
}

#[derive(Clone)]
pub struct GrpcSolutionService {
    channel: RpcChannel,
}

impl GrpcSolutionService {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SolutionService for GrpcSolutionService {
    async fn get_behavior_tree(&self, request: GetBehaviorTreeRequest) -> Result<BehaviorTree> {
        self.channel
            .unary(rpc!("workcell_proto.solution.SolutionService", "GetBehaviorTree"), request)
            .await
    }

    async fn list_behavior_trees(
        &self,
        request: ListBehaviorTreesRequest,
    ) -> Result<ListBehaviorTreesResponse> {
        self.channel
            .unary(rpc!("workcell_proto.solution.SolutionService", "ListBehaviorTrees"), request)
            .await
    }

    async fn update_behavior_tree(&self, request: UpdateBehaviorTreeRequest) -> Result<BehaviorTree> {
        self.channel
            .unary(rpc!("workcell_proto.solution.SolutionService", "UpdateBehaviorTree"), request)
            .await
    }

    async fn delete_behavior_tree(&self, request: DeleteBehaviorTreeRequest) -> Result<()> {
        self.channel
            .unary(rpc!("workcell_proto.solution.SolutionService", "DeleteBehaviorTree"), request)
            .await
    }
}

#[derive(Clone)]
pub struct GrpcBlackboard {
    channel: RpcChannel,
}

impl GrpcBlackboard {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl BlackboardService for GrpcBlackboard {
    async fn get_value(&self, request: GetBlackboardValueRequest) -> Result<BlackboardEntry> {
        self.channel
            .unary(rpc!("workcell_proto.executive.ExecutiveBlackboard", "GetBlackboardValue"), request)
            .await
    }

    async fn update_value(&self, request: UpdateBlackboardValueRequest) -> Result<BlackboardEntry> {
        self.channel
            .unary(
                rpc!("workcell_proto.executive.ExecutiveBlackboard", "UpdateBlackboardValue"),
                request,
            )
            .await
    }

    async fn delete_value(&self, request: DeleteBlackboardValueRequest) -> Result<()> {
        self.channel
            .unary(
                rpc!("workcell_proto.executive.ExecutiveBlackboard", "DeleteBlackboardValue"),
                request,
            )
            .await
    }

    async fn list_values(&self, request: ListBlackboardValuesRequest) -> Result<Vec<BlackboardEntry>> {
        let response: ListBlackboardValuesResponse = self
            .channel
            .unary(
                rpc!("workcell_proto.executive.ExecutiveBlackboard", "ListBlackboardValues"),
                request,
            )
            .await?;
        Ok(response.values)
    }
}

#[derive(Clone)]
pub struct GrpcDataLogger {
    channel: RpcChannel,
}

impl GrpcDataLogger {
    pub fn new(channel: RpcChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl DataLoggerService for GrpcDataLogger {
    async fn list_log_sources(&self) -> Result<Vec<String>> {
        let response: ListLogSourcesResponse = self
            .channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "ListLogSources"), ListLogSourcesRequest {})
            .await?;
        Ok(response.event_sources)
    }

    async fn get_log_items(&self, request: GetLogItemsRequest) -> Result<GetLogItemsResponse> {
        self.channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "GetLogItems"), request)
            .await
    }

    async fn get_most_recent_item(&self, request: GetMostRecentItemRequest) -> Result<LogItem> {
        let event_source = request.event_source.clone();
        let response: GetMostRecentItemResponse = self
            .channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "GetMostRecentItem"), request)
            .await?;
        response.item.ok_or_else(|| {
            WorkcellError::NotFound(format!("no log items for event source '{}'", event_source))
        })
    }

    async fn set_log_options(&self, request: SetLogOptionsRequest) -> Result<()> {
        let _: SetLogOptionsResponse = self
            .channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "SetLogOptions"), request)
            .await?;
        Ok(())
    }

    async fn get_log_options(&self, request: GetLogOptionsRequest) -> Result<LogOptions> {
        let response: GetLogOptionsResponse = self
            .channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "GetLogOptions"), request)
            .await?;
        Ok(response.log_options.unwrap_or_default())
    }

    async fn sync_and_rotate_logs(&self, request: SyncAndRotateLogsRequest) -> Result<Vec<String>> {
        let response: SyncAndRotateLogsResponse = self
            .channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "SyncAndRotateLogs"), request)
            .await?;
        Ok(response.event_sources)
    }

    async fn create_local_recording(
        &self,
        request: CreateLocalRecordingRequest,
    ) -> Result<CreateLocalRecordingResponse> {
        self.channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "CreateLocalRecording"), request)
            .await
    }

    async fn list_local_recordings(
        &self,
        request: ListLocalRecordingsRequest,
    ) -> Result<ListLocalRecordingsResponse> {
        self.channel
            .unary(rpc!("workcell_proto.logging.DataLogger", "ListLocalRecordings"), request)
            .await
    }
}
