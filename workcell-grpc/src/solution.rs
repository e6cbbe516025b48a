//! Solution - one connection to a deployed solution
//!
//! Wires the gRPC clients into the SDK's providers so an application only
//! needs a [`ClientConfig`].

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use workcell::services::{BlackboardService, DataLoggerService, InstalledAssets, Operations};
use workcell::{BlackboardClient, DataLoggerClient, ProcessProvider, Result, SkillProvider};

use crate::channel::RpcChannel;
use crate::clients::{
    GrpcBlackboard, GrpcDataLogger, GrpcInstalledAssets, GrpcOperations, GrpcResourceRegistry,
    GrpcSkillRegistry, GrpcSolutionService,
};
use crate::config::ClientConfig;

#[derive(Clone)]
pub struct Solution {
    config: ClientConfig,
    skills: Arc<SkillProvider>,
    processes: ProcessProvider,
    blackboard: Arc<dyn BlackboardService>,
    data_logger: Arc<dyn DataLoggerService>,
    operations: Arc<dyn Operations>,
    assets: Arc<dyn InstalledAssets>,
}

impl Solution {
    pub async fn connect_with_config(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect(ClientConfig::load(path)?).await
    }

    /// Opens channels to every service and loads the skill snapshot.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        info!(address = config.address(), "Connecting to solution");
        let channel = |service: &str| RpcChannel::for_service(service, &config);

        let assets: Arc<dyn InstalledAssets> =
            Arc::new(GrpcInstalledAssets::new(channel("installed_assets")?));
        let operations: Arc<dyn Operations> = Arc::new(GrpcOperations::new(channel("operations")?));
        let skills = SkillProvider::new(
            Arc::new(GrpcSkillRegistry::new(channel("skill_registry")?)),
            Arc::new(GrpcResourceRegistry::new(channel("resource_registry")?)),
            Some(assets.clone()),
        )
        .await?;
        let processes = ProcessProvider::new(
            Arc::new(GrpcSolutionService::new(channel("solution")?)),
            assets.clone(),
            operations.clone(),
        )
        .with_poll_timeout(config.poll_timeout())
        .with_page_sizes(config.asset_page_size(), config.tree_page_size());
        let blackboard: Arc<dyn BlackboardService> =
            Arc::new(GrpcBlackboard::new(channel("blackboard")?));
        let data_logger: Arc<dyn DataLoggerService> =
            Arc::new(GrpcDataLogger::new(channel("data_logger")?));

        info!(skills = skills.skill_ids().len(), "Solution connected");
        Ok(Self {
            config,
            skills: Arc::new(skills),
            processes,
            blackboard,
            data_logger,
            operations,
            assets,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn skills(&self) -> &Arc<SkillProvider> {
        &self.skills
    }

    pub fn processes(&self) -> &ProcessProvider {
        &self.processes
    }

    /// Blackboard of the executive operation `operation_name`.
    pub fn blackboard(&self, operation_name: impl Into<String>) -> BlackboardClient {
        BlackboardClient::new(self.blackboard.clone(), operation_name)
    }

    pub fn data_logger(&self) -> DataLoggerClient {
        DataLoggerClient::new(self.data_logger.clone())
    }

    pub fn operations(&self) -> &Arc<dyn Operations> {
        &self.operations
    }

    pub fn installed_assets(&self) -> &Arc<dyn InstalledAssets> {
        &self.assets
    }

    /// Refreshes skills after assets were installed or removed.
    pub async fn update(&self) -> Result<()> {
        self.skills.update().await
    }
}
