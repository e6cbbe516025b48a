//! Behavior trees stored in the solution
//!
//! Two backends hold processes: installed Process assets, keyed by asset id
//! (`package.name`), and legacy named trees. Lookups by an id-shaped name
//! try the asset first; listings put assets first and let them win name
//! collisions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::bt::BehaviorTree;
use crate::error::RpcCode;
use crate::operations::{wait_for_operation, DEFAULT_POLL_TIMEOUT};
use crate::proto::assets::{
    asset, deployment_data, Asset, AssetFilter, AssetType, AssetView, CreateInstalledAssetRequest,
    DeleteInstalledAssetRequest, DeletePolicy, GetInstalledAssetRequest, Id, InstalledAsset,
    ListInstalledAssetsRequest, ProcessAsset, UpdatePolicy, INSTALLED_ASSET_NAME,
};
use crate::proto::operations::operation;
use crate::proto::solution::{
    BehaviorTreeView, DeleteBehaviorTreeRequest, GetBehaviorTreeRequest, ListBehaviorTreesRequest,
    UpdateBehaviorTreeRequest,
};
use crate::proto::unpack_any;
use crate::services::{InstalledAssets, Operations, SolutionService};
use crate::{Result, WorkcellError};

/// Largest page requested when listing installed assets.
pub const ASSET_PAGE_SIZE: i64 = 200;
/// Largest page requested when listing legacy trees.
pub const TREE_PAGE_SIZE: i32 = 50;

static ASSET_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*\.[a-z][a-z0-9_]*$").expect("valid regex")
});

/// Whether `name` has the shape of an asset id.
pub fn is_asset_id(name: &str) -> bool {
    ASSET_ID.is_match(name)
}

/// Dictionary-like access to the processes of a solution.
#[derive(Clone)]
pub struct ProcessProvider {
    solution: Arc<dyn SolutionService>,
    assets: Arc<dyn InstalledAssets>,
    operations: Arc<dyn Operations>,
    poll_timeout: Duration,
    asset_page_size: i64,
    tree_page_size: i32,
}

impl ProcessProvider {
    pub fn new(
        solution: Arc<dyn SolutionService>,
        assets: Arc<dyn InstalledAssets>,
        operations: Arc<dyn Operations>,
    ) -> Self {
        Self {
            solution,
            assets,
            operations,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            asset_page_size: ASSET_PAGE_SIZE,
            tree_page_size: TREE_PAGE_SIZE,
        }
    }

    /// Server-side wait per operation poll.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Page sizes for listing assets and legacy trees, clamped to the
    /// service maximums.
    pub fn with_page_sizes(mut self, assets: i64, trees: i32) -> Self {
        self.asset_page_size = assets.clamp(1, ASSET_PAGE_SIZE);
        self.tree_page_size = trees.clamp(1, TREE_PAGE_SIZE);
        self
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items().await?.into_iter().map(|(name, _)| name).collect())
    }

    pub async fn values(&self) -> Result<Vec<BehaviorTree>> {
        Ok(self.items().await?.into_iter().map(|(_, tree)| tree).collect())
    }

    /// Assets first, then legacy trees whose name no asset uses.
    pub async fn items(&self) -> Result<Vec<(String, BehaviorTree)>> {
        let mut items = self.asset_items().await?;
        let taken: BTreeSet<String> = items.iter().map(|(name, _)| name.clone()).collect();
        for (name, tree) in self.legacy_items().await? {
            if taken.contains(&name) {
                tracing::debug!(process = %name, "Installed asset shadows legacy tree");
                continue;
            }
            items.push((name, tree));
        }
        Ok(items)
    }

    pub async fn contains(&self, name: &str) -> Result<bool> {
        match self.get(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, name: &str) -> Result<BehaviorTree> {
        if let Some(id) = Id::parse(name).filter(|_| is_asset_id(name)) {
            let request = GetInstalledAssetRequest {
                id: Some(id),
                view: AssetView::Detail as i32,
            };
            match self.assets.get_installed_asset(request).await {
                Ok(asset) => return process_tree(asset),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(process = name, "No installed asset, trying legacy tree");
                }
                Err(e) => return Err(e),
            }
        }
        let tree = self
            .solution
            .get_behavior_tree(GetBehaviorTreeRequest {
                name: name.to_string(),
            })
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    WorkcellError::NotFound(format!("no process named '{}'", name))
                } else {
                    e
                }
            })?;
        BehaviorTree::from_wire(tree)
    }

    /// Stores `tree` under `name`.
    ///
    /// Trees with asset metadata are installed as Process assets; the
    /// metadata returned by the server is copied back onto `tree`. Installing
    /// content that already exists is a no-op. Other trees are written to the
    /// legacy store.
    pub async fn save(&self, name: &str, tree: &mut BehaviorTree) -> Result<()> {
        if tree.metadata.is_some() {
            return self.install(name, tree).await;
        }
        let mut wire = tree.to_wire()?;
        wire.name = name.to_string();
        self.solution
            .update_behavior_tree(UpdateBehaviorTreeRequest {
                behavior_tree: Some(wire),
                allow_missing: true,
            })
            .await?;
        tracing::info!(process = name, "Saved behavior tree");
        Ok(())
    }

    async fn install(&self, name: &str, tree: &mut BehaviorTree) -> Result<()> {
        let mut metadata = tree.metadata.clone().unwrap_or_default();
        if metadata.id_string().is_none() {
            let id = Id::parse(name).filter(|_| is_asset_id(name)).ok_or_else(|| {
                WorkcellError::InvalidArgument(format!(
                    "process '{}' has asset metadata without an id and its name is not an asset id",
                    name
                ))
            })?;
            metadata.id_version.get_or_insert_with(Default::default).id = Some(id);
        }
        metadata.asset_type = AssetType::Process as i32;

        let mut behavior_tree = tree.to_wire()?;
        behavior_tree.metadata = None;
        let request = CreateInstalledAssetRequest {
            asset: Some(Asset {
                variant: Some(asset::Variant::Process(ProcessAsset {
                    metadata: Some(metadata),
                    behavior_tree: Some(behavior_tree),
                })),
            }),
            policy: UpdatePolicy::UpdateCompatible as i32,
        };

        let finished = match self.assets.create_installed_asset(request).await {
            Ok(operation) => {
                wait_for_operation(self.operations.as_ref(), operation, self.poll_timeout).await
            }
            Err(e) => Err(e),
        };
        let operation = match finished {
            Ok(operation) => operation,
            Err(e) if e.rpc_code() == Some(RpcCode::AlreadyExists) => {
                tracing::info!(process = name, "Process asset is already installed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Some(operation::Result::Response(response)) = &operation.result {
            let installed: InstalledAsset = unpack_any(response, INSTALLED_ASSET_NAME)?;
            if let Some(metadata) = installed.metadata {
                tracing::info!(
                    process = name,
                    version = metadata.version().unwrap_or_default(),
                    "Installed process asset"
                );
                tree.metadata = Some(metadata);
            }
        }
        Ok(())
    }

    /// Removes the legacy tree `name`.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.solution
            .delete_behavior_tree(DeleteBehaviorTreeRequest {
                name: name.to_string(),
            })
            .await
            .map_err(|e| {
                WorkcellError::NotFound(format!("could not delete process '{}': {}", name, e))
            })
    }

    /// Uninstalls the Process asset `id`.
    pub async fn delete_asset(&self, id: &str) -> Result<()> {
        let parsed = Id::parse(id)
            .ok_or_else(|| WorkcellError::InvalidArgument(format!("'{}' is not an asset id", id)))?;
        let operation = self
            .assets
            .delete_installed_asset(DeleteInstalledAssetRequest {
                asset: Some(parsed),
                policy: DeletePolicy::RejectUsed as i32,
            })
            .await?;
        wait_for_operation(self.operations.as_ref(), operation, self.poll_timeout).await?;
        tracing::info!(process = id, "Deleted process asset");
        Ok(())
    }

    async fn asset_items(&self) -> Result<Vec<(String, BehaviorTree)>> {
        let mut items = Vec::new();
        let mut page_token = String::new();
        loop {
            let response = self
                .assets
                .list_installed_assets(ListInstalledAssetsRequest {
                    page_size: self.asset_page_size,
                    page_token: page_token.clone(),
                    strict_filter: Some(AssetFilter {
                        asset_types: vec![AssetType::Process as i32],
                        asset_tag: 0,
                    }),
                    view: AssetView::Detail as i32,
                })
                .await?;
            for asset in response.installed_assets {
                let Some(id) = asset.metadata.as_ref().and_then(|m| m.id_string()) else {
                    continue;
                };
                items.push((id, process_tree(asset)?));
            }
            if response.next_page_token.is_empty() {
                return Ok(items);
            }
            page_token = response.next_page_token;
        }
    }

    async fn legacy_items(&self) -> Result<Vec<(String, BehaviorTree)>> {
        let mut items = Vec::new();
        let mut page_token = String::new();
        loop {
            let response = self
                .solution
                .list_behavior_trees(ListBehaviorTreesRequest {
                    page_size: self.tree_page_size,
                    page_token: page_token.clone(),
                    view: BehaviorTreeView::Full as i32,
                })
                .await?;
            for tree in response.behavior_trees {
                let tree = BehaviorTree::from_wire(tree)?;
                items.push((tree.name.clone(), tree));
            }
            if response.next_page_token.is_empty() {
                return Ok(items);
            }
            page_token = response.next_page_token;
        }
    }
}

/// The behavior tree of a Process asset, carrying the asset's metadata.
fn process_tree(asset: InstalledAsset) -> Result<BehaviorTree> {
    let id = asset
        .metadata
        .as_ref()
        .and_then(|m| m.id_string())
        .unwrap_or_default();
    let wire = match asset.deployment_data.and_then(|d| d.variant) {
        Some(deployment_data::Variant::Process(process)) => process.behavior_tree,
        None => None,
    }
    .ok_or_else(|| {
        WorkcellError::InvalidArgument(format!("installed asset '{}' holds no behavior tree", id))
    })?;
    let mut tree = BehaviorTree::from_wire(wire)?;
    if asset.metadata.is_some() {
        tree.metadata = asset.metadata;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_shape() {
        assert!(is_asset_id("demo.flows.sort"));
        assert!(is_asset_id("ai.pkg.my_process_2"));
        assert!(!is_asset_id("my process"));
        assert!(!is_asset_id("sort"));
        assert!(!is_asset_id("Demo.Sort"));
        assert!(!is_asset_id("demo..sort"));
    }
}
