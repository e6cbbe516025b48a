//! In-memory services shared by the integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost_types::{FileDescriptorProto, FileDescriptorSet};

use workcell::proto::assets::{
    deployment_data, CreateInstalledAssetRequest, DeleteInstalledAssetRequest, DeploymentData,
    GetInstalledAssetRequest, Id, IdVersion, InstalledAsset, ListInstalledAssetsRequest,
    ListInstalledAssetsResponse, Metadata, ProcessDeploymentData,
};
use workcell::proto::behavior_tree::BehaviorTree as WireTree;
use workcell::proto::operations::{operation, Operation, Status, WaitOperationRequest};
use workcell::proto::resources::{ResourceData, ResourceHandle};
use workcell::proto::skills::{ParameterDescription, ResourceSelector, ReturnValueDescription, Skill};
use workcell::proto::solution::{
    DeleteBehaviorTreeRequest, GetBehaviorTreeRequest, ListBehaviorTreesRequest,
    ListBehaviorTreesResponse, UpdateBehaviorTreeRequest,
};
use workcell::proto::world;
use workcell::reflect::builder::{file, message, message_field, repeated};
use workcell::services::{InstalledAssets, Operations, ResourceRegistry, SkillRegistry, SolutionService};
use workcell::{Result, RpcCode, WorkcellError};

/// Names of the RPCs issued against the fakes, in order.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<&'static str>>);

impl CallLog {
    pub fn record(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

pub struct StaticSkills(pub Vec<Skill>);

#[async_trait]
impl SkillRegistry for StaticSkills {
    async fn get_skills(&self) -> Result<Vec<Skill>> {
        Ok(self.0.clone())
    }

    async fn get_skill(&self, id: &str) -> Result<Skill> {
        self.0
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| WorkcellError::remote(RpcCode::NotFound, format!("no skill {}", id)))
    }
}

/// Resources whose capabilities are the keys of their `resource_data`.
pub struct StaticResources(pub Vec<ResourceHandle>);

impl StaticResources {
    fn matching(&self, selector: &ResourceSelector) -> Vec<ResourceHandle> {
        self.0
            .iter()
            .filter(|h| {
                selector
                    .capability_names
                    .iter()
                    .all(|c| h.resource_data.contains_key(c))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResourceRegistry for StaticResources {
    async fn batch_list_resource_handles(
        &self,
        selectors: Vec<ResourceSelector>,
    ) -> Result<Vec<Vec<ResourceHandle>>> {
        Ok(selectors.iter().map(|s| self.matching(s)).collect())
    }

    async fn list_resource_handles(&self, selector: ResourceSelector) -> Result<Vec<ResourceHandle>> {
        Ok(self.matching(&selector))
    }
}

pub fn resource(name: &str, capability: &str) -> ResourceHandle {
    ResourceHandle {
        name: name.to_string(),
        resource_data: BTreeMap::from([(capability.to_string(), ResourceData::default())]),
    }
}

/// Installed assets kept in memory. `create_installed_asset` hands out the
/// scripted operations in order.
pub struct MemoryAssets {
    pub log: Arc<CallLog>,
    pub installed: Mutex<Vec<InstalledAsset>>,
    pub create_replies: Mutex<VecDeque<Result<Operation>>>,
    pub created: Mutex<Vec<CreateInstalledAssetRequest>>,
}

impl MemoryAssets {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            installed: Mutex::new(Vec::new()),
            create_replies: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_installed(self, asset: InstalledAsset) -> Self {
        self.installed.lock().unwrap().push(asset);
        self
    }

    pub fn reply_to_create(self, reply: Result<Operation>) -> Self {
        self.create_replies.lock().unwrap().push_back(reply);
        self
    }
}

#[async_trait]
impl InstalledAssets for MemoryAssets {
    async fn get_installed_asset(&self, request: GetInstalledAssetRequest) -> Result<InstalledAsset> {
        self.log.record("get_installed_asset");
        let wanted = request.id.map(|id| id.to_id_string()).unwrap_or_default();
        self.installed
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.metadata.as_ref().and_then(|m| m.id_string()).as_deref() == Some(wanted.as_str()))
            .cloned()
            .ok_or_else(|| WorkcellError::remote(RpcCode::NotFound, format!("no asset {}", wanted)))
    }

    async fn list_installed_assets(
        &self,
        request: ListInstalledAssetsRequest,
    ) -> Result<ListInstalledAssetsResponse> {
        self.log.record("list_installed_assets");
        let installed = self.installed.lock().unwrap();
        let start: usize = request.page_token.parse().unwrap_or(0);
        let end = (start + request.page_size as usize).min(installed.len());
        Ok(ListInstalledAssetsResponse {
            installed_assets: installed[start..end].to_vec(),
            next_page_token: if end < installed.len() {
                end.to_string()
            } else {
                String::new()
            },
        })
    }

    async fn create_installed_asset(&self, request: CreateInstalledAssetRequest) -> Result<Operation> {
        self.log.record("create_installed_asset");
        self.created.lock().unwrap().push(request);
        self.create_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(done_operation("ops/create")))
    }

    async fn delete_installed_asset(&self, request: DeleteInstalledAssetRequest) -> Result<Operation> {
        self.log.record("delete_installed_asset");
        let wanted = request.asset.map(|id| id.to_id_string());
        self.installed
            .lock()
            .unwrap()
            .retain(|a| a.metadata.as_ref().and_then(|m| m.id_string()) != wanted);
        Ok(done_operation("ops/delete"))
    }
}

/// Answers `WaitOperation` with scripted states.
pub struct ScriptedOperations {
    pub log: Arc<CallLog>,
    pub replies: Mutex<VecDeque<Operation>>,
}

impl ScriptedOperations {
    pub fn new(log: Arc<CallLog>, replies: Vec<Operation>) -> Self {
        Self {
            log,
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl Operations for ScriptedOperations {
    async fn wait_operation(&self, request: WaitOperationRequest) -> Result<Operation> {
        self.log.record("wait_operation");
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| WorkcellError::remote(RpcCode::NotFound, request.name))
    }
}

/// Legacy named trees.
pub struct MemorySolution {
    pub log: Arc<CallLog>,
    pub trees: Mutex<BTreeMap<String, WireTree>>,
}

impl MemorySolution {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            trees: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl SolutionService for MemorySolution {
    async fn get_behavior_tree(&self, request: GetBehaviorTreeRequest) -> Result<WireTree> {
        self.log.record("get_behavior_tree");
        self.trees
            .lock()
            .unwrap()
            .get(&request.name)
            .cloned()
            .ok_or_else(|| WorkcellError::remote(RpcCode::NotFound, request.name))
    }

    async fn list_behavior_trees(
        &self,
        request: ListBehaviorTreesRequest,
    ) -> Result<ListBehaviorTreesResponse> {
        self.log.record("list_behavior_trees");
        let trees: Vec<WireTree> = self.trees.lock().unwrap().values().cloned().collect();
        let start: usize = request.page_token.parse().unwrap_or(0);
        let end = (start + request.page_size as usize).min(trees.len());
        Ok(ListBehaviorTreesResponse {
            behavior_trees: trees[start..end].to_vec(),
            next_page_token: if end < trees.len() {
                end.to_string()
            } else {
                String::new()
            },
        })
    }

    async fn update_behavior_tree(&self, request: UpdateBehaviorTreeRequest) -> Result<WireTree> {
        self.log.record("update_behavior_tree");
        let tree = request.behavior_tree.unwrap_or_default();
        self.trees
            .lock()
            .unwrap()
            .insert(tree.name.clone(), tree.clone());
        Ok(tree)
    }

    async fn delete_behavior_tree(&self, request: DeleteBehaviorTreeRequest) -> Result<()> {
        self.log.record("delete_behavior_tree");
        self.trees
            .lock()
            .unwrap()
            .remove(&request.name)
            .map(|_| ())
            .ok_or_else(|| WorkcellError::remote(RpcCode::NotFound, request.name))
    }
}

pub fn pending_operation(name: &str) -> Operation {
    Operation {
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn done_operation(name: &str) -> Operation {
    Operation {
        name: name.to_string(),
        done: true,
        ..Default::default()
    }
}

pub fn failed_operation(name: &str, code: RpcCode, message: &str) -> Operation {
    Operation {
        result: Some(operation::Result::Error(Status {
            code: code.as_i32(),
            message: message.to_string(),
            details: Vec::new(),
        })),
        ..done_operation(name)
    }
}

pub fn process_metadata(id: &str, version: &str) -> Metadata {
    Metadata {
        id_version: Some(IdVersion {
            id: Id::parse(id),
            version: version.to_string(),
        }),
        display_name: id.to_string(),
        ..Default::default()
    }
}

pub fn process_asset(id: &str, version: &str, tree: WireTree) -> InstalledAsset {
    InstalledAsset {
        metadata: Some(process_metadata(id, version)),
        deployment_data: Some(DeploymentData {
            variant: Some(deployment_data::Variant::Process(ProcessDeploymentData {
                behavior_tree: Some(tree),
            })),
        }),
    }
}

fn descriptor_set(mut files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
    let mut all = world::file_descriptors();
    all.append(&mut files);
    FileDescriptorSet { file: all }
}

/// Skill `<package>.<name>` whose parameter message is `<package>.Params`
/// built from `params` and whose return message, if any, is
/// `<package>.Result`.
pub fn skill(
    package: &str,
    name: &str,
    params: Vec<prost_types::FieldDescriptorProto>,
    result: Option<Vec<prost_types::FieldDescriptorProto>>,
) -> Skill {
    let id = format!("{}.{}", package, name);
    let mut messages = vec![message("Params", params)];
    if let Some(result) = &result {
        messages.push(message("Result", result.clone()));
    }
    let proto_file = file(
        &format!("{}/{}.proto", package.replace('.', "/"), name),
        package,
        messages,
        &["workcell_proto/geometry.proto", world::FILE_NAME],
    );
    let set = descriptor_set(vec![proto_file]);
    Skill {
        id: id.clone(),
        id_version: format!("{}.1.0.0", id),
        skill_name: name.to_string(),
        package_name: package.to_string(),
        parameter_description: Some(ParameterDescription {
            parameter_message_full_name: format!("{}.Params", package),
            parameter_descriptor_fileset: Some(set.clone()),
            ..Default::default()
        }),
        return_value_description: result.map(|_| ReturnValueDescription {
            return_value_message_full_name: format!("{}.Result", package),
            descriptor_fileset: Some(set),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `demo.vision.s_produce` returning `{poses: repeated Pose}` and
/// `demo.motion.s_consume(target: Pose)`.
pub fn dataflow_skills() -> Vec<Skill> {
    vec![
        skill(
            "demo.vision",
            "s_produce",
            Vec::new(),
            Some(vec![repeated(message_field("poses", 1, world::POSE_NAME))]),
        ),
        skill(
            "demo.motion",
            "s_consume",
            vec![message_field("target", 1, world::POSE_NAME)],
            None,
        ),
    ]
}
