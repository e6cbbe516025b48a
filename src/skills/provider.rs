//! Installed skills as a navigable package tree

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::proto::assets::{
    deployment_data, AssetFilter, AssetTag, AssetType, AssetView, InstalledAsset,
    ListInstalledAssetsRequest,
};
use crate::process::ASSET_PAGE_SIZE;
use crate::proto::resources::ResourceHandle;
use crate::proto::skills::{ResourceSelector, Skill};
use crate::services::{InstalledAssets, ResourceRegistry, SkillRegistry};
use crate::{Result, WorkcellError};

use super::info::SkillInfo;
use super::skill::SkillClass;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A skill description plus the resources compatible with its slots. The
/// class is generated on first use.
#[derive(Debug)]
pub struct SkillEntry {
    info: Arc<SkillInfo>,
    resources: BTreeMap<String, Vec<ResourceHandle>>,
    class: OnceCell<Arc<SkillClass>>,
}

impl SkillEntry {
    pub fn info(&self) -> &Arc<SkillInfo> {
        &self.info
    }

    pub fn class(&self) -> Result<Arc<SkillClass>> {
        self.class
            .get_or_try_init(|| {
                SkillClass::new(self.info.clone(), self.resources.clone()).map(Arc::new)
            })
            .cloned()
    }
}

/// What a name inside a package resolves to.
#[derive(Debug, Clone)]
pub enum PackageMember {
    Package(Arc<Package>),
    Skill(Arc<SkillClass>),
}

/// One segment of the dotted package hierarchy.
#[derive(Debug, Default)]
pub struct Package {
    path: String,
    packages: BTreeMap<String, Arc<Package>>,
    skills: BTreeMap<String, Arc<SkillEntry>>,
}

impl Package {
    /// Dotted path, empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn skill_names(&self) -> impl Iterator<Item = &str> {
        self.skills.keys().map(String::as_str)
    }

    /// Child packages shadow skills of the same name.
    pub fn get(&self, name: &str) -> Result<PackageMember> {
        if let Some(package) = self.packages.get(name) {
            return Ok(PackageMember::Package(package.clone()));
        }
        if let Some(entry) = self.skills.get(name) {
            return entry.class().map(PackageMember::Skill);
        }
        Err(self.missing(name))
    }

    pub fn package(&self, name: &str) -> Result<Arc<Package>> {
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| self.missing(name))
    }

    pub fn skill(&self, name: &str) -> Result<Arc<SkillClass>> {
        match self.skills.get(name) {
            Some(entry) => entry.class(),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> WorkcellError {
        let attempted = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.path, name)
        };
        WorkcellError::NotFound(format!(
            "no skill or package '{}' (looked in package '{}')",
            attempted, self.path
        ))
    }
}

#[derive(Default)]
struct PackageBuilder {
    packages: BTreeMap<String, PackageBuilder>,
    skills: BTreeMap<String, Arc<SkillEntry>>,
}

impl PackageBuilder {
    fn insert(&mut self, entry: Arc<SkillEntry>) {
        let package = entry.info.package_name();
        let node = package
            .split('.')
            .filter(|segment| !segment.is_empty())
            .fold(self, |node, segment| {
                node.packages.entry(segment.to_string()).or_default()
            });
        node.skills
            .insert(entry.info.skill_name().to_string(), entry);
    }

    fn finish(self, path: String) -> Arc<Package> {
        let packages = self
            .packages
            .into_iter()
            .map(|(name, child)| {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                (name, child.finish(child_path))
            })
            .collect();
        Arc::new(Package {
            path,
            packages,
            skills: self.skills,
        })
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    entries: BTreeMap<String, Arc<SkillEntry>>,
    root: Arc<Package>,
}

/// Skills from the skill registry merged with installed sub-process assets.
///
/// [`update`](Self::update) rebuilds everything and swaps it in at once;
/// packages and classes handed out earlier keep the state they were read
/// from.
pub struct SkillProvider {
    skills: Arc<dyn SkillRegistry>,
    resources: Arc<dyn ResourceRegistry>,
    assets: Option<Arc<dyn InstalledAssets>>,
    snapshot: RwLock<Arc<Snapshot>>,
    poll_interval: Duration,
}

impl SkillProvider {
    /// Connects and loads the first snapshot.
    pub async fn new(
        skills: Arc<dyn SkillRegistry>,
        resources: Arc<dyn ResourceRegistry>,
        assets: Option<Arc<dyn InstalledAssets>>,
    ) -> Result<Self> {
        let provider = Self {
            skills,
            resources,
            assets,
            snapshot: RwLock::new(Arc::default()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        provider.update().await?;
        Ok(provider)
    }

    /// Interval between registry polls in [`wait_for_skill`](Self::wait_for_skill).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Refetches skills, sub-process assets and compatible resources.
    pub async fn update(&self) -> Result<()> {
        let mut skills: BTreeMap<String, Skill> = self
            .skills
            .get_skills()
            .await?
            .into_iter()
            .map(|skill| (skill.id.clone(), skill))
            .collect();
        let registry_count = skills.len();
        for skill in self.subprocess_skills().await? {
            if skills.contains_key(&skill.id) {
                tracing::debug!(skill = %skill.id, "Installed process replaces registry skill");
            }
            skills.insert(skill.id.clone(), skill);
        }

        let mut infos = Vec::with_capacity(skills.len());
        for (id, skill) in skills {
            match SkillInfo::from_skill(skill) {
                Ok(info) => infos.push(Arc::new(info)),
                Err(e) => tracing::warn!(skill = %id, "Skipping skill: {}", e),
            }
        }

        let mut slots = Vec::new();
        let mut selectors = Vec::new();
        for (index, info) in infos.iter().enumerate() {
            for (slot, capabilities) in info.resource_selectors() {
                slots.push((index, slot.clone()));
                selectors.push(ResourceSelector {
                    capability_names: capabilities.iter().cloned().collect(),
                });
            }
        }
        let handle_lists = if selectors.is_empty() {
            Vec::new()
        } else {
            self.resources.batch_list_resource_handles(selectors).await?
        };
        if handle_lists.len() != slots.len() {
            return Err(WorkcellError::Transport(format!(
                "resource registry returned {} handle lists for {} selectors",
                handle_lists.len(),
                slots.len()
            )));
        }
        let mut resources: Vec<BTreeMap<String, Vec<ResourceHandle>>> =
            vec![BTreeMap::new(); infos.len()];
        for ((index, slot), handles) in slots.into_iter().zip(handle_lists) {
            resources[index].insert(slot, handles);
        }

        let mut root = PackageBuilder::default();
        let mut entries = BTreeMap::new();
        for (info, resources) in infos.into_iter().zip(resources) {
            let entry = Arc::new(SkillEntry {
                info,
                resources,
                class: OnceCell::new(),
            });
            entries.insert(entry.info.id().to_string(), entry.clone());
            root.insert(entry);
        }
        tracing::info!(
            skills = entries.len(),
            from_registry = registry_count,
            "Loaded skills"
        );

        let snapshot = Arc::new(Snapshot {
            entries,
            root: root.finish(String::new()),
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Root of the package tree.
    pub fn root(&self) -> Arc<Package> {
        self.current().root.clone()
    }

    /// Package by dotted path, e.g. `demo.pick`.
    pub fn package(&self, path: &str) -> Result<Arc<Package>> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root(), |package, segment| package.package(segment))
    }

    /// Class of the skill with id `id`, bypassing the package tree.
    pub fn get(&self, id: &str) -> Result<Arc<SkillClass>> {
        self.entry(id)?.class()
    }

    pub fn entry(&self, id: &str) -> Result<Arc<SkillEntry>> {
        self.current()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| WorkcellError::NotFound(format!("no skill with id '{}'", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.current().entries.contains_key(id)
    }

    pub fn skill_ids(&self) -> Vec<String> {
        self.current().entries.keys().cloned().collect()
    }

    /// Polls until a skill with `id` is installed.
    pub async fn wait_for_skill(&self, id: &str, timeout: Duration) -> Result<Arc<SkillClass>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.contains(id) {
                return self.get(id);
            }
            if Instant::now() >= deadline {
                return Err(WorkcellError::Timeout(format!(
                    "skill '{}' did not appear within {:?}",
                    id, timeout
                )));
            }
            tracing::info!(skill = id, "Waiting for skill to be installed");
            tokio::time::sleep(
                self.poll_interval
                    .min(deadline.saturating_duration_since(Instant::now())),
            )
            .await;
            self.update().await?;
        }
    }

    async fn subprocess_skills(&self) -> Result<Vec<Skill>> {
        let Some(assets) = &self.assets else {
            return Ok(Vec::new());
        };
        let mut skills = Vec::new();
        let mut page_token = String::new();
        loop {
            let response = assets
                .list_installed_assets(ListInstalledAssetsRequest {
                    page_size: ASSET_PAGE_SIZE,
                    page_token: page_token.clone(),
                    strict_filter: Some(AssetFilter {
                        asset_types: vec![AssetType::Process as i32],
                        asset_tag: AssetTag::Subprocess as i32,
                    }),
                    view: AssetView::Detail as i32,
                })
                .await?;
            skills.extend(response.installed_assets.into_iter().filter_map(subprocess_skill));
            if response.next_page_token.is_empty() {
                return Ok(skills);
            }
            page_token = response.next_page_token;
        }
    }
}

/// Skill description embedded in a sub-process asset, with id and version
/// taken from the asset metadata when the description omits them.
fn subprocess_skill(asset: InstalledAsset) -> Option<Skill> {
    let metadata = asset.metadata;
    let tree = match asset.deployment_data?.variant? {
        deployment_data::Variant::Process(process) => process.behavior_tree?,
    };
    let mut skill = tree.description?;
    if let Some(metadata) = &metadata {
        if skill.id.is_empty() {
            skill.id = metadata.id_string().unwrap_or_default();
        }
        if skill.id_version.is_empty() {
            if let Some(version) = metadata.version().filter(|v| !v.is_empty()) {
                skill.id_version = format!("{}.{}", skill.id, version);
            }
        }
        if skill.display_name.is_empty() {
            skill.display_name = metadata.display_name.clone();
        }
    }
    (!skill.id.is_empty()).then_some(skill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::assets::{
        CreateInstalledAssetRequest, DeleteInstalledAssetRequest, GetInstalledAssetRequest,
        Id, IdVersion, ListInstalledAssetsResponse, Metadata, ProcessDeploymentData,
        DeploymentData,
    };
    use crate::proto::behavior_tree::BehaviorTree;
    use crate::proto::operations::Operation;
    use crate::proto::resources::ResourceData;
    use crate::skills::fixtures::{pick_skill, simple_skill};
    use async_trait::async_trait;
    use prost_types::field_descriptor_proto::Type;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSkills {
        skills: Mutex<Vec<Skill>>,
    }

    #[async_trait]
    impl SkillRegistry for FakeSkills {
        async fn get_skills(&self) -> Result<Vec<Skill>> {
            Ok(self.skills.lock().unwrap().clone())
        }

        async fn get_skill(&self, id: &str) -> Result<Skill> {
            self.skills
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| WorkcellError::NotFound(id.to_string()))
        }
    }

    #[derive(Default)]
    struct FakeResources {
        handles: Vec<ResourceHandle>,
        batch_calls: AtomicUsize,
    }

    impl FakeResources {
        fn matching(&self, selector: &ResourceSelector) -> Vec<ResourceHandle> {
            self.handles
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
    impl ResourceRegistry for FakeResources {
        async fn batch_list_resource_handles(
            &self,
            selectors: Vec<ResourceSelector>,
        ) -> Result<Vec<Vec<ResourceHandle>>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(selectors.iter().map(|s| self.matching(s)).collect())
        }

        async fn list_resource_handles(
            &self,
            selector: ResourceSelector,
        ) -> Result<Vec<ResourceHandle>> {
            Ok(self.matching(&selector))
        }
    }

    struct FakeAssets {
        assets: Vec<InstalledAsset>,
    }

    #[async_trait]
    impl InstalledAssets for FakeAssets {
        async fn get_installed_asset(&self, _: GetInstalledAssetRequest) -> Result<InstalledAsset> {
            Err(WorkcellError::NotFound("asset".to_string()))
        }

        async fn list_installed_assets(
            &self,
            request: ListInstalledAssetsRequest,
        ) -> Result<ListInstalledAssetsResponse> {
            assert_eq!(request.page_size, ASSET_PAGE_SIZE);
            assert_eq!(request.view, AssetView::Detail as i32);
            Ok(ListInstalledAssetsResponse {
                installed_assets: self.assets.clone(),
                next_page_token: String::new(),
            })
        }

        async fn create_installed_asset(&self, _: CreateInstalledAssetRequest) -> Result<Operation> {
            unimplemented!()
        }

        async fn delete_installed_asset(&self, _: DeleteInstalledAssetRequest) -> Result<Operation> {
            unimplemented!()
        }
    }

    fn arm(name: &str) -> ResourceHandle {
        ResourceHandle {
            name: name.to_string(),
            resource_data: BTreeMap::from([("arm".to_string(), ResourceData::default())]),
        }
    }

    fn subprocess_asset(id: &str, description: &str) -> InstalledAsset {
        let parsed = Id::parse(id).unwrap();
        let mut skill = simple_skill(id, &parsed.package, &[("count", Type::Int32)]);
        skill.id.clear();
        skill.id_version.clear();
        skill.description = description.to_string();
        InstalledAsset {
            metadata: Some(Metadata {
                id_version: Some(IdVersion {
                    id: Some(parsed),
                    version: "2.0.0".to_string(),
                }),
                asset_type: AssetType::Process as i32,
                asset_tag: AssetTag::Subprocess as i32,
                ..Default::default()
            }),
            deployment_data: Some(DeploymentData {
                variant: Some(deployment_data::Variant::Process(ProcessDeploymentData {
                    behavior_tree: Some(BehaviorTree {
                        name: "sub".to_string(),
                        description: Some(skill),
                        ..Default::default()
                    }),
                })),
            }),
        }
    }

    async fn provider_with(
        skills: Vec<Skill>,
        assets: Option<Vec<InstalledAsset>>,
    ) -> (SkillProvider, Arc<FakeSkills>, Arc<FakeResources>) {
        let registry = Arc::new(FakeSkills {
            skills: Mutex::new(skills),
        });
        let resources = Arc::new(FakeResources {
            handles: vec![arm("arm_1")],
            ..Default::default()
        });
        let assets = assets.map(|assets| Arc::new(FakeAssets { assets }) as Arc<dyn InstalledAssets>);
        let provider = SkillProvider::new(registry.clone(), resources.clone(), assets)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(5));
        (provider, registry, resources)
    }

    #[tokio::test]
    async fn test_package_tree_navigation() {
        let (provider, _, _) = provider_with(
            vec![
                pick_skill(),
                simple_skill("demo.tools.grip", "demo.tools", &[("tool", Type::String)]),
            ],
            None,
        )
        .await;
        let demo = provider.package("demo").unwrap();
        assert_eq!(demo.package_names().collect::<Vec<_>>(), vec!["pick", "tools"]);
        let pick = provider.package("demo.pick").unwrap().skill("pick").unwrap();
        assert_eq!(pick.id(), "demo.pick.pick");
        match provider.package("demo.tools").unwrap().get("grip").unwrap() {
            PackageMember::Skill(class) => assert_eq!(class.id(), "demo.tools.grip"),
            other => panic!("unexpected member {:?}", other),
        }
        assert_eq!(
            provider.skill_ids(),
            vec!["demo.pick.pick".to_string(), "demo.tools.grip".to_string()]
        );
    }

    #[tokio::test]
    async fn test_child_package_wins_over_skill() {
        let (provider, _, _) = provider_with(
            vec![
                simple_skill("demo.tools", "demo", &[]),
                simple_skill("demo.tools.grip", "demo.tools", &[]),
            ],
            None,
        )
        .await;
        let demo = provider.package("demo").unwrap();
        assert!(matches!(demo.get("tools").unwrap(), PackageMember::Package(_)));
        assert_eq!(demo.skill("tools").unwrap().id(), "demo.tools");
        assert_eq!(provider.get("demo.tools").unwrap().id(), "demo.tools");
    }

    #[tokio::test]
    async fn test_missing_name_reports_path() {
        let (provider, _, _) = provider_with(vec![pick_skill()], None).await;
        let err = provider.package("demo.pick").unwrap().get("place").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("demo.pick.place"));
        assert!(provider.package("demo.nothing").is_err());
    }

    #[tokio::test]
    async fn test_resources_are_batched_and_classes_cached() {
        let mut second = pick_skill();
        second.id = "demo.pick.pick_twice".to_string();
        second.id_version = "demo.pick.pick_twice.1.0.0".to_string();
        let (provider, _, resources) = provider_with(vec![pick_skill(), second], None).await;
        assert_eq!(resources.batch_calls.load(Ordering::SeqCst), 1);

        let class = provider.get("demo.pick.pick").unwrap();
        assert_eq!(class.compatible_resources("robot").len(), 1);
        assert_eq!(class.compatible_resources("robot")[0].name, "arm_1");
        let again = provider.package("demo.pick").unwrap().skill("pick").unwrap();
        assert!(Arc::ptr_eq(&class, &again));
    }

    #[tokio::test]
    async fn test_installed_process_takes_precedence() {
        let mut registry_version = simple_skill("demo.flows.sort", "demo.flows", &[]);
        registry_version.description = "registry".to_string();
        let (provider, _, _) = provider_with(
            vec![registry_version],
            Some(vec![subprocess_asset("demo.flows.sort", "installed")]),
        )
        .await;
        let class = provider.get("demo.flows.sort").unwrap();
        assert_eq!(class.info().description(), "installed");
        assert_eq!(class.info().version(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn test_update_swaps_snapshot() {
        let (provider, registry, _) = provider_with(vec![pick_skill()], None).await;
        let old_root = provider.root();
        registry
            .skills
            .lock()
            .unwrap()
            .push(simple_skill("demo.tools.grip", "demo.tools", &[]));
        provider.update().await.unwrap();
        assert!(provider.contains("demo.tools.grip"));
        assert!(old_root.package("demo").unwrap().package("tools").is_err());
    }

    #[tokio::test]
    async fn test_wait_for_skill() {
        let (provider, registry, _) = provider_with(Vec::new(), None).await;
        let err = provider
            .wait_for_skill("demo.pick.pick", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkcellError::Timeout(_)));

        registry.skills.lock().unwrap().push(pick_skill());
        let class = provider
            .wait_for_skill("demo.pick.pick", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(class.name(), "pick");
    }
}
