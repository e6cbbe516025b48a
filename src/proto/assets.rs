//! Installed-asset messages

use super::behavior_tree::BehaviorTree;

pub const INSTALLED_ASSET_NAME: &str = "workcell_proto.assets.InstalledAsset";

#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Id {
    #[prost(string, tag = "1")]
    pub package: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct IdVersion {
    #[prost(message, optional, tag = "1")]
    pub id: Option<Id>,
    #[prost(string, tag = "2")]
    pub version: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Vendor {
    #[prost(string, tag = "1")]
    pub display_name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Documentation {
    #[prost(string, tag = "1")]
    pub description: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    #[prost(message, optional, tag = "1")]
    pub id_version: Option<IdVersion>,
    #[prost(string, tag = "2")]
    pub display_name: String,
    #[prost(message, optional, tag = "3")]
    pub vendor: Option<Vendor>,
    #[prost(message, optional, tag = "4")]
    pub documentation: Option<Documentation>,
    #[prost(enumeration = "AssetType", tag = "5")]
    pub asset_type: i32,
    #[prost(enumeration = "AssetTag", tag = "6")]
    pub asset_tag: i32,
    #[prost(message, optional, tag = "7")]
    pub update_time: Option<prost_types::Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InstalledAsset {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(message, optional, tag = "2")]
    pub deployment_data: Option<DeploymentData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeploymentData {
    #[prost(oneof = "deployment_data::Variant", tags = "1")]
    pub variant: Option<deployment_data::Variant>,
}

pub mod deployment_data {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "1")]
        Process(super::ProcessDeploymentData),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessDeploymentData {
    #[prost(message, optional, tag = "1")]
    pub behavior_tree: Option<BehaviorTree>,
}

/// Asset payload accepted by `CreateInstalledAsset`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Asset {
    #[prost(oneof = "asset::Variant", tags = "1")]
    pub variant: Option<asset::Variant>,
}

pub mod asset {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "1")]
        Process(super::ProcessAsset),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessAsset {
    #[prost(message, optional, tag = "1")]
    pub metadata: Option<Metadata>,
    #[prost(message, optional, tag = "2")]
    pub behavior_tree: Option<BehaviorTree>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct GetInstalledAssetRequest {
    #[prost(message, optional, tag = "1")]
    pub id: Option<Id>,
    #[prost(enumeration = "AssetView", tag = "2")]
    pub view: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct AssetFilter {
    #[prost(enumeration = "AssetType", repeated, tag = "1")]
    pub asset_types: Vec<i32>,
    #[prost(enumeration = "AssetTag", tag = "2")]
    pub asset_tag: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ListInstalledAssetsRequest {
    #[prost(int64, tag = "1")]
    pub page_size: i64,
    #[prost(string, tag = "2")]
    pub page_token: String,
    #[prost(message, optional, tag = "3")]
    pub strict_filter: Option<AssetFilter>,
    #[prost(enumeration = "AssetView", tag = "4")]
    pub view: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListInstalledAssetsResponse {
    #[prost(message, repeated, tag = "1")]
    pub installed_assets: Vec<InstalledAsset>,
    #[prost(string, tag = "2")]
    pub next_page_token: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateInstalledAssetRequest {
    #[prost(message, optional, tag = "1")]
    pub asset: Option<Asset>,
    #[prost(enumeration = "UpdatePolicy", tag = "2")]
    pub policy: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct DeleteInstalledAssetRequest {
    #[prost(message, optional, tag = "1")]
    pub asset: Option<Id>,
    #[prost(enumeration = "DeletePolicy", tag = "2")]
    pub policy: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AssetType {
    Unspecified = 0,
    Resource = 1,
    Skill = 2,
    Service = 3,
    Data = 4,
    Process = 5,
    Scene = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AssetTag {
    Unspecified = 0,
    Subprocess = 1,
    Camera = 2,
    Gripper = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AssetView {
    Unspecified = 0,
    Basic = 1,
    Detail = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UpdatePolicy {
    Unspecified = 0,
    AddNewOnly = 1,
    UpdateUnusedVersion = 2,
    UpdateCompatible = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DeletePolicy {
    Unspecified = 0,
    RejectUsed = 1,
    PruneUnused = 2,
}

impl Id {
    /// Parses `package.name` where the name is the last dot-separated segment.
    pub fn parse(id: &str) -> Option<Self> {
        let (package, name) = id.rsplit_once('.')?;
        if package.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            package: package.to_string(),
            name: name.to_string(),
        })
    }

    pub fn to_id_string(&self) -> String {
        format!("{}.{}", self.package, self.name)
    }
}

impl Metadata {
    /// `package.name` of the asset, if present.
    pub fn id_string(&self) -> Option<String> {
        self.id_version
            .as_ref()
            .and_then(|iv| iv.id.as_ref())
            .map(Id::to_id_string)
    }

    pub fn version(&self) -> Option<&str> {
        self.id_version.as_ref().map(|iv| iv.version.as_str())
    }
}
