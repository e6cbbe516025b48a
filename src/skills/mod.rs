//! Skill reflection
//!
//! Turns skill descriptions from the registry into classes whose calls
//! convert keyword arguments into parameter messages and `Task` nodes.

pub mod convert;
pub mod info;
pub mod message;
pub mod namespace;
pub mod provider;
pub mod skill;

#[cfg(test)]
mod fixtures;

pub use convert::{
    CartesianTarget, CollisionSettings, JointConfiguration, ObjectFrame, ObjectOrEntity, Pose3,
    PoseEstimator, RobotPayload, TransformNode, WorldArg, WorldObject,
};
pub use info::SkillInfo;
pub use message::{Arg, EnumConst, MessageWrapper, ParamSpec};
pub use namespace::{Member, Namespace};
pub use provider::{Package, PackageMember, SkillEntry, SkillProvider};
pub use skill::{SkillCall, SkillClass};
