//! Geometry and world reference messages targeted by the builder's
//! automatic conversions
//!
//! [`file_descriptors`] returns the descriptors of these messages
//! so skills built locally (and tests) can ship these types in their
//! descriptor sets.

use prost_types::field_descriptor_proto::Type;
use prost_types::FileDescriptorProto;

use crate::reflect::builder::{field, file, in_oneof, message, message_field, repeated, with_oneof};

pub const FILE_NAME: &str = "workcell_proto/world.proto";

pub const POINT_NAME: &str = "workcell_proto.Point";
pub const QUATERNION_NAME: &str = "workcell_proto.Quaternion";
pub const POSE_NAME: &str = "workcell_proto.Pose";
pub const ROS_POSE_NAME: &str = "geometry_msgs.Pose";
pub const OBJECT_REFERENCE_NAME: &str = "workcell_proto.world.ObjectReference";
pub const FRAME_REFERENCE_NAME: &str = "workcell_proto.world.FrameReference";
pub const TRANSFORM_NODE_REFERENCE_NAME: &str = "workcell_proto.world.TransformNodeReference";
pub const OBJECT_OR_ENTITY_REFERENCE_NAME: &str = "workcell_proto.world.ObjectOrEntityReference";
pub const COLLISION_SETTINGS_NAME: &str = "workcell_proto.world.CollisionSettings";
pub const ROBOT_PAYLOAD_NAME: &str = "workcell_proto.world.RobotPayload";
pub const JOINT_VEC_NAME: &str = "workcell_proto.icon.JointVec";
pub const POSE_ESTIMATOR_ID_NAME: &str = "workcell_proto.perception.PoseEstimatorId";
pub const CARTESIAN_MOTION_TARGET_NAME: &str = "workcell_proto.motion.CartesianMotionTarget";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Quaternion {
    #[prost(double, tag = "1")]
    pub x: f64,
    #[prost(double, tag = "2")]
    pub y: f64,
    #[prost(double, tag = "3")]
    pub z: f64,
    #[prost(double, tag = "4")]
    pub w: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pose {
    #[prost(message, optional, tag = "1")]
    pub position: Option<Point>,
    #[prost(message, optional, tag = "2")]
    pub orientation: Option<Quaternion>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ObjectReferenceByName {
    #[prost(string, tag = "1")]
    pub object_name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct FrameReferenceByName {
    #[prost(string, tag = "1")]
    pub object_name: String,
    #[prost(string, tag = "2")]
    pub frame_name: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ObjectReference {
    #[prost(oneof = "object_reference::Reference", tags = "1, 2")]
    pub reference: Option<object_reference::Reference>,
}

pub mod object_reference {
    #[derive(Clone, PartialEq, Eq, ::prost::Oneof)]
    pub enum Reference {
        #[prost(string, tag = "1")]
        Id(String),
        #[prost(message, tag = "2")]
        ByName(super::ObjectReferenceByName),
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct FrameReference {
    #[prost(oneof = "frame_reference::Reference", tags = "1, 2")]
    pub reference: Option<frame_reference::Reference>,
}

pub mod frame_reference {
    #[derive(Clone, PartialEq, Eq, ::prost::Oneof)]
    pub enum Reference {
        #[prost(string, tag = "1")]
        Id(String),
        #[prost(message, tag = "2")]
        ByName(super::FrameReferenceByName),
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct TransformNodeReference {
    #[prost(oneof = "transform_node_reference::Reference", tags = "1, 2, 3")]
    pub reference: Option<transform_node_reference::Reference>,
}

pub mod transform_node_reference {
    #[derive(Clone, PartialEq, Eq, ::prost::Oneof)]
    pub enum Reference {
        #[prost(string, tag = "1")]
        Id(String),
        #[prost(message, tag = "2")]
        ByObject(super::ObjectReferenceByName),
        #[prost(message, tag = "3")]
        ByFrame(super::FrameReferenceByName),
    }
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ObjectOrEntityReference {
    #[prost(oneof = "object_or_entity_reference::Reference", tags = "1, 2")]
    pub reference: Option<object_or_entity_reference::Reference>,
}

pub mod object_or_entity_reference {
    #[derive(Clone, PartialEq, Eq, ::prost::Oneof)]
    pub enum Reference {
        #[prost(message, tag = "1")]
        Object(super::ObjectReference),
        #[prost(string, tag = "2")]
        EntityId(String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CollisionSettings {
    #[prost(bool, tag = "1")]
    pub disable_collision_checking: bool,
    #[prost(double, tag = "2")]
    pub minimum_margin: f64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RobotPayload {
    #[prost(double, tag = "1")]
    pub mass_kg: f64,
    #[prost(message, optional, tag = "2")]
    pub tip_t_cog: Option<Pose>,
    /// Row-major 3x3 inertia tensor.
    #[prost(double, repeated, tag = "3")]
    pub inertia: Vec<f64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JointVec {
    #[prost(double, repeated, tag = "1")]
    pub joints: Vec<f64>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct PoseEstimatorId {
    #[prost(string, tag = "1")]
    pub package: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CartesianMotionTarget {
    #[prost(message, optional, tag = "1")]
    pub tool: Option<TransformNodeReference>,
    #[prost(message, optional, tag = "2")]
    pub frame: Option<TransformNodeReference>,
    #[prost(message, optional, tag = "3")]
    pub goal: Option<Pose>,
}

/// Descriptors of every message in this module, one file per package, in
/// dependency order.
pub fn file_descriptors() -> Vec<FileDescriptorProto> {
    let point = || {
        message(
            "Point",
            vec![
                field("x", 1, Type::Double),
                field("y", 2, Type::Double),
                field("z", 3, Type::Double),
            ],
        )
    };
    let quaternion = || {
        message(
            "Quaternion",
            vec![
                field("x", 1, Type::Double),
                field("y", 2, Type::Double),
                field("z", 3, Type::Double),
                field("w", 4, Type::Double),
            ],
        )
    };
    let pose = |package: &str| {
        message(
            "Pose",
            vec![
                message_field("position", 1, &format!("{}.Point", package)),
                message_field("orientation", 2, &format!("{}.Quaternion", package)),
            ],
        )
    };
    let by_name = "workcell_proto.world.ObjectReferenceByName";
    let frame_by_name = "workcell_proto.world.FrameReferenceByName";
    vec![
        file(
            "workcell_proto/geometry.proto",
            "workcell_proto",
            vec![point(), quaternion(), pose("workcell_proto")],
            &[],
        ),
        file(
            "geometry_msgs/pose.proto",
            "geometry_msgs",
            vec![point(), quaternion(), pose("geometry_msgs")],
            &[],
        ),
        file(
            FILE_NAME,
            "workcell_proto.world",
            vec![
                message("ObjectReferenceByName", vec![field("object_name", 1, Type::String)]),
                message(
                    "FrameReferenceByName",
                    vec![
                        field("object_name", 1, Type::String),
                        field("frame_name", 2, Type::String),
                    ],
                ),
                with_oneof(
                    message(
                        "ObjectReference",
                        vec![
                            in_oneof(field("id", 1, Type::String), 0),
                            in_oneof(message_field("by_name", 2, by_name), 0),
                        ],
                    ),
                    "reference",
                ),
                with_oneof(
                    message(
                        "FrameReference",
                        vec![
                            in_oneof(field("id", 1, Type::String), 0),
                            in_oneof(message_field("by_name", 2, frame_by_name), 0),
                        ],
                    ),
                    "reference",
                ),
                with_oneof(
                    message(
                        "TransformNodeReference",
                        vec![
                            in_oneof(field("id", 1, Type::String), 0),
                            in_oneof(message_field("by_object", 2, by_name), 0),
                            in_oneof(message_field("by_frame", 3, frame_by_name), 0),
                        ],
                    ),
                    "reference",
                ),
                with_oneof(
                    message(
                        "ObjectOrEntityReference",
                        vec![
                            in_oneof(message_field("object", 1, OBJECT_REFERENCE_NAME), 0),
                            in_oneof(field("entity_id", 2, Type::String), 0),
                        ],
                    ),
                    "reference",
                ),
                message(
                    "CollisionSettings",
                    vec![
                        field("disable_collision_checking", 1, Type::Bool),
                        field("minimum_margin", 2, Type::Double),
                    ],
                ),
                message(
                    "RobotPayload",
                    vec![
                        field("mass_kg", 1, Type::Double),
                        message_field("tip_t_cog", 2, POSE_NAME),
                        repeated(field("inertia", 3, Type::Double)),
                    ],
                ),
            ],
            &["workcell_proto/geometry.proto"],
        ),
        file(
            "workcell_proto/icon/joint_space.proto",
            "workcell_proto.icon",
            vec![message("JointVec", vec![repeated(field("joints", 1, Type::Double))])],
            &[],
        ),
        file(
            "workcell_proto/perception/pose_estimator_id.proto",
            "workcell_proto.perception",
            vec![message(
                "PoseEstimatorId",
                vec![field("package", 1, Type::String), field("name", 2, Type::String)],
            )],
            &[],
        ),
        file(
            "workcell_proto/motion/cartesian_motion_target.proto",
            "workcell_proto.motion",
            vec![message(
                "CartesianMotionTarget",
                vec![
                    message_field("tool", 1, TRANSFORM_NODE_REFERENCE_NAME),
                    message_field("frame", 2, TRANSFORM_NODE_REFERENCE_NAME),
                    message_field("goal", 3, POSE_NAME),
                ],
            )],
            &[FILE_NAME, "workcell_proto/geometry.proto"],
        ),
    ]
}
