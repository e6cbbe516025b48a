//! Geometry and world types accepted wherever a skill declares the matching
//! message
//!
//! The conversion table is fixed: a value converts only into the message
//! names listed in [`accepted_inputs`]. Target messages are resolved in the
//! skill's own registry and filled by field name, so any skill that ships a
//! compatible definition of e.g. `workcell_proto.Pose` accepts a [`Pose3`].

use std::ops::Mul;
use std::sync::Arc;
use std::time::Duration;

use glam::{DMat3, DQuat, DVec3};

use crate::proto::world::{
    CARTESIAN_MOTION_TARGET_NAME, COLLISION_SETTINGS_NAME, FRAME_REFERENCE_NAME, JOINT_VEC_NAME,
    OBJECT_OR_ENTITY_REFERENCE_NAME, OBJECT_REFERENCE_NAME, POSE_ESTIMATOR_ID_NAME, POSE_NAME,
    ROBOT_PAYLOAD_NAME, ROS_POSE_NAME, TRANSFORM_NODE_REFERENCE_NAME,
};
use crate::reflect::{DynamicMessage, FieldKind, MessageType, TypeRegistry, Value};
use crate::{Result, WorkcellError};

pub const DURATION_NAME: &str = "google.protobuf.Duration";

/// Rigid transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose3 {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Default for Pose3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose3 {
    pub const IDENTITY: Pose3 = Pose3 {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(translation, DQuat::IDENTITY)
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self::new(DVec3::ZERO, rotation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self::new(rotation * -self.translation, rotation)
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    pub fn rotation_matrix(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }
}

impl Mul for Pose3 {
    type Output = Pose3;

    /// `a * b` maps points from b's frame through a.
    fn mul(self, rhs: Pose3) -> Pose3 {
        Pose3::new(
            self.rotation * rhs.translation + self.translation,
            (self.rotation * rhs.rotation).normalize(),
        )
    }
}

/// Object in the world, referenced by name or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldObject {
    pub name: String,
    pub id: Option<String>,
}

impl WorldObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn frame(&self, frame_name: impl Into<String>) -> ObjectFrame {
        ObjectFrame {
            object_name: self.name.clone(),
            frame_name: frame_name.into(),
            id: None,
        }
    }
}

/// Frame attached to a world object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectFrame {
    pub object_name: String,
    pub frame_name: String,
    pub id: Option<String>,
}

impl ObjectFrame {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Either an object or a frame; both are nodes of the transform tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformNode {
    Object(WorldObject),
    Frame(ObjectFrame),
}

impl From<WorldObject> for TransformNode {
    fn from(object: WorldObject) -> Self {
        TransformNode::Object(object)
    }
}

impl From<ObjectFrame> for TransformNode {
    fn from(frame: ObjectFrame) -> Self {
        TransformNode::Frame(frame)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointConfiguration(pub Vec<f64>);

#[derive(Debug, Clone, PartialEq)]
pub struct RobotPayload {
    pub mass_kg: f64,
    /// Center of gravity relative to the tip.
    pub tip_t_cog: Pose3,
    pub inertia: DMat3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseEstimator {
    pub package: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionSettings {
    pub disable_collision_checking: bool,
    pub minimum_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectOrEntity {
    Object(WorldObject),
    Entity(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartesianTarget {
    pub tool: TransformNode,
    pub frame: TransformNode,
    pub goal: Pose3,
}

/// A value that converts into a declared message.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldArg {
    Pose(Pose3),
    Object(WorldObject),
    Frame(ObjectFrame),
    Joints(JointConfiguration),
    Payload(RobotPayload),
    PoseEstimator(PoseEstimator),
    Collision(CollisionSettings),
    ObjectOrEntity(ObjectOrEntity),
    CartesianTarget(CartesianTarget),
}

impl WorldArg {
    pub fn kind_name(&self) -> &'static str {
        match self {
            WorldArg::Pose(_) => "Pose3",
            WorldArg::Object(_) => "WorldObject",
            WorldArg::Frame(_) => "ObjectFrame",
            WorldArg::Joints(_) => "JointConfiguration",
            WorldArg::Payload(_) => "RobotPayload",
            WorldArg::PoseEstimator(_) => "PoseEstimator",
            WorldArg::Collision(_) => "CollisionSettings",
            WorldArg::ObjectOrEntity(_) => "ObjectOrEntity",
            WorldArg::CartesianTarget(_) => "CartesianTarget",
        }
    }
}

/// Names of the Rust types accepted for `message_name` besides its wrapper.
pub fn accepted_inputs(message_name: &str) -> &'static [&'static str] {
    match message_name {
        POSE_NAME | ROS_POSE_NAME => &["Pose3"],
        OBJECT_REFERENCE_NAME => &["WorldObject"],
        FRAME_REFERENCE_NAME => &["ObjectFrame"],
        TRANSFORM_NODE_REFERENCE_NAME => &["WorldObject", "ObjectFrame"],
        OBJECT_OR_ENTITY_REFERENCE_NAME => &["WorldObject", "ObjectOrEntity"],
        JOINT_VEC_NAME => &["JointConfiguration"],
        ROBOT_PAYLOAD_NAME => &["RobotPayload"],
        POSE_ESTIMATOR_ID_NAME => &["PoseEstimator"],
        COLLISION_SETTINGS_NAME => &["CollisionSettings"],
        CARTESIAN_MOTION_TARGET_NAME => &["CartesianTarget"],
        DURATION_NAME => &["Duration", "i64", "f64"],
        _ => &[],
    }
}

/// Builds a `target` message from `value`. Returns `None` when the pair is
/// not in the conversion table.
pub fn convert(
    value: &WorldArg,
    target: &Arc<MessageType>,
    registry: &TypeRegistry,
) -> Result<Option<DynamicMessage>> {
    let message = match (value, target.full_name.as_str()) {
        (WorldArg::Pose(pose), POSE_NAME | ROS_POSE_NAME) => pose_message(registry, target, pose)?,
        (WorldArg::Object(object), OBJECT_REFERENCE_NAME) => {
            object_reference(registry, target, object)?
        }
        (WorldArg::Object(object), TRANSFORM_NODE_REFERENCE_NAME) => {
            transform_node(registry, target, &TransformNode::Object(object.clone()))?
        }
        (WorldArg::Object(object), OBJECT_OR_ENTITY_REFERENCE_NAME) => {
            object_or_entity(registry, target, &ObjectOrEntity::Object(object.clone()))?
        }
        (WorldArg::Frame(frame), FRAME_REFERENCE_NAME) => frame_reference(registry, target, frame)?,
        (WorldArg::Frame(frame), TRANSFORM_NODE_REFERENCE_NAME) => {
            transform_node(registry, target, &TransformNode::Frame(frame.clone()))?
        }
        (WorldArg::Joints(joints), JOINT_VEC_NAME) => {
            let mut message = DynamicMessage::new(target.clone());
            message.set(
                "joints",
                Value::List(joints.0.iter().copied().map(Value::F64).collect()),
            )?;
            message
        }
        (WorldArg::Payload(payload), ROBOT_PAYLOAD_NAME) => {
            let mut message = DynamicMessage::new(target.clone());
            message.set("mass_kg", Value::F64(payload.mass_kg))?;
            let cog_type = child_type(registry, target, "tip_t_cog")?;
            message.set(
                "tip_t_cog",
                Value::Message(pose_message(registry, &cog_type, &payload.tip_t_cog)?),
            )?;
            let inertia = row_major(&payload.inertia).into_iter().map(Value::F64).collect();
            message.set("inertia", Value::List(inertia))?;
            message
        }
        (WorldArg::PoseEstimator(estimator), POSE_ESTIMATOR_ID_NAME) => {
            let mut message = DynamicMessage::new(target.clone());
            message.set("package", Value::String(estimator.package.clone()))?;
            message.set("name", Value::String(estimator.name.clone()))?;
            message
        }
        (WorldArg::Collision(settings), COLLISION_SETTINGS_NAME) => {
            let mut message = DynamicMessage::new(target.clone());
            message.set(
                "disable_collision_checking",
                Value::Bool(settings.disable_collision_checking),
            )?;
            message.set("minimum_margin", Value::F64(settings.minimum_margin))?;
            message
        }
        (WorldArg::ObjectOrEntity(reference), OBJECT_OR_ENTITY_REFERENCE_NAME) => {
            object_or_entity(registry, target, reference)?
        }
        (WorldArg::CartesianTarget(goal), CARTESIAN_MOTION_TARGET_NAME) => {
            let mut message = DynamicMessage::new(target.clone());
            let tool_type = child_type(registry, target, "tool")?;
            message.set("tool", Value::Message(transform_node(registry, &tool_type, &goal.tool)?))?;
            let frame_type = child_type(registry, target, "frame")?;
            message.set(
                "frame",
                Value::Message(transform_node(registry, &frame_type, &goal.frame)?),
            )?;
            let goal_type = child_type(registry, target, "goal")?;
            message.set("goal", Value::Message(pose_message(registry, &goal_type, &goal.goal)?))?;
            message
        }
        _ => return Ok(None),
    };
    Ok(Some(message))
}

/// Splits fractional seconds into whole seconds and nanos of the same sign.
pub fn split_seconds(seconds: f64) -> (i64, i32) {
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round() as i32;
    (whole as i64, nanos)
}

pub fn duration_message(target: &Arc<MessageType>, seconds: i64, nanos: i32) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(target.clone());
    message.set("seconds", Value::I64(seconds))?;
    message.set("nanos", Value::I32(nanos))?;
    Ok(message)
}

pub fn std_duration_message(target: &Arc<MessageType>, duration: Duration) -> Result<DynamicMessage> {
    let seconds = i64::try_from(duration.as_secs()).map_err(|_| {
        WorkcellError::InvalidArgument(format!("duration {:?} is out of range", duration))
    })?;
    duration_message(target, seconds, duration.subsec_nanos() as i32)
}

fn child_type(registry: &TypeRegistry, parent: &MessageType, field: &str) -> Result<Arc<MessageType>> {
    let descriptor = parent.field(field).ok_or_else(|| {
        WorkcellError::Descriptor(format!(
            "message '{}' has no field '{}'",
            parent.full_name, field
        ))
    })?;
    match &descriptor.kind {
        FieldKind::Message(name) => registry.message(name).ok_or_else(|| {
            WorkcellError::Descriptor(format!("unknown message type '{}'", name))
        }),
        other => Err(WorkcellError::Descriptor(format!(
            "field '{}' of '{}' is {}, not a message",
            field, parent.full_name, other
        ))),
    }
}

fn child(registry: &TypeRegistry, parent: &MessageType, field: &str) -> Result<DynamicMessage> {
    child_type(registry, parent, field).map(DynamicMessage::new)
}

fn pose_message(registry: &TypeRegistry, target: &Arc<MessageType>, pose: &Pose3) -> Result<DynamicMessage> {
    let mut position = child(registry, target, "position")?;
    position.set("x", Value::F64(pose.translation.x))?;
    position.set("y", Value::F64(pose.translation.y))?;
    position.set("z", Value::F64(pose.translation.z))?;

    let rotation = pose.rotation.normalize();
    let mut orientation = child(registry, target, "orientation")?;
    orientation.set("x", Value::F64(rotation.x))?;
    orientation.set("y", Value::F64(rotation.y))?;
    orientation.set("z", Value::F64(rotation.z))?;
    orientation.set("w", Value::F64(rotation.w))?;

    let mut message = DynamicMessage::new(target.clone());
    message.set("position", Value::Message(position))?;
    message.set("orientation", Value::Message(orientation))?;
    Ok(message)
}

fn object_reference(
    registry: &TypeRegistry,
    target: &Arc<MessageType>,
    object: &WorldObject,
) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(target.clone());
    match &object.id {
        Some(id) => message.set("id", Value::String(id.clone()))?,
        None => {
            let mut by_name = child(registry, target, "by_name")?;
            by_name.set("object_name", Value::String(object.name.clone()))?;
            message.set("by_name", Value::Message(by_name))?;
        }
    }
    Ok(message)
}

fn frame_reference(
    registry: &TypeRegistry,
    target: &Arc<MessageType>,
    frame: &ObjectFrame,
) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(target.clone());
    match &frame.id {
        Some(id) => message.set("id", Value::String(id.clone()))?,
        None => {
            let mut by_name = child(registry, target, "by_name")?;
            by_name.set("object_name", Value::String(frame.object_name.clone()))?;
            by_name.set("frame_name", Value::String(frame.frame_name.clone()))?;
            message.set("by_name", Value::Message(by_name))?;
        }
    }
    Ok(message)
}

fn transform_node(
    registry: &TypeRegistry,
    target: &Arc<MessageType>,
    node: &TransformNode,
) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(target.clone());
    match node {
        TransformNode::Object(WorldObject { id: Some(id), .. })
        | TransformNode::Frame(ObjectFrame { id: Some(id), .. }) => {
            message.set("id", Value::String(id.clone()))?
        }
        TransformNode::Object(object) => {
            let mut by_object = child(registry, target, "by_object")?;
            by_object.set("object_name", Value::String(object.name.clone()))?;
            message.set("by_object", Value::Message(by_object))?;
        }
        TransformNode::Frame(frame) => {
            let mut by_frame = child(registry, target, "by_frame")?;
            by_frame.set("object_name", Value::String(frame.object_name.clone()))?;
            by_frame.set("frame_name", Value::String(frame.frame_name.clone()))?;
            message.set("by_frame", Value::Message(by_frame))?;
        }
    }
    Ok(message)
}

fn object_or_entity(
    registry: &TypeRegistry,
    target: &Arc<MessageType>,
    reference: &ObjectOrEntity,
) -> Result<DynamicMessage> {
    let mut message = DynamicMessage::new(target.clone());
    match reference {
        ObjectOrEntity::Object(object) => {
            let object_type = child_type(registry, target, "object")?;
            message.set(
                "object",
                Value::Message(object_reference(registry, &object_type, object)?),
            )?;
        }
        ObjectOrEntity::Entity(id) => message.set("entity_id", Value::String(id.clone()))?,
    }
    Ok(message)
}

fn row_major(matrix: &DMat3) -> [f64; 9] {
    matrix.transpose().to_cols_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::world;
    use prost::Message;
    use prost_types::FileDescriptorSet;

    fn world_registry() -> Arc<TypeRegistry> {
        let set = FileDescriptorSet {
            file: world::file_descriptors(),
        };
        TypeRegistry::from_file_descriptor_sets([&set]).unwrap()
    }

    fn decode<M: Message + Default>(message: &DynamicMessage) -> M {
        M::decode(message.encode_to_vec().as_slice()).unwrap()
    }

    #[test]
    fn test_pose_converts_to_both_dialects() {
        let registry = world_registry();
        let pose = Pose3::new(DVec3::new(1.0, 2.0, 3.0), DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        for name in [POSE_NAME, ROS_POSE_NAME] {
            let target = registry.message(name).unwrap();
            let message = convert(&WorldArg::Pose(pose), &target, &registry).unwrap().unwrap();
            let wire: world::Pose = decode(&message);
            let position = wire.position.unwrap();
            assert_eq!((position.x, position.y, position.z), (1.0, 2.0, 3.0));
            let orientation = wire.orientation.unwrap();
            assert!((orientation.z - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
            assert!((orientation.w - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_object_and_frame_references() {
        let registry = world_registry();
        let table = WorldObject::new("table");

        let target = registry.message(TRANSFORM_NODE_REFERENCE_NAME).unwrap();
        let by_frame = convert(&WorldArg::Frame(table.frame("top")), &target, &registry)
            .unwrap()
            .unwrap();
        let wire: world::TransformNodeReference = decode(&by_frame);
        match wire.reference.unwrap() {
            world::transform_node_reference::Reference::ByFrame(frame) => {
                assert_eq!(frame.object_name, "table");
                assert_eq!(frame.frame_name, "top");
            }
            other => panic!("unexpected reference {:?}", other),
        }

        let target = registry.message(OBJECT_REFERENCE_NAME).unwrap();
        let by_id = convert(
            &WorldArg::Object(table.clone().with_id("obj-7")),
            &target,
            &registry,
        )
        .unwrap()
        .unwrap();
        let wire: world::ObjectReference = decode(&by_id);
        assert_eq!(
            wire.reference,
            Some(world::object_reference::Reference::Id("obj-7".to_string()))
        );
    }

    #[test]
    fn test_payload_inertia_is_row_major() {
        let registry = world_registry();
        let target = registry.message(ROBOT_PAYLOAD_NAME).unwrap();
        let payload = RobotPayload {
            mass_kg: 2.5,
            tip_t_cog: Pose3::from_translation(DVec3::new(0.0, 0.0, 0.1)),
            inertia: DMat3::from_cols_array_2d(&[[1.0, 4.0, 7.0], [2.0, 5.0, 8.0], [3.0, 6.0, 9.0]]),
        };
        let message = convert(&WorldArg::Payload(payload), &target, &registry)
            .unwrap()
            .unwrap();
        let wire: world::RobotPayload = decode(&message);
        assert_eq!(wire.mass_kg, 2.5);
        assert_eq!(wire.inertia, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(wire.tip_t_cog.unwrap().position.unwrap().z, 0.1);
    }

    #[test]
    fn test_unlisted_pairs_do_not_convert() {
        let registry = world_registry();
        let target = registry.message(JOINT_VEC_NAME).unwrap();
        let converted = convert(&WorldArg::Pose(Pose3::IDENTITY), &target, &registry).unwrap();
        assert!(converted.is_none());
    }

    #[test]
    fn test_split_seconds_keeps_sign() {
        assert_eq!(split_seconds(1.5), (1, 500_000_000));
        assert_eq!(split_seconds(-1.25), (-1, -250_000_000));
        assert_eq!(split_seconds(3.0), (3, 0));
    }

    #[test]
    fn test_pose_composition() {
        let a = Pose3::new(DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let b = Pose3::from_translation(DVec3::new(1.0, 0.0, 0.0));
        let point = (a * b).transform_point(DVec3::ZERO);
        assert!((point - DVec3::new(1.0, 1.0, 0.0)).length() < 1e-12);
        let identity = a * a.inverse();
        assert!(identity.translation.length() < 1e-12);
    }
}
