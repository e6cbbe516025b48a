//! Skill descriptions shared by the unit tests of this module

use std::collections::BTreeMap;

use prost_types::field_descriptor_proto::Type;
use prost_types::{Any, FileDescriptorProto, FileDescriptorSet};

use crate::proto::skills::{ParameterDescription, ResourceSelector, ReturnValueDescription, Skill};
use crate::proto::world;
use crate::reflect::builder::*;

pub(crate) fn descriptor_set(mut files: Vec<FileDescriptorProto>) -> FileDescriptorSet {
    let mut all = world::file_descriptors();
    all.append(&mut files);
    FileDescriptorSet { file: all }
}

/// `demo.pick.PickParams` / `demo.pick.PickResult`.
pub(crate) fn pick_files() -> Vec<FileDescriptorProto> {
    let options = message(
        "Options",
        vec![
            field("verbose", 1, Type::Bool),
            enum_field("mode", 2, "demo.pick.Mode"),
            enum_field("speed", 3, "demo.pick.Speed"),
        ],
    );
    let params = with_nested_enum(
        with_oneof(
            with_oneof(
                message(
                    "PickParams",
                    vec![
                        field("speed", 1, Type::Double),
                        message_field("target", 2, world::POSE_NAME),
                        enum_field("grasp", 3, "demo.pick.PickParams.Grasp"),
                        repeated(message_field("waypoints", 4, world::POSE_NAME)),
                        field("tool", 5, Type::String),
                        message_field("timeout", 7, "google.protobuf.Duration"),
                        in_oneof(field("approach_distance", 8, Type::Double), 0),
                        in_oneof(field("approach_frame", 9, Type::String), 0),
                        message_field("object", 10, world::OBJECT_REFERENCE_NAME),
                        proto3_optional(field("retries", 11, Type::Int32), 1),
                        message_field("options", 12, "demo.pick.Options"),
                        field("count", 13, Type::Int32),
                    ],
                ),
                "approach",
            ),
            "_retries",
        ),
        enumeration("Grasp", &[("GRASP_UNSPECIFIED", 0), ("TOP", 1), ("SIDE", 2)]),
    );
    let params = with_map(
        params,
        "labels",
        6,
        field("key", 1, Type::String),
        field("value", 2, Type::Int32),
    );
    let result = message(
        "PickResult",
        vec![
            repeated(message_field("poses", 1, world::POSE_NAME)),
            field("count", 2, Type::Int32),
        ],
    );
    vec![with_enums(
        file(
            "demo/pick.proto",
            "demo.pick",
            vec![options, params, result],
            &[
                "workcell_proto/geometry.proto",
                world::FILE_NAME,
                "google/protobuf/duration.proto",
            ],
        ),
        vec![
            enumeration("Mode", &[("MODE_UNSPECIFIED", 0), ("FAST", 1), ("SAFE", 2)]),
            enumeration("Speed", &[("SPEED_UNSPECIFIED", 0), ("FAST", 1)]),
        ],
    )]
}

/// `demo.pick.pick` with `speed = 0.5` as its only default and a `robot`
/// resource slot.
pub(crate) fn pick_skill() -> Skill {
    let mut default_value = Vec::new();
    prost::encoding::double::encode(1, &0.5, &mut default_value);
    let set = descriptor_set(pick_files());
    Skill {
        id: "demo.pick.pick".to_string(),
        id_version: "demo.pick.pick.1.2.0".to_string(),
        skill_name: "pick".to_string(),
        package_name: "demo.pick".to_string(),
        description: "Picks an object.".to_string(),
        parameter_description: Some(ParameterDescription {
            parameter_message_full_name: "demo.pick.PickParams".to_string(),
            default_value: Some(Any {
                type_url: "type.googleapis.com/demo.pick.PickParams".to_string(),
                value: default_value,
            }),
            parameter_descriptor_fileset: Some(set.clone()),
            parameter_field_comments: BTreeMap::from([(
                "demo.pick.PickParams.speed".to_string(),
                "Fraction of the maximum speed.".to_string(),
            )]),
        }),
        return_value_description: Some(ReturnValueDescription {
            return_value_message_full_name: "demo.pick.PickResult".to_string(),
            descriptor_fileset: Some(set),
            return_value_field_comments: BTreeMap::new(),
        }),
        resource_selectors: BTreeMap::from([(
            "robot".to_string(),
            ResourceSelector {
                capability_names: vec!["arm".to_string()],
            },
        )]),
        ..Default::default()
    }
}

/// Skill whose parameter message is `<package>.Params` with the given scalar
/// fields; no return value.
pub(crate) fn simple_skill(id: &str, package: &str, fields: &[(&str, Type)]) -> Skill {
    let params = message(
        "Params",
        fields
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| field(name, i as i32 + 1, *ty))
            .collect(),
    );
    let proto_file = file(&format!("{}/params.proto", package.replace('.', "/")), package, vec![params], &[]);
    Skill {
        id: id.to_string(),
        id_version: format!("{}.0.1.0", id),
        package_name: package.to_string(),
        parameter_description: Some(ParameterDescription {
            parameter_message_full_name: format!("{}.Params", package),
            parameter_descriptor_fileset: Some(FileDescriptorSet {
                file: vec![proto_file],
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
