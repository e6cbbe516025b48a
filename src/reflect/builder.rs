//! Small constructors for descriptor protos
//!
//! Used for the built-in descriptor files and for assembling skill
//! descriptor sets in code.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MessageOptions, OneofDescriptorProto,
};

/// Singular scalar field.
pub fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Singular message field; `full_name` without the leading dot.
pub fn message_field(name: &str, number: i32, full_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(format!(".{}", full_name)),
        ..field(name, number, Type::Message)
    }
}

pub fn enum_field(name: &str, number: i32, full_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(format!(".{}", full_name)),
        ..field(name, number, Type::Enum)
    }
}

pub fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

pub fn in_oneof(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        oneof_index: Some(index),
        ..field
    }
}

/// proto3 `optional`: explicit presence through a synthetic oneof at `index`.
pub fn proto3_optional(field: FieldDescriptorProto, index: i32) -> FieldDescriptorProto {
    FieldDescriptorProto {
        proto3_optional: Some(true),
        oneof_index: Some(index),
        ..field
    }
}

pub fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

pub fn with_oneof(mut message: DescriptorProto, oneof: &str) -> DescriptorProto {
    message.oneof_decl.push(OneofDescriptorProto {
        name: Some(oneof.to_string()),
        ..Default::default()
    });
    message
}

pub fn with_nested(mut message: DescriptorProto, nested: DescriptorProto) -> DescriptorProto {
    message.nested_type.push(nested);
    message
}

pub fn with_nested_enum(mut message: DescriptorProto, nested: EnumDescriptorProto) -> DescriptorProto {
    message.enum_type.push(nested);
    message
}

/// Adds a `map<key, value>` field named `name` to `message`, including the
/// synthetic `<Name>Entry` nested type. `value` must be numbered 2.
pub fn with_map(
    mut message: DescriptorProto,
    name: &str,
    number: i32,
    key: FieldDescriptorProto,
    value: FieldDescriptorProto,
) -> DescriptorProto {
    let entry_name = format!("{}Entry", camel_case(name));
    let entry = DescriptorProto {
        name: Some(entry_name.clone()),
        field: vec![key, value],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    message.nested_type.push(entry);
    message.field.push(FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Repeated as i32),
        r#type: Some(Type::Message as i32),
        // Resolved relative to the containing message by `file`.
        type_name: Some(entry_name),
        json_name: Some(name.to_string()),
        ..Default::default()
    });
    message
}

pub fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(value, number)| EnumValueDescriptorProto {
                name: Some(value.to_string()),
                number: Some(*number),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// proto3 file in `package`. Map entry references added by [`with_map`] are
/// qualified here.
pub fn file(
    name: &str,
    package: &str,
    messages: Vec<DescriptorProto>,
    deps: &[&str],
) -> FileDescriptorProto {
    let messages = messages
        .into_iter()
        .map(|m| qualify_map_entries(m, package))
        .collect();
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        message_type: messages,
        dependency: deps.iter().map(|d| d.to_string()).collect(),
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

pub fn with_enums(mut file: FileDescriptorProto, enums: Vec<EnumDescriptorProto>) -> FileDescriptorProto {
    file.enum_type.extend(enums);
    file
}

fn qualify_map_entries(mut message: DescriptorProto, scope: &str) -> DescriptorProto {
    let full_name = if scope.is_empty() {
        message.name().to_string()
    } else {
        format!("{}.{}", scope, message.name())
    };
    for field in &mut message.field {
        if let Some(type_name) = &field.type_name {
            if !type_name.starts_with('.') {
                field.type_name = Some(format!(".{}.{}", full_name, type_name));
            }
        }
    }
    message.nested_type = message
        .nested_type
        .into_iter()
        .map(|nested| qualify_map_entries(nested, &full_name))
        .collect();
    message
}

fn camel_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_entry_is_qualified() {
        let params = with_map(
            message("Params", vec![]),
            "joint_limits",
            1,
            field("key", 1, Type::String),
            field("value", 2, Type::Double),
        );
        let file = file("demo.proto", "demo", vec![params], &[]);
        let params = &file.message_type[0];
        assert_eq!(params.nested_type[0].name(), "JointLimitsEntry");
        assert_eq!(params.field[0].type_name(), ".demo.Params.JointLimitsEntry");
    }
}
