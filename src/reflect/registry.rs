//! Hermetic protobuf type registry
//!
//! Each skill owns one registry built from its own descriptor sets, so two
//! skills that ship different definitions under the same message name never
//! see each other's types.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, SourceCodeInfo,
};

use crate::{Result, WorkcellError};

pub const DURATION_NAME: &str = "google.protobuf.Duration";
pub const TIMESTAMP_NAME: &str = "google.protobuf.Timestamp";
pub const ANY_NAME: &str = "google.protobuf.Any";
pub const EMPTY_NAME: &str = "google.protobuf.Empty";

// Field numbers inside `DescriptorProto` / `FileDescriptorProto`, used to
// address comments in `SourceCodeInfo`.
const FILE_MESSAGE_TYPE: i32 = 4;
const FILE_ENUM_TYPE: i32 = 5;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;
const MESSAGE_ENUM_TYPE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Double,
    Float,
    Int64,
    UInt64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    UInt32,
    SFixed32,
    SFixed64,
    SInt32,
    SInt64,
}

impl ScalarKind {
    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            ScalarKind::Double
                | ScalarKind::Float
                | ScalarKind::Bool
                | ScalarKind::String
                | ScalarKind::Bytes
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Double | ScalarKind::Float)
    }

    /// Name of the Rust type the builder accepts for this scalar.
    pub fn rust_name(self) -> &'static str {
        match self {
            ScalarKind::Double => "f64",
            ScalarKind::Float => "f32",
            ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => "i64",
            ScalarKind::UInt64 | ScalarKind::Fixed64 => "u64",
            ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => "i32",
            ScalarKind::UInt32 | ScalarKind::Fixed32 => "u32",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "String",
            ScalarKind::Bytes => "Vec<u8>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// Full name of the message type, without leading dot.
    Message(String),
    /// Full name of the enum type, without leading dot.
    Enum(String),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(kind) => f.write_str(kind.rust_name()),
            FieldKind::Message(name) | FieldKind::Enum(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    /// Implicit presence (proto3 singular scalar) or singular message.
    Singular,
    /// Explicit presence (`optional`).
    Optional,
    Repeated,
    Map { key: ScalarKind, value: FieldKind },
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub full_name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    /// Name of the containing real oneof (synthetic proto3-optional oneofs excluded).
    pub oneof: Option<String>,
    pub comment: Option<String>,
}

impl FieldDescriptor {
    pub fn is_repeated(&self) -> bool {
        matches!(self.cardinality, Cardinality::Repeated)
    }

    pub fn is_map(&self) -> bool {
        matches!(self.cardinality, Cardinality::Map { .. })
    }

    /// Whether the field tracks presence explicitly.
    pub fn has_presence(&self) -> bool {
        match self.cardinality {
            Cardinality::Optional => true,
            Cardinality::Singular => {
                self.oneof.is_some() || matches!(self.kind, FieldKind::Message(_))
            }
            _ => false,
        }
    }

    /// Kind of a single element: the value kind for maps, the element kind for lists.
    pub fn element_kind(&self) -> &FieldKind {
        match &self.cardinality {
            Cardinality::Map { value, .. } => value,
            _ => &self.kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageType {
    pub full_name: String,
    pub name: String,
    pub package: String,
    pub file: String,
    pub fields: Vec<FieldDescriptor>,
    pub oneofs: Vec<String>,
    pub nested_messages: Vec<String>,
    pub nested_enums: Vec<String>,
    /// Containing message for nested types.
    pub parent: Option<String>,
    pub is_map_entry: bool,
    pub comment: Option<String>,
}

impl MessageType {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }

    /// Fields belonging to the real oneof `oneof`.
    pub fn oneof_fields<'a>(&'a self, oneof: &'a str) -> impl Iterator<Item = &'a FieldDescriptor> {
        self.fields
            .iter()
            .filter(move |f| f.oneof.as_deref() == Some(oneof))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub full_name: String,
    pub name: String,
    pub package: String,
    pub values: Vec<EnumValue>,
    pub parent: Option<String>,
    pub comment: Option<String>,
}

impl EnumType {
    pub fn value_by_name(&self, name: &str) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.name == name)
    }

    pub fn value_by_number(&self, number: i32) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.number == number)
    }
}

/// Immutable set of message and enum types loaded from descriptor sets.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    files: Vec<String>,
    messages: HashMap<String, Arc<MessageType>>,
    enums: HashMap<String, Arc<EnumType>>,
}

impl TypeRegistry {
    /// Build a registry from the union of `sets`. Files appearing more than
    /// once (by name) are loaded once. Well-known types missing from the sets
    /// are supplied from built-in descriptors.
    pub fn from_file_descriptor_sets<'a>(
        sets: impl IntoIterator<Item = &'a FileDescriptorSet>,
    ) -> Result<Arc<Self>> {
        let mut files: Vec<FileDescriptorProto> = Vec::new();
        let mut seen = BTreeSet::new();
        for set in sets {
            for file in &set.file {
                if seen.insert(file.name().to_string()) {
                    files.push(file.clone());
                }
            }
        }
        for builtin in well_known_files() {
            let referenced = files
                .iter()
                .any(|f| f.dependency.iter().any(|d| d == builtin.name()));
            if referenced && seen.insert(builtin.name().to_string()) {
                files.push(builtin);
            }
        }

        let mut registry = TypeRegistry::default();
        let mut pending: Vec<&FileDescriptorProto> = files.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut still_pending = Vec::new();
            for file in pending {
                let ready = file
                    .dependency
                    .iter()
                    .all(|dep| registry.files.iter().any(|f| f == dep));
                if ready {
                    registry.add_file(file)?;
                } else {
                    still_pending.push(file);
                }
            }
            if still_pending.len() == before {
                let file = still_pending[0];
                let missing = file
                    .dependency
                    .iter()
                    .find(|dep| !files.iter().any(|f| f.name() == dep.as_str()))
                    .cloned()
                    .unwrap_or_else(|| "<cyclic import>".to_string());
                return Err(WorkcellError::Descriptor(format!(
                    "failed to load file '{}': missing dependency '{}'",
                    file.name(),
                    missing
                )));
            }
            pending = still_pending;
        }
        registry.check_references()?;
        Ok(Arc::new(registry))
    }

    pub fn message(&self, full_name: &str) -> Option<Arc<MessageType>> {
        self.messages
            .get(full_name.trim_start_matches('.'))
            .cloned()
    }

    pub fn enum_type(&self, full_name: &str) -> Option<Arc<EnumType>> {
        self.enums.get(full_name.trim_start_matches('.')).cloned()
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn enum_names(&self) -> impl Iterator<Item = &str> {
        self.enums.keys().map(String::as_str)
    }

    fn add_file(&mut self, file: &FileDescriptorProto) -> Result<()> {
        let package = file.package().to_string();
        let info = file.source_code_info.as_ref();
        for (i, message) in file.message_type.iter().enumerate() {
            self.add_message(
                file,
                &package,
                None,
                message,
                vec![FILE_MESSAGE_TYPE, i as i32],
                info,
            )?;
        }
        for (i, enum_type) in file.enum_type.iter().enumerate() {
            self.add_enum(
                file,
                &package,
                None,
                enum_type,
                vec![FILE_ENUM_TYPE, i as i32],
                info,
            )?;
        }
        self.files.push(file.name().to_string());
        Ok(())
    }

    fn add_message(
        &mut self,
        file: &FileDescriptorProto,
        package: &str,
        parent: Option<&str>,
        message: &DescriptorProto,
        path: Vec<i32>,
        info: Option<&SourceCodeInfo>,
    ) -> Result<()> {
        let scope = parent.unwrap_or(package);
        let full_name = qualify(scope, message.name());
        if self.messages.contains_key(&full_name) || self.enums.contains_key(&full_name) {
            return Err(WorkcellError::Descriptor(format!(
                "failed to load file '{}': duplicate type '{}'",
                file.name(),
                full_name
            )));
        }

        let oneofs: Vec<String> = message
            .oneof_decl
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        let mut fields = Vec::with_capacity(message.field.len());
        for (i, field) in message.field.iter().enumerate() {
            let mut field_path = path.clone();
            field_path.extend([MESSAGE_FIELD, i as i32]);
            fields.push(self.build_field(file, &full_name, message, field, &oneofs, &field_path, info)?);
        }

        let mut nested_messages = Vec::new();
        for (i, nested) in message.nested_type.iter().enumerate() {
            let mut nested_path = path.clone();
            nested_path.extend([MESSAGE_NESTED_TYPE, i as i32]);
            nested_messages.push(qualify(&full_name, nested.name()));
            self.add_message(file, package, Some(&full_name), nested, nested_path, info)?;
        }
        let mut nested_enums = Vec::new();
        for (i, nested) in message.enum_type.iter().enumerate() {
            let mut nested_path = path.clone();
            nested_path.extend([MESSAGE_ENUM_TYPE, i as i32]);
            nested_enums.push(qualify(&full_name, nested.name()));
            self.add_enum(file, package, Some(&full_name), nested, nested_path, info)?;
        }

        let is_map_entry = message
            .options
            .as_ref()
            .map(|o| o.map_entry())
            .unwrap_or(false);

        let real_oneofs = oneofs
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !message.field.iter().any(|f| {
                    f.proto3_optional() && f.oneof_index == Some(*i as i32)
                })
            })
            .map(|(_, name)| name.clone())
            .collect();

        self.messages.insert(
            full_name.clone(),
            Arc::new(MessageType {
                name: message.name().to_string(),
                package: package.to_string(),
                file: file.name().to_string(),
                fields,
                oneofs: real_oneofs,
                nested_messages,
                nested_enums,
                parent: parent.map(str::to_string),
                is_map_entry,
                comment: comment_at(info, &path),
                full_name,
            }),
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_field(
        &self,
        file: &FileDescriptorProto,
        message_name: &str,
        message: &DescriptorProto,
        field: &FieldDescriptorProto,
        oneofs: &[String],
        path: &[i32],
        info: Option<&SourceCodeInfo>,
    ) -> Result<FieldDescriptor> {
        let kind = match field.r#type() {
            Type::Message | Type::Group => {
                FieldKind::Message(field.type_name().trim_start_matches('.').to_string())
            }
            Type::Enum => FieldKind::Enum(field.type_name().trim_start_matches('.').to_string()),
            other => FieldKind::Scalar(scalar_kind(other)),
        };

        let mut cardinality = match field.label() {
            Label::Repeated => Cardinality::Repeated,
            Label::Optional if field.proto3_optional() => Cardinality::Optional,
            // Only proto3 singular fields have implicit presence.
            Label::Optional if file.syntax() != "proto3" && field.oneof_index.is_none() => {
                Cardinality::Optional
            }
            _ => Cardinality::Singular,
        };

        // Map fields are repeated references to a nested `*Entry` message.
        if let (Cardinality::Repeated, FieldKind::Message(entry_name)) = (&cardinality, &kind) {
            let local = entry_name.rsplit('.').next().unwrap_or_default();
            if let Some(entry) = message.nested_type.iter().find(|n| {
                n.name() == local
                    && n.options.as_ref().map(|o| o.map_entry()).unwrap_or(false)
            }) {
                let key = entry.field.iter().find(|f| f.number() == 1);
                let value = entry.field.iter().find(|f| f.number() == 2);
                match (key, value) {
                    (Some(key), Some(value)) => {
                        let value_kind = match value.r#type() {
                            Type::Message | Type::Group => FieldKind::Message(
                                value.type_name().trim_start_matches('.').to_string(),
                            ),
                            Type::Enum => FieldKind::Enum(
                                value.type_name().trim_start_matches('.').to_string(),
                            ),
                            other => FieldKind::Scalar(scalar_kind(other)),
                        };
                        cardinality = Cardinality::Map {
                            key: scalar_kind(key.r#type()),
                            value: value_kind,
                        };
                    }
                    _ => {
                        return Err(WorkcellError::Descriptor(format!(
                            "failed to load file '{}': malformed map entry '{}'",
                            file.name(),
                            entry_name
                        )))
                    }
                }
            }
        }

        let oneof = field
            .oneof_index
            .filter(|_| !field.proto3_optional())
            .and_then(|i| oneofs.get(i as usize).cloned());

        Ok(FieldDescriptor {
            name: field.name().to_string(),
            full_name: qualify(message_name, field.name()),
            number: field.number() as u32,
            kind,
            cardinality,
            oneof,
            comment: comment_at(info, path),
        })
    }

    fn add_enum(
        &mut self,
        file: &FileDescriptorProto,
        package: &str,
        parent: Option<&str>,
        enum_type: &EnumDescriptorProto,
        path: Vec<i32>,
        info: Option<&SourceCodeInfo>,
    ) -> Result<()> {
        let full_name = qualify(parent.unwrap_or(package), enum_type.name());
        if self.messages.contains_key(&full_name) || self.enums.contains_key(&full_name) {
            return Err(WorkcellError::Descriptor(format!(
                "failed to load file '{}': duplicate type '{}'",
                file.name(),
                full_name
            )));
        }
        let values = enum_type
            .value
            .iter()
            .map(|v| EnumValue {
                name: v.name().to_string(),
                number: v.number(),
            })
            .collect();
        self.enums.insert(
            full_name.clone(),
            Arc::new(EnumType {
                name: enum_type.name().to_string(),
                package: package.to_string(),
                values,
                parent: parent.map(str::to_string),
                comment: comment_at(info, &path),
                full_name,
            }),
        );
        Ok(())
    }

    /// Every message/enum reference must resolve inside this registry.
    fn check_references(&self) -> Result<()> {
        for file in &self.files {
            let mut messages: Vec<&Arc<MessageType>> =
                self.messages.values().filter(|m| &m.file == file).collect();
            messages.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            for message in messages {
                for field in &message.fields {
                    for kind in [&field.kind, field.element_kind()] {
                        let resolved = match kind {
                            FieldKind::Message(name) => self.messages.contains_key(name),
                            FieldKind::Enum(name) => self.enums.contains_key(name),
                            FieldKind::Scalar(_) => true,
                        };
                        if !resolved {
                            return Err(WorkcellError::Descriptor(format!(
                                "failed to load file '{}': unresolved type '{}' of field '{}'",
                                file, kind, field.full_name
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn scalar_kind(ty: Type) -> ScalarKind {
    match ty {
        Type::Double => ScalarKind::Double,
        Type::Float => ScalarKind::Float,
        Type::Int64 => ScalarKind::Int64,
        Type::Uint64 => ScalarKind::UInt64,
        Type::Int32 => ScalarKind::Int32,
        Type::Fixed64 => ScalarKind::Fixed64,
        Type::Fixed32 => ScalarKind::Fixed32,
        Type::Bool => ScalarKind::Bool,
        Type::String => ScalarKind::String,
        Type::Bytes => ScalarKind::Bytes,
        Type::Uint32 => ScalarKind::UInt32,
        Type::Sfixed32 => ScalarKind::SFixed32,
        Type::Sfixed64 => ScalarKind::SFixed64,
        Type::Sint32 => ScalarKind::SInt32,
        Type::Sint64 => ScalarKind::SInt64,
        // Enum/message/group are handled by the caller.
        Type::Enum => ScalarKind::Int32,
        Type::Message | Type::Group => ScalarKind::Bytes,
    }
}

fn comment_at(info: Option<&SourceCodeInfo>, path: &[i32]) -> Option<String> {
    info?
        .location
        .iter()
        .find(|loc| loc.path == path)
        .and_then(|loc| loc.leading_comments.as_deref().or(loc.trailing_comments.as_deref()))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn scalar_field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn well_known_file(file: &str, message: DescriptorProto) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(file.to_string()),
        package: Some("google.protobuf".to_string()),
        message_type: vec![message],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

/// Descriptors of the well-known types the builders convert natively.
pub fn well_known_files() -> Vec<FileDescriptorProto> {
    vec![
        well_known_file(
            "google/protobuf/duration.proto",
            DescriptorProto {
                name: Some("Duration".to_string()),
                field: vec![
                    scalar_field("seconds", 1, Type::Int64),
                    scalar_field("nanos", 2, Type::Int32),
                ],
                ..Default::default()
            },
        ),
        well_known_file(
            "google/protobuf/timestamp.proto",
            DescriptorProto {
                name: Some("Timestamp".to_string()),
                field: vec![
                    scalar_field("seconds", 1, Type::Int64),
                    scalar_field("nanos", 2, Type::Int32),
                ],
                ..Default::default()
            },
        ),
        well_known_file(
            "google/protobuf/any.proto",
            DescriptorProto {
                name: Some("Any".to_string()),
                field: vec![
                    scalar_field("type_url", 1, Type::String),
                    scalar_field("value", 2, Type::Bytes),
                ],
                ..Default::default()
            },
        ),
        well_known_file(
            "google/protobuf/empty.proto",
            DescriptorProto {
                name: Some("Empty".to_string()),
                ..Default::default()
            },
        ),
    ]
}
