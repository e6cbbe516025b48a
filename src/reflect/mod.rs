//! Runtime protobuf reflection: hermetic type registries and dynamic messages

pub mod builder;
pub mod dynamic;
pub mod registry;

pub use dynamic::{check_field_value, DynamicMessage, MapKey, Value};
pub use registry::{
    Cardinality, EnumType, EnumValue, FieldDescriptor, FieldKind, MessageType, ScalarKind,
    TypeRegistry,
};
