//! Typed builders for skill parameter messages
//!
//! A [`MessageWrapper`] owns a [`DynamicMessage`] of one skill's registry and
//! fills it from [`Arg`]s. Arguments that only exist at execution time
//! (blackboard values and CEL expressions) are not written into the message;
//! they are recorded as parameter assignments keyed by the field path they
//! target.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use prost_types::Any;

use crate::blackboard::{BlackboardValue, CelExpression};
use crate::proto::behavior_call::ParameterAssignment;
use crate::reflect::{
    Cardinality, DynamicMessage, FieldDescriptor, FieldKind, MapKey, MessageType, ScalarKind,
    TypeRegistry, Value,
};
use crate::{Result, WorkcellError};

use super::convert::{self, WorldArg, DURATION_NAME};

/// A value of a generated enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConst {
    pub enum_name: String,
    pub name: String,
    pub number: i32,
}

impl fmt::Display for EnumConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.enum_name, self.name)
    }
}

/// Argument for a message field.
#[derive(Debug, Clone)]
pub enum Arg {
    /// Leaves the field unset (clears a default).
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Enum(EnumConst),
    Message(MessageWrapper),
    List(Vec<Arg>),
    Map(Vec<(MapKey, Arg)>),
    Duration(Duration),
    World(WorldArg),
    Blackboard(BlackboardValue),
    Cel(CelExpression),
}

impl Arg {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Arg::Bytes(bytes.into())
    }

    fn kind_name(&self) -> String {
        match self {
            Arg::Null => "null".to_string(),
            Arg::Bool(_) => "bool".to_string(),
            Arg::Int(_) => "integer".to_string(),
            Arg::UInt(_) => "unsigned integer".to_string(),
            Arg::Float(_) => "float".to_string(),
            Arg::String(_) => "string".to_string(),
            Arg::Bytes(_) => "bytes".to_string(),
            Arg::Enum(value) => format!("enum {}", value.enum_name),
            Arg::Message(wrapper) => format!("message {}", wrapper.full_name()),
            Arg::List(_) => "list".to_string(),
            Arg::Map(_) => "map".to_string(),
            Arg::Duration(_) => "Duration".to_string(),
            Arg::World(value) => value.kind_name().to_string(),
            Arg::Blackboard(_) => "blackboard value".to_string(),
            Arg::Cel(_) => "CEL expression".to_string(),
        }
    }
}

macro_rules! arg_from {
    ($($ty:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::$variant($conv(value))
                }
            }
        )*
    };
}

arg_from! {
    bool => Bool via std::convert::identity,
    i32 => Int via i64::from,
    i64 => Int via std::convert::identity,
    u32 => UInt via u64::from,
    u64 => UInt via std::convert::identity,
    f32 => Float via f64::from,
    f64 => Float via std::convert::identity,
    String => String via std::convert::identity,
    &str => String via str::to_string,
    EnumConst => Enum via std::convert::identity,
    MessageWrapper => Message via std::convert::identity,
    Duration => Duration via std::convert::identity,
    WorldArg => World via std::convert::identity,
    BlackboardValue => Blackboard via std::convert::identity,
    CelExpression => Cel via std::convert::identity,
    convert::Pose3 => World via WorldArg::Pose,
    convert::WorldObject => World via WorldArg::Object,
    convert::ObjectFrame => World via WorldArg::Frame,
    convert::JointConfiguration => World via WorldArg::Joints,
    convert::RobotPayload => World via WorldArg::Payload,
    convert::PoseEstimator => World via WorldArg::PoseEstimator,
    convert::CollisionSettings => World via WorldArg::Collision,
    convert::ObjectOrEntity => World via WorldArg::ObjectOrEntity,
    convert::CartesianTarget => World via WorldArg::CartesianTarget,
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::String(value.clone())
    }
}

impl From<&BlackboardValue> for Arg {
    fn from(value: &BlackboardValue) -> Self {
        Arg::Blackboard(value.clone())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Null)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<MapKey>, V: Into<Arg>> From<BTreeMap<K, V>> for Arg {
    fn from(entries: BTreeMap<K, V>) -> Self {
        Arg::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&str> for MapKey {
    fn from(key: &str) -> Self {
        MapKey::String(key.to_string())
    }
}

impl From<String> for MapKey {
    fn from(key: String) -> Self {
        MapKey::String(key)
    }
}

impl From<bool> for MapKey {
    fn from(key: bool) -> Self {
        MapKey::Bool(key)
    }
}

impl From<i32> for MapKey {
    fn from(key: i32) -> Self {
        MapKey::I32(key)
    }
}

impl From<i64> for MapKey {
    fn from(key: i64) -> Self {
        MapKey::I64(key)
    }
}

impl From<u32> for MapKey {
    fn from(key: u32) -> Self {
        MapKey::U32(key)
    }
}

impl From<u64> for MapKey {
    fn from(key: u64) -> Self {
        MapKey::U64(key)
    }
}

/// One keyword of a generated constructor, as shown by `signature()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub type_hint: String,
    pub required: bool,
    /// Rendered default, if the keyword is optional.
    pub default: Option<String>,
    pub comment: Option<String>,
}

impl fmt::Display for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.type_hint)?;
        if let Some(default) = &self.default {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

/// Builder for a message of a skill's registry.
#[derive(Debug, Clone)]
pub struct MessageWrapper {
    message: DynamicMessage,
    registry: Arc<TypeRegistry>,
    assignments: Vec<ParameterAssignment>,
    provided: BTreeSet<String>,
}

impl MessageWrapper {
    pub fn new(ty: Arc<MessageType>, registry: Arc<TypeRegistry>) -> Self {
        Self::from_message(DynamicMessage::new(ty), registry)
    }

    /// Starts from `message`, e.g. a skill's default parameters. Fields set
    /// in `message` do not count as provided.
    pub fn from_message(message: DynamicMessage, registry: Arc<TypeRegistry>) -> Self {
        Self {
            message,
            registry,
            assignments: Vec::new(),
            provided: BTreeSet::new(),
        }
    }

    pub fn full_name(&self) -> &str {
        self.message.full_name()
    }

    pub fn descriptor(&self) -> &Arc<MessageType> {
        self.message.descriptor()
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Sets field `name` from `arg`.
    ///
    /// Setting a field replaces earlier values and assignments for it.
    /// Setting two members of the same oneof is rejected.
    pub fn set(&mut self, name: &str, arg: impl Into<Arg>) -> Result<&mut Self> {
        let ty = self.message.descriptor().clone();
        let field = ty.field(name).ok_or_else(|| {
            WorkcellError::InvalidArgument(format!(
                "message '{}' has no field '{}'",
                ty.full_name, name
            ))
        })?;

        if let Some(oneof) = &field.oneof {
            let conflicting = self.provided.iter().find(|other| {
                other.as_str() != name
                    && ty.field(other).and_then(|f| f.oneof.as_ref()) == Some(oneof)
            });
            if let Some(other) = conflicting {
                return Err(WorkcellError::InvalidArgument(format!(
                    "fields '{}' and '{}' of oneof '{}.{}' cannot both be set",
                    other, name, ty.full_name, oneof
                )));
            }
        }

        let mut assignments = Vec::new();
        let value = convert_field(&self.registry, field, arg.into(), name, &mut assignments)?;

        self.assignments
            .retain(|a| !targets_field(&a.parameter_path, name));
        match value {
            Some(value) => self.message.set(name, value)?,
            None => {
                self.message.clear(name);
                if let Some(oneof) = &field.oneof {
                    for sibling in ty.oneof_fields(oneof) {
                        self.message.clear(&sibling.name);
                    }
                }
            }
        }
        self.assignments.extend(assignments);
        self.provided.insert(name.to_string());
        Ok(self)
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: &str, arg: impl Into<Arg>) -> Result<Self> {
        self.set(name, arg)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.message.get(name)
    }

    /// Whether `name` was set explicitly or through an assignment.
    pub fn is_provided(&self, name: &str) -> bool {
        self.provided.contains(name)
    }

    pub fn message(&self) -> &DynamicMessage {
        &self.message
    }

    /// Assignments recorded so far, paths relative to this message.
    pub fn assignments(&self) -> &[ParameterAssignment] {
        &self.assignments
    }

    pub fn to_any(&self, type_url_prefix: &str) -> Any {
        self.message.to_any(type_url_prefix)
    }

    pub fn into_parts(self) -> (DynamicMessage, Vec<ParameterAssignment>) {
        (self.message, self.assignments)
    }
}

/// Parameter paths are `field`, `field.child`, `field[i]` or `field[i].child`.
fn targets_field(path: &str, field: &str) -> bool {
    match path.strip_prefix(field) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

fn assignment(path: &str, cel_expression: String) -> ParameterAssignment {
    ParameterAssignment {
        parameter_path: path.to_string(),
        cel_expression,
    }
}

fn mismatch(path: &str, expected: impl fmt::Display, arg: &Arg) -> WorkcellError {
    WorkcellError::TypeMismatch(format!(
        "field '{}' expects {}, got {}",
        path,
        expected,
        arg.kind_name()
    ))
}

/// Converts `arg` for the whole of `field`. `None` means the field stays
/// unset, either because the argument is null or because it became an
/// assignment.
fn convert_field(
    registry: &TypeRegistry,
    field: &FieldDescriptor,
    arg: Arg,
    path: &str,
    assignments: &mut Vec<ParameterAssignment>,
) -> Result<Option<Value>> {
    match arg {
        Arg::Null => return Ok(None),
        Arg::Cel(expression) => {
            assignments.push(assignment(path, expression.0));
            return Ok(None);
        }
        Arg::Blackboard(value) => {
            check_assignable(field, &value, path)?;
            assignments.push(assignment(path, value.value_access_path()));
            return Ok(None);
        }
        _ => {}
    }

    match &field.cardinality {
        Cardinality::Repeated => match arg {
            Arg::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let item_path = format!("{}[{}]", path, i);
                    values.push(convert_element(registry, &field.kind, item, &item_path, assignments)?);
                }
                Ok(Some(Value::List(values)))
            }
            other => Err(mismatch(path, format!("a list of {}", field.kind), &other)),
        },
        Cardinality::Map { key, value } => match arg {
            Arg::Map(entries) => {
                let mut values = BTreeMap::new();
                for (k, v) in entries {
                    let k = convert_key(*key, k, path)?;
                    let entry_path = format!("{}[{}]", path, k);
                    let v = convert_element(registry, value, v, &entry_path, assignments)?;
                    values.insert(k, v);
                }
                Ok(Some(Value::Map(values)))
            }
            other => Err(mismatch(
                path,
                format!("a map of {} to {}", key.rust_name(), value),
                &other,
            )),
        },
        Cardinality::Singular | Cardinality::Optional => {
            convert_element(registry, &field.kind, arg, path, assignments).map(Some)
        }
    }
}

fn check_assignable(field: &FieldDescriptor, value: &BlackboardValue, path: &str) -> Result<()> {
    let value_type = value.value_type();
    if !value_type.is_known() {
        return Ok(());
    }
    let ok = match field.cardinality {
        Cardinality::Repeated => value_type.is_list(),
        Cardinality::Map { .. } => value_type.is_map(),
        Cardinality::Singular | Cardinality::Optional => {
            !value_type.is_list() && !value_type.is_map()
        }
    };
    if ok {
        Ok(())
    } else {
        let expected = match field.cardinality {
            Cardinality::Repeated => "a sequence-valued expression",
            Cardinality::Map { .. } => "a map-valued expression",
            _ => "a single value",
        };
        Err(WorkcellError::TypeMismatch(format!(
            "field '{}' expects {}, but '{}' is {}",
            path,
            expected,
            value.value_access_path(),
            value_type.name()
        )))
    }
}

/// Converts one element: a singular field's value, a list item or a map value.
fn convert_element(
    registry: &TypeRegistry,
    kind: &FieldKind,
    arg: Arg,
    path: &str,
    assignments: &mut Vec<ParameterAssignment>,
) -> Result<Value> {
    match arg {
        Arg::Blackboard(value) => {
            if value.value_type().is_list() || value.value_type().is_map() {
                return Err(WorkcellError::TypeMismatch(format!(
                    "field '{}' expects a single value, but '{}' is {}",
                    path,
                    value.value_access_path(),
                    value.value_type().name()
                )));
            }
            assignments.push(assignment(path, value.value_access_path()));
            // The slot still has to exist for the index to be valid.
            return Value::zero(kind, registry);
        }
        Arg::Cel(expression) => {
            assignments.push(assignment(path, expression.0));
            return Value::zero(kind, registry);
        }
        _ => {}
    }
    match kind {
        FieldKind::Scalar(scalar) => convert_scalar(*scalar, arg, path),
        FieldKind::Enum(name) => convert_enum(registry, name, arg, path),
        FieldKind::Message(name) => convert_message(registry, name, arg, path, assignments),
    }
}

fn convert_scalar(kind: ScalarKind, arg: Arg, path: &str) -> Result<Value> {
    match (kind, arg) {
        (ScalarKind::Bool, Arg::Bool(v)) => Ok(Value::Bool(v)),
        (ScalarKind::String, Arg::String(v)) => Ok(Value::String(v)),
        (ScalarKind::Bytes, Arg::Bytes(v)) => Ok(Value::Bytes(v)),
        (ScalarKind::Double, Arg::Float(v)) => Ok(Value::F64(v)),
        (ScalarKind::Double, Arg::Int(v)) => Ok(Value::F64(v as f64)),
        (ScalarKind::Double, Arg::UInt(v)) => Ok(Value::F64(v as f64)),
        (ScalarKind::Float, Arg::Float(v)) => Ok(Value::F32(v as f32)),
        (ScalarKind::Float, Arg::Int(v)) => Ok(Value::F32(v as f32)),
        (ScalarKind::Float, Arg::UInt(v)) => Ok(Value::F32(v as f32)),
        (kind, Arg::Int(v)) if kind.is_integer() => integer_value(kind, i128::from(v), path),
        (kind, Arg::UInt(v)) if kind.is_integer() => integer_value(kind, i128::from(v), path),
        (kind, arg) => Err(mismatch(path, kind.rust_name(), &arg)),
    }
}

fn integer_value(kind: ScalarKind, value: i128, path: &str) -> Result<Value> {
    let out_of_range = || {
        WorkcellError::TypeMismatch(format!(
            "value {} is out of range for field '{}' ({})",
            value,
            path,
            kind.rust_name()
        ))
    };
    Ok(match kind {
        ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => {
            Value::I32(i32::try_from(value).map_err(|_| out_of_range())?)
        }
        ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => {
            Value::I64(i64::try_from(value).map_err(|_| out_of_range())?)
        }
        ScalarKind::UInt32 | ScalarKind::Fixed32 => {
            Value::U32(u32::try_from(value).map_err(|_| out_of_range())?)
        }
        ScalarKind::UInt64 | ScalarKind::Fixed64 => {
            Value::U64(u64::try_from(value).map_err(|_| out_of_range())?)
        }
        _ => return Err(out_of_range()),
    })
}

fn convert_key(kind: ScalarKind, key: MapKey, path: &str) -> Result<MapKey> {
    let converted = match (kind, &key) {
        (ScalarKind::String, MapKey::String(_)) | (ScalarKind::Bool, MapKey::Bool(_)) => {
            Some(key.clone())
        }
        (kind, key) if kind.is_integer() => {
            let wide = match key {
                MapKey::I32(v) => Some(i128::from(*v)),
                MapKey::I64(v) => Some(i128::from(*v)),
                MapKey::U32(v) => Some(i128::from(*v)),
                MapKey::U64(v) => Some(i128::from(*v)),
                _ => None,
            };
            wide.and_then(|v| match integer_value(kind, v, path).ok()? {
                Value::I32(v) => Some(MapKey::I32(v)),
                Value::I64(v) => Some(MapKey::I64(v)),
                Value::U32(v) => Some(MapKey::U32(v)),
                Value::U64(v) => Some(MapKey::U64(v)),
                _ => None,
            })
        }
        _ => None,
    };
    converted.ok_or_else(|| {
        WorkcellError::TypeMismatch(format!(
            "map field '{}' expects {} keys, got {}",
            path,
            kind.rust_name(),
            key
        ))
    })
}

fn convert_enum(registry: &TypeRegistry, name: &str, arg: Arg, path: &str) -> Result<Value> {
    let ty = registry
        .enum_type(name)
        .ok_or_else(|| WorkcellError::Descriptor(format!("unknown enum type '{}'", name)))?;
    match arg {
        Arg::Enum(value) if value.enum_name == ty.full_name => Ok(Value::EnumNumber(value.number)),
        Arg::String(value) => ty
            .value_by_name(&value)
            .map(|v| Value::EnumNumber(v.number))
            .ok_or_else(|| {
                WorkcellError::TypeMismatch(format!(
                    "'{}' is not a value of enum {} (field '{}')",
                    value, name, path
                ))
            }),
        Arg::Int(number) => i32::try_from(number)
            .ok()
            .and_then(|n| ty.value_by_number(n))
            .map(|v| Value::EnumNumber(v.number))
            .ok_or_else(|| {
                WorkcellError::TypeMismatch(format!(
                    "{} is not a value of enum {} (field '{}')",
                    number, name, path
                ))
            }),
        other => Err(mismatch(path, format!("enum {}", name), &other)),
    }
}

fn convert_message(
    registry: &TypeRegistry,
    name: &str,
    arg: Arg,
    path: &str,
    assignments: &mut Vec<ParameterAssignment>,
) -> Result<Value> {
    let ty = registry
        .message(name)
        .ok_or_else(|| WorkcellError::Descriptor(format!("unknown message type '{}'", name)))?;
    let message = match arg {
        Arg::Message(wrapper) if wrapper.full_name() == name => {
            let (message, nested) = wrapper.into_parts();
            assignments.extend(nested.into_iter().map(|a| ParameterAssignment {
                parameter_path: format!("{}.{}", path, a.parameter_path),
                cel_expression: a.cel_expression,
            }));
            if Arc::ptr_eq(message.descriptor(), &ty) {
                message
            } else {
                // Same name from another skill's registry: move it across by
                // its wire encoding.
                DynamicMessage::decode(ty, registry, &message.encode_to_vec())?
            }
        }
        Arg::Duration(duration) if name == DURATION_NAME => {
            convert::std_duration_message(&ty, duration)?
        }
        Arg::Int(seconds) if name == DURATION_NAME => convert::duration_message(&ty, seconds, 0)?,
        Arg::Float(seconds) if name == DURATION_NAME => {
            let (seconds, nanos) = convert::split_seconds(seconds);
            convert::duration_message(&ty, seconds, nanos)?
        }
        Arg::World(value) => match convert::convert(&value, &ty, registry)? {
            Some(message) => message,
            None => return Err(mismatch(path, format!("message {}", name), &Arg::World(value))),
        },
        other => return Err(mismatch(path, format!("message {}", name), &other)),
    };
    Ok(Value::Message(message))
}

/// Constructor keywords of `ty`, required first, each group in field order.
///
/// Containers, explicit-presence fields and oneof members are always
/// optional. A singular message is optional iff `defaults` sets it; a
/// singular primitive is optional iff its default differs from zero.
pub fn param_specs(
    ty: &MessageType,
    registry: &TypeRegistry,
    defaults: Option<&DynamicMessage>,
    comment: impl Fn(&FieldDescriptor) -> Option<String>,
) -> Vec<ParamSpec> {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    for field in &ty.fields {
        let default = defaults.and_then(|d| d.get(&field.name));
        let is_optional = match (&field.cardinality, &field.kind) {
            (Cardinality::Repeated | Cardinality::Map { .. } | Cardinality::Optional, _) => true,
            _ if field.oneof.is_some() => true,
            (_, FieldKind::Message(_)) => default.is_some(),
            _ => default.map(|v| !v.is_zero()).unwrap_or(false),
        };
        let rendered_default = if is_optional {
            Some(match default {
                Some(value) => render_value(value, field.element_kind(), registry),
                None => match field.cardinality {
                    Cardinality::Repeated => "[]".to_string(),
                    Cardinality::Map { .. } => "{}".to_string(),
                    _ => "None".to_string(),
                },
            })
        } else {
            None
        };
        let spec = ParamSpec {
            name: field.name.clone(),
            type_hint: type_hint(field),
            required: !is_optional,
            default: rendered_default,
            comment: comment(field),
        };
        if is_optional {
            optional.push(spec);
        } else {
            required.push(spec);
        }
    }
    required.extend(optional);
    required
}

fn element_hint(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Scalar(scalar) => scalar.rust_name().to_string(),
        FieldKind::Enum(name) => name.clone(),
        FieldKind::Message(name) => {
            let mut alternatives = vec![name.clone()];
            alternatives.extend(convert::accepted_inputs(name).iter().map(|s| s.to_string()));
            alternatives.join(" | ")
        }
    }
}

fn type_hint(field: &FieldDescriptor) -> String {
    match &field.cardinality {
        Cardinality::Repeated => format!("Vec<{}> | BlackboardValue", element_hint(&field.kind)),
        Cardinality::Map { key, value } => {
            format!("BTreeMap<{}, {}>", key.rust_name(), element_hint(value))
        }
        Cardinality::Optional => format!("Option<{}>", element_hint(&field.kind)),
        Cardinality::Singular if field.oneof.is_some() => {
            format!("Option<{}>", element_hint(&field.kind))
        }
        Cardinality::Singular => element_hint(&field.kind),
    }
}

fn render_value(value: &Value, kind: &FieldKind, registry: &TypeRegistry) -> String {
    match value {
        Value::Bool(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => format!("{:?}", v),
        Value::F64(v) => format!("{:?}", v),
        Value::String(v) => format!("{:?}", v),
        Value::Bytes(v) => format!("<{} bytes>", v.len()),
        Value::EnumNumber(number) => match kind {
            FieldKind::Enum(name) => registry
                .enum_type(name)
                .and_then(|ty| ty.value_by_number(*number).map(|v| format!("{}.{}", name, v.name)))
                .unwrap_or_else(|| number.to_string()),
            _ => number.to_string(),
        },
        Value::Message(message) => format!("{} {{ .. }}", message.full_name()),
        Value::List(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|item| render_value(item, kind, registry))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Map(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, render_value(v, kind, registry)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::ValueType;
    use crate::skills::fixtures::pick_skill;
    use crate::skills::info::SkillInfo;

    fn params() -> (SkillInfo, MessageWrapper) {
        let info = SkillInfo::from_skill(pick_skill()).unwrap();
        let wrapper = MessageWrapper::new(
            info.parameter_type().unwrap().clone(),
            info.registry().clone(),
        );
        (info, wrapper)
    }

    fn pose_list(info: &SkillInfo) -> BlackboardValue {
        BlackboardValue::new(
            "produce_result",
            ValueType::message("demo.pick.PickResult", info.registry().clone()),
        )
        .field("poses")
        .unwrap()
    }

    #[test]
    fn test_scalar_conversions() {
        let (_, mut wrapper) = params();
        wrapper.set("speed", 1).unwrap();
        assert_eq!(wrapper.get("speed"), Some(&Value::F64(1.0)));
        wrapper.set("count", 3_i64).unwrap();
        assert_eq!(wrapper.get("count"), Some(&Value::I32(3)));

        let err = wrapper.set("count", 2.5).unwrap_err();
        assert!(matches!(err, WorkcellError::TypeMismatch(_)));
        let err = wrapper.set("count", i64::MAX).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        let err = wrapper.set("tool", 7).unwrap_err();
        assert!(err.to_string().contains("field 'tool' expects String"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let (_, mut wrapper) = params();
        let err = wrapper.set("sped", 1.0).unwrap_err();
        assert!(matches!(err, WorkcellError::InvalidArgument(_)));
    }

    #[test]
    fn test_enum_by_name_and_constant() {
        let (_, mut wrapper) = params();
        wrapper.set("grasp", "SIDE").unwrap();
        assert_eq!(wrapper.get("grasp"), Some(&Value::EnumNumber(2)));
        wrapper
            .set(
                "grasp",
                EnumConst {
                    enum_name: "demo.pick.PickParams.Grasp".to_string(),
                    name: "TOP".to_string(),
                    number: 1,
                },
            )
            .unwrap();
        assert_eq!(wrapper.get("grasp"), Some(&Value::EnumNumber(1)));
        assert!(wrapper.set("grasp", "FAST").is_err());
    }

    #[test]
    fn test_oneof_members_conflict() {
        let (_, mut wrapper) = params();
        wrapper.set("approach_distance", 0.1).unwrap();
        let err = wrapper.set("approach_frame", "top").unwrap_err();
        assert!(err.to_string().contains("oneof"));
        // Re-setting the same member is fine.
        wrapper.set("approach_distance", 0.2).unwrap();
    }

    #[test]
    fn test_blackboard_value_becomes_assignment() {
        let (info, mut wrapper) = params();
        let first = pose_list(&info).index(0).unwrap();
        wrapper.set("target", &first).unwrap();
        assert!(!wrapper.message().has("target"));
        assert_eq!(
            wrapper.assignments(),
            &[ParameterAssignment {
                parameter_path: "target".to_string(),
                cel_expression: "produce_result.poses[0]".to_string(),
            }]
        );

        // A later literal replaces the assignment.
        wrapper.set("target", convert::Pose3::IDENTITY).unwrap();
        assert!(wrapper.assignments().is_empty());
        assert!(wrapper.message().has("target"));
    }

    #[test]
    fn test_sequence_assignment_checks_shape() {
        let (info, mut wrapper) = params();
        wrapper.set("waypoints", pose_list(&info)).unwrap();
        assert_eq!(wrapper.assignments()[0].parameter_path, "waypoints");

        let err = wrapper.set("target", pose_list(&info)).unwrap_err();
        assert!(matches!(err, WorkcellError::TypeMismatch(_)));

        let single = pose_list(&info).index(1).unwrap();
        let err = wrapper.set("waypoints", &single).unwrap_err();
        assert!(err.to_string().contains("sequence-valued"));
    }

    #[test]
    fn test_list_items_and_nested_wrappers_prefix_paths() {
        let (info, mut wrapper) = params();
        let item = pose_list(&info).index(2).unwrap();
        wrapper
            .set(
                "waypoints",
                vec![Arg::from(convert::Pose3::IDENTITY), Arg::from(&item)],
            )
            .unwrap();
        assert_eq!(wrapper.get("waypoints").unwrap().as_list().unwrap().len(), 2);
        assert_eq!(wrapper.assignments()[0].parameter_path, "waypoints[1]");

        let options_type = info.registry().message("demo.pick.Options").unwrap();
        let options = MessageWrapper::new(options_type, info.registry().clone())
            .with("verbose", CelExpression::from("flags.verbose"))
            .unwrap();
        wrapper.set("options", options).unwrap();
        let paths: Vec<&str> = wrapper
            .assignments()
            .iter()
            .map(|a| a.parameter_path.as_str())
            .collect();
        assert_eq!(paths, vec!["waypoints[1]", "options.verbose"]);
    }

    #[test]
    fn test_duration_accepts_seconds() {
        let (_, mut wrapper) = params();
        wrapper.set("timeout", 2.5).unwrap();
        let timeout = wrapper.get("timeout").unwrap().as_message().unwrap();
        assert_eq!(timeout.get("seconds"), Some(&Value::I64(2)));
        assert_eq!(timeout.get("nanos"), Some(&Value::I32(500_000_000)));

        wrapper.set("timeout", Duration::from_millis(1500)).unwrap();
        let timeout = wrapper.get("timeout").unwrap().as_message().unwrap();
        assert_eq!(timeout.get("seconds"), Some(&Value::I64(1)));
    }

    #[test]
    fn test_map_field() {
        let (_, mut wrapper) = params();
        let labels = BTreeMap::from([("a", 1), ("b", 2)]);
        wrapper.set("labels", labels).unwrap();
        match wrapper.get("labels") {
            Some(Value::Map(entries)) => {
                assert_eq!(entries.get(&MapKey::from("b")), Some(&Value::I32(2)));
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert!(wrapper.set("labels", vec![1, 2]).is_err());
    }

    #[test]
    fn test_param_specs_order_and_defaults() {
        let (info, _) = params();
        let specs = param_specs(
            info.parameter_type().unwrap(),
            info.registry(),
            info.default_parameters(),
            |f| info.field_comment(&f.full_name),
        );
        let required: Vec<&str> = specs
            .iter()
            .filter(|s| s.required)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            required,
            vec!["target", "grasp", "tool", "timeout", "object", "options", "count"]
        );
        // Required keywords come first.
        let first_optional = specs.iter().position(|s| !s.required).unwrap();
        assert!(specs[first_optional..].iter().all(|s| !s.required));

        let speed = specs.iter().find(|s| s.name == "speed").unwrap();
        assert_eq!(speed.default.as_deref(), Some("0.5"));
        assert_eq!(speed.comment.as_deref(), Some("Fraction of the maximum speed."));
        let waypoints = specs.iter().find(|s| s.name == "waypoints").unwrap();
        assert_eq!(waypoints.default.as_deref(), Some("[]"));
        assert!(waypoints.type_hint.starts_with("Vec<workcell_proto.Pose | Pose3>"));
        let retries = specs.iter().find(|s| s.name == "retries").unwrap();
        assert_eq!(retries.type_hint, "Option<i32>");
    }
}
