//! Dynamic messages over a [`TypeRegistry`]
//!
//! Values are checked against the field descriptor on every write, so a
//! `DynamicMessage` always encodes to a message the server can parse with the
//! same descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use prost::bytes::{Buf, BufMut};
use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint, WireType};
use prost_types::Any;

use super::registry::{Cardinality, FieldDescriptor, FieldKind, MessageType, ScalarKind, TypeRegistry};
use crate::{Result, WorkcellError};

/// Key of a map field. Protobuf only allows integral, bool and string keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(v) => write!(f, "{}", v),
            MapKey::I32(v) => write!(f, "{}", v),
            MapKey::I64(v) => write!(f, "{}", v),
            MapKey::U32(v) => write!(f, "{}", v),
            MapKey::U64(v) => write!(f, "{}", v),
            MapKey::String(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    EnumNumber(i32),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

impl Value {
    /// Zero value of a single (non-repeated) element of `kind`.
    pub fn zero(kind: &FieldKind, registry: &TypeRegistry) -> Result<Value> {
        Ok(match kind {
            FieldKind::Scalar(scalar) => scalar_zero(*scalar),
            FieldKind::Enum(_) => Value::EnumNumber(0),
            FieldKind::Message(name) => {
                let ty = registry.message(name).ok_or_else(|| {
                    WorkcellError::Descriptor(format!("unknown message type '{}'", name))
                })?;
                Value::Message(DynamicMessage::new(ty))
            }
        })
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::I32(v) | Value::EnumNumber(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => *v == 0.0,
            Value::F64(v) => *v == 0.0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Message(_) => false,
            Value::List(v) => v.is_empty(),
            Value::Map(v) => v.is_empty(),
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::F32(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) | Value::EnumNumber(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            Value::U32(v) => Some(i64::from(*v)),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "String",
            Value::Bytes(_) => "Vec<u8>",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

fn scalar_zero(kind: ScalarKind) -> Value {
    match kind {
        ScalarKind::Double => Value::F64(0.0),
        ScalarKind::Float => Value::F32(0.0),
        ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64 => Value::I64(0),
        ScalarKind::UInt64 | ScalarKind::Fixed64 => Value::U64(0),
        ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32 => Value::I32(0),
        ScalarKind::UInt32 | ScalarKind::Fixed32 => Value::U32(0),
        ScalarKind::Bool => Value::Bool(false),
        ScalarKind::String => Value::String(String::new()),
        ScalarKind::Bytes => Value::Bytes(Vec::new()),
    }
}

fn element_matches(kind: &FieldKind, value: &Value) -> bool {
    match (kind, value) {
        (FieldKind::Scalar(scalar), value) => {
            std::mem::discriminant(&scalar_zero(*scalar)) == std::mem::discriminant(value)
        }
        (FieldKind::Enum(_), Value::EnumNumber(_)) => true,
        (FieldKind::Message(name), Value::Message(m)) => m.full_name() == name,
        _ => false,
    }
}

fn key_matches(kind: ScalarKind, key: &MapKey) -> bool {
    matches!(
        (kind, key),
        (ScalarKind::Bool, MapKey::Bool(_))
            | (ScalarKind::Int32 | ScalarKind::SInt32 | ScalarKind::SFixed32, MapKey::I32(_))
            | (ScalarKind::Int64 | ScalarKind::SInt64 | ScalarKind::SFixed64, MapKey::I64(_))
            | (ScalarKind::UInt32 | ScalarKind::Fixed32, MapKey::U32(_))
            | (ScalarKind::UInt64 | ScalarKind::Fixed64, MapKey::U64(_))
            | (ScalarKind::String, MapKey::String(_))
    )
}

/// Check that `value` is a valid value for `field` as a whole.
pub fn check_field_value(field: &FieldDescriptor, value: &Value) -> Result<()> {
    let ok = match (&field.cardinality, value) {
        (Cardinality::Repeated, Value::List(items)) => {
            items.iter().all(|item| element_matches(&field.kind, item))
        }
        (Cardinality::Map { key, value: kind }, Value::Map(entries)) => entries
            .iter()
            .all(|(k, v)| key_matches(*key, k) && element_matches(kind, v)),
        (Cardinality::Singular | Cardinality::Optional, value) => {
            element_matches(&field.kind, value)
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        let expected = match &field.cardinality {
            Cardinality::Repeated => format!("list of {}", field.kind),
            Cardinality::Map { key, value } => format!("map of {} to {}", key.rust_name(), value),
            _ => field.kind.to_string(),
        };
        Err(WorkcellError::TypeMismatch(format!(
            "field '{}' expects {}, got {}",
            field.name,
            expected,
            value.variant_name()
        )))
    }
}

/// A message of a runtime-described type.
#[derive(Clone)]
pub struct DynamicMessage {
    ty: Arc<MessageType>,
    fields: BTreeMap<u32, Value>,
    /// Raw bytes of fields the descriptor does not know, re-emitted on encode.
    unknown: Vec<u8>,
}

impl fmt::Debug for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.ty.full_name);
        for (field, value) in self.fields() {
            s.field(&field.name, value);
        }
        s.finish()
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        self.ty.full_name == other.ty.full_name
            && self.fields == other.fields
            && self.unknown == other.unknown
    }
}

impl DynamicMessage {
    pub fn new(ty: Arc<MessageType>) -> Self {
        Self {
            ty,
            fields: BTreeMap::new(),
            unknown: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &Arc<MessageType> {
        &self.ty
    }

    pub fn full_name(&self) -> &str {
        &self.ty.full_name
    }

    fn field_descriptor(&self, name: &str) -> Result<&FieldDescriptor> {
        self.ty.field(name).ok_or_else(|| {
            WorkcellError::InvalidArgument(format!(
                "message '{}' has no field '{}'",
                self.ty.full_name, name
            ))
        })
    }

    /// Set field `name`, clearing any other member of its oneof.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.field_descriptor(name)?.clone();
        check_field_value(&field, &value)?;
        self.insert(&field, value);
        Ok(())
    }

    fn insert(&mut self, field: &FieldDescriptor, value: Value) {
        if let Some(oneof) = &field.oneof {
            let siblings: Vec<u32> = self
                .ty
                .oneof_fields(oneof)
                .filter(|f| f.number != field.number)
                .map(|f| f.number)
                .collect();
            for number in siblings {
                self.fields.remove(&number);
            }
        }
        self.fields.insert(field.number, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let field = self.ty.field(name)?;
        self.fields.get(&field.number)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        let number = self.ty.field(name)?.number;
        self.fields.get_mut(&number)
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn clear(&mut self, name: &str) -> Option<Value> {
        let number = self.ty.field(name)?.number;
        self.fields.remove(&number)
    }

    /// Name of the member currently set in `oneof`.
    pub fn which_oneof<'a>(&'a self, oneof: &'a str) -> Option<&'a str> {
        self.ty
            .oneof_fields(oneof)
            .find(|f| self.fields.contains_key(&f.number))
            .map(|f| f.name.as_str())
    }

    /// Set fields in field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &Value)> {
        self.fields
            .iter()
            .filter_map(|(number, value)| Some((self.ty.field_by_number(*number)?, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.unknown.is_empty()
    }

    /// Encoded fields whose numbers the descriptor does not declare.
    pub fn unknown_fields(&self) -> &[u8] {
        &self.unknown
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_raw(&mut buf);
        buf
    }

    fn encode_raw(&self, buf: &mut Vec<u8>) {
        for (field, value) in self.fields() {
            encode_field(field, value, buf);
        }
        buf.put_slice(&self.unknown);
    }

    pub fn to_any(&self, type_url_prefix: &str) -> Any {
        Any {
            type_url: format!("{}{}", type_url_prefix, self.ty.full_name),
            value: self.encode_to_vec(),
        }
    }

    pub fn decode(ty: Arc<MessageType>, registry: &TypeRegistry, bytes: &[u8]) -> Result<Self> {
        let mut message = Self::new(ty);
        message.merge(registry, bytes)?;
        Ok(message)
    }

    pub fn merge(&mut self, registry: &TypeRegistry, mut buf: &[u8]) -> Result<()> {
        while buf.has_remaining() {
            let start = buf;
            let (number, wire_type) = decode_key(&mut buf)?;
            let Some(field) = self.ty.field_by_number(number).cloned() else {
                skip_value(wire_type, &mut buf)?;
                let consumed = start.len() - buf.len();
                self.unknown.extend_from_slice(&start[..consumed]);
                continue;
            };
            match &field.cardinality {
                Cardinality::Map { key, value } => {
                    let entry = take_length_delimited(wire_type, &mut buf)?;
                    let (k, v) = decode_map_entry(*key, value, registry, entry)?;
                    match self.fields.entry(field.number).or_insert_with(|| Value::Map(BTreeMap::new())) {
                        Value::Map(map) => {
                            map.insert(k, v);
                        }
                        other => *other = Value::Map(BTreeMap::from([(k, v)])),
                    }
                }
                Cardinality::Repeated => {
                    let mut items = Vec::new();
                    let packable = !matches!(
                        field.kind,
                        FieldKind::Message(_)
                            | FieldKind::Scalar(ScalarKind::String | ScalarKind::Bytes)
                    );
                    if packable && wire_type == WireType::LengthDelimited {
                        let mut packed = take_length_delimited(wire_type, &mut buf)?;
                        while packed.has_remaining() {
                            items.push(decode_element(&field.kind, element_wire_type(&field.kind), registry, &mut packed)?);
                        }
                    } else {
                        items.push(decode_element(&field.kind, wire_type, registry, &mut buf)?);
                    }
                    match self.fields.entry(field.number).or_insert_with(|| Value::List(Vec::new())) {
                        Value::List(list) => list.extend(items),
                        other => *other = Value::List(items),
                    }
                }
                Cardinality::Singular | Cardinality::Optional => {
                    if let (FieldKind::Message(_), Some(Value::Message(existing))) =
                        (&field.kind, self.fields.get_mut(&field.number))
                    {
                        let bytes = take_length_delimited(wire_type, &mut buf)?;
                        existing.merge(registry, bytes)?;
                        continue;
                    }
                    let value = decode_element(&field.kind, wire_type, registry, &mut buf)?;
                    self.insert(&field, value);
                }
            }
        }
        Ok(())
    }
}

fn element_wire_type(kind: &FieldKind) -> WireType {
    match kind {
        FieldKind::Scalar(
            ScalarKind::Double | ScalarKind::Fixed64 | ScalarKind::SFixed64,
        ) => WireType::SixtyFourBit,
        FieldKind::Scalar(
            ScalarKind::Float | ScalarKind::Fixed32 | ScalarKind::SFixed32,
        ) => WireType::ThirtyTwoBit,
        FieldKind::Scalar(ScalarKind::String | ScalarKind::Bytes) | FieldKind::Message(_) => {
            WireType::LengthDelimited
        }
        _ => WireType::Varint,
    }
}

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut Vec<u8>) {
    match (&field.cardinality, value) {
        (Cardinality::Repeated, Value::List(items)) => {
            if items.is_empty() {
                return;
            }
            let wire_type = element_wire_type(&field.kind);
            if wire_type == WireType::LengthDelimited {
                for item in items {
                    encode_element(field.number, &field.kind, item, buf);
                }
            } else {
                let mut packed = Vec::new();
                for item in items {
                    encode_element_raw(item, &field.kind, &mut packed);
                }
                encode_key(field.number, WireType::LengthDelimited, buf);
                encode_varint(packed.len() as u64, buf);
                buf.put_slice(&packed);
            }
        }
        (Cardinality::Map { key, value: kind }, Value::Map(entries)) => {
            for (k, v) in entries {
                let mut entry = Vec::new();
                encode_element(1, &FieldKind::Scalar(*key), &map_key_value(k), &mut entry);
                encode_element(2, kind, v, &mut entry);
                encode_key(field.number, WireType::LengthDelimited, buf);
                encode_varint(entry.len() as u64, buf);
                buf.put_slice(&entry);
            }
        }
        (Cardinality::Singular, value)
            if field.oneof.is_none()
                && !matches!(field.kind, FieldKind::Message(_))
                && value.is_zero() => {}
        (_, value) => encode_element(field.number, &field.kind, value, buf),
    }
}

fn map_key_value(key: &MapKey) -> Value {
    match key {
        MapKey::Bool(v) => Value::Bool(*v),
        MapKey::I32(v) => Value::I32(*v),
        MapKey::I64(v) => Value::I64(*v),
        MapKey::U32(v) => Value::U32(*v),
        MapKey::U64(v) => Value::U64(*v),
        MapKey::String(v) => Value::String(v.clone()),
    }
}

fn encode_element(number: u32, kind: &FieldKind, value: &Value, buf: &mut Vec<u8>) {
    encode_key(number, element_wire_type(kind), buf);
    encode_element_raw(value, kind, buf);
}

fn encode_element_raw(value: &Value, kind: &FieldKind, buf: &mut Vec<u8>) {
    let scalar = match kind {
        FieldKind::Scalar(scalar) => Some(*scalar),
        _ => None,
    };
    match value {
        Value::Bool(v) => encode_varint(u64::from(*v), buf),
        Value::I32(v) => match scalar {
            Some(ScalarKind::SInt32) => encode_varint(u64::from(((v << 1) ^ (v >> 31)) as u32), buf),
            Some(ScalarKind::SFixed32) => buf.put_i32_le(*v),
            _ => encode_varint(i64::from(*v) as u64, buf),
        },
        Value::I64(v) => match scalar {
            Some(ScalarKind::SInt64) => encode_varint(((v << 1) ^ (v >> 63)) as u64, buf),
            Some(ScalarKind::SFixed64) => buf.put_i64_le(*v),
            _ => encode_varint(*v as u64, buf),
        },
        Value::U32(v) => match scalar {
            Some(ScalarKind::Fixed32) => buf.put_u32_le(*v),
            _ => encode_varint(u64::from(*v), buf),
        },
        Value::U64(v) => match scalar {
            Some(ScalarKind::Fixed64) => buf.put_u64_le(*v),
            _ => encode_varint(*v, buf),
        },
        Value::F32(v) => buf.put_f32_le(*v),
        Value::F64(v) => buf.put_f64_le(*v),
        Value::EnumNumber(v) => encode_varint(i64::from(*v) as u64, buf),
        Value::String(s) => {
            encode_varint(s.len() as u64, buf);
            buf.put_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            encode_varint(b.len() as u64, buf);
            buf.put_slice(b);
        }
        Value::Message(m) => {
            let bytes = m.encode_to_vec();
            encode_varint(bytes.len() as u64, buf);
            buf.put_slice(&bytes);
        }
        // Nested collections are rejected by `check_field_value`.
        Value::List(_) | Value::Map(_) => {}
    }
}

fn malformed(what: &str) -> WorkcellError {
    WorkcellError::InvalidArgument(format!("malformed protobuf input: {}", what))
}

fn take_length_delimited<'a>(wire_type: WireType, buf: &mut &'a [u8]) -> Result<&'a [u8]> {
    if wire_type != WireType::LengthDelimited {
        return Err(malformed("expected length-delimited value"));
    }
    let len = decode_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(malformed("length exceeds buffer"));
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn skip_value(wire_type: WireType, buf: &mut &[u8]) -> Result<()> {
    let len = match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
            0
        }
        WireType::SixtyFourBit => 8,
        WireType::ThirtyTwoBit => 4,
        WireType::LengthDelimited => decode_varint(buf)? as usize,
        WireType::StartGroup | WireType::EndGroup => {
            return Err(malformed("groups are not supported"))
        }
    };
    if buf.remaining() < len {
        return Err(malformed("truncated field"));
    }
    buf.advance(len);
    Ok(())
}

fn decode_element(
    kind: &FieldKind,
    wire_type: WireType,
    registry: &TypeRegistry,
    buf: &mut &[u8],
) -> Result<Value> {
    if wire_type != element_wire_type(kind) {
        return Err(malformed("unexpected wire type"));
    }
    let need = match wire_type {
        WireType::SixtyFourBit => 8,
        WireType::ThirtyTwoBit => 4,
        _ => 0,
    };
    if buf.remaining() < need {
        return Err(malformed("truncated fixed-width value"));
    }
    Ok(match kind {
        FieldKind::Scalar(scalar) => match scalar {
            ScalarKind::Double => Value::F64(buf.get_f64_le()),
            ScalarKind::Float => Value::F32(buf.get_f32_le()),
            ScalarKind::Fixed64 => Value::U64(buf.get_u64_le()),
            ScalarKind::SFixed64 => Value::I64(buf.get_i64_le()),
            ScalarKind::Fixed32 => Value::U32(buf.get_u32_le()),
            ScalarKind::SFixed32 => Value::I32(buf.get_i32_le()),
            ScalarKind::Int64 => Value::I64(decode_varint(buf)? as i64),
            ScalarKind::UInt64 => Value::U64(decode_varint(buf)?),
            ScalarKind::Int32 => Value::I32(decode_varint(buf)? as i32),
            ScalarKind::UInt32 => Value::U32(decode_varint(buf)? as u32),
            ScalarKind::SInt32 => {
                let raw = decode_varint(buf)? as u32;
                Value::I32(((raw >> 1) as i32) ^ -((raw & 1) as i32))
            }
            ScalarKind::SInt64 => {
                let raw = decode_varint(buf)?;
                Value::I64(((raw >> 1) as i64) ^ -((raw & 1) as i64))
            }
            ScalarKind::Bool => Value::Bool(decode_varint(buf)? != 0),
            ScalarKind::String => {
                let bytes = take_length_delimited(wire_type, buf)?;
                Value::String(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| malformed("string is not valid UTF-8"))?,
                )
            }
            ScalarKind::Bytes => Value::Bytes(take_length_delimited(wire_type, buf)?.to_vec()),
        },
        FieldKind::Enum(_) => Value::EnumNumber(decode_varint(buf)? as i32),
        FieldKind::Message(name) => {
            let ty = registry.message(name).ok_or_else(|| {
                WorkcellError::Descriptor(format!("unknown message type '{}'", name))
            })?;
            let bytes = take_length_delimited(wire_type, buf)?;
            Value::Message(DynamicMessage::decode(ty, registry, bytes)?)
        }
    })
}

fn decode_map_entry(
    key_kind: ScalarKind,
    value_kind: &FieldKind,
    registry: &TypeRegistry,
    mut buf: &[u8],
) -> Result<(MapKey, Value)> {
    let mut key = scalar_zero(key_kind);
    let mut value = None;
    while buf.has_remaining() {
        let (number, wire_type) = decode_key(&mut buf)?;
        match number {
            1 => key = decode_element(&FieldKind::Scalar(key_kind), wire_type, registry, &mut buf)?,
            2 => value = Some(decode_element(value_kind, wire_type, registry, &mut buf)?),
            _ => skip_value(wire_type, &mut buf)?,
        }
    }
    let key = match key {
        Value::Bool(v) => MapKey::Bool(v),
        Value::I32(v) => MapKey::I32(v),
        Value::I64(v) => MapKey::I64(v),
        Value::U32(v) => MapKey::U32(v),
        Value::U64(v) => MapKey::U64(v),
        Value::String(v) => MapKey::String(v),
        _ => return Err(malformed("invalid map key type")),
    };
    let value = match value {
        Some(value) => value,
        None => Value::zero(value_kind, registry)?,
    };
    Ok((key, value))
}
