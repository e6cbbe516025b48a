//! Symbolic references into the blackboard
//!
//! A [`BlackboardValue`] names a value that will only exist once the executive
//! runs the tree. It is composed by field and index access and rendered as a
//! CEL access path when used as a skill parameter or condition.

use std::fmt;
use std::sync::Arc;

use crate::reflect::{Cardinality, FieldKind, ScalarKind, TypeRegistry};
use crate::{Result, WorkcellError};

/// One step of an access path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(i64),
    Key(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeShape {
    Message(String),
    Enum(String),
    Scalar(ScalarKind),
    List(Box<TypeShape>),
    Map(ScalarKind, Box<TypeShape>),
    Unknown,
}

impl TypeShape {
    fn from_kind(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Scalar(scalar) => TypeShape::Scalar(*scalar),
            FieldKind::Message(name) => TypeShape::Message(name.clone()),
            FieldKind::Enum(name) => TypeShape::Enum(name.clone()),
        }
    }

    fn name(&self) -> String {
        match self {
            TypeShape::Message(name) | TypeShape::Enum(name) => name.clone(),
            TypeShape::Scalar(scalar) => scalar.rust_name().to_string(),
            TypeShape::List(element) => format!("Vec<{}>", element.name()),
            TypeShape::Map(key, value) => format!("BTreeMap<{}, {}>", key.rust_name(), value.name()),
            TypeShape::Unknown => "?".to_string(),
        }
    }
}

/// Static type of a blackboard value, resolved against the registry of the
/// skill that produced it.
#[derive(Clone)]
pub struct ValueType {
    shape: TypeShape,
    registry: Option<Arc<TypeRegistry>>,
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueType({})", self.shape.name())
    }
}

impl ValueType {
    /// Type not known to the client, e.g. values written by a Data node.
    pub fn unknown() -> Self {
        Self {
            shape: TypeShape::Unknown,
            registry: None,
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self {
            shape: TypeShape::Scalar(kind),
            registry: None,
        }
    }

    pub fn message(full_name: impl Into<String>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            shape: TypeShape::Message(full_name.into()),
            registry: Some(registry),
        }
    }

    pub fn name(&self) -> String {
        self.shape.name()
    }

    pub fn is_list(&self) -> bool {
        matches!(self.shape, TypeShape::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.shape, TypeShape::Map(..))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self.shape, TypeShape::Unknown)
    }

    /// Full name of the message type, if this is a singular message.
    pub fn message_name(&self) -> Option<&str> {
        match &self.shape {
            TypeShape::Message(name) => Some(name),
            _ => None,
        }
    }

    fn with_shape(&self, shape: TypeShape) -> Self {
        Self {
            shape,
            registry: self.registry.clone(),
        }
    }
}

/// Symbolic reference to a (possibly nested) value on the blackboard.
#[derive(Debug, Clone)]
pub struct BlackboardValue {
    root: String,
    path: Vec<Segment>,
    value_type: ValueType,
    scope: Option<String>,
    is_toplevel: bool,
}

impl PartialEq for BlackboardValue {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.path == other.path
            && self.value_type.name() == other.value_type.name()
    }
}

impl BlackboardValue {
    pub fn new(root: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            root: root.into(),
            path: Vec::new(),
            value_type,
            scope: None,
            is_toplevel: true,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn root_name(&self) -> &str {
        &self.root
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn is_toplevel(&self) -> bool {
        self.is_toplevel
    }

    fn extend(&self, segment: Segment, shape: TypeShape) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self {
            root: self.root.clone(),
            path,
            value_type: self.value_type.with_shape(shape),
            scope: self.scope.clone(),
            is_toplevel: false,
        }
    }

    /// Access sub-field `name`. The type narrows to the declared field type.
    pub fn field(&self, name: &str) -> Result<Self> {
        let shape = match &self.value_type.shape {
            TypeShape::Unknown => TypeShape::Unknown,
            TypeShape::Message(message_name) => {
                let message = self
                    .value_type
                    .registry
                    .as_ref()
                    .and_then(|r| r.message(message_name));
                match message {
                    None => TypeShape::Unknown,
                    Some(message) => {
                        let field = message.field(name).ok_or_else(|| {
                            WorkcellError::InvalidArgument(format!(
                                "'{}' of type '{}' has no field '{}'",
                                self.value_access_path(),
                                message_name,
                                name
                            ))
                        })?;
                        match &field.cardinality {
                            Cardinality::Repeated => {
                                TypeShape::List(Box::new(TypeShape::from_kind(&field.kind)))
                            }
                            Cardinality::Map { key, value } => {
                                TypeShape::Map(*key, Box::new(TypeShape::from_kind(value)))
                            }
                            _ => TypeShape::from_kind(&field.kind),
                        }
                    }
                }
            }
            other => {
                return Err(WorkcellError::TypeMismatch(format!(
                    "'{}' of type '{}' has no fields",
                    self.value_access_path(),
                    other.name()
                )))
            }
        };
        Ok(self.extend(Segment::Field(name.to_string()), shape))
    }

    /// Access element `index` of a list (or integer-keyed map).
    pub fn index(&self, index: i64) -> Result<Self> {
        let shape = match &self.value_type.shape {
            TypeShape::List(element) => (**element).clone(),
            TypeShape::Map(key, value) if key.is_integer() => (**value).clone(),
            TypeShape::Unknown => TypeShape::Unknown,
            other => {
                return Err(WorkcellError::TypeMismatch(format!(
                    "'{}' of type '{}' cannot be indexed by integer",
                    self.value_access_path(),
                    other.name()
                )))
            }
        };
        Ok(self.extend(Segment::Index(index), shape))
    }

    /// Access entry `key` of a string-keyed map.
    pub fn key(&self, key: &str) -> Result<Self> {
        let shape = match &self.value_type.shape {
            TypeShape::Map(ScalarKind::String, value) => (**value).clone(),
            TypeShape::Unknown => TypeShape::Unknown,
            other => {
                return Err(WorkcellError::TypeMismatch(format!(
                    "'{}' of type '{}' cannot be indexed by string",
                    self.value_access_path(),
                    other.name()
                )))
            }
        };
        Ok(self.extend(Segment::Key(key.to_string()), shape))
    }

    /// CEL access path, e.g. `root.a.b[3].c`.
    pub fn value_access_path(&self) -> String {
        let mut out = self.root.clone();
        for segment in &self.path {
            match segment {
                Segment::Field(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Segment::Index(index) => out.push_str(&format!("[{}]", index)),
                Segment::Key(key) => out.push_str(&format!("[{:?}]", key)),
            }
        }
        out
    }
}

impl fmt::Display for BlackboardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value_access_path())
    }
}

/// An opaque CEL expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CelExpression(pub String);

impl CelExpression {
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CelExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CelExpression {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CelExpression {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&BlackboardValue> for CelExpression {
    fn from(value: &BlackboardValue) -> Self {
        Self(value.value_access_path())
    }
}

impl From<BlackboardValue> for CelExpression {
    fn from(value: BlackboardValue) -> Self {
        Self(value.value_access_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_paths_compose() {
        let value = BlackboardValue::new("result", ValueType::unknown());
        let nested = value.field("a").unwrap().index(2).unwrap().field("b").unwrap();
        assert_eq!(nested.value_access_path(), "result.a[2].b");
        assert!(value.is_toplevel());
        assert!(!nested.is_toplevel());
        assert_eq!(nested.root_name(), "result");
    }

    #[test]
    fn test_map_key_rendering() {
        let value = BlackboardValue::new("m", ValueType::unknown());
        assert_eq!(value.key("x").unwrap().value_access_path(), "m[\"x\"]");
    }

    #[test]
    fn test_scalar_rejects_field_access() {
        let counter = BlackboardValue::new("counter", ValueType::scalar(ScalarKind::UInt32));
        assert!(matches!(
            counter.field("x"),
            Err(WorkcellError::TypeMismatch(_))
        ));
        assert!(counter.index(0).is_err());
    }

    #[test]
    fn test_equality_uses_root_path_and_type() {
        let a = BlackboardValue::new("r", ValueType::unknown()).with_scope("s1");
        let b = BlackboardValue::new("r", ValueType::unknown()).with_scope("s2");
        assert_eq!(a, b);
        let c = BlackboardValue::new("r", ValueType::scalar(ScalarKind::Bool));
        assert_ne!(a, c);
        assert_eq!(CelExpression::from(&a).as_str(), "r");
    }
}
