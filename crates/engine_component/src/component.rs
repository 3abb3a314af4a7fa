//! Component schemas and materialised component instances.
//!
//! Components are not Rust types: a mode describes each component type at
//! runtime with a [`ComponentSchema`], an ordered list of named fields that
//! each carry a typed default. A [`ComponentInstance`] is materialised from
//! the schema current at attach time and keeps that shape for its whole life.
//!
//! ## Flat shapes
//!
//! Field values are restricted to [`FieldValue`] primitives. Nested records,
//! arrays, `null`, and references to other entities cannot be expressed, so a
//! component can never alias another component's storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ComponentError;

/// The kind of a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldKind::Bool => "bool",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// A primitive component field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    /// Convert a JSON value into a field value.
    ///
    /// Returns `None` for anything that is not a flat primitive: `null`,
    /// arrays, and objects.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Int(i)),
                None => n.as_f64().map(FieldValue::Float),
            },
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Convert this value into JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(x) => Value::from(*x),
            FieldValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Convert this value to `kind`, if that keeps the field's shape.
    ///
    /// Only same-kind values and integer-to-float widening are accepted.
    #[must_use]
    pub fn coerce_to(self, kind: FieldKind) -> Option<Self> {
        match (self, kind) {
            (FieldValue::Int(i), FieldKind::Float) => Some(FieldValue::Float(i as f64)),
            (value, kind) if value.kind() == kind => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as `f64`, widening integers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(x) => Some(*x),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// A named field of a [`ComponentSchema`] with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub default: FieldValue,
}

/// The runtime description of a component type.
///
/// # Examples
///
/// ```rust
/// use engine_component::ComponentSchema;
///
/// let position = ComponentSchema::new("POSITION")
///     .with_field("x", 0.0)
///     .with_field("y", 0.0);
/// assert_eq!(position.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    name: String,
    fields: Vec<Field>,
}

impl ComponentSchema {
    /// Create a schema with no fields (a tag component).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field. Declaring the same field twice replaces its default.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, default: impl Into<FieldValue>) -> Self {
        let name = name.into();
        let default = default.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.default = default,
            None => self.fields.push(Field { name, default }),
        }
        self
    }

    /// Build a schema from a JSON default shape such as `{"x": 0, "y": 0}`.
    ///
    /// `null` and `{}` describe a tag component. Every field must be a flat
    /// primitive.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ShapeViolation`] for a non-object shape, an
    /// empty field name, or a non-primitive default.
    pub fn from_json(name: impl Into<String>, shape: &Value) -> Result<Self, ComponentError> {
        let name = name.into();
        let object = match shape {
            Value::Null => return Ok(Self::new(name)),
            Value::Object(object) => object,
            _ => {
                return Err(ComponentError::shape(
                    name,
                    "",
                    "default shape must be an object of primitive fields",
                ));
            }
        };

        let mut fields = Vec::with_capacity(object.len());
        for (field, value) in object {
            if field.is_empty() {
                return Err(ComponentError::shape(name, field, "field name is empty"));
            }
            let default = FieldValue::from_json(value).ok_or_else(|| {
                ComponentError::shape(
                    &name,
                    field,
                    "default must be a bool, number, or string (nested values are not allowed)",
                )
            })?;
            fields.push(Field {
                name: field.clone(),
                default,
            });
        }

        Ok(Self { name, fields })
    }

    /// The component type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field named `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` for a schema without fields.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.fields.is_empty()
    }

    /// Materialise an instance with every field at its default.
    #[must_use]
    pub fn instantiate_default(&self) -> ComponentInstance {
        ComponentInstance {
            type_name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.default.clone()))
                .collect(),
        }
    }

    /// Materialise an instance, merging `overrides` over the defaults.
    ///
    /// `overrides` is `null` or a JSON object naming a subset of the schema's
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ShapeViolation`] if an override names an
    /// unknown field, is not a primitive, or changes a field's kind.
    pub fn instantiate(&self, overrides: &Value) -> Result<ComponentInstance, ComponentError> {
        let mut instance = self.instantiate_default();
        let object = match overrides {
            Value::Null => return Ok(instance),
            Value::Object(object) => object,
            _ => {
                return Err(ComponentError::shape(
                    &self.name,
                    "",
                    "overrides must be an object",
                ));
            }
        };

        for (field, value) in object {
            let value = FieldValue::from_json(value).ok_or_else(|| {
                ComponentError::shape(&self.name, field, "override must be a primitive value")
            })?;
            instance.set(field, value)?;
        }

        Ok(instance)
    }
}

/// A component record attached to one entity.
///
/// The field set is fixed when the instance is created; only values change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    type_name: String,
    fields: Vec<(String, FieldValue)>,
}

impl ComponentInstance {
    /// The component type this instance was created from.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    /// Overwrite the value of an existing field.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ShapeViolation`] if the field does not exist
    /// or the value would change the field's kind.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), ComponentError> {
        let value = value.into();
        let Some((_, slot)) = self.fields.iter_mut().find(|(name, _)| name == field) else {
            return Err(ComponentError::shape(
                &self.type_name,
                field,
                "field is not part of the component's shape",
            ));
        };
        let expected = slot.kind();
        let found = value.kind();
        *slot = value.coerce_to(expected).ok_or_else(|| {
            ComponentError::shape(
                &self.type_name,
                field,
                format!("expected {expected}, got {found}"),
            )
        })?;
        Ok(())
    }

    /// Read a float field (integer fields are widened).
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not numeric.
    pub fn get_f64(&self, field: &str) -> Result<f64, ComponentError> {
        let value = self.require(field)?;
        value.as_f64().ok_or_else(|| self.type_error(field, FieldKind::Float, value))
    }

    /// Read an integer field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not an integer.
    pub fn get_i64(&self, field: &str) -> Result<i64, ComponentError> {
        let value = self.require(field)?;
        value.as_i64().ok_or_else(|| self.type_error(field, FieldKind::Int, value))
    }

    /// Read a boolean field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a boolean.
    pub fn get_bool(&self, field: &str) -> Result<bool, ComponentError> {
        let value = self.require(field)?;
        value.as_bool().ok_or_else(|| self.type_error(field, FieldKind::Bool, value))
    }

    /// Read a text field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not text.
    pub fn get_str(&self, field: &str) -> Result<&str, ComponentError> {
        let value = self.require(field)?;
        value.as_str().ok_or_else(|| self.type_error(field, FieldKind::Text, value))
    }

    /// Iterate over `(field, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` for a tag instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the field values as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(object)
    }

    fn require(&self, field: &str) -> Result<&FieldValue, ComponentError> {
        self.get(field).ok_or_else(|| {
            ComponentError::shape(
                &self.type_name,
                field,
                "field is not part of the component's shape",
            )
        })
    }

    fn type_error(&self, field: &str, expected: FieldKind, found: &FieldValue) -> ComponentError {
        ComponentError::FieldType {
            component: self.type_name.clone(),
            field: field.to_string(),
            expected,
            found: found.kind(),
        }
    }
}
