//! Component-layer error types.

use crate::component::FieldKind;

/// Errors raised while registering, instantiating, or accessing components.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// The component name was never registered.
    #[error("unknown component type: {0}")]
    UnknownComponentType(String),

    /// A schema or override would give a component a shape other than its
    /// flat default shape.
    #[error("shape violation on '{component}' field '{field}': {reason}")]
    ShapeViolation {
        component: String,
        field: String,
        reason: String,
    },

    /// A typed read asked for a field under the wrong kind.
    #[error("field '{field}' of '{component}' is {found}, not {expected}")]
    FieldType {
        component: String,
        field: String,
        expected: FieldKind,
        found: FieldKind,
    },

    /// A system signature was empty or listed a component type twice.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

impl ComponentError {
    pub(crate) fn shape(
        component: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ShapeViolation {
            component: component.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}
