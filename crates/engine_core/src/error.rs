//! Engine-level error types.

use engine_component::{ComponentError, Entity};

/// Errors surfaced to callers of the engine API.
///
/// Unknown system names have no variant: unregistering or toggling a
/// system that does not exist is a logged no-op.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown component type, shape violation, or invalid signature.
    #[error(transparent)]
    Component(#[from] ComponentError),

    /// The operation targets an entity that does not exist or was destroyed.
    #[error("entity {0} not found")]
    UnknownEntity(Entity),

    /// `start()` was called while the tick loop is already running.
    #[error("engine is already running")]
    AlreadyRunning,
}

impl EngineError {
    /// Returns `true` for [`ComponentError::UnknownComponentType`].
    #[must_use]
    pub fn is_unknown_component_type(&self) -> bool {
        matches!(
            self,
            EngineError::Component(ComponentError::UnknownComponentType(_))
        )
    }

    /// Returns `true` for [`ComponentError::ShapeViolation`].
    #[must_use]
    pub fn is_shape_violation(&self) -> bool {
        matches!(
            self,
            EngineError::Component(ComponentError::ShapeViolation { .. })
        )
    }
}
