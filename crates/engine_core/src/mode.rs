//! Modes: pluggable bundles of registrations.

use crate::engine::Engine;
use crate::error::EngineError;

/// A unit of behaviour installed into an engine with
/// [`Engine::use_mode`].
///
/// A mode registers whatever components, systems and listeners it needs.
/// Plain functions and closures taking `&mut Engine` are modes too.
pub trait Mode {
    /// Name used in log records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Register this mode's behaviour on `engine`.
    ///
    /// # Errors
    ///
    /// Returns the first registration error encountered.
    fn install(self, engine: &mut Engine) -> Result<(), EngineError>;
}

impl<F> Mode for F
where
    F: FnOnce(&mut Engine) -> Result<(), EngineError>,
{
    fn install(self, engine: &mut Engine) -> Result<(), EngineError> {
        self(engine)
    }
}
