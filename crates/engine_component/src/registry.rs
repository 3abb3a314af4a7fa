//! Component schema registry.
//!
//! Schemas are keyed by component name. Registering a name again replaces
//! the schema used by future instantiations; instances that already exist
//! keep the fields and values they were created with.

use std::collections::HashMap;

use serde_json::Value;

use crate::component::{ComponentInstance, ComponentSchema};
use crate::error::ComponentError;

/// Registry of all component schemas known to an engine.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Schemas keyed by component name.
    schemas: HashMap<String, ComponentSchema>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Store a schema, returning the one it replaced, if any.
    pub fn register(&mut self, schema: ComponentSchema) -> Option<ComponentSchema> {
        self.schemas.insert(schema.name().to_string(), schema)
    }

    /// Parse and store a schema from a JSON default shape.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::ShapeViolation`] if the shape is not flat.
    /// Nothing is stored in that case.
    pub fn register_shape(
        &mut self,
        name: impl Into<String>,
        shape: &Value,
    ) -> Result<Option<ComponentSchema>, ComponentError> {
        let schema = ComponentSchema::from_json(name, shape)?;
        Ok(self.register(schema))
    }

    /// Returns the schema registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentSchema> {
        self.schemas.get(name)
    }

    /// Returns `true` if `name` has been registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Materialise a component from the current schema for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::UnknownComponentType`] for an unregistered
    /// name and [`ComponentError::ShapeViolation`] for bad overrides.
    pub fn instantiate(
        &self,
        name: &str,
        overrides: &Value,
    ) -> Result<ComponentInstance, ComponentError> {
        self.schemas
            .get(name)
            .ok_or_else(|| ComponentError::UnknownComponentType(name.to_string()))?
            .instantiate(overrides)
    }

    /// All registered component names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
