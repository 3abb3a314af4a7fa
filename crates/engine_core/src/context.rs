//! The narrow engine handle given to systems, listeners, and initialisers.
//!
//! A [`SystemContext`] exposes the event bus and the mutation API but never
//! the engine itself. Structural mutations are validated immediately, so
//! reference errors reach the caller, and then queued for the next boundary.
//! Component schemas and event subscriptions are not structural and change
//! at once.

use engine_component::{
    ComponentInstance, ComponentRegistry, ComponentSchema, Entity, EntityAllocator, Signature,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::command::{Command, CommandQueue, InitFn};
use crate::error::EngineError;
use crate::events::{EventBus, SubscriptionHandle};
use crate::registry::UpdateFn;
use crate::world::{EntityIndex, EntityView, Storage};

/// Capability handle passed to system code.
pub struct SystemContext<'a> {
    tick_id: u64,
    system: Option<&'a str>,
    allocator: &'a mut EntityAllocator,
    index: &'a EntityIndex,
    storage: &'a Storage,
    components: &'a mut ComponentRegistry,
    bus: &'a mut EventBus,
    queue: &'a mut CommandQueue,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        tick_id: u64,
        system: Option<&'a str>,
        allocator: &'a mut EntityAllocator,
        index: &'a EntityIndex,
        storage: &'a Storage,
        components: &'a mut ComponentRegistry,
        bus: &'a mut EventBus,
        queue: &'a mut CommandQueue,
    ) -> Self {
        Self {
            tick_id,
            system,
            allocator,
            index,
            storage,
            components,
            bus,
            queue,
        }
    }

    /// The current tick counter (the last completed tick outside the loop).
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Name of the system being updated, if any.
    #[must_use]
    pub fn system(&self) -> Option<&str> {
        self.system
    }

    // -- Entities --

    /// Reserve a fresh entity id. The entity becomes live at the boundary.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.queue.push(Command::Spawn(entity));
        entity
    }

    /// Queue destruction of an entity and all its components.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive or
    /// already queued for destruction.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.require_alive(entity)?;
        self.queue.push(Command::Despawn(entity));
        Ok(())
    }

    /// `true` if the entity is alive once the pending boundary is applied.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        (self.index.contains(entity) || self.queue.is_pending_spawn(entity))
            && !self.queue.is_pending_despawn(entity)
    }

    /// Queue attaching a default-valued component.
    ///
    /// # Errors
    ///
    /// See [`SystemContext::add_component_with`].
    pub fn add_component(&mut self, entity: Entity, component: &str) -> Result<(), EngineError> {
        self.add_component_with(entity, component, Value::Null)
    }

    /// Queue attaching a component with `overrides` merged over the current
    /// schema defaults. The instance is materialised now.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`], or a component error for an
    /// unregistered type or overrides outside the schema.
    pub fn add_component_with(
        &mut self,
        entity: Entity,
        component: &str,
        overrides: Value,
    ) -> Result<(), EngineError> {
        self.require_alive(entity)?;
        let instance = self.components.instantiate(component, &overrides)?;
        self.queue.push(Command::Attach { entity, instance });
        Ok(())
    }

    /// Queue detaching a component. Detaching a component the entity does not
    /// carry is a no-op at the boundary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn remove_component(&mut self, entity: Entity, component: &str) -> Result<(), EngineError> {
        self.require_alive(entity)?;
        self.queue.push(Command::Detach {
            entity,
            component: component.to_string(),
        });
        Ok(())
    }

    /// `true` if the entity carried `component` at the last boundary.
    #[must_use]
    pub fn has_component(&self, entity: Entity, component: &str) -> bool {
        self.index.has(entity, component)
    }

    /// Read another entity's component with its current field values.
    ///
    /// During a system update the components of the entity being updated
    /// are lent to its [`EntityView`] and read as `None` here.
    #[must_use]
    pub fn get_component(&self, entity: Entity, component: &str) -> Option<&ComponentInstance> {
        self.storage.get(entity, component)
    }

    fn require_alive(&self, entity: Entity) -> Result<(), EngineError> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(EngineError::UnknownEntity(entity))
        }
    }

    // -- Components --

    /// Register or overwrite a component schema from a JSON default shape.
    ///
    /// # Errors
    ///
    /// Returns a shape violation if the shape is not flat.
    pub fn register_component(&mut self, name: &str, shape: Value) -> Result<(), EngineError> {
        let replaced = self.components.register_shape(name, &shape)?;
        debug!(component = name, replaced = replaced.is_some(), "registered component");
        Ok(())
    }

    /// Register or overwrite a component schema.
    pub fn register_schema(&mut self, schema: ComponentSchema) {
        let name = schema.name().to_string();
        let replaced = self.components.register(schema);
        debug!(component = %name, replaced = replaced.is_some(), "registered component");
    }

    // -- Systems --

    /// Queue registration of a system.
    ///
    /// `init` runs exactly once, when the registration is applied, and
    /// returns the update function used every tick afterwards.
    ///
    /// # Errors
    ///
    /// Returns an invalid-signature error for an empty signature or a
    /// repeated component type.
    pub fn register_system<S, I, U>(
        &mut self,
        name: &str,
        signature: impl IntoIterator<Item = S>,
        init: I,
    ) -> Result<(), EngineError>
    where
        S: Into<String>,
        I: FnOnce(&mut SystemContext<'_>) -> U + 'static,
        U: FnMut(&mut SystemContext<'_>, &mut EntityView<'_>) -> anyhow::Result<()> + 'static,
    {
        let signature = Signature::new(signature)?;
        let init: InitFn = Box::new(move |ctx| Box::new(init(ctx)) as UpdateFn);
        self.queue.push(Command::RegisterSystem {
            name: name.to_string(),
            signature,
            init,
        });
        Ok(())
    }

    /// Queue removal of a system. Unknown names are ignored.
    pub fn unregister_system(&mut self, name: &str) {
        self.queue.push(Command::UnregisterSystem(name.to_string()));
    }

    /// Queue enabling or disabling a system. Unknown names are ignored.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) {
        self.queue.push(Command::SetSystemEnabled {
            name: name.to_string(),
            enabled,
        });
    }

    // -- Events --

    /// Subscribe a listener to `event`.
    pub fn on<F>(&mut self, event: &str, listener: F) -> SubscriptionHandle
    where
        F: Fn(&mut SystemContext<'_>, &Value) -> anyhow::Result<()> + 'static,
    {
        self.bus.subscribe(event, std::rc::Rc::new(listener))
    }

    /// Remove a subscription. Returns `false` if it was already removed.
    pub fn off(&mut self, handle: &SubscriptionHandle) -> bool {
        self.bus.unsubscribe(handle)
    }

    /// Invoke every listener subscribed to `event` at this moment, in
    /// subscription order. A failing listener is logged and does not stop
    /// the others.
    pub fn emit(&mut self, event: &str, payload: Value) {
        let listeners = self.bus.snapshot(event);
        if listeners.is_empty() {
            return;
        }
        debug!(
            tick_id = self.tick_id,
            event,
            listeners = listeners.len(),
            "emitting event"
        );
        for listener in listeners {
            if let Err(err) = listener(&mut *self, &payload) {
                warn!(tick_id = self.tick_id, event, error = %err, "event listener failed");
            }
        }
    }

    // -- Scheduler --

    /// Ask the tick loop to stop at the next boundary.
    pub fn stop(&mut self) {
        self.queue.request_stop();
    }
}

impl std::fmt::Debug for SystemContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemContext")
            .field("tick_id", &self.tick_id)
            .field("system", &self.system)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
