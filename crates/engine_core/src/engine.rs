//! The engine facade.
//!
//! [`Engine`] owns the world, the system registry, the query matcher, the
//! event bus and the scheduler. Host calls made between ticks apply at once.
//! Inside a tick, systems and listeners see only a [`SystemContext`]; their
//! structural requests are queued and applied at the boundary that closes
//! the tick.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use engine_component::{ComponentInstance, ComponentSchema, Entity, Signature};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::command::{Command, CommandQueue};
use crate::config::EngineConfig;
use crate::context::SystemContext;
use crate::error::EngineError;
use crate::events::{EventBus, SYSTEM_FAILED, SubscriptionHandle};
use crate::mode::Mode;
use crate::query::QueryMatcher;
use crate::registry::SystemRegistry;
use crate::scheduler::{self, Scheduler, SchedulerState, StopHandle, SystemFailure, TickReport};
use crate::world::{EntityView, World};

/// A live-pluggable ECS engine instance.
pub struct Engine {
    id: Uuid,
    config: EngineConfig,
    world: World,
    systems: SystemRegistry,
    matcher: QueryMatcher,
    bus: EventBus,
    scheduler: Scheduler,
    failures: Vec<SystemFailure>,
}

impl Engine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let id = Uuid::new_v4();
        debug!(engine = %id, tick_rate = ?config.tick_rate, "engine created");
        Self {
            id,
            config,
            world: World::new(),
            systems: SystemRegistry::new(),
            matcher: QueryMatcher::new(),
            bus: EventBus::new(),
            scheduler: Scheduler::new(),
            failures: Vec::new(),
        }
    }

    /// Identifier attached to this engine's log records.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the entity store.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Read access to the system registry.
    #[must_use]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    // -- Modes --

    /// Install a mode: a bundle of component, system and listener
    /// registrations applied as one unit.
    ///
    /// # Errors
    ///
    /// Propagates the first error the mode returns. Registrations it made
    /// before failing stay in place.
    pub fn use_mode<M: Mode>(&mut self, mode: M) -> Result<(), EngineError> {
        let name = mode.name().to_string();
        debug!(engine = %self.id, mode = %name, "installing mode");
        if let Err(err) = mode.install(self) {
            warn!(engine = %self.id, mode = %name, error = %err, "mode installation failed");
            return Err(err);
        }
        info!(
            engine = %self.id,
            mode = %name,
            systems = self.systems.len(),
            components = self.world.components().len(),
            "mode installed"
        );
        Ok(())
    }

    // -- Components --

    /// Register or overwrite a component type from a JSON default shape.
    /// Existing instances keep the shape they were created with.
    ///
    /// # Errors
    ///
    /// Returns a shape violation if `shape` is not a flat object of
    /// primitives (or `null` for a tag).
    pub fn register_component(&mut self, name: &str, shape: Value) -> Result<(), EngineError> {
        let replaced = self.world.components().contains(name);
        let schema = ComponentSchema::from_json(name, &shape)?;
        self.world.register_schema(schema);
        debug!(engine = %self.id, component = name, replaced, "registered component");
        Ok(())
    }

    /// Register or overwrite a component type from a prepared schema.
    pub fn register_schema(&mut self, schema: ComponentSchema) {
        let name = schema.name().to_string();
        let replaced = self.world.register_schema(schema).is_some();
        debug!(engine = %self.id, component = %name, replaced, "registered component");
    }

    /// Registered component type names, sorted.
    #[must_use]
    pub fn component_names(&self) -> Vec<&str> {
        self.world.components().names()
    }

    // -- Systems --

    /// Register (or replace) a system. `init` runs right away with a
    /// context and returns the per-entity update function.
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
        self.with_context(move |ctx| ctx.register_system(name, signature, init))
    }

    /// Remove a system. Unknown names are logged and ignored.
    pub fn unregister_system(&mut self, name: &str) {
        self.apply_boundary_with(Command::UnregisterSystem(name.to_string()));
    }

    /// Enable or disable a system without unregistering it.
    pub fn set_system_enabled(&mut self, name: &str, enabled: bool) {
        self.apply_boundary_with(Command::SetSystemEnabled {
            name: name.to_string(),
            enabled,
        });
    }

    /// Whether a system is enabled, or `None` if it is not registered.
    #[must_use]
    pub fn is_system_enabled(&self, name: &str) -> Option<bool> {
        self.systems.get(name).map(|entry| entry.is_enabled())
    }

    /// Registered system names in execution order.
    #[must_use]
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|entry| entry.name()).collect()
    }

    // -- Entities --

    pub fn create_entity(&mut self) -> Entity {
        let entity = self.world.spawn();
        debug!(engine = %self.id, entity = %entity, "created entity");
        entity
    }

    /// Destroy an entity and all of its components.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.world.despawn(entity)?;
        debug!(engine = %self.id, entity = %entity, "destroyed entity");
        Ok(())
    }

    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.exists(entity)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.world.entity_count()
    }

    /// Live entities in creation order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.world.entities()
    }

    /// Attach a default-valued component, replacing any existing instance
    /// of the same type.
    ///
    /// # Errors
    ///
    /// See [`Engine::add_component_with`].
    pub fn add_component(&mut self, entity: Entity, component: &str) -> Result<(), EngineError> {
        self.add_component_with(entity, component, Value::Null)
    }

    /// Attach a component with `overrides` merged over the schema defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] for a dead entity, or a
    /// component error for an unregistered type or overrides outside the
    /// schema.
    pub fn add_component_with(
        &mut self,
        entity: Entity,
        component: &str,
        overrides: Value,
    ) -> Result<(), EngineError> {
        self.world.add_component(entity, component, &overrides)?;
        debug!(engine = %self.id, entity = %entity, component, "attached component");
        Ok(())
    }

    /// Detach a component. Detaching a component the entity does not carry
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEntity`] if the entity is not alive.
    pub fn remove_component(&mut self, entity: Entity, component: &str) -> Result<(), EngineError> {
        if self.world.remove_component(entity, component)?.is_some() {
            debug!(engine = %self.id, entity = %entity, component, "detached component");
        }
        Ok(())
    }

    #[must_use]
    pub fn get_component(&self, entity: Entity, component: &str) -> Option<&ComponentInstance> {
        self.world.get_component(entity, component)
    }

    pub fn get_component_mut(
        &mut self,
        entity: Entity,
        component: &str,
    ) -> Option<&mut ComponentInstance> {
        self.world.get_component_mut(entity, component)
    }

    #[must_use]
    pub fn has_component(&self, entity: Entity, component: &str) -> bool {
        self.world.has_component(entity, component)
    }

    /// Entities carrying every type of `signature`, in creation order.
    /// Computed from storage on each call; only system signatures are cached.
    #[must_use]
    pub fn query(&self, signature: &Signature) -> Vec<Entity> {
        self.world.storage().intersect(&signature.match_key())
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

    /// Emit `event` synchronously to the listeners subscribed at this
    /// moment. Structural changes a listener requests are applied before the
    /// next listener runs, so each one sees the changes of those before it.
    pub fn emit(&mut self, event: &str, payload: Value) {
        let listeners = self.bus.snapshot(event);
        if listeners.is_empty() {
            return;
        }
        debug!(engine = %self.id, event, listeners = listeners.len(), "emitting event");
        for listener in listeners {
            if let Err(err) = self.with_context(|ctx| listener(ctx, &payload)) {
                warn!(engine = %self.id, event, error = %err, "event listener failed");
            }
        }
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.bus.listener_count(event)
    }

    // -- Scheduler --

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// The id of the last tick that ran (0 before the first).
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.scheduler.tick_id()
    }

    /// A thread-safe handle that stops a running loop at the next boundary.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    /// Request a stop at the next tick boundary. Called while no loop is
    /// running, the request stays pending and the next `start` ends after its
    /// first tick. A loop that already holds the engine is stopped through
    /// [`Engine::stop_handle`] or [`SystemContext::stop`].
    pub fn stop(&mut self) {
        self.scheduler.request_stop();
        debug!(engine = %self.id, state = ?self.scheduler.state(), "stop requested");
    }

    /// Drain the failures recorded since the last call.
    pub fn take_failures(&mut self) -> Vec<SystemFailure> {
        std::mem::take(&mut self.failures)
    }

    /// Run the tick loop on the current thread until a stop is requested or
    /// `max_ticks` is reached. Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] if a loop is already running.
    pub fn start(&mut self) -> Result<u64, EngineError> {
        self.scheduler.begin()?;
        let budget = self.config.tick_duration();
        info!(
            engine = %self.id,
            tick_rate = ?self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            systems = self.systems.len(),
            "tick loop starting"
        );

        let mut ticks = 0u64;
        loop {
            let started = Instant::now();
            let report = self.tick();
            ticks += 1;

            if self.reached_max_ticks(ticks) || !self.scheduler.keep_running() {
                break;
            }
            scheduler::pace(report.tick_id, started, budget);
        }

        info!(engine = %self.id, ticks, tick_id = self.tick_id(), "tick loop stopped");
        Ok(ticks)
    }

    /// Async variant of [`Engine::start`], paced by a tokio interval.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] if a loop is already running.
    pub async fn start_async(&mut self) -> Result<u64, EngineError> {
        self.scheduler.begin()?;
        let budget = self.config.tick_duration();
        let mut interval = budget.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        info!(
            engine = %self.id,
            tick_rate = ?self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "async tick loop starting"
        );

        let mut ticks = 0u64;
        loop {
            match interval.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => tokio::task::yield_now().await,
            }

            let started = Instant::now();
            let report = self.tick();
            ticks += 1;
            if let Some(budget) = budget {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    scheduler::warn_over_budget(report.tick_id, elapsed, budget);
                }
            }

            if self.reached_max_ticks(ticks) || !self.scheduler.keep_running() {
                break;
            }
        }

        info!(engine = %self.id, ticks, tick_id = self.tick_id(), "async tick loop stopped");
        Ok(ticks)
    }

    fn reached_max_ticks(&mut self, ticks: u64) -> bool {
        if self.config.max_ticks > 0 && ticks >= self.config.max_ticks {
            self.scheduler.halt();
            return true;
        }
        false
    }

    /// Run exactly one tick.
    ///
    /// The enabled systems and each one's matching entities are fixed when
    /// the tick starts. Every system runs over its entities in creation
    /// order, in registration order. A system whose update fails is stopped
    /// for the rest of the tick and disabled. Queued structural changes are
    /// applied when the tick ends.
    pub fn tick(&mut self) -> TickReport {
        let tick_id = self.scheduler.advance();
        let plan: Vec<(String, Signature, Vec<Entity>)> = self
            .systems
            .enabled()
            .into_iter()
            .map(|(name, signature)| {
                let entities = self.matcher.matching(&self.world, &signature);
                (name, signature, entities)
            })
            .collect();
        debug!(engine = %self.id, tick_id, systems = plan.len(), "tick started");

        let threshold = self.config.slow_system_threshold();
        let mut report = TickReport::new(tick_id);
        let mut queue = CommandQueue::new();

        for (name, signature, entities) in &plan {
            let Some(entry) = self.systems.get_mut(name) else {
                continue;
            };
            let started = Instant::now();
            let mut invoked = 0usize;
            let mut failure = None;
            {
                let parts = self.world.split();
                for &entity in entities {
                    let Some(mut components) = parts.storage.take(entity, signature) else {
                        continue;
                    };
                    let outcome = {
                        let mut view = EntityView::new(entity, signature, &mut components);
                        let mut ctx = SystemContext::new(
                            tick_id,
                            Some(name.as_str()),
                            &mut *parts.allocator,
                            parts.index,
                            &*parts.storage,
                            &mut *parts.components,
                            &mut self.bus,
                            &mut queue,
                        );
                        let update = entry.update_mut();
                        panic::catch_unwind(AssertUnwindSafe(|| update(&mut ctx, &mut view)))
                    };
                    parts.storage.restore(entity, components);
                    invoked += 1;
                    let message = match outcome {
                        Ok(Ok(())) => continue,
                        Ok(Err(err)) => format!("{err:#}"),
                        Err(payload) => panic_message(payload.as_ref()),
                    };
                    failure = Some(SystemFailure {
                        system: name.clone(),
                        tick_id,
                        entity: Some(entity),
                        message,
                    });
                    break;
                }
            }

            let elapsed = started.elapsed();
            if elapsed > threshold {
                warn!(
                    engine = %self.id,
                    tick_id,
                    system = %name,
                    entities = invoked,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow system"
                );
            }
            report.invocations.push((name.clone(), invoked));

            if let Some(failure) = failure {
                entry.set_enabled(false);
                error!(
                    engine = %self.id,
                    tick_id,
                    system = %name,
                    entity = ?failure.entity,
                    error = %failure.message,
                    "system update failed, system disabled"
                );
                let payload = serde_json::to_value(&failure).unwrap_or(Value::Null);
                let parts = self.world.split();
                let mut ctx = SystemContext::new(
                    tick_id,
                    Some(name.as_str()),
                    parts.allocator,
                    parts.index,
                    parts.storage,
                    parts.components,
                    &mut self.bus,
                    &mut queue,
                );
                ctx.emit(SYSTEM_FAILED, payload);
                report.failures.push(failure);
            }
        }

        self.failures.extend(report.failures.iter().cloned());
        let recorded = self.failures.len();
        report.applied = self.apply_boundary(queue);
        report
            .failures
            .extend(self.failures[recorded..].iter().cloned());
        debug!(
            engine = %self.id,
            tick_id,
            invocations = report.total_invocations(),
            applied = report.applied,
            "tick complete"
        );
        report
    }

    // -- Boundary --

    /// Run `f` with a context outside any tick, then apply whatever it
    /// queued.
    fn with_context<R>(&mut self, f: impl FnOnce(&mut SystemContext<'_>) -> R) -> R {
        let mut queue = CommandQueue::new();
        let result = {
            let parts = self.world.split();
            let mut ctx = SystemContext::new(
                self.scheduler.tick_id(),
                None,
                parts.allocator,
                parts.index,
                parts.storage,
                parts.components,
                &mut self.bus,
                &mut queue,
            );
            f(&mut ctx)
        };
        self.apply_boundary(queue);
        result
    }

    fn apply_boundary_with(&mut self, command: Command) {
        let mut queue = CommandQueue::new();
        queue.push(command);
        self.apply_boundary(queue);
    }

    /// Apply queued commands in FIFO order. Commands queued by system
    /// initialisers while applying form the next round. Returns the number
    /// of commands applied.
    fn apply_boundary(&mut self, mut queue: CommandQueue) -> usize {
        let mut applied = 0;
        let mut rounds = 0;
        while !queue.is_empty() {
            rounds += 1;
            if rounds > self.config.max_boundary_rounds {
                warn!(
                    engine = %self.id,
                    tick_id = self.scheduler.tick_id(),
                    dropped = queue.len(),
                    "boundary did not settle, dropping queued commands"
                );
                break;
            }
            let mut next = CommandQueue::new();
            while let Some(command) = queue.pop() {
                self.apply_command(command, &mut next);
                applied += 1;
            }
            if queue.take_stop() {
                self.scheduler.request_stop();
            }
            queue = next;
        }
        if queue.take_stop() {
            self.scheduler.request_stop();
        }
        if applied > 0 {
            debug!(
                engine = %self.id,
                tick_id = self.scheduler.tick_id(),
                applied,
                rounds,
                "applied deferred commands"
            );
        }
        applied
    }

    fn apply_command(&mut self, command: Command, next: &mut CommandQueue) {
        match command {
            Command::Spawn(entity) => {
                self.world.spawn_reserved(entity);
            }
            Command::Despawn(entity) => {
                if let Err(err) = self.world.despawn(entity) {
                    warn!(engine = %self.id, entity = %entity, error = %err, "dropping deferred despawn");
                }
            }
            Command::Attach { entity, instance } => {
                let component = instance.type_name().to_string();
                if let Err(err) = self.world.attach(entity, instance) {
                    warn!(
                        engine = %self.id,
                        entity = %entity,
                        component = %component,
                        error = %err,
                        "dropping deferred attach"
                    );
                }
            }
            Command::Detach { entity, component } => {
                if let Err(err) = self.world.remove_component(entity, &component) {
                    warn!(
                        engine = %self.id,
                        entity = %entity,
                        component = %component,
                        error = %err,
                        "dropping deferred detach"
                    );
                }
            }
            Command::RegisterSystem {
                name,
                signature,
                init,
            } => {
                let outcome = {
                    let parts = self.world.split();
                    let mut ctx = SystemContext::new(
                        self.scheduler.tick_id(),
                        Some(name.as_str()),
                        parts.allocator,
                        parts.index,
                        parts.storage,
                        parts.components,
                        &mut self.bus,
                        next,
                    );
                    panic::catch_unwind(AssertUnwindSafe(|| init(&mut ctx)))
                };
                let update = match outcome {
                    Ok(update) => update,
                    Err(payload) => {
                        let failure = SystemFailure {
                            system: name,
                            tick_id: self.scheduler.tick_id(),
                            entity: None,
                            message: panic_message(payload.as_ref()),
                        };
                        error!(
                            engine = %self.id,
                            tick_id = failure.tick_id,
                            system = %failure.system,
                            error = %failure.message,
                            "system init failed, registration skipped"
                        );
                        let payload = serde_json::to_value(&failure).unwrap_or(Value::Null);
                        {
                            let parts = self.world.split();
                            let mut ctx = SystemContext::new(
                                failure.tick_id,
                                Some(failure.system.as_str()),
                                parts.allocator,
                                parts.index,
                                parts.storage,
                                parts.components,
                                &mut self.bus,
                                next,
                            );
                            ctx.emit(SYSTEM_FAILED, payload);
                        }
                        self.failures.push(failure);
                        return;
                    }
                };
                let types = signature.types().to_vec();
                let replaced = self.systems.register(name.as_str(), signature, update);
                info!(
                    engine = %self.id,
                    system = %name,
                    signature = ?types,
                    replaced,
                    "registered system"
                );
            }
            Command::UnregisterSystem(name) => {
                if self.systems.unregister(&name) {
                    self.matcher
                        .retain_signatures(self.systems.iter().map(|entry| entry.signature()));
                    info!(engine = %self.id, system = %name, "unregistered system");
                } else {
                    warn!(engine = %self.id, system = %name, "unregister of unknown system ignored");
                }
            }
            Command::SetSystemEnabled { name, enabled } => {
                if self.systems.set_enabled(&name, enabled) {
                    debug!(engine = %self.id, system = %name, enabled, "system toggled");
                } else {
                    warn!(engine = %self.id, system = %name, enabled, "toggle of unknown system ignored");
                }
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("state", &self.scheduler.state())
            .field("tick_id", &self.scheduler.tick_id())
            .field("entities", &self.world.entity_count())
            .field("systems", &self.systems)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::with_config(EngineConfig::new().with_tick_rate(None));
        engine
            .register_component("POSITION", json!({"x": 0.0, "y": 0.0}))
            .unwrap();
        engine
            .register_component("VELOCITY", json!({"x": 1.0, "y": 0.0}))
            .unwrap();
        engine
    }

    #[test]
    fn test_tick_moves_entities() {
        let mut engine = engine();
        let e = engine.create_entity();
        engine.add_component(e, "POSITION").unwrap();
        engine.add_component(e, "VELOCITY").unwrap();
        engine
            .register_system("movement", ["POSITION", "VELOCITY"], |_ctx| {
                |_ctx: &mut SystemContext<'_>, view: &mut EntityView<'_>| -> anyhow::Result<()> {
                    let vx = view
                        .get("VELOCITY")
                        .ok_or_else(|| anyhow::anyhow!("no velocity"))?
                        .get_f64("x")?;
                    let pos = view
                        .get_mut("POSITION")
                        .ok_or_else(|| anyhow::anyhow!("no position"))?;
                    let x = pos.get_f64("x")?;
                    pos.set("x", x + vx)?;
                    Ok(())
                }
            })
            .unwrap();

        let report = engine.tick();
        assert_eq!(report.tick_id, 1);
        assert_eq!(report.invocations_of("movement"), 1);
        engine.tick();
        let x = engine.get_component(e, "POSITION").unwrap().get_f64("x").unwrap();
        assert_eq!(x, 2.0);
    }

    #[test]
    fn test_init_runs_once_at_registration() {
        let mut engine = engine();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        engine
            .register_system("counted", ["POSITION"], move |_ctx| {
                *counter.borrow_mut() += 1;
                |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> { Ok(()) }
            })
            .unwrap();
        assert_eq!(*calls.borrow(), 1);
        engine.tick();
        engine.tick();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let mut engine = engine();
        let empty: [&str; 0] = [];
        let err = engine
            .register_system("bad", empty, |_ctx| {
                |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> { Ok(()) }
            })
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Component(engine_component::ComponentError::InvalidSignature(_))
        ));
        assert!(engine.system_names().is_empty());
    }

    #[test]
    fn test_failing_system_is_disabled() {
        let mut engine = engine();
        for _ in 0..3 {
            let e = engine.create_entity();
            engine.add_component(e, "POSITION").unwrap();
        }
        engine
            .register_system("broken", ["POSITION"], |_ctx| {
                |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> {
                    Err(anyhow::anyhow!("boom"))
                }
            })
            .unwrap();

        let report = engine.tick();
        assert_eq!(report.invocations_of("broken"), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(engine.is_system_enabled("broken"), Some(false));

        let failures = engine.take_failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("boom"));
        assert!(engine.take_failures().is_empty());

        let report = engine.tick();
        assert_eq!(report.invocations_of("broken"), 0);
    }

    #[test]
    fn test_panicking_system_is_contained() {
        let mut engine = engine();
        let e = engine.create_entity();
        engine.add_component(e, "POSITION").unwrap();
        engine
            .register_system("panics", ["POSITION"], |_ctx| {
                |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> {
                    panic!("kaboom")
                }
            })
            .unwrap();

        let report = engine.tick();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].message.contains("kaboom"));
        assert_eq!(report.failures[0].entity, Some(e));
    }

    #[test]
    fn test_stop_from_system_ends_start() {
        let mut engine = engine();
        let e = engine.create_entity();
        engine.add_component(e, "POSITION").unwrap();
        engine
            .register_system("stopper", ["POSITION"], |_ctx| {
                |ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> {
                    if ctx.tick_id() >= 3 {
                        ctx.stop();
                    }
                    Ok(())
                }
            })
            .unwrap();

        let ticks = engine.start().unwrap();
        assert_eq!(ticks, 3);
        assert_eq!(engine.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_max_ticks_bounds_start() {
        let mut engine = Engine::with_config(
            EngineConfig::new().with_tick_rate(None).with_max_ticks(5),
        );
        assert_eq!(engine.start().unwrap(), 5);
        assert_eq!(engine.tick_id(), 5);
        assert_eq!(engine.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_unknown_system_toggle_is_noop() {
        let mut engine = engine();
        engine.set_system_enabled("ghost", false);
        engine.unregister_system("ghost");
        assert!(engine.system_names().is_empty());
    }

    #[test]
    fn test_host_emit_applies_listener_mutations() {
        let mut engine = engine();
        engine.on("spawn", |ctx, _payload| {
            let e = ctx.create_entity();
            ctx.add_component(e, "POSITION")?;
            Ok(())
        });
        engine.emit("spawn", Value::Null);
        assert_eq!(engine.entity_count(), 1);
        let e = engine.entities()[0];
        assert!(engine.has_component(e, "POSITION"));
    }

    #[test]
    fn test_boundary_rounds_are_bounded() {
        let mut engine = Engine::with_config(
            EngineConfig::new()
                .with_tick_rate(None)
                .with_max_boundary_rounds(4),
        );
        engine
            .register_component("POSITION", json!({"x": 0.0}))
            .unwrap();

        fn spawner(depth: u32) -> crate::command::InitFn {
            Box::new(move |ctx: &mut SystemContext<'_>| -> crate::registry::UpdateFn {
                let name = format!("s{depth}");
                ctx.register_system(&name, ["POSITION"], spawner(depth + 1))
                    .unwrap();
                Box::new(
                    |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> {
                        Ok(())
                    },
                )
            })
        }

        engine.register_system("s0", ["POSITION"], spawner(1)).unwrap();
        assert_eq!(engine.systems().len(), 4);
    }

    #[test]
    fn test_host_queries_leave_cache_alone() {
        let mut engine = engine();
        let e = engine.create_entity();
        engine.add_component(e, "POSITION").unwrap();
        engine
            .register_system("watch", ["POSITION"], |_ctx| {
                |_ctx: &mut SystemContext<'_>, _view: &mut EntityView<'_>| -> anyhow::Result<()> { Ok(()) }
            })
            .unwrap();
        engine.tick();
        assert_eq!(engine.matcher.cached(), 1);

        for i in 0..16 {
            let name = format!("ADHOC{i}");
            engine.register_component(&name, Value::Null).unwrap();
            engine.add_component(e, &name).unwrap();
            let signature = Signature::new(["POSITION".to_string(), name]).unwrap();
            assert_eq!(engine.query(&signature), vec![e]);
            assert_eq!(engine.query(&signature), engine.world().scan(&signature));
        }
        engine.tick();
        assert_eq!(engine.matcher.cached(), 1);
    }
}
