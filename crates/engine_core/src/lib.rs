//! # engine_core
//!
//! A single-process ECS runtime whose components, systems and event
//! listeners can be registered and replaced while it runs.
//!
//! - [`World`]: entity lifecycle and per-type component storage.
//! - [`QueryMatcher`]: cached signature matching over the world.
//! - [`SystemRegistry`]: named systems in registration order.
//! - [`EventBus`]: synchronous publish/subscribe with JSON payloads.
//! - [`Scheduler`]: tick counter and `Stopped`/`Running` state.
//! - [`Engine`]: the facade tying these together, plus [`Mode`] for
//!   installing bundles of registrations.
//!
//! Systems and listeners receive a [`SystemContext`]. Structural changes
//! they request are applied at the next tick boundary.

pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod mode;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod world;

pub use command::{CommandQueue, InitFn};
pub use config::EngineConfig;
pub use context::SystemContext;
pub use engine::Engine;
pub use error::EngineError;
pub use events::{EventBus, Listener, SYSTEM_FAILED, SubscriptionHandle};
pub use mode::Mode;
pub use query::QueryMatcher;
pub use registry::{SystemEntry, SystemRegistry, UpdateFn};
pub use scheduler::{Scheduler, SchedulerState, StopHandle, SystemFailure, TickReport};
pub use world::{EntityIndex, EntityView, Storage, World};

pub use engine_component::{
    ComponentError, ComponentInstance, ComponentSchema, Entity, FieldKind, FieldValue, Signature,
};
