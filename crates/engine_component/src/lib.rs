//! # engine_component
//!
//! The "E" and "C" of the ECS: entity identity and runtime-described
//! component data.
//!
//! This crate provides:
//!
//! - [`Entity`]: lightweight `u64` entity identifiers.
//! - [`EntityAllocator`]: monotonically increasing, never-reused ID allocator.
//! - [`ComponentSchema`]: a flat, typed field list with default values.
//! - [`ComponentInstance`]: a per-entity record materialised from a schema.
//! - [`ComponentRegistry`]: named schemas with overwrite-on-register semantics.
//! - [`Signature`]: the component types a system requires.

pub mod component;
pub mod entity;
pub mod error;
pub mod query;
pub mod registry;

pub use component::{ComponentInstance, ComponentSchema, Field, FieldKind, FieldValue};
pub use entity::{Entity, EntityAllocator};
pub use error::ComponentError;
pub use query::Signature;
pub use registry::ComponentRegistry;
