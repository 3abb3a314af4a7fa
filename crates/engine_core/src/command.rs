//! Deferred structural mutations.
//!
//! Systems and listeners never change the world's structure directly. Their
//! requests are recorded here and applied by the engine at the next
//! boundary: the end of the tick, or the end of the host call that ran them.
//! Field values are not structural and are written in place.

use std::collections::{HashSet, VecDeque};

use engine_component::{ComponentInstance, Entity, Signature};

use crate::context::SystemContext;
use crate::registry::UpdateFn;

/// A system initialiser, run once when its registration is applied.
pub type InitFn = Box<dyn FnOnce(&mut SystemContext<'_>) -> UpdateFn>;

/// One queued structural mutation.
pub(crate) enum Command {
    Spawn(Entity),
    Despawn(Entity),
    Attach {
        entity: Entity,
        instance: ComponentInstance,
    },
    Detach {
        entity: Entity,
        component: String,
    },
    RegisterSystem {
        name: String,
        signature: Signature,
        init: InitFn,
    },
    UnregisterSystem(String),
    SetSystemEnabled {
        name: String,
        enabled: bool,
    },
}

impl Command {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Command::Spawn(_) => "spawn",
            Command::Despawn(_) => "despawn",
            Command::Attach { .. } => "attach",
            Command::Detach { .. } => "detach",
            Command::RegisterSystem { .. } => "register_system",
            Command::UnregisterSystem(_) => "unregister_system",
            Command::SetSystemEnabled { .. } => "set_system_enabled",
        }
    }
}

/// FIFO of pending mutations plus the entity lifecycle they imply, so
/// callers can validate against the state the boundary will produce.
#[derive(Default)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
    pending_spawns: HashSet<Entity>,
    pending_despawns: HashSet<Entity>,
    stop_requested: bool,
}

impl CommandQueue {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, command: Command) {
        match &command {
            Command::Spawn(entity) => {
                self.pending_spawns.insert(*entity);
            }
            Command::Despawn(entity) => {
                self.pending_despawns.insert(*entity);
            }
            _ => {}
        }
        self.commands.push_back(command);
    }

    pub(crate) fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Move every command of `other` to the back of this queue.
    pub(crate) fn append(&mut self, other: &mut CommandQueue) {
        self.pending_spawns.extend(other.pending_spawns.drain());
        self.pending_despawns.extend(other.pending_despawns.drain());
        self.stop_requested |= std::mem::take(&mut other.stop_requested);
        self.commands.append(&mut other.commands);
    }

    /// `true` if a spawn of `entity` is waiting for the boundary.
    #[must_use]
    pub fn is_pending_spawn(&self, entity: Entity) -> bool {
        self.pending_spawns.contains(&entity)
    }

    /// `true` if a destruction of `entity` is waiting for the boundary.
    #[must_use]
    pub fn is_pending_despawn(&self, entity: Entity) -> bool {
        self.pending_despawns.contains(&entity)
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn take_stop(&mut self) -> bool {
        std::mem::take(&mut self.stop_requested)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.commands.iter().map(Command::kind).collect();
        f.debug_struct("CommandQueue")
            .field("commands", &kinds)
            .field("stop_requested", &self.stop_requested)
            .finish()
    }
}
