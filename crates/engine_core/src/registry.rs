//! System registry: tracks registered systems in registration order.
//!
//! Each entry owns the update function produced by the system's initialiser.
//! Registering a name that already exists replaces the entry in place: the
//! old closure and whatever it captured are dropped, the new one takes the
//! same slot in the execution order, and the system is enabled again.

use engine_component::Signature;

use crate::context::SystemContext;
use crate::world::EntityView;

/// A system's per-entity update function.
pub type UpdateFn = Box<dyn FnMut(&mut SystemContext<'_>, &mut EntityView<'_>) -> anyhow::Result<()>>;

/// A registered system.
pub struct SystemEntry {
    name: String,
    signature: Signature,
    update: UpdateFn,
    enabled: bool,
    /// How many times this name has been (re-)registered.
    revision: u64,
}

impl SystemEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn update_mut(&mut self) -> &mut UpdateFn {
        &mut self.update
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl std::fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemEntry")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("enabled", &self.enabled)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

/// Registry of all systems known to an engine.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    /// Systems in registration order.
    systems: Vec<SystemEntry>,
}

impl SystemRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Register a system. Returns `true` if an existing system of the same
    /// name was replaced.
    pub fn register(&mut self, name: impl Into<String>, signature: Signature, update: UpdateFn) -> bool {
        let name = name.into();
        match self.systems.iter_mut().find(|s| s.name == name) {
            Some(entry) => {
                entry.signature = signature;
                entry.update = update;
                entry.enabled = true;
                entry.revision += 1;
                true
            }
            None => {
                self.systems.push(SystemEntry {
                    name,
                    signature,
                    update,
                    enabled: true,
                    revision: 1,
                });
                false
            }
        }
    }

    /// Remove a system. Returns `true` if it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.systems.iter().position(|s| s.name == name) {
            Some(pos) => {
                self.systems.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Enable or disable a system. Returns `false` for an unknown name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Returns a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SystemEntry> {
        self.systems.iter().find(|s| s.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut SystemEntry> {
        self.systems.iter_mut().find(|s| s.name == name)
    }

    /// Returns an iterator over all systems in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SystemEntry> {
        self.systems.iter()
    }

    /// Names and signatures of enabled systems, in registration order.
    #[must_use]
    pub fn enabled(&self) -> Vec<(String, Signature)> {
        self.systems
            .iter()
            .filter(|s| s.enabled)
            .map(|s| (s.name.clone(), s.signature.clone()))
            .collect()
    }

    /// Returns the number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
