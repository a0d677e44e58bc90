//! Command registry: name to frozen pipeline descriptor.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{CommandBuilder, CommandDescriptor};

/// Lookup table of command name to shared pipeline descriptor.
///
/// A process-global instance backs the bare [`command`] entry point; isolated
/// instances can be constructed so test suites do not share mutable global
/// state. All access goes through a lock, so a descriptor is never observed
/// half-registered.
#[derive(Default)]
pub struct CommandRegistry {
    entries: RwLock<HashMap<String, Arc<CommandDescriptor>>>,
}

impl CommandRegistry {
    /// Creates an empty, isolated registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-global registry used by [`command`].
    pub fn global() -> &'static CommandRegistry {
        static GLOBAL: OnceLock<CommandRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CommandRegistry::new)
    }

    /// Starts a builder for `name` against this registry.
    ///
    /// Creating the builder does not register anything; registration is a
    /// side effect of the builder's first stage call (or `build()`).
    pub fn command(&self, name: impl Into<String>) -> CommandBuilder<'_> {
        CommandBuilder::new(self, name.into())
    }

    /// Returns the descriptor registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.read_entries().get(name).cloned()
    }

    /// Returns true if a descriptor is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.read_entries().contains_key(name)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Registered command names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_entries().keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes every registration. Used to reset state between independent
    /// test runs or on reconfiguration.
    pub fn clear(&self) {
        self.write_entries().clear();
    }

    /// Get-or-insert the shared descriptor for `name`.
    pub(crate) fn obtain(&self, name: &str) -> Arc<CommandDescriptor> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let mut entries = self.write_entries();
        Arc::clone(
            entries
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(CommandDescriptor::new(name))),
        )
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<CommandDescriptor>>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<CommandDescriptor>>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl core::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

/// Starts a builder for `name` against the process-global registry.
pub fn command(name: impl Into<String>) -> CommandBuilder<'static> {
    CommandRegistry::global().command(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_before_any_stage_call() {
        let registry = CommandRegistry::new();
        assert!(registry.get("move").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let registry = CommandRegistry::new();
        registry.command("move").build();
        registry.command("attack").build();
        registry.command("cast-spell").build();

        assert_eq!(registry.names(), vec!["attack", "cast-spell", "move"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn global_entry_point_uses_one_shared_registry() {
        // Unique name to avoid colliding with other tests using the global
        // registry in the same process.
        let name = "registry-test.global-probe";
        assert!(CommandRegistry::global().get(name).is_none());

        let descriptor = command(name).build();
        let fetched = CommandRegistry::global().get(name).expect("registered");
        assert!(Arc::ptr_eq(&descriptor, &fetched));
    }

    #[test]
    fn clear_resets_all_registrations() {
        let registry = CommandRegistry::new();
        registry.command("a").build();
        registry.command("b").build();
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("a").is_none());
    }
}
