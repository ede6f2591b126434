//! Name & path registry: flat name map, hierarchical path table, longest-prefix
//! mount table, and the synchronous `call` helper (spec.md §3, §4.6).

pub mod call;
mod names;
mod paths;

pub use call::call;
pub use names::NameTable;
pub use paths::{MountTable, PathTable};

use crate::actor::ActorId;
use crate::error::RegistryError;

/// Aggregates the three lookup structures. A lookup on a `/`-prefixed key
/// consults mounts first, then the path table (spec.md §3 "Mount table").
#[derive(Default)]
pub struct Registry {
    pub names: NameTable,
    pub paths: PathTable,
    pub mounts: MountTable,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, key: &str, id: ActorId) -> Result<(), RegistryError> {
        if key.starts_with('/') {
            self.paths.register(key, id)
        } else {
            self.names.register(key, id)
        }
    }

    pub fn deregister(&mut self, key: &str) {
        if key.starts_with('/') {
            self.paths.deregister(key);
        } else {
            self.names.deregister(key);
        }
    }

    /// spec.md §6 `lookup(name) -> actor_id?`, extended to paths: mounts
    /// take priority over the literal path table.
    pub fn lookup(&self, key: &str) -> Option<ActorId> {
        if key.starts_with('/') {
            self.mounts.lookup(key).or_else(|| self.paths.lookup(key))
        } else {
            self.names.lookup(key)
        }
    }

    pub fn reverse_lookup(&self, id: ActorId) -> Option<&str> {
        self.names.reverse_lookup(id)
    }

    /// Release every name and path owned by `owner` (actor cleanup, spec.md
    /// §4.3). Returns the keys removed so the caller can broadcast
    /// unregistration.
    pub fn deregister_owner(&mut self, owner: ActorId) -> Vec<String> {
        let mut removed = self.names.deregister_owner(owner);
        removed.extend(self.paths.deregister_owner(owner));
        removed
    }
}
