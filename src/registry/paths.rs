//! Hierarchical path table and longest-prefix mount table (spec.md §3, §4.6).

use crate::actor::ActorId;
use crate::error::RegistryError;

#[derive(Default)]
pub struct PathTable {
    entries: Vec<(String, ActorId)>,
}

impl PathTable {
    pub fn new() -> Self {
        PathTable { entries: Vec::new() }
    }

    pub fn register(&mut self, path: &str, id: ActorId) -> Result<(), RegistryError> {
        if self.lookup(path).is_some() {
            return Err(RegistryError::PathTaken(path.to_string()));
        }
        self.entries.push((path.to_string(), id));
        Ok(())
    }

    pub fn deregister(&mut self, path: &str) {
        self.entries.retain(|(p, _)| p != path);
    }

    pub fn deregister_owner(&mut self, owner: ActorId) -> Vec<String> {
        let (removed, kept): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|(_, id)| *id == owner);
        self.entries = kept;
        removed.into_iter().map(|(p, _)| p).collect()
    }

    pub fn lookup(&self, path: &str) -> Option<ActorId> {
        self.entries.iter().find(|(p, _)| p == path).map(|(_, id)| *id)
    }
}

/// Longest-prefix mount table (spec.md §4.6): a match requires the matched
/// path to end at a mount boundary (next char is `/` or end-of-string), so
/// `/api` matches `/api` and `/api/x` but not `/apiary`.
#[derive(Default)]
pub struct MountTable {
    mounts: Vec<(String, ActorId)>,
}

impl MountTable {
    pub fn new() -> Self {
        MountTable { mounts: Vec::new() }
    }

    pub fn mount(&mut self, prefix: &str, id: ActorId) {
        self.mounts.retain(|(p, _)| p != prefix);
        self.mounts.push((prefix.to_string(), id));
    }

    pub fn unmount(&mut self, prefix: &str) {
        self.mounts.retain(|(p, _)| p != prefix);
    }

    pub fn lookup(&self, path: &str) -> Option<ActorId> {
        self.mounts
            .iter()
            .filter(|(prefix, _)| {
                path.starts_with(prefix.as_str())
                    && path[prefix.len()..].chars().next().map(|c| c == '/').unwrap_or(true)
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, id)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_boundary_rejects_non_prefix_suffix() {
        let mut m = MountTable::new();
        let id = ActorId::new(0, 1);
        m.mount("/api", id);
        assert_eq!(m.lookup("/apiary"), None);
        assert_eq!(m.lookup("/api/x"), Some(id));
        assert_eq!(m.lookup("/api"), Some(id));
    }

    #[test]
    fn longest_prefix_wins() {
        let mut m = MountTable::new();
        let outer = ActorId::new(0, 1);
        let inner = ActorId::new(0, 2);
        m.mount("/api", outer);
        m.mount("/api/v2", inner);
        assert_eq!(m.lookup("/api/v2/users"), Some(inner));
        assert_eq!(m.lookup("/api/v1/users"), Some(outer));
    }

    #[test]
    fn duplicate_path_registration_fails() {
        let mut p = PathTable::new();
        let a = ActorId::new(0, 1);
        let b = ActorId::new(0, 2);
        p.register("/a", a).unwrap();
        assert!(p.register("/a", b).is_err());
    }
}
