//! Node identity: "a short printable string; on POSIX it is `hostname` (or
//! its SHA-1 suffix when hostname is unavailable) optionally overridden by
//! an environment variable" (spec.md §6, SPEC_FULL.md §C).

use sha1::{Digest, Sha1};

const OVERRIDE_VAR: &str = "FINCH_NODE_IDENTITY";

/// Resolve this process's transport-handshake identity string.
pub fn node_identity() -> String {
    if let Ok(v) = std::env::var(OVERRIDE_VAR) {
        if !v.is_empty() {
            return v;
        }
    }
    if let Ok(h) = std::env::var("HOSTNAME") {
        if !h.is_empty() {
            return h;
        }
    }
    if let Ok(contents) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
        let h = contents.trim();
        if !h.is_empty() {
            return h.to_string();
        }
    }
    let mut hasher = Sha1::new();
    hasher.update(std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("node-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share one test: env vars are process-global, so toggling
    // `OVERRIDE_VAR` from two parallel tests would race.
    #[test]
    fn override_var_wins_then_falls_back_to_nonempty() {
        std::env::set_var(OVERRIDE_VAR, "test-node-1");
        assert_eq!(node_identity(), "test-node-1");
        std::env::remove_var(OVERRIDE_VAR);
        assert!(!node_identity().is_empty());
    }
}
