//! Kernel tunables, following the `SystemConfig` shape of the airssys-rt
//! example: named `DEFAULT_*` constants, a `Default` impl, and a small
//! builder. Loadable from a TOML file for deployments that want one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity of the actor slot table.
pub const DEFAULT_ACTOR_TABLE_CAPACITY: usize = 4096;

/// Default bounded mailbox capacity when a spawn call does not override it.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// `poll(timeout=100ms)` figure from spec.md §4.3's run loop.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default number of connection slots (HTTP/WS/SSE).
pub const DEFAULT_CONNECTION_SLOTS: usize = 1024;

/// Default number of concurrent cross-node transports.
pub const DEFAULT_TRANSPORT_SLOTS: usize = 64;

/// Default step budget for the synchronous `call` helper (§4.6).
pub const DEFAULT_CALL_STEP_BUDGET: u32 = 10_000;

/// Kernel-wide configuration. Constructed with [`KernelConfig::default`] or
/// via [`KernelConfig::builder`]; optionally loaded from a TOML file with
/// [`KernelConfig::from_toml_str`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KernelConfig {
    pub actor_table_capacity: usize,
    pub default_mailbox_capacity: usize,
    #[serde(with = "duration_millis")]
    pub poll_timeout: Duration,
    pub connection_slots: usize,
    pub transport_slots: usize,
    pub call_step_budget: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            actor_table_capacity: DEFAULT_ACTOR_TABLE_CAPACITY,
            default_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            connection_slots: DEFAULT_CONNECTION_SLOTS,
            transport_slots: DEFAULT_TRANSPORT_SLOTS,
            call_step_budget: DEFAULT_CALL_STEP_BUDGET,
        }
    }
}

impl KernelConfig {
    pub fn builder() -> KernelConfigBuilder {
        KernelConfigBuilder::default()
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

/// Builder for [`KernelConfig`]; unset fields fall back to the defaults.
#[derive(Debug, Default)]
pub struct KernelConfigBuilder {
    inner: OverrideSet,
}

#[derive(Debug, Default)]
struct OverrideSet {
    actor_table_capacity: Option<usize>,
    default_mailbox_capacity: Option<usize>,
    poll_timeout: Option<Duration>,
    connection_slots: Option<usize>,
    transport_slots: Option<usize>,
    call_step_budget: Option<u32>,
}

impl KernelConfigBuilder {
    pub fn with_actor_table_capacity(mut self, cap: usize) -> Self {
        self.inner.actor_table_capacity = Some(cap);
        self
    }

    pub fn with_default_mailbox_capacity(mut self, cap: usize) -> Self {
        self.inner.default_mailbox_capacity = Some(cap);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.inner.poll_timeout = Some(timeout);
        self
    }

    pub fn with_connection_slots(mut self, slots: usize) -> Self {
        self.inner.connection_slots = Some(slots);
        self
    }

    pub fn with_transport_slots(mut self, slots: usize) -> Self {
        self.inner.transport_slots = Some(slots);
        self
    }

    pub fn with_call_step_budget(mut self, budget: u32) -> Self {
        self.inner.call_step_budget = Some(budget);
        self
    }

    pub fn build(self) -> KernelConfig {
        let defaults = KernelConfig::default();
        KernelConfig {
            actor_table_capacity: self.inner.actor_table_capacity.unwrap_or(defaults.actor_table_capacity),
            default_mailbox_capacity: self
                .inner
                .default_mailbox_capacity
                .unwrap_or(defaults.default_mailbox_capacity),
            poll_timeout: self.inner.poll_timeout.unwrap_or(defaults.poll_timeout),
            connection_slots: self.inner.connection_slots.unwrap_or(defaults.connection_slots),
            transport_slots: self.inner.transport_slots.unwrap_or(defaults.transport_slots),
            call_step_budget: self.inner.call_step_budget.unwrap_or(defaults.call_step_budget),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_named_constants() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.actor_table_capacity, DEFAULT_ACTOR_TABLE_CAPACITY);
        assert_eq!(cfg.poll_timeout, DEFAULT_POLL_TIMEOUT);
    }

    #[test]
    fn builder_overrides_only_set_fields() {
        let cfg = KernelConfig::builder().with_default_mailbox_capacity(64).build();
        assert_eq!(cfg.actor_table_capacity, DEFAULT_ACTOR_TABLE_CAPACITY);
        assert_eq!(cfg.default_mailbox_capacity, 64);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = KernelConfig::builder().with_actor_table_capacity(10).build();
        let s = toml::to_string(&cfg).unwrap();
        let back = KernelConfig::from_toml_str(&s).unwrap();
        assert_eq!(cfg, back);
    }
}
