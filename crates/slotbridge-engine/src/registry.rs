//! Proxy registry: one live proxy per native instance
//!
//! Entries hold proxies weakly; the host's references decide how long a
//! proxy lives. When the last reference goes away the entry is released and,
//! for host-owned instances, the native side is told to finalize.

use std::sync::{Arc, Weak};

use log::debug;
use rustc_hash::FxHashMap;
use slotbridge_sdk::{InstanceId, NativeRef};

use crate::bridge::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::ownership::{Ownership, Provenance};
use crate::proxy::{Proxy, ProxyId, ProxyInner};

struct RegistryEntry {
    proxy: Weak<ProxyInner>,
    proxy_id: ProxyId,
}

/// Outcome of releasing a proxy's registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    /// The entry belonged to the released proxy and was removed
    Evicted,
    /// A newer proxy already owns the entry
    Superseded,
    /// No entry (already evicted on destruction, or registry cleared)
    Absent,
}

#[derive(Default)]
pub(crate) struct ProxyRegistry {
    entries: FxHashMap<InstanceId, RegistryEntry>,
}

impl ProxyRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Live proxy for `id`, if any
    pub(crate) fn lookup(&self, id: InstanceId) -> Option<Proxy> {
        self.entries
            .get(&id)
            .and_then(|e| e.proxy.upgrade())
            .map(Proxy::from_inner)
    }

    pub(crate) fn insert(&mut self, proxy: &Proxy) {
        self.entries.insert(
            proxy.instance_id(),
            RegistryEntry {
                proxy: proxy.downgrade(),
                proxy_id: proxy.id(),
            },
        );
    }

    pub(crate) fn release(&mut self, id: InstanceId, proxy_id: ProxyId) -> Release {
        match self.entries.get(&id) {
            Some(entry) if entry.proxy_id == proxy_id => {
                self.entries.remove(&id);
                Release::Evicted
            }
            Some(_) => Release::Superseded,
            None => Release::Absent,
        }
    }

    pub(crate) fn evict(&mut self, id: InstanceId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn is_wrapped(&self, id: InstanceId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|e| e.proxy.strong_count() > 0)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// Wrapping and lifetime
// ============================================================================

impl BridgeShared {
    /// Return the live proxy for `native`, or create one with the ownership
    /// implied by `provenance`
    pub(crate) fn wrap(
        self: &Arc<Self>,
        native: &NativeRef,
        provenance: Provenance,
    ) -> BridgeResult<Proxy> {
        self.wrap_as(native, provenance, None)
    }

    pub(crate) fn wrap_as(
        self: &Arc<Self>,
        native: &NativeRef,
        provenance: Provenance,
        host_class: Option<Arc<str>>,
    ) -> BridgeResult<Proxy> {
        let class_name = native.descriptor().class_name();
        if !self.classes.read().contains(class_name) {
            return Err(BridgeError::UnknownType {
                class: class_name.to_string(),
            });
        }

        let mut registry = self.registry.lock();
        if let Some(existing) = registry.lookup(native.id()) {
            return Ok(existing);
        }
        if native.is_destroyed() {
            return Err(BridgeError::ObjectDestroyed(native.id().as_u64()));
        }

        let ownership = provenance.ownership();
        let proxy = Proxy::new(self.clone(), native.clone(), ownership, host_class);
        registry.insert(&proxy);
        debug!(
            "wrap {} {} as {:?} ({:?})",
            class_name,
            native.id(),
            ownership,
            provenance
        );
        Ok(proxy)
    }

    pub(crate) fn is_wrapped(&self, id: InstanceId) -> bool {
        self.registry.lock().is_wrapped(id)
    }

    /// Called when the last reference to a proxy goes away
    pub(crate) fn proxy_released(
        self: &Arc<Self>,
        proxy_id: ProxyId,
        native: &NativeRef,
        ownership: Ownership,
    ) {
        let outcome = self.registry.lock().release(native.id(), proxy_id);
        debug!("release proxy of {}: {:?}", native.id(), outcome);

        let finalize = outcome != Release::Superseded
            && ownership == Ownership::HostOwned
            && self.options.finalize_host_owned
            && !native.is_destroyed();
        if finalize {
            native.destroy(&self.context());
        }
    }

    /// Native-side destruction: evict the proxy, drop every connection that
    /// involves the instance and discard its override table
    pub(crate) fn on_destroyed(&self, id: InstanceId) {
        let evicted = self.registry.lock().evict(id);
        let purged = self.connections.lock().purge_instance(id);
        let binding = self.bindings.lock().remove(&id);
        let finalized_binding = match binding {
            Some(mut binding) => binding.finalize().is_ok(),
            None => false,
        };
        let named: Vec<Proxy> = {
            let mut names = self.names.lock();
            let keys: Vec<String> = names
                .iter()
                .filter(|(_, p)| p.instance_id() == id)
                .map(|(k, _)| k.clone())
                .collect();
            keys.iter().filter_map(|k| names.remove(k)).collect()
        };
        debug!(
            "destroyed {}: evicted={}, {} connection(s) dropped, binding finalized={}, {} name(s) removed",
            id,
            evicted,
            purged.len(),
            finalized_binding,
            named.len()
        );
        drop(purged);
        drop(named);
    }
}
