//! Connection table: ordered subscriber lists keyed by (instance, signal)
//!
//! Rows never contain gaps: every removal compacts the row immediately and
//! a row that becomes empty is dropped. Dispatch works on a snapshot, so a
//! removal during an emission only affects later emissions.
//!
//! Removed subscriptions are handed back to the caller so they are dropped
//! after the table lock is released; a subscriber closure may own the last
//! reference to a proxy, and releasing a proxy takes other bridge locks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::debug;
use rustc_hash::FxHashMap;
use slotbridge_sdk::{InstanceId, MethodDescriptor, NativeInstance, SignalDescriptor};

use crate::bridge::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{Callable, CallableId};
use crate::proxy::Proxy;
use crate::signal::{resolve_slot, SignalSource};

/// Identity of one `connect` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// (instance, canonical signal signature)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    /// Emitting instance
    pub instance: InstanceId,
    /// Canonical signature, e.g. `aSignal(int)`
    pub signature: Arc<str>,
}

impl SignalKey {
    /// Build a key for `signal` on `instance`
    pub fn new(instance: InstanceId, signal: &SignalDescriptor) -> Self {
        Self {
            instance,
            signature: signal.canonical().clone(),
        }
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.signature, self.instance)
    }
}

/// Returned by `connect`; identifies exactly one subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    id: ConnectionId,
    key: SignalKey,
}

impl ConnectionHandle {
    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The signal this connection belongs to
    pub fn key(&self) -> &SignalKey {
        &self.key
    }
}

/// What a subscription invokes
#[derive(Clone)]
pub(crate) enum SlotTarget {
    /// A host function or bound method
    Host(Callable),
    /// A slot method on another native instance, held weakly
    Native {
        receiver: Weak<NativeInstance>,
        receiver_id: InstanceId,
        slot: MethodDescriptor,
    },
}

impl SlotTarget {
    pub(crate) fn describe(&self) -> String {
        match self {
            SlotTarget::Host(callable) => callable.name().to_string(),
            SlotTarget::Native {
                receiver_id, slot, ..
            } => format!("{}@{}", slot.signature(), receiver_id),
        }
    }
}

/// One registered subscriber
pub(crate) struct Subscription {
    pub(crate) id: ConnectionId,
    pub(crate) target: SlotTarget,
}

impl Subscription {
    fn matches_callable(&self, identity: CallableId) -> bool {
        matches!(&self.target, SlotTarget::Host(c) if c.identity() == identity)
    }

    fn matches_slot(&self, receiver: InstanceId, slot: &MethodDescriptor) -> bool {
        match &self.target {
            SlotTarget::Native {
                receiver_id,
                slot: existing,
                ..
            } => *receiver_id == receiver && existing.signature() == slot.signature(),
            SlotTarget::Host(_) => false,
        }
    }
}

/// The subscription store
#[derive(Default)]
pub(crate) struct ConnectionTable {
    rows: FxHashMap<SignalKey, Vec<Arc<Subscription>>>,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber; duplicates are allowed
    pub(crate) fn append(&mut self, key: SignalKey, target: SlotTarget) -> ConnectionHandle {
        let id = ConnectionId::next();
        self.rows
            .entry(key.clone())
            .or_default()
            .push(Arc::new(Subscription { id, target }));
        ConnectionHandle { id, key }
    }

    fn remove_where(
        &mut self,
        key: &SignalKey,
        all: bool,
        pred: impl Fn(&Subscription) -> bool,
    ) -> Vec<Arc<Subscription>> {
        let Some(row) = self.rows.get_mut(key) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        let mut i = 0;
        while i < row.len() {
            if pred(&row[i]) {
                removed.push(row.remove(i));
                if !all {
                    break;
                }
            } else {
                i += 1;
            }
        }
        if row.is_empty() {
            self.rows.remove(key);
        }
        removed
    }

    /// Remove the first (or every) subscription of `callable`
    pub(crate) fn remove_callable(
        &mut self,
        key: &SignalKey,
        callable: CallableId,
        all: bool,
    ) -> Vec<Arc<Subscription>> {
        self.remove_where(key, all, |s| s.matches_callable(callable))
    }

    /// Remove the first native slot subscription matching `receiver`/`slot`
    pub(crate) fn remove_slot(
        &mut self,
        key: &SignalKey,
        receiver: InstanceId,
        slot: &MethodDescriptor,
    ) -> Vec<Arc<Subscription>> {
        self.remove_where(key, false, |s| s.matches_slot(receiver, slot))
    }

    /// Remove one subscription by connection ID
    pub(crate) fn remove_by_id(
        &mut self,
        key: &SignalKey,
        id: ConnectionId,
    ) -> Option<Arc<Subscription>> {
        self.remove_where(key, false, |s| s.id == id).pop()
    }

    /// Current subscribers, in invocation order
    pub(crate) fn snapshot(&self, key: &SignalKey) -> Vec<Arc<Subscription>> {
        self.rows.get(key).cloned().unwrap_or_default()
    }

    /// Number of subscribers for `key`
    pub(crate) fn len(&self, key: &SignalKey) -> usize {
        self.rows.get(key).map_or(0, Vec::len)
    }

    /// Total number of subscriptions
    pub(crate) fn total(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// Drop every row emitted by `instance`, and every native slot
    /// subscription targeting it
    pub(crate) fn purge_instance(&mut self, instance: InstanceId) -> Vec<Arc<Subscription>> {
        let mut removed = Vec::new();
        self.rows.retain(|key, row| {
            if key.instance == instance {
                removed.append(row);
                return false;
            }
            let mut i = 0;
            while i < row.len() {
                let targets_instance = matches!(
                    &row[i].target,
                    SlotTarget::Native { receiver_id, .. } if *receiver_id == instance
                );
                if targets_instance {
                    removed.push(row.remove(i));
                } else {
                    i += 1;
                }
            }
            !row.is_empty()
        });
        removed
    }

    /// Remove everything
    pub(crate) fn clear(&mut self) -> Vec<Arc<Subscription>> {
        self.rows.drain().flat_map(|(_, row)| row).collect()
    }
}

// ============================================================================
// Connect / disconnect
// ============================================================================

impl BridgeShared {
    pub(crate) fn connect(
        self: &Arc<Self>,
        source: SignalSource,
        callable: &Callable,
    ) -> BridgeResult<ConnectionHandle> {
        let (proxy, signal) = source.resolve(self)?;
        ensure_alive(&proxy)?;
        let key = SignalKey::new(proxy.instance_id(), &signal);
        let handle = self
            .connections
            .lock()
            .append(key, SlotTarget::Host(callable.clone()));
        debug!(
            "connect {} -> {} ({:?})",
            handle.key,
            callable.name(),
            handle.id
        );
        Ok(handle)
    }

    /// Remove the first (or every) subscription of `callable`.
    ///
    /// Returns the number removed; zero is not an error.
    pub(crate) fn disconnect(
        self: &Arc<Self>,
        source: SignalSource,
        callable: &Callable,
        all: bool,
    ) -> BridgeResult<usize> {
        let (proxy, signal) = source.resolve(self)?;
        let key = SignalKey::new(proxy.instance_id(), &signal);
        let removed = self
            .connections
            .lock()
            .remove_callable(&key, callable.identity(), all);
        debug!(
            "disconnect {} -> {}: {} removed",
            key,
            callable.name(),
            removed.len()
        );
        Ok(removed.len())
    }

    pub(crate) fn disconnect_handle(&self, handle: &ConnectionHandle) -> bool {
        let removed = self
            .connections
            .lock()
            .remove_by_id(&handle.key, handle.id);
        debug!("disconnect {:?} on {}: {}", handle.id, handle.key, removed.is_some());
        removed.is_some()
    }

    pub(crate) fn connect_native(
        self: &Arc<Self>,
        source: SignalSource,
        target: &Proxy,
        slot: &str,
    ) -> BridgeResult<ConnectionHandle> {
        let (proxy, signal) = source.resolve(self)?;
        ensure_alive(&proxy)?;
        ensure_alive(target)?;
        let method = resolve_slot(target.descriptor(), slot, signal.params())?;
        let key = SignalKey::new(proxy.instance_id(), &signal);
        let handle = self.connections.lock().append(
            key,
            SlotTarget::Native {
                receiver: Arc::downgrade(target.native()),
                receiver_id: target.instance_id(),
                slot: method,
            },
        );
        debug!("connect {} -> native slot {}", handle.key, slot);
        Ok(handle)
    }

    pub(crate) fn disconnect_native(
        self: &Arc<Self>,
        source: SignalSource,
        target: &Proxy,
        slot: &str,
    ) -> BridgeResult<bool> {
        let (proxy, signal) = source.resolve(self)?;
        let method = resolve_slot(target.descriptor(), slot, signal.params())?;
        let key = SignalKey::new(proxy.instance_id(), &signal);
        let removed = self
            .connections
            .lock()
            .remove_slot(&key, target.instance_id(), &method);
        Ok(!removed.is_empty())
    }

    pub(crate) fn subscriber_count(self: &Arc<Self>, source: SignalSource) -> BridgeResult<usize> {
        let (proxy, signal) = source.resolve(self)?;
        let key = SignalKey::new(proxy.instance_id(), &signal);
        Ok(self.connections.lock().len(&key))
    }
}

fn ensure_alive(proxy: &Proxy) -> BridgeResult<()> {
    if proxy.is_destroyed() {
        Err(BridgeError::ObjectDestroyed(proxy.instance_id().as_u64()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValue;

    fn key(instance: InstanceId, signature: &str) -> SignalKey {
        SignalKey {
            instance,
            signature: Arc::from(signature),
        }
    }

    fn callable(name: &str) -> Callable {
        Callable::function(name, |_| Ok(HostValue::None))
    }

    fn names(table: &ConnectionTable, key: &SignalKey) -> Vec<String> {
        table
            .snapshot(key)
            .iter()
            .map(|s| s.target.describe())
            .collect()
    }

    #[test]
    fn test_append_preserves_order() {
        let mut table = ConnectionTable::new();
        let k = key(InstanceId::new(), "aSignal(int)");
        for name in ["cback1", "cback2", "cback3"] {
            table.append(k.clone(), SlotTarget::Host(callable(name)));
        }
        assert_eq!(names(&table, &k), vec!["cback1", "cback2", "cback3"]);
    }

    #[test]
    fn test_remove_first_only() {
        let mut table = ConnectionTable::new();
        let k = key(InstanceId::new(), "aSignal(int)");
        let cb = callable("cb");
        table.append(k.clone(), SlotTarget::Host(cb.clone()));
        table.append(k.clone(), SlotTarget::Host(callable("other")));
        table.append(k.clone(), SlotTarget::Host(cb.clone()));

        assert_eq!(table.remove_callable(&k, cb.identity(), false).len(), 1);
        assert_eq!(names(&table, &k), vec!["other", "cb"]);
        assert_eq!(table.remove_callable(&k, cb.identity(), false).len(), 1);
        assert!(table.remove_callable(&k, cb.identity(), false).is_empty());
    }

    #[test]
    fn test_remove_all_matches() {
        let mut table = ConnectionTable::new();
        let k = key(InstanceId::new(), "aSignal(int)");
        let cb = callable("cb");
        for _ in 0..3 {
            table.append(k.clone(), SlotTarget::Host(cb.clone()));
        }
        assert_eq!(table.remove_callable(&k, cb.identity(), true).len(), 3);
        assert_eq!(table.len(&k), 0);
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut table = ConnectionTable::new();
        let a = InstanceId::new();
        let b = InstanceId::new();
        let cb = callable("cb");
        table.append(key(a, "aSignal(int)"), SlotTarget::Host(cb.clone()));
        table.append(key(a, "other(int)"), SlotTarget::Host(cb.clone()));
        table.append(key(b, "aSignal(int)"), SlotTarget::Host(cb.clone()));

        table.remove_callable(&key(a, "aSignal(int)"), cb.identity(), false);
        assert_eq!(table.len(&key(a, "other(int)")), 1);
        assert_eq!(table.len(&key(b, "aSignal(int)")), 1);
    }

    #[test]
    fn test_remove_by_id() {
        let mut table = ConnectionTable::new();
        let k = key(InstanceId::new(), "s()");
        let cb = callable("cb");
        let first = table.append(k.clone(), SlotTarget::Host(cb.clone()));
        let second = table.append(k.clone(), SlotTarget::Host(cb.clone()));

        assert!(table.remove_by_id(&k, second.id()).is_some());
        assert!(table.remove_by_id(&k, second.id()).is_none());
        let remaining = table.snapshot(&k);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut table = ConnectionTable::new();
        let k = key(InstanceId::new(), "s()");
        let cb = callable("cb");
        table.append(k.clone(), SlotTarget::Host(cb.clone()));
        let snapshot = table.snapshot(&k);
        table.remove_callable(&k, cb.identity(), false);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(table.len(&k), 0);
    }

    #[test]
    fn test_purge_instance() {
        let mut table = ConnectionTable::new();
        let a = InstanceId::new();
        let b = InstanceId::new();
        table.append(key(a, "s()"), SlotTarget::Host(callable("x")));
        table.append(key(a, "t()"), SlotTarget::Host(callable("y")));
        table.append(key(b, "s()"), SlotTarget::Host(callable("z")));

        assert_eq!(table.purge_instance(a).len(), 2);
        assert_eq!(table.total(), 1);
        assert_eq!(table.clear().len(), 1);
    }
}
