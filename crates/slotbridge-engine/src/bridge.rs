//! Bridge: the host-facing entry point
//!
//! `BridgeShared` owns every registry; proxies, bound signals and host
//! classes keep it alive through an `Arc`. Each registry has its own lock
//! and no code path holds two of them at once.
//!
//! `Bridge` is the owned facade. Dropping it shuts the bridge down: all
//! connections, named objects, subclass bindings and queued emissions are
//! released, which breaks the reference cycles a subscriber closure
//! capturing a proxy would otherwise create. Proxies still held by the host
//! keep working for calls and property access.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam::channel::{self, Receiver, Sender};
use log::debug;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;
use slotbridge_sdk::{InstanceId, NativeClass, NativeRef, NativeValue, TypeDescriptor, TypeTag};

use crate::class_table::ClassTable;
use crate::connection::{ConnectionHandle, ConnectionTable};
use crate::context::EngineContext;
use crate::dispatch::{DispatchReport, ErrorHook, PendingEmission, SubscriberFailure};
use crate::error::{BridgeError, BridgeResult, MarshalError};
use crate::host::{Callable, HostValue};
use crate::marshal::Marshaler;
use crate::options::BridgeOptions;
use crate::ownership::{Ownership, Provenance};
use crate::proxy::Proxy;
use crate::registry::ProxyRegistry;
use crate::signal::SignalSource;
use crate::subclass::{HostClassBuilder, SubclassBinding};

pub(crate) struct BridgeShared {
    pub(crate) options: BridgeOptions,
    pub(crate) classes: RwLock<ClassTable>,
    pub(crate) registry: Mutex<ProxyRegistry>,
    pub(crate) connections: Mutex<ConnectionTable>,
    pub(crate) bindings: Mutex<FxHashMap<InstanceId, SubclassBinding>>,
    pub(crate) names: Mutex<FxHashMap<String, Proxy>>,
    /// Serialization point for host code invoked by the bridge
    pub(crate) host_lock: ReentrantMutex<()>,
    pub(crate) host_thread: Mutex<ThreadId>,
    pub(crate) pending_tx: Sender<PendingEmission>,
    pub(crate) pending_rx: Receiver<PendingEmission>,
    pub(crate) error_hook: RwLock<Option<ErrorHook>>,
}

impl BridgeShared {
    fn new(options: BridgeOptions) -> Self {
        let (pending_tx, pending_rx) = channel::unbounded();
        Self {
            options,
            classes: RwLock::new(ClassTable::new()),
            registry: Mutex::new(ProxyRegistry::new()),
            connections: Mutex::new(ConnectionTable::new()),
            bindings: Mutex::new(FxHashMap::default()),
            names: Mutex::new(FxHashMap::default()),
            host_lock: ReentrantMutex::new(()),
            host_thread: Mutex::new(thread::current().id()),
            pending_tx,
            pending_rx,
            error_hook: RwLock::new(None),
        }
    }

    pub(crate) fn context(self: &Arc<Self>) -> EngineContext {
        EngineContext::new(self)
    }

    pub(crate) fn check_argument_limit(&self, argc: usize) -> BridgeResult<()> {
        if argc > self.options.max_arguments {
            return Err(MarshalError::ArityMismatch {
                expected: self.options.max_arguments,
                got: argc,
            }
            .into());
        }
        Ok(())
    }
}

/// A bridge between native classes and host code
pub struct Bridge {
    shared: Arc<BridgeShared>,
}

impl Bridge {
    /// Create a bridge; the calling thread becomes the host thread
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            shared: Arc::new(BridgeShared::new(options)),
        }
    }

    pub(crate) fn shared(&self) -> &Arc<BridgeShared> {
        &self.shared
    }

    /// Options this bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.shared.options
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Register a native class. Registering the same class name twice
    /// returns the first registration.
    pub fn register_class(&self, class: Arc<dyn NativeClass>) -> BridgeResult<Arc<TypeDescriptor>> {
        let desc = self
            .shared
            .classes
            .write()
            .register(class, self.shared.options.require_constructor)?;
        debug!("register class {}", desc.class_name());
        Ok(desc)
    }

    /// Register a class whose instances only ever come from native code
    pub fn register_class_unconstructible(
        &self,
        class: Arc<dyn NativeClass>,
    ) -> BridgeResult<Arc<TypeDescriptor>> {
        let desc = self.shared.classes.write().register(class, false)?;
        debug!("register class {} (no host constructor)", desc.class_name());
        Ok(desc)
    }

    /// Registered class names, in registration order
    pub fn class_names(&self) -> Vec<String> {
        self.shared.classes.read().names()
    }

    /// Descriptor of a registered class
    pub fn descriptor(&self, class: &str) -> Option<Arc<TypeDescriptor>> {
        self.shared.classes.read().descriptor(class)
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// `TypeName(args...)`: construct a host-owned instance
    pub fn construct(&self, class: &str, args: &[HostValue]) -> BridgeResult<Proxy> {
        let shared = &self.shared;
        shared.check_argument_limit(args.len())?;
        let (class, ctor) = shared.classes.read().select_constructor(class, args.len())?;
        let native_args = Marshaler::new(shared).args_to_native(&ctor.params, args)?;
        let native = class.instantiate(&ctor, &native_args)?;
        shared.wrap(&native, Provenance::Constructor)
    }

    /// Wrap a native instance; an existing proxy is returned unchanged
    pub fn wrap(&self, native: &NativeRef, provenance: Provenance) -> BridgeResult<Proxy> {
        self.shared.wrap(native, provenance)
    }

    /// The native instance behind a proxy
    pub fn unwrap(&self, proxy: &Proxy) -> NativeRef {
        proxy.native().clone()
    }

    /// Check whether `native` currently has a live proxy
    pub fn is_wrapped(&self, native: &NativeRef) -> bool {
        self.shared.is_wrapped(native.id())
    }

    /// Number of registry entries
    pub fn live_proxies(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Expose a pre-existing native instance under a global name
    pub fn add_object(
        &self,
        name: &str,
        native: &NativeRef,
        ownership: Ownership,
    ) -> BridgeResult<Proxy> {
        let proxy = self.shared.wrap(native, Provenance::Named(ownership))?;
        let previous = self
            .shared
            .names
            .lock()
            .insert(name.to_string(), proxy.clone());
        drop(previous);
        debug!("add object {} -> {:?}", name, proxy);
        Ok(proxy)
    }

    /// Proxy registered under `name`
    pub fn object(&self, name: &str) -> Option<Proxy> {
        self.shared.names.lock().get(name).cloned()
    }

    // ========================================================================
    // Marshaling
    // ========================================================================

    /// Convert a host value for a native parameter of type `tag`
    pub fn to_native(&self, value: &HostValue, tag: &TypeTag) -> BridgeResult<NativeValue> {
        Ok(Marshaler::new(&self.shared).to_native(value, tag)?)
    }

    /// Convert a native value for the host
    pub fn to_host(
        &self,
        value: &NativeValue,
        tag: &TypeTag,
        provenance: Provenance,
    ) -> BridgeResult<HostValue> {
        Marshaler::new(&self.shared).to_host(value, tag, provenance)
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// `connect(target, signal, callable)` / `connect(bound_signal, callable)`
    pub fn connect(
        &self,
        source: impl Into<SignalSource>,
        callable: &Callable,
    ) -> BridgeResult<ConnectionHandle> {
        self.shared.connect(source.into(), callable)
    }

    /// Remove the first subscription of `callable`; returns whether one was
    /// found. Disconnecting something never connected is not an error.
    pub fn disconnect(
        &self,
        source: impl Into<SignalSource>,
        callable: &Callable,
    ) -> BridgeResult<bool> {
        Ok(self.shared.disconnect(source.into(), callable, false)? > 0)
    }

    /// Remove every subscription of `callable`; returns how many
    pub fn disconnect_all(
        &self,
        source: impl Into<SignalSource>,
        callable: &Callable,
    ) -> BridgeResult<usize> {
        self.shared.disconnect(source.into(), callable, true)
    }

    /// Remove exactly the subscription created by one `connect` call
    pub fn disconnect_handle(&self, handle: &ConnectionHandle) -> bool {
        self.shared.disconnect_handle(handle)
    }

    /// Route a signal to a slot method on another bridged object
    pub fn connect_native(
        &self,
        source: impl Into<SignalSource>,
        target: &Proxy,
        slot: &str,
    ) -> BridgeResult<ConnectionHandle> {
        self.shared.connect_native(source.into(), target, slot)
    }

    /// Remove the first route from a signal to `target`'s `slot`
    pub fn disconnect_native(
        &self,
        source: impl Into<SignalSource>,
        target: &Proxy,
        slot: &str,
    ) -> BridgeResult<bool> {
        self.shared.disconnect_native(source.into(), target, slot)
    }

    /// Current number of subscribers of a signal
    pub fn subscriber_count(&self, source: impl Into<SignalSource>) -> BridgeResult<usize> {
        self.shared.subscriber_count(source.into())
    }

    /// Total number of subscriptions across all signals
    pub fn connection_count(&self) -> usize {
        self.shared.connections.lock().total()
    }

    // ========================================================================
    // Emission and threads
    // ========================================================================

    /// Emit a signal from host code, exactly as a native emission would
    pub fn emit(
        &self,
        source: impl Into<SignalSource>,
        args: &[HostValue],
    ) -> BridgeResult<DispatchReport> {
        self.shared.emit_from_host(source.into(), args)
    }

    /// Deliver emissions queued by other threads; returns how many were
    /// delivered
    pub fn process_pending(&self) -> usize {
        self.shared.process_pending()
    }

    /// Make the calling thread the host thread
    pub fn bind_host_thread(&self) {
        *self.shared.host_thread.lock() = thread::current().id();
    }

    /// Context native code uses to call back into this bridge
    pub fn native_context(&self) -> EngineContext {
        self.shared.context()
    }

    /// Install the host's handler for subscriber failures
    pub fn set_error_hook<F>(&self, hook: F)
    where
        F: Fn(&SubscriberFailure) + Send + Sync + 'static,
    {
        *self.shared.error_hook.write() = Some(Arc::new(hook));
    }

    /// Remove the error hook; failures are logged again
    pub fn clear_error_hook(&self) {
        let previous = self.shared.error_hook.write().take();
        drop(previous);
    }

    // ========================================================================
    // Subclassing
    // ========================================================================

    /// Start declaring a host class `name` deriving from the native class
    /// `base`
    pub fn subclass(&self, name: &str, base: &str) -> BridgeResult<HostClassBuilder> {
        let base = self
            .descriptor(base)
            .ok_or_else(|| BridgeError::UnknownType {
                class: base.to_string(),
            })?;
        Ok(HostClassBuilder::new(self.shared.clone(), name, base))
    }

    /// Release every connection, named object, subclass binding and queued
    /// emission
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let connections = shared.connections.lock().clear();
        let names: Vec<Proxy> = shared.names.lock().drain().map(|(_, p)| p).collect();
        let bindings: Vec<SubclassBinding> =
            shared.bindings.lock().drain().map(|(_, b)| b).collect();
        let discarded = shared.discard_pending();
        debug!(
            "shutdown: {} connection(s), {} name(s), {} binding(s), {} queued emission(s) released",
            connections.len(),
            names.len(),
            bindings.len(),
            discarded
        );
        drop(connections);
        drop(names);
        drop(bindings);
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeOptions::default())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
