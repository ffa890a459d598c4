//! Proxies: host-visible wrappers around native instances
//!
//! A [`Proxy`] is a cheap handle; clones share identity. The proxy registry
//! guarantees at most one live proxy per native instance, so two lookups of
//! the same instance compare equal with `==`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use slotbridge_sdk::{InstanceId, NativeRef, TypeDescriptor};

use crate::bridge::BridgeShared;
use crate::dispatch::DispatchReport;
use crate::error::{BridgeError, BridgeResult, MarshalError};
use crate::host::HostValue;
use crate::marshal::Marshaler;
use crate::ownership::{Ownership, Provenance};
use crate::signal::{resolve_signal, BoundSignal};
use crate::subclass::BindingState;

/// Identity of one proxy object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId(u64);

impl ProxyId {
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ProxyId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

pub(crate) struct ProxyInner {
    id: ProxyId,
    native: NativeRef,
    ownership: Ownership,
    host_class: Option<Arc<str>>,
    bridge: Arc<BridgeShared>,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        self.bridge.proxy_released(self.id, &self.native, self.ownership);
    }
}

/// Host-visible wrapper around exactly one native instance
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    pub(crate) fn new(
        bridge: Arc<BridgeShared>,
        native: NativeRef,
        ownership: Ownership,
        host_class: Option<Arc<str>>,
    ) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id: ProxyId::next(),
                native,
                ownership,
                host_class,
                bridge,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ProxyInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ProxyInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn bridge(&self) -> &Arc<BridgeShared> {
        &self.inner.bridge
    }

    /// Proxy identity
    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    /// Identity of the wrapped native instance
    pub fn instance_id(&self) -> InstanceId {
        self.inner.native.id()
    }

    /// The wrapped native instance
    pub fn native(&self) -> &NativeRef {
        &self.inner.native
    }

    /// Class metadata of the wrapped instance
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        self.inner.native.descriptor()
    }

    /// Native class name
    pub fn class_name(&self) -> &str {
        self.descriptor().class_name()
    }

    /// Ownership decided when the proxy was created
    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    /// True when the native side owns the instance
    pub fn is_foreign_owned(&self) -> bool {
        self.inner.ownership.is_foreign()
    }

    /// Whether the native instance has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.inner.native.is_destroyed()
    }

    /// Name of the host subclass this object was instantiated from
    pub fn host_class(&self) -> Option<&str> {
        self.inner.host_class.as_deref()
    }

    /// Subclass binding state, for instances of host subclasses
    pub fn subclass_state(&self) -> Option<BindingState> {
        self.inner.host_class.as_ref()?;
        Some(self.bridge().binding_state(self.instance_id()))
    }

    /// Call a method; virtual methods honor host overrides.
    ///
    /// If `name` is not a method but a signal, the signal is emitted and
    /// `None` is returned.
    pub fn call(&self, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.invoke(name, args, true)
    }

    /// Call the native implementation, bypassing any host override
    pub fn call_base(&self, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        self.invoke(name, args, false)
    }

    fn invoke(
        &self,
        name: &str,
        args: &[HostValue],
        virtual_dispatch: bool,
    ) -> BridgeResult<HostValue> {
        let bridge = self.bridge();
        bridge.check_argument_limit(args.len())?;
        let desc = self.descriptor();

        let Some(method) = desc.method_for(name, args.len()).cloned() else {
            if virtual_dispatch && !desc.signals_named(name).is_empty() {
                self.emit(name, args)?;
                return Ok(HostValue::None);
            }
            return Err(match desc.methods_named(name).first() {
                Some(m) => MarshalError::ArityMismatch {
                    expected: m.params.len(),
                    got: args.len(),
                }
                .into(),
                None => BridgeError::UnknownMethod {
                    class: desc.class_name().to_string(),
                    method: name.to_string(),
                },
            });
        };

        if self.is_destroyed() {
            return Err(BridgeError::ObjectDestroyed(self.instance_id().as_u64()));
        }

        let marshaler = Marshaler::new(bridge);
        let native_args = marshaler.args_to_native(&method.params, args)?;
        let result = if virtual_dispatch {
            bridge.invoke_native(self.native(), &method, &native_args)?
        } else {
            self.native()
                .invoke_method(&bridge.context(), &method, &native_args)?
        };
        marshaler.to_host(&result, &method.ret, Provenance::Returned(method.ownership))
    }

    /// Read a property
    pub fn get(&self, property: &str) -> BridgeResult<HostValue> {
        let prop = self.find_property(property)?;
        let value = self.native().property(property)?;
        Marshaler::new(self.bridge()).to_host(&value, &prop.tag, Provenance::Property)
    }

    /// Write a property; a value that does not convert leaves the native
    /// side untouched
    pub fn set(&self, property: &str, value: impl Into<HostValue>) -> BridgeResult<()> {
        let prop = self.find_property(property)?;
        let native = Marshaler::new(self.bridge()).to_native(&value.into(), &prop.tag)?;
        self.native().set_property(property, native)?;
        Ok(())
    }

    fn find_property(&self, property: &str) -> BridgeResult<slotbridge_sdk::PropertyDescriptor> {
        self.descriptor()
            .property(property)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownProperty {
                class: self.class_name().to_string(),
                property: property.to_string(),
            })
    }

    /// Resolve a signal on this object, e.g. `to.signal("aSignal")`
    pub fn signal(&self, name: &str) -> BridgeResult<BoundSignal> {
        let signal = resolve_signal(self.descriptor(), name)?;
        Ok(BoundSignal::new(self.clone(), signal))
    }

    /// Emit a signal from host code.
    ///
    /// A bare name picks the overload whose parameters accept `args`.
    pub fn emit(&self, name: &str, args: &[HostValue]) -> BridgeResult<DispatchReport> {
        let bound = self.select_signal(name, args)?;
        self.bridge().emit_from_host(bound.into(), args)
    }

    fn select_signal(&self, name: &str, args: &[HostValue]) -> BridgeResult<BoundSignal> {
        if name.contains('(') {
            return self.signal(name);
        }
        let desc = self.descriptor();
        let named = desc.signals_named(name);
        if named.is_empty() {
            return Err(BridgeError::UnknownSignal {
                class: desc.class_name().to_string(),
                signal: name.to_string(),
            });
        }

        let marshaler = Marshaler::new(self.bridge());
        let same_arity: Vec<_> = named
            .iter()
            .copied()
            .filter(|s| s.params().len() == args.len())
            .collect();
        let accepting: Vec<_> = same_arity
            .iter()
            .copied()
            .filter(|s| marshaler.args_to_native(s.params(), args).is_ok())
            .collect();
        match accepting.as_slice() {
            [only] => Ok(BoundSignal::new(self.clone(), (*only).clone())),
            // a single overload reports the actual conversion failure
            [] if named.len() == 1 => Ok(BoundSignal::new(self.clone(), named[0].clone())),
            // otherwise report against the first overload of the right arity
            [] => match same_arity.first() {
                Some(closest) => Err(marshaler
                    .args_to_native(closest.params(), args)
                    .err()
                    .unwrap_or_else(|| MarshalError::TypeMismatch {
                        expected: closest.canonical().to_string(),
                        got: format!("{} argument(s)", args.len()),
                    })
                    .into()),
                None => Err(MarshalError::ArityMismatch {
                    expected: named[0].params().len(),
                    got: args.len(),
                }
                .into()),
            },
            _ => Err(BridgeError::AmbiguousSignal {
                class: desc.class_name().to_string(),
                signal: name.to_string(),
                candidates: accepting.iter().map(|s| s.canonical().to_string()).collect(),
            }),
        }
    }

    /// Destroy the native instance now, as if native code had deleted it.
    ///
    /// Returns false if it was already destroyed.
    pub fn destroy(&self) -> bool {
        self.native().destroy(&self.bridge().context())
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Proxy {}

impl Hash for Proxy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} object at {} ({:?})>",
            self.host_class().unwrap_or_else(|| self.class_name()),
            self.instance_id(),
            self.inner.ownership
        )
    }
}
