//! Subclass bridge: host classes extending native classes
//!
//! A host class names a registered native base and a table of overrides for
//! the base's virtual methods. Instantiating it constructs the native base,
//! binds the override table to the new instance and wraps it as host-owned.
//!
//! Every virtual call on such an instance, whether it comes from host code
//! through [`Proxy::call`] or from native code through
//! [`NativeContext::call_virtual`](slotbridge_sdk::NativeContext::call_virtual),
//! consults the override table first and falls back to the native default.
//!
//! Binding lifecycle: `Unbound -> Bound -> Finalized`, one way only.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotbridge_sdk::{
    check_args, MethodDescriptor, NativeRef, NativeValue, ReturnOwnership, TypeDescriptor, TypeTag,
};

use crate::bridge::BridgeShared;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostResult, HostValue};
use crate::marshal::Marshaler;
use crate::ownership::Provenance;
use crate::proxy::Proxy;

/// Host implementation of a virtual method; receives the instance and the
/// marshaled arguments
pub type OverrideFn = dyn Fn(&Proxy, &[HostValue]) -> HostResult<HostValue> + Send + Sync;

/// Lifecycle of a subclass instance's native binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No native instance yet
    Unbound,
    /// Native instance created, overrides registered
    Bound,
    /// Native instance destroyed, overrides discarded
    Finalized,
}

/// Virtual method overrides of one host class
#[derive(Clone, Default)]
pub struct OverrideTable {
    methods: FxHashMap<String, Arc<OverrideFn>>,
}

impl OverrideTable {
    /// Override for `method`, if any
    pub fn get(&self, method: &str) -> Option<Arc<OverrideFn>> {
        self.methods.get(method).cloned()
    }

    /// Check whether `method` is overridden
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if there are no overrides
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for OverrideTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("OverrideTable")
            .field("methods", &names)
            .finish()
    }
}

/// Per-instance binding between a host subclass and its native instance
#[derive(Debug)]
pub struct SubclassBinding {
    class: Arc<str>,
    state: BindingState,
    overrides: Option<Arc<OverrideTable>>,
}

impl SubclassBinding {
    /// A fresh, unbound binding for `class`
    pub fn new(class: Arc<str>) -> Self {
        Self {
            class,
            state: BindingState::Unbound,
            overrides: None,
        }
    }

    /// Current state
    pub fn state(&self) -> BindingState {
        self.state
    }

    /// The bound override table
    pub fn overrides(&self) -> Option<&Arc<OverrideTable>> {
        self.overrides.as_ref()
    }

    fn transition(&mut self, from: BindingState, to: BindingState) -> BridgeResult<()> {
        if self.state != from {
            return Err(BridgeError::BindingTransition {
                class: self.class.to_string(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// `Unbound -> Bound`
    pub fn bind(&mut self, overrides: Arc<OverrideTable>) -> BridgeResult<()> {
        self.transition(BindingState::Unbound, BindingState::Bound)?;
        self.overrides = Some(overrides);
        Ok(())
    }

    /// `Bound -> Finalized`; the override table is discarded
    pub fn finalize(&mut self) -> BridgeResult<()> {
        self.transition(BindingState::Bound, BindingState::Finalized)?;
        self.overrides = None;
        Ok(())
    }
}

// ============================================================================
// Host classes
// ============================================================================

/// Builder returned by [`Bridge::subclass`](crate::Bridge::subclass)
pub struct HostClassBuilder {
    bridge: Arc<BridgeShared>,
    name: Arc<str>,
    base: Arc<TypeDescriptor>,
    overrides: OverrideTable,
    error: Option<BridgeError>,
}

impl HostClassBuilder {
    pub(crate) fn new(bridge: Arc<BridgeShared>, name: &str, base: Arc<TypeDescriptor>) -> Self {
        Self {
            bridge,
            name: Arc::from(name),
            base,
            overrides: OverrideTable::default(),
            error: None,
        }
    }

    /// Override the virtual method `method` of the base class.
    ///
    /// Overriding a method that does not exist, or is not virtual, makes
    /// [`build`](Self::build) fail.
    pub fn override_method<F>(mut self, method: &str, body: F) -> Self
    where
        F: Fn(&Proxy, &[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        let candidates = self.base.methods_named(method);
        if candidates.is_empty() {
            self.error = Some(BridgeError::UnknownMethod {
                class: self.base.class_name().to_string(),
                method: method.to_string(),
            });
        } else if !candidates.iter().any(|m| m.is_virtual) {
            self.error = Some(BridgeError::NotVirtual {
                class: self.base.class_name().to_string(),
                method: method.to_string(),
            });
        } else {
            self.overrides
                .methods
                .insert(method.to_string(), Arc::new(body));
        }
        self
    }

    /// Finish the class
    pub fn build(self) -> BridgeResult<HostClass> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(HostClass {
            bridge: self.bridge,
            name: self.name,
            base: self.base,
            overrides: Arc::new(self.overrides),
        })
    }
}

/// A host class deriving from a native class
#[derive(Clone)]
pub struct HostClass {
    bridge: Arc<BridgeShared>,
    name: Arc<str>,
    base: Arc<TypeDescriptor>,
    overrides: Arc<OverrideTable>,
}

impl HostClass {
    /// Host class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native base class name
    pub fn base_name(&self) -> &str {
        self.base.class_name()
    }

    /// Check whether `method` is overridden
    pub fn overrides(&self, method: &str) -> bool {
        self.overrides.contains(method)
    }

    /// Create an instance: construct the native base, bind the overrides and
    /// wrap the result as host-owned
    pub fn instantiate(&self, args: &[HostValue]) -> BridgeResult<Proxy> {
        let bridge = &self.bridge;
        bridge.check_argument_limit(args.len())?;
        let (class, ctor) = bridge
            .classes
            .read()
            .select_constructor(self.base.class_name(), args.len())?;
        let native_args = Marshaler::new(bridge).args_to_native(&ctor.params, args)?;

        let mut binding = SubclassBinding::new(self.name.clone());
        let native = class.instantiate(&ctor, &native_args)?;
        binding.bind(self.overrides.clone())?;
        bridge.bindings.lock().insert(native.id(), binding);

        match bridge.wrap_as(&native, Provenance::Subclass, Some(self.name.clone())) {
            Ok(proxy) => Ok(proxy),
            Err(err) => {
                let binding = bridge.bindings.lock().remove(&native.id());
                drop(binding);
                Err(err)
            }
        }
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("base", &self.base.class_name())
            .field("overrides", &self.overrides)
            .finish()
    }
}

// ============================================================================
// Virtual dispatch
// ============================================================================

impl BridgeShared {
    pub(crate) fn binding_state(&self, id: slotbridge_sdk::InstanceId) -> BindingState {
        self.bindings
            .lock()
            .get(&id)
            .map_or(BindingState::Finalized, SubclassBinding::state)
    }

    fn override_for(&self, this: &NativeRef, method: &str) -> Option<Arc<OverrideFn>> {
        self.bindings
            .lock()
            .get(&this.id())?
            .overrides()?
            .get(method)
    }

    /// Invoke `method` on `this`, routing virtual methods through a host
    /// override when one is bound
    pub(crate) fn invoke_native(
        self: &Arc<Self>,
        this: &NativeRef,
        method: &MethodDescriptor,
        args: &[NativeValue],
    ) -> BridgeResult<NativeValue> {
        if method.is_virtual {
            if let Some(body) = self.override_for(this, &method.name) {
                return self.run_override(this, method, body.as_ref(), args);
            }
        }
        Ok(this.invoke_method(&self.context(), method, args)?)
    }

    /// Virtual call requested by native code
    pub(crate) fn call_virtual(
        self: &Arc<Self>,
        this: &NativeRef,
        name: &str,
        args: &[NativeValue],
    ) -> BridgeResult<NativeValue> {
        let method = this
            .descriptor()
            .method_for(name, args.len())
            .cloned()
            .ok_or_else(|| BridgeError::UnknownMethod {
                class: this.descriptor().class_name().to_string(),
                method: name.to_string(),
            })?;
        self.invoke_native(this, &method, args)
    }

    fn run_override(
        self: &Arc<Self>,
        this: &NativeRef,
        method: &MethodDescriptor,
        body: &OverrideFn,
        args: &[NativeValue],
    ) -> BridgeResult<NativeValue> {
        if this.is_destroyed() {
            return Err(BridgeError::ObjectDestroyed(this.id().as_u64()));
        }
        check_args(&method.name, &method.params, args)?;
        let proxy = self.wrap(this, Provenance::Returned(ReturnOwnership::Borrowed))?;
        let marshaler = Marshaler::new(self);
        let host_args = marshaler.args_to_host(&method.params, args, Provenance::Argument)?;

        let result = {
            let _host = self.host_lock.lock();
            body(&proxy, &host_args)?
        };
        if method.ret == TypeTag::Void {
            return Ok(NativeValue::Void);
        }
        Ok(marshaler.to_native(&result, &method.ret)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_lifecycle() {
        let mut binding = SubclassBinding::new(Arc::from("MyObject"));
        assert_eq!(binding.state(), BindingState::Unbound);
        assert!(binding.overrides().is_none());

        binding.bind(Arc::new(OverrideTable::default())).unwrap();
        assert_eq!(binding.state(), BindingState::Bound);
        assert!(binding.overrides().is_some());

        binding.finalize().unwrap();
        assert_eq!(binding.state(), BindingState::Finalized);
        assert!(binding.overrides().is_none());
    }

    #[test]
    fn test_binding_transitions_are_one_way() {
        let mut binding = SubclassBinding::new(Arc::from("MyObject"));
        assert!(matches!(
            binding.finalize(),
            Err(BridgeError::BindingTransition {
                from: BindingState::Unbound,
                to: BindingState::Finalized,
                ..
            })
        ));

        binding.bind(Arc::new(OverrideTable::default())).unwrap();
        assert!(binding.bind(Arc::new(OverrideTable::default())).is_err());

        binding.finalize().unwrap();
        assert!(binding.finalize().is_err());
        assert!(binding.bind(Arc::new(OverrideTable::default())).is_err());
        assert_eq!(binding.state(), BindingState::Finalized);
    }
}
