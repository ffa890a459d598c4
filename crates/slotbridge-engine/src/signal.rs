//! Signal and slot resolution
//!
//! A signal reference is either a full signature (`aSignal(int)`, matched
//! exactly after canonicalization) or a bare name (`aSignal`), which must
//! name exactly one signal in the class hierarchy.

use std::sync::Arc;

use slotbridge_sdk::{MethodDescriptor, SignalDescriptor, Signature, TypeDescriptor, TypeTag};

use crate::bridge::BridgeShared;
use crate::connection::ConnectionHandle;
use crate::dispatch::DispatchReport;
use crate::error::{BridgeError, BridgeResult, MarshalError};
use crate::host::{Callable, HostValue};
use crate::proxy::Proxy;

/// Resolve a signal reference against a class's signal table
pub fn resolve_signal(desc: &TypeDescriptor, text: &str) -> BridgeResult<SignalDescriptor> {
    let unknown = || BridgeError::UnknownSignal {
        class: desc.class_name().to_string(),
        signal: text.to_string(),
    };

    if text.contains('(') {
        let signature = Signature::parse(text).map_err(|_| unknown())?;
        return desc
            .signal(&signature.canonical())
            .cloned()
            .ok_or_else(unknown);
    }

    let mut candidates = desc.signals_named(text.trim());
    match candidates.len() {
        0 => Err(unknown()),
        1 => Ok(candidates.remove(0).clone()),
        _ => Err(BridgeError::AmbiguousSignal {
            class: desc.class_name().to_string(),
            signal: text.to_string(),
            candidates: candidates
                .iter()
                .map(|s| s.canonical().to_string())
                .collect(),
        }),
    }
}

/// Resolve a slot method for a signal with parameters `signal_params`.
///
/// A slot may take fewer arguments than the signal delivers, but its
/// parameters must match the leading signal parameters.
pub fn resolve_slot(
    desc: &TypeDescriptor,
    text: &str,
    signal_params: &[TypeTag],
) -> BridgeResult<MethodDescriptor> {
    let accepts = |m: &MethodDescriptor| signal_params.starts_with(&m.params);
    let unknown = || BridgeError::UnknownMethod {
        class: desc.class_name().to_string(),
        method: text.to_string(),
    };

    if text.contains('(') {
        let signature = Signature::parse(text).map_err(|_| unknown())?;
        let method = desc.method_by_signature(&signature).ok_or_else(unknown)?;
        if !accepts(method) {
            return Err(MarshalError::ArityMismatch {
                expected: signal_params.len(),
                got: method.params.len(),
            }
            .into());
        }
        return Ok(method.clone());
    }

    desc.methods_named(text.trim())
        .into_iter()
        .filter(|m| accepts(*m))
        .max_by_key(|m| m.params.len())
        .cloned()
        .ok_or_else(unknown)
}

// ============================================================================
// Signal sources
// ============================================================================

/// How a signal was named by the caller
#[derive(Debug, Clone)]
enum SignalRef {
    Named(String),
    Resolved(SignalDescriptor),
}

/// A target object plus a signal on it.
///
/// Built from `(&proxy, "aSignal")`, `(&proxy, "aSignal(int)")` or from a
/// [`BoundSignal`].
#[derive(Debug, Clone)]
pub struct SignalSource {
    proxy: Proxy,
    signal: SignalRef,
}

impl SignalSource {
    pub(crate) fn resolve(
        self,
        bridge: &Arc<BridgeShared>,
    ) -> BridgeResult<(Proxy, SignalDescriptor)> {
        if !Arc::ptr_eq(self.proxy.bridge(), bridge) {
            return Err(MarshalError::ForeignObject.into());
        }
        let signal = match self.signal {
            SignalRef::Resolved(signal) => signal,
            SignalRef::Named(text) => resolve_signal(self.proxy.descriptor(), &text)?,
        };
        Ok((self.proxy, signal))
    }
}

impl From<(&Proxy, &str)> for SignalSource {
    fn from((proxy, signal): (&Proxy, &str)) -> Self {
        Self {
            proxy: proxy.clone(),
            signal: SignalRef::Named(signal.to_string()),
        }
    }
}

impl From<(Proxy, &str)> for SignalSource {
    fn from((proxy, signal): (Proxy, &str)) -> Self {
        Self {
            proxy,
            signal: SignalRef::Named(signal.to_string()),
        }
    }
}

impl From<BoundSignal> for SignalSource {
    fn from(bound: BoundSignal) -> Self {
        Self {
            proxy: bound.proxy,
            signal: SignalRef::Resolved(bound.signal),
        }
    }
}

impl From<&BoundSignal> for SignalSource {
    fn from(bound: &BoundSignal) -> Self {
        bound.clone().into()
    }
}

// ============================================================================
// BoundSignal
// ============================================================================

/// A resolved signal on a specific object, e.g. `to.aSignal`
#[derive(Debug, Clone)]
pub struct BoundSignal {
    proxy: Proxy,
    signal: SignalDescriptor,
}

impl BoundSignal {
    pub(crate) fn new(proxy: Proxy, signal: SignalDescriptor) -> Self {
        Self { proxy, signal }
    }

    /// The object emitting this signal
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// Canonical signature
    pub fn signature(&self) -> &str {
        self.signal.canonical()
    }

    /// Parameter tags
    pub fn params(&self) -> &[TypeTag] {
        self.signal.params()
    }

    /// Subscribe `callable`
    pub fn connect(&self, callable: &Callable) -> BridgeResult<ConnectionHandle> {
        self.proxy.bridge().connect(self.into(), callable)
    }

    /// Remove the first subscription of `callable`; returns whether one was
    /// found
    pub fn disconnect(&self, callable: &Callable) -> BridgeResult<bool> {
        let removed = self.proxy.bridge().disconnect(self.into(), callable, false)?;
        Ok(removed > 0)
    }

    /// Emit from host code, exactly as a native emission would
    pub fn emit(&self, args: &[HostValue]) -> BridgeResult<DispatchReport> {
        self.proxy.bridge().emit_from_host(self.into(), args)
    }

    /// Current number of subscribers
    pub fn subscriber_count(&self) -> BridgeResult<usize> {
        self.proxy.bridge().subscriber_count(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("Obj")
            .method(MethodDescriptor::new("aSlot", vec![], TypeTag::Void))
            .method(MethodDescriptor::new("aSlot", vec![TypeTag::Int], TypeTag::Void))
            .method(MethodDescriptor::new("takesString", vec![TypeTag::String], TypeTag::Void))
            .signal("aSignal", vec![TypeTag::Int])
            .signal("changed", vec![TypeTag::Int])
            .signal("changed", vec![TypeTag::String])
            .build()
    }

    #[test]
    fn test_resolve_by_bare_name() {
        let sig = resolve_signal(&desc(), "aSignal").unwrap();
        assert_eq!(&**sig.canonical(), "aSignal(int)");
    }

    #[test]
    fn test_resolve_full_signature_canonicalizes() {
        let sig = resolve_signal(&desc(), "changed(const QString&)").unwrap();
        assert_eq!(&**sig.canonical(), "changed(string)");
    }

    #[test]
    fn test_resolve_ambiguous() {
        match resolve_signal(&desc(), "changed") {
            Err(BridgeError::AmbiguousSignal { candidates, .. }) => {
                assert_eq!(candidates, vec!["changed(int)", "changed(string)"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_redeclared_inherited_signal_is_not_ambiguous() {
        let base = TypeDescriptor::builder("Base")
            .signal("aSignal", vec![TypeTag::Int])
            .build();
        let derived = TypeDescriptor::builder("Derived")
            .parent(base)
            .signal("aSignal", vec![TypeTag::Int])
            .signal("aSignal", vec![TypeTag::String])
            .build();
        assert_eq!(derived.signals_named("aSignal").len(), 2);

        let root = TypeDescriptor::builder("Root")
            .signal("aSignal", vec![TypeTag::Int])
            .build();
        let mid = TypeDescriptor::builder("Mid")
            .parent(root)
            .signal("aSignal", vec![TypeTag::Int])
            .build();
        let leaf = TypeDescriptor::builder("Leaf").parent(mid).build();
        let sig = resolve_signal(&leaf, "aSignal").unwrap();
        assert_eq!(&**sig.canonical(), "aSignal(int)");
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(matches!(
            resolve_signal(&desc(), "nothing"),
            Err(BridgeError::UnknownSignal { .. })
        ));
        assert!(matches!(
            resolve_signal(&desc(), "aSignal(double)"),
            Err(BridgeError::UnknownSignal { .. })
        ));
        assert!(matches!(
            resolve_signal(&desc(), "aSignal(int"),
            Err(BridgeError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn test_resolve_slot_prefers_widest_compatible() {
        let slot = resolve_slot(&desc(), "aSlot", &[TypeTag::Int]).unwrap();
        assert_eq!(slot.params, vec![TypeTag::Int]);

        let slot = resolve_slot(&desc(), "aSlot", &[]).unwrap();
        assert!(slot.params.is_empty());
    }

    #[test]
    fn test_resolve_slot_incompatible() {
        assert!(matches!(
            resolve_slot(&desc(), "takesString", &[TypeTag::Int]),
            Err(BridgeError::UnknownMethod { .. })
        ));
        assert!(matches!(
            resolve_slot(&desc(), "takesString(string)", &[TypeTag::Int]),
            Err(BridgeError::Marshal(MarshalError::ArityMismatch { .. }))
        ));
    }
}
