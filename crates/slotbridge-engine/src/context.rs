//! EngineContext: the bridge as seen from native code

use std::sync::{Arc, Weak};

use slotbridge_sdk::{
    ContextHandle, DetachedContext, InstanceId, NativeContext, NativeRef, NativeResult,
    NativeValue,
};

use crate::bridge::BridgeShared;

/// [`NativeContext`] implementation handed to native methods.
///
/// Holds the bridge weakly; once the bridge is gone the context behaves like
/// a [`DetachedContext`].
#[derive(Clone)]
pub struct EngineContext {
    bridge: Weak<BridgeShared>,
}

impl EngineContext {
    pub(crate) fn new(bridge: &Arc<BridgeShared>) -> Self {
        Self {
            bridge: Arc::downgrade(bridge),
        }
    }

    /// Check whether the owning bridge still exists
    pub fn is_attached(&self) -> bool {
        self.bridge.strong_count() > 0
    }
}

impl NativeContext for EngineContext {
    fn emit(&self, source: &NativeRef, signal: &str, args: &[NativeValue]) -> NativeResult<()> {
        match self.bridge.upgrade() {
            Some(bridge) => Ok(bridge.native_emit(source, signal, args)?),
            None => Ok(()),
        }
    }

    fn call_virtual(
        &self,
        this: &NativeRef,
        method: &str,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        match self.bridge.upgrade() {
            Some(bridge) => Ok(bridge.call_virtual(this, method, args)?),
            None => this.invoke(&DetachedContext, method, args),
        }
    }

    fn destroyed(&self, id: InstanceId) {
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.on_destroyed(id);
        }
    }

    fn handle(&self) -> ContextHandle {
        Arc::new(self.clone())
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("attached", &self.is_attached())
            .finish()
    }
}
