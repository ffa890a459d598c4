//! NativeContext: the services native code can call back into
//!
//! Native methods receive a `&dyn NativeContext` on every invocation. Through
//! it they emit signals, route virtual calls (so a host-side override wins
//! over the native default) and report their own destruction.

use std::sync::Arc;

use crate::error::NativeResult;
use crate::object::{InstanceId, NativeRef};
use crate::value::NativeValue;

/// Owned, thread-transferable handle to a context
pub type ContextHandle = Arc<dyn NativeContext>;

/// Services the bridge exposes to native code.
pub trait NativeContext: Send + Sync {
    /// Emit `signal` (canonical signature, e.g. `aSignal(int)`) from `source`.
    ///
    /// May be called from any thread. Arguments must conform to the signal's
    /// parameter tags.
    fn emit(&self, source: &NativeRef, signal: &str, args: &[NativeValue]) -> NativeResult<()>;

    /// Call a virtual method, preferring a host-side override when one is
    /// installed for `this`.
    fn call_virtual(
        &self,
        this: &NativeRef,
        method: &str,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue>;

    /// Notification that `id` has been destroyed natively
    fn destroyed(&self, id: InstanceId);

    /// Owned handle, for emitting from other threads
    fn handle(&self) -> ContextHandle;
}

/// Context for native objects that are not attached to any bridge.
///
/// Emissions go nowhere and virtual calls always take the native path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedContext;

impl NativeContext for DetachedContext {
    fn emit(&self, _source: &NativeRef, _signal: &str, _args: &[NativeValue]) -> NativeResult<()> {
        Ok(())
    }

    fn call_virtual(
        &self,
        this: &NativeRef,
        method: &str,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        this.invoke(self, method, args)
    }

    fn destroyed(&self, _id: InstanceId) {}

    fn handle(&self) -> ContextHandle {
        Arc::new(DetachedContext)
    }
}
