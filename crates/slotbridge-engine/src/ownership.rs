//! Ownership tracking
//!
//! Ownership is decided exactly once, when a proxy is created, from the
//! provenance of the native instance. An existing proxy always wins: getting
//! an already-wrapped instance back from a factory does not change who owns
//! it.

use slotbridge_sdk::ReturnOwnership;

use crate::error::{BridgeError, BridgeResult};
use crate::host::HostValue;

/// Who governs the lifetime of a wrapped instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The host's reference counting is authoritative; the native instance
    /// is finalized when the last proxy reference goes away
    HostOwned,
    /// The native side keeps the instance alive
    NativeOwned,
}

impl Ownership {
    /// True when the native side retains ownership
    pub fn is_foreign(self) -> bool {
        self == Ownership::NativeOwned
    }
}

/// Where a native instance came from when it first crossed the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Created by a host-exposed constructor
    Constructor,
    /// Created by instantiating a host subclass
    Subclass,
    /// Returned from a native method with this annotation
    Returned(ReturnOwnership),
    /// Passed as a signal or override argument
    Argument,
    /// Read from a property
    Property,
    /// Registered by name with an explicit ownership
    Named(Ownership),
}

impl Provenance {
    /// Ownership a fresh proxy from this provenance gets
    pub fn ownership(self) -> Ownership {
        match self {
            Provenance::Constructor | Provenance::Subclass => Ownership::HostOwned,
            Provenance::Returned(ReturnOwnership::Transferred) => Ownership::HostOwned,
            Provenance::Returned(ReturnOwnership::Borrowed) => Ownership::NativeOwned,
            Provenance::Argument | Provenance::Property => Ownership::NativeOwned,
            Provenance::Named(ownership) => ownership,
        }
    }
}

/// Check whether a host value is a bridged object
pub fn is_qobject(value: &HostValue) -> bool {
    matches!(value, HostValue::Object(_))
}

/// Check whether a bridged object is owned by the native side.
///
/// Fails with [`BridgeError::NotAProxy`] for plain host values.
pub fn is_foreign_owned(value: &HostValue) -> BridgeResult<bool> {
    match value {
        HostValue::Object(proxy) => Ok(proxy.ownership().is_foreign()),
        other => Err(BridgeError::NotAProxy {
            got: other.type_name().to_string(),
        }),
    }
}

/// Opaque native handle of a bridged object
pub fn native_handle(value: &HostValue) -> BridgeResult<u64> {
    match value {
        HostValue::Object(proxy) => Ok(proxy.instance_id().as_u64()),
        other => Err(BridgeError::NotAProxy {
            got: other.type_name().to_string(),
        }),
    }
}
