//! Bridge errors

use slotbridge_sdk::NativeError;
use thiserror::Error;

use crate::host::HostError;
use crate::subclass::BindingState;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Value conversion failures across the boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarshalError {
    #[error("cannot convert {got} to {expected}")]
    TypeMismatch { expected: String, got: String },

    #[error("{value} is out of range for {expected}")]
    OutOfRange { expected: String, value: String },

    #[error("expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("null object where an instance is required")]
    NullObject,

    #[error("object belongs to a different bridge")]
    ForeignObject,
}

/// Errors surfaced by the bridge to host code.
///
/// Disconnecting something that was never connected is not an error, so
/// there is no variant for it.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("Unknown type: {class}")]
    UnknownType { class: String },

    #[error("Unknown signal {signal} on {class}")]
    UnknownSignal { class: String, signal: String },

    #[error("Ambiguous signal {signal} on {class}; candidates: {}", .candidates.join(", "))]
    AmbiguousSignal {
        class: String,
        signal: String,
        candidates: Vec<String>,
    },

    #[error("Marshal error: {0}")]
    Marshal(#[from] MarshalError),

    #[error("Stale subscription: receiver of {callable} no longer exists")]
    StaleSubscription { callable: String },

    #[error("Unknown method: {class}::{method}")]
    UnknownMethod { class: String, method: String },

    #[error("Unknown property: {class}::{property}")]
    UnknownProperty { class: String, property: String },

    #[error("No constructor available for {class} taking {argc} argument(s)")]
    NoConstructor { class: String, argc: usize },

    #[error("Value of type {got} is not a bridged object")]
    NotAProxy { got: String },

    #[error("{class}::{method} is not virtual")]
    NotVirtual { class: String, method: String },

    #[error("{class}: invalid subclass binding transition {from:?} -> {to:?}")]
    BindingTransition {
        class: String,
        from: BindingState,
        to: BindingState,
    },

    #[error("Native object {0:#x} has been destroyed")]
    ObjectDestroyed(u64),

    #[error("Native error: {0}")]
    Native(NativeError),

    #[error("{0}")]
    Host(HostError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<NativeError> for BridgeError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::ObjectDestroyed(id) => BridgeError::ObjectDestroyed(id),
            NativeError::UnknownMethod { class, method } => {
                BridgeError::UnknownMethod { class, method }
            }
            NativeError::UnknownProperty { class, property } => {
                BridgeError::UnknownProperty { class, property }
            }
            NativeError::TypeMismatch { expected, got } => {
                BridgeError::Marshal(MarshalError::TypeMismatch { expected, got })
            }
            other => BridgeError::Native(other),
        }
    }
}

impl From<HostError> for BridgeError {
    fn from(err: HostError) -> Self {
        BridgeError::Host(err)
    }
}

impl From<BridgeError> for NativeError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ObjectDestroyed(id) => NativeError::ObjectDestroyed(id),
            BridgeError::Native(inner) => inner,
            BridgeError::Marshal(MarshalError::TypeMismatch { expected, got }) => {
                NativeError::TypeMismatch { expected, got }
            }
            other => NativeError::Failed(other.to_string()),
        }
    }
}
