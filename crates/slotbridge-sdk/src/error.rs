//! Error types raised by native code behind the bridge

/// Result type for native calls
pub type NativeResult<T> = Result<T, NativeError>;

/// Native object model error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Invalid argument (wrong count, out of range, ...)
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Method not present in the class's method table
    #[error("Unknown method: {class}::{method}")]
    UnknownMethod {
        /// Class name
        class: String,
        /// Method name or signature
        method: String,
    },

    /// Property not present in the class's property table
    #[error("Unknown property: {class}::{property}")]
    UnknownProperty {
        /// Class name
        class: String,
        /// Property name
        property: String,
    },

    /// Write to a read-only property
    #[error("Property {0} is read-only")]
    ReadOnlyProperty(String),

    /// Signature string could not be parsed
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// The instance has already been destroyed on the native side
    #[error("Native object {0} has been destroyed")]
    ObjectDestroyed(u64),

    /// Native code failed
    #[error("{0}")]
    Failed(String),
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::Failed(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::Failed(s.to_string())
    }
}
