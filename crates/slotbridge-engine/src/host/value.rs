//! Host-language dynamic values

use std::fmt;

use crate::host::callable::Callable;
use crate::proxy::Proxy;

/// Result of a host callable
pub type HostResult<T> = Result<T, HostError>;

/// An exception raised by host code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    /// Exception kind, e.g. `ValueError`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl HostError {
    /// Create an error of the given kind
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Generic runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("RuntimeError", message)
    }

    /// Type error (wrong argument kind)
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HostError {}

impl From<crate::error::BridgeError> for HostError {
    fn from(err: crate::error::BridgeError) -> Self {
        match err {
            crate::error::BridgeError::Host(inner) => inner,
            other => HostError::runtime(other.to_string()),
        }
    }
}

/// A dynamically typed host value.
#[derive(Clone, Default)]
pub enum HostValue {
    /// The host's null
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Arbitrary-width integer, clamped to i64
    Int(i64),
    /// Double precision float
    Float(f64),
    /// Text
    Str(String),
    /// List
    List(Vec<HostValue>),
    /// Bridged native object
    Object(Proxy),
    /// Function or bound method
    Callable(Callable),
}

impl HostValue {
    /// Check for the null value
    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    /// Extract bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract float; integers are widened
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            HostValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Borrow text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow list items
    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the proxy, if this is a bridged object
    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            HostValue::Object(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Borrow the callable
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            HostValue::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// Host type name, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "None",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
            HostValue::List(_) => "list",
            HostValue::Object(_) => "object",
            HostValue::Callable(_) => "callable",
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::None, HostValue::None) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::List(a), HostValue::List(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a == b,
            (HostValue::Callable(a), HostValue::Callable(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => write!(f, "None"),
            HostValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            HostValue::Int(i) => write!(f, "{}", i),
            HostValue::Float(x) => write!(f, "{:?}", x),
            HostValue::Str(s) => write!(f, "{:?}", s),
            HostValue::List(items) => f.debug_list().entries(items).finish(),
            HostValue::Object(proxy) => write!(f, "{:?}", proxy),
            HostValue::Callable(c) => write!(f, "<callable {}>", c.name()),
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i32> for HostValue {
    fn from(i: i32) -> Self {
        HostValue::Int(i64::from(i))
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::Str(s)
    }
}

impl From<Proxy> for HostValue {
    fn from(proxy: Proxy) -> Self {
        HostValue::Object(proxy)
    }
}

impl From<Callable> for HostValue {
    fn from(c: Callable) -> Self {
        HostValue::Callable(c)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(HostValue::from(5), HostValue::Int(5));
        assert_eq!(HostValue::from("x"), HostValue::Str("x".into()));
        assert_eq!(
            HostValue::from(vec![1.5, 2.5]),
            HostValue::List(vec![HostValue::Float(1.5), HostValue::Float(2.5)])
        );
        assert_eq!(HostValue::from(None::<i64>), HostValue::None);
    }

    #[test]
    fn test_int_widens_to_float() {
        assert_eq!(HostValue::Int(3).as_float(), Some(3.0));
        assert_eq!(HostValue::Str("3".into()).as_float(), None);
    }

    #[test]
    fn test_debug_uses_host_spelling() {
        assert_eq!(format!("{:?}", HostValue::None), "None");
        assert_eq!(format!("{:?}", HostValue::Bool(true)), "True");
        assert_eq!(format!("{:?}", HostValue::Float(1.2)), "1.2");
    }
}
