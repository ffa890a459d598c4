//! Host callables: plain functions and bound methods
//!
//! A bound method keeps only a weak reference to its receiver, so a
//! subscription never keeps the receiver alive. Identity is
//! `(receiver address, function id)` for bound methods and the function id
//! for plain functions; two `bind` calls on the same receiver compare equal.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{BridgeError, BridgeResult};
use crate::host::value::{HostError, HostResult, HostValue};

/// Identity of a host function body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(u64);

impl FunctionId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        FunctionId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Identity used to match callables on disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallableId {
    /// A free function
    Function(FunctionId),
    /// A function bound to a receiver
    Bound {
        /// Address of the receiver allocation
        receiver: usize,
        /// The unbound function
        function: FunctionId,
    },
}

type FunctionBody = dyn Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync;
type MethodBody = dyn Fn(&dyn Any, &[HostValue]) -> HostResult<HostValue> + Send + Sync;
type Receiver = dyn Any + Send + Sync;

/// A free host function
#[derive(Clone)]
pub struct HostFunction {
    id: FunctionId,
    name: Arc<str>,
    body: Arc<FunctionBody>,
}

impl HostFunction {
    /// Wrap a closure as a host function
    pub fn new<F>(name: &str, body: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Self {
            id: FunctionId::next(),
            name: Arc::from(name),
            body: Arc::new(body),
        }
    }

    /// Function identity
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An unbound method of a host class
#[derive(Clone)]
pub struct HostMethod {
    id: FunctionId,
    name: Arc<str>,
    body: Arc<MethodBody>,
}

impl HostMethod {
    /// Define a method on receivers of type `T`
    pub fn new<T, F>(name: &str, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        let method_name: Arc<str> = Arc::from(name);
        let err_name = method_name.clone();
        Self {
            id: FunctionId::next(),
            name: method_name,
            body: Arc::new(move |receiver: &dyn Any, args: &[HostValue]| {
                match receiver.downcast_ref::<T>() {
                    Some(this) => body(this, args),
                    None => Err(HostError::type_error(format!(
                        "{} called with a receiver of the wrong type",
                        err_name
                    ))),
                }
            }),
        }
    }

    /// Function identity
    pub fn id(&self) -> FunctionId {
        self.id
    }

    /// Bind to a receiver, producing a callable that holds it weakly
    pub fn bind<T: Any + Send + Sync>(&self, receiver: &Arc<T>) -> Callable {
        let weak: Weak<T> = Arc::downgrade(receiver);
        let weak: Weak<Receiver> = weak;
        Callable::Bound(BoundMethod {
            receiver: weak,
            receiver_addr: Arc::as_ptr(receiver) as *const () as usize,
            method: self.clone(),
        })
    }
}

/// A method bound to a weakly held receiver
#[derive(Clone)]
pub struct BoundMethod {
    receiver: Weak<Receiver>,
    receiver_addr: usize,
    method: HostMethod,
}

impl BoundMethod {
    /// Check whether the receiver is still alive
    pub fn is_alive(&self) -> bool {
        self.receiver.strong_count() > 0
    }
}

/// Anything the host can connect to a signal
#[derive(Clone)]
pub enum Callable {
    /// Free function
    Function(HostFunction),
    /// Bound method
    Bound(BoundMethod),
}

impl Callable {
    /// Shorthand for a free function callable
    pub fn function<F>(name: &str, body: F) -> Self
    where
        F: Fn(&[HostValue]) -> HostResult<HostValue> + Send + Sync + 'static,
    {
        Callable::Function(HostFunction::new(name, body))
    }

    /// Identity used for disconnect matching
    pub fn identity(&self) -> CallableId {
        match self {
            Callable::Function(f) => CallableId::Function(f.id),
            Callable::Bound(b) => CallableId::Bound {
                receiver: b.receiver_addr,
                function: b.method.id,
            },
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        match self {
            Callable::Function(f) => &f.name,
            Callable::Bound(b) => &b.method.name,
        }
    }

    /// Whether the callable can still be invoked
    pub fn is_alive(&self) -> bool {
        match self {
            Callable::Function(_) => true,
            Callable::Bound(b) => b.is_alive(),
        }
    }

    /// Invoke with host arguments.
    ///
    /// A bound method whose receiver is gone fails with
    /// [`BridgeError::StaleSubscription`] without running anything.
    pub fn invoke(&self, args: &[HostValue]) -> BridgeResult<HostValue> {
        match self {
            Callable::Function(f) => (f.body)(args).map_err(BridgeError::Host),
            Callable::Bound(b) => {
                let receiver = b
                    .receiver
                    .upgrade()
                    .ok_or_else(|| BridgeError::StaleSubscription {
                        callable: b.method.name.to_string(),
                    })?;
                (b.method.body)(receiver.as_ref(), args).map_err(BridgeError::Host)
            }
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name())
            .field("identity", &self.identity())
            .finish()
    }
}
