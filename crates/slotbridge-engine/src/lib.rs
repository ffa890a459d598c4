//! Slotbridge engine
//!
//! Bridges native classes described by [`slotbridge_sdk`] to a dynamically
//! typed host. The engine owns:
//!
//! - the class table and the proxy registry (one proxy per native instance,
//!   ownership decided once at wrap time)
//! - the marshaling layer between [`HostValue`] and native values
//! - the connection table and the dispatch engine for signals
//! - the subclass bridge routing virtual calls to host overrides
//!
//! # Example
//!
//! ```ignore
//! let bridge = Bridge::default();
//! bridge.register_class(Arc::new(QpyTestObjectClass::new()))?;
//! let to = bridge.construct("QpyTestObject", &[])?;
//! let seen = Callable::function("cback", |args| {
//!     println!("got {:?}", args);
//!     Ok(HostValue::None)
//! });
//! bridge.connect((&to, "aSignal"), &seen)?;
//! to.emit("aSignal", &[131.into()])?;
//! ```

pub mod bridge;
pub mod class_table;
pub mod connection;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod marshal;
pub mod options;
pub mod ownership;
pub mod proxy;
pub mod registry;
pub mod signal;
pub mod subclass;

pub use bridge::Bridge;
pub use class_table::ClassTable;
pub use connection::{ConnectionHandle, ConnectionId, SignalKey};
pub use context::EngineContext;
pub use dispatch::{DispatchReport, ErrorHook, SubscriberFailure};
pub use error::{BridgeError, BridgeResult, MarshalError};
pub use host::{
    BoundMethod, Callable, CallableId, FunctionId, HostError, HostFunction, HostMethod, HostResult,
    HostValue,
};
pub use marshal::widen_f32;
pub use options::{BridgeOptions, CrossThreadPolicy, DEFAULT_MAX_ARGUMENTS};
pub use ownership::{is_foreign_owned, is_qobject, native_handle, Ownership, Provenance};
pub use proxy::{Proxy, ProxyId};
pub use signal::{resolve_signal, resolve_slot, BoundSignal, SignalSource};
pub use subclass::{BindingState, HostClass, HostClassBuilder, OverrideFn, OverrideTable};
