//! The host-language side of the boundary: dynamic values and callables

pub mod callable;
pub mod value;

pub use callable::{BoundMethod, Callable, CallableId, FunctionId, HostFunction, HostMethod};
pub use value::{HostError, HostResult, HostValue};
