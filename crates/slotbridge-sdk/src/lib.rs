//! Slotbridge SDK - the native object model
//!
//! This crate holds everything a native class needs to be exposed through a
//! slotbridge host bridge, without depending on the bridge itself:
//!
//! - [`TypeTag`] / [`NativeValue`]: the native side of the value boundary
//! - [`TypeDescriptor`]: per-class method, property, signal and constructor
//!   tables
//! - [`NativeObject`] / [`NativeClass`]: the behavior native code implements
//! - [`NativeContext`]: callbacks into the bridge (emit, virtual dispatch,
//!   destruction)
//!
//! # Example
//!
//! ```ignore
//! use slotbridge_sdk::*;
//!
//! struct Greeter;
//!
//! impl NativeObject for Greeter {
//!     fn invoke(&self, ctx: &dyn NativeContext, this: &NativeRef,
//!               method: &MethodDescriptor, args: &[NativeValue]) -> NativeResult<NativeValue> {
//!         let name: String = arg(args, 0)?;
//!         ctx.emit(this, "greeted(string)", &[name.clone().into_native()])?;
//!         Ok(format!("hello {}", name).into_native())
//!     }
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod convert;
pub mod error;
pub mod object;
pub mod types;
pub mod value;

pub use context::{ContextHandle, DetachedContext, NativeContext};
pub use convert::{arg, FromNative, IntoNative};
pub use error::{NativeError, NativeResult};
pub use object::{check_args, InstanceId, NativeClass, NativeInstance, NativeObject, NativeRef};
pub use types::{
    ConstructorDescriptor, MethodDescriptor, PropertyDescriptor, ReturnOwnership,
    SignalDescriptor, Signature, TypeDescriptor, TypeDescriptorBuilder,
};
pub use value::{NativeValue, TypeTag};
