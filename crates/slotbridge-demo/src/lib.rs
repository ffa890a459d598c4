//! Demo native classes
//!
//! `QpyTestObject` and `TestObject` exercise every part of the bridge:
//! constructors with and without arguments, a writable property, plain and
//! overloaded signals, slots, a virtual method, a method returning `this`
//! and a factory transferring ownership.

pub mod qpy_test_object;
pub mod test_object;
pub mod transcript;

use std::sync::Arc;

use slotbridge_sdk::NativeClass;

pub use qpy_test_object::{QpyTestObject, QpyTestObjectClass};
pub use test_object::{TestObject, TestObjectClass};
pub use transcript::Transcript;

/// Every demo class, printing into `transcript`
pub fn classes(transcript: &Transcript) -> Vec<Arc<dyn NativeClass>> {
    vec![
        Arc::new(QpyTestObjectClass::new(transcript.clone())),
        Arc::new(TestObjectClass::new(transcript.clone())),
    ]
}
