//! QpyTestObject: an integer holder with signals, slots and a virtual
//! `Describe()`

use std::any::Any;
use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::Mutex;
use slotbridge_sdk::{
    arg, ConstructorDescriptor, IntoNative, MethodDescriptor, NativeClass, NativeContext,
    NativeError, NativeObject, NativeRef, NativeResult, NativeValue, PropertyDescriptor,
    TypeDescriptor, TypeTag,
};

use crate::transcript::Transcript;

/// Class name as registered with a bridge
pub const CLASS_NAME: &str = "QpyTestObject";

fn descriptor() -> Arc<TypeDescriptor> {
    use TypeTag::*;
    TypeDescriptor::builder(CLASS_NAME)
        .doc("Integer holder used by the bridge test sessions")
        .constructor(vec![])
        .constructor(vec![Int])
        .property("value", Int, true)
        .signal("aSignal", vec![Int])
        .signal("anotherSignal", vec![String])
        .signal("valueChanged", vec![Int])
        .signal("valueChanged", vec![String])
        .method(MethodDescriptor::new("copyString", vec![String], String))
        .method(MethodDescriptor::new("copyFloat", vec![Float], Float))
        .method(MethodDescriptor::new("copyDouble", vec![Double], Double))
        .method(MethodDescriptor::new("copyInt", vec![Int], Int))
        .method(MethodDescriptor::new("GetValue", vec![], Int))
        .method(MethodDescriptor::new("SetValue", vec![Int], Void))
        .method(MethodDescriptor::new("SetDefaultValue", vec![], Void))
        .method(MethodDescriptor::new("Describe", vec![], String).virtual_method())
        .method(MethodDescriptor::new("Print", vec![], Void))
        .method(MethodDescriptor::new("EmitSignal", vec![], Void))
        .method(MethodDescriptor::new("EmitFromThread", vec![Int], Void))
        .method(MethodDescriptor::new("Self", vec![], Object))
        .method(MethodDescriptor::new("catchSignal", vec![Int], Void))
        .method(MethodDescriptor::new("catchAnotherSignal", vec![String], Void))
        .build()
}

/// Native class for [`QpyTestObject`]
pub struct QpyTestObjectClass {
    descriptor: Arc<TypeDescriptor>,
    transcript: Transcript,
}

impl QpyTestObjectClass {
    /// Create the class; instances print into `transcript`
    pub fn new(transcript: Transcript) -> Self {
        Self {
            descriptor: descriptor(),
            transcript,
        }
    }

    /// Create an instance without going through a bridge
    pub fn create(&self, value: i32) -> NativeRef {
        slotbridge_sdk::NativeInstance::new(
            self.descriptor.clone(),
            Box::new(QpyTestObject::new(value, self.transcript.clone())),
        )
    }
}

impl NativeClass for QpyTestObjectClass {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn construct(
        &self,
        constructor: &ConstructorDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<Box<dyn NativeObject>> {
        let value = match constructor.params.len() {
            0 => 0,
            _ => arg::<i32>(args, 0)?,
        };
        Ok(Box::new(QpyTestObject::new(value, self.transcript.clone())))
    }
}

/// Native state of one QpyTestObject
pub struct QpyTestObject {
    value: Mutex<i32>,
    transcript: Transcript,
}

impl QpyTestObject {
    fn new(value: i32, transcript: Transcript) -> Self {
        Self {
            value: Mutex::new(value),
            transcript,
        }
    }

    /// Current value
    pub fn value(&self) -> i32 {
        *self.value.lock()
    }

    fn set_value(&self, ctx: &dyn NativeContext, this: &NativeRef, value: i32) -> NativeResult<()> {
        let changed = {
            let mut current = self.value.lock();
            let changed = *current != value;
            *current = value;
            changed
        };
        if changed {
            ctx.emit(this, "valueChanged(int)", &[value.into_native()])?;
        }
        Ok(())
    }
}

impl NativeObject for QpyTestObject {
    fn invoke(
        &self,
        ctx: &dyn NativeContext,
        this: &NativeRef,
        method: &MethodDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        match method.name.as_str() {
            "copyString" | "copyFloat" | "copyDouble" | "copyInt" => Ok(args[0].clone()),
            "GetValue" => Ok(self.value().into_native()),
            "SetValue" => {
                self.set_value(ctx, this, arg(args, 0)?)?;
                Ok(NativeValue::Void)
            }
            "SetDefaultValue" => {
                self.set_value(ctx, this, 0)?;
                Ok(NativeValue::Void)
            }
            "Describe" => Ok(format!("Value = {}", self.value()).into_native()),
            // Print goes through the virtual table so host overrides of
            // Describe show up here
            "Print" => {
                let line = ctx.call_virtual(this, "Describe", &[])?;
                let line = line
                    .as_str()
                    .ok_or_else(|| NativeError::TypeMismatch {
                        expected: "string".to_string(),
                        got: line.type_name().to_string(),
                    })?
                    .to_string();
                self.transcript.push(line);
                Ok(NativeValue::Void)
            }
            "EmitSignal" => {
                ctx.emit(this, "aSignal(int)", &[self.value().into_native()])?;
                Ok(NativeValue::Void)
            }
            "EmitFromThread" => {
                let value: i32 = arg(args, 0)?;
                let handle = ctx.handle();
                let source = this.clone();
                let worker = thread::spawn(move || {
                    handle.emit(&source, "aSignal(int)", &[value.into_native()])
                });
                worker
                    .join()
                    .map_err(|_| NativeError::Failed("emitting thread panicked".to_string()))??;
                Ok(NativeValue::Void)
            }
            "Self" => Ok(this.clone().into_native()),
            "catchSignal" => {
                let s: i32 = arg(args, 0)?;
                self.transcript.push(format!("Caught signal {}", s));
                Ok(NativeValue::Void)
            }
            "catchAnotherSignal" => {
                let msg: String = arg(args, 0)?;
                self.transcript.push(format!("Caught another signal {}", msg));
                Ok(NativeValue::Void)
            }
            _ => Err(NativeError::UnknownMethod {
                class: CLASS_NAME.to_string(),
                method: method.name.clone(),
            }),
        }
    }

    fn get_property(&self, property: &PropertyDescriptor) -> NativeResult<NativeValue> {
        match property.name.as_str() {
            "value" => Ok(self.value().into_native()),
            other => Err(NativeError::UnknownProperty {
                class: CLASS_NAME.to_string(),
                property: other.to_string(),
            }),
        }
    }

    fn set_property(&self, property: &PropertyDescriptor, value: NativeValue) -> NativeResult<()> {
        match property.name.as_str() {
            "value" => {
                *self.value.lock() = value
                    .as_i32()
                    .ok_or_else(|| NativeError::ArgumentError("value must be int".to_string()))?;
                Ok(())
            }
            other => Err(NativeError::UnknownProperty {
                class: CLASS_NAME.to_string(),
                property: other.to_string(),
            }),
        }
    }

    fn finalize(&self) {
        debug!("finalize {} (value {})", CLASS_NAME, self.value());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
