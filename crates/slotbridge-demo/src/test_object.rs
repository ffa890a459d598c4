//! TestObject: text holder with a string signal, list copies and a factory

use std::any::Any;
use std::sync::Arc;

use slotbridge_sdk::{
    arg, ConstructorDescriptor, IntoNative, MethodDescriptor, NativeClass, NativeContext,
    NativeError, NativeInstance, NativeObject, NativeRef, NativeResult, NativeValue,
    PropertyDescriptor, ReturnOwnership, TypeDescriptor, TypeTag,
};

use crate::transcript::Transcript;

/// Class name as registered with a bridge
pub const CLASS_NAME: &str = "TestObject";

fn descriptor() -> Arc<TypeDescriptor> {
    let float_list = TypeTag::List(Box::new(TypeTag::Float));
    let short_list = TypeTag::List(Box::new(TypeTag::Short));
    TypeDescriptor::builder(CLASS_NAME)
        .constructor(vec![])
        .constructor(vec![TypeTag::String])
        .property("text", TypeTag::String, false)
        .signal("aSignal", vec![TypeTag::String])
        .method(MethodDescriptor::new("getText", vec![], TypeTag::String))
        .method(MethodDescriptor::new("method", vec![TypeTag::String], TypeTag::Void))
        .method(MethodDescriptor::new("emitSignal", vec![TypeTag::String], TypeTag::Void))
        .method(MethodDescriptor::new("aSlot", vec![TypeTag::String], TypeTag::Void))
        .method(MethodDescriptor::new(
            "copyString",
            vec![TypeTag::String],
            TypeTag::String,
        ))
        .method(MethodDescriptor::new(
            "copyFloatList",
            vec![float_list.clone()],
            float_list,
        ))
        .method(MethodDescriptor::new(
            "copyShortList",
            vec![short_list.clone()],
            short_list,
        ))
        .method(
            MethodDescriptor::new("createObject", vec![], TypeTag::Object)
                .returns(ReturnOwnership::Transferred),
        )
        .build()
}

/// Native class for [`TestObject`]
pub struct TestObjectClass {
    descriptor: Arc<TypeDescriptor>,
    transcript: Transcript,
}

impl TestObjectClass {
    /// Create the class; instances print into `transcript`
    pub fn new(transcript: Transcript) -> Self {
        Self {
            descriptor: descriptor(),
            transcript,
        }
    }
}

impl NativeClass for TestObjectClass {
    fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    fn construct(
        &self,
        constructor: &ConstructorDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<Box<dyn NativeObject>> {
        let text = match constructor.params.len() {
            0 => String::new(),
            _ => arg::<String>(args, 0)?,
        };
        Ok(Box::new(TestObject {
            text,
            descriptor: self.descriptor.clone(),
            transcript: self.transcript.clone(),
        }))
    }
}

/// Native state of one TestObject
pub struct TestObject {
    text: String,
    descriptor: Arc<TypeDescriptor>,
    transcript: Transcript,
}

impl TestObject {
    /// Text given at construction
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl NativeObject for TestObject {
    fn invoke(
        &self,
        ctx: &dyn NativeContext,
        this: &NativeRef,
        method: &MethodDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        match method.name.as_str() {
            "getText" => Ok(self.text.as_str().into_native()),
            "method" => {
                self.transcript.push(arg::<String>(args, 0)?);
                Ok(NativeValue::Void)
            }
            "emitSignal" => {
                let msg: String = arg(args, 0)?;
                self.transcript
                    .push(format!("emitting signal aSignal({})", msg));
                ctx.emit(this, "aSignal(string)", &[msg.into_native()])?;
                Ok(NativeValue::Void)
            }
            "aSlot" => {
                let msg: String = arg(args, 0)?;
                self.transcript
                    .push(format!("aSlot() called with data: {}", msg));
                Ok(NativeValue::Void)
            }
            "copyString" | "copyFloatList" | "copyShortList" => Ok(args[0].clone()),
            "createObject" => {
                let created = TestObject {
                    text: "New Object".to_string(),
                    descriptor: self.descriptor.clone(),
                    transcript: self.transcript.clone(),
                };
                Ok(NativeInstance::new(self.descriptor.clone(), Box::new(created)).into_native())
            }
            _ => Err(NativeError::UnknownMethod {
                class: CLASS_NAME.to_string(),
                method: method.name.clone(),
            }),
        }
    }

    fn get_property(&self, property: &PropertyDescriptor) -> NativeResult<NativeValue> {
        match property.name.as_str() {
            "text" => Ok(self.text.as_str().into_native()),
            other => Err(NativeError::UnknownProperty {
                class: CLASS_NAME.to_string(),
                property: other.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
