//! Native instances and classes
//!
//! A native class is a [`NativeClass`]: a shared [`TypeDescriptor`] plus a
//! constructor. Each constructed object lives behind a [`NativeRef`], whose
//! [`InstanceId`] is the identity the bridge keys everything on.
//!
//! Destruction is explicit: [`NativeInstance::destroy`] runs the object's
//! finalizer exactly once and notifies the [`NativeContext`]. The memory stays
//! valid for anyone still holding a `NativeRef`, but every later call fails
//! with [`NativeError::ObjectDestroyed`].

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::context::NativeContext;
use crate::error::{NativeError, NativeResult};
use crate::types::{ConstructorDescriptor, MethodDescriptor, PropertyDescriptor, TypeDescriptor};
use crate::value::NativeValue;

/// Shared handle to a native instance
pub type NativeRef = Arc<NativeInstance>;

/// Opaque identity of a native instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a new process-unique instance ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        InstanceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Traits implemented by native code
// ============================================================================

/// Behavior of one native object.
///
/// Argument lists handed to [`invoke`](NativeObject::invoke) have already
/// been checked against the method's parameter tags.
pub trait NativeObject: Send + Sync + 'static {
    /// Invoke a method from the class's method table.
    ///
    /// `this` is the instance being called, so methods can return
    /// themselves, emit signals through `ctx`, or route virtual calls back
    /// through [`NativeContext::call_virtual`].
    fn invoke(
        &self,
        ctx: &dyn NativeContext,
        this: &NativeRef,
        method: &MethodDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue>;

    /// Read a property
    fn get_property(&self, property: &PropertyDescriptor) -> NativeResult<NativeValue> {
        Err(NativeError::Failed(format!(
            "property {} has no getter",
            property.name
        )))
    }

    /// Write a property
    fn set_property(&self, property: &PropertyDescriptor, _value: NativeValue) -> NativeResult<()> {
        Err(NativeError::ReadOnlyProperty(property.name.clone()))
    }

    /// Release native resources; called once, on destruction
    fn finalize(&self) {}

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// A constructible native class.
pub trait NativeClass: Send + Sync {
    /// The class's shared descriptor
    fn descriptor(&self) -> &Arc<TypeDescriptor>;

    /// Construct a new object using `constructor`; `args` conform to its tags
    fn construct(
        &self,
        constructor: &ConstructorDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<Box<dyn NativeObject>>;

    /// Convenience: construct and place behind a fresh [`NativeRef`]
    fn instantiate(
        &self,
        constructor: &ConstructorDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<NativeRef> {
        let object = self.construct(constructor, args)?;
        Ok(NativeInstance::new(self.descriptor().clone(), object))
    }
}

// ============================================================================
// NativeInstance
// ============================================================================

/// A live native object together with its identity and class metadata.
pub struct NativeInstance {
    id: InstanceId,
    descriptor: Arc<TypeDescriptor>,
    object: Box<dyn NativeObject>,
    destroyed: AtomicBool,
}

impl NativeInstance {
    /// Place `object` behind a new identity
    pub fn new(descriptor: Arc<TypeDescriptor>, object: Box<dyn NativeObject>) -> NativeRef {
        Arc::new(Self {
            id: InstanceId::new(),
            descriptor,
            object,
            destroyed: AtomicBool::new(false),
        })
    }

    /// Instance identity
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Class metadata
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// The object behind this instance
    pub fn object(&self) -> &dyn NativeObject {
        self.object.as_ref()
    }

    /// Downcast the object to its concrete type
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.object.as_any().downcast_ref::<T>()
    }

    /// Check whether the instance has been destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> NativeResult<()> {
        if self.is_destroyed() {
            Err(NativeError::ObjectDestroyed(self.id.as_u64()))
        } else {
            Ok(())
        }
    }

    /// Call `method` directly on this instance, bypassing any override.
    ///
    /// Arguments are checked against the method's tags and the return value
    /// against its return tag.
    pub fn invoke_method(
        self: &Arc<Self>,
        ctx: &dyn NativeContext,
        method: &MethodDescriptor,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        self.ensure_alive()?;
        check_args(&method.name, &method.params, args)?;
        let result = self.object.invoke(ctx, self, method, args)?;
        if !result.conforms_to(&method.ret) {
            return Err(NativeError::TypeMismatch {
                expected: method.ret.name(),
                got: result.type_name().to_string(),
            });
        }
        Ok(result)
    }

    /// Look up `name` by arity and call it, bypassing any override
    pub fn invoke(
        self: &Arc<Self>,
        ctx: &dyn NativeContext,
        name: &str,
        args: &[NativeValue],
    ) -> NativeResult<NativeValue> {
        let method = self
            .descriptor
            .method_for(name, args.len())
            .ok_or_else(|| NativeError::UnknownMethod {
                class: self.descriptor.class_name().to_string(),
                method: name.to_string(),
            })?
            .clone();
        self.invoke_method(ctx, &method, args)
    }

    /// Read a property by name
    pub fn property(&self, name: &str) -> NativeResult<NativeValue> {
        self.ensure_alive()?;
        let prop = self.find_property(name)?;
        self.object.get_property(prop)
    }

    /// Write a property by name
    pub fn set_property(&self, name: &str, value: NativeValue) -> NativeResult<()> {
        self.ensure_alive()?;
        let prop = self.find_property(name)?;
        if !prop.writable {
            return Err(NativeError::ReadOnlyProperty(prop.name.clone()));
        }
        if !value.conforms_to(&prop.tag) {
            return Err(NativeError::TypeMismatch {
                expected: prop.tag.name(),
                got: value.type_name().to_string(),
            });
        }
        self.object.set_property(prop, value)
    }

    fn find_property(&self, name: &str) -> NativeResult<&PropertyDescriptor> {
        self.descriptor
            .property(name)
            .ok_or_else(|| NativeError::UnknownProperty {
                class: self.descriptor.class_name().to_string(),
                property: name.to_string(),
            })
    }

    /// Destroy the instance.
    ///
    /// Runs the finalizer and notifies `ctx` on the first call only; returns
    /// whether this call performed the destruction.
    pub fn destroy(&self, ctx: &dyn NativeContext) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.object.finalize();
        ctx.destroyed(self.id);
        true
    }
}

impl fmt::Debug for NativeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeInstance")
            .field("id", &self.id)
            .field("class", &self.descriptor.class_name())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Check an argument list against parameter tags
pub fn check_args(
    name: &str,
    params: &[crate::value::TypeTag],
    args: &[NativeValue],
) -> NativeResult<()> {
    if params.len() != args.len() {
        return Err(NativeError::ArgumentError(format!(
            "{} expects {} argument(s), got {}",
            name,
            params.len(),
            args.len()
        )));
    }
    for (param, arg) in params.iter().zip(args) {
        if !arg.conforms_to(param) {
            return Err(NativeError::TypeMismatch {
                expected: param.name(),
                got: arg.type_name().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DetachedContext;
    use crate::value::TypeTag;
    use std::sync::atomic::AtomicUsize;

    struct Counter {
        finalized: Arc<AtomicUsize>,
    }

    impl NativeObject for Counter {
        fn invoke(
            &self,
            _ctx: &dyn NativeContext,
            this: &NativeRef,
            method: &MethodDescriptor,
            args: &[NativeValue],
        ) -> NativeResult<NativeValue> {
            match method.name.as_str() {
                "Echo" => Ok(args[0].clone()),
                "Self" => Ok(NativeValue::Object(Some(this.clone()))),
                "Broken" => Ok(NativeValue::String("not an int".into())),
                _ => Err(NativeError::Failed("unreachable".into())),
            }
        }

        fn finalize(&self) {
            self.finalized.fetch_add(1, Ordering::SeqCst);
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn counter() -> (NativeRef, Arc<AtomicUsize>) {
        let desc = TypeDescriptor::builder("Counter")
            .method(MethodDescriptor::new("Echo", vec![TypeTag::Int], TypeTag::Int))
            .method(MethodDescriptor::new("Self", vec![], TypeTag::Object))
            .method(MethodDescriptor::new("Broken", vec![], TypeTag::Int))
            .property("ro", TypeTag::Int, false)
            .build();
        let finalized = Arc::new(AtomicUsize::new(0));
        let obj = Counter {
            finalized: finalized.clone(),
        };
        (NativeInstance::new(desc, Box::new(obj)), finalized)
    }

    #[test]
    fn test_instance_ids_are_unique() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }

    #[test]
    fn test_invoke_checks_arguments() {
        let (obj, _) = counter();
        let ctx = DetachedContext;
        assert_eq!(
            obj.invoke(&ctx, "Echo", &[NativeValue::Int(4)]).unwrap(),
            NativeValue::Int(4)
        );
        assert!(matches!(
            obj.invoke(&ctx, "Echo", &[NativeValue::Double(4.0)]),
            Err(NativeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            obj.invoke(&ctx, "Nope", &[]),
            Err(NativeError::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_invoke_checks_return_tag() {
        let (obj, _) = counter();
        assert!(matches!(
            obj.invoke(&DetachedContext, "Broken", &[]),
            Err(NativeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_self_returns_same_identity() {
        let (obj, _) = counter();
        let result = obj.invoke(&DetachedContext, "Self", &[]).unwrap();
        assert_eq!(result.as_object().unwrap().unwrap().id(), obj.id());
    }

    #[test]
    fn test_read_only_property() {
        let (obj, _) = counter();
        assert!(matches!(
            obj.set_property("ro", NativeValue::Int(1)),
            Err(NativeError::ReadOnlyProperty(_))
        ));
        assert!(matches!(
            obj.property("missing"),
            Err(NativeError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_destroy_runs_once() {
        let (obj, finalized) = counter();
        assert!(obj.destroy(&DetachedContext));
        assert!(!obj.destroy(&DetachedContext));
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert!(matches!(
            obj.invoke(&DetachedContext, "Echo", &[NativeValue::Int(1)]),
            Err(NativeError::ObjectDestroyed(_))
        ));
    }
}
