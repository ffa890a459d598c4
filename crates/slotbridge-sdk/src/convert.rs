//! Traits for converting between [`NativeValue`] and plain Rust types.
//!
//! Native method bodies use [`arg`] to pull typed arguments out of the
//! already-checked argument slice, and `.into_native()` to build returns.
//!
//! ```ignore
//! fn invoke(&self, ctx: &dyn NativeContext, this: &NativeRef,
//!           method: &MethodDescriptor, args: &[NativeValue]) -> NativeResult<NativeValue> {
//!     match method.name.as_str() {
//!         "copyString" => Ok(arg::<String>(args, 0)?.into_native()),
//!         _ => Err(NativeError::Failed("no such method".into())),
//!     }
//! }
//! ```

use crate::error::{NativeError, NativeResult};
use crate::object::NativeRef;
use crate::value::NativeValue;

/// Extract a Rust value from a [`NativeValue`]
pub trait FromNative: Sized {
    /// Convert, failing with [`NativeError::TypeMismatch`]
    fn from_native(value: &NativeValue) -> NativeResult<Self>;
}

/// Build a [`NativeValue`] from a Rust value
pub trait IntoNative {
    /// Convert into a native value
    fn into_native(self) -> NativeValue;
}

/// Typed access to argument `index`
pub fn arg<T: FromNative>(args: &[NativeValue], index: usize) -> NativeResult<T> {
    let value = args.get(index).ok_or_else(|| {
        NativeError::ArgumentError(format!(
            "missing argument {} (got {})",
            index,
            args.len()
        ))
    })?;
    T::from_native(value)
}

fn mismatch(expected: &str, value: &NativeValue) -> NativeError {
    NativeError::TypeMismatch {
        expected: expected.to_string(),
        got: value.type_name().to_string(),
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl FromNative for $ty {
                fn from_native(value: &NativeValue) -> NativeResult<Self> {
                    match value {
                        NativeValue::$variant(v) => Ok(v.clone()),
                        other => Err(mismatch($name, other)),
                    }
                }
            }

            impl IntoNative for $ty {
                fn into_native(self) -> NativeValue {
                    NativeValue::$variant(self)
                }
            }
        )*
    };
}

scalar_conversions! {
    bool => Bool, "bool";
    i32 => Int, "int";
    u32 => UInt, "uint";
    i16 => Short, "short";
    i64 => Long, "long";
    f32 => Float, "float";
    f64 => Double, "double";
    String => String, "string";
}

impl FromNative for Option<NativeRef> {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        match value {
            NativeValue::Object(obj) => Ok(obj.clone()),
            other => Err(mismatch("object", other)),
        }
    }
}

impl IntoNative for Option<NativeRef> {
    fn into_native(self) -> NativeValue {
        NativeValue::Object(self)
    }
}

impl IntoNative for NativeRef {
    fn into_native(self) -> NativeValue {
        NativeValue::Object(Some(self))
    }
}

impl<T: FromNative> FromNative for Vec<T> {
    fn from_native(value: &NativeValue) -> NativeResult<Self> {
        match value {
            NativeValue::List(items) => items.iter().map(T::from_native).collect(),
            other => Err(mismatch("list", other)),
        }
    }
}

impl<T: IntoNative> IntoNative for Vec<T> {
    fn into_native(self) -> NativeValue {
        NativeValue::List(self.into_iter().map(IntoNative::into_native).collect())
    }
}

impl IntoNative for &str {
    fn into_native(self) -> NativeValue {
        NativeValue::String(self.to_string())
    }
}

impl IntoNative for () {
    fn into_native(self) -> NativeValue {
        NativeValue::Void
    }
}

impl IntoNative for NativeValue {
    fn into_native(self) -> NativeValue {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_extraction() {
        let args = vec![
            NativeValue::Int(3),
            NativeValue::String("abc".into()),
            NativeValue::List(vec![NativeValue::Short(1), NativeValue::Short(2)]),
        ];
        assert_eq!(arg::<i32>(&args, 0).unwrap(), 3);
        assert_eq!(arg::<String>(&args, 1).unwrap(), "abc");
        assert_eq!(arg::<Vec<i16>>(&args, 2).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_arg_errors() {
        let args = vec![NativeValue::Int(3)];
        assert!(matches!(
            arg::<f64>(&args, 0),
            Err(NativeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            arg::<i32>(&args, 1),
            Err(NativeError::ArgumentError(_))
        ));
    }

    #[test]
    fn test_into_native() {
        assert_eq!(vec![1.5f32].into_native(), NativeValue::List(vec![NativeValue::Float(1.5)]));
        assert_eq!("x".into_native(), NativeValue::String("x".into()));
        assert_eq!(().into_native(), NativeValue::Void);
        assert_eq!(None::<NativeRef>.into_native(), NativeValue::Object(None));
    }
}
