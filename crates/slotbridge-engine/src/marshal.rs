//! Marshaling between host values and native values
//!
//! # Conversion rules
//!
//! ```text
//! tag        host -> native                  native -> host
//! bool       Bool                            Bool
//! int/uint/  Int, range checked              Int
//! short/long
//! float      Float or Int, range checked     Float via shortest decimal
//! double     Float or Int                    Float
//! string     Str, copied                     Str, copied
//! list<T>    List, element-wise, copied      List, element-wise
//! object     Object (same bridge) or None    existing proxy, or a new one
//! ```
//!
//! A single-precision value crosses to the host through its shortest
//! decimal form, so `1.2f32` arrives as `1.2` rather than
//! `1.2000000476837158`.

use std::sync::Arc;

use slotbridge_sdk::{NativeValue, TypeTag};

use crate::bridge::BridgeShared;
use crate::error::{BridgeResult, MarshalError};
use crate::host::HostValue;
use crate::ownership::Provenance;

/// Converts values across the boundary for one bridge
pub(crate) struct Marshaler<'a> {
    bridge: &'a Arc<BridgeShared>,
}

fn mismatch(tag: &TypeTag, value: &HostValue) -> MarshalError {
    MarshalError::TypeMismatch {
        expected: tag.name(),
        got: value.type_name().to_string(),
    }
}

fn out_of_range(tag: &TypeTag, value: impl ToString) -> MarshalError {
    MarshalError::OutOfRange {
        expected: tag.name(),
        value: value.to_string(),
    }
}

fn integer<T: TryFrom<i64>>(tag: &TypeTag, value: &HostValue) -> Result<T, MarshalError> {
    match value {
        HostValue::Int(i) => T::try_from(*i).map_err(|_| out_of_range(tag, i)),
        other => Err(mismatch(tag, other)),
    }
}

/// Widen an f32 to the f64 with the same shortest decimal representation
pub fn widen_f32(value: f32) -> f64 {
    if !value.is_finite() {
        return f64::from(value);
    }
    value
        .to_string()
        .parse::<f64>()
        .unwrap_or_else(|_| f64::from(value))
}

impl<'a> Marshaler<'a> {
    pub(crate) fn new(bridge: &'a Arc<BridgeShared>) -> Self {
        Self { bridge }
    }

    /// Convert a host value to a native value of type `tag`
    pub(crate) fn to_native(
        &self,
        value: &HostValue,
        tag: &TypeTag,
    ) -> Result<NativeValue, MarshalError> {
        let converted = match tag {
            TypeTag::Void => match value {
                HostValue::None => NativeValue::Void,
                other => return Err(mismatch(tag, other)),
            },
            TypeTag::Bool => match value {
                HostValue::Bool(b) => NativeValue::Bool(*b),
                other => return Err(mismatch(tag, other)),
            },
            TypeTag::Int => NativeValue::Int(integer(tag, value)?),
            TypeTag::UInt => NativeValue::UInt(integer(tag, value)?),
            TypeTag::Short => NativeValue::Short(integer(tag, value)?),
            TypeTag::Long => NativeValue::Long(integer(tag, value)?),
            TypeTag::Float => {
                let x = value.as_float().ok_or_else(|| mismatch(tag, value))?;
                let narrowed = x as f32;
                if x.is_finite() && narrowed.is_infinite() {
                    return Err(out_of_range(tag, x));
                }
                NativeValue::Float(narrowed)
            }
            TypeTag::Double => {
                NativeValue::Double(value.as_float().ok_or_else(|| mismatch(tag, value))?)
            }
            TypeTag::String => match value {
                HostValue::Str(s) => NativeValue::String(s.clone()),
                other => return Err(mismatch(tag, other)),
            },
            TypeTag::Object => match value {
                HostValue::None => NativeValue::Object(None),
                HostValue::Object(proxy) => {
                    if !Arc::ptr_eq(proxy.bridge(), self.bridge) {
                        return Err(MarshalError::ForeignObject);
                    }
                    if proxy.is_destroyed() {
                        return Err(MarshalError::NullObject);
                    }
                    NativeValue::Object(Some(proxy.native().clone()))
                }
                other => return Err(mismatch(tag, other)),
            },
            TypeTag::List(element) => match value {
                HostValue::List(items) => NativeValue::List(
                    items
                        .iter()
                        .map(|item| self.to_native(item, element))
                        .collect::<Result<_, _>>()?,
                ),
                other => return Err(mismatch(tag, other)),
            },
        };
        Ok(converted)
    }

    /// Convert a native value of type `tag` to a host value.
    ///
    /// Objects come back as their existing proxy; an unwrapped object gets a
    /// new proxy whose ownership follows `provenance`.
    pub(crate) fn to_host(
        &self,
        value: &NativeValue,
        tag: &TypeTag,
        provenance: Provenance,
    ) -> BridgeResult<HostValue> {
        if !value.conforms_to(tag) {
            return Err(MarshalError::TypeMismatch {
                expected: tag.name(),
                got: value.type_name().to_string(),
            }
            .into());
        }
        self.value_to_host(value, provenance)
    }

    fn value_to_host(
        &self,
        value: &NativeValue,
        provenance: Provenance,
    ) -> BridgeResult<HostValue> {
        let converted = match value {
            NativeValue::Void => HostValue::None,
            NativeValue::Bool(b) => HostValue::Bool(*b),
            NativeValue::Int(i) => HostValue::Int(i64::from(*i)),
            NativeValue::UInt(u) => HostValue::Int(i64::from(*u)),
            NativeValue::Short(s) => HostValue::Int(i64::from(*s)),
            NativeValue::Long(l) => HostValue::Int(*l),
            NativeValue::Float(f) => HostValue::Float(widen_f32(*f)),
            NativeValue::Double(d) => HostValue::Float(*d),
            NativeValue::String(s) => HostValue::Str(s.clone()),
            NativeValue::Object(None) => HostValue::None,
            NativeValue::Object(Some(native)) => {
                HostValue::Object(self.bridge.wrap(native, provenance)?)
            }
            NativeValue::List(items) => HostValue::List(
                items
                    .iter()
                    .map(|item| self.value_to_host(item, provenance))
                    .collect::<BridgeResult<_>>()?,
            ),
        };
        Ok(converted)
    }

    /// Convert an argument list, checking arity and the argument ceiling.
    ///
    /// Nothing is converted if any argument fails.
    pub(crate) fn args_to_native(
        &self,
        params: &[TypeTag],
        args: &[HostValue],
    ) -> Result<Vec<NativeValue>, MarshalError> {
        if args.len() > self.bridge.options.max_arguments {
            return Err(MarshalError::ArityMismatch {
                expected: self.bridge.options.max_arguments,
                got: args.len(),
            });
        }
        if params.len() != args.len() {
            return Err(MarshalError::ArityMismatch {
                expected: params.len(),
                got: args.len(),
            });
        }
        params
            .iter()
            .zip(args)
            .map(|(tag, arg)| self.to_native(arg, tag))
            .collect()
    }

    /// Convert native arguments for delivery to host code
    pub(crate) fn args_to_host(
        &self,
        params: &[TypeTag],
        args: &[NativeValue],
        provenance: Provenance,
    ) -> BridgeResult<Vec<HostValue>> {
        if params.len() != args.len() {
            return Err(MarshalError::ArityMismatch {
                expected: params.len(),
                got: args.len(),
            }
            .into());
        }
        params
            .iter()
            .zip(args)
            .map(|(tag, arg)| self.to_host(arg, tag, provenance))
            .collect()
    }
}
