//! NativeValue and TypeTag: the native side of the value boundary
//!
//! Every argument, return value, property and signal parameter declared in a
//! [`TypeDescriptor`](crate::TypeDescriptor) carries a [`TypeTag`]. Values
//! travelling through the native object model are [`NativeValue`]s.
//!
//! # Copy semantics
//!
//! ```text
//! bool, int, uint, short, long  by value
//! float, double                 by value (source width preserved)
//! string, list<T>               by value (deep copy)
//! object                        by reference (shared NativeRef)
//! ```

use std::fmt;

use crate::object::NativeRef;

// ============================================================================
// TypeTag
// ============================================================================

/// Type tag of a native argument, return value, property or signal parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No value (method return only)
    Void,
    /// Boolean
    Bool,
    /// 32-bit signed integer
    Int,
    /// 32-bit unsigned integer
    UInt,
    /// 16-bit signed integer
    Short,
    /// 64-bit signed integer
    Long,
    /// Single precision float
    Float,
    /// Double precision float
    Double,
    /// Text, copied by value
    String,
    /// Reference to another native instance (nullable)
    Object,
    /// Homogeneous list, copied by value
    List(Box<TypeTag>),
}

impl TypeTag {
    /// Parse a type name as it appears in a signature string.
    ///
    /// Accepts the canonical names (`int`, `string`, `list<float>`, ...) and
    /// the spellings used by Qt-style meta-object tables (`QString`,
    /// `QObject*`, `const QString&`, `QList<float>`, `QVector<short>`).
    pub fn parse(name: &str) -> Option<TypeTag> {
        let mut name = name.trim();
        if let Some(rest) = name.strip_prefix("const ") {
            name = rest.trim();
        }
        if let Some(rest) = name.strip_suffix('&') {
            name = rest.trim();
        }
        if name.ends_with('*') {
            return Some(TypeTag::Object);
        }

        if let Some(open) = name.find('<') {
            let container = &name[..open];
            let inner = name[open + 1..].strip_suffix('>')?;
            return match container.trim() {
                "list" | "QList" | "QVector" => {
                    let element = TypeTag::parse(inner)?;
                    if matches!(element, TypeTag::Void | TypeTag::List(_)) {
                        None
                    } else {
                        Some(TypeTag::List(Box::new(element)))
                    }
                }
                _ => None,
            };
        }

        let tag = match name {
            "" | "void" => TypeTag::Void,
            "bool" => TypeTag::Bool,
            "int" | "qint32" => TypeTag::Int,
            "uint" | "unsigned int" | "quint32" => TypeTag::UInt,
            "short" | "qint16" => TypeTag::Short,
            "long" | "qlonglong" | "qint64" => TypeTag::Long,
            "float" => TypeTag::Float,
            "double" | "qreal" => TypeTag::Double,
            "string" | "QString" => TypeTag::String,
            "object" => TypeTag::Object,
            _ => return None,
        };
        Some(tag)
    }

    /// Canonical name used in signature strings
    pub fn name(&self) -> String {
        match self {
            TypeTag::List(element) => format!("list<{}>", element.name()),
            other => other.scalar_name().to_string(),
        }
    }

    fn scalar_name(&self) -> &'static str {
        match self {
            TypeTag::Void => "void",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::UInt => "uint",
            TypeTag::Short => "short",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::Double => "double",
            TypeTag::String => "string",
            TypeTag::Object => "object",
            TypeTag::List(_) => "list",
        }
    }

    /// True for tags whose values are shared rather than copied
    pub fn is_by_reference(&self) -> bool {
        matches!(self, TypeTag::Object)
    }

    /// True for the integer family
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeTag::Int | TypeTag::UInt | TypeTag::Short | TypeTag::Long
        )
    }

    /// True for single and double precision floats
    pub fn is_float(&self) -> bool {
        matches!(self, TypeTag::Float | TypeTag::Double)
    }

    /// Default value for a freshly declared slot of this type
    pub fn default_value(&self) -> NativeValue {
        match self {
            TypeTag::Void => NativeValue::Void,
            TypeTag::Bool => NativeValue::Bool(false),
            TypeTag::Int => NativeValue::Int(0),
            TypeTag::UInt => NativeValue::UInt(0),
            TypeTag::Short => NativeValue::Short(0),
            TypeTag::Long => NativeValue::Long(0),
            TypeTag::Float => NativeValue::Float(0.0),
            TypeTag::Double => NativeValue::Double(0.0),
            TypeTag::String => NativeValue::String(String::new()),
            TypeTag::Object => NativeValue::Object(None),
            TypeTag::List(_) => NativeValue::List(Vec::new()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

// ============================================================================
// NativeValue
// ============================================================================

/// A value owned by the native side of the bridge.
#[derive(Clone)]
pub enum NativeValue {
    /// No value
    Void,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit unsigned integer
    UInt(u32),
    /// 16-bit signed integer
    Short(i16),
    /// 64-bit signed integer
    Long(i64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// Owned text
    String(String),
    /// Object reference; `None` is the null reference
    Object(Option<NativeRef>),
    /// Owned list
    List(Vec<NativeValue>),
}

impl NativeValue {
    /// Check if this is the void value
    pub fn is_void(&self) -> bool {
        matches!(self, NativeValue::Void)
    }

    /// Check if this value conforms to `tag`
    pub fn conforms_to(&self, tag: &TypeTag) -> bool {
        match (self, tag) {
            (NativeValue::Void, TypeTag::Void) => true,
            (NativeValue::Bool(_), TypeTag::Bool) => true,
            (NativeValue::Int(_), TypeTag::Int) => true,
            (NativeValue::UInt(_), TypeTag::UInt) => true,
            (NativeValue::Short(_), TypeTag::Short) => true,
            (NativeValue::Long(_), TypeTag::Long) => true,
            (NativeValue::Float(_), TypeTag::Float) => true,
            (NativeValue::Double(_), TypeTag::Double) => true,
            (NativeValue::String(_), TypeTag::String) => true,
            (NativeValue::Object(_), TypeTag::Object) => true,
            (NativeValue::List(items), TypeTag::List(element)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            _ => false,
        }
    }

    /// Extract bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract i32 value
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NativeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract any integer value widened to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) => Some(i64::from(*i)),
            NativeValue::UInt(u) => Some(i64::from(*u)),
            NativeValue::Short(s) => Some(i64::from(*s)),
            NativeValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Extract f32 value
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            NativeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract f64 value
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Borrow string contents
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the object reference (`Some(None)` is a null reference)
    pub fn as_object(&self) -> Option<Option<&NativeRef>> {
        match self {
            NativeValue::Object(obj) => Some(obj.as_ref()),
            _ => None,
        }
    }

    /// Borrow list items
    pub fn as_list(&self) -> Option<&[NativeValue]> {
        match self {
            NativeValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            NativeValue::Void => "void",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "int",
            NativeValue::UInt(_) => "uint",
            NativeValue::Short(_) => "short",
            NativeValue::Long(_) => "long",
            NativeValue::Float(_) => "float",
            NativeValue::Double(_) => "double",
            NativeValue::String(_) => "string",
            NativeValue::Object(_) => "object",
            NativeValue::List(_) => "list",
        }
    }
}

impl Default for NativeValue {
    fn default() -> Self {
        NativeValue::Void
    }
}

impl PartialEq for NativeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NativeValue::Void, NativeValue::Void) => true,
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::Int(a), NativeValue::Int(b)) => a == b,
            (NativeValue::UInt(a), NativeValue::UInt(b)) => a == b,
            (NativeValue::Short(a), NativeValue::Short(b)) => a == b,
            (NativeValue::Long(a), NativeValue::Long(b)) => a == b,
            (NativeValue::Float(a), NativeValue::Float(b)) => a == b,
            (NativeValue::Double(a), NativeValue::Double(b)) => a == b,
            (NativeValue::String(a), NativeValue::String(b)) => a == b,
            (NativeValue::Object(a), NativeValue::Object(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.id() == b.id(),
                _ => false,
            },
            (NativeValue::List(a), NativeValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Void => write!(f, "NativeValue::Void"),
            NativeValue::Bool(b) => write!(f, "NativeValue::Bool({})", b),
            NativeValue::Int(i) => write!(f, "NativeValue::Int({})", i),
            NativeValue::UInt(u) => write!(f, "NativeValue::UInt({})", u),
            NativeValue::Short(s) => write!(f, "NativeValue::Short({})", s),
            NativeValue::Long(l) => write!(f, "NativeValue::Long({})", l),
            NativeValue::Float(x) => write!(f, "NativeValue::Float({})", x),
            NativeValue::Double(x) => write!(f, "NativeValue::Double({})", x),
            NativeValue::String(s) => write!(f, "NativeValue::String({:?})", s),
            NativeValue::Object(None) => write!(f, "NativeValue::Object(null)"),
            NativeValue::Object(Some(obj)) => write!(
                f,
                "NativeValue::Object({}@{:#x})",
                obj.descriptor().class_name(),
                obj.id().as_u64()
            ),
            NativeValue::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}
